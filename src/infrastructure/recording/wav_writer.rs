//! Canonical 44-byte RIFF/WAVE writer
//!
//! The header is written up front with zero size fields; PCM bytes are
//! appended as they come and `finalize` patches ChunkSize and Subchunk2Size.
//! 8-bit WAV data is unsigned, so signed 8-bit capture is offset by 128.

use std::fs::File;
use std::io::{self, BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use thiserror::Error;

use crate::application::ports::{PcmSink, SinkError};
use crate::domain::recording::{CaptureFormat, ChannelMask, SampleFormat};

/// Size of the canonical header
pub const WAV_HEADER_LEN: u64 = 44;

const FORMAT_PCM: u16 = 1;
const FORMAT_IEEE_FLOAT: u16 = 3;

/// Offset of the RIFF ChunkSize field
const CHUNK_SIZE_OFFSET: u64 = 4;
/// Offset of the data Subchunk2Size field
const DATA_SIZE_OFFSET: u64 = 40;

/// WAV writer errors
#[derive(Debug, Error)]
pub enum WavError {
    #[error("Unsupported WAV format: {channels} channel(s), {bits_per_sample}-bit")]
    UnsupportedFormat { channels: u16, bits_per_sample: u16 },

    #[error("WAV data exceeds 4 GiB ({0} bytes)")]
    TooLarge(u64),

    #[error("WAV I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Streams PCM into a WAV container
pub struct WavWriter<W: Write + Seek> {
    inner: W,
    format: CaptureFormat,
    data_len: u64,
}

impl WavWriter<BufWriter<File>> {
    /// Create (or truncate) `path` and write the header
    pub fn create(path: &Path, format: CaptureFormat) -> Result<Self, WavError> {
        let file = File::create(path)?;
        Self::new(BufWriter::new(file), format)
    }

    /// Validate raw parameters and create `path`.
    ///
    /// # Arguments
    /// * `channels` - 1 or 2
    /// * `bits_per_sample` - 8, 16 or 32 (float)
    pub fn for_params(
        path: &Path,
        channels: u16,
        sample_rate: u32,
        bits_per_sample: u16,
    ) -> Result<Self, WavError> {
        let unsupported = || WavError::UnsupportedFormat {
            channels,
            bits_per_sample,
        };
        let mask = ChannelMask::from_count(channels).map_err(|_| unsupported())?;
        let sample_format = SampleFormat::from_bits(bits_per_sample).map_err(|_| unsupported())?;
        let format =
            CaptureFormat::new(sample_rate, mask, sample_format).map_err(|_| unsupported())?;
        Self::create(path, format)
    }
}

impl<W: Write + Seek> WavWriter<W> {
    /// Wrap `inner` and write the header with placeholder sizes
    pub fn new(mut inner: W, format: CaptureFormat) -> Result<Self, WavError> {
        inner.write_all(&header_bytes(&format))?;
        Ok(Self {
            inner,
            format,
            data_len: 0,
        })
    }

    /// Append PCM bytes in the capture format's layout
    pub fn write_block(&mut self, pcm: &[u8]) -> Result<(), WavError> {
        match self.format.sample_format {
            SampleFormat::Pcm8 => {
                let unsigned: Vec<u8> = pcm.iter().map(|b| b ^ 0x80).collect();
                self.inner.write_all(&unsigned)?;
            }
            SampleFormat::Pcm16 | SampleFormat::Float => self.inner.write_all(pcm)?,
        }
        self.data_len += pcm.len() as u64;
        Ok(())
    }

    pub fn data_len(&self) -> u64 {
        self.data_len
    }

    pub fn format(&self) -> &CaptureFormat {
        &self.format
    }

    /// Patch the size fields and flush. Returns the number of data bytes.
    ///
    /// Further blocks may still be appended; finalizing again re-patches.
    pub fn finalize(&mut self) -> Result<u64, WavError> {
        let data_len =
            u32::try_from(self.data_len).map_err(|_| WavError::TooLarge(self.data_len))?;
        let chunk_size = data_len
            .checked_add(36)
            .ok_or(WavError::TooLarge(self.data_len))?;

        self.inner.seek(SeekFrom::Start(CHUNK_SIZE_OFFSET))?;
        self.inner.write_all(&chunk_size.to_le_bytes())?;
        self.inner.seek(SeekFrom::Start(DATA_SIZE_OFFSET))?;
        self.inner.write_all(&data_len.to_le_bytes())?;
        self.inner.seek(SeekFrom::End(0))?;
        self.inner.flush()?;

        tracing::debug!(bytes = self.data_len, "WAV finalized");
        Ok(self.data_len)
    }

    /// Consume the writer without patching sizes
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write + Seek + Send> PcmSink for WavWriter<W> {
    fn write_pcm(&mut self, pcm: &[u8]) -> Result<(), SinkError> {
        self.write_block(pcm)
            .map_err(|e| SinkError::Write(e.to_string()))
    }

    fn finish(&mut self) -> Result<u64, SinkError> {
        self.finalize()
            .map_err(|e| SinkError::Finalize(e.to_string()))
    }
}

/// Build the canonical header for `format` with zero size fields
pub fn header_bytes(format: &CaptureFormat) -> [u8; 44] {
    let audio_format = match format.sample_format {
        SampleFormat::Float => FORMAT_IEEE_FLOAT,
        SampleFormat::Pcm8 | SampleFormat::Pcm16 => FORMAT_PCM,
    };

    let mut header = [0u8; 44];
    header[0..4].copy_from_slice(b"RIFF");
    header[8..12].copy_from_slice(b"WAVE");
    header[12..16].copy_from_slice(b"fmt ");
    header[16..20].copy_from_slice(&16u32.to_le_bytes());
    header[20..22].copy_from_slice(&audio_format.to_le_bytes());
    header[22..24].copy_from_slice(&format.channel_count().to_le_bytes());
    header[24..28].copy_from_slice(&format.sample_rate.to_le_bytes());
    header[28..32].copy_from_slice(&format.byte_rate().to_le_bytes());
    header[32..34].copy_from_slice(&format.block_align().to_le_bytes());
    header[34..36].copy_from_slice(&format.bits_per_sample().to_le_bytes());
    header[36..40].copy_from_slice(b"data");
    header
}
