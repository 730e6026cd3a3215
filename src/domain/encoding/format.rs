//! Encoder settings, negotiated output format and buffer metadata

use std::fmt;

use crate::domain::error::ConfigurationError;

/// MIME type of the AAC elementary stream
pub const MIME_AUDIO_AAC: &str = "audio/mp4a-latm";

/// Sample rates an AAC track can carry
pub const AAC_SAMPLE_RATES: &[u32] = &[
    96000, 88200, 64000, 48000, 44100, 32000, 24000, 22050, 16000, 12000, 11025, 8000, 7350,
];

/// Default AAC target bit rate
pub const DEFAULT_BIT_RATE: u32 = 256_000;

const MIN_BIT_RATE: u32 = 8_000;
const MAX_BIT_RATE: u32 = 512_000;

/// Accept AAC target bit rates between 8 and 512 kbps
pub fn check_bit_rate(bit_rate: u32) -> Result<u32, ConfigurationError> {
    if (MIN_BIT_RATE..=MAX_BIT_RATE).contains(&bit_rate) {
        Ok(bit_rate)
    } else {
        Err(ConfigurationError::InvalidBitRate(bit_rate))
    }
}

/// Requested AAC encoder configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderSettings {
    pub sample_rate: u32,
    pub channels: u16,
    pub bit_rate: u32,
}

impl EncoderSettings {
    pub fn new(sample_rate: u32, channels: u16, bit_rate: u32) -> Result<Self, ConfigurationError> {
        if !AAC_SAMPLE_RATES.contains(&sample_rate) {
            return Err(ConfigurationError::InvalidSampleRate(sample_rate));
        }
        if !(1..=2).contains(&channels) {
            return Err(ConfigurationError::UnsupportedChannelMask(channels));
        }
        let bit_rate = check_bit_rate(bit_rate)?;
        Ok(Self {
            sample_rate,
            channels,
            bit_rate,
        })
    }

    /// Bytes of 16-bit PCM per interleaved frame
    pub const fn pcm_frame_bytes(&self) -> usize {
        2 * self.channels as usize
    }
}

/// Output format reported by the codec once it is known
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedFormat {
    pub mime: String,
    pub sample_rate: u32,
    pub channels: u16,
    pub bit_rate: u32,
    /// Samples per channel in one encoded access unit
    pub frame_length: u32,
    /// AudioSpecificConfig bytes
    pub codec_specific_data: Vec<u8>,
}

impl fmt::Display for EncodedFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} Hz {} ch {} bps",
            self.mime, self.sample_rate, self.channels, self.bit_rate
        )
    }
}

/// Flags attached to codec input and output buffers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BufferFlags(u32);

impl BufferFlags {
    pub const NONE: Self = Self(0);
    pub const KEY_FRAME: Self = Self(1);
    pub const CODEC_CONFIG: Self = Self(1 << 1);
    pub const END_OF_STREAM: Self = Self(1 << 2);

    pub const fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0 && other.0 != 0
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn bits(&self) -> u32 {
        self.0
    }
}

/// Metadata of one encoded buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BufferInfo {
    pub presentation_time_us: u64,
    pub size: usize,
    pub flags: BufferFlags,
}

impl BufferInfo {
    pub fn is_end_of_stream(&self) -> bool {
        self.flags.contains(BufferFlags::END_OF_STREAM)
    }

    pub fn is_codec_config(&self) -> bool {
        self.flags.contains(BufferFlags::CODEC_CONFIG)
    }
}

/// An encoded buffer handed from the codec to the pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedChunk {
    pub data: Vec<u8>,
    pub info: BufferInfo,
}

impl EncodedChunk {
    pub fn new(data: Vec<u8>, presentation_time_us: u64, flags: BufferFlags) -> Self {
        let size = data.len();
        Self {
            data,
            info: BufferInfo {
                presentation_time_us,
                size,
                flags,
            },
        }
    }

    /// An empty buffer carrying only the end-of-stream flag
    pub fn end_of_stream(presentation_time_us: u64) -> Self {
        Self::new(Vec::new(), presentation_time_us, BufferFlags::END_OF_STREAM)
    }
}
