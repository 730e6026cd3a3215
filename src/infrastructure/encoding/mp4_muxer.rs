//! M4A container adapter over the `mp4` crate
//!
//! Sample durations are derived from the gap to the next sample, so one
//! sample is held back until its successor (or `stop`) arrives.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use bytes::Bytes;
use mp4::{
    AacConfig, AudioObjectType, ChannelConfig, FourCC, MediaConfig, Mp4Config, Mp4Sample,
    Mp4Writer, SampleFreqIndex, TrackConfig, TrackType,
};
use tracing::debug;

use crate::application::ports::{Muxer, MuxerError};
use crate::domain::encoding::{BufferInfo, EncodedFormat, MIME_AUDIO_AAC};

/// Movie header timescale (milliseconds)
const MOVIE_TIMESCALE: u32 = 1000;

#[derive(Debug, Clone, Copy)]
struct Track {
    sample_rate: u32,
    frame_length: u32,
}

impl Track {
    /// Microseconds to track timescale ticks, rounded to nearest
    fn ticks(&self, us: u64) -> u64 {
        (us * self.sample_rate as u64 + 500_000) / 1_000_000
    }
}

struct Pending {
    start: u64,
    bytes: Bytes,
}

/// Writes one AAC track into an M4A file
pub struct Mp4Muxer {
    path: PathBuf,
    writer: Option<Mp4Writer<BufWriter<File>>>,
    track: Option<Track>,
    started: bool,
    pending: Option<Pending>,
    samples: u64,
}

impl Mp4Muxer {
    /// Create (or truncate) `path` and write the file type box
    pub fn create(path: &Path) -> Result<Self, MuxerError> {
        let create_error = |e: String| MuxerError::Create(format!("{}: {}", path.display(), e));
        let file = File::create(path).map_err(|e| create_error(e.to_string()))?;

        let config = Mp4Config {
            major_brand: brand("M4A ")?,
            minor_version: 512,
            compatible_brands: vec![brand("M4A ")?, brand("mp42")?, brand("isom")?],
            timescale: MOVIE_TIMESCALE,
        };
        let writer = Mp4Writer::write_start(BufWriter::new(file), &config)
            .map_err(|e| create_error(e.to_string()))?;

        Ok(Self {
            path: path.to_path_buf(),
            writer: Some(writer),
            track: None,
            started: false,
            pending: None,
            samples: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn writer(&mut self) -> Result<&mut Mp4Writer<BufWriter<File>>, MuxerError> {
        self.writer
            .as_mut()
            .ok_or(MuxerError::IllegalState("muxer already stopped"))
    }

    fn write_pending(&mut self, duration: u32) -> Result<(), MuxerError> {
        let Some(pending) = self.pending.take() else {
            return Ok(());
        };
        let sample = Mp4Sample {
            start_time: pending.start,
            duration,
            rendering_offset: 0,
            is_sync: true,
            bytes: pending.bytes,
        };
        self.writer()?
            .write_sample(1, &sample)
            .map_err(|e| MuxerError::Write(e.to_string()))?;
        self.samples += 1;
        Ok(())
    }
}

fn brand(code: &str) -> Result<FourCC, MuxerError> {
    code.parse()
        .map_err(|e: mp4::Error| MuxerError::Create(e.to_string()))
}

fn freq_index(sample_rate: u32) -> Result<SampleFreqIndex, MuxerError> {
    Ok(match sample_rate {
        96000 => SampleFreqIndex::Freq96000,
        88200 => SampleFreqIndex::Freq88200,
        64000 => SampleFreqIndex::Freq64000,
        48000 => SampleFreqIndex::Freq48000,
        44100 => SampleFreqIndex::Freq44100,
        32000 => SampleFreqIndex::Freq32000,
        24000 => SampleFreqIndex::Freq24000,
        22050 => SampleFreqIndex::Freq22050,
        16000 => SampleFreqIndex::Freq16000,
        12000 => SampleFreqIndex::Freq12000,
        11025 => SampleFreqIndex::Freq11025,
        8000 => SampleFreqIndex::Freq8000,
        7350 => SampleFreqIndex::Freq7350,
        other => {
            return Err(MuxerError::UnsupportedFormat(format!(
                "{} Hz has no AAC frequency index",
                other
            )))
        }
    })
}

fn channel_config(channels: u16) -> Result<ChannelConfig, MuxerError> {
    match channels {
        1 => Ok(ChannelConfig::Mono),
        2 => Ok(ChannelConfig::Stereo),
        n => Err(MuxerError::UnsupportedFormat(format!("{} channels", n))),
    }
}

impl Muxer for Mp4Muxer {
    fn add_track(&mut self, format: &EncodedFormat) -> Result<usize, MuxerError> {
        if self.track.is_some() || self.started {
            return Err(MuxerError::IllegalState("track already added"));
        }
        if format.mime != MIME_AUDIO_AAC {
            return Err(MuxerError::UnsupportedFormat(format.mime.clone()));
        }

        let config = TrackConfig {
            track_type: TrackType::Audio,
            timescale: format.sample_rate,
            language: "und".to_string(),
            media_conf: MediaConfig::AacConfig(AacConfig {
                bitrate: format.bit_rate,
                profile: AudioObjectType::AacLowComplexity,
                freq_index: freq_index(format.sample_rate)?,
                chan_conf: channel_config(format.channels)?,
            }),
        };
        self.writer()?
            .add_track(&config)
            .map_err(|e| MuxerError::UnsupportedFormat(e.to_string()))?;

        self.track = Some(Track {
            sample_rate: format.sample_rate,
            frame_length: format.frame_length.max(1),
        });
        debug!(%format, path = %self.path.display(), "Added AAC track");
        Ok(0)
    }

    fn start(&mut self) -> Result<(), MuxerError> {
        if self.track.is_none() {
            return Err(MuxerError::IllegalState("start before add_track"));
        }
        if self.started {
            return Err(MuxerError::IllegalState("muxer already started"));
        }
        self.started = true;
        Ok(())
    }

    fn write_sample_data(
        &mut self,
        track_index: usize,
        data: &[u8],
        info: &BufferInfo,
    ) -> Result<(), MuxerError> {
        if !self.started || self.writer.is_none() {
            return Err(MuxerError::IllegalState("muxer not started"));
        }
        let track = match (track_index, self.track) {
            (0, Some(track)) => track,
            _ => return Err(MuxerError::Write(format!("no track {}", track_index))),
        };

        let start = track.ticks(info.presentation_time_us);
        if let Some(prev) = &self.pending {
            let gap = start.saturating_sub(prev.start);
            let duration = if gap == 0 { track.frame_length as u64 } else { gap };
            self.write_pending(u32::try_from(duration).unwrap_or(u32::MAX))?;
        }
        self.pending = Some(Pending {
            start,
            bytes: Bytes::copy_from_slice(data),
        });
        Ok(())
    }

    fn stop(&mut self) -> Result<(), MuxerError> {
        if !self.started {
            return Err(MuxerError::IllegalState("stop before start"));
        }
        let frame_length = self.track.map(|t| t.frame_length).unwrap_or(1024);
        self.write_pending(frame_length)?;

        let mut writer = self
            .writer
            .take()
            .ok_or(MuxerError::IllegalState("muxer already stopped"))?;
        writer
            .write_end()
            .map_err(|e| MuxerError::Finalize(e.to_string()))?;
        writer
            .into_writer()
            .flush()
            .map_err(|e| MuxerError::Finalize(e.to_string()))?;

        debug!(samples = self.samples, path = %self.path.display(), "M4A finalized");
        Ok(())
    }
}
