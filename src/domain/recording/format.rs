//! PCM sample format and capture format value objects

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::error::ConfigurationError;

/// Sample encoding of a PCM stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleFormat {
    /// Signed 8-bit
    Pcm8,
    /// Signed 16-bit little-endian
    #[default]
    Pcm16,
    /// 32-bit IEEE float little-endian, full scale at ±1.0
    Float,
}

impl SampleFormat {
    /// Map a bit depth to a sample format
    pub fn from_bits(bits: u16) -> Result<Self, ConfigurationError> {
        match bits {
            8 => Ok(Self::Pcm8),
            16 => Ok(Self::Pcm16),
            32 => Ok(Self::Float),
            other => Err(ConfigurationError::UnsupportedEncoding(other)),
        }
    }

    pub const fn bits_per_sample(&self) -> u16 {
        match self {
            Self::Pcm8 => 8,
            Self::Pcm16 => 16,
            Self::Float => 32,
        }
    }

    pub const fn bytes_per_sample(&self) -> usize {
        self.bits_per_sample() as usize / 8
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pcm8 => "pcm8",
            Self::Pcm16 => "pcm16",
            Self::Float => "float",
        }
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SampleFormat {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pcm8" | "8" => Ok(Self::Pcm8),
            "pcm16" | "16" => Ok(Self::Pcm16),
            "float" | "pcm32" | "32" => Ok(Self::Float),
            _ => Err(ConfigurationError::UnknownValue {
                kind: "encoding",
                input: s.to_string(),
            }),
        }
    }
}

/// Input channel layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelMask {
    #[default]
    Mono,
    Stereo,
}

impl ChannelMask {
    /// Map a channel count to a channel mask
    pub fn from_count(channels: u16) -> Result<Self, ConfigurationError> {
        match channels {
            1 => Ok(Self::Mono),
            2 => Ok(Self::Stereo),
            other => Err(ConfigurationError::UnsupportedChannelMask(other)),
        }
    }

    pub const fn count(&self) -> u16 {
        match self {
            Self::Mono => 1,
            Self::Stereo => 2,
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Mono => "mono",
            Self::Stereo => "stereo",
        }
    }
}

impl fmt::Display for ChannelMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ChannelMask {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mono" | "1" => Ok(Self::Mono),
            "stereo" | "2" => Ok(Self::Stereo),
            _ => Err(ConfigurationError::UnknownValue {
                kind: "channel configuration",
                input: s.to_string(),
            }),
        }
    }
}

/// Lowest sample rate accepted for capture
pub const MIN_SAMPLE_RATE: u32 = 8_000;

/// Highest sample rate accepted for capture
pub const MAX_SAMPLE_RATE: u32 = 192_000;

/// Format of the PCM stream read from the capture device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureFormat {
    pub sample_rate: u32,
    pub channels: ChannelMask,
    pub sample_format: SampleFormat,
}

impl CaptureFormat {
    /// Create a capture format, rejecting sample rates outside the supported range
    pub fn new(
        sample_rate: u32,
        channels: ChannelMask,
        sample_format: SampleFormat,
    ) -> Result<Self, ConfigurationError> {
        if !(MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&sample_rate) {
            return Err(ConfigurationError::InvalidSampleRate(sample_rate));
        }
        Ok(Self {
            sample_rate,
            channels,
            sample_format,
        })
    }

    pub const fn channel_count(&self) -> u16 {
        self.channels.count()
    }

    pub const fn bits_per_sample(&self) -> u16 {
        self.sample_format.bits_per_sample()
    }

    /// Bytes per interleaved frame (the WAV BlockAlign)
    pub const fn block_align(&self) -> u16 {
        self.channel_count() * (self.bits_per_sample() / 8)
    }

    /// Bytes per second of audio (the WAV ByteRate)
    pub const fn byte_rate(&self) -> u32 {
        self.sample_rate * self.block_align() as u32
    }

    pub fn unsupported(&self) -> ConfigurationError {
        ConfigurationError::UnsupportedParameters {
            sample_rate: self.sample_rate,
            channels: self.channel_count(),
            bits_per_sample: self.bits_per_sample(),
        }
    }
}

impl fmt::Display for CaptureFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} Hz, {}, {}",
            self.sample_rate, self.channels, self.sample_format
        )
    }
}
