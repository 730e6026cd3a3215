//! Application configuration value object

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::domain::encoding::DEFAULT_BIT_RATE;
use crate::domain::error::ConfigurationError;
use crate::domain::recording::{CaptureFormat, ChannelMask, Duration, Gain, SampleFormat};
use crate::domain::session::{EncodeTiming, OutputMode, SessionParameters};

/// Default capture sample rate
pub const DEFAULT_SAMPLE_RATE: u32 = 44100;

/// Application configuration.
/// All fields are optional to support partial configs and merging.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub sample_rate: Option<u32>,
    pub channels: Option<String>,
    pub encoding: Option<String>,
    pub gain: Option<u32>,
    pub bit_rate: Option<u32>,
    pub output_dir: Option<String>,
    pub output_mode: Option<String>,
    pub encode_timing: Option<String>,
}

impl AppConfig {
    /// Create config with default values
    pub fn defaults() -> Self {
        Self {
            sample_rate: Some(DEFAULT_SAMPLE_RATE),
            channels: Some(ChannelMask::default().to_string()),
            encoding: Some(SampleFormat::default().to_string()),
            gain: Some(Gain::DEFAULT.value() as u32),
            bit_rate: Some(DEFAULT_BIT_RATE),
            output_dir: Some(default_output_dir().to_string_lossy().to_string()),
            output_mode: Some(OutputMode::default().to_string()),
            encode_timing: Some(EncodeTiming::default().to_string()),
        }
    }

    /// Create an empty config (all None)
    pub fn empty() -> Self {
        Self::default()
    }

    /// Merge this config with another, where other takes precedence.
    /// Only non-None values from other will override this.
    pub fn merge(self, other: Self) -> Self {
        Self {
            sample_rate: other.sample_rate.or(self.sample_rate),
            channels: other.channels.or(self.channels),
            encoding: other.encoding.or(self.encoding),
            gain: other.gain.or(self.gain),
            bit_rate: other.bit_rate.or(self.bit_rate),
            output_dir: other.output_dir.or(self.output_dir),
            output_mode: other.output_mode.or(self.output_mode),
            encode_timing: other.encode_timing.or(self.encode_timing),
        }
    }

    /// Capture format from the configured rate, channels and encoding.
    /// Unlike the `*_or_default` helpers, invalid values are errors here.
    pub fn capture_format(&self) -> Result<CaptureFormat, ConfigurationError> {
        let channels = match &self.channels {
            Some(s) => s.parse()?,
            None => ChannelMask::default(),
        };
        let encoding = match &self.encoding {
            Some(s) => s.parse()?,
            None => SampleFormat::default(),
        };
        CaptureFormat::new(
            self.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE),
            channels,
            encoding,
        )
    }

    pub fn gain(&self) -> Result<Gain, ConfigurationError> {
        self.gain.map(Gain::new).unwrap_or(Ok(Gain::DEFAULT))
    }

    pub fn output_mode(&self) -> Result<OutputMode, ConfigurationError> {
        self.output_mode
            .as_deref()
            .map(str::parse)
            .unwrap_or(Ok(OutputMode::default()))
    }

    pub fn encode_timing(&self) -> Result<EncodeTiming, ConfigurationError> {
        self.encode_timing
            .as_deref()
            .map(str::parse)
            .unwrap_or(Ok(EncodeTiming::default()))
    }

    /// Get bit rate, or 256 kbps if not set
    pub fn bit_rate_or_default(&self) -> u32 {
        self.bit_rate.unwrap_or(DEFAULT_BIT_RATE)
    }

    /// Get output directory, or the platform audio directory if not set
    pub fn output_dir_or_default(&self) -> PathBuf {
        self.output_dir
            .as_ref()
            .map(|s| expand_home(s))
            .unwrap_or_else(default_output_dir)
    }

    /// Validate everything and build the parameters of a session
    pub fn session_parameters(
        &self,
        base_name: String,
        max_duration: Option<Duration>,
    ) -> Result<SessionParameters, ConfigurationError> {
        Ok(SessionParameters {
            format: self.capture_format()?,
            gain: self.gain()?,
            bit_rate: self.bit_rate_or_default(),
            output_dir: self.output_dir_or_default(),
            base_name,
            output_mode: self.output_mode()?,
            encode_timing: self.encode_timing()?,
            max_duration,
        })
    }
}

/// `~/Music/micrec`, falling back to `./micrec`
pub fn default_output_dir() -> PathBuf {
    dirs::audio_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join("Music")))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("micrec")
}

fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|h| h.join(rest))
            .unwrap_or_else(|| PathBuf::from(path)),
        None => PathBuf::from(path),
    }
}
