//! Immutable parameters of one recording session

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::encoding::EncoderSettings;
use crate::domain::error::ConfigurationError;
use crate::domain::recording::{CaptureFormat, Duration, Gain};

/// Which files a session produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    Wav,
    M4a,
    #[default]
    Both,
}

impl OutputMode {
    pub const fn writes_wav(&self) -> bool {
        matches!(self, Self::Wav | Self::Both)
    }

    pub const fn writes_m4a(&self) -> bool {
        matches!(self, Self::M4a | Self::Both)
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Wav => "wav",
            Self::M4a => "m4a",
            Self::Both => "both",
        }
    }
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OutputMode {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "wav" => Ok(Self::Wav),
            "m4a" => Ok(Self::M4a),
            "both" => Ok(Self::Both),
            _ => Err(ConfigurationError::UnknownValue {
                kind: "output mode",
                input: s.to_string(),
            }),
        }
    }
}

/// When AAC encoding happens relative to capture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncodeTiming {
    /// Stream blocks into the encoder while recording
    During,
    /// Encode the whole recording once capture has ended
    #[default]
    After,
}

impl EncodeTiming {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::During => "during",
            Self::After => "after",
        }
    }
}

impl fmt::Display for EncodeTiming {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EncodeTiming {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "during" | "streaming" => Ok(Self::During),
            "after" | "batch" => Ok(Self::After),
            _ => Err(ConfigurationError::UnknownValue {
                kind: "encode timing",
                input: s.to_string(),
            }),
        }
    }
}

/// Everything a recording session needs, fixed at start
#[derive(Debug, Clone, PartialEq)]
pub struct SessionParameters {
    pub format: CaptureFormat,
    pub gain: Gain,
    pub bit_rate: u32,
    pub output_dir: PathBuf,
    pub base_name: String,
    pub output_mode: OutputMode,
    pub encode_timing: EncodeTiming,
    /// Stop automatically after this much audio
    pub max_duration: Option<Duration>,
}

impl SessionParameters {
    /// AAC encoder settings for this session, if M4A output is enabled
    pub fn encoder_settings(&self) -> Result<Option<EncoderSettings>, ConfigurationError> {
        if !self.output_mode.writes_m4a() {
            return Ok(None);
        }
        EncoderSettings::new(
            self.format.sample_rate,
            self.format.channel_count(),
            self.bit_rate,
        )
        .map(Some)
    }

    pub fn wav_path(&self) -> PathBuf {
        self.output_path("wav")
    }

    pub fn m4a_path(&self) -> PathBuf {
        self.output_path("m4a")
    }

    fn output_path(&self, extension: &str) -> PathBuf {
        self.output_dir
            .join(format!("{}.{}", self.base_name, extension))
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

/// Default base name for a new recording: the Unix time in milliseconds
pub fn timestamp_base_name() -> String {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
        .to_string()
}
