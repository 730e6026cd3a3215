//! Domain error types

use std::path::PathBuf;

use thiserror::Error;

/// Error when parsing a duration string
#[derive(Debug, Clone, Error)]
#[error("Invalid duration format: \"{input}\". Expected format: <number>h, <number>m, <number>s or a combination (e.g., 30s, 1m, 2m30s, 1h)")]
pub struct DurationParseError {
    pub input: String,
}

/// Capture or encode parameters that cannot be used.
///
/// Always raised before any device, file or codec is acquired.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("Unsupported channel configuration: {0} channels (expected mono or stereo)")]
    UnsupportedChannelMask(u16),

    #[error("Unsupported encoding: {0}-bit (expected 8, 16 or 32)")]
    UnsupportedEncoding(u16),

    #[error("Device does not support {sample_rate} Hz, {channels} channel(s), {bits_per_sample}-bit")]
    UnsupportedParameters {
        sample_rate: u32,
        channels: u16,
        bits_per_sample: u16,
    },

    #[error("Invalid gain {0}: must be between 0 and {max}", max = crate::domain::recording::Gain::MAX)]
    InvalidGain(u32),

    #[error("Invalid sample rate: {0} Hz")]
    InvalidSampleRate(u32),

    #[error("Invalid bit rate: {0} bps")]
    InvalidBitRate(u32),

    #[error("Unknown {kind}: \"{input}\"")]
    UnknownValue { kind: &'static str, input: String },
}

/// Output directory could not be prepared
#[derive(Debug, Clone, Error)]
pub enum FilesystemError {
    #[error("Failed to create directory {path}: {message}")]
    CreateDir { path: PathBuf, message: String },

    #[error("{path} exists and is not a directory")]
    NotADirectory { path: PathBuf },
}

/// Error when configuration fails
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(String),

    #[error("Failed to parse config file: {0}")]
    ParseError(String),

    #[error("Failed to write config file: {0}")]
    WriteError(String),

    #[error("Invalid config value for '{key}': {message}")]
    ValidationError { key: String, message: String },

    #[error("Config file already exists at: {0}")]
    AlreadyExists(String),
}
