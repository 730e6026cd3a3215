//! PCM file sink port interface

use std::path::Path;

use thiserror::Error;

use crate::domain::recording::CaptureFormat;

/// Sink errors
#[derive(Debug, Clone, Error)]
pub enum SinkError {
    #[error("Failed to write audio file: {0}")]
    Write(String),

    #[error("Failed to create audio file: {0}")]
    Create(String),

    #[error("Failed to finalize audio file: {0}")]
    Finalize(String),
}

/// Port for a container receiving gain-processed PCM blocks verbatim
pub trait PcmSink: Send {
    /// Append one block
    fn write_pcm(&mut self, pcm: &[u8]) -> Result<(), SinkError>;

    /// Complete the file.
    ///
    /// # Returns
    /// Number of PCM bytes the file holds
    fn finish(&mut self) -> Result<u64, SinkError>;
}

/// Creates the WAV sink of a session
pub trait SinkFactory: Send + Sync {
    /// Create (or truncate) `path` and write the container header for `format`
    fn create_sink(&self, path: &Path, format: CaptureFormat) -> Result<Box<dyn PcmSink>, SinkError>;
}
