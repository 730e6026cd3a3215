//! Container multiplexer port interface

use thiserror::Error;

use crate::domain::encoding::{BufferInfo, EncodedFormat};

/// Muxer errors
#[derive(Debug, Clone, Error)]
pub enum MuxerError {
    #[error("Failed to create output file: {0}")]
    Create(String),

    #[error("Unsupported track format: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to write sample: {0}")]
    Write(String),

    #[error("Failed to finalize container: {0}")]
    Finalize(String),

    #[error("Muxer used in wrong state: {0}")]
    IllegalState(&'static str),
}

/// Port for a container writer with a single audio track
pub trait Muxer {
    /// Register a track and return its index
    fn add_track(&mut self, format: &EncodedFormat) -> Result<usize, MuxerError>;

    fn start(&mut self) -> Result<(), MuxerError>;

    fn write_sample_data(
        &mut self,
        track_index: usize,
        data: &[u8],
        info: &BufferInfo,
    ) -> Result<(), MuxerError>;

    /// Finish the container. The file is complete only after this succeeds.
    fn stop(&mut self) -> Result<(), MuxerError>;
}

impl<M: Muxer + ?Sized> Muxer for Box<M> {
    fn add_track(&mut self, format: &EncodedFormat) -> Result<usize, MuxerError> {
        self.as_mut().add_track(format)
    }

    fn start(&mut self) -> Result<(), MuxerError> {
        self.as_mut().start()
    }

    fn write_sample_data(
        &mut self,
        track_index: usize,
        data: &[u8],
        info: &BufferInfo,
    ) -> Result<(), MuxerError> {
        self.as_mut().write_sample_data(track_index, data, info)
    }

    fn stop(&mut self) -> Result<(), MuxerError> {
        self.as_mut().stop()
    }
}
