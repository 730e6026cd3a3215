//! Recording infrastructure module
//!
//! Provides cross-platform capture using cpal and the WAV file sink.

mod cpal_capture;
mod wav_writer;

use std::path::Path;

pub use cpal_capture::{CpalCaptureBackend, CpalCaptureDevice};
pub use wav_writer::{header_bytes, WavError, WavWriter, WAV_HEADER_LEN};

use crate::application::ports::{PcmSink, SinkError, SinkFactory};
use crate::domain::recording::CaptureFormat;

/// Creates buffered WAV files on disk
#[derive(Debug, Default, Clone, Copy)]
pub struct WavSinkFactory;

impl SinkFactory for WavSinkFactory {
    fn create_sink(&self, path: &Path, format: CaptureFormat) -> Result<Box<dyn PcmSink>, SinkError> {
        let writer = WavWriter::create(path, format)
            .map_err(|e| SinkError::Create(format!("{}: {}", path.display(), e)))?;
        Ok(Box::new(writer))
    }
}

/// Create the capture backend for the current platform
pub fn create_backend() -> CpalCaptureBackend {
    CpalCaptureBackend::new()
}
