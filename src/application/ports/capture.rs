//! Audio capture port interfaces

use thiserror::Error;

use crate::domain::recording::CaptureFormat;

/// Capture device errors
#[derive(Debug, Clone, Error)]
pub enum DeviceError {
    #[error("No audio input device available")]
    NoDevice,

    #[error("Failed to open audio input: {0}")]
    OpenFailed(String),

    #[error("Failed to read audio input: {0}")]
    ReadFailed(String),

    #[error("Audio input stream closed unexpectedly")]
    Disconnected,
}

/// Port for the platform audio input: queries and opens capture devices
pub trait CaptureBackend: Send + Sync {
    type Device: CaptureDevice;

    /// Smallest read size in bytes the platform accepts for `format`.
    ///
    /// `None` or zero means the combination is not supported.
    fn min_buffer_size(&self, format: &CaptureFormat) -> Option<usize>;

    /// Open and start a capture device delivering `format`
    fn open(&self, format: &CaptureFormat, buffer_size: usize) -> Result<Self::Device, DeviceError>;
}

/// An open capture handle, owned exclusively by the capture loop.
///
/// The device is released when dropped.
pub trait CaptureDevice: Send {
    /// Blocking read of up to `buf.len()` bytes of interleaved PCM.
    /// Returns the number of bytes written into `buf`.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, DeviceError>;

    /// Stop delivering audio
    fn stop(&mut self) -> Result<(), DeviceError>;
}

impl<D: CaptureDevice + ?Sized> CaptureDevice for Box<D> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, DeviceError> {
        self.as_mut().read(buf)
    }

    fn stop(&mut self) -> Result<(), DeviceError> {
        self.as_mut().stop()
    }
}
