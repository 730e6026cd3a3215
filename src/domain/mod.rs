//! Domain layer - Core recording logic
//!
//! Contains value objects, the gain processor, state machines and errors.
//! This layer has no dependencies on devices, codecs or the filesystem.

pub mod config;
pub mod encoding;
pub mod error;
pub mod recording;
pub mod session;

// Re-export common types
pub use config::AppConfig;
pub use error::*;
pub use recording::{AudioBlock, CaptureFormat, ChannelMask, Duration, Gain, MaxAmplitude, SampleFormat};
pub use session::{CaptureSession, CaptureState, EncodeTiming, OutputMode, SessionParameters};
