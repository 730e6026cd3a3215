//! Capture session lifecycle and parameters

mod capture_session;
mod params;

pub use capture_session::{CaptureSession, CaptureState, InvalidStateTransition};
pub use params::{timestamp_base_name, EncodeTiming, OutputMode, SessionParameters};
