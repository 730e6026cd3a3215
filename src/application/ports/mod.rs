//! Port interfaces (traits) for external systems
//!
//! These traits define the boundaries between the application
//! and infrastructure layers.

pub mod capture;
pub mod codec;
pub mod config;
pub mod factory;
pub mod muxer;
pub mod sink;

// Re-export common types
pub use capture::{CaptureBackend, CaptureDevice, DeviceError};
pub use codec::{AudioCodec, CodecError, InputSlot, OutputEvent};
pub use config::ConfigStore;
pub use factory::EncoderFactory;
pub use muxer::{Muxer, MuxerError};
pub use sink::{PcmSink, SinkError, SinkFactory};
