//! Infrastructure layer - Adapter implementations
//!
//! Contains concrete implementations of the port interfaces, integrating
//! with cpal, libfdk-aac, the mp4 writer and the filesystem.

pub mod config;
pub mod encoding;
pub mod recording;

pub use config::XdgConfigStore;
pub use encoding::{AacMp4Factory, FdkAacCodec, Mp4Muxer};
pub use recording::{create_backend, CpalCaptureBackend, WavSinkFactory, WavWriter};
