//! micrec - microphone recorder with WAV and AAC/M4A output
//!
//! Reads PCM blocks from an input device, applies a linear gain, writes a
//! WAV file and feeds an AAC encoder whose frames are muxed into an M4A file,
//! either while recording (streaming) or once capture has ended (batch).
//!
//! # Architecture
//!
//! The crate follows hexagonal (ports & adapters) architecture:
//!
//! - **Domain**: Value objects (formats, gain, timestamps), session state and errors
//! - **Application**: Capture loop, encode pipelines, use cases and port traits
//! - **Infrastructure**: Adapters (cpal capture, WAV writer, fdk-aac, mp4, XDG config)
//! - **CLI**: Command-line interface, argument parsing, and signal handling

pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;
