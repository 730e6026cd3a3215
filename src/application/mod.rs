//! Application layer - Use cases and port interfaces
//!
//! Contains the capture and encode pipelines and the trait definitions
//! for the device, codec, muxer and file collaborators.

pub mod batch_encode;
pub mod capture_loop;
pub mod encode_file;
pub mod encode_pipeline;
pub mod ports;
pub mod record;
pub mod streaming_encode;

#[cfg(test)]
pub(crate) mod fakes;

// Re-export use cases
pub use batch_encode::BatchEncoder;
pub use capture_loop::{CaptureError, CaptureLoop, CaptureOutcome, EncodeFeed};
pub use encode_file::{encode_wav_file, m4a_path_for};
pub use encode_pipeline::{EncodeCallbacks, EncodeError, EncodeSummary, EncodeWorker, POLL_WAIT};
pub use record::{ensure_output_dir, RecordError, RecordOutput, RecordSession, RecordingHandle};
pub use streaming_encode::{CodecEvent, StreamingEncoder, StreamingHandle};
