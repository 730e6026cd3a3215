//! Audio codec port interface
//!
//! Modelled on a slot-based hardware codec: the caller borrows input slots,
//! queues PCM into them and drains encoded output, format changes and
//! end-of-stream from the output side.

use std::time::Duration;

use thiserror::Error;

use crate::domain::encoding::{BufferFlags, EncodedChunk, EncodedFormat};

/// Codec errors
#[derive(Debug, Clone, Error)]
pub enum CodecError {
    #[error("No encoder available for {0}")]
    Unavailable(String),

    #[error("Failed to configure encoder: {0}")]
    Configure(String),

    #[error("Encoding failed: {0}")]
    Encode(String),

    #[error("Invalid input slot {0}")]
    InvalidSlot(usize),

    #[error("Encoder used in wrong state: {0}")]
    IllegalState(&'static str),
}

/// An input slot lent by the codec
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputSlot {
    pub index: usize,
    /// Maximum number of bytes the slot accepts
    pub capacity: usize,
}

/// Result of polling the codec's output side
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputEvent {
    /// An encoded buffer (possibly empty with the end-of-stream flag)
    Chunk(EncodedChunk),
    /// The output format is now known; must be registered before chunks are muxed
    FormatChanged(EncodedFormat),
    /// Nothing available within the wait
    TryAgainLater,
}

/// Port for an audio encoder
pub trait AudioCodec {
    fn start(&mut self) -> Result<(), CodecError>;

    /// Borrow a free input slot, waiting up to `timeout`
    fn dequeue_input(&mut self, timeout: Duration) -> Result<Option<InputSlot>, CodecError>;

    /// Return a slot filled with `data` (16-bit PCM) starting at `presentation_time_us`
    fn queue_input(
        &mut self,
        index: usize,
        data: &[u8],
        presentation_time_us: u64,
        flags: BufferFlags,
    ) -> Result<(), CodecError>;

    /// Poll the output side, waiting up to `timeout`
    fn dequeue_output(&mut self, timeout: Duration) -> Result<OutputEvent, CodecError>;

    fn stop(&mut self) -> Result<(), CodecError>;
}

impl<C: AudioCodec + ?Sized> AudioCodec for Box<C> {
    fn start(&mut self) -> Result<(), CodecError> {
        self.as_mut().start()
    }

    fn dequeue_input(&mut self, timeout: Duration) -> Result<Option<InputSlot>, CodecError> {
        self.as_mut().dequeue_input(timeout)
    }

    fn queue_input(
        &mut self,
        index: usize,
        data: &[u8],
        presentation_time_us: u64,
        flags: BufferFlags,
    ) -> Result<(), CodecError> {
        self.as_mut().queue_input(index, data, presentation_time_us, flags)
    }

    fn dequeue_output(&mut self, timeout: Duration) -> Result<OutputEvent, CodecError> {
        self.as_mut().dequeue_output(timeout)
    }

    fn stop(&mut self) -> Result<(), CodecError> {
        self.as_mut().stop()
    }
}
