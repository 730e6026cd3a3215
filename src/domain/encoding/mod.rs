//! Encode pipeline value objects

mod format;
mod progress;
mod state;

pub use format::{
    check_bit_rate, BufferFlags, BufferInfo, EncodedChunk, EncodedFormat, EncoderSettings,
    AAC_SAMPLE_RATES, DEFAULT_BIT_RATE, MIME_AUDIO_AAC,
};
pub use progress::ProgressTracker;
pub use state::EncodeState;
