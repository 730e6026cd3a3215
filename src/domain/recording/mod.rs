//! Recording value objects: formats, audio blocks, gain

pub mod block;
pub mod duration;
pub mod format;
pub mod gain;

pub use block::AudioBlock;
pub use duration::{format_clock, Duration};
pub use format::{CaptureFormat, ChannelMask, SampleFormat};
pub use gain::{apply_gain, Gain, MaxAmplitude};
