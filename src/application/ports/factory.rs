//! Encoder factory port
//!
//! Codecs and muxers are built on the thread that drives them, so the
//! factory is shared across threads but its products need not be `Send`.

use std::path::Path;

use super::codec::{AudioCodec, CodecError};
use super::muxer::{Muxer, MuxerError};
use crate::domain::encoding::EncoderSettings;

/// Port for building the codec and muxer of one encode session
pub trait EncoderFactory: Send + Sync + 'static {
    type Codec: AudioCodec;
    type Muxer: Muxer;

    /// Create an AAC codec configured for `settings`.
    ///
    /// # Arguments
    /// * `settings` - Sample rate, channel count and bit rate
    fn create_codec(&self, settings: &EncoderSettings) -> Result<Self::Codec, CodecError>;

    /// Create a muxer writing an M4A container to `path`.
    ///
    /// # Arguments
    /// * `path` - Destination file, created or truncated
    fn create_muxer(&self, path: &Path) -> Result<Self::Muxer, MuxerError>;
}
