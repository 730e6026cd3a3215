//! AAC encoding infrastructure: libfdk-aac codec and M4A muxer

mod fdk_codec;
mod mp4_muxer;

use std::path::Path;

pub use fdk_codec::FdkAacCodec;
pub use mp4_muxer::Mp4Muxer;

use crate::application::ports::{CodecError, EncoderFactory, MuxerError};
use crate::domain::encoding::EncoderSettings;

/// Builds fdk-aac codecs and mp4 muxers
#[derive(Debug, Default, Clone, Copy)]
pub struct AacMp4Factory;

impl EncoderFactory for AacMp4Factory {
    type Codec = FdkAacCodec;
    type Muxer = Mp4Muxer;

    fn create_codec(&self, settings: &EncoderSettings) -> Result<FdkAacCodec, CodecError> {
        FdkAacCodec::new(settings)
    }

    fn create_muxer(&self, path: &Path) -> Result<Mp4Muxer, MuxerError> {
        Mp4Muxer::create(path)
    }
}
