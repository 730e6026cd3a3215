//! Encode an existing WAV recording to M4A

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use super::batch_encode::BatchEncoder;
use super::encode_pipeline::{EncodeCallbacks, EncodeError, EncodeSummary};
use super::ports::EncoderFactory;
use super::record::ensure_output_dir;
use crate::domain::encoding::EncoderSettings;
use crate::domain::recording::AudioBlock;

/// Batch-encode the WAV file at `input` to `<out_dir>/<stem>.m4a`.
///
/// 8-bit, 16-bit and 32-bit float inputs are accepted; the encoder is fed
/// 16-bit PCM.
pub fn encode_wav_file<F: EncoderFactory>(
    factory: Arc<F>,
    input: &Path,
    out_dir: &Path,
    bit_rate: u32,
    callbacks: EncodeCallbacks,
) -> Result<EncodeSummary, EncodeError> {
    let (settings, pcm) = read_wav(input, bit_rate)?;
    ensure_output_dir(out_dir).map_err(|e| EncodeError::Output(e.to_string()))?;
    let output = m4a_path_for(input, out_dir)?;
    debug!(
        input = %input.display(),
        output = %output.display(),
        bytes = pcm.len(),
        "Encoding WAV file"
    );

    BatchEncoder::new(factory, settings, output)
        .spawn(pcm, callbacks)?
        .wait()
}

/// Destination of the encoded copy of `input`
pub fn m4a_path_for(input: &Path, out_dir: &Path) -> Result<PathBuf, EncodeError> {
    let stem = input
        .file_stem()
        .ok_or_else(|| EncodeError::Input(format!("{} has no file name", input.display())))?;
    Ok(out_dir.join(stem).with_extension("m4a"))
}

fn read_wav(path: &Path, bit_rate: u32) -> Result<(EncoderSettings, Vec<u8>), EncodeError> {
    let input_error = |e: hound::Error| EncodeError::Input(format!("{}: {}", path.display(), e));

    let mut reader = hound::WavReader::open(path).map_err(input_error)?;
    let spec = reader.spec();
    let settings = EncoderSettings::new(spec.sample_rate, spec.channels, bit_rate)?;

    let pcm = match (spec.sample_format, spec.bits_per_sample) {
        (hound::SampleFormat::Int, 16) => reader
            .samples::<i16>()
            .collect::<Result<Vec<_>, _>>()
            .map_err(input_error)?
            .into_iter()
            .flat_map(i16::to_le_bytes)
            .collect(),
        (hound::SampleFormat::Int, 8) => {
            let samples = reader
                .samples::<i8>()
                .collect::<Result<Vec<_>, _>>()
                .map_err(input_error)?;
            AudioBlock::from_i8(&samples, spec.channels).into_pcm16()
        }
        (hound::SampleFormat::Float, 32) => {
            let samples = reader
                .samples::<f32>()
                .collect::<Result<Vec<_>, _>>()
                .map_err(input_error)?;
            AudioBlock::from_f32(&samples, spec.channels).into_pcm16()
        }
        (format, bits) => {
            return Err(EncodeError::Input(format!(
                "{}: unsupported sample format {:?} {}-bit",
                path.display(),
                format,
                bits
            )))
        }
    };
    Ok((settings, pcm))
}
