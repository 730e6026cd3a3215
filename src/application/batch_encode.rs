//! Batch encode: AAC-encode a complete PCM recording on a worker thread

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{error, info};

use super::encode_pipeline::{
    whole_frames, EncodeCallbacks, EncodeError, EncodeSummary, EncodeWorker, EncoderPipeline,
    OutputStatus, POLL_WAIT,
};
use super::ports::{EncoderFactory, OutputEvent};
use crate::domain::encoding::{EncoderSettings, ProgressTracker};

/// Encodes a finished PCM buffer into an M4A file
pub struct BatchEncoder<F: EncoderFactory> {
    factory: Arc<F>,
    settings: EncoderSettings,
    path: PathBuf,
}

impl<F: EncoderFactory> BatchEncoder<F> {
    pub fn new(factory: Arc<F>, settings: EncoderSettings, path: impl Into<PathBuf>) -> Self {
        Self {
            factory,
            settings,
            path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Encode `pcm` (interleaved 16-bit LE) on the current thread.
    ///
    /// Progress is published only when it strictly increases; 100% and the
    /// finished notification follow the encoder's end of stream.
    pub fn run(
        &self,
        pcm: &[u8],
        callbacks: &mut EncodeCallbacks,
    ) -> Result<EncodeSummary, EncodeError> {
        let result = self.encode(pcm, callbacks);
        match &result {
            Ok(summary) => info!(
                path = %summary.path.display(),
                samples = summary.samples_written,
                "Batch encode finished"
            ),
            Err(e) => error!(path = %self.path.display(), error = %e, "Batch encode failed"),
        }
        callbacks.report(&result);
        result
    }

    /// Run the encode on a dedicated worker thread
    pub fn spawn(
        self,
        pcm: Vec<u8>,
        mut callbacks: EncodeCallbacks,
    ) -> Result<EncodeWorker, EncodeError> {
        EncodeWorker::spawn("micrec-encode", move || self.run(&pcm, &mut callbacks))
    }

    fn encode(
        &self,
        pcm: &[u8],
        callbacks: &mut EncodeCallbacks,
    ) -> Result<EncodeSummary, EncodeError> {
        let codec = self.factory.create_codec(&self.settings)?;
        let muxer = self.factory.create_muxer(&self.path)?;
        let mut pipeline = EncoderPipeline::new(codec, muxer, &self.settings, &self.path);

        let frame_bytes = pipeline.frame_bytes();
        let pcm = &pcm[..pcm.len() - pcm.len() % frame_bytes];
        let mut progress = ProgressTracker::new(pipeline.state().duration_us_of(pcm.len()));
        let mut offset = 0;

        pipeline.start()?;

        while !pipeline.state().output_end_of_stream {
            if !pipeline.state().input_end_of_stream {
                if let Some(slot) = pipeline.dequeue_input(POLL_WAIT)? {
                    let remaining = pcm.len() - offset;
                    let n = whole_frames(remaining, slot.capacity, frame_bytes);
                    if n > 0 {
                        pipeline.queue_pcm(slot, &pcm[offset..offset + n])?;
                        offset += n;
                    } else if remaining == 0 {
                        pipeline.queue_end_of_stream(slot)?;
                    } else {
                        return Err(EncodeError::SlotTooSmall(slot.capacity));
                    }
                }
            }

            loop {
                match pipeline.dequeue_output(POLL_WAIT)? {
                    OutputEvent::TryAgainLater => break,
                    OutputEvent::FormatChanged(format) => pipeline.on_format_changed(&format)?,
                    OutputEvent::Chunk(chunk) => match pipeline.on_output(chunk)? {
                        OutputStatus::Written(pts) => {
                            if let Some(percent) = progress.update(pts) {
                                callbacks.progress(percent);
                            }
                        }
                        OutputStatus::Skipped => {}
                        OutputStatus::EndOfStream => break,
                    },
                }
            }
        }

        let summary = pipeline.finish()?;
        if let Some(percent) = progress.complete() {
            callbacks.progress(percent);
        }
        Ok(summary)
    }
}
