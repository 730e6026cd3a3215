//! Encoder-to-muxer plumbing shared by the batch and streaming drivers
//!
//! Owns one codec, one muxer and the [`EncodeState`] of a run. Drivers decide
//! when to feed input; this type handles timestamps, track registration,
//! the monotonic write guard and teardown.

use std::path::{Path, PathBuf};
use std::thread::JoinHandle;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, trace, warn};

use super::ports::{AudioCodec, CodecError, InputSlot, Muxer, MuxerError, OutputEvent};
use crate::domain::encoding::{BufferFlags, EncodeState, EncodedChunk, EncodedFormat, EncoderSettings};
use crate::domain::error::ConfigurationError;

/// Fixed wait used when polling codec slots
pub const POLL_WAIT: Duration = Duration::from_millis(10);

/// Errors from an encode run
#[derive(Debug, Clone, Error)]
pub enum EncodeError {
    #[error("Encoder error: {0}")]
    Codec(#[from] CodecError),

    #[error("Muxer error: {0}")]
    Muxer(#[from] MuxerError),

    #[error("Invalid encoder settings: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Encoded output arrived before the output format was known")]
    MissingFormat,

    #[error("Encoder input slot of {0} bytes cannot hold one PCM frame")]
    SlotTooSmall(usize),

    #[error("Failed to read input audio: {0}")]
    Input(String),

    #[error("Cannot write output: {0}")]
    Output(String),

    #[error("Failed to start encoder worker: {0}")]
    Spawn(String),

    #[error("Encoder worker stopped unexpectedly")]
    WorkerLost,
}

/// Result of a completed encode run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeSummary {
    /// Container that was written
    pub path: PathBuf,
    /// Encoded access units written to the container
    pub samples_written: u64,
    /// Duration of the PCM fed to the encoder, in microseconds
    pub duration_us: u64,
}

/// Notifications from an encode run
#[derive(Default)]
#[allow(clippy::type_complexity)]
pub struct EncodeCallbacks {
    /// Called with a percentage each time it strictly increases (batch only)
    pub on_progress: Option<Box<dyn FnMut(u8) + Send>>,
    /// Called once when the container has been finalized
    pub on_finished: Option<Box<dyn FnOnce(&EncodeSummary) + Send>>,
    /// Called once when the run aborts
    pub on_error: Option<Box<dyn FnOnce(&EncodeError) + Send>>,
}

impl EncodeCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_progress(mut self, f: impl FnMut(u8) + Send + 'static) -> Self {
        self.on_progress = Some(Box::new(f));
        self
    }

    pub fn with_finished(mut self, f: impl FnOnce(&EncodeSummary) + Send + 'static) -> Self {
        self.on_finished = Some(Box::new(f));
        self
    }

    pub fn with_error(mut self, f: impl FnOnce(&EncodeError) + Send + 'static) -> Self {
        self.on_error = Some(Box::new(f));
        self
    }

    pub(crate) fn progress(&mut self, percent: u8) {
        if let Some(cb) = self.on_progress.as_mut() {
            cb(percent);
        }
    }

    /// Deliver the outcome of a run to `on_finished` or `on_error`
    pub(crate) fn report(&mut self, result: &Result<EncodeSummary, EncodeError>) {
        match result {
            Ok(summary) => {
                if let Some(cb) = self.on_finished.take() {
                    cb(summary);
                }
            }
            Err(e) => {
                if let Some(cb) = self.on_error.take() {
                    cb(e);
                }
            }
        }
    }
}

/// Join handle of an encoder thread
pub struct EncodeWorker {
    handle: JoinHandle<Result<EncodeSummary, EncodeError>>,
}

impl EncodeWorker {
    pub(crate) fn spawn<F>(name: &str, f: F) -> Result<Self, EncodeError>
    where
        F: FnOnce() -> Result<EncodeSummary, EncodeError> + Send + 'static,
    {
        let handle = std::thread::Builder::new()
            .name(name.to_string())
            .spawn(f)
            .map_err(|e| EncodeError::Spawn(e.to_string()))?;
        Ok(Self { handle })
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Block until the worker ends
    pub fn wait(self) -> Result<EncodeSummary, EncodeError> {
        self.handle.join().map_err(|_| EncodeError::WorkerLost)?
    }
}

/// What happened to one output buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OutputStatus {
    /// Written to the container at this timestamp
    Written(u64),
    /// Codec config, empty, or not later than the last written buffer
    Skipped,
    /// The codec has emitted its last buffer
    EndOfStream,
}

/// Bytes of `available` that fit into a slot of `capacity`, in whole frames
pub(crate) fn whole_frames(available: usize, capacity: usize, frame_bytes: usize) -> usize {
    let n = available.min(capacity);
    n - n % frame_bytes.max(1)
}

pub(crate) struct EncoderPipeline<C: AudioCodec, M: Muxer> {
    codec: C,
    muxer: M,
    state: EncodeState,
    muxer_started: bool,
    path: PathBuf,
}

impl<C: AudioCodec, M: Muxer> EncoderPipeline<C, M> {
    pub(crate) fn new(codec: C, muxer: M, settings: &EncoderSettings, path: &Path) -> Self {
        Self {
            codec,
            muxer,
            state: EncodeState::new(settings.sample_rate, settings.channels),
            muxer_started: false,
            path: path.to_path_buf(),
        }
    }

    pub(crate) fn start(&mut self) -> Result<(), EncodeError> {
        self.codec.start()?;
        debug!(path = %self.path.display(), "Encoder started");
        Ok(())
    }

    pub(crate) fn state(&self) -> &EncodeState {
        &self.state
    }

    pub(crate) fn frame_bytes(&self) -> usize {
        self.state.frame_bytes()
    }

    pub(crate) fn dequeue_input(&mut self, timeout: Duration) -> Result<Option<InputSlot>, CodecError> {
        self.codec.dequeue_input(timeout)
    }

    pub(crate) fn dequeue_output(&mut self, timeout: Duration) -> Result<OutputEvent, CodecError> {
        self.codec.dequeue_output(timeout)
    }

    /// Fill `slot` with `pcm` and advance the input timestamp
    pub(crate) fn queue_pcm(&mut self, slot: InputSlot, pcm: &[u8]) -> Result<(), EncodeError> {
        let pts = self.state.advance(pcm.len());
        self.codec
            .queue_input(slot.index, pcm, pts, BufferFlags::NONE)?;
        trace!(bytes = pcm.len(), pts, "Queued PCM");
        Ok(())
    }

    /// Return `slot` empty, keeping the codec fed while capture continues
    pub(crate) fn queue_keep_alive(&mut self, slot: InputSlot) -> Result<(), EncodeError> {
        let pts = self.state.presentation_time_us();
        self.codec
            .queue_input(slot.index, &[], pts, BufferFlags::NONE)?;
        Ok(())
    }

    /// Return `slot` empty with the end-of-stream flag
    pub(crate) fn queue_end_of_stream(&mut self, slot: InputSlot) -> Result<(), EncodeError> {
        let pts = self.state.presentation_time_us();
        self.codec
            .queue_input(slot.index, &[], pts, BufferFlags::END_OF_STREAM)?;
        self.state.input_end_of_stream = true;
        debug!(pts, "Queued end of stream");
        Ok(())
    }

    /// Register the track and start muxing
    pub(crate) fn on_format_changed(&mut self, format: &EncodedFormat) -> Result<(), EncodeError> {
        if self.muxer_started {
            warn!(%format, "Output format changed after muxing started, ignoring");
            return Ok(());
        }
        let track = self.muxer.add_track(format)?;
        self.state.set_track_index(track);
        self.muxer.start()?;
        self.muxer_started = true;
        debug!(%format, track, "Muxer started");
        Ok(())
    }

    /// Write an output buffer under the monotonic timestamp guard
    pub(crate) fn on_output(&mut self, chunk: EncodedChunk) -> Result<OutputStatus, EncodeError> {
        let info = chunk.info;
        let mut status = OutputStatus::Skipped;

        if !info.is_codec_config() && !chunk.data.is_empty() {
            let track = self.state.track_index().ok_or(EncodeError::MissingFormat)?;
            let pts = info.presentation_time_us;
            if self.state.should_write(pts) {
                self.muxer.write_sample_data(track, &chunk.data, &info)?;
                self.state.mark_written(pts);
                status = OutputStatus::Written(pts);
            } else {
                trace!(pts, last = ?self.state.last_written_us(), "Dropping out-of-order output");
            }
        }

        if info.is_end_of_stream() {
            self.state.output_end_of_stream = true;
            debug!(samples = self.state.samples_written(), "Encoder reached end of stream");
            return Ok(OutputStatus::EndOfStream);
        }
        Ok(status)
    }

    /// Stop muxer and codec, completing the container
    pub(crate) fn finish(mut self) -> Result<EncodeSummary, EncodeError> {
        if self.muxer_started {
            self.muxer.stop()?;
        }
        self.codec.stop()?;
        Ok(EncodeSummary {
            path: self.path,
            samples_written: self.state.samples_written(),
            duration_us: self.state.presentation_time_us(),
        })
    }
}
