//! Streaming encode: AAC-encode PCM while it is being captured
//!
//! A single actor thread owns the PCM buffer, the codec and the muxer. The
//! capture loop only sends messages through a [`StreamingHandle`]; codec
//! readiness is turned into [`CodecEvent`]s handled on the same thread, so
//! appends and drains never race.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use tracing::{debug, error, info, warn};

use super::encode_pipeline::{
    whole_frames, EncodeCallbacks, EncodeError, EncodeSummary, EncodeWorker, EncoderPipeline,
    POLL_WAIT,
};
use super::ports::{AudioCodec, EncoderFactory, InputSlot, Muxer, OutputEvent};
use crate::domain::encoding::{EncodedChunk, EncodedFormat, EncoderSettings};

enum Message {
    Append(Vec<u8>),
    EndOfInput,
}

/// Sending side of a streaming encoder. Dropping every handle ends the input.
#[derive(Debug, Clone)]
pub struct StreamingHandle {
    tx: Sender<Message>,
}

impl StreamingHandle {
    /// Queue 16-bit PCM for encoding. Returns `false` once the encoder has stopped.
    pub fn append(&self, pcm: Vec<u8>) -> bool {
        self.tx.send(Message::Append(pcm)).is_ok()
    }

    /// Signal that capture has ended; buffered PCM is still drained
    pub fn end_of_input(&self) {
        let _ = self.tx.send(Message::EndOfInput);
    }

    /// Handle whose encoder has already gone away
    #[cfg(test)]
    pub(crate) fn disconnected() -> Self {
        let (tx, _) = crossbeam_channel::unbounded();
        Self { tx }
    }
}

impl std::fmt::Debug for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Append(pcm) => write!(f, "Append({} bytes)", pcm.len()),
            Self::EndOfInput => write!(f, "EndOfInput"),
        }
    }
}

/// Codec readiness, dispatched to one handler
#[derive(Debug)]
pub enum CodecEvent {
    InputAvailable(InputSlot),
    OutputAvailable(EncodedChunk),
    FormatChanged(EncodedFormat),
    Error(EncodeError),
}

/// Starts streaming encode sessions
pub struct StreamingEncoder<F: EncoderFactory> {
    factory: Arc<F>,
    settings: EncoderSettings,
    path: PathBuf,
}

impl<F: EncoderFactory> StreamingEncoder<F> {
    pub fn new(factory: Arc<F>, settings: EncoderSettings, path: impl Into<PathBuf>) -> Self {
        Self {
            factory,
            settings,
            path: path.into(),
        }
    }

    /// Start the actor thread.
    ///
    /// # Returns
    /// The handle the capture loop appends to, and the worker to join
    pub fn spawn(
        self,
        callbacks: EncodeCallbacks,
    ) -> Result<(StreamingHandle, EncodeWorker), EncodeError> {
        let (tx, rx) = crossbeam_channel::unbounded();
        let worker = EncodeWorker::spawn("micrec-stream-encode", move || {
            let mut callbacks = callbacks;
            let result = self.run(&rx);
            match &result {
                Ok(summary) => info!(
                    path = %summary.path.display(),
                    samples = summary.samples_written,
                    "Streaming encode finished"
                ),
                Err(e) => error!(path = %self.path.display(), error = %e, "Streaming encode failed"),
            }
            callbacks.report(&result);
            result
        })?;
        Ok((StreamingHandle { tx }, worker))
    }

    fn run(&self, rx: &Receiver<Message>) -> Result<EncodeSummary, EncodeError> {
        let codec = self.factory.create_codec(&self.settings)?;
        let muxer = self.factory.create_muxer(&self.path)?;
        let mut actor = StreamingActor::new(EncoderPipeline::new(
            codec,
            muxer,
            &self.settings,
            &self.path,
        ));
        actor.pipeline.start()?;
        actor.run(rx)?;
        actor.pipeline.finish()
    }
}

struct StreamingActor<C: AudioCodec, M: Muxer> {
    pipeline: EncoderPipeline<C, M>,
    buffer: BytesMut,
    capture_ended: bool,
}

impl<C: AudioCodec, M: Muxer> StreamingActor<C, M> {
    fn new(pipeline: EncoderPipeline<C, M>) -> Self {
        Self {
            pipeline,
            buffer: BytesMut::new(),
            capture_ended: false,
        }
    }

    fn run(&mut self, rx: &Receiver<Message>) -> Result<(), EncodeError> {
        while !self.pipeline.state().output_end_of_stream {
            match rx.recv_timeout(POLL_WAIT) {
                Ok(message) => self.on_message(message),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => self.on_message(Message::EndOfInput),
            }
            while let Ok(message) = rx.try_recv() {
                self.on_message(message);
            }
            self.pump()?;
        }
        Ok(())
    }

    fn on_message(&mut self, message: Message) {
        match message {
            Message::Append(pcm) if self.capture_ended => {
                warn!(bytes = pcm.len(), "PCM appended after end of input, dropping");
            }
            Message::Append(pcm) => self.buffer.extend_from_slice(&pcm),
            Message::EndOfInput => {
                if !self.capture_ended {
                    debug!(pending = self.buffer.len(), "Capture ended");
                }
                self.capture_ended = true;
            }
        }
    }

    /// Poll the codec once on each side and dispatch what is ready
    fn pump(&mut self) -> Result<(), EncodeError> {
        while !self.pipeline.state().input_end_of_stream {
            let event = match self.pipeline.dequeue_input(Duration::ZERO) {
                Ok(Some(slot)) => CodecEvent::InputAvailable(slot),
                Ok(None) => break,
                Err(e) => CodecEvent::Error(e.into()),
            };
            let idle = self.buffer.len() < self.pipeline.frame_bytes();
            self.handle_event(event)?;
            if idle {
                break;
            }
        }

        while !self.pipeline.state().output_end_of_stream {
            let event = match self.pipeline.dequeue_output(Duration::ZERO) {
                Ok(OutputEvent::TryAgainLater) => break,
                Ok(OutputEvent::Chunk(chunk)) => CodecEvent::OutputAvailable(chunk),
                Ok(OutputEvent::FormatChanged(format)) => CodecEvent::FormatChanged(format),
                Err(e) => CodecEvent::Error(e.into()),
            };
            self.handle_event(event)?;
        }
        Ok(())
    }

    fn handle_event(&mut self, event: CodecEvent) -> Result<(), EncodeError> {
        match event {
            CodecEvent::InputAvailable(slot) => {
                let frame_bytes = self.pipeline.frame_bytes();
                let n = whole_frames(self.buffer.len(), slot.capacity, frame_bytes);
                if n > 0 {
                    let pcm = self.buffer.split_to(n);
                    self.pipeline.queue_pcm(slot, &pcm)?;
                } else if self.buffer.len() >= frame_bytes {
                    return Err(EncodeError::SlotTooSmall(slot.capacity));
                } else if self.capture_ended {
                    if !self.buffer.is_empty() {
                        warn!(bytes = self.buffer.len(), "Dropping partial PCM frame");
                        self.buffer.clear();
                    }
                    self.pipeline.queue_end_of_stream(slot)?;
                } else {
                    self.pipeline.queue_keep_alive(slot)?;
                }
            }
            CodecEvent::OutputAvailable(chunk) => {
                self.pipeline.on_output(chunk)?;
            }
            CodecEvent::FormatChanged(format) => self.pipeline.on_format_changed(&format)?,
            CodecEvent::Error(e) => return Err(e),
        }
        Ok(())
    }
}
