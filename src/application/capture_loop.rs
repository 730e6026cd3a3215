//! Capture loop: device → gain → {WAV sink, encode feed}
//!
//! Runs on its own thread and owns the capture device exclusively. The stop
//! flag is checked at the top of every iteration.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use super::ports::{CaptureDevice, DeviceError, PcmSink, SinkError};
use super::streaming_encode::StreamingHandle;
use crate::domain::recording::{apply_gain, AudioBlock, CaptureFormat, Duration, Gain, MaxAmplitude};
use crate::domain::session::{CaptureSession, InvalidStateTransition};

/// Where captured PCM goes for AAC encoding
#[derive(Debug, Default)]
pub enum EncodeFeed {
    /// No M4A output
    #[default]
    Disabled,
    /// Accumulate 16-bit PCM for a batch encode after capture
    Batch(Vec<u8>),
    /// Append each block to a running streaming encoder
    Streaming(StreamingHandle),
}

impl EncodeFeed {
    fn push(&mut self, block: AudioBlock) {
        match self {
            Self::Disabled => {}
            Self::Batch(pcm) => pcm.extend_from_slice(&block.into_pcm16()),
            Self::Streaming(handle) => {
                if !handle.append(block.into_pcm16()) {
                    warn!("Streaming encoder is gone, no more PCM will be encoded");
                    *self = Self::Disabled;
                }
            }
        }
    }

    /// Signal end of input; returns the accumulated batch PCM
    fn finish(self) -> Vec<u8> {
        match self {
            Self::Disabled => Vec::new(),
            Self::Batch(pcm) => pcm,
            Self::Streaming(handle) => {
                handle.end_of_input();
                Vec::new()
            }
        }
    }
}

/// What a capture run produced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptureOutcome {
    /// 16-bit PCM kept for a batch encode (empty otherwise)
    pub pcm: Vec<u8>,
    /// Raw bytes read from the device
    pub bytes_captured: u64,
    /// Interleaved frames read from the device
    pub frames_captured: u64,
    /// Data bytes in the finalized WAV file, if one was written
    pub wav_bytes: Option<u64>,
}

/// Capture loop errors
#[derive(Debug, Error)]
pub enum CaptureError {
    /// The device failed mid-recording. Everything captured up to the
    /// failure has been finalized and is returned in `partial`.
    #[error("Capture halted: {source}")]
    Device {
        source: DeviceError,
        partial: Box<CaptureOutcome>,
    },

    /// The WAV sink failed. Capture halted; the block that failed to write
    /// still reached the encode feed and is counted in `partial`.
    #[error("WAV output failed: {source}")]
    Sink {
        source: SinkError,
        partial: Box<CaptureOutcome>,
    },

    #[error(transparent)]
    State(#[from] InvalidStateTransition),
}

/// One capture run over an open device
pub struct CaptureLoop<D: CaptureDevice> {
    device: D,
    format: CaptureFormat,
    gain: Gain,
    block_size: usize,
    peak: MaxAmplitude,
    stop: Arc<AtomicBool>,
    wav: Option<Box<dyn PcmSink>>,
    feed: EncodeFeed,
    frame_budget: Option<u64>,
}

impl<D: CaptureDevice> CaptureLoop<D> {
    /// # Arguments
    /// * `block_size` - Bytes per device read (the platform minimum buffer)
    pub fn new(
        device: D,
        format: CaptureFormat,
        gain: Gain,
        block_size: usize,
        peak: MaxAmplitude,
        stop: Arc<AtomicBool>,
    ) -> Self {
        Self {
            device,
            format,
            gain,
            block_size,
            peak,
            stop,
            wav: None,
            feed: EncodeFeed::Disabled,
            frame_budget: None,
        }
    }

    pub fn with_wav(mut self, sink: Box<dyn PcmSink>) -> Self {
        self.wav = Some(sink);
        self
    }

    pub fn with_feed(mut self, feed: EncodeFeed) -> Self {
        self.feed = feed;
        self
    }

    /// Stop on its own after `max` of audio
    pub fn with_max_duration(mut self, max: Option<Duration>) -> Self {
        self.frame_budget = max.map(|d| d.frames_at(self.format.sample_rate));
        self
    }

    /// Capture until stopped, the budget is used up, or the device fails
    pub fn run(self) -> Result<CaptureOutcome, CaptureError> {
        let Self {
            mut device,
            format,
            gain,
            block_size,
            peak,
            stop,
            mut wav,
            mut feed,
            frame_budget,
        } = self;

        let mut session = CaptureSession::new();
        session.start()?;
        debug!(%format, %gain, block_size, "Capture started");

        let frame_bytes = format.block_align() as usize;
        let block_size = block_size.max(frame_bytes);
        let mut outcome = CaptureOutcome::default();
        let mut failure: Option<DeviceError> = None;
        let mut sink_failure: Option<SinkError> = None;

        while !stop.load(Ordering::SeqCst) {
            let want = match frame_budget {
                Some(budget) if outcome.frames_captured >= budget => break,
                Some(budget) => {
                    let left = (budget - outcome.frames_captured) as usize;
                    block_size.min(left.saturating_mul(frame_bytes))
                }
                None => block_size,
            };

            let mut block =
                AudioBlock::zeroed(want, format.sample_format, format.channel_count());
            let n = match device.read(block.as_bytes_mut()) {
                Ok(n) => n,
                Err(e) => {
                    warn!(error = %e, "Device read failed, halting capture");
                    failure = Some(e);
                    break;
                }
            };
            if n == 0 {
                continue;
            }
            block.truncate(n);

            apply_gain(&mut block, gain, &peak);

            if let Some(sink) = wav.as_mut() {
                if let Err(e) = sink.write_pcm(block.as_bytes()) {
                    warn!(error = %e, "WAV write failed, halting capture");
                    sink_failure = Some(e);
                }
            }

            outcome.bytes_captured += n as u64;
            outcome.frames_captured += block.frames() as u64;
            feed.push(block);
            if sink_failure.is_some() {
                break;
            }
        }

        session.request_stop()?;
        if let Err(e) = device.stop() {
            warn!(error = %e, "Failed to stop capture device");
        }
        drop(device);

        if let Some(mut sink) = wav {
            match sink.finish() {
                Ok(bytes) => outcome.wav_bytes = Some(bytes),
                Err(e) => {
                    warn!(error = %e, "Failed to finalize WAV file");
                    sink_failure.get_or_insert(e);
                }
            }
        }
        outcome.pcm = feed.finish();
        session.close()?;

        if let Some(source) = failure {
            return Err(CaptureError::Device {
                source,
                partial: Box::new(outcome),
            });
        }
        if let Some(source) = sink_failure {
            return Err(CaptureError::Sink {
                source,
                partial: Box::new(outcome),
            });
        }

        info!(
            bytes = outcome.bytes_captured,
            frames = outcome.frames_captured,
            "Capture finished"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::fakes::FakeDevice;
    use crate::domain::recording::{ChannelMask, SampleFormat};
    use std::sync::Mutex;

    fn mono16() -> CaptureFormat {
        CaptureFormat::new(8000, ChannelMask::Mono, SampleFormat::Pcm16).unwrap()
    }

    #[derive(Clone, Default)]
    struct MemorySink {
        data: Arc<Mutex<Vec<u8>>>,
        finished: Arc<AtomicBool>,
    }

    impl PcmSink for MemorySink {
        fn write_pcm(&mut self, pcm: &[u8]) -> Result<(), SinkError> {
            self.data.lock().unwrap().extend_from_slice(pcm);
            Ok(())
        }

        fn finish(&mut self) -> Result<u64, SinkError> {
            self.finished.store(true, Ordering::SeqCst);
            Ok(self.data.lock().unwrap().len() as u64)
        }
    }

    /// Accepts `ok_writes` blocks, then reports a full disk
    struct FailingSink {
        ok_writes: usize,
        written: u64,
    }

    impl PcmSink for FailingSink {
        fn write_pcm(&mut self, pcm: &[u8]) -> Result<(), SinkError> {
            if self.ok_writes == 0 {
                return Err(SinkError::Write("disk full".into()));
            }
            self.ok_writes -= 1;
            self.written += pcm.len() as u64;
            Ok(())
        }

        fn finish(&mut self) -> Result<u64, SinkError> {
            Ok(self.written)
        }
    }

    fn bytes_of(samples: &[i16]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    #[test]
    fn max_duration_bounds_the_capture() {
        let device = FakeDevice::constant(10);
        let stopped = Arc::clone(&device.stopped);
        let sink = MemorySink::default();
        let outcome = CaptureLoop::new(
            device,
            mono16(),
            Gain::new(20).unwrap(),
            300,
            MaxAmplitude::new(),
            Arc::new(AtomicBool::new(false)),
        )
        .with_wav(Box::new(sink.clone()))
        .with_feed(EncodeFeed::Batch(Vec::new()))
        .with_max_duration(Some(Duration::from_millis(250)))
        .run()
        .unwrap();

        assert_eq!(outcome.frames_captured, 2000);
        assert_eq!(outcome.bytes_captured, 4000);
        assert_eq!(outcome.wav_bytes, Some(4000));
        assert_eq!(outcome.pcm.len(), 4000);
        assert!(stopped.load(Ordering::SeqCst));
        assert!(sink.finished.load(Ordering::SeqCst));
    }

    #[test]
    fn gain_is_applied_before_fan_out() {
        let device = FakeDevice::new(vec![Ok(bytes_of(&[100, -100, 2000]))], None);
        let sink = MemorySink::default();
        let peak = MaxAmplitude::new();
        let err = CaptureLoop::new(
            device,
            mono16(),
            Gain::new(20).unwrap(),
            64,
            peak.clone(),
            Arc::new(AtomicBool::new(false)),
        )
        .with_wav(Box::new(sink.clone()))
        .with_feed(EncodeFeed::Batch(Vec::new()))
        .run()
        .unwrap_err();

        let expected = bytes_of(&[2000, -2000, i16::MAX]);
        assert_eq!(*sink.data.lock().unwrap(), expected);
        assert_eq!(peak.get(), 2000);
        match err {
            CaptureError::Device { source, partial } => {
                assert!(matches!(source, DeviceError::Disconnected));
                assert_eq!(partial.pcm, expected);
                assert_eq!(partial.wav_bytes, Some(6));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(sink.finished.load(Ordering::SeqCst));
    }

    #[test]
    fn stop_flag_checked_before_first_read() {
        let device = FakeDevice::constant(1);
        let reads = Arc::clone(&device.reads);
        let outcome = CaptureLoop::new(
            device,
            mono16(),
            Gain::default(),
            64,
            MaxAmplitude::new(),
            Arc::new(AtomicBool::new(true)),
        )
        .run()
        .unwrap();
        assert_eq!(outcome.bytes_captured, 0);
        assert_eq!(reads.load(Ordering::SeqCst), 0);
        assert_eq!(outcome.wav_bytes, None);
    }

    #[test]
    fn float_blocks_feed_pcm16() {
        let format = CaptureFormat::new(8000, ChannelMask::Mono, SampleFormat::Float).unwrap();
        let samples: Vec<u8> = [0.5f32, -0.01].iter().flat_map(|s| s.to_le_bytes()).collect();
        let device = FakeDevice::new(vec![Ok(samples)], None);
        let err = CaptureLoop::new(
            device,
            format,
            Gain::UNITY,
            64,
            MaxAmplitude::new(),
            Arc::new(AtomicBool::new(false)),
        )
        .with_feed(EncodeFeed::Batch(Vec::new()))
        .run()
        .unwrap_err();
        let CaptureError::Device { partial, .. } = err else {
            panic!("expected device error");
        };
        assert_eq!(partial.bytes_captured, 8);
        assert_eq!(partial.frames_captured, 2);
        assert_eq!(partial.pcm.len(), 4);
    }

    #[test]
    fn wav_failure_keeps_pcm_for_the_encoder() {
        let device = FakeDevice::constant(7);
        let stopped = Arc::clone(&device.stopped);
        let err = CaptureLoop::new(
            device,
            mono16(),
            Gain::UNITY,
            64,
            MaxAmplitude::new(),
            Arc::new(AtomicBool::new(false)),
        )
        .with_wav(Box::new(FailingSink {
            ok_writes: 1,
            written: 0,
        }))
        .with_feed(EncodeFeed::Batch(Vec::new()))
        .run()
        .unwrap_err();

        match err {
            CaptureError::Sink { source, partial } => {
                assert!(matches!(source, SinkError::Write(_)));
                assert_eq!(partial.bytes_captured, 128);
                assert_eq!(partial.pcm.len(), 128);
                assert_eq!(partial.wav_bytes, Some(64));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(stopped.load(Ordering::SeqCst));
    }

    #[test]
    fn dead_streaming_encoder_disables_the_feed() {
        let mut feed = EncodeFeed::Streaming(StreamingHandle::disconnected());
        feed.push(AudioBlock::from_i16(&[1, 2, 3], 1));
        assert!(matches!(feed, EncodeFeed::Disabled));
        feed.push(AudioBlock::from_i16(&[4], 1));
        assert!(feed.finish().is_empty());
    }
}
