//! Record use case: one capture session with its WAV and M4A outputs

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration as StdDuration, Instant};

use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::batch_encode::BatchEncoder;
use super::capture_loop::{CaptureError, CaptureLoop, CaptureOutcome, EncodeFeed};
use super::encode_pipeline::{EncodeCallbacks, EncodeError, EncodeSummary, EncodeWorker};
use super::ports::{CaptureBackend, DeviceError, EncoderFactory, SinkError, SinkFactory};
use super::streaming_encode::StreamingEncoder;
use crate::domain::error::{ConfigurationError, FilesystemError};
use crate::domain::recording::MaxAmplitude;
use crate::domain::session::{EncodeTiming, InvalidStateTransition, SessionParameters};

/// Errors from the record use case
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("Unsupported recording settings: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Filesystem(#[from] FilesystemError),

    #[error("Audio device error: {0}")]
    Device(#[from] DeviceError),

    /// The device failed mid-recording; everything up to the failure was kept
    #[error("Recording interrupted: {source}")]
    Interrupted {
        source: DeviceError,
        partial: Box<RecordOutput>,
    },

    #[error("{0}")]
    Sink(#[from] SinkError),

    /// Writing the WAV file failed mid-recording; the M4A was still encoded
    #[error("WAV output failed: {source}")]
    WavFailed {
        source: SinkError,
        partial: Box<RecordOutput>,
    },

    #[error("AAC encoding failed: {0}")]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    State(#[from] InvalidStateTransition),

    #[error("Failed to start capture thread: {0}")]
    Spawn(String),

    #[error("Capture thread stopped unexpectedly")]
    CaptureLost,
}

/// Files and figures of a finished recording
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordOutput {
    pub wav_path: Option<PathBuf>,
    pub m4a_path: Option<PathBuf>,
    /// Raw bytes read from the device
    pub bytes_captured: u64,
    /// Audio captured, derived from the frame count
    pub duration: StdDuration,
    /// Result of the AAC encode, if M4A output was enabled
    pub encode: Option<EncodeSummary>,
}

/// Starts recording sessions against a capture backend and encoder stack
pub struct RecordSession<B, F, S>
where
    B: CaptureBackend,
    F: EncoderFactory,
    S: SinkFactory,
{
    backend: B,
    encoders: Arc<F>,
    sinks: S,
}

impl<B, F, S> RecordSession<B, F, S>
where
    B: CaptureBackend,
    B::Device: 'static,
    F: EncoderFactory,
    S: SinkFactory,
{
    pub fn new(backend: B, encoders: Arc<F>, sinks: S) -> Self {
        Self {
            backend,
            encoders,
            sinks,
        }
    }

    /// Validate `params`, prepare the outputs and start capturing.
    ///
    /// Unsupported parameters fail before any file or directory is created.
    pub fn start(
        &self,
        params: SessionParameters,
        callbacks: EncodeCallbacks,
    ) -> Result<RecordingHandle<F>, RecordError> {
        let format = params.format;
        let block_size = self
            .backend
            .min_buffer_size(&format)
            .filter(|&n| n > 0)
            .ok_or_else(|| format.unsupported())?;
        let encoder_settings = params.encoder_settings()?;
        debug!(%format, block_size, "Capture parameters accepted");

        ensure_output_dir(params.output_dir())?;

        let device = self.backend.open(&format, block_size)?;

        let wav_path = params.output_mode.writes_wav().then(|| params.wav_path());
        let m4a_path = encoder_settings.map(|_| params.m4a_path());

        let stop = Arc::new(AtomicBool::new(false));
        let peak = MaxAmplitude::new();
        let mut capture = CaptureLoop::new(
            device,
            format,
            params.gain,
            block_size,
            peak.clone(),
            Arc::clone(&stop),
        )
        .with_max_duration(params.max_duration);

        if let Some(path) = &wav_path {
            capture = capture.with_wav(self.sinks.create_sink(path, format)?);
        }

        let encode = match (encoder_settings, &m4a_path) {
            (Some(settings), Some(path)) => match params.encode_timing {
                EncodeTiming::During => {
                    let encoder =
                        StreamingEncoder::new(Arc::clone(&self.encoders), settings, path.clone());
                    let (handle, worker) = encoder.spawn(callbacks)?;
                    capture = capture.with_feed(EncodeFeed::Streaming(handle));
                    PendingEncode::Streaming(worker)
                }
                EncodeTiming::After => {
                    capture = capture.with_feed(EncodeFeed::Batch(Vec::new()));
                    PendingEncode::Batch {
                        encoder: BatchEncoder::new(Arc::clone(&self.encoders), settings, path.clone()),
                        callbacks,
                    }
                }
            },
            _ => PendingEncode::None,
        };

        let capture = std::thread::Builder::new()
            .name("micrec-capture".to_string())
            .spawn(move || capture.run())
            .map_err(|e| RecordError::Spawn(e.to_string()))?;

        info!(
            wav = ?wav_path,
            m4a = ?m4a_path,
            timing = %params.encode_timing,
            "Recording started"
        );

        Ok(RecordingHandle {
            stop,
            peak,
            started: Instant::now(),
            sample_rate: format.sample_rate,
            capture: Some(capture),
            encode,
            wav_path,
            m4a_path,
        })
    }
}

enum PendingEncode<F: EncoderFactory> {
    None,
    Batch {
        encoder: BatchEncoder<F>,
        callbacks: EncodeCallbacks,
    },
    Streaming(EncodeWorker),
}

/// Why capture ended early
enum Halt {
    Device(DeviceError),
    Sink(SinkError),
}

/// A running recording. Dropping it without `wait` stops the capture.
pub struct RecordingHandle<F: EncoderFactory> {
    stop: Arc<AtomicBool>,
    peak: MaxAmplitude,
    started: Instant,
    sample_rate: u32,
    capture: Option<JoinHandle<Result<CaptureOutcome, CaptureError>>>,
    encode: PendingEncode<F>,
    wav_path: Option<PathBuf>,
    m4a_path: Option<PathBuf>,
}

impl<F: EncoderFactory> RecordingHandle<F> {
    /// Ask the capture loop to stop after its current block
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    /// Flag shared with the capture loop, for signal handlers
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// Running peak; `take()` it periodically to drive a level meter
    pub fn max_amplitude(&self) -> MaxAmplitude {
        self.peak.clone()
    }

    /// Wall-clock time since the recording started
    pub fn elapsed(&self) -> StdDuration {
        self.started.elapsed()
    }

    /// Whether the capture loop is still running
    pub fn is_capturing(&self) -> bool {
        self.capture.as_ref().is_some_and(|c| !c.is_finished())
    }

    /// Wait for capture to end, then for the M4A encode to complete
    pub fn wait(mut self) -> Result<RecordOutput, RecordError> {
        let capture = self
            .capture
            .take()
            .ok_or(RecordError::CaptureLost)?
            .join()
            .map_err(|_| RecordError::CaptureLost)?;

        let (outcome, halt) = match capture {
            Ok(outcome) => (outcome, None),
            Err(CaptureError::Device { source, partial }) => (*partial, Some(Halt::Device(source))),
            Err(CaptureError::Sink { source, partial }) => (*partial, Some(Halt::Sink(source))),
            Err(CaptureError::State(e)) => return Err(e.into()),
        };

        let encode = match std::mem::replace(&mut self.encode, PendingEncode::None) {
            PendingEncode::None => None,
            PendingEncode::Streaming(worker) => Some(worker.wait()),
            PendingEncode::Batch {
                encoder,
                callbacks,
            } => Some(
                encoder
                    .spawn(outcome.pcm, callbacks)
                    .and_then(EncodeWorker::wait),
            ),
        };

        let mut output = RecordOutput {
            wav_path: self.wav_path.take(),
            m4a_path: self.m4a_path.take(),
            bytes_captured: outcome.bytes_captured,
            duration: StdDuration::from_micros(
                outcome.frames_captured * 1_000_000 / self.sample_rate.max(1) as u64,
            ),
            encode: None,
        };

        if let Some(halt) = halt {
            if let Some(Err(e)) = &encode {
                error!(error = %e, "Encoding of the partial recording failed");
            }
            output.encode = encode.and_then(Result::ok);
            let partial = Box::new(output);
            return Err(match halt {
                Halt::Device(source) => {
                    warn!(error = %source, "Recording interrupted, partial output kept");
                    RecordError::Interrupted { source, partial }
                }
                Halt::Sink(source) => {
                    warn!(error = %source, "WAV output failed, partial output kept");
                    RecordError::WavFailed { source, partial }
                }
            });
        }

        output.encode = encode.transpose()?;
        info!(
            bytes = output.bytes_captured,
            duration_ms = output.duration.as_millis() as u64,
            "Recording finished"
        );
        Ok(output)
    }
}

impl<F: EncoderFactory> Drop for RecordingHandle<F> {
    fn drop(&mut self) {
        if self.capture.is_some() {
            debug!("Recording handle dropped, stopping capture");
        }
        self.stop();
    }
}

/// Create `dir` (recursively) unless it already exists as a directory
pub fn ensure_output_dir(dir: &Path) -> Result<(), FilesystemError> {
    if dir.is_dir() {
        return Ok(());
    }
    if dir.exists() {
        return Err(FilesystemError::NotADirectory {
            path: dir.to_path_buf(),
        });
    }
    std::fs::create_dir_all(dir).map_err(|e| FilesystemError::CreateDir {
        path: dir.to_path_buf(),
        message: e.to_string(),
    })?;
    debug!(dir = %dir.display(), "Created output directory");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::fakes::{FakeBackend, FakeDevice, FakeFactory};
    use crate::application::ports::PcmSink;
    use crate::domain::recording::{CaptureFormat, ChannelMask, Duration, Gain, SampleFormat};
    use crate::domain::session::OutputMode;
    use std::sync::Mutex;

    /// Sink that only counts bytes but creates the file so paths can be checked
    struct CountingSinks;

    struct CountingSink(u64);

    impl PcmSink for CountingSink {
        fn write_pcm(&mut self, pcm: &[u8]) -> Result<(), SinkError> {
            self.0 += pcm.len() as u64;
            Ok(())
        }

        fn finish(&mut self) -> Result<u64, SinkError> {
            Ok(self.0)
        }
    }

    impl SinkFactory for CountingSinks {
        fn create_sink(
            &self,
            path: &Path,
            _format: CaptureFormat,
        ) -> Result<Box<dyn PcmSink>, SinkError> {
            std::fs::write(path, b"").map_err(|e| SinkError::Create(e.to_string()))?;
            Ok(Box::new(CountingSink(0)))
        }
    }

    /// Sinks that accept the first block, then report a full disk
    struct FullDiskSinks;

    struct FullDiskSink {
        written: u64,
    }

    impl PcmSink for FullDiskSink {
        fn write_pcm(&mut self, pcm: &[u8]) -> Result<(), SinkError> {
            if self.written > 0 {
                return Err(SinkError::Write("disk full".into()));
            }
            self.written += pcm.len() as u64;
            Ok(())
        }

        fn finish(&mut self) -> Result<u64, SinkError> {
            Ok(self.written)
        }
    }

    impl SinkFactory for FullDiskSinks {
        fn create_sink(
            &self,
            _path: &Path,
            _format: CaptureFormat,
        ) -> Result<Box<dyn PcmSink>, SinkError> {
            Ok(Box::new(FullDiskSink { written: 0 }))
        }
    }

    fn params(dir: &Path, mode: OutputMode, timing: EncodeTiming) -> SessionParameters {
        SessionParameters {
            format: CaptureFormat::new(8000, ChannelMask::Mono, SampleFormat::Pcm16).unwrap(),
            gain: Gain::default(),
            bit_rate: 64_000,
            output_dir: dir.join("out"),
            base_name: "take".to_string(),
            output_mode: mode,
            encode_timing: timing,
            max_duration: Some(Duration::from_millis(500)),
        }
    }

    fn session(
        min_buffer: Option<usize>,
        device: FakeDevice,
    ) -> (RecordSession<FakeBackend, FakeFactory, CountingSinks>, Arc<AtomicBool>) {
        let backend = FakeBackend::new(min_buffer, device);
        let opened = Arc::clone(&backend.opened);
        (
            RecordSession::new(backend, Arc::new(FakeFactory::new(512)), CountingSinks),
            opened,
        )
    }

    #[test]
    fn zero_buffer_size_fails_before_any_file() {
        let dir = tempfile::tempdir().unwrap();
        let (session, opened) = session(Some(0), FakeDevice::constant(1));
        let err = session
            .start(
                params(dir.path(), OutputMode::Both, EncodeTiming::After),
                EncodeCallbacks::new(),
            )
            .err()
            .unwrap();
        assert!(matches!(
            err,
            RecordError::Configuration(ConfigurationError::UnsupportedParameters { .. })
        ));
        assert!(!dir.path().join("out").exists());
        assert!(!opened.load(Ordering::SeqCst));
    }

    #[test]
    fn unsupported_aac_rate_fails_before_any_file() {
        let dir = tempfile::tempdir().unwrap();
        let (session, _) = session(Some(256), FakeDevice::constant(1));
        let mut p = params(dir.path(), OutputMode::M4a, EncodeTiming::After);
        p.format = CaptureFormat::new(9000, ChannelMask::Mono, SampleFormat::Pcm16).unwrap();
        let err = session.start(p, EncodeCallbacks::new()).err().unwrap();
        assert!(matches!(
            err,
            RecordError::Configuration(ConfigurationError::InvalidSampleRate(9000))
        ));
        assert!(!dir.path().join("out").exists());
    }

    #[test]
    fn batch_session_writes_both_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let (session, _) = session(Some(256), FakeDevice::constant(100));
        let progress = Arc::new(Mutex::new(Vec::new()));
        let p = Arc::clone(&progress);
        let handle = session
            .start(
                params(dir.path(), OutputMode::Both, EncodeTiming::After),
                EncodeCallbacks::new().with_progress(move |v| p.lock().unwrap().push(v)),
            )
            .unwrap();

        let output = handle.wait().unwrap();
        assert_eq!(output.bytes_captured, 8000);
        assert_eq!(output.duration, StdDuration::from_millis(500));
        assert_eq!(output.wav_path, Some(dir.path().join("out/take.wav")));
        assert!(output.wav_path.as_ref().unwrap().exists());
        let encode = output.encode.unwrap();
        assert_eq!(encode.path, dir.path().join("out/take.m4a"));
        assert_eq!(encode.duration_us, 500_000);
        assert_eq!(progress.lock().unwrap().last(), Some(&100));
    }

    #[test]
    fn streaming_session_encodes_during_capture() {
        let dir = tempfile::tempdir().unwrap();
        let (session, _) = session(Some(256), FakeDevice::constant(100));
        let handle = session
            .start(
                params(dir.path(), OutputMode::M4a, EncodeTiming::During),
                EncodeCallbacks::new(),
            )
            .unwrap();
        let output = handle.wait().unwrap();
        assert_eq!(output.wav_path, None);
        assert_eq!(output.encode.unwrap().duration_us, 500_000);
    }

    #[test]
    fn stop_ends_an_unbounded_recording() {
        let dir = tempfile::tempdir().unwrap();
        let (session, _) = session(Some(256), FakeDevice::constant(100));
        let mut p = params(dir.path(), OutputMode::Wav, EncodeTiming::After);
        p.max_duration = None;
        let handle = session.start(p, EncodeCallbacks::new()).unwrap();
        std::thread::sleep(StdDuration::from_millis(20));
        handle.stop();
        let output = handle.wait().unwrap();
        assert!(output.bytes_captured > 0);
        assert!(output.encode.is_none());
    }

    #[test]
    fn device_failure_keeps_partial_output() {
        let dir = tempfile::tempdir().unwrap();
        let device = FakeDevice::new(vec![Ok(vec![1u8; 256]), Ok(vec![1u8; 256])], None);
        let (session, _) = session(Some(256), device);
        let handle = session
            .start(
                params(dir.path(), OutputMode::Both, EncodeTiming::After),
                EncodeCallbacks::new(),
            )
            .unwrap();
        match handle.wait() {
            Err(RecordError::Interrupted { source, partial }) => {
                assert!(matches!(source, DeviceError::Disconnected));
                assert_eq!(partial.bytes_captured, 512);
                assert_eq!(partial.encode.unwrap().duration_us, 32_000);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn output_dir_that_is_a_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("out");
        std::fs::write(&file, b"x").unwrap();
        assert!(matches!(
            ensure_output_dir(&file),
            Err(FilesystemError::NotADirectory { .. })
        ));
    }

    #[test]
    fn output_dir_is_created_recursively() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b/c");
        ensure_output_dir(&nested).unwrap();
        assert!(nested.is_dir());
    }

    #[test]
    fn wav_failure_still_encodes_captured_audio() {
        for timing in [EncodeTiming::After, EncodeTiming::During] {
            let dir = tempfile::tempdir().unwrap();
            let factory = Arc::new(FakeFactory::new(512));
            let codec_log = Arc::clone(&factory.codec_log);
            let backend = FakeBackend::new(Some(256), FakeDevice::constant(100));
            let session = RecordSession::new(backend, factory, FullDiskSinks);
            let handle = session
                .start(
                    params(dir.path(), OutputMode::Both, timing),
                    EncodeCallbacks::new(),
                )
                .unwrap();

            match handle.wait() {
                Err(RecordError::WavFailed { source, partial }) => {
                    assert!(matches!(source, SinkError::Write(_)));
                    assert_eq!(partial.bytes_captured, 512);
                    assert_eq!(partial.encode.unwrap().duration_us, 32_000);
                }
                other => panic!("unexpected result for {timing}: {other:?}"),
            }
            let fed: usize = codec_log.lock().unwrap().inputs.iter().map(|i| i.0).sum();
            assert_eq!(fed, 512, "PCM encoded with {timing}");
        }
    }

    #[test]
    fn dropping_the_handle_stops_capture() {
        let dir = tempfile::tempdir().unwrap();
        let device = FakeDevice::constant(100);
        let stopped = Arc::clone(&device.stopped);
        let (session, _) = session(Some(256), device);
        let mut p = params(dir.path(), OutputMode::Wav, EncodeTiming::After);
        p.max_duration = None;

        drop(session.start(p, EncodeCallbacks::new()).unwrap());

        let deadline = Instant::now() + StdDuration::from_secs(5);
        while !stopped.load(Ordering::SeqCst) && Instant::now() < deadline {
            std::thread::sleep(StdDuration::from_millis(5));
        }
        assert!(stopped.load(Ordering::SeqCst));
    }
}
