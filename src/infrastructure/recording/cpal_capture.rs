//! Cross-platform capture backend using cpal
//!
//! `cpal::Stream` is not `Send`, so each open device owns a dedicated thread
//! that builds the stream, plays it and parks until stopped. Audio callbacks
//! convert device samples to the requested encoding and hand the bytes to
//! the reader over a channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration as StdDuration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, SizedSample, StreamConfig, SupportedBufferSize};
use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};
use tracing::{debug, warn};

use crate::application::ports::{CaptureBackend, CaptureDevice, DeviceError};
use crate::domain::recording::{CaptureFormat, SampleFormat};

/// Milliseconds of audio in the smallest read handed to the capture loop
const MIN_BLOCK_MILLIS: u32 = 20;

/// How long a read waits for the next callback before giving up
const READ_TIMEOUT: StdDuration = StdDuration::from_secs(2);

/// How often the stream thread checks its stop flag
const PARK_INTERVAL: StdDuration = StdDuration::from_millis(20);

type Packet = Result<Vec<u8>, String>;

/// Capture backend over the default cpal input device
#[derive(Debug, Default, Clone, Copy)]
pub struct CpalCaptureBackend;

impl CpalCaptureBackend {
    pub fn new() -> Self {
        Self
    }

    fn input_device() -> Result<cpal::Device, DeviceError> {
        cpal::default_host()
            .default_input_device()
            .ok_or(DeviceError::NoDevice)
    }

    /// Pick the device sample format able to deliver `format`.
    ///
    /// Returns the chosen device format and the smallest callback size (in
    /// frames) the device reports for it.
    fn negotiate(
        device: &cpal::Device,
        format: &CaptureFormat,
    ) -> Result<(cpal::SampleFormat, Option<u32>), DeviceError> {
        let ranges = device
            .supported_input_configs()
            .map_err(|e| DeviceError::OpenFailed(format!("Failed to get configs: {}", e)))?;

        let mut best: Option<(cpal::SampleFormat, Option<u32>)> = None;
        for range in ranges {
            if range.channels() != format.channel_count()
                || range.min_sample_rate().0 > format.sample_rate
                || range.max_sample_rate().0 < format.sample_rate
            {
                continue;
            }
            let device_format = range.sample_format();
            if !matches!(
                device_format,
                cpal::SampleFormat::I8 | cpal::SampleFormat::I16 | cpal::SampleFormat::F32
            ) {
                continue;
            }
            let min_frames = match range.buffer_size() {
                SupportedBufferSize::Range { min, .. } => Some(*min),
                SupportedBufferSize::Unknown => None,
            };
            // An exact sample format match avoids conversion
            let exact = device_format == native_format(format.sample_format);
            if best.is_none() || exact {
                best = Some((device_format, min_frames));
            }
            if exact {
                break;
            }
        }

        best.ok_or_else(|| {
            DeviceError::OpenFailed(format!("Input device cannot capture {}", format))
        })
    }

    fn stream_config(format: &CaptureFormat) -> StreamConfig {
        StreamConfig {
            channels: format.channel_count(),
            sample_rate: SampleRate(format.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        }
    }
}

impl CaptureBackend for CpalCaptureBackend {
    type Device = CpalCaptureDevice;

    fn min_buffer_size(&self, format: &CaptureFormat) -> Option<usize> {
        let device = Self::input_device().ok()?;
        let (_, min_frames) = Self::negotiate(&device, format).ok()?;
        let floor = format.sample_rate * MIN_BLOCK_MILLIS / 1000;
        let frames = min_frames.unwrap_or(0).max(floor) as usize;
        Some(frames * format.block_align() as usize)
    }

    fn open(&self, format: &CaptureFormat, buffer_size: usize) -> Result<CpalCaptureDevice, DeviceError> {
        let format = *format;
        let running = Arc::new(AtomicBool::new(true));
        let (packets_tx, packets) = unbounded::<Packet>();
        let (ready_tx, ready) = bounded::<Result<(), DeviceError>>(1);

        let thread_running = Arc::clone(&running);
        let thread = thread::Builder::new()
            .name("micrec-cpal".into())
            .spawn(move || run_stream(format, packets_tx, ready_tx, thread_running))
            .map_err(|e| DeviceError::OpenFailed(e.to_string()))?;

        let started = ready
            .recv()
            .unwrap_or_else(|_| Err(DeviceError::OpenFailed("Stream thread exited".into())));
        if let Err(e) = started {
            let _ = thread.join();
            return Err(e);
        }

        debug!(%format, buffer_size, "Opened cpal input stream");
        Ok(CpalCaptureDevice {
            packets,
            pending: Vec::with_capacity(buffer_size),
            pending_error: None,
            running,
            thread: Some(thread),
        })
    }
}

/// Body of the stream thread: build, play, park, drop
fn run_stream(
    format: CaptureFormat,
    packets: Sender<Packet>,
    ready: Sender<Result<(), DeviceError>>,
    running: Arc<AtomicBool>,
) {
    let stream = match build_stream(&format, packets) {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };
    if let Err(e) = stream.play() {
        let _ = ready.send(Err(DeviceError::OpenFailed(e.to_string())));
        return;
    }
    let _ = ready.send(Ok(()));

    while running.load(Ordering::SeqCst) {
        thread::sleep(PARK_INTERVAL);
    }
    if let Err(e) = stream.pause() {
        debug!(error = %e, "Failed to pause input stream");
    }
    drop(stream);
}

fn build_stream(format: &CaptureFormat, packets: Sender<Packet>) -> Result<cpal::Stream, DeviceError> {
    let device = CpalCaptureBackend::input_device()?;
    let (device_format, _) = CpalCaptureBackend::negotiate(&device, format)?;
    let config = CpalCaptureBackend::stream_config(format);
    let target = format.sample_format;

    match device_format {
        cpal::SampleFormat::I8 => input_stream::<i8>(&device, &config, target, packets),
        cpal::SampleFormat::I16 => input_stream::<i16>(&device, &config, target, packets),
        cpal::SampleFormat::F32 => input_stream::<f32>(&device, &config, target, packets),
        other => Err(DeviceError::OpenFailed(format!(
            "Unsupported device sample format {:?}",
            other
        ))),
    }
}

fn input_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    target: SampleFormat,
    packets: Sender<Packet>,
) -> Result<cpal::Stream, DeviceError>
where
    T: SizedSample + DeviceSample,
{
    let errors = packets.clone();
    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                let _ = packets.send(Ok(convert(data, target)));
            },
            move |err| {
                warn!(error = %err, "Audio stream error");
                let _ = errors.send(Err(err.to_string()));
            },
            None,
        )
        .map_err(|e| DeviceError::OpenFailed(e.to_string()))
}

/// Samples a device callback can deliver
pub(crate) trait DeviceSample: Copy {
    /// Little-endian bytes when the device already produces the target encoding
    fn native_bytes(self, target: SampleFormat) -> Option<Vec<u8>>;

    /// Normalized value in [-1.0, 1.0]
    fn to_unit(self) -> f32;
}

impl DeviceSample for i8 {
    fn native_bytes(self, target: SampleFormat) -> Option<Vec<u8>> {
        (target == SampleFormat::Pcm8).then(|| vec![self as u8])
    }

    fn to_unit(self) -> f32 {
        self as f32 / 128.0
    }
}

impl DeviceSample for i16 {
    fn native_bytes(self, target: SampleFormat) -> Option<Vec<u8>> {
        (target == SampleFormat::Pcm16).then(|| self.to_le_bytes().to_vec())
    }

    fn to_unit(self) -> f32 {
        self as f32 / 32768.0
    }
}

impl DeviceSample for f32 {
    fn native_bytes(self, target: SampleFormat) -> Option<Vec<u8>> {
        (target == SampleFormat::Float).then(|| self.to_le_bytes().to_vec())
    }

    fn to_unit(self) -> f32 {
        self
    }
}

fn native_format(format: SampleFormat) -> cpal::SampleFormat {
    match format {
        SampleFormat::Pcm8 => cpal::SampleFormat::I8,
        SampleFormat::Pcm16 => cpal::SampleFormat::I16,
        SampleFormat::Float => cpal::SampleFormat::F32,
    }
}

/// Encode device samples as little-endian `target` bytes
pub(crate) fn convert<T: DeviceSample>(data: &[T], target: SampleFormat) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() * target.bytes_per_sample());
    for &sample in data {
        if let Some(bytes) = sample.native_bytes(target) {
            out.extend_from_slice(&bytes);
            continue;
        }
        let unit = sample.to_unit().clamp(-1.0, 1.0);
        match target {
            SampleFormat::Pcm8 => out.push((unit * i8::MAX as f32) as i8 as u8),
            SampleFormat::Pcm16 => {
                out.extend_from_slice(&((unit * i16::MAX as f32) as i16).to_le_bytes())
            }
            SampleFormat::Float => out.extend_from_slice(&unit.to_le_bytes()),
        }
    }
    out
}

/// An open cpal input stream
pub struct CpalCaptureDevice {
    packets: Receiver<Packet>,
    /// Bytes received but not yet handed to a reader
    pending: Vec<u8>,
    /// Stream failure held back until the bytes before it have been read
    pending_error: Option<DeviceError>,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl CpalCaptureDevice {
    fn shutdown(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("Capture stream thread panicked");
            }
        }
    }
}

impl CaptureDevice for CpalCaptureDevice {
    /// Blocks until `buf` is full. A stream failure after some bytes were
    /// copied returns those bytes first and the error on the next call.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, DeviceError> {
        if let Some(e) = self.pending_error.take() {
            return Err(e);
        }
        let mut filled = 0;
        while filled < buf.len() {
            if self.pending.is_empty() {
                if !self.running.load(Ordering::SeqCst) {
                    break;
                }
                let failure = match self.packets.recv_timeout(READ_TIMEOUT) {
                    Ok(Ok(bytes)) => {
                        self.pending = bytes;
                        continue;
                    }
                    Ok(Err(message)) => DeviceError::ReadFailed(message),
                    Err(RecvTimeoutError::Timeout) => {
                        DeviceError::ReadFailed("No audio received from device".into())
                    }
                    Err(RecvTimeoutError::Disconnected) => DeviceError::Disconnected,
                };
                if filled == 0 {
                    return Err(failure);
                }
                self.pending_error = Some(failure);
                break;
            }
            let n = self.pending.len().min(buf.len() - filled);
            buf[filled..filled + n].copy_from_slice(&self.pending[..n]);
            self.pending.drain(..n);
            filled += n;
        }
        Ok(filled)
    }

    fn stop(&mut self) -> Result<(), DeviceError> {
        self.shutdown();
        Ok(())
    }
}

impl Drop for CpalCaptureDevice {
    fn drop(&mut self) {
        self.shutdown();
    }
}
