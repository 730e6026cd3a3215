//! In-memory device, codec and muxer used by the application tests

use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::ports::{
    AudioCodec, CaptureBackend, CaptureDevice, CodecError, DeviceError, EncoderFactory,
    InputSlot, Muxer, MuxerError, OutputEvent,
};
use crate::domain::encoding::{
    BufferFlags, BufferInfo, EncodedChunk, EncodedFormat, EncoderSettings, MIME_AUDIO_AAC,
};
use crate::domain::recording::CaptureFormat;

/// Device that replays scripted reads, then repeats `fill` forever (or fails)
pub struct FakeDevice {
    script: VecDeque<Result<Vec<u8>, DeviceError>>,
    fill: Option<i16>,
    pub stopped: Arc<AtomicBool>,
    pub reads: Arc<AtomicUsize>,
}

impl FakeDevice {
    pub fn new(script: Vec<Result<Vec<u8>, DeviceError>>, fill: Option<i16>) -> Self {
        Self {
            script: script.into(),
            fill,
            stopped: Arc::new(AtomicBool::new(false)),
            reads: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn constant(value: i16) -> Self {
        Self::new(Vec::new(), Some(value))
    }
}

impl CaptureDevice for FakeDevice {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, DeviceError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if let Some(next) = self.script.pop_front() {
            let data = next?;
            let n = data.len().min(buf.len());
            buf[..n].copy_from_slice(&data[..n]);
            return Ok(n);
        }
        match self.fill {
            Some(value) => {
                let n = buf.len() - buf.len() % 2;
                for sample in buf[..n].chunks_exact_mut(2) {
                    sample.copy_from_slice(&value.to_le_bytes());
                }
                Ok(n)
            }
            None => Err(DeviceError::Disconnected),
        }
    }

    fn stop(&mut self) -> Result<(), DeviceError> {
        self.stopped.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Backend handing out one prepared `FakeDevice`
pub struct FakeBackend {
    pub min_buffer: Option<usize>,
    device: Mutex<Option<FakeDevice>>,
    pub opened: Arc<AtomicBool>,
}

impl FakeBackend {
    pub fn new(min_buffer: Option<usize>, device: FakeDevice) -> Self {
        Self {
            min_buffer,
            device: Mutex::new(Some(device)),
            opened: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl CaptureBackend for FakeBackend {
    type Device = FakeDevice;

    fn min_buffer_size(&self, _format: &CaptureFormat) -> Option<usize> {
        self.min_buffer
    }

    fn open(&self, _format: &CaptureFormat, _buffer_size: usize) -> Result<FakeDevice, DeviceError> {
        self.opened.store(true, Ordering::SeqCst);
        self.device
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| DeviceError::OpenFailed("already open".into()))
    }
}

/// Inputs seen by a `FakeCodec`: (bytes, pts, flags)
#[derive(Debug, Default)]
pub struct CodecLog {
    pub inputs: Vec<(usize, u64, BufferFlags)>,
    pub started: bool,
    pub stopped: bool,
}

/// Synchronous codec with one input slot. Every non-empty input yields one
/// output at the same timestamp; end of stream is echoed on the output side.
pub struct FakeCodec {
    capacity: usize,
    sample_rate: u32,
    channels: u16,
    slot_lent: bool,
    format_pending: bool,
    eos_queued: bool,
    outputs: VecDeque<EncodedChunk>,
    fail_after: Option<usize>,
    pub log: Arc<Mutex<CodecLog>>,
}

impl FakeCodec {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            sample_rate: 8000,
            channels: 1,
            slot_lent: false,
            format_pending: false,
            eos_queued: false,
            outputs: VecDeque::new(),
            fail_after: None,
            log: Arc::new(Mutex::new(CodecLog::default())),
        }
    }

    /// Fail the input after `n` successful ones
    pub fn failing_after(mut self, n: usize) -> Self {
        self.fail_after = Some(n);
        self
    }

    pub fn format(sample_rate: u32, channels: u16) -> EncodedFormat {
        EncodedFormat {
            mime: MIME_AUDIO_AAC.to_string(),
            sample_rate,
            channels,
            bit_rate: 64_000,
            frame_length: 1024,
            codec_specific_data: vec![0x12, 0x10],
        }
    }
}

impl AudioCodec for FakeCodec {
    fn start(&mut self) -> Result<(), CodecError> {
        self.format_pending = true;
        self.log.lock().unwrap().started = true;
        Ok(())
    }

    fn dequeue_input(&mut self, _timeout: Duration) -> Result<Option<InputSlot>, CodecError> {
        if !self.log.lock().unwrap().started {
            return Err(CodecError::IllegalState("not started"));
        }
        if self.slot_lent || self.eos_queued {
            return Ok(None);
        }
        self.slot_lent = true;
        Ok(Some(InputSlot {
            index: 0,
            capacity: self.capacity,
        }))
    }

    fn queue_input(
        &mut self,
        index: usize,
        data: &[u8],
        presentation_time_us: u64,
        flags: BufferFlags,
    ) -> Result<(), CodecError> {
        if index != 0 || !self.slot_lent {
            return Err(CodecError::InvalidSlot(index));
        }
        self.slot_lent = false;
        let mut log = self.log.lock().unwrap();
        if self.fail_after.is_some_and(|n| log.inputs.len() >= n) {
            return Err(CodecError::Encode("injected failure".into()));
        }
        log.inputs.push((data.len(), presentation_time_us, flags));
        if !data.is_empty() {
            self.outputs.push_back(EncodedChunk::new(
                vec![0xAB; 8],
                presentation_time_us,
                BufferFlags::KEY_FRAME,
            ));
        }
        if flags.contains(BufferFlags::END_OF_STREAM) {
            self.eos_queued = true;
            self.outputs
                .push_back(EncodedChunk::end_of_stream(presentation_time_us));
        }
        Ok(())
    }

    fn dequeue_output(&mut self, _timeout: Duration) -> Result<OutputEvent, CodecError> {
        if self.format_pending {
            self.format_pending = false;
            return Ok(OutputEvent::FormatChanged(Self::format(
                self.sample_rate,
                self.channels,
            )));
        }
        Ok(self
            .outputs
            .pop_front()
            .map(OutputEvent::Chunk)
            .unwrap_or(OutputEvent::TryAgainLater))
    }

    fn stop(&mut self) -> Result<(), CodecError> {
        self.log.lock().unwrap().stopped = true;
        Ok(())
    }
}

/// What a `FakeMuxer` was asked to do
#[derive(Debug, Default)]
pub struct MuxLog {
    pub tracks: usize,
    pub started: bool,
    pub stopped: bool,
    /// (pts, size) of each written sample
    pub samples: Vec<(u64, usize)>,
}

pub struct FakeMuxer {
    log: Arc<Mutex<MuxLog>>,
}

impl FakeMuxer {
    pub fn new() -> (Self, Arc<Mutex<MuxLog>>) {
        let log = Arc::new(Mutex::new(MuxLog::default()));
        (
            Self {
                log: Arc::clone(&log),
            },
            log,
        )
    }
}

impl Muxer for FakeMuxer {
    fn add_track(&mut self, _format: &EncodedFormat) -> Result<usize, MuxerError> {
        let mut log = self.log.lock().unwrap();
        log.tracks += 1;
        Ok(log.tracks - 1)
    }

    fn start(&mut self) -> Result<(), MuxerError> {
        self.log.lock().unwrap().started = true;
        Ok(())
    }

    fn write_sample_data(
        &mut self,
        _track_index: usize,
        data: &[u8],
        info: &BufferInfo,
    ) -> Result<(), MuxerError> {
        let mut log = self.log.lock().unwrap();
        if !log.started {
            return Err(MuxerError::IllegalState("not started"));
        }
        log.samples.push((info.presentation_time_us, data.len()));
        Ok(())
    }

    fn stop(&mut self) -> Result<(), MuxerError> {
        self.log.lock().unwrap().stopped = true;
        Ok(())
    }
}

/// Factory producing fakes whose logs stay observable from the test
pub struct FakeFactory {
    pub capacity: usize,
    pub fail_after: Option<usize>,
    pub codec_log: Arc<Mutex<CodecLog>>,
    pub mux_log: Arc<Mutex<MuxLog>>,
}

impl FakeFactory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            fail_after: None,
            codec_log: Arc::new(Mutex::new(CodecLog::default())),
            mux_log: Arc::new(Mutex::new(MuxLog::default())),
        }
    }
}

impl EncoderFactory for FakeFactory {
    type Codec = FakeCodec;
    type Muxer = FakeMuxer;

    fn create_codec(&self, settings: &EncoderSettings) -> Result<FakeCodec, CodecError> {
        let mut codec = FakeCodec::new(self.capacity);
        codec.sample_rate = settings.sample_rate;
        codec.channels = settings.channels;
        codec.fail_after = self.fail_after;
        codec.log = Arc::clone(&self.codec_log);
        Ok(codec)
    }

    fn create_muxer(&self, _path: &Path) -> Result<FakeMuxer, MuxerError> {
        Ok(FakeMuxer {
            log: Arc::clone(&self.mux_log),
        })
    }
}
