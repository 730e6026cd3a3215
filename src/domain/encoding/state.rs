//! Encode pipeline state: timestamps, end-of-stream flags, track index

/// Mutable state of one encode run.
///
/// Input timestamps are derived from the amount of 16-bit PCM queued so far,
/// never from wall-clock time, so they advance by
/// `frames * 1_000_000 / sample_rate` where `frames = bytes / (2 * channels)`.
#[derive(Debug, Clone)]
pub struct EncodeState {
    sample_rate: u32,
    channels: u16,
    frames_queued: u64,
    last_written_us: Option<u64>,
    pub input_end_of_stream: bool,
    pub output_end_of_stream: bool,
    track_index: Option<usize>,
    samples_written: u64,
}

impl EncodeState {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels: channels.max(1),
            frames_queued: 0,
            last_written_us: None,
            input_end_of_stream: false,
            output_end_of_stream: false,
            track_index: None,
            samples_written: 0,
        }
    }

    /// Bytes of 16-bit PCM per interleaved frame
    pub fn frame_bytes(&self) -> usize {
        2 * self.channels as usize
    }

    /// Timestamp the next queued input starts at
    pub fn presentation_time_us(&self) -> u64 {
        frames_to_us(self.frames_queued, self.sample_rate)
    }

    /// Record `bytes` of PCM as queued and return the timestamp of that input
    pub fn advance(&mut self, bytes: usize) -> u64 {
        let pts = self.presentation_time_us();
        self.frames_queued += (bytes / self.frame_bytes()) as u64;
        pts
    }

    /// Duration covered by `bytes` of 16-bit PCM at this state's format
    pub fn duration_us_of(&self, bytes: usize) -> u64 {
        frames_to_us((bytes / self.frame_bytes()) as u64, self.sample_rate)
    }

    /// Whether an output at `pts` may be written: it must be strictly later
    /// than the last written one. Duplicates and regressions are dropped.
    pub fn should_write(&self, pts: u64) -> bool {
        match self.last_written_us {
            Some(last) => pts > last,
            None => true,
        }
    }

    pub fn mark_written(&mut self, pts: u64) {
        self.last_written_us = Some(pts);
        self.samples_written += 1;
    }

    pub fn last_written_us(&self) -> Option<u64> {
        self.last_written_us
    }

    pub fn samples_written(&self) -> u64 {
        self.samples_written
    }

    pub fn track_index(&self) -> Option<usize> {
        self.track_index
    }

    pub fn set_track_index(&mut self, index: usize) {
        self.track_index = Some(index);
    }
}

fn frames_to_us(frames: u64, sample_rate: u32) -> u64 {
    frames * 1_000_000 / sample_rate.max(1) as u64
}
