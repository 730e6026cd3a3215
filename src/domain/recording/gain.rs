//! PCM gain processor and running peak meter

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use crate::domain::error::ConfigurationError;

use super::block::AudioBlock;
use super::format::SampleFormat;

/// Linear gain multiplier applied to every captured sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Gain(u8);

impl Gain {
    pub const MAX: u8 = 40;
    pub const DEFAULT: Self = Self(20);
    pub const UNITY: Self = Self(1);

    pub fn new(value: u32) -> Result<Self, ConfigurationError> {
        if value > Self::MAX as u32 {
            return Err(ConfigurationError::InvalidGain(value));
        }
        Ok(Self(value as u8))
    }

    pub const fn value(&self) -> u8 {
        self.0
    }
}

impl Default for Gain {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for Gain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x{}", self.0)
    }
}

/// Running peak amplitude shared between the capture thread and a meter.
///
/// The capture thread only raises the value; a reader periodically takes it,
/// which resets it to zero. Integer formats report magnitudes in their native
/// units, float samples are reported on the 16-bit scale.
#[derive(Debug, Clone, Default)]
pub struct MaxAmplitude {
    peak: Arc<AtomicU32>,
}

impl MaxAmplitude {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the peak to `magnitude` if it is larger
    pub fn observe(&self, magnitude: u32) {
        self.peak.fetch_max(magnitude, Ordering::Relaxed);
    }

    /// Current peak
    pub fn get(&self) -> u32 {
        self.peak.load(Ordering::Relaxed)
    }

    /// Read the peak and reset it to zero
    pub fn take(&self) -> u32 {
        self.peak.swap(0, Ordering::Relaxed)
    }
}

/// Apply `gain` to every sample of `block` in place, clamping to the range
/// of the sample type, and raise `peak` to the block's unscaled peak.
pub fn apply_gain(block: &mut AudioBlock, gain: Gain, peak: &MaxAmplitude) {
    let format = block.format();
    let g = gain.value();
    let block_peak = match format {
        SampleFormat::Pcm8 => gain_i8(block.as_bytes_mut(), g),
        SampleFormat::Pcm16 => gain_i16(block.as_bytes_mut(), g),
        SampleFormat::Float => gain_f32(block.as_bytes_mut(), g),
    };
    peak.observe(block_peak);
}

fn gain_i8(data: &mut [u8], gain: u8) -> u32 {
    let mut peak = 0u32;
    for byte in data.iter_mut() {
        let s = *byte as i8;
        peak = peak.max(s.unsigned_abs() as u32);
        let scaled = (s as i32 * gain as i32).clamp(i8::MIN as i32, i8::MAX as i32);
        *byte = scaled as i8 as u8;
    }
    peak
}

fn gain_i16(data: &mut [u8], gain: u8) -> u32 {
    let mut peak = 0u32;
    for chunk in data.chunks_exact_mut(2) {
        let s = i16::from_le_bytes([chunk[0], chunk[1]]);
        peak = peak.max(s.unsigned_abs() as u32);
        let scaled = (s as i32 * gain as i32).clamp(i16::MIN as i32, i16::MAX as i32);
        chunk.copy_from_slice(&(scaled as i16).to_le_bytes());
    }
    peak
}

fn gain_f32(data: &mut [u8], gain: u8) -> u32 {
    let mut peak = 0.0f32;
    for chunk in data.chunks_exact_mut(4) {
        let s = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        if s.is_finite() {
            peak = peak.max(s.abs());
        }
        let scaled = (s * gain as f32).clamp(-1.0, 1.0);
        chunk.copy_from_slice(&scaled.to_le_bytes());
    }
    (peak.min(1.0) * i16::MAX as f32) as u32
}
