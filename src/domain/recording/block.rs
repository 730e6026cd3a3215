//! Audio block: the byte buffer of one capture read

use super::format::SampleFormat;

/// One capture buffer, tagged with its sample format and channel count.
///
/// Samples are stored as raw little-endian bytes exactly as read from the
/// device, so the block can be written to a WAV file verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBlock {
    data: Vec<u8>,
    format: SampleFormat,
    channels: u16,
}

impl AudioBlock {
    pub fn new(data: Vec<u8>, format: SampleFormat, channels: u16) -> Self {
        Self {
            data,
            format,
            channels,
        }
    }

    /// Allocate a zeroed block of `len` bytes ready to be filled by a device read
    pub fn zeroed(len: usize, format: SampleFormat, channels: u16) -> Self {
        Self::new(vec![0; len], format, channels)
    }

    pub fn from_i16(samples: &[i16], channels: u16) -> Self {
        let data = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        Self::new(data, SampleFormat::Pcm16, channels)
    }

    pub fn from_i8(samples: &[i8], channels: u16) -> Self {
        let data = samples.iter().map(|&s| s as u8).collect();
        Self::new(data, SampleFormat::Pcm8, channels)
    }

    pub fn from_f32(samples: &[f32], channels: u16) -> Self {
        let data = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        Self::new(data, SampleFormat::Float, channels)
    }

    pub fn format(&self) -> SampleFormat {
        self.format
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Shrink the block to the number of bytes actually read
    pub fn truncate(&mut self, len: usize) {
        self.data.truncate(len);
    }

    /// Number of whole interleaved frames in the block
    pub fn frames(&self) -> usize {
        let frame_bytes = self.format.bytes_per_sample() * self.channels.max(1) as usize;
        self.data.len() / frame_bytes
    }

    /// Decode the block as 16-bit samples (only meaningful for `Pcm16`)
    pub fn samples_i16(&self) -> Vec<i16> {
        self.data
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect()
    }

    /// Consume the block and return 16-bit little-endian PCM.
    ///
    /// 16-bit blocks are handed over without copying. 8-bit samples are
    /// widened, float samples are scaled from ±1.0 to the 16-bit range.
    /// Bytes that do not form a whole frame are dropped.
    pub fn into_pcm16(self) -> Vec<u8> {
        let frame_bytes = 2 * self.channels.max(1) as usize;
        let mut pcm = match self.format {
            SampleFormat::Pcm16 => self.data,
            SampleFormat::Pcm8 => self
                .data
                .iter()
                .flat_map(|&b| (((b as i8) as i16) << 8).to_le_bytes())
                .collect(),
            SampleFormat::Float => self
                .data
                .chunks_exact(4)
                .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                .flat_map(|f| ((f.clamp(-1.0, 1.0) * i16::MAX as f32) as i16).to_le_bytes())
                .collect(),
        };
        pcm.truncate(pcm.len() - pcm.len() % frame_bytes);
        pcm
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_counts_whole_frames() {
        let block = AudioBlock::from_i16(&[1, 2, 3, 4, 5], 2);
        assert_eq!(block.len(), 10);
        assert_eq!(block.frames(), 2);
    }

    #[test]
    fn pcm16_passthrough() {
        let block = AudioBlock::from_i16(&[1, -1, 300], 1);
        let bytes = block.clone().into_pcm16();
        assert_eq!(bytes, block.as_bytes());
    }

    #[test]
    fn pcm8_widens_to_16bit() {
        let block = AudioBlock::from_i8(&[1, -1, 127, -128], 1);
        let pcm = AudioBlock::new(block.into_pcm16(), SampleFormat::Pcm16, 1);
        assert_eq!(pcm.samples_i16(), vec![256, -256, 32512, -32768]);
    }

    #[test]
    fn float_scales_to_16bit() {
        let block = AudioBlock::from_f32(&[0.0, 1.0, -1.0, 2.0], 1);
        let pcm = AudioBlock::new(block.into_pcm16(), SampleFormat::Pcm16, 1);
        assert_eq!(pcm.samples_i16(), vec![0, 32767, -32767, 32767]);
    }

    #[test]
    fn partial_frame_dropped() {
        let mut block = AudioBlock::from_i16(&[1, 2, 3], 2);
        assert_eq!(block.len(), 6);
        block.truncate(5);
        assert_eq!(block.into_pcm16().len(), 4);
    }
}
