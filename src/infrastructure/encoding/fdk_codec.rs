//! AAC-LC codec adapter over libfdk-aac
//!
//! The encoder runs synchronously inside `queue_input`: each queued slot is
//! encoded immediately and the resulting access units wait in an output
//! queue until drained. There is a single input slot sized to one AAC frame.

use std::collections::VecDeque;
use std::time::Duration;

use fdk_aac::enc::{
    AudioObjectType, BitRate, ChannelMode, EncodeInfo, Encoder, EncoderParams, Transport,
};
use tracing::{debug, trace};

use crate::application::ports::{AudioCodec, CodecError, InputSlot, OutputEvent};
use crate::domain::encoding::{
    BufferFlags, EncodedChunk, EncodedFormat, EncoderSettings, MIME_AUDIO_AAC,
};

/// Silence frames the flush may feed beyond the expected output count
/// while the encoder's look-ahead drains
const FLUSH_HEADROOM: u64 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Configured,
    Running,
    Ended,
    Stopped,
}

/// AAC-LC encoder producing raw access units
pub struct FdkAacCodec {
    encoder: Encoder,
    settings: EncoderSettings,
    /// Samples per channel per access unit
    frame_len: usize,
    max_out_bytes: usize,
    audio_specific_config: Vec<u8>,
    state: State,
    slot_lent: bool,
    base_pts: Option<u64>,
    frames_in: u64,
    units_out: u64,
    outputs: VecDeque<OutputEvent>,
}

impl FdkAacCodec {
    pub fn new(settings: &EncoderSettings) -> Result<Self, CodecError> {
        let channels = match settings.channels {
            1 => ChannelMode::Mono,
            2 => ChannelMode::Stereo,
            n => return Err(CodecError::Unavailable(format!("AAC with {} channels", n))),
        };
        let encoder = Encoder::new(EncoderParams {
            bit_rate: BitRate::Cbr(settings.bit_rate),
            sample_rate: settings.sample_rate,
            transport: Transport::Raw,
            channels,
            audio_object_type: AudioObjectType::Mpeg4LowComplexity,
        })
        .map_err(|e| CodecError::Configure(format!("{:?}", e)))?;

        let info = encoder
            .info()
            .map_err(|e| CodecError::Configure(format!("{:?}", e)))?;
        let frame_len = info.frameLength as usize;
        if frame_len == 0 {
            return Err(CodecError::Configure("encoder reported zero frame length".into()));
        }
        let conf_len = (info.confSize as usize).min(info.confBuf.len());
        let audio_specific_config = info.confBuf[..conf_len].to_vec();

        debug!(
            sample_rate = settings.sample_rate,
            channels = settings.channels,
            bit_rate = settings.bit_rate,
            frame_len,
            "Configured AAC encoder"
        );

        Ok(Self {
            encoder,
            settings: *settings,
            frame_len,
            max_out_bytes: (info.maxOutBufBytes as usize).max(768 * settings.channels as usize),
            audio_specific_config,
            state: State::Configured,
            slot_lent: false,
            base_pts: None,
            frames_in: 0,
            units_out: 0,
            outputs: VecDeque::new(),
        })
    }

    fn slot_capacity(&self) -> usize {
        self.frame_len * self.settings.pcm_frame_bytes()
    }

    fn output_format(&self) -> EncodedFormat {
        EncodedFormat {
            mime: MIME_AUDIO_AAC.to_string(),
            sample_rate: self.settings.sample_rate,
            channels: self.settings.channels,
            bit_rate: self.settings.bit_rate,
            frame_length: self.frame_len as u32,
            codec_specific_data: self.audio_specific_config.clone(),
        }
    }

    /// Presentation time of the next access unit
    fn next_pts(&self) -> u64 {
        let samples = self.units_out * self.frame_len as u64;
        self.base_pts.unwrap_or(0) + samples * 1_000_000 / self.settings.sample_rate as u64
    }

    fn emit(&mut self, data: Vec<u8>) {
        let pts = self.next_pts();
        trace!(pts, bytes = data.len(), "AAC access unit");
        self.outputs
            .push_back(OutputEvent::Chunk(EncodedChunk::new(data, pts, BufferFlags::KEY_FRAME)));
        self.units_out += 1;
    }

    /// Feed interleaved samples until the encoder has consumed all of them
    fn encode(&mut self, samples: &[i16]) -> Result<(), CodecError> {
        let mut out = vec![0u8; self.max_out_bytes];
        let mut consumed = 0;
        while consumed < samples.len() {
            let EncodeInfo {
                input_consumed,
                output_size,
            } = self
                .encoder
                .encode(&samples[consumed..], &mut out)
                .map_err(|e| CodecError::Encode(format!("{:?}", e)))?;
            if output_size > 0 {
                self.emit(out[..output_size].to_vec());
            }
            if input_consumed == 0 && output_size == 0 {
                return Err(CodecError::Encode("encoder accepted no input".into()));
            }
            consumed += input_consumed;
        }
        Ok(())
    }

    /// Push silence through the look-ahead until every queued input frame
    /// is covered by an access unit
    fn drain(&mut self) -> Result<(), CodecError> {
        let expected = self.frames_in.div_ceil(self.frame_len as u64);
        let silence = vec![0i16; self.frame_len * self.settings.channels as usize];
        let mut budget = expected.saturating_sub(self.units_out) + FLUSH_HEADROOM;
        while self.units_out < expected && budget > 0 {
            let before = self.units_out;
            self.encode_one_frame(&silence, expected)?;
            if self.units_out == before {
                budget -= 1;
            }
        }
        debug!(units = self.units_out, expected, "AAC encoder drained");
        Ok(())
    }

    /// Encode one frame of padding, discarding units beyond `limit`
    fn encode_one_frame(&mut self, silence: &[i16], limit: u64) -> Result<(), CodecError> {
        let mut out = vec![0u8; self.max_out_bytes];
        let info = self
            .encoder
            .encode(silence, &mut out)
            .map_err(|e| CodecError::Encode(format!("{:?}", e)))?;
        if info.output_size > 0 && self.units_out < limit {
            self.emit(out[..info.output_size].to_vec());
        }
        Ok(())
    }
}

impl AudioCodec for FdkAacCodec {
    fn start(&mut self) -> Result<(), CodecError> {
        if self.state != State::Configured {
            return Err(CodecError::IllegalState("start on a started encoder"));
        }
        self.state = State::Running;
        self.outputs
            .push_back(OutputEvent::FormatChanged(self.output_format()));
        self.outputs.push_back(OutputEvent::Chunk(EncodedChunk::new(
            self.audio_specific_config.clone(),
            0,
            BufferFlags::CODEC_CONFIG,
        )));
        Ok(())
    }

    fn dequeue_input(&mut self, _timeout: Duration) -> Result<Option<InputSlot>, CodecError> {
        match self.state {
            State::Running if !self.slot_lent => {
                self.slot_lent = true;
                Ok(Some(InputSlot {
                    index: 0,
                    capacity: self.slot_capacity(),
                }))
            }
            State::Running | State::Ended => Ok(None),
            State::Configured | State::Stopped => {
                Err(CodecError::IllegalState("encoder is not running"))
            }
        }
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
        if data.len() > self.slot_capacity() {
            return Err(CodecError::Encode(format!(
                "{} bytes queued into a {} byte slot",
                data.len(),
                self.slot_capacity()
            )));
        }
        self.slot_lent = false;
        self.base_pts.get_or_insert(presentation_time_us);

        if !data.is_empty() {
            let samples: Vec<i16> = data
                .chunks_exact(2)
                .map(|b| i16::from_le_bytes([b[0], b[1]]))
                .collect();
            self.frames_in += (samples.len() / self.settings.channels as usize) as u64;
            self.encode(&samples)?;
        }

        if flags.contains(BufferFlags::END_OF_STREAM) {
            self.drain()?;
            let pts = self.next_pts();
            self.outputs
                .push_back(OutputEvent::Chunk(EncodedChunk::end_of_stream(pts)));
            self.state = State::Ended;
        }
        Ok(())
    }

    fn dequeue_output(&mut self, _timeout: Duration) -> Result<OutputEvent, CodecError> {
        if matches!(self.state, State::Configured | State::Stopped) {
            return Err(CodecError::IllegalState("encoder is not running"));
        }
        Ok(self.outputs.pop_front().unwrap_or(OutputEvent::TryAgainLater))
    }

    fn stop(&mut self) -> Result<(), CodecError> {
        self.state = State::Stopped;
        self.outputs.clear();
        self.slot_lent = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec(rate: u32, channels: u16) -> FdkAacCodec {
        FdkAacCodec::new(&EncoderSettings::new(rate, channels, 128_000).unwrap()).unwrap()
    }

    fn drain_outputs(codec: &mut FdkAacCodec) -> Vec<OutputEvent> {
        let mut events = Vec::new();
        loop {
            match codec.dequeue_output(Duration::ZERO).unwrap() {
                OutputEvent::TryAgainLater => return events,
                event => events.push(event),
            }
        }
    }

    fn tone(frames: usize, channels: usize) -> Vec<u8> {
        (0..frames * channels)
            .map(|i| (((i / channels) as f32 * 0.05).sin() * 8000.0) as i16)
            .flat_map(i16::to_le_bytes)
            .collect()
    }

    #[test]
    fn format_is_reported_first() {
        let mut codec = codec(44100, 1);
        codec.start().unwrap();
        let events = drain_outputs(&mut codec);
        let OutputEvent::FormatChanged(format) = &events[0] else {
            panic!("expected format change, got {:?}", events[0]);
        };
        assert_eq!(format.sample_rate, 44100);
        assert_eq!(format.frame_length, 1024);
        assert!(!format.codec_specific_data.is_empty());
        assert!(matches!(&events[1], OutputEvent::Chunk(c) if c.info.is_codec_config()));
    }

    #[test]
    fn slot_is_one_frame_and_exclusive() {
        let mut codec = codec(48000, 2);
        assert!(codec.dequeue_input(Duration::ZERO).is_err());
        codec.start().unwrap();
        let slot = codec.dequeue_input(Duration::ZERO).unwrap().unwrap();
        assert_eq!(slot, InputSlot { index: 0, capacity: 1024 * 4 });
        assert_eq!(codec.dequeue_input(Duration::ZERO).unwrap(), None);
        assert!(matches!(
            codec.queue_input(1, &[], 0, BufferFlags::NONE),
            Err(CodecError::InvalidSlot(1))
        ));
    }

    #[test]
    fn end_of_stream_covers_every_input_frame() {
        let mut codec = codec(44100, 1);
        codec.start().unwrap();
        drain_outputs(&mut codec);

        let pcm = tone(10 * 1024 + 300, 1);
        let mut pts = 0u64;
        let mut chunks = pcm.chunks(2048).peekable();
        while let Some(chunk) = chunks.next() {
            let slot = codec.dequeue_input(Duration::ZERO).unwrap().unwrap();
            let flags = if chunks.peek().is_none() {
                BufferFlags::END_OF_STREAM
            } else {
                BufferFlags::NONE
            };
            codec.queue_input(slot.index, chunk, pts, flags).unwrap();
            pts += (chunk.len() / 2) as u64 * 1_000_000 / 44100;
        }

        let events = drain_outputs(&mut codec);
        let units: Vec<&EncodedChunk> = events
            .iter()
            .filter_map(|e| match e {
                OutputEvent::Chunk(c) if !c.data.is_empty() => Some(c),
                _ => None,
            })
            .collect();
        assert_eq!(units.len(), 11);
        assert!(units.windows(2).all(|w| w[0].info.presentation_time_us
            < w[1].info.presentation_time_us));
        assert!(matches!(
            events.last(),
            Some(OutputEvent::Chunk(c)) if c.info.is_end_of_stream() && c.data.is_empty()
        ));
        assert_eq!(codec.dequeue_input(Duration::ZERO).unwrap(), None);
    }

    #[test]
    fn oversized_input_is_rejected() {
        let mut codec = codec(16000, 1);
        codec.start().unwrap();
        let slot = codec.dequeue_input(Duration::ZERO).unwrap().unwrap();
        let too_big = vec![0u8; slot.capacity + 2];
        assert!(matches!(
            codec.queue_input(slot.index, &too_big, 0, BufferFlags::NONE),
            Err(CodecError::Encode(_))
        ));
    }
}
