//! AAC frame encoder for the software codec
//!
//! Wraps an FFmpeg `AVCodecContext`. Interleaved PCM arriving through the
//! codec's input buffers is collected until a full AAC frame (usually 1024
//! samples per channel) is available, converted to planar float and sent to
//! the encoder.

use bytes::Bytes;
use ffmpeg_next as ffmpeg;
use ffmpeg_next::codec;
use ffmpeg_next::util::channel_layout::ChannelLayout;
use ffmpeg_next::util::format::sample::Sample;

use crate::error::{EncodeError, FfmpegError, Result};
use crate::format::mapping::format_for_encoding;
use crate::format::SampleFormat;

use super::software::{EncodedChunk, FrameEncoder};
use super::{BufferFlags, MediaFormat, KEY_BIT_RATE, KEY_CHANNEL_COUNT, KEY_PCM_ENCODING, KEY_SAMPLE_RATE};

/// Sample format the AAC encoder expects
pub const ENCODER_SAMPLE_FMT: Sample = Sample::F32(ffmpeg::util::format::sample::Type::Planar);
/// AAC encoder frame size (number of samples per channel per frame)
pub const AAC_FRAME_SIZE: usize = 1024;

struct Opened {
    encoder: ffmpeg::encoder::Audio,
    layout: ChannelLayout,
    input_format: SampleFormat,
    channels: usize,
    sample_rate: u32,
    frame_size: usize,
}

/// AAC-LC encoder backed by a real FFmpeg codec context
#[derive(Default)]
pub struct AacEncoder {
    opened: Option<Opened>,
    pending: Vec<u8>,
    /// Pts of the first pending sample, in samples
    next_pts: Option<i64>,
}

impl AacEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    fn opened(&mut self) -> Result<&mut Opened> {
        self.opened
            .as_mut()
            .ok_or_else(|| EncodeError::InvalidState("aac encoder used before configure".into()))
    }

    /// Encode one run of whole sample frames taken from the front of `pending`.
    fn encode_samples(&mut self, samples: usize) -> Result<Vec<EncodedChunk>> {
        let pts = self.next_pts.unwrap_or(0);
        let opened = self
            .opened
            .as_mut()
            .ok_or_else(|| EncodeError::InvalidState("aac encoder used before configure".into()))?;
        let bpf = opened.input_format.bytes_per_sample() * opened.channels;
        let bytes: Vec<u8> = self.pending.drain(..samples * bpf).collect();

        let mut frame = ffmpeg::util::frame::Audio::new(ENCODER_SAMPLE_FMT, samples, opened.layout);
        frame.set_rate(opened.sample_rate);
        frame.set_pts(Some(pts));
        for ch in 0..opened.channels {
            let plane = frame.data_mut(ch);
            for (i, out) in plane.chunks_exact_mut(4).take(samples).enumerate() {
                let offset = (i * opened.channels + ch) * opened.input_format.bytes_per_sample();
                let value = sample_as_f32(opened.input_format, &bytes[offset..]);
                out.copy_from_slice(&value.to_ne_bytes());
            }
        }

        opened.encoder.send_frame(&frame).map_err(|e| {
            EncodeError::Ffmpeg(FfmpegError::EncodeFrame(format!(
                "AAC encoder send_frame error: {}",
                e
            )))
        })?;
        self.next_pts = Some(pts + samples as i64);

        drain_packets(opened)
    }
}

impl FrameEncoder for AacEncoder {
    fn name(&self) -> &'static str {
        "aac"
    }

    fn configure(&mut self, format: &MediaFormat) -> Result<()> {
        let sample_rate = format.require_i32(KEY_SAMPLE_RATE)? as u32;
        let channels = format.require_i32(KEY_CHANNEL_COUNT)? as usize;
        let encoding = format.require_i32(KEY_PCM_ENCODING)?;
        let input_format = format_for_encoding(encoding).ok_or_else(|| {
            EncodeError::Config(format!("unknown pcm encoding {:#x}", encoding))
        })?;
        let bitrate = format
            .get_i32(KEY_BIT_RATE)
            .map(|b| b as u64)
            .unwrap_or_else(|| get_recommended_bitrate(channels as u16));

        let layout = match channels {
            1 => ChannelLayout::MONO,
            2 => ChannelLayout::STEREO,
            n => {
                return Err(EncodeError::UnsupportedLayout(format!(
                    "aac backend supports mono or stereo, got {} channels",
                    n
                )))
            }
        };

        let codec = codec::encoder::find(codec::Id::AAC).ok_or_else(|| {
            EncodeError::Ffmpeg(FfmpegError::EncoderNotFound(
                "AAC encoder not found in this FFmpeg build".into(),
            ))
        })?;

        // Build context and configure the audio encoder BEFORE opening
        let mut context = codec::Context::new_with_codec(codec);
        context.set_time_base(ffmpeg::Rational::new(1, sample_rate as i32));

        let mut audio_enc = context.encoder().audio().map_err(|e| {
            EncodeError::Ffmpeg(FfmpegError::EncoderCreate(format!(
                "Cannot get audio encoder handle: {}",
                e
            )))
        })?;

        audio_enc.set_rate(sample_rate as i32);
        audio_enc.set_format(ENCODER_SAMPLE_FMT);
        audio_enc.set_channel_layout(layout);
        audio_enc.set_bit_rate(bitrate as usize);

        let encoder = audio_enc.open_as(codec).map_err(|e| {
            EncodeError::Ffmpeg(FfmpegError::EncoderCreate(format!(
                "Failed to open AAC encoder: {}",
                e
            )))
        })?;

        let frame_size = match encoder.frame_size() as usize {
            0 => AAC_FRAME_SIZE,
            n => n,
        };

        tracing::debug!(sample_rate, channels, bitrate, frame_size, "aac encoder opened");

        self.opened = Some(Opened {
            encoder,
            layout,
            input_format,
            channels,
            sample_rate,
            frame_size,
        });
        self.pending.clear();
        self.next_pts = None;
        Ok(())
    }

    fn encode(&mut self, pcm: &[u8], pts_us: i64) -> Result<Vec<EncodedChunk>> {
        let opened = self.opened()?;
        let bpf = opened.input_format.bytes_per_sample() * opened.channels;
        let frame_bytes = opened.frame_size * bpf;
        let frame_size = opened.frame_size;
        let rate = opened.sample_rate as i64;

        if self.next_pts.is_none() {
            self.next_pts = Some(pts_us * rate / 1_000_000);
        }
        self.pending.extend_from_slice(pcm);

        let mut chunks = Vec::new();
        while self.pending.len() >= frame_bytes {
            chunks.extend(self.encode_samples(frame_size)?);
        }
        Ok(chunks)
    }

    fn flush(&mut self) -> Result<Vec<EncodedChunk>> {
        let opened = self.opened()?;
        let bpf = opened.input_format.bytes_per_sample() * opened.channels;

        let mut chunks = Vec::new();
        let tail = self.pending.len() / bpf;
        if tail > 0 {
            // AAC accepts a short final frame
            chunks.extend(self.encode_samples(tail)?);
        }
        self.pending.clear();

        let opened = self.opened()?;
        opened.encoder.send_eof().map_err(|e| {
            EncodeError::Ffmpeg(FfmpegError::EncodeFrame(format!(
                "AAC encoder send_eof error: {}",
                e
            )))
        })?;
        chunks.extend(drain_packets(opened)?);
        Ok(chunks)
    }
}

/// Receive every packet the encoder has ready.
fn drain_packets(opened: &mut Opened) -> Result<Vec<EncodedChunk>> {
    let mut chunks = Vec::new();
    loop {
        let mut packet = ffmpeg::codec::packet::Packet::empty();
        match opened.encoder.receive_packet(&mut packet) {
            Ok(()) => {
                let pts = packet.pts().unwrap_or(0);
                let data = packet.data().map(Bytes::copy_from_slice).unwrap_or_default();
                chunks.push(EncodedChunk {
                    data,
                    pts_us: pts * 1_000_000 / opened.sample_rate as i64,
                    flags: BufferFlags::NONE,
                });
            }
            Err(ffmpeg::Error::Other { errno }) if errno == ffmpeg::error::EAGAIN => break,
            Err(ffmpeg::Error::Eof) => break,
            Err(e) => {
                return Err(EncodeError::Ffmpeg(FfmpegError::EncodeFrame(format!(
                    "AAC encoder receive_packet error: {}",
                    e
                ))))
            }
        }
    }
    Ok(chunks)
}

/// Read one little-endian interleaved sample as a float in [-1, 1].
fn sample_as_f32(format: SampleFormat, bytes: &[u8]) -> f32 {
    match format {
        SampleFormat::U8 => (bytes[0] as f32 - 128.0) / 128.0,
        SampleFormat::S16 => i16::from_le_bytes([bytes[0], bytes[1]]) as f32 / 32768.0,
        SampleFormat::S32 => {
            i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f32 / 2_147_483_648.0
        }
        SampleFormat::Flt => f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
        SampleFormat::Dbl => {
            let mut b = [0u8; 8];
            b.copy_from_slice(&bytes[..8]);
            f64::from_le_bytes(b) as f32
        }
    }
}

/// Check whether the FFmpeg build includes an AAC encoder.
pub fn is_aac_encoder_available() -> bool {
    codec::encoder::find(codec::Id::AAC).is_some()
}

/// Get recommended AAC bitrate for a given channel count.
pub fn get_recommended_bitrate(channels: u16) -> u64 {
    match channels {
        1 => 64_000,
        2 => 128_000,
        6 => 384_000,
        8 => 512_000,
        _ => 128_000,
    }
}
