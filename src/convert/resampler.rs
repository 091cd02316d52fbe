//! libswresample-backed format converter
//!
//! Converts interleaved PCM of any supported format, layout and rate to the
//! stream's negotiated caps. Packets already in the output caps are passed
//! through without touching FFmpeg.

use ffmpeg_next as ffmpeg;
use ffmpeg_next::software::resampling;
use ffmpeg_next::util::channel_layout::ChannelLayout as FfLayout;
use ffmpeg_next::util::format::sample::{Sample, Type};

use crate::error::{EncodeError, FfmpegError, Result};
use crate::format::{AudioCaps, ChannelLayout, ChannelPosition, Rational, SampleFormat};
use crate::stream::frame::AudioFrame;

use super::{ConverterState, FormatConverter};

/// Converter wrapping FFmpeg's `SwrContext`
pub struct SwrConverter {
    caps: AudioCaps,
    state: ConverterState,
    /// Context built for the last seen source caps
    context: Option<(AudioCaps, resampling::Context)>,
}

// SAFETY: ffmpeg-next's resampling::Context holds a raw SwrContext pointer and
// so is not Send. An SwrContext has no thread affinity; it only must not be
// used from two threads at once, which `&mut self` already rules out.
unsafe impl Send for SwrConverter {}

impl SwrConverter {
    pub fn new(caps: AudioCaps) -> Self {
        Self {
            caps,
            state: ConverterState::Null,
            context: None,
        }
    }

    fn context_for(&mut self, src: &AudioCaps) -> Result<&mut resampling::Context> {
        let stale = self.context.as_ref().map_or(true, |(cached, _)| cached != src);
        if stale {
            tracing::debug!(from = %src, to = %self.caps, "creating resampling context");
            let context = resampling::Context::get(
                to_ffmpeg_sample(src.format),
                to_ffmpeg_layout(&src.layout),
                src.rate,
                to_ffmpeg_sample(self.caps.format),
                to_ffmpeg_layout(&self.caps.layout),
                self.caps.rate,
            )
            .map_err(|e| {
                EncodeError::Ffmpeg(FfmpegError::ResamplerCreate(format!(
                    "Failed to create resampling context {} -> {}: {}",
                    src, self.caps, e
                )))
            })?;
            self.context = Some((src.clone(), context));
        }

        match self.context.as_mut() {
            Some((_, context)) => Ok(context),
            None => Err(EncodeError::Converter("resampling context missing".into())),
        }
    }
}

impl FormatConverter for SwrConverter {
    fn output_caps(&self) -> &AudioCaps {
        &self.caps
    }

    fn state(&self) -> ConverterState {
        self.state
    }

    fn set_state(&mut self, state: ConverterState) -> Result<()> {
        if state == ConverterState::Null {
            // Drop delayed samples along with the context
            self.context = None;
        }
        self.state = state;
        Ok(())
    }

    fn convert(&mut self, packet: &AudioFrame) -> Result<Option<AudioFrame>> {
        if self.state != ConverterState::Running {
            return Ok(None);
        }
        if packet.caps() == &self.caps {
            return Ok(Some(packet.clone()));
        }

        let src = packet.caps().clone();
        let samples = packet.samples();
        if samples == 0 {
            return Ok(None);
        }

        let mut input =
            ffmpeg::util::frame::Audio::new(to_ffmpeg_sample(src.format), samples, to_ffmpeg_layout(&src.layout));
        input.set_rate(src.rate);
        let in_bytes = samples * src.bytes_per_frame();
        input.data_mut(0)[..in_bytes].copy_from_slice(&packet.data()[..in_bytes]);

        // Output frame must be empty: swr_convert_frame allocates it from the
        // context configuration.
        let mut out = ffmpeg::util::frame::Audio::empty();
        self.context_for(&src)?.run(&input, &mut out).map_err(|e| {
            EncodeError::Ffmpeg(FfmpegError::Resample(format!("Resampling error: {}", e)))
        })?;

        if out.samples() == 0 {
            return Ok(None);
        }

        let out_bytes = out.samples() * self.caps.bytes_per_frame();
        let rate = self.caps.rate;
        let pts = (packet.pts() as f64 * packet.time_base().value() * rate as f64).round() as i64;

        Ok(Some(AudioFrame::new(
            self.caps.clone(),
            &out.data(0)[..out_bytes],
            pts,
            Rational::new(1, rate as i32),
        )))
    }
}

fn to_ffmpeg_sample(format: SampleFormat) -> Sample {
    match format {
        SampleFormat::U8 => Sample::U8(Type::Packed),
        SampleFormat::S16 => Sample::I16(Type::Packed),
        SampleFormat::S32 => Sample::I32(Type::Packed),
        SampleFormat::Flt => Sample::F32(Type::Packed),
        SampleFormat::Dbl => Sample::F64(Type::Packed),
    }
}

fn to_ffmpeg_position(position: ChannelPosition) -> FfLayout {
    match position {
        ChannelPosition::FrontLeft => FfLayout::FRONT_LEFT,
        ChannelPosition::FrontRight => FfLayout::FRONT_RIGHT,
        ChannelPosition::FrontCenter => FfLayout::FRONT_CENTER,
        ChannelPosition::LowFrequency => FfLayout::LOW_FREQUENCY,
        ChannelPosition::BackLeft => FfLayout::BACK_LEFT,
        ChannelPosition::BackRight => FfLayout::BACK_RIGHT,
        ChannelPosition::FrontLeftOfCenter => FfLayout::FRONT_LEFT_OF_CENTER,
        ChannelPosition::FrontRightOfCenter => FfLayout::FRONT_RIGHT_OF_CENTER,
        ChannelPosition::BackCenter => FfLayout::BACK_CENTER,
        ChannelPosition::SideLeft => FfLayout::SIDE_LEFT,
        ChannelPosition::SideRight => FfLayout::SIDE_RIGHT,
        ChannelPosition::TopCenter => FfLayout::TOP_CENTER,
        ChannelPosition::LowFrequency2 => FfLayout::LOW_FREQUENCY_2,
    }
}

/// FFmpeg layout with the same positions; samples are expected in FFmpeg's
/// native channel order.
fn to_ffmpeg_layout(layout: &ChannelLayout) -> FfLayout {
    let mapped = layout
        .positions()
        .iter()
        .fold(FfLayout::empty(), |acc, &p| acc | to_ffmpeg_position(p));

    if mapped.bits() == 0 {
        // No channel layout set; fall back based on channel count
        match layout.channels() {
            1 => FfLayout::MONO,
            _ => FfLayout::STEREO,
        }
    } else {
        mapped
    }
}
