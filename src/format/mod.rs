//! Audio format description
//!
//! This module handles:
//! - Sample formats and channel positions negotiated upstream
//! - Channel layouts as ordered sets of positions
//! - Rational timebases for frame timestamps
//! - Codec-facing constant tables (see [`mapping`])

pub mod mapping;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Interleaved PCM sample format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleFormat {
    U8,
    S16,
    S32,
    Flt,
    Dbl,
}

impl SampleFormat {
    /// Size of one sample of one channel in bytes
    pub fn bytes_per_sample(self) -> usize {
        match self {
            SampleFormat::U8 => 1,
            SampleFormat::S16 => 2,
            SampleFormat::S32 | SampleFormat::Flt => 4,
            SampleFormat::Dbl => 8,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SampleFormat::U8 => "u8",
            SampleFormat::S16 => "s16",
            SampleFormat::S32 => "s32",
            SampleFormat::Flt => "flt",
            SampleFormat::Dbl => "dbl",
        }
    }
}

/// Logical speaker position
///
/// A mono stream is carried as a single `FrontCenter` channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelPosition {
    FrontLeft,
    FrontRight,
    FrontCenter,
    LowFrequency,
    BackLeft,
    BackRight,
    FrontLeftOfCenter,
    FrontRightOfCenter,
    BackCenter,
    SideLeft,
    SideRight,
    TopCenter,
    LowFrequency2,
}

impl ChannelPosition {
    pub fn name(self) -> &'static str {
        match self {
            ChannelPosition::FrontLeft => "FL",
            ChannelPosition::FrontRight => "FR",
            ChannelPosition::FrontCenter => "FC",
            ChannelPosition::LowFrequency => "LFE",
            ChannelPosition::BackLeft => "BL",
            ChannelPosition::BackRight => "BR",
            ChannelPosition::FrontLeftOfCenter => "FLC",
            ChannelPosition::FrontRightOfCenter => "FRC",
            ChannelPosition::BackCenter => "BC",
            ChannelPosition::SideLeft => "SL",
            ChannelPosition::SideRight => "SR",
            ChannelPosition::TopCenter => "TC",
            ChannelPosition::LowFrequency2 => "LFE2",
        }
    }
}

/// Ordered set of channel positions; sample data is interleaved in this order
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelLayout(Vec<ChannelPosition>);

impl ChannelLayout {
    /// Build a layout from positions, dropping duplicates but keeping first-seen order.
    pub fn from_positions<I>(positions: I) -> Self
    where
        I: IntoIterator<Item = ChannelPosition>,
    {
        let mut out: Vec<ChannelPosition> = Vec::new();
        for p in positions {
            if !out.contains(&p) {
                out.push(p);
            }
        }
        Self(out)
    }

    pub fn mono() -> Self {
        Self(vec![ChannelPosition::FrontCenter])
    }

    pub fn stereo() -> Self {
        Self(vec![ChannelPosition::FrontLeft, ChannelPosition::FrontRight])
    }

    pub fn surround_5_1() -> Self {
        Self(vec![
            ChannelPosition::FrontLeft,
            ChannelPosition::FrontRight,
            ChannelPosition::FrontCenter,
            ChannelPosition::LowFrequency,
            ChannelPosition::BackLeft,
            ChannelPosition::BackRight,
        ])
    }

    pub fn surround_7_1() -> Self {
        Self(vec![
            ChannelPosition::FrontLeft,
            ChannelPosition::FrontRight,
            ChannelPosition::FrontCenter,
            ChannelPosition::LowFrequency,
            ChannelPosition::BackLeft,
            ChannelPosition::BackRight,
            ChannelPosition::SideLeft,
            ChannelPosition::SideRight,
        ])
    }

    pub fn positions(&self) -> &[ChannelPosition] {
        &self.0
    }

    pub fn channels(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ChannelLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.0.iter().map(|p| p.name()).collect();
        write!(f, "{}", names.join("+"))
    }
}

/// Rational number of seconds represented by one timestamp unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rational {
    pub num: i32,
    pub den: i32,
}

impl Rational {
    pub const MICROSECONDS: Rational = Rational { num: 1, den: 1_000_000 };

    pub const fn new(num: i32, den: i32) -> Self {
        Self { num, den }
    }

    /// Value of the fraction; a zero denominator yields 0.0.
    pub fn value(self) -> f64 {
        if self.den == 0 {
            0.0
        } else {
            self.num as f64 / self.den as f64
        }
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

#[cfg(feature = "ffmpeg")]
impl From<ffmpeg_next::Rational> for Rational {
    fn from(r: ffmpeg_next::Rational) -> Self {
        Self::new(r.numerator(), r.denominator())
    }
}

#[cfg(feature = "ffmpeg")]
impl From<Rational> for ffmpeg_next::Rational {
    fn from(r: Rational) -> Self {
        ffmpeg_next::Rational::new(r.num, r.den)
    }
}

/// Negotiated audio capabilities of a stream or frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioCaps {
    pub format: SampleFormat,
    pub layout: ChannelLayout,
    pub rate: u32,
}

impl AudioCaps {
    pub fn new(format: SampleFormat, layout: ChannelLayout, rate: u32) -> Self {
        Self {
            format,
            layout,
            rate,
        }
    }

    pub fn channels(&self) -> usize {
        self.layout.channels()
    }

    /// Bytes occupied by one sample of every channel (one interleaved sample frame)
    pub fn bytes_per_frame(&self) -> usize {
        self.format.bytes_per_sample() * self.channels()
    }
}

impl fmt::Display for AudioCaps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}Hz", self.format.name(), self.layout, self.rate)
    }
}
