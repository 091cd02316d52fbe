//! Accumulable interleaved PCM frame

use bytes::BytesMut;

use crate::format::{AudioCaps, Rational};

/// A run of interleaved PCM samples with a presentation timestamp
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrame {
    caps: AudioCaps,
    data: BytesMut,
    pts: i64,
    time_base: Rational,
}

impl AudioFrame {
    pub fn new(caps: AudioCaps, data: &[u8], pts: i64, time_base: Rational) -> Self {
        Self {
            caps,
            data: BytesMut::from(data),
            pts,
            time_base,
        }
    }

    /// A silent frame of `samples` sample frames.
    ///
    /// Unsigned 8-bit silence is the midpoint value, everything else is zero.
    pub fn silence(caps: AudioCaps, samples: usize, pts: i64, time_base: Rational) -> Self {
        let fill: u8 = if caps.format == crate::format::SampleFormat::U8 {
            0x80
        } else {
            0
        };
        let data = vec![fill; samples * caps.bytes_per_frame()];
        Self::new(caps, &data, pts, time_base)
    }

    pub fn caps(&self) -> &AudioCaps {
        &self.caps
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn pts(&self) -> i64 {
        self.pts
    }

    pub fn time_base(&self) -> Rational {
        self.time_base
    }

    /// Number of whole interleaved sample frames carried.
    pub fn samples(&self) -> usize {
        match self.caps.bytes_per_frame() {
            0 => 0,
            bpf => self.data.len() / bpf,
        }
    }

    /// A frame worth handing to the codec: has data, channels and a rate.
    pub fn is_valid(&self) -> bool {
        !self.data.is_empty() && self.caps.channels() > 0 && self.caps.rate > 0
    }

    /// Presentation time in microseconds: `round(10^6 * pts * time_base)`.
    pub fn presentation_time_us(&self) -> i64 {
        (1e6 * self.pts as f64 * self.time_base.value()).round() as i64
    }

    /// Append `other` after this frame's samples.
    ///
    /// An empty frame is simply replaced. When the caps differ `self` is left
    /// untouched and `other` is handed back.
    pub fn append(&mut self, other: AudioFrame) -> Result<(), AudioFrame> {
        if self.data.is_empty() {
            *self = other;
            return Ok(());
        }

        if self.caps != other.caps {
            return Err(other);
        }

        self.data.extend_from_slice(&other.data);
        Ok(())
    }

    /// Split at `max_bytes`, rounded down to a whole sample frame.
    ///
    /// `self` keeps the head; the tail is returned with its pts advanced by the
    /// duration of the head. Returns `None` when nothing is left over.
    pub fn split_off(&mut self, max_bytes: usize) -> Option<AudioFrame> {
        let bpf = self.caps.bytes_per_frame().max(1);
        let at = (max_bytes / bpf) * bpf;
        if at >= self.data.len() {
            return None;
        }

        let tail = self.data.split_off(at);
        let head_samples = (at / bpf) as f64;
        let tb = self.time_base.value();
        let advance = if tb > 0.0 && self.caps.rate > 0 {
            (head_samples / self.caps.rate as f64 / tb).round() as i64
        } else {
            0
        };

        Some(AudioFrame {
            caps: self.caps.clone(),
            data: tail,
            pts: self.pts + advance,
            time_base: self.time_base,
        })
    }
}
