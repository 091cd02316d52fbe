//! Media codec buffer-queue interface
//!
//! This module handles:
//! - The indexed input/output buffer exchange a codec exposes
//! - Buffer metadata records and flags
//! - The format descriptor a codec is configured with
//! - An in-process codec implementing the same protocol (`software`)

#[cfg(feature = "ffmpeg")]
pub mod aac;
pub mod software;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::BitOr;
use std::time::Duration;

use crate::error::{EncodeError, Result};
use crate::format::mapping::{channel_mask_for_layout, encoding_for_format};
use crate::format::AudioCaps;

/// Flags attached to a queued input or dequeued output buffer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BufferFlags(pub u32);

impl BufferFlags {
    pub const NONE: BufferFlags = BufferFlags(0);
    pub const CODEC_CONFIG: BufferFlags = BufferFlags(0x2);
    pub const END_OF_STREAM: BufferFlags = BufferFlags(0x4);

    pub fn contains(self, other: BufferFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_end_of_stream(self) -> bool {
        self.contains(Self::END_OF_STREAM)
    }

    pub fn is_codec_config(self) -> bool {
        self.contains(Self::CODEC_CONFIG)
    }
}

impl BitOr for BufferFlags {
    type Output = BufferFlags;

    fn bitor(self, rhs: BufferFlags) -> BufferFlags {
        BufferFlags(self.0 | rhs.0)
    }
}

/// Metadata for one dequeued output buffer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferInfo {
    /// Start of valid data within the buffer
    pub offset: usize,
    /// Number of valid bytes from `offset`
    pub size: usize,
    pub presentation_time_us: i64,
    pub flags: BufferFlags,
}

/// Result of asking the codec for an output buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DequeuedOutput {
    /// An encoded buffer is ready at `index`
    Buffer { index: usize, info: BufferInfo },
    /// Nothing ready within the timeout
    TryAgainLater,
    /// The output format was (re)negotiated; no buffer this time
    FormatChanged,
    /// The output buffer set was replaced; no buffer this time
    BuffersChanged,
}

/// Buffer-queue codec protocol.
///
/// Buffers are owned by the codec and addressed by index. An input index is
/// obtained from `dequeue_input_buffer`, filled through `input_buffer` and
/// handed back with `queue_input_buffer`. An output index obtained from
/// `dequeue_output_buffer` is read through `output_buffer` and handed back
/// with `release_output_buffer`.
///
/// `Ok(None)` / `TryAgainLater` are transient; `Err` is a fatal codec failure.
pub trait MediaCodec: Send {
    fn configure(&mut self, format: &MediaFormat) -> Result<()>;

    fn start(&mut self) -> Result<()>;

    fn stop(&mut self) -> Result<()>;

    fn dequeue_input_buffer(&mut self, timeout: Duration) -> Result<Option<usize>>;

    /// Writable memory of a dequeued input buffer; `None` if the codec has none.
    fn input_buffer(&mut self, index: usize) -> Option<&mut [u8]>;

    fn queue_input_buffer(
        &mut self,
        index: usize,
        offset: usize,
        size: usize,
        presentation_time_us: u64,
        flags: BufferFlags,
    ) -> Result<()>;

    fn dequeue_output_buffer(&mut self, timeout: Duration) -> Result<DequeuedOutput>;

    /// Readable memory of a dequeued output buffer; `None` if the codec has none.
    fn output_buffer(&self, index: usize) -> Option<&[u8]>;

    fn release_output_buffer(&mut self, index: usize, render: bool) -> Result<()>;
}

impl<C: MediaCodec + ?Sized> MediaCodec for Box<C> {
    fn configure(&mut self, format: &MediaFormat) -> Result<()> {
        (**self).configure(format)
    }

    fn start(&mut self) -> Result<()> {
        (**self).start()
    }

    fn stop(&mut self) -> Result<()> {
        (**self).stop()
    }

    fn dequeue_input_buffer(&mut self, timeout: Duration) -> Result<Option<usize>> {
        (**self).dequeue_input_buffer(timeout)
    }

    fn input_buffer(&mut self, index: usize) -> Option<&mut [u8]> {
        (**self).input_buffer(index)
    }

    fn queue_input_buffer(
        &mut self,
        index: usize,
        offset: usize,
        size: usize,
        presentation_time_us: u64,
        flags: BufferFlags,
    ) -> Result<()> {
        (**self).queue_input_buffer(index, offset, size, presentation_time_us, flags)
    }

    fn dequeue_output_buffer(&mut self, timeout: Duration) -> Result<DequeuedOutput> {
        (**self).dequeue_output_buffer(timeout)
    }

    fn output_buffer(&self, index: usize) -> Option<&[u8]> {
        (**self).output_buffer(index)
    }

    fn release_output_buffer(&mut self, index: usize, render: bool) -> Result<()> {
        (**self).release_output_buffer(index, render)
    }
}

pub const KEY_MIME: &str = "mime";
pub const KEY_PCM_ENCODING: &str = "pcm-encoding";
pub const KEY_CHANNEL_MASK: &str = "channel-mask";
pub const KEY_CHANNEL_COUNT: &str = "channel-count";
pub const KEY_SAMPLE_RATE: &str = "sample-rate";
pub const KEY_BIT_RATE: &str = "bitrate";
pub const KEY_MAX_INPUT_SIZE: &str = "max-input-size";

/// Key/value format descriptor handed to `MediaCodec::configure`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaFormat {
    mime: String,
    ints: BTreeMap<String, i32>,
}

impl MediaFormat {
    pub fn new(mime: impl Into<String>) -> Self {
        Self {
            mime: mime.into(),
            ints: BTreeMap::new(),
        }
    }

    /// Descriptor for PCM input of the given caps.
    ///
    /// Fails when the sample format has no codec encoding or when no channel
    /// of the layout can be expressed in the codec channel mask.
    pub fn for_audio(mime: impl Into<String>, caps: &AudioCaps) -> Result<Self> {
        let encoding = encoding_for_format(caps.format)?;
        let mask = channel_mask_for_layout(&caps.layout);
        if mask == 0 {
            return Err(EncodeError::UnsupportedLayout(caps.layout.to_string()));
        }

        let mut format = Self::new(mime);
        format.set_i32(KEY_PCM_ENCODING, encoding);
        format.set_i32(KEY_CHANNEL_MASK, mask);
        format.set_i32(KEY_CHANNEL_COUNT, caps.channels() as i32);
        format.set_i32(KEY_SAMPLE_RATE, caps.rate as i32);
        Ok(format)
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub fn set_i32(&mut self, key: &str, value: i32) {
        self.ints.insert(key.to_string(), value);
    }

    pub fn get_i32(&self, key: &str) -> Option<i32> {
        self.ints.get(key).copied()
    }

    /// Fetch a key the codec cannot work without.
    pub fn require_i32(&self, key: &str) -> Result<i32> {
        self.get_i32(key)
            .ok_or_else(|| EncodeError::Config(format!("media format is missing '{}'", key)))
    }
}
