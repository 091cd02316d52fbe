//! Encoder configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{EncodeError, Result};
use crate::format::mapping::{channel_mask_for_layout, encoding_for_format};
use crate::format::{AudioCaps, ChannelLayout, SampleFormat};

/// Negotiated stream parameters, read once when the stream is built
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Sample format fed to the codec
    pub sample_format: SampleFormat,

    /// Channel positions in interleaving order
    pub channel_layout: ChannelLayout,

    /// Sample rate in Hz
    pub sample_rate: u32,

    /// Index of this stream in the output container
    pub stream_index: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            sample_format: SampleFormat::S16,
            channel_layout: ChannelLayout::stereo(),
            sample_rate: 48000,
            stream_index: 0,
        }
    }
}

impl StreamConfig {
    pub fn caps(&self) -> AudioCaps {
        AudioCaps::new(self.sample_format, self.channel_layout.clone(), self.sample_rate)
    }

    pub fn channels(&self) -> usize {
        self.channel_layout.channels()
    }

    /// Reject parameters the codec could not be configured with.
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(EncodeError::Config("sample_rate must be non-zero".into()));
        }
        if self.channel_layout.is_empty() {
            return Err(EncodeError::Config("channel_layout must not be empty".into()));
        }
        encoding_for_format(self.sample_format)?;
        if channel_mask_for_layout(&self.channel_layout) == 0 {
            return Err(EncodeError::UnsupportedLayout(self.channel_layout.to_string()));
        }
        Ok(())
    }
}

/// Which in-process codec backs the stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodecBackend {
    /// Raw PCM passthrough
    Pcm,
    /// AAC-LC through libavcodec
    Aac,
}

impl CodecBackend {
    pub fn mime(self) -> &'static str {
        match self {
            CodecBackend::Pcm => "audio/raw",
            CodecBackend::Aac => "audio/mp4a-latm",
        }
    }
}

/// Codec buffer pool configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodecConfig {
    pub backend: CodecBackend,

    /// Target bitrate in bps (compressed backends only)
    pub bitrate: Option<u64>,

    /// Capacity of each input buffer in bytes
    pub input_buffer_size: usize,

    /// Initial capacity of each output buffer in bytes
    pub output_buffer_size: usize,

    /// Number of input and of output buffers
    pub buffer_count: usize,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            backend: CodecBackend::Pcm,
            bitrate: None,
            input_buffer_size: 16384,
            output_buffer_size: 16384,
            buffer_count: 4,
        }
    }
}

/// Bounded waits of the encode tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Wait for a codec input/output buffer, in microseconds
    pub codec_timeout_us: u64,

    /// Wait for a converted frame to arrive, in milliseconds
    pub frame_wait_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            codec_timeout_us: 5000,
            frame_wait_ms: 500,
        }
    }
}

impl TimingConfig {
    pub fn codec_timeout(&self) -> Duration {
        Duration::from_micros(self.codec_timeout_us)
    }

    pub fn frame_wait(&self) -> Duration {
        Duration::from_millis(self.frame_wait_ms)
    }
}

/// What to do with a frame larger than one codec input buffer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OversizePolicy {
    /// Submit what fits and drop the rest
    #[default]
    Truncate,
    /// Submit what fits and keep the rest for the next tick
    Carry,
}

/// Test-tone source used by the demo binary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub duration_secs: f64,
    pub tone_hz: f64,
    pub frame_ms: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            duration_secs: 2.0,
            tone_hz: 440.0,
            frame_ms: 20,
        }
    }
}

/// Complete encoder configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncoderConfig {
    pub stream: StreamConfig,

    pub codec: CodecConfig,

    pub timing: TimingConfig,

    pub oversize_policy: OversizePolicy,

    pub source: SourceConfig,

    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Log output format (pretty, json)
    pub log_format: String,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            stream: StreamConfig::default(),
            codec: CodecConfig::default(),
            timing: TimingConfig::default(),
            oversize_policy: OversizePolicy::Truncate,
            source: SourceConfig::default(),
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
        }
    }
}
