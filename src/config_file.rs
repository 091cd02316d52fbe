//! Configuration file support
//!
//! Loads encoder configuration from TOML files, or JSON when the path ends
//! in `.json`.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::config::{
    CodecBackend, CodecConfig, EncoderConfig, OversizePolicy, SourceConfig, StreamConfig,
    TimingConfig,
};
use crate::format::{ChannelLayout, ChannelPosition, SampleFormat};

/// Configuration file format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Negotiated stream parameters
    pub stream: StreamSettings,
    /// Codec settings
    pub codec: Option<CodecSettings>,
    /// Bounded waits
    pub timing: Option<TimingSettings>,
    /// Demo tone source
    pub source: Option<SourceSettings>,
    /// Logging settings
    pub logging: Option<LoggingSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamSettings {
    /// Sample format (u8, s16, flt)
    pub sample_format: SampleFormat,
    /// Channel positions, e.g. ["front_left", "front_right"]
    pub channels: Vec<ChannelPosition>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Output stream index
    pub stream_index: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodecSettings {
    /// Codec backend (pcm, aac)
    pub backend: CodecBackend,
    /// Bitrate in bps
    pub bitrate: Option<u64>,
    /// Input buffer capacity in bytes
    pub input_buffer_size: Option<usize>,
    /// Output buffer capacity in bytes
    pub output_buffer_size: Option<usize>,
    /// Buffers per direction
    pub buffer_count: Option<usize>,
    /// Oversized frame handling (truncate, carry)
    pub oversize_policy: Option<OversizePolicy>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingSettings {
    /// Codec buffer wait in microseconds
    pub codec_timeout_us: Option<u64>,
    /// Frame wait in milliseconds
    pub frame_wait_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSettings {
    pub duration_secs: Option<f64>,
    pub tone_hz: Option<f64>,
    pub frame_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Output format (json, pretty)
    pub format: Option<String>,
}

impl ConfigFile {
    /// Load configuration from a TOML or JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: ConfigFile = if is_json(path.as_ref()) {
            serde_json::from_str(&content)?
        } else {
            toml::from_str(&content)?
        };
        Ok(config)
    }

    /// Save configuration, as JSON if the path ends in `.json`
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let content = if is_json(path.as_ref()) {
            serde_json::to_string_pretty(self)?
        } else {
            toml::to_string_pretty(self)?
        };
        std::fs::write(path.as_ref(), content)?;
        Ok(())
    }

    /// Generate default configuration file
    pub fn default_config() -> Self {
        Self {
            stream: StreamSettings {
                sample_format: SampleFormat::S16,
                channels: vec![ChannelPosition::FrontLeft, ChannelPosition::FrontRight],
                sample_rate: 48000,
                stream_index: Some(0),
            },
            codec: Some(CodecSettings {
                backend: CodecBackend::Pcm,
                bitrate: None,
                input_buffer_size: Some(16384),
                output_buffer_size: Some(16384),
                buffer_count: Some(4),
                oversize_policy: Some(OversizePolicy::Truncate),
            }),
            timing: Some(TimingSettings {
                codec_timeout_us: Some(5000),
                frame_wait_ms: Some(500),
            }),
            source: Some(SourceSettings {
                duration_secs: Some(2.0),
                tone_hz: Some(440.0),
                frame_ms: Some(20),
            }),
            logging: Some(LoggingSettings {
                level: "info".to_string(),
                format: Some("pretty".to_string()),
            }),
        }
    }

    /// Convert to EncoderConfig, filling absent values with defaults
    pub fn into_encoder_config(self) -> EncoderConfig {
        let defaults = EncoderConfig::default();

        let codec = match self.codec.as_ref() {
            Some(c) => CodecConfig {
                backend: c.backend,
                bitrate: c.bitrate,
                input_buffer_size: c
                    .input_buffer_size
                    .unwrap_or(defaults.codec.input_buffer_size),
                output_buffer_size: c
                    .output_buffer_size
                    .unwrap_or(defaults.codec.output_buffer_size),
                buffer_count: c.buffer_count.unwrap_or(defaults.codec.buffer_count),
            },
            None => defaults.codec,
        };

        let timing = match self.timing {
            Some(t) => TimingConfig {
                codec_timeout_us: t
                    .codec_timeout_us
                    .unwrap_or(defaults.timing.codec_timeout_us),
                frame_wait_ms: t.frame_wait_ms.unwrap_or(defaults.timing.frame_wait_ms),
            },
            None => defaults.timing,
        };

        let source = match self.source {
            Some(s) => SourceConfig {
                duration_secs: s.duration_secs.unwrap_or(defaults.source.duration_secs),
                tone_hz: s.tone_hz.unwrap_or(defaults.source.tone_hz),
                frame_ms: s.frame_ms.unwrap_or(defaults.source.frame_ms),
            },
            None => defaults.source,
        };

        EncoderConfig {
            stream: StreamConfig {
                sample_format: self.stream.sample_format,
                channel_layout: ChannelLayout::from_positions(self.stream.channels),
                sample_rate: self.stream.sample_rate,
                stream_index: self.stream.stream_index.unwrap_or(0),
            },
            codec,
            timing,
            oversize_policy: self
                .codec
                .and_then(|c| c.oversize_policy)
                .unwrap_or_default(),
            source,
            log_level: self
                .logging
                .as_ref()
                .map(|l| l.level.clone())
                .unwrap_or(defaults.log_level),
            log_format: self
                .logging
                .and_then(|l| l.format)
                .unwrap_or(defaults.log_format),
        }
    }
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .map_or(false, |ext| ext.eq_ignore_ascii_case("json"))
}

/// Generate default configuration file at the specified path
pub fn generate_default_config<P: AsRef<Path>>(path: P) -> Result<(), Box<dyn std::error::Error>> {
    let config = ConfigFile::default_config();
    config.to_file(path)?;
    Ok(())
}
