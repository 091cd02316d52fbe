//! PCM audio encode stage
//!
//! Bridges raw audio frames arriving at arbitrary times and sizes to a codec
//! that exchanges fixed, indexed input/output buffers, and hands the encoded
//! output on as timestamped packets.
//!
//! The pieces, leaf to root:
//! - [`format::mapping`]: sample format and channel layout to codec constants
//! - [`stream::accumulator`]: single-slot frame hand-off between threads
//! - [`convert`]: format normalization ahead of the codec
//! - [`engine`]: the per-tick buffer exchange with the codec
//! - [`packet`]: encoded packets built from codec output buffers
//! - [`stream::AudioStream`]: owns all of the above for one stream

pub mod codec;
pub mod config;
pub mod config_file;
pub mod convert;
pub mod engine;
pub mod error;
#[cfg(feature = "ffmpeg")]
pub mod ffmpeg;
pub mod format;
pub mod packet;
pub mod stats;
pub mod stream;

#[cfg(test)]
mod integration;

pub use codec::{BufferFlags, BufferInfo, DequeuedOutput, MediaCodec, MediaFormat};
pub use config::{EncoderConfig, OversizePolicy};
pub use engine::{PacketSink, TickOutcome};
pub use error::{EncodeError, Result};
pub use format::{AudioCaps, ChannelLayout, ChannelPosition, Rational, SampleFormat};
pub use packet::EncodedPacket;
pub use stream::frame::AudioFrame;
pub use stream::AudioStream;
