//! Encoded packets handed to the muxer

use bytes::Bytes;

use crate::codec::{BufferFlags, BufferInfo, MediaCodec};
use crate::error::{EncodeError, Result};
use crate::format::Rational;

/// One drained codec output buffer, detached from codec memory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedPacket {
    data: Bytes,
    pts: i64,
    time_base: Rational,
    stream_index: usize,
    id: i32,
    flags: BufferFlags,
}

impl EncodedPacket {
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Presentation time in `time_base` units (microseconds)
    pub fn pts(&self) -> i64 {
        self.pts
    }

    pub fn time_base(&self) -> Rational {
        self.time_base
    }

    pub fn stream_index(&self) -> usize {
        self.stream_index
    }

    /// Always 0; telling packets apart is up to the muxer.
    pub fn id(&self) -> i32 {
        self.id
    }

    pub fn flags(&self) -> BufferFlags {
        self.flags
    }

    /// Codec-specific data rather than a media sample
    pub fn is_codec_config(&self) -> bool {
        self.flags.is_codec_config()
    }

    /// Last packet of the session; usually carries no payload
    pub fn is_end_of_stream(&self) -> bool {
        self.flags.is_end_of_stream()
    }
}

/// Copy an output buffer's valid region into a new packet.
///
/// Reads at most `min(buffer length, info.size)` bytes from `info.offset`,
/// clamped to the end of the buffer, so metadata overstating the size can
/// never cause an out-of-bounds read. Fails if the codec has no memory behind
/// `index`.
pub fn assemble<C>(
    codec: &C,
    index: usize,
    info: &BufferInfo,
    stream_index: usize,
) -> Result<EncodedPacket>
where
    C: MediaCodec + ?Sized,
{
    let buffer = codec
        .output_buffer(index)
        .ok_or(EncodeError::CodecBufferUnavailable { index })?;

    let start = info.offset.min(buffer.len());
    let len = info.size.min(buffer.len()).min(buffer.len() - start);

    Ok(EncodedPacket {
        data: Bytes::copy_from_slice(&buffer[start..start + len]),
        pts: info.presentation_time_us,
        time_base: Rational::MICROSECONDS,
        stream_index,
        id: 0,
        flags: info.flags,
    })
}
