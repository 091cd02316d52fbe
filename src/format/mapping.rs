//! Codec-facing constants for sample formats and channel layouts
//!
//! Pure lookup tables between the negotiated audio caps and the integer
//! values a media codec expects in its format descriptor.

use crate::error::{EncodeError, Result};

use super::{ChannelLayout, ChannelPosition, SampleFormat};

pub const ENCODING_PCM_16BIT: i32 = 0x2;
pub const ENCODING_PCM_8BIT: i32 = 0x3;
pub const ENCODING_PCM_FLOAT: i32 = 0x4;

pub const CHANNEL_MASK_MONO: i32 = 0x2;
pub const CHANNEL_MASK_FRONT_LEFT: i32 = 0x4;
pub const CHANNEL_MASK_FRONT_RIGHT: i32 = 0x8;
pub const CHANNEL_MASK_FRONT_CENTER: i32 = 0x10;
pub const CHANNEL_MASK_LOW_FREQUENCY: i32 = 0x20;
pub const CHANNEL_MASK_BACK_LEFT: i32 = 0x40;
pub const CHANNEL_MASK_BACK_RIGHT: i32 = 0x80;
pub const CHANNEL_MASK_FRONT_LEFT_OF_CENTER: i32 = 0x100;
pub const CHANNEL_MASK_FRONT_RIGHT_OF_CENTER: i32 = 0x200;
pub const CHANNEL_MASK_BACK_CENTER: i32 = 0x400;
pub const CHANNEL_MASK_SIDE_LEFT: i32 = 0x800;
pub const CHANNEL_MASK_SIDE_RIGHT: i32 = 0x1000;

const POSITION_TO_MASK: &[(ChannelPosition, i32)] = &[
    (ChannelPosition::FrontLeft, CHANNEL_MASK_FRONT_LEFT),
    (ChannelPosition::FrontRight, CHANNEL_MASK_FRONT_RIGHT),
    (ChannelPosition::FrontCenter, CHANNEL_MASK_FRONT_CENTER),
    (ChannelPosition::LowFrequency, CHANNEL_MASK_LOW_FREQUENCY),
    (ChannelPosition::BackLeft, CHANNEL_MASK_BACK_LEFT),
    (ChannelPosition::BackRight, CHANNEL_MASK_BACK_RIGHT),
    (ChannelPosition::FrontLeftOfCenter, CHANNEL_MASK_FRONT_LEFT_OF_CENTER),
    (ChannelPosition::FrontRightOfCenter, CHANNEL_MASK_FRONT_RIGHT_OF_CENTER),
    (ChannelPosition::BackCenter, CHANNEL_MASK_BACK_CENTER),
    (ChannelPosition::SideLeft, CHANNEL_MASK_SIDE_LEFT),
    (ChannelPosition::SideRight, CHANNEL_MASK_SIDE_RIGHT),
];

// Ascending by bit. The legacy mono bit aliases front-center.
const MASK_TO_POSITION: &[(i32, ChannelPosition)] = &[
    (CHANNEL_MASK_MONO, ChannelPosition::FrontCenter),
    (CHANNEL_MASK_FRONT_LEFT, ChannelPosition::FrontLeft),
    (CHANNEL_MASK_FRONT_RIGHT, ChannelPosition::FrontRight),
    (CHANNEL_MASK_FRONT_CENTER, ChannelPosition::FrontCenter),
    (CHANNEL_MASK_LOW_FREQUENCY, ChannelPosition::LowFrequency),
    (CHANNEL_MASK_BACK_LEFT, ChannelPosition::BackLeft),
    (CHANNEL_MASK_BACK_RIGHT, ChannelPosition::BackRight),
    (CHANNEL_MASK_FRONT_LEFT_OF_CENTER, ChannelPosition::FrontLeftOfCenter),
    (CHANNEL_MASK_FRONT_RIGHT_OF_CENTER, ChannelPosition::FrontRightOfCenter),
    (CHANNEL_MASK_BACK_CENTER, ChannelPosition::BackCenter),
    (CHANNEL_MASK_SIDE_LEFT, ChannelPosition::SideLeft),
    (CHANNEL_MASK_SIDE_RIGHT, ChannelPosition::SideRight),
];

/// Codec PCM encoding constant for a sample format.
///
/// Only u8, s16 and float have a codec encoding; anything else must have been
/// converted upstream.
pub fn encoding_for_format(format: SampleFormat) -> Result<i32> {
    match format {
        SampleFormat::U8 => Ok(ENCODING_PCM_8BIT),
        SampleFormat::S16 => Ok(ENCODING_PCM_16BIT),
        SampleFormat::Flt => Ok(ENCODING_PCM_FLOAT),
        other => Err(EncodeError::UnsupportedFormat(other)),
    }
}

/// Sample format for a codec PCM encoding constant.
pub fn format_for_encoding(encoding: i32) -> Option<SampleFormat> {
    match encoding {
        ENCODING_PCM_8BIT => Some(SampleFormat::U8),
        ENCODING_PCM_16BIT => Some(SampleFormat::S16),
        ENCODING_PCM_FLOAT => Some(SampleFormat::Flt),
        _ => None,
    }
}

/// Single-bit codec mask for one position, if the codec can express it.
pub fn channel_mask_for_position(position: ChannelPosition) -> Option<i32> {
    POSITION_TO_MASK
        .iter()
        .find(|(p, _)| *p == position)
        .map(|(_, mask)| *mask)
}

/// Codec channel mask for a layout: the OR of every mappable position's bit.
///
/// Positions the codec mask cannot express contribute nothing.
pub fn channel_mask_for_layout(layout: &ChannelLayout) -> i32 {
    layout.positions().iter().fold(0, |mask, &position| {
        match channel_mask_for_position(position) {
            Some(bit) => mask | bit,
            None => {
                tracing::debug!(position = position.name(), "channel position has no codec mask bit");
                mask
            }
        }
    })
}

/// Rebuild a layout from a codec channel mask, in ascending bit order.
///
/// Unknown bits are ignored.
pub fn layout_for_channel_mask(mask: i32) -> ChannelLayout {
    ChannelLayout::from_positions(
        MASK_TO_POSITION
            .iter()
            .filter(|(bit, _)| mask & bit != 0)
            .map(|(_, position)| *position),
    )
}
