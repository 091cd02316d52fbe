//! Format conversion ahead of the codec
//!
//! Incoming audio must match the caps the codec was configured with. A
//! [`FormatConverter`] normalizes each packet; the stream drives its
//! lifecycle through [`ConverterState`] in lockstep with init/uninit.

#[cfg(feature = "ffmpeg")]
pub mod resampler;

use crate::error::{EncodeError, Result};
use crate::format::AudioCaps;
use crate::stream::frame::AudioFrame;

/// Lifecycle of a converter element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConverterState {
    /// Inactive; packets are dropped
    Null,
    /// Converting
    Running,
}

/// Normalizes packets to a fixed output caps
pub trait FormatConverter: Send {
    fn output_caps(&self) -> &AudioCaps;

    fn state(&self) -> ConverterState;

    fn set_state(&mut self, state: ConverterState) -> Result<()>;

    /// Convert one packet. `Ok(None)` when there is nothing to emit yet, or
    /// the converter is not running.
    fn convert(&mut self, packet: &AudioFrame) -> Result<Option<AudioFrame>>;
}

/// Accepts only packets already in the output caps
#[derive(Debug)]
pub struct PassthroughConverter {
    caps: AudioCaps,
    state: ConverterState,
}

impl PassthroughConverter {
    pub fn new(caps: AudioCaps) -> Self {
        Self {
            caps,
            state: ConverterState::Null,
        }
    }
}

impl FormatConverter for PassthroughConverter {
    fn output_caps(&self) -> &AudioCaps {
        &self.caps
    }

    fn state(&self) -> ConverterState {
        self.state
    }

    fn set_state(&mut self, state: ConverterState) -> Result<()> {
        self.state = state;
        Ok(())
    }

    fn convert(&mut self, packet: &AudioFrame) -> Result<Option<AudioFrame>> {
        if self.state != ConverterState::Running {
            return Ok(None);
        }
        if packet.caps() != &self.caps {
            return Err(EncodeError::Converter(format!(
                "passthrough cannot convert {} to {}",
                packet.caps(),
                self.caps
            )));
        }
        Ok(Some(packet.clone()))
    }
}

/// The converter a stream uses when none is supplied.
pub fn default_converter(caps: AudioCaps) -> Box<dyn FormatConverter> {
    #[cfg(feature = "ffmpeg")]
    {
        Box::new(resampler::SwrConverter::new(caps))
    }
    #[cfg(not(feature = "ffmpeg"))]
    {
        Box::new(PassthroughConverter::new(caps))
    }
}
