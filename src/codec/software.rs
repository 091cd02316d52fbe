//! In-process codec speaking the buffer-queue protocol
//!
//! `SoftwareCodec` owns fixed pools of input and output buffers and hands
//! them out by index exactly like a hardware codec would. The actual
//! compression is delegated to a [`FrameEncoder`]. Encoding happens
//! synchronously inside `queue_input_buffer`, so the dequeue calls never need
//! to wait and return immediately regardless of the timeout.

use bytes::Bytes;
use std::collections::VecDeque;
use std::time::Duration;

use crate::config::CodecConfig;
use crate::error::{EncodeError, Result};

use super::{BufferFlags, BufferInfo, DequeuedOutput, MediaCodec, MediaFormat, KEY_PCM_ENCODING};

/// One unit of encoder output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedChunk {
    pub data: Bytes,
    pub pts_us: i64,
    pub flags: BufferFlags,
}

/// The compression step behind a [`SoftwareCodec`]
pub trait FrameEncoder: Send {
    fn name(&self) -> &'static str;

    fn configure(&mut self, format: &MediaFormat) -> Result<()>;

    /// Feed interleaved PCM; returns whatever output became available.
    fn encode(&mut self, pcm: &[u8], pts_us: i64) -> Result<Vec<EncodedChunk>>;

    /// Drain everything still buffered after the last input.
    fn flush(&mut self) -> Result<Vec<EncodedChunk>>;
}

/// Emits the PCM it is given unchanged, one chunk per queued buffer
#[derive(Debug, Default)]
pub struct PcmEncoder {
    configured: bool,
}

impl PcmEncoder {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FrameEncoder for PcmEncoder {
    fn name(&self) -> &'static str {
        "pcm"
    }

    fn configure(&mut self, format: &MediaFormat) -> Result<()> {
        format.require_i32(KEY_PCM_ENCODING)?;
        self.configured = true;
        Ok(())
    }

    fn encode(&mut self, pcm: &[u8], pts_us: i64) -> Result<Vec<EncodedChunk>> {
        if !self.configured {
            return Err(EncodeError::InvalidState("pcm encoder used before configure".into()));
        }
        Ok(vec![EncodedChunk {
            data: Bytes::copy_from_slice(pcm),
            pts_us,
            flags: BufferFlags::NONE,
        }])
    }

    fn flush(&mut self) -> Result<Vec<EncodedChunk>> {
        Ok(vec![])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CodecState {
    Uninitialized,
    Configured,
    Running,
}

#[derive(Debug)]
struct OutputSlot {
    data: Vec<u8>,
    info: BufferInfo,
}

/// Buffer-queue codec backed by a [`FrameEncoder`]
pub struct SoftwareCodec<E: FrameEncoder> {
    encoder: E,
    state: CodecState,
    inputs: Vec<Vec<u8>>,
    free_inputs: VecDeque<usize>,
    held_inputs: Vec<bool>,
    outputs: Vec<OutputSlot>,
    free_outputs: VecDeque<usize>,
    ready_outputs: VecDeque<usize>,
    held_outputs: Vec<bool>,
    pending: VecDeque<EncodedChunk>,
    input_eos: bool,
}

impl<E: FrameEncoder> SoftwareCodec<E> {
    pub fn new(encoder: E, config: &CodecConfig) -> Self {
        let count = config.buffer_count.max(1);
        Self {
            encoder,
            state: CodecState::Uninitialized,
            inputs: (0..count).map(|_| vec![0; config.input_buffer_size]).collect(),
            free_inputs: VecDeque::new(),
            held_inputs: vec![false; count],
            outputs: (0..count)
                .map(|_| OutputSlot {
                    data: Vec::with_capacity(config.output_buffer_size),
                    info: BufferInfo::default(),
                })
                .collect(),
            free_outputs: VecDeque::new(),
            ready_outputs: VecDeque::new(),
            held_outputs: vec![false; count],
            pending: VecDeque::new(),
            input_eos: false,
        }
    }

    fn ensure_running(&self, op: &str) -> Result<()> {
        if self.state != CodecState::Running {
            return Err(EncodeError::InvalidState(format!(
                "{}: codec is not running ({:?})",
                op, self.state
            )));
        }
        Ok(())
    }

    fn reset_pools(&mut self) {
        self.free_inputs = (0..self.inputs.len()).collect();
        self.free_outputs = (0..self.outputs.len()).collect();
        self.held_inputs.iter_mut().for_each(|h| *h = false);
        self.held_outputs.iter_mut().for_each(|h| *h = false);
        self.ready_outputs.clear();
        self.pending.clear();
        self.input_eos = false;
    }

    /// Move encoder output into free output buffers.
    fn fill_outputs(&mut self) {
        while !self.pending.is_empty() {
            let Some(index) = self.free_outputs.pop_front() else {
                break;
            };
            let Some(chunk) = self.pending.pop_front() else {
                self.free_outputs.push_front(index);
                break;
            };

            let slot = &mut self.outputs[index];
            slot.data.clear();
            slot.data.extend_from_slice(&chunk.data);
            slot.info = BufferInfo {
                offset: 0,
                size: chunk.data.len(),
                presentation_time_us: chunk.pts_us,
                flags: chunk.flags,
            };
            self.ready_outputs.push_back(index);
        }
    }
}

impl<E: FrameEncoder> MediaCodec for SoftwareCodec<E> {
    fn configure(&mut self, format: &MediaFormat) -> Result<()> {
        if self.state == CodecState::Running {
            return Err(EncodeError::InvalidState("configure while running".into()));
        }
        self.encoder.configure(format)?;
        self.state = CodecState::Configured;
        tracing::debug!(
            encoder = self.encoder.name(),
            mime = format.mime(),
            buffers = self.inputs.len(),
            "software codec configured"
        );
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        match self.state {
            CodecState::Uninitialized => {
                Err(EncodeError::InvalidState("start before configure".into()))
            }
            CodecState::Running => Ok(()),
            CodecState::Configured => {
                self.reset_pools();
                self.state = CodecState::Running;
                Ok(())
            }
        }
    }

    fn stop(&mut self) -> Result<()> {
        if self.state == CodecState::Running {
            self.state = CodecState::Configured;
            self.reset_pools();
        }
        Ok(())
    }

    fn dequeue_input_buffer(&mut self, _timeout: Duration) -> Result<Option<usize>> {
        self.ensure_running("dequeue_input_buffer")?;
        if self.input_eos {
            return Ok(None);
        }
        let index = self.free_inputs.pop_front();
        if let Some(i) = index {
            self.held_inputs[i] = true;
        }
        Ok(index)
    }

    fn input_buffer(&mut self, index: usize) -> Option<&mut [u8]> {
        if !self.held_inputs.get(index).copied().unwrap_or(false) {
            return None;
        }
        self.inputs.get_mut(index).map(|b| b.as_mut_slice())
    }

    fn queue_input_buffer(
        &mut self,
        index: usize,
        offset: usize,
        size: usize,
        presentation_time_us: u64,
        flags: BufferFlags,
    ) -> Result<()> {
        self.ensure_running("queue_input_buffer")?;
        if !self.held_inputs.get(index).copied().unwrap_or(false) {
            return Err(EncodeError::Codec(format!(
                "queue_input_buffer: index {} is not dequeued",
                index
            )));
        }
        let capacity = self.inputs[index].len();
        if offset.checked_add(size).map_or(true, |end| end > capacity) {
            return Err(EncodeError::Codec(format!(
                "queue_input_buffer: range {}+{} exceeds capacity {}",
                offset, size, capacity
            )));
        }

        self.held_inputs[index] = false;
        self.free_inputs.push_back(index);

        let pts_us = presentation_time_us as i64;
        if size > 0 {
            let chunks = self
                .encoder
                .encode(&self.inputs[index][offset..offset + size], pts_us)?;
            self.pending.extend(chunks);
        }

        if flags.is_end_of_stream() {
            self.input_eos = true;
            self.pending.extend(self.encoder.flush()?);
            match self.pending.back_mut() {
                Some(last) => last.flags = last.flags | BufferFlags::END_OF_STREAM,
                None => self.pending.push_back(EncodedChunk {
                    data: Bytes::new(),
                    pts_us,
                    flags: BufferFlags::END_OF_STREAM,
                }),
            }
        }

        self.fill_outputs();
        Ok(())
    }

    fn dequeue_output_buffer(&mut self, _timeout: Duration) -> Result<DequeuedOutput> {
        self.ensure_running("dequeue_output_buffer")?;
        self.fill_outputs();
        match self.ready_outputs.pop_front() {
            Some(index) => {
                self.held_outputs[index] = true;
                Ok(DequeuedOutput::Buffer {
                    index,
                    info: self.outputs[index].info,
                })
            }
            None => Ok(DequeuedOutput::TryAgainLater),
        }
    }

    fn output_buffer(&self, index: usize) -> Option<&[u8]> {
        if !self.held_outputs.get(index).copied().unwrap_or(false) {
            return None;
        }
        self.outputs.get(index).map(|slot| slot.data.as_slice())
    }

    fn release_output_buffer(&mut self, index: usize, _render: bool) -> Result<()> {
        if !self.held_outputs.get(index).copied().unwrap_or(false) {
            return Err(EncodeError::Codec(format!(
                "release_output_buffer: index {} is not dequeued",
                index
            )));
        }
        self.held_outputs[index] = false;
        self.free_outputs.push_back(index);
        self.fill_outputs();
        Ok(())
    }
}
