//! Test fixtures for integration tests
//!
//! Provides a scripted codec that records what it is fed and replays canned
//! output buffers, so the buffer exchange can be driven without any real
//! codec behind it.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use crate::codec::{BufferFlags, BufferInfo, DequeuedOutput, MediaCodec, MediaFormat};
use crate::config::{OversizePolicy, TimingConfig};
use crate::engine::BufferExchange;
use crate::error::{EncodeError, Result};
use crate::format::{AudioCaps, ChannelLayout, Rational, SampleFormat};
use crate::packet::EncodedPacket;
use crate::stats::EncodeStats;
use crate::stream::accumulator::FrameAccumulator;
use crate::stream::frame::AudioFrame;

const INPUT_POOL: usize = 4;

/// One `queue_input_buffer` call as the codec saw it
#[derive(Debug, Clone)]
pub struct QueuedInput {
    pub index: usize,
    pub offset: usize,
    pub size: usize,
    pub presentation_time_us: u64,
    pub flags: BufferFlags,
    pub data: Vec<u8>,
}

enum Scripted {
    /// `data: None` simulates the codec returning no memory for the index
    Buffer { data: Option<Vec<u8>>, info: BufferInfo },
    Status(DequeuedOutput),
}

/// Buffer-queue codec driven by a script
pub struct MockCodec {
    capacity: usize,
    inputs: Vec<Vec<u8>>,
    /// Remaining input grants; `None` is unlimited
    available_inputs: Option<usize>,
    null_input_buffers: bool,
    grants: usize,
    input_requests: usize,
    script: VecDeque<Scripted>,
    held_output: Option<(usize, Option<Vec<u8>>)>,
    output_grants: usize,

    pub format: Option<MediaFormat>,
    pub started: bool,
    pub queued: Vec<QueuedInput>,
    pub released: Vec<(usize, bool)>,
}

impl MockCodec {
    /// A codec whose input buffers hold `capacity` bytes each.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inputs: vec![vec![0; capacity]; INPUT_POOL],
            available_inputs: None,
            null_input_buffers: false,
            grants: 0,
            input_requests: 0,
            script: VecDeque::new(),
            held_output: None,
            output_grants: 0,
            format: None,
            started: false,
            queued: Vec::new(),
            released: Vec::new(),
        }
    }

    pub fn set_available_inputs(&mut self, count: usize) {
        self.available_inputs = Some(count);
    }

    pub fn set_null_input_buffers(&mut self, null: bool) {
        self.null_input_buffers = null;
    }

    pub fn push_output(&mut self, data: &[u8], info: BufferInfo) {
        self.script.push_back(Scripted::Buffer {
            data: Some(data.to_vec()),
            info,
        });
    }

    pub fn push_null_output(&mut self, info: BufferInfo) {
        self.script.push_back(Scripted::Buffer { data: None, info });
    }

    pub fn push_status(&mut self, status: DequeuedOutput) {
        self.script.push_back(Scripted::Status(status));
    }

    /// Number of `dequeue_input_buffer` calls so far.
    pub fn input_requests(&self) -> usize {
        self.input_requests
    }
}

impl MediaCodec for MockCodec {
    fn configure(&mut self, format: &MediaFormat) -> Result<()> {
        self.format = Some(format.clone());
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        self.started = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.started = false;
        Ok(())
    }

    fn dequeue_input_buffer(&mut self, _timeout: Duration) -> Result<Option<usize>> {
        self.input_requests += 1;
        match self.available_inputs.as_mut() {
            Some(0) => return Ok(None),
            Some(n) => *n -= 1,
            None => {}
        }
        let index = self.grants % INPUT_POOL;
        self.grants += 1;
        Ok(Some(index))
    }

    fn input_buffer(&mut self, index: usize) -> Option<&mut [u8]> {
        if self.null_input_buffers {
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
        if offset + size > self.capacity {
            return Err(EncodeError::Codec(format!(
                "queued {} bytes into a {} byte buffer",
                offset + size,
                self.capacity
            )));
        }
        self.queued.push(QueuedInput {
            index,
            offset,
            size,
            presentation_time_us,
            flags,
            data: self.inputs[index][offset..offset + size].to_vec(),
        });
        Ok(())
    }

    fn dequeue_output_buffer(&mut self, _timeout: Duration) -> Result<DequeuedOutput> {
        match self.script.pop_front() {
            Some(Scripted::Buffer { data, info }) => {
                let index = self.output_grants;
                self.output_grants += 1;
                self.held_output = Some((index, data));
                Ok(DequeuedOutput::Buffer { index, info })
            }
            Some(Scripted::Status(status)) => Ok(status),
            None => Ok(DequeuedOutput::TryAgainLater),
        }
    }

    fn output_buffer(&self, index: usize) -> Option<&[u8]> {
        match &self.held_output {
            Some((held, Some(data))) if *held == index => Some(data.as_slice()),
            _ => None,
        }
    }

    fn release_output_buffer(&mut self, index: usize, render: bool) -> Result<()> {
        self.released.push((index, render));
        self.held_output = None;
        Ok(())
    }
}

pub fn mono_s16() -> AudioCaps {
    AudioCaps::new(SampleFormat::S16, ChannelLayout::mono(), 48000)
}

/// A mono s16 frame whose bytes count up from zero.
pub fn ramp_frame(len: usize, pts: i64) -> AudioFrame {
    let data: Vec<u8> = (0..len).map(|i| i as u8).collect();
    AudioFrame::new(mono_s16(), &data, pts, Rational::new(1, 48000))
}

pub fn output_info(offset: usize, size: usize, pts_us: i64, flags: BufferFlags) -> BufferInfo {
    BufferInfo {
        offset,
        size,
        presentation_time_us: pts_us,
        flags,
    }
}

/// Timing that keeps idle ticks short in tests
pub fn fast_timing() -> TimingConfig {
    TimingConfig {
        codec_timeout_us: 0,
        frame_wait_ms: 10,
    }
}

/// A buffer exchange over a [`MockCodec`], with handles to everything around it
pub struct Harness {
    pub exchange: BufferExchange<MockCodec>,
    pub accumulator: Arc<FrameAccumulator>,
    pub packets: Arc<Mutex<Vec<EncodedPacket>>>,
    pub stats: Arc<EncodeStats>,
}

impl Harness {
    pub const STREAM_INDEX: usize = 3;

    pub fn new(codec: MockCodec, policy: OversizePolicy) -> Self {
        let accumulator = Arc::new(FrameAccumulator::new());
        let packets: Arc<Mutex<Vec<EncodedPacket>>> = Arc::new(Mutex::new(Vec::new()));
        let stats = Arc::new(EncodeStats::new());
        let sink = packets.clone();

        let mut exchange = BufferExchange::new(
            codec,
            accumulator.clone(),
            Box::new(move |p: EncodedPacket| sink.lock().push(p)),
            stats.clone(),
            Self::STREAM_INDEX,
            fast_timing(),
            policy,
        );
        exchange.start().expect("mock codec starts");

        Self {
            exchange,
            accumulator,
            packets,
            stats,
        }
    }

    pub fn codec(&self) -> &MockCodec {
        self.exchange.codec()
    }

    pub fn codec_mut(&mut self) -> &mut MockCodec {
        self.exchange.codec_mut()
    }
}
