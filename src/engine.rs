//! Codec buffer exchange
//!
//! One call to [`BufferExchange::tick`] moves at most one accumulated frame
//! into the codec and at most one encoded buffer out of it. Every wait is
//! bounded; when the codec or the producer is not ready the tick gives up and
//! reports [`TickOutcome::NoProgress`] so the caller's loop can retry.

use std::sync::Arc;
use std::time::Duration;

use crate::codec::{BufferFlags, DequeuedOutput, MediaCodec};
use crate::config::{OversizePolicy, TimingConfig};
use crate::error::Result;
use crate::packet::{self, EncodedPacket};
use crate::stats::EncodeStats;
use crate::stream::accumulator::FrameAccumulator;

/// Receives every packet drained from the codec
pub trait PacketSink: Send {
    fn packet_ready(&mut self, packet: EncodedPacket);
}

impl<F> PacketSink for F
where
    F: FnMut(EncodedPacket) + Send,
{
    fn packet_ready(&mut self, packet: EncodedPacket) {
        self(packet)
    }
}

/// What a tick achieved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Input was accepted, or an output buffer was drained
    Progressed,
    /// Nothing to do, or the codec had no buffer in time; call again
    NoProgress,
    /// The codec has delivered its end-of-stream buffer
    EndOfStream,
}

impl TickOutcome {
    pub fn made_progress(self) -> bool {
        !matches!(self, TickOutcome::NoProgress)
    }
}

/// Where the engine is within a tick, or in the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Filling,
    Submitted,
    Draining,
    Flushing,
    Finished,
}

/// Drives the input/output buffer exchange with a codec
pub struct BufferExchange<C: MediaCodec> {
    codec: C,
    accumulator: Arc<FrameAccumulator>,
    sink: Box<dyn PacketSink>,
    stats: Arc<EncodeStats>,
    stream_index: usize,
    timing: TimingConfig,
    oversize: OversizePolicy,
    state: EngineState,
    eos_queued: bool,
}

impl<C: MediaCodec> BufferExchange<C> {
    pub fn new(
        codec: C,
        accumulator: Arc<FrameAccumulator>,
        sink: Box<dyn PacketSink>,
        stats: Arc<EncodeStats>,
        stream_index: usize,
        timing: TimingConfig,
        oversize: OversizePolicy,
    ) -> Self {
        Self {
            codec,
            accumulator,
            sink,
            stats,
            stream_index,
            timing,
            oversize,
            state: EngineState::Idle,
            eos_queued: false,
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    pub fn codec_mut(&mut self) -> &mut C {
        &mut self.codec
    }

    /// Whether a data tick would still take samples.
    pub fn accepts_input(&self) -> bool {
        !self.eos_queued && self.state != EngineState::Finished
    }

    /// Start the codec and begin a fresh session.
    pub fn start(&mut self) -> Result<()> {
        self.codec.start()?;
        self.state = EngineState::Idle;
        self.eos_queued = false;
        Ok(())
    }

    pub fn stop(&mut self) -> Result<()> {
        self.codec.stop()
    }

    /// Run one exchange. With `eos` set, signal end-of-stream instead of
    /// submitting samples.
    ///
    /// Only fatal codec errors are returned as `Err`.
    pub fn tick(&mut self, eos: bool) -> Result<TickOutcome> {
        self.tick_within(eos, self.timing.frame_wait())
    }

    /// Same as [`tick`](Self::tick), waiting at most `frame_wait` for samples.
    pub fn tick_within(&mut self, eos: bool, frame_wait: Duration) -> Result<TickOutcome> {
        if self.state == EngineState::Finished {
            return Ok(TickOutcome::EndOfStream);
        }

        // Nothing goes in behind the end-of-stream buffer
        if eos || self.eos_queued {
            return self.flush_tick();
        }

        let Some(mut frame) = self.accumulator.consume(frame_wait) else {
            self.stats.record_idle_tick();
            return Ok(TickOutcome::NoProgress);
        };

        let Some(index) = self.codec.dequeue_input_buffer(self.timing.codec_timeout())? else {
            tracing::trace!(stream_index = self.stream_index, "no input buffer available");
            self.stats.record_input_stall();
            self.accumulator.requeue(frame);
            return Ok(TickOutcome::NoProgress);
        };

        self.state = EngineState::Filling;
        let Some(buffer) = self.codec.input_buffer(index) else {
            tracing::warn!(
                stream_index = self.stream_index,
                buffer_index = index,
                "codec returned no memory for input buffer"
            );
            self.accumulator.requeue(frame);
            self.state = EngineState::Idle;
            return Ok(TickOutcome::NoProgress);
        };

        let capacity = buffer.len();
        if frame.len() > capacity {
            match self.oversize {
                OversizePolicy::Truncate => {
                    let dropped = frame.len() - capacity;
                    tracing::warn!(
                        stream_index = self.stream_index,
                        frame_size = frame.len(),
                        capacity,
                        dropped,
                        "frame exceeds input buffer; truncating"
                    );
                    self.stats.record_truncation(dropped);
                }
                OversizePolicy::Carry => {
                    if let Some(tail) = frame.split_off(capacity) {
                        if frame.is_empty() {
                            // Buffer cannot hold a single sample frame
                            let dropped = tail.len().saturating_sub(capacity);
                            self.stats.record_truncation(dropped);
                            frame = tail;
                        } else {
                            tracing::debug!(
                                stream_index = self.stream_index,
                                carried = tail.len(),
                                "carrying frame remainder to next tick"
                            );
                            self.accumulator.requeue(tail);
                        }
                    }
                }
            }
        }

        let size = frame.len().min(capacity);
        buffer[..size].copy_from_slice(&frame.data()[..size]);
        let pts_us = frame.presentation_time_us();

        self.codec
            .queue_input_buffer(index, 0, size, pts_us.max(0) as u64, BufferFlags::NONE)?;
        self.state = EngineState::Submitted;
        self.stats.record_submit(size);
        tracing::debug!(
            stream_index = self.stream_index,
            buffer_index = index,
            size,
            pts_us,
            "queued input buffer"
        );

        self.drain_output()?;
        Ok(TickOutcome::Progressed)
    }

    fn flush_tick(&mut self) -> Result<TickOutcome> {
        let mut progressed = false;

        if !self.eos_queued {
            self.state = EngineState::Flushing;
            let Some(index) = self.codec.dequeue_input_buffer(self.timing.codec_timeout())? else {
                self.stats.record_input_stall();
                return Ok(TickOutcome::NoProgress);
            };

            self.codec
                .queue_input_buffer(index, 0, 0, 0, BufferFlags::END_OF_STREAM)?;
            self.eos_queued = true;
            progressed = true;
            tracing::info!(
                stream_index = self.stream_index,
                buffer_index = index,
                "queued end-of-stream"
            );
        }

        progressed |= self.drain_output()?;

        Ok(if self.state == EngineState::Finished {
            TickOutcome::EndOfStream
        } else if progressed {
            TickOutcome::Progressed
        } else {
            TickOutcome::NoProgress
        })
    }

    /// Drain at most one output buffer. Returns whether a buffer was handled.
    fn drain_output(&mut self) -> Result<bool> {
        let (index, info) = match self.codec.dequeue_output_buffer(self.timing.codec_timeout())? {
            DequeuedOutput::Buffer { index, info } => (index, info),
            DequeuedOutput::TryAgainLater => {
                self.stats.record_output_stall();
                self.settle();
                return Ok(false);
            }
            DequeuedOutput::FormatChanged => {
                tracing::debug!(stream_index = self.stream_index, "codec output format changed");
                self.settle();
                return Ok(false);
            }
            DequeuedOutput::BuffersChanged => {
                tracing::debug!(stream_index = self.stream_index, "codec output buffers changed");
                self.settle();
                return Ok(false);
            }
        };

        self.state = EngineState::Draining;
        let assembled = packet::assemble(&self.codec, index, &info, self.stream_index);
        self.codec.release_output_buffer(index, info.size != 0)?;

        match assembled {
            Ok(packet) => {
                tracing::debug!(
                    stream_index = self.stream_index,
                    buffer_index = index,
                    size = packet.len(),
                    pts_us = packet.pts(),
                    "encoded packet ready"
                );
                self.stats.record_packet(packet.len());
                self.sink.packet_ready(packet);
            }
            Err(e) => {
                tracing::warn!(
                    stream_index = self.stream_index,
                    buffer_index = index,
                    error = %e,
                    "dropping undeliverable output buffer"
                );
                self.stats.record_assembly_failure();
            }
        }

        if info.flags.is_end_of_stream() {
            tracing::info!(stream_index = self.stream_index, "codec reached end of stream");
            self.state = EngineState::Finished;
        } else {
            self.settle();
        }
        Ok(true)
    }

    fn settle(&mut self) {
        self.state = if self.eos_queued {
            EngineState::Flushing
        } else {
            EngineState::Idle
        };
    }
}
