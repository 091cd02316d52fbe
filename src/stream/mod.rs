//! Audio encode stream
//!
//! This module handles:
//! - Frame hand-off between the delivery thread and the encode thread
//! - Converter and codec lifecycle (init/uninit)
//! - Building the codec format descriptor from the negotiated caps
//!
//! `AudioStream` is shared between the thread delivering raw packets
//! (`convert_packet`) and the thread driving the codec (`encode_data`).

pub mod accumulator;
pub mod frame;

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::codec::{MediaCodec, MediaFormat, KEY_BIT_RATE, KEY_MAX_INPUT_SIZE};
use crate::config::EncoderConfig;
use crate::convert::{default_converter, ConverterState, FormatConverter};
use crate::engine::{BufferExchange, EngineState, PacketSink, TickOutcome};
use crate::error::{EncodeError, Result};
use crate::format::AudioCaps;
use crate::stats::EncodeStats;

use accumulator::FrameAccumulator;
use frame::AudioFrame;

/// One PCM audio stream feeding a buffer-queue codec
pub struct AudioStream<C: MediaCodec> {
    caps: AudioCaps,
    stream_index: usize,
    media_format: MediaFormat,
    converter: Mutex<Box<dyn FormatConverter>>,
    accumulator: Arc<FrameAccumulator>,
    engine: Mutex<BufferExchange<C>>,
    stats: Arc<EncodeStats>,
    frame_wait: Duration,
    running: AtomicBool,
}

impl<C: MediaCodec> AudioStream<C> {
    /// Build a stream with the default converter for the configured caps.
    pub fn new<S>(config: &EncoderConfig, codec: C, sink: S) -> Result<Self>
    where
        S: PacketSink + 'static,
    {
        let converter = default_converter(config.stream.caps());
        Self::with_converter(config, codec, converter, sink)
    }

    /// Build a stream around a caller-supplied converter.
    ///
    /// Fails if the stream parameters cannot be expressed to the codec, if
    /// the converter does not produce the configured caps, or if the codec
    /// rejects the format.
    pub fn with_converter<S>(
        config: &EncoderConfig,
        mut codec: C,
        converter: Box<dyn FormatConverter>,
        sink: S,
    ) -> Result<Self>
    where
        S: PacketSink + 'static,
    {
        config.stream.validate()?;
        let caps = config.stream.caps();

        if converter.output_caps() != &caps {
            return Err(EncodeError::Config(format!(
                "converter produces {} but the stream is configured for {}",
                converter.output_caps(),
                caps
            )));
        }

        let mut media_format = MediaFormat::for_audio(config.codec.backend.mime(), &caps)?;
        if let Some(bitrate) = config.codec.bitrate {
            media_format.set_i32(KEY_BIT_RATE, bitrate.min(i32::MAX as u64) as i32);
        }
        media_format.set_i32(
            KEY_MAX_INPUT_SIZE,
            config.codec.input_buffer_size.min(i32::MAX as usize) as i32,
        );

        codec.configure(&media_format)?;
        tracing::info!(
            stream_index = config.stream.stream_index,
            caps = %caps,
            mime = media_format.mime(),
            "audio stream configured"
        );

        let accumulator = Arc::new(FrameAccumulator::new());
        // Nothing is accepted until init()
        accumulator.deactivate();
        let stats = Arc::new(EncodeStats::new());
        let engine = BufferExchange::new(
            codec,
            accumulator.clone(),
            Box::new(sink),
            stats.clone(),
            config.stream.stream_index,
            config.timing.clone(),
            config.oversize_policy,
        );

        Ok(Self {
            caps,
            stream_index: config.stream.stream_index,
            media_format,
            converter: Mutex::new(converter),
            accumulator,
            engine: Mutex::new(engine),
            stats,
            frame_wait: config.timing.frame_wait(),
            running: AtomicBool::new(false),
        })
    }

    /// Start the converter and the codec.
    pub fn init(&self) -> Result<()> {
        if self.running.load(Ordering::SeqCst) {
            return Ok(());
        }

        let mut converter = self.converter.lock();
        converter.set_state(ConverterState::Running)?;
        self.accumulator.activate();

        if let Err(e) = self.engine.lock().start() {
            tracing::error!(stream_index = self.stream_index, error = %e, "codec failed to start");
            self.accumulator.deactivate();
            if let Err(revert) = converter.set_state(ConverterState::Null) {
                tracing::warn!(error = %revert, "failed to stop converter");
            }
            return Err(e);
        }

        self.running.store(true, Ordering::SeqCst);
        tracing::info!(stream_index = self.stream_index, "audio stream started");
        Ok(())
    }

    /// Stop the codec, deactivate the converter and drop pending samples.
    ///
    /// A thread blocked in `encode_data` is released within one wait period.
    pub fn uninit(&self) -> Result<()> {
        if !self.running.swap(false, Ordering::SeqCst) {
            return Ok(());
        }

        self.accumulator.deactivate();
        let converted = self.converter.lock().set_state(ConverterState::Null);
        let stopped = self.engine.lock().stop();
        tracing::info!(stream_index = self.stream_index, "audio stream stopped");

        converted.and(stopped)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Convert a raw packet and hand the result to the encode thread.
    ///
    /// Returns whether converted samples were queued.
    pub fn convert_packet(&self, packet: &AudioFrame) -> Result<bool> {
        if !self.is_running() {
            return Ok(false);
        }

        let converted = self.converter.lock().convert(packet)?;
        match converted {
            Some(frame) => Ok(self.accumulator.deposit(frame)),
            None => Ok(false),
        }
    }

    /// Run one encode tick; see [`BufferExchange::tick`].
    ///
    /// The wait for samples happens before the engine is locked, so the
    /// accessors stay responsive while the encode thread is idle.
    pub fn encode_data(&self, eos: bool) -> Result<TickOutcome> {
        if !self.is_running() {
            return Ok(TickOutcome::NoProgress);
        }
        if !eos && self.engine.lock().accepts_input() {
            self.accumulator.wait_pending(self.frame_wait);
        }
        self.engine.lock().tick_within(eos, Duration::ZERO)
    }

    pub fn engine_state(&self) -> EngineState {
        self.engine.lock().state()
    }

    /// Bytes converted but not yet handed to the codec.
    pub fn pending_bytes(&self) -> usize {
        self.accumulator.pending_bytes()
    }

    pub fn caps(&self) -> &AudioCaps {
        &self.caps
    }

    pub fn media_format(&self) -> &MediaFormat {
        &self.media_format
    }

    pub fn stream_index(&self) -> usize {
        self.stream_index
    }

    pub fn stats(&self) -> &EncodeStats {
        &self.stats
    }
}

impl<C: MediaCodec> Drop for AudioStream<C> {
    fn drop(&mut self) {
        if let Err(e) = self.uninit() {
            tracing::warn!(stream_index = self.stream_index, error = %e, "uninit on drop failed");
        }
    }
}
