//! End-to-end integration tests

use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::codec::software::{PcmEncoder, SoftwareCodec};
use crate::config::{EncoderConfig, StreamConfig};
use crate::convert::PassthroughConverter;
use crate::engine::TickOutcome;
use crate::integration::fixtures::{fast_timing, mono_s16};
use crate::packet::EncodedPacket;
use crate::stream::frame::AudioFrame;
use crate::stream::AudioStream;

/// Feed `frames` from another thread through a PCM software codec and
/// collect everything that comes out, up to and including end-of-stream.
pub fn run_pcm_session(frames: Vec<AudioFrame>) -> Vec<EncodedPacket> {
    let config = EncoderConfig {
        stream: StreamConfig {
            sample_format: mono_s16().format,
            channel_layout: mono_s16().layout,
            sample_rate: mono_s16().rate,
            stream_index: 0,
        },
        timing: fast_timing(),
        ..Default::default()
    };

    let packets: Arc<Mutex<Vec<EncodedPacket>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = packets.clone();
    let stream = Arc::new(
        AudioStream::with_converter(
            &config,
            SoftwareCodec::new(PcmEncoder::new(), &config.codec),
            Box::new(PassthroughConverter::new(config.stream.caps())),
            move |p: EncodedPacket| sink.lock().push(p),
        )
        .expect("stream builds"),
    );
    stream.init().expect("stream starts");

    let expected: usize = frames.iter().map(|f| f.len()).sum();
    let producer = {
        let stream = stream.clone();
        thread::spawn(move || {
            for frame in frames {
                stream.convert_packet(&frame).expect("convert");
                thread::sleep(Duration::from_millis(2));
            }
        })
    };

    let deadline = Instant::now() + Duration::from_secs(5);
    while (stream.stats().snapshot().bytes_submitted as usize) < expected
        && Instant::now() < deadline
    {
        stream.encode_data(false).expect("tick");
    }
    producer.join().expect("producer thread");

    while Instant::now() < deadline {
        if stream.encode_data(true).expect("eos tick") == TickOutcome::EndOfStream {
            break;
        }
    }

    stream.uninit().expect("uninit");
    let out = packets.lock().clone();
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{BufferFlags, DequeuedOutput, MediaCodec};
    use crate::config::OversizePolicy;
    use crate::engine::EngineState;
    use crate::error::EncodeError;
    use crate::format::Rational;
    use crate::integration::fixtures::{output_info, ramp_frame, Harness, MockCodec};
    use crate::packet;

    #[test]
    fn test_mono_s16_frame_end_to_end() {
        let mut codec = MockCodec::new(4096);
        codec.push_output(&[7u8; 512], output_info(0, 512, 1000, BufferFlags::NONE));
        let mut h = Harness::new(codec, OversizePolicy::Truncate);

        let frame = ramp_frame(1920, 0);
        assert!(h.accumulator.deposit(frame.clone()));
        assert_eq!(h.exchange.tick(false).unwrap(), TickOutcome::Progressed);

        let queued = &h.codec().queued;
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].size, 1920);
        assert_eq!(queued[0].offset, 0);
        assert_eq!(queued[0].presentation_time_us, 0);
        assert_eq!(queued[0].flags, BufferFlags::NONE);
        assert_eq!(queued[0].data, frame.data());

        let packets = h.packets.lock();
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].len(), 512);
        assert_eq!(packets[0].pts(), 1000);
        assert_eq!(packets[0].time_base(), Rational::new(1, 1_000_000));
        assert_eq!(packets[0].stream_index(), Harness::STREAM_INDEX);
        assert_eq!(packets[0].id(), 0);
        drop(packets);

        assert_eq!(h.codec().released, vec![(0, true)]);
        assert_eq!(h.exchange.state(), EngineState::Idle);
    }

    #[test]
    fn test_submission_timestamp_is_rounded_microseconds() {
        let mut h = Harness::new(MockCodec::new(64), OversizePolicy::Truncate);
        let frame = AudioFrame::new(mono_s16(), &[0; 4], 1, Rational::new(1, 3));
        h.accumulator.deposit(frame);
        h.exchange.tick(false).unwrap();
        assert_eq!(h.codec().queued[0].presentation_time_us, 333_333);
    }

    #[test]
    fn test_output_lag_still_counts_as_progress() {
        let mut h = Harness::new(MockCodec::new(4096), OversizePolicy::Truncate);
        h.accumulator.deposit(ramp_frame(100, 0));
        assert_eq!(h.exchange.tick(false).unwrap(), TickOutcome::Progressed);
        assert!(h.packets.lock().is_empty());
        assert_eq!(h.stats.snapshot().output_stalls, 1);
    }

    #[test]
    fn test_idle_tick_leaves_codec_alone() {
        let mut h = Harness::new(MockCodec::new(4096), OversizePolicy::Truncate);
        let started = Instant::now();
        assert_eq!(h.exchange.tick(false).unwrap(), TickOutcome::NoProgress);
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(h.codec().input_requests(), 0);
        assert_eq!(h.stats.snapshot().idle_ticks, 1);
    }

    #[test]
    fn test_oversized_frame_is_truncated() {
        let mut h = Harness::new(MockCodec::new(1000), OversizePolicy::Truncate);
        let frame = ramp_frame(1920, 0);
        h.accumulator.deposit(frame.clone());

        assert_eq!(h.exchange.tick(false).unwrap(), TickOutcome::Progressed);
        let queued = &h.codec().queued;
        assert_eq!(queued[0].size, 1000);
        assert_eq!(queued[0].data, &frame.data()[..1000]);
        assert_eq!(h.accumulator.pending_bytes(), 0);
        assert_eq!(h.stats.snapshot().bytes_truncated, 920);
    }

    #[test]
    fn test_oversized_frame_remainder_is_carried() {
        let mut h = Harness::new(MockCodec::new(1000), OversizePolicy::Carry);
        let frame = ramp_frame(1920, 0);
        h.accumulator.deposit(frame.clone());

        assert_eq!(h.exchange.tick(false).unwrap(), TickOutcome::Progressed);
        assert_eq!(h.accumulator.pending_bytes(), 920);

        assert_eq!(h.exchange.tick(false).unwrap(), TickOutcome::Progressed);
        let queued = &h.codec().queued;
        assert_eq!(queued.len(), 2);
        assert_eq!(queued[1].size, 920);
        // 500 samples at 48 kHz
        assert_eq!(queued[1].presentation_time_us, 10_417);

        let mut joined = queued[0].data.clone();
        joined.extend_from_slice(&queued[1].data);
        assert_eq!(joined, frame.data());
        assert_eq!(h.stats.snapshot().bytes_truncated, 0);
    }

    #[test]
    fn test_carry_keeps_samples_deposited_meanwhile() {
        let mut h = Harness::new(MockCodec::new(1000), OversizePolicy::Carry);
        h.accumulator.deposit(ramp_frame(1200, 0));
        h.exchange.tick(false).unwrap();
        h.accumulator.deposit(ramp_frame(100, 600));

        h.exchange.tick(false).unwrap();
        let queued = &h.codec().queued;
        assert_eq!(queued[1].size, 300);
        assert_eq!(queued[1].data[..200], ramp_frame(1200, 0).data()[1000..]);
        assert_eq!(queued[1].data[200..], ramp_frame(100, 600).data()[..]);
    }

    #[test]
    fn test_missing_input_buffer_keeps_frame() {
        let mut codec = MockCodec::new(4096);
        codec.set_available_inputs(0);
        let mut h = Harness::new(codec, OversizePolicy::Truncate);
        h.accumulator.deposit(ramp_frame(480, 0));

        assert_eq!(h.exchange.tick(false).unwrap(), TickOutcome::NoProgress);
        assert_eq!(h.accumulator.pending_bytes(), 480);
        assert_eq!(h.stats.snapshot().input_stalls, 1);

        h.codec_mut().set_available_inputs(1);
        assert_eq!(h.exchange.tick(false).unwrap(), TickOutcome::Progressed);
        assert_eq!(h.codec().queued[0].size, 480);
    }

    #[test]
    fn test_null_input_buffer_is_not_written() {
        let mut codec = MockCodec::new(4096);
        codec.set_null_input_buffers(true);
        let mut h = Harness::new(codec, OversizePolicy::Truncate);
        h.accumulator.deposit(ramp_frame(480, 0));

        assert_eq!(h.exchange.tick(false).unwrap(), TickOutcome::NoProgress);
        assert!(h.codec().queued.is_empty());
        assert_eq!(h.accumulator.pending_bytes(), 480);
    }

    #[test]
    fn test_null_output_buffer_is_released_not_read() {
        let mut codec = MockCodec::new(4096);
        codec.push_null_output(output_info(0, 64, 0, BufferFlags::NONE));
        let mut h = Harness::new(codec, OversizePolicy::Truncate);
        h.accumulator.deposit(ramp_frame(480, 0));

        assert_eq!(h.exchange.tick(false).unwrap(), TickOutcome::Progressed);
        assert!(h.packets.lock().is_empty());
        assert_eq!(h.codec().released, vec![(0, true)]);
        assert_eq!(h.stats.snapshot().assembly_failures, 1);
    }

    #[test]
    fn test_format_change_yields_no_packet() {
        let mut codec = MockCodec::new(4096);
        codec.push_status(DequeuedOutput::FormatChanged);
        codec.push_output(&[1; 16], output_info(0, 16, 0, BufferFlags::CODEC_CONFIG));
        let mut h = Harness::new(codec, OversizePolicy::Truncate);

        h.accumulator.deposit(ramp_frame(480, 0));
        assert_eq!(h.exchange.tick(false).unwrap(), TickOutcome::Progressed);
        assert!(h.packets.lock().is_empty());

        h.accumulator.deposit(ramp_frame(480, 480));
        h.exchange.tick(false).unwrap();
        let packets = h.packets.lock();
        assert_eq!(packets.len(), 1);
        assert!(packets[0].is_codec_config());
    }

    #[test]
    fn test_eos_without_frames_submits_once() {
        let mut h = Harness::new(MockCodec::new(4096), OversizePolicy::Truncate);

        assert_eq!(h.exchange.tick(true).unwrap(), TickOutcome::Progressed);
        assert_eq!(h.exchange.tick(true).unwrap(), TickOutcome::NoProgress);
        assert_eq!(h.exchange.tick(true).unwrap(), TickOutcome::NoProgress);

        let queued = &h.codec().queued;
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].size, 0);
        assert!(queued[0].flags.is_end_of_stream());
        assert_eq!(h.exchange.state(), EngineState::Flushing);
        assert!(h.packets.lock().is_empty());
    }

    #[test]
    fn test_eos_retried_when_no_input_buffer() {
        let mut codec = MockCodec::new(4096);
        codec.set_available_inputs(0);
        let mut h = Harness::new(codec, OversizePolicy::Truncate);

        assert_eq!(h.exchange.tick(true).unwrap(), TickOutcome::NoProgress);
        assert!(h.codec().queued.is_empty());

        h.codec_mut().set_available_inputs(1);
        assert_eq!(h.exchange.tick(true).unwrap(), TickOutcome::Progressed);
        assert_eq!(h.codec().queued.len(), 1);
    }

    #[test]
    fn test_eos_drains_tail_then_finishes() {
        let mut codec = MockCodec::new(4096);
        codec.push_output(&[9; 32], output_info(0, 32, 20_000, BufferFlags::NONE));
        codec.push_output(&[], output_info(0, 0, 20_000, BufferFlags::END_OF_STREAM));
        let mut h = Harness::new(codec, OversizePolicy::Truncate);

        assert_eq!(h.exchange.tick(true).unwrap(), TickOutcome::Progressed);
        assert_eq!(h.packets.lock().len(), 1);
        assert_eq!(h.exchange.tick(true).unwrap(), TickOutcome::EndOfStream);
        assert_eq!(h.exchange.state(), EngineState::Finished);
        {
            let packets = h.packets.lock();
            assert_eq!(packets.len(), 2);
            assert!(packets[1].is_empty());
            assert!(packets[1].is_end_of_stream());
        }

        // Finished: the codec is no longer consulted
        let requests = h.codec().input_requests();
        h.accumulator.deposit(ramp_frame(480, 0));
        assert_eq!(h.exchange.tick(false).unwrap(), TickOutcome::EndOfStream);
        assert_eq!(h.codec().input_requests(), requests);
        assert_eq!(h.codec().released, vec![(0, true), (1, false)]);
        assert_eq!(h.packets.lock().len(), 2);
    }

    #[test]
    fn test_empty_output_buffer_still_notifies_sink() {
        let mut codec = MockCodec::new(4096);
        codec.push_output(&[], output_info(0, 0, 1000, BufferFlags::NONE));
        let mut h = Harness::new(codec, OversizePolicy::Truncate);

        h.accumulator.deposit(ramp_frame(480, 0));
        assert_eq!(h.exchange.tick(false).unwrap(), TickOutcome::Progressed);
        assert_eq!(h.codec().released, vec![(0, false)]);

        let packets = h.packets.lock();
        assert_eq!(packets.len(), 1);
        assert!(packets[0].is_empty());
        assert_eq!(packets[0].pts(), 1000);
    }

    #[test]
    fn test_data_tick_after_eos_only_drains() {
        let mut h = Harness::new(MockCodec::new(4096), OversizePolicy::Truncate);
        assert_eq!(h.exchange.tick(true).unwrap(), TickOutcome::Progressed);

        h.accumulator.deposit(ramp_frame(480, 0));
        assert!(!h.exchange.accepts_input());
        assert_eq!(h.exchange.tick(false).unwrap(), TickOutcome::NoProgress);

        let queued = &h.codec().queued;
        assert_eq!(queued.len(), 1);
        assert!(queued[0].flags.is_end_of_stream());
        assert_eq!(h.accumulator.pending_bytes(), 480);
        assert_eq!(h.exchange.state(), EngineState::Flushing);
    }

    #[test]
    fn test_assembler_never_reads_past_buffer() {
        let mut codec = MockCodec::new(16);
        let data: Vec<u8> = (0..100).collect();
        codec.push_output(&data, output_info(0, 400, 5, BufferFlags::NONE));
        let DequeuedOutput::Buffer { index, info } =
            codec.dequeue_output_buffer(Duration::ZERO).unwrap()
        else {
            panic!("scripted buffer expected");
        };

        let packet = packet::assemble(&codec, index, &info, 2).unwrap();
        assert_eq!(packet.len(), 100);
        assert_eq!(packet.data().as_ref(), data.as_slice());

        let shifted = output_info(60, 400, 5, BufferFlags::NONE);
        let packet = packet::assemble(&codec, index, &shifted, 2).unwrap();
        assert_eq!(packet.data().as_ref(), &data[60..]);

        let past_end = output_info(500, 10, 5, BufferFlags::NONE);
        assert!(packet::assemble(&codec, index, &past_end, 2).unwrap().is_empty());

        let exact = output_info(10, 20, 5, BufferFlags::NONE);
        assert_eq!(packet::assemble(&codec, index, &exact, 2).unwrap().data().as_ref(), &data[10..30]);
    }

    #[test]
    fn test_assembler_reports_missing_buffer() {
        let codec = MockCodec::new(16);
        let info = output_info(0, 8, 0, BufferFlags::NONE);
        assert!(matches!(
            packet::assemble(&codec, 4, &info, 0),
            Err(EncodeError::CodecBufferUnavailable { index: 4 })
        ));
    }

    #[test]
    fn test_stream_configures_codec_format() {
        let config = EncoderConfig {
            stream: StreamConfig {
                sample_format: mono_s16().format,
                channel_layout: mono_s16().layout,
                sample_rate: 48000,
                stream_index: 0,
            },
            timing: fast_timing(),
            ..Default::default()
        };
        let stream = AudioStream::new(&config, MockCodec::new(4096), |_: EncodedPacket| {}).unwrap();
        let format = stream.media_format();
        assert_eq!(format.get_i32(crate::codec::KEY_PCM_ENCODING), Some(0x2));
        assert_eq!(format.get_i32(crate::codec::KEY_CHANNEL_MASK), Some(0x10));
        assert_eq!(format.get_i32(crate::codec::KEY_CHANNEL_COUNT), Some(1));
        assert_eq!(format.get_i32(crate::codec::KEY_SAMPLE_RATE), Some(48000));
    }

    #[test]
    fn test_cross_thread_pcm_session_preserves_samples() {
        let frames: Vec<AudioFrame> = (0..10)
            .map(|i| ramp_frame(960, i * 480))
            .collect();
        let expected: Vec<u8> = frames.iter().flat_map(|f| f.data().to_vec()).collect();

        let packets = run_pcm_session(frames);
        assert!(packets.last().is_some_and(|p| p.is_end_of_stream()));

        let received: Vec<u8> = packets.iter().flat_map(|p| p.data().to_vec()).collect();
        assert_eq!(received, expected);

        let pts: Vec<i64> = packets
            .iter()
            .filter(|p| !p.is_empty())
            .map(|p| p.pts())
            .collect();
        assert!(pts.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(pts[0], 0);
    }
}
