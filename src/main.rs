//! PCM encode stream demo
//!
//! Feeds a generated tone through an `AudioStream` the way a capture
//! pipeline would: a producer task delivers frames on a fixed cadence while a
//! blocking loop drives the codec, then the stream is flushed and the
//! counters are printed as JSON.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pcm_encode_stream::codec::software::{PcmEncoder, SoftwareCodec};
use pcm_encode_stream::config::CodecBackend;
use pcm_encode_stream::config_file::ConfigFile;
use pcm_encode_stream::{
    AudioCaps, AudioFrame, AudioStream, EncodeError, EncodedPacket, EncoderConfig, MediaCodec,
    Rational, Result, SampleFormat, TickOutcome,
};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
const APP_NAME: &str = "pcm-encode-stream";

/// EOS ticks allowed before giving up on the codec's end-of-stream buffer
const MAX_FLUSH_TICKS: usize = 1000;

type Stream = AudioStream<Box<dyn MediaCodec>>;

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "encoder.toml".to_string());
    let loaded = if std::path::Path::new(&config_path).exists() {
        Some(ConfigFile::from_file(&config_path).map(ConfigFile::into_encoder_config))
    } else {
        None
    };
    let config = match &loaded {
        Some(Ok(config)) => config.clone(),
        _ => EncoderConfig::default(),
    };

    // Initialize logging
    init_logging(&config);
    tracing::info!("{} v{} starting", APP_NAME, VERSION);
    if let Some(Err(e)) = &loaded {
        tracing::warn!(
            "Failed to load config file {}: {}. Using defaults.",
            config_path,
            e
        );
    }
    tracing::info!("Configuration loaded: {:?}", config);

    #[cfg(feature = "ffmpeg")]
    {
        pcm_encode_stream::ffmpeg::init()?;
        tracing::info!("FFmpeg version: {}", pcm_encode_stream::ffmpeg::version_info());
    }

    let codec = build_codec(&config)?;
    let sink = |packet: EncodedPacket| {
        tracing::trace!(
            pts_us = packet.pts(),
            size = packet.len(),
            codec_config = packet.is_codec_config(),
            eos = packet.is_end_of_stream(),
            "packet ready"
        );
    };
    let stream: Arc<Stream> = Arc::new(AudioStream::new(&config, codec, sink)?);
    stream.init()?;

    let producer_done = Arc::new(AtomicBool::new(false));
    let producer = tokio::spawn(produce_tone(
        stream.clone(),
        config.clone(),
        producer_done.clone(),
    ));

    let encoder = {
        let stream = stream.clone();
        let done = producer_done.clone();
        tokio::task::spawn_blocking(move || drive_encoder(&stream, &done))
    };

    producer
        .await
        .map_err(|e| EncodeError::InvalidState(format!("producer task failed: {}", e)))??;
    encoder
        .await
        .map_err(|e| EncodeError::InvalidState(format!("encoder task failed: {}", e)))??;

    stream.uninit()?;

    let snapshot = stream.stats().snapshot();
    match serde_json::to_string_pretty(&snapshot) {
        Ok(json) => println!("{}", json),
        Err(e) => tracing::error!("Failed to serialize stats: {}", e),
    }

    Ok(())
}

/// Initialize logging with tracing
fn init_logging(config: &EncoderConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("pcm_encode_stream={}", config.log_level).into());
    let json = config.log_format == "json";

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(tracing_subscriber::fmt::layer))
        .init();
}

fn build_codec(config: &EncoderConfig) -> Result<Box<dyn MediaCodec>> {
    match config.codec.backend {
        CodecBackend::Pcm => Ok(Box::new(SoftwareCodec::new(
            PcmEncoder::new(),
            &config.codec,
        ))),
        #[cfg(feature = "ffmpeg")]
        CodecBackend::Aac => {
            use pcm_encode_stream::codec::aac::{is_aac_encoder_available, AacEncoder};
            if !is_aac_encoder_available() {
                tracing::warn!("AAC encoder not available in this FFmpeg build");
            }
            Ok(Box::new(SoftwareCodec::new(AacEncoder::new(), &config.codec)))
        }
        #[cfg(not(feature = "ffmpeg"))]
        CodecBackend::Aac => Err(EncodeError::Config(
            "the aac backend needs the ffmpeg feature".into(),
        )),
    }
}

/// Caps the tone is generated in. With FFmpeg available the source is float
/// so the resampler has something to do.
fn source_caps(config: &EncoderConfig) -> AudioCaps {
    let caps = config.stream.caps();
    if cfg!(feature = "ffmpeg") {
        AudioCaps::new(SampleFormat::Flt, caps.layout, caps.rate)
    } else {
        caps
    }
}

async fn produce_tone(
    stream: Arc<Stream>,
    config: EncoderConfig,
    done: Arc<AtomicBool>,
) -> Result<()> {
    let caps = source_caps(&config);
    let frame_ms = config.source.frame_ms.max(1);
    let per_frame = (caps.rate as u64 * frame_ms / 1000).max(1) as usize;
    let total = (config.source.duration_secs * caps.rate as f64) as i64;

    let mut interval = tokio::time::interval(Duration::from_millis(frame_ms));
    let mut next = 0i64;
    let result = loop {
        if next >= total {
            break Ok(());
        }
        interval.tick().await;

        let samples = per_frame.min((total - next) as usize);
        let frame = tone_frame(&caps, next, samples, config.source.tone_hz);
        match stream.convert_packet(&frame) {
            Ok(true) => {}
            Ok(false) => tracing::debug!(pts = next, "frame not queued"),
            Err(e) => break Err(e),
        }
        next += samples as i64;
    };

    tracing::info!(samples = next, "tone source finished");
    done.store(true, Ordering::SeqCst);
    result
}

fn drive_encoder(stream: &Stream, producer_done: &AtomicBool) -> Result<()> {
    loop {
        let finished = producer_done.load(Ordering::SeqCst);
        let outcome = stream.encode_data(false)?;
        if finished && stream.pending_bytes() == 0 && !outcome.made_progress() {
            break;
        }
    }

    for _ in 0..MAX_FLUSH_TICKS {
        if stream.encode_data(true)? == TickOutcome::EndOfStream {
            tracing::info!("encoder flushed");
            return Ok(());
        }
    }

    tracing::warn!("codec did not report end of stream after {} ticks", MAX_FLUSH_TICKS);
    Ok(())
}

/// Sine tone in `caps`, starting at sample `first_sample`.
fn tone_frame(caps: &AudioCaps, first_sample: i64, samples: usize, hz: f64) -> AudioFrame {
    let channels = caps.channels();
    let mut data = Vec::with_capacity(samples * caps.bytes_per_frame());

    for n in 0..samples {
        let t = (first_sample + n as i64) as f64 / caps.rate as f64;
        let v = (2.0 * std::f64::consts::PI * hz * t).sin() * 0.5;
        for _ in 0..channels {
            match caps.format {
                SampleFormat::U8 => data.push((v * 127.0 + 128.0) as u8),
                SampleFormat::S16 => data.extend_from_slice(&((v * 32767.0) as i16).to_le_bytes()),
                SampleFormat::S32 => {
                    data.extend_from_slice(&((v * 2_147_483_647.0) as i32).to_le_bytes())
                }
                SampleFormat::Flt => data.extend_from_slice(&(v as f32).to_le_bytes()),
                SampleFormat::Dbl => data.extend_from_slice(&v.to_le_bytes()),
            }
        }
    }

    AudioFrame::new(
        caps.clone(),
        &data,
        first_sample,
        Rational::new(1, caps.rate as i32),
    )
}
