use thiserror::Error;

use crate::format::SampleFormat;

/// Main error type for the encoding stage
#[derive(Error, Debug)]
pub enum EncodeError {
    /// An error originating from the underlying FFmpeg libraries
    #[cfg(feature = "ffmpeg")]
    #[error("FFmpeg error: {0}")]
    Ffmpeg(#[from] FfmpegError),

    /// A standard I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The negotiated sample format has no codec PCM encoding
    #[error("Unsupported sample format: {0:?}")]
    UnsupportedFormat(SampleFormat),

    /// The negotiated channel layout produces no usable codec channel mask
    #[error("Unsupported channel layout: {0}")]
    UnsupportedLayout(String),

    /// The codec returned no memory for a buffer index it had granted
    #[error("Codec buffer unavailable: index={index}")]
    CodecBufferUnavailable { index: usize },

    /// Fatal codec-level failure; aborts the encoding session
    #[error("Codec error: {0}")]
    Codec(String),

    /// The format converter failed to process a packet
    #[error("Converter error: {0}")]
    Converter(String),

    /// An operation was attempted in a lifecycle state that forbids it
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Encoder configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

/// FFmpeg-specific errors
#[cfg(feature = "ffmpeg")]
#[derive(Error, Debug)]
pub enum FfmpegError {
    /// Failure during global FFmpeg initialization
    #[error("FFmpeg initialization failed: {0}")]
    InitFailed(String),

    /// The requested encoder was not found in this FFmpeg build
    #[error("Failed to find encoder: {0}")]
    EncoderNotFound(String),

    /// Failure instantiating or opening an encoder
    #[error("Failed to create encoder: {0}")]
    EncoderCreate(String),

    /// Failure encoding a single frame into a packet
    #[error("Failed to encode frame: {0}")]
    EncodeFrame(String),

    /// Failure creating an audio resampler
    #[error("Failed to create resampler: {0}")]
    ResamplerCreate(String),

    /// Failure converting samples through the resampler
    #[error("Resampling error: {0}")]
    Resample(String),
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, EncodeError>;
