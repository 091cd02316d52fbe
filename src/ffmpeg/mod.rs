//! FFmpeg bootstrap for the libswresample converter and the AAC backend

pub use ffmpeg_next as ffmpeg;

use ffmpeg_next::util::log;

/// Initialize FFmpeg library
///
/// This should be called once at application startup, before any converter
/// or AAC codec is created. Library log output is limited to warnings.
pub fn init() -> Result<(), crate::error::FfmpegError> {
    ffmpeg::init().map_err(|e| {
        crate::error::FfmpegError::InitFailed(format!("ffmpeg::init() failed: {}", e))
    })?;
    log::set_level(log::Level::Warning);

    tracing::info!("FFmpeg initialized");

    Ok(())
}

/// Get FFmpeg version information
pub fn version_info() -> String {
    let version = ffmpeg::util::version();
    format!(
        "libavutil {}.{}.{}",
        version >> 16,
        (version >> 8) & 0xff,
        version & 0xff
    )
}
