//! FFmpeg module - provides the FFmpeg-backed media decoder
//!
//! This module handles:
//! - FFmpeg initialization
//! - Routing FFmpeg's own log output through `tracing`
//! - Custom AVIOContext for decoding in-memory byte sources
//! - Seeking and rendering RGB pictures at whole-second timestamps

pub mod decoder;
pub mod io;

pub use decoder::FfmpegDecoder;
pub use ffmpeg_next as ffmpeg;

use crate::error::MediaError;

/// Initialize the FFmpeg library.
///
/// Safe to call more than once; later calls are cheap no-ops on FFmpeg's side.
pub fn init() -> Result<(), MediaError> {
    ffmpeg::init()
        .map_err(|e| MediaError::InitFailed(format!("ffmpeg::init() failed: {}", e)))?;

    tracing::debug!("FFmpeg initialized");

    Ok(())
}

/// Install a custom FFmpeg log callback that forwards warnings to `tracing`
/// and drops known-noisy messages.
///
/// Seeking into the middle of a group of pictures makes H.264/HEVC decoders
/// complain about missing references until the next keyframe. Those messages
/// are expected and are filtered out.
///
/// Must be called after `init()` and before any decoding starts, because
/// altering the global log callback is not thread-safe.
pub fn install_log_filter() {
    // SAFETY: both functions modify global FFmpeg state and are safe to call
    // after `ffmpeg::init()`. They are called once at startup before any
    // decoding thread exists.
    unsafe {
        ffmpeg_next::ffi::av_log_set_level(ffmpeg_next::ffi::AV_LOG_WARNING as i32);
        ffmpeg_next::ffi::av_log_set_callback(Some(ffmpeg_log_callback));
    }
}

/// Messages that are expected side-effects of seeking and should be suppressed.
const SUPPRESSED_MESSAGES: &[&str] = &[
    "co located POCs unavailable",
    "mmco: unref short failure",
    "Missing reference picture",
    "reference picture missing during reorder",
    "Could not find ref with POC",
    "number of reference frames",
];

unsafe extern "C" fn ffmpeg_log_callback(
    avcl: *mut std::ffi::c_void,
    level: std::ffi::c_int,
    fmt: *const std::ffi::c_char,
    vl: ffmpeg_next::ffi::va_list,
) {
    use std::ffi::CStr;

    if level > ffmpeg_next::ffi::av_log_get_level() {
        return;
    }

    let mut buf = [0 as std::ffi::c_char; 1024];
    let mut print_prefix: std::ffi::c_int = 1;
    ffmpeg_next::ffi::av_log_format_line(
        avcl,
        level,
        fmt,
        vl,
        buf.as_mut_ptr(),
        buf.len() as std::ffi::c_int,
        &mut print_prefix,
    );

    let msg = CStr::from_ptr(buf.as_ptr()).to_string_lossy();
    let msg = msg.trim_end();

    if msg.is_empty() || SUPPRESSED_MESSAGES.iter().any(|s| msg.contains(s)) {
        return;
    }

    if level <= ffmpeg_next::ffi::AV_LOG_ERROR as std::ffi::c_int {
        tracing::error!(target: "ffmpeg", "{}", msg);
    } else {
        tracing::warn!(target: "ffmpeg", "{}", msg);
    }
}

/// Version of the linked libavformat, as `major.minor.micro`.
pub fn version_info() -> String {
    let version = ffmpeg::format::version();
    format!(
        "libavformat {}.{}.{}",
        version >> 16,
        (version >> 8) & 0xff,
        version & 0xff
    )
}
