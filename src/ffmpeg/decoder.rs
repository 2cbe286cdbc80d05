//! FFmpeg-backed [`MediaDecoder`].
//!
//! Opens a file or an in-memory blob, seeks to whole-second timestamps and
//! renders the picture visible there as packed RGB.

use std::ops::{Deref, DerefMut};

use ffmpeg_next as ffmpeg;
use ffmpeg::format::context::Input;
use ffmpeg::format::Pixel;
use ffmpeg::software::scaling::{Context as ScalingContext, Flags as ScalingFlags};
use ffmpeg::util::frame::video::Video as VideoFrame;
use ffmpeg::Rational;
use image::RgbImage;

use super::io::{open_memory_input, MemoryInput};
use crate::error::MediaError;
use crate::sampler::{MediaDecoder, VideoSource};
use crate::types::VideoHandle;

/// Input context opened from a path or from memory.
enum InputContext {
    File(Input),
    Memory(MemoryInput),
}

impl Deref for InputContext {
    type Target = Input;

    fn deref(&self) -> &Self::Target {
        match self {
            InputContext::File(ctx) => ctx,
            InputContext::Memory(ctx) => ctx,
        }
    }
}

impl DerefMut for InputContext {
    fn deref_mut(&mut self) -> &mut Self::Target {
        match self {
            InputContext::File(ctx) => ctx,
            InputContext::Memory(ctx) => ctx,
        }
    }
}

/// Everything held while a video is open.
struct OpenVideo {
    input: InputContext,
    stream_index: usize,
    decoder: ffmpeg::decoder::Video,
    time_base: Rational,
    /// Stream start in seconds, zero when unknown
    start_secs: f64,
}

/// Decodes video through libavformat/libavcodec.
#[derive(Default)]
pub struct FfmpegDecoder {
    state: Option<OpenVideo>,
}

// SAFETY: the FFmpeg contexts are owned exclusively and only touched through
// `&mut self`, so moving the decoder to a blocking worker thread is sound.
unsafe impl Send for FfmpegDecoder {}

impl FfmpegDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a video is currently open
    pub fn is_open(&self) -> bool {
        self.state.is_some()
    }
}

fn open_input(source: &VideoSource) -> Result<InputContext, MediaError> {
    match source {
        VideoSource::Path(path) => ffmpeg::format::input(path)
            .map(InputContext::File)
            .map_err(|e| MediaError::OpenInput(format!("{}: {}", path.display(), e))),
        VideoSource::Bytes(bytes) => open_memory_input(bytes.clone()).map(InputContext::Memory),
    }
}

/// Container duration, falling back to the video stream's own duration.
fn duration_secs(input: &Input, stream_duration: i64, time_base: Rational) -> u64 {
    let container = input.duration();
    if container > 0 {
        return whole_seconds(container as f64 / ffmpeg::ffi::AV_TIME_BASE as f64);
    }
    if stream_duration > 0 && time_base.denominator() != 0 {
        return whole_seconds(stream_duration as f64 * f64::from(time_base));
    }
    0
}

/// Round an exact duration up, so that every whole second below the result
/// still lies inside the video.
fn whole_seconds(secs: f64) -> u64 {
    if secs.is_finite() && secs > 0.0 {
        secs.ceil() as u64
    } else {
        0
    }
}

fn pts_to_seconds(pts: i64, time_base: Rational) -> f64 {
    pts as f64 * f64::from(time_base)
}

/// Stream start time in seconds. Unset start times count as zero.
fn start_seconds(start_time: i64, time_base: Rational) -> f64 {
    if start_time == ffmpeg::ffi::AV_NOPTS_VALUE || time_base.denominator() == 0 {
        return 0.0;
    }
    pts_to_seconds(start_time, time_base).max(0.0)
}

/// Copy a packed RGB24 frame into an image, dropping the row padding.
fn frame_to_image(frame: &VideoFrame) -> Result<RgbImage, MediaError> {
    let width = frame.width();
    let height = frame.height();
    let stride = frame.stride(0);
    let row_len = width as usize * 3;
    let data = frame.data(0);

    let mut buffer = Vec::with_capacity(row_len * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        let end = start + row_len;
        if end > data.len() {
            return Err(MediaError::Scale("RGB plane is shorter than expected".to_string()));
        }
        buffer.extend_from_slice(&data[start..end]);
    }

    RgbImage::from_raw(width, height, buffer)
        .ok_or_else(|| MediaError::Scale("Failed to build RGB image from frame".to_string()))
}

fn to_rgb(frame: &VideoFrame) -> Result<RgbImage, MediaError> {
    let mut scaler = ScalingContext::get(
        frame.format(),
        frame.width(),
        frame.height(),
        Pixel::RGB24,
        frame.width(),
        frame.height(),
        ScalingFlags::BILINEAR,
    )
    .map_err(|e| MediaError::Scale(e.to_string()))?;

    let mut rgb = VideoFrame::empty();
    scaler
        .run(frame, &mut rgb)
        .map_err(|e| MediaError::Scale(e.to_string()))?;
    frame_to_image(&rgb)
}

impl OpenVideo {
    /// Seconds since the start of the stream.
    fn position(&self, frame: &VideoFrame) -> f64 {
        let pts = frame.timestamp().or(frame.pts()).unwrap_or(0);
        pts_to_seconds(pts, self.time_base) - self.start_secs
    }

    /// Decode forward from the last keyframe before `target` until a picture
    /// at or after `target` shows up. Near the end of the stream the last
    /// decoded picture stands in.
    fn capture(&mut self, timestamp: u64) -> Result<VideoFrame, MediaError> {
        let target = timestamp as f64;
        let seek_ts = ((self.start_secs + target) * ffmpeg::ffi::AV_TIME_BASE as f64) as i64;

        self.input
            .seek(seek_ts, ..seek_ts)
            .map_err(|e| MediaError::Seek {
                timestamp,
                reason: e.to_string(),
            })?;
        self.decoder.flush();

        let mut last: Option<VideoFrame> = None;
        let mut decoded = VideoFrame::empty();

        for (stream, packet) in self.input.packets() {
            if stream.index() != self.stream_index {
                continue;
            }
            if let Err(e) = self.decoder.send_packet(&packet) {
                tracing::debug!("Skipping undecodable packet near {}s: {}", timestamp, e);
                continue;
            }
            while self.decoder.receive_frame(&mut decoded).is_ok() {
                if self.position(&decoded) >= target {
                    return Ok(decoded);
                }
                last = Some(std::mem::replace(&mut decoded, VideoFrame::empty()));
            }
        }

        // Drain whatever the decoder still buffers
        self.decoder.send_eof()?;
        while self.decoder.receive_frame(&mut decoded).is_ok() {
            if self.position(&decoded) >= target {
                return Ok(decoded);
            }
            last = Some(std::mem::replace(&mut decoded, VideoFrame::empty()));
        }

        last.ok_or(MediaError::NoFrameAt(timestamp))
    }
}

impl MediaDecoder for FfmpegDecoder {
    fn open(&mut self, source: &VideoSource) -> Result<VideoHandle, MediaError> {
        self.close();
        super::init()?;

        let byte_size = source
            .byte_size()
            .map_err(|e| MediaError::OpenInput(format!("{}: {}", source.describe(), e)))?;
        let input = open_input(source)?;

        let stream = input
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or(MediaError::NoVideoStream)?;
        let stream_index = stream.index();
        let time_base = stream.time_base();
        let stream_duration = stream.duration();
        let start_secs = start_seconds(stream.start_time(), time_base);

        let decoder = ffmpeg::codec::context::Context::from_parameters(stream.parameters())
            .and_then(|ctx| ctx.decoder().video())
            .map_err(|e| MediaError::DecoderCreate(e.to_string()))?;

        let handle = VideoHandle {
            duration_secs: duration_secs(&input, stream_duration, time_base),
            width: decoder.width(),
            height: decoder.height(),
            byte_size,
        };

        tracing::debug!(
            "Video stream #{} ({:?}), time base {}, starts at {:.3}s",
            stream_index,
            decoder.id(),
            time_base,
            start_secs
        );

        self.state = Some(OpenVideo {
            input,
            stream_index,
            decoder,
            time_base,
            start_secs,
        });

        Ok(handle)
    }

    fn seek_and_capture(&mut self, timestamp: u64) -> Result<RgbImage, MediaError> {
        let state = self.state.as_mut().ok_or(MediaError::NotOpen)?;
        let frame = state.capture(timestamp)?;
        to_rgb(&frame)
    }

    fn close(&mut self) {
        if self.state.take().is_some() {
            tracing::debug!("Decoder closed");
        }
    }
}
