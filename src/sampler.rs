//! Frame sampling.
//!
//! Drives a [`MediaDecoder`] across `0, interval, 2*interval, ...` while the
//! timestamp stays below the video duration. Every captured picture is shrunk
//! to fit the bounding box (never enlarged) and compressed to JPEG.
//!
//! The decoder is owned by the [`Frames`] iterator: it is opened when sampling
//! starts and closed when the iterator is exhausted, fails, or is dropped.

use std::io::Cursor;
use std::path::PathBuf;

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::RgbImage;

use crate::cancel::CancellationToken;
use crate::error::{HighlightError, MediaError, Result};
use crate::progress::ProgressSink;
use crate::types::{AnalysisConfig, EncodedImage, Frame, ImageFormat, VideoHandle};

/// Default bounding box for sampled frames
pub const DEFAULT_MAX_WIDTH: u32 = 640;
pub const DEFAULT_MAX_HEIGHT: u32 = 360;

/// Where the video bytes come from.
#[derive(Debug, Clone)]
pub enum VideoSource {
    /// A local file
    Path(PathBuf),
    /// An in-memory blob
    Bytes(Bytes),
}

impl VideoSource {
    /// Size of the byte source
    pub fn byte_size(&self) -> std::io::Result<u64> {
        match self {
            VideoSource::Path(path) => Ok(std::fs::metadata(path)?.len()),
            VideoSource::Bytes(bytes) => Ok(bytes.len() as u64),
        }
    }

    /// Short description for logs
    pub fn describe(&self) -> String {
        match self {
            VideoSource::Path(path) => path.display().to_string(),
            VideoSource::Bytes(bytes) => format!("<{} bytes in memory>", bytes.len()),
        }
    }
}

/// Opens a video and renders the picture visible at a given second.
pub trait MediaDecoder {
    /// Open the source. Failing here fails the whole sampling pass.
    fn open(&mut self, source: &VideoSource) -> std::result::Result<VideoHandle, MediaError>;

    /// Seek to `timestamp` seconds and render the picture shown there.
    fn seek_and_capture(&mut self, timestamp: u64) -> std::result::Result<RgbImage, MediaError>;

    /// Release the decode resources. Must be safe to call more than once.
    fn close(&mut self);
}

/// Sampling parameters
#[derive(Debug, Clone, PartialEq)]
pub struct SamplingOptions {
    /// Seconds between samples, > 0
    pub interval: u64,
    /// Cap on emitted frames, 0 for unbounded
    pub max_frames: usize,
    /// JPEG quality in (0, 1]
    pub quality: f32,
    /// Bounding box width
    pub max_width: u32,
    /// Bounding box height
    pub max_height: u32,
}

impl Default for SamplingOptions {
    fn default() -> Self {
        Self {
            interval: 5,
            max_frames: 0,
            quality: 0.8,
            max_width: DEFAULT_MAX_WIDTH,
            max_height: DEFAULT_MAX_HEIGHT,
        }
    }
}

impl SamplingOptions {
    /// Take interval, frame cap and quality from a run configuration.
    pub fn from_config(config: &AnalysisConfig, max_width: u32, max_height: u32) -> Self {
        Self {
            interval: config.interval,
            max_frames: config.max_frames,
            quality: config.frame_quality,
            max_width,
            max_height,
        }
    }
}

/// Compute a non-upscaling fit of `src` inside `max`.
///
/// Returns the target dimensions and the scale factor, which is never above 1.
pub fn fit_within(src_width: u32, src_height: u32, max_width: u32, max_height: u32) -> (u32, u32, f64) {
    if src_width == 0 || src_height == 0 {
        return (0, 0, 1.0);
    }
    if src_width <= max_width && src_height <= max_height {
        return (src_width, src_height, 1.0);
    }

    let (w, h) = (src_width as u64, src_height as u64);
    let (mw, mh) = (max_width as u64, max_height as u64);
    // Integer math keeps floor(src * scale) exact on the binding side.
    if mw * h <= mh * w {
        let height = (h * mw / w).max(1) as u32;
        (max_width, height, max_width as f64 / src_width as f64)
    } else {
        let width = (w * mh / h).max(1) as u32;
        (width, max_height, max_height as f64 / src_height as f64)
    }
}

/// Resize `image` to fit the bounding box and compress it.
pub fn encode_frame_image(
    image: &RgbImage,
    options: &SamplingOptions,
) -> std::result::Result<EncodedImage, MediaError> {
    let (width, height, scale) =
        fit_within(image.width(), image.height(), options.max_width, options.max_height);
    if width == 0 || height == 0 {
        return Err(MediaError::Encode("captured image is empty".to_string()));
    }

    let resized;
    let source = if scale < 1.0 {
        resized = image::imageops::resize(image, width, height, FilterType::Triangle);
        &resized
    } else {
        image
    };

    let quality = (options.quality * 100.0).round().clamp(1.0, 100.0) as u8;
    let mut buffer = Cursor::new(Vec::new());
    JpegEncoder::new_with_quality(&mut buffer, quality)
        .encode_image(source)
        .map_err(|e| MediaError::Encode(e.to_string()))?;

    Ok(EncodedImage {
        data: Bytes::from(buffer.into_inner()),
        format: ImageFormat::Jpeg,
        quality: options.quality,
        width: source.width(),
        height: source.height(),
    })
}

/// Number of timestamps sampled for `duration` seconds.
pub fn expected_frame_count(duration: u64, interval: u64, max_frames: usize) -> usize {
    if interval == 0 {
        return 0;
    }
    let count = duration.div_ceil(interval) as usize;
    if max_frames > 0 {
        count.min(max_frames)
    } else {
        count
    }
}

/// Samples a video at fixed intervals.
#[derive(Debug, Clone)]
pub struct VideoSampler {
    options: SamplingOptions,
}

impl VideoSampler {
    pub fn new(options: SamplingOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &SamplingOptions {
        &self.options
    }

    /// Open `source` with `decoder` and return the lazy frame sequence.
    ///
    /// Fails upfront with a media error when the source cannot be decoded; no
    /// frame is produced in that case and the decoder is already closed.
    pub fn sample<D: MediaDecoder>(
        &self,
        mut decoder: D,
        source: &VideoSource,
        cancel: CancellationToken,
    ) -> Result<Frames<D>> {
        if self.options.interval == 0 {
            decoder.close();
            return Err(HighlightError::Validation(
                "sampling interval must be greater than zero".to_string(),
            ));
        }

        let handle = match decoder.open(source) {
            Ok(handle) => handle,
            Err(e) => {
                decoder.close();
                return Err(e.into());
            }
        };

        tracing::debug!(
            "Opened {}: {}s, {}x{}, {} bytes",
            source.describe(),
            handle.duration_secs,
            handle.width,
            handle.height,
            handle.byte_size
        );

        Ok(Frames {
            decoder: Some(decoder),
            handle,
            options: self.options.clone(),
            cancel,
            next_timestamp: 0,
            emitted: 0,
            cancelled: false,
        })
    }

    /// Sample every frame eagerly, reporting progress after each one.
    ///
    /// Any decode failure aborts the pass and discards what was sampled.
    /// Cancellation stops early and returns the frames sampled so far.
    pub fn sample_all<D: MediaDecoder>(
        &self,
        decoder: D,
        source: &VideoSource,
        progress: &mut dyn ProgressSink,
        cancel: CancellationToken,
    ) -> Result<SampledVideo> {
        let mut frames = self.sample(decoder, source, cancel)?;
        let handle = frames.handle();
        let mut sampled = Vec::with_capacity(expected_frame_count(
            handle.duration_secs,
            self.options.interval,
            self.options.max_frames,
        ));

        while let Some(frame) = frames.next() {
            let frame = frame.map_err(HighlightError::from)?;
            sampled.push(frame);
            progress.on_sampled(frames.percent_done(), sampled.len());
        }

        Ok(SampledVideo {
            handle,
            frames: sampled,
            cancelled: frames.was_cancelled(),
        })
    }
}

/// Output of an eager sampling pass.
#[derive(Debug, Clone)]
pub struct SampledVideo {
    pub handle: VideoHandle,
    pub frames: Vec<Frame>,
    /// Sampling stopped early on request
    pub cancelled: bool,
}

/// Lazy, one-shot sequence of sampled frames.
pub struct Frames<D: MediaDecoder> {
    decoder: Option<D>,
    handle: VideoHandle,
    options: SamplingOptions,
    cancel: CancellationToken,
    next_timestamp: u64,
    emitted: usize,
    cancelled: bool,
}

impl<D: MediaDecoder> Frames<D> {
    /// Metadata of the opened video
    pub fn handle(&self) -> VideoHandle {
        self.handle
    }

    /// Share of the duration covered by the last emitted frame, floored.
    pub fn percent_done(&self) -> u8 {
        if self.emitted == 0 || self.handle.duration_secs == 0 {
            return 0;
        }
        let last = self.next_timestamp.saturating_sub(self.options.interval);
        (last * 100 / self.handle.duration_secs).min(100) as u8
    }

    /// Frames emitted so far
    pub fn emitted(&self) -> usize {
        self.emitted
    }

    /// Whether sampling stopped because of a cancellation request
    pub fn was_cancelled(&self) -> bool {
        self.cancelled
    }

    fn release(&mut self) {
        if let Some(mut decoder) = self.decoder.take() {
            decoder.close();
        }
    }

    fn exhausted(&self) -> bool {
        self.next_timestamp >= self.handle.duration_secs
            || (self.options.max_frames > 0 && self.emitted >= self.options.max_frames)
    }
}

impl<D: MediaDecoder> Iterator for Frames<D> {
    type Item = std::result::Result<Frame, MediaError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.decoder.as_ref()?;

        if self.exhausted() {
            self.release();
            return None;
        }

        if self.cancel.is_cancelled() {
            tracing::info!("Sampling cancelled after {} frames", self.emitted);
            self.cancelled = true;
            self.release();
            return None;
        }

        let timestamp = self.next_timestamp;
        let decoder = self.decoder.as_mut()?;
        let captured = decoder
            .seek_and_capture(timestamp)
            .and_then(|picture| encode_frame_image(&picture, &self.options));

        match captured {
            Ok(image) => {
                let frame = Frame {
                    timestamp,
                    index: self.emitted,
                    image,
                };
                self.emitted += 1;
                self.next_timestamp += self.options.interval;
                tracing::debug!(
                    "Sampled frame {} at {}s ({} bytes)",
                    frame.index,
                    frame.timestamp,
                    frame.image.data.len()
                );
                Some(Ok(frame))
            }
            Err(e) => {
                self.release();
                Some(Err(e))
            }
        }
    }
}

impl<D: MediaDecoder> Drop for Frames<D> {
    fn drop(&mut self) {
        self.release();
    }
}
