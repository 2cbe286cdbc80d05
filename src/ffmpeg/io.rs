//! Custom AVIOContext for in-memory reading
//!
//! This module provides a custom IO context that reads from a `Bytes` blob
//! instead of a file, so a video handed over as bytes can be demuxed without
//! touching the filesystem.
//!
//! # Thread safety
//! `MemoryReader` is not shared: each `MemoryInput` owns exactly one reader and
//! is used by one thread at a time (inside `spawn_blocking`).

use bytes::Bytes;
use ffmpeg_next as ffmpeg;
use std::ffi::{c_int, c_void};
use std::io::{Read, Seek, SeekFrom};
use std::mem::ManuallyDrop;
use std::ops::{Deref, DerefMut};
use std::ptr;

use crate::error::MediaError;

/// Size of the buffer FFmpeg reads through
const AVIO_BUFFER_SIZE: usize = 64 * 1024;

/// `AVSEEK_SIZE`: return the stream size instead of seeking
const AVSEEK_SIZE: c_int = 0x10000;

/// `AVSEEK_FORCE`: hint flag that may be OR-ed into `whence`
const AVSEEK_FORCE: c_int = 0x20000;

/// Reads from an in-memory byte buffer.
pub struct MemoryReader {
    data: Bytes,
    position: u64,
}

impl MemoryReader {
    pub fn new(data: Bytes) -> Self {
        Self { data, position: 0 }
    }

    /// Total size of the buffer
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl Read for MemoryReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let start = (self.position as usize).min(self.data.len());
        let n = buf.len().min(self.data.len() - start);
        buf[..n].copy_from_slice(&self.data[start..start + n]);
        self.position += n as u64;
        Ok(n)
    }
}

impl Seek for MemoryReader {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        let len = self.data.len() as i64;

        let new_pos = match pos {
            SeekFrom::Start(p) => p as i64,
            SeekFrom::Current(p) => self.position as i64 + p,
            SeekFrom::End(p) => len + p,
        };

        if new_pos < 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "seek before start of buffer",
            ));
        }

        self.position = new_pos as u64;
        Ok(self.position)
    }
}

// C-compatible callbacks for FFmpeg

unsafe extern "C" fn read_packet(opaque: *mut c_void, buf: *mut u8, buf_size: c_int) -> c_int {
    let reader = &mut *(opaque as *mut MemoryReader);
    if buf_size <= 0 {
        return 0;
    }
    let slice = std::slice::from_raw_parts_mut(buf, buf_size as usize);
    match reader.read(slice) {
        Ok(0) => ffmpeg::ffi::AVERROR_EOF,
        Ok(n) => n as c_int,
        Err(_) => ffmpeg::ffi::AVERROR_EOF,
    }
}

unsafe extern "C" fn seek_packet(opaque: *mut c_void, offset: i64, whence: c_int) -> i64 {
    let reader = &mut *(opaque as *mut MemoryReader);

    if whence & AVSEEK_SIZE != 0 {
        return reader.len() as i64;
    }

    let seek_from = match whence & !AVSEEK_FORCE {
        0 => SeekFrom::Start(offset.max(0) as u64),
        1 => SeekFrom::Current(offset),
        2 => SeekFrom::End(offset),
        _ => return -1,
    };
    match reader.seek(seek_from) {
        Ok(pos) => pos as i64,
        Err(_) => -1,
    }
}

/// An FFmpeg input context reading from memory.
///
/// Owns the AVIO context and the reader behind it; both are released after
/// the format context on drop.
pub struct MemoryInput {
    input: ManuallyDrop<ffmpeg::format::context::Input>,
    avio: *mut ffmpeg::ffi::AVIOContext,
    reader: *mut MemoryReader,
}

// SAFETY: the raw pointers are owned exclusively by this value and are only
// dereferenced by FFmpeg while the owning thread drives the input context.
unsafe impl Send for MemoryInput {}

impl Deref for MemoryInput {
    type Target = ffmpeg::format::context::Input;

    fn deref(&self) -> &Self::Target {
        &self.input
    }
}

impl DerefMut for MemoryInput {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.input
    }
}

impl Drop for MemoryInput {
    fn drop(&mut self) {
        // The format context goes first: with AVFMT_FLAG_CUSTOM_IO it leaves
        // `pb` alone, so the AVIO context and reader are still ours to free.
        // SAFETY: `input` is never touched again after this point. `avio` and
        // `reader` were allocated in `open_memory_input` and nothing references
        // them once the format context is closed.
        unsafe {
            ManuallyDrop::drop(&mut self.input);
            free_avio(self.avio);
            drop(Box::from_raw(self.reader));
        }
    }
}

unsafe fn free_avio(mut avio: *mut ffmpeg::ffi::AVIOContext) {
    if avio.is_null() {
        return;
    }
    // FFmpeg may have replaced the buffer we handed over; free whatever it holds now.
    ffmpeg::ffi::av_freep(&mut (*avio).buffer as *mut *mut u8 as *mut c_void);
    ffmpeg::ffi::avio_context_free(&mut avio);
}

/// Open an input context over an in-memory byte blob.
pub fn open_memory_input(data: Bytes) -> Result<MemoryInput, MediaError> {
    if data.is_empty() {
        return Err(MediaError::OpenInput("byte source is empty".to_string()));
    }

    unsafe {
        // Box the reader to get a stable pointer for the opaque argument
        let reader_ptr = Box::into_raw(Box::new(MemoryReader::new(data)));

        let buffer = ffmpeg::ffi::av_malloc(AVIO_BUFFER_SIZE) as *mut u8;
        if buffer.is_null() {
            drop(Box::from_raw(reader_ptr));
            return Err(MediaError::OpenInput(
                "Failed to allocate AVIO buffer".to_string(),
            ));
        }

        let avio = ffmpeg::ffi::avio_alloc_context(
            buffer,
            AVIO_BUFFER_SIZE as c_int,
            0,
            reader_ptr as *mut c_void,
            Some(read_packet),
            None,
            Some(seek_packet),
        );
        if avio.is_null() {
            ffmpeg::ffi::av_free(buffer as *mut c_void);
            drop(Box::from_raw(reader_ptr));
            return Err(MediaError::OpenInput(
                "Failed to allocate AVIO context".to_string(),
            ));
        }

        let mut format_ptr = ffmpeg::ffi::avformat_alloc_context();
        if format_ptr.is_null() {
            free_avio(avio);
            drop(Box::from_raw(reader_ptr));
            return Err(MediaError::OpenInput(
                "Failed to allocate format context".to_string(),
            ));
        }
        (*format_ptr).pb = avio;
        (*format_ptr).flags |= ffmpeg::ffi::AVFMT_FLAG_CUSTOM_IO as c_int;

        // On failure avformat_open_input frees the format context itself.
        let ret = ffmpeg::ffi::avformat_open_input(
            &mut format_ptr,
            ptr::null(),
            ptr::null(),
            ptr::null_mut(),
        );
        if ret < 0 {
            free_avio(avio);
            drop(Box::from_raw(reader_ptr));
            return Err(MediaError::OpenInput(format!(
                "Failed to open in-memory input: {}",
                ffmpeg::Error::from(ret)
            )));
        }

        // From here on the wrapper owns the format context.
        let input = ffmpeg::format::context::Input::wrap(format_ptr);
        let memory_input = MemoryInput {
            input: ManuallyDrop::new(input),
            avio,
            reader: reader_ptr,
        };

        let ret = ffmpeg::ffi::avformat_find_stream_info(format_ptr, ptr::null_mut());
        if ret < 0 {
            return Err(MediaError::FindStreamInfo(
                ffmpeg::Error::from(ret).to_string(),
            ));
        }

        Ok(memory_input)
    }
}
