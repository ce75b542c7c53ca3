//! Captured frames
//!
//! A [`Frame`] is an immutable image snapshot. Once published to the
//! [`FrameBuffer`](crate::FrameBuffer) it is shared behind an `Arc` and never
//! touched again; the next capture supersedes it.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};

/// Supported pixel formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameFormat {
    /// BGR with 8 bits per channel (screen capture default)
    #[default]
    BGR8,
    /// RGB with 8 bits per channel
    RGB8,
    /// RGBA with 8 bits per channel
    RGBA8,
    /// Grayscale 8-bit
    Gray8,
}

impl FrameFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            FrameFormat::BGR8 | FrameFormat::RGB8 => 3,
            FrameFormat::RGBA8 => 4,
            FrameFormat::Gray8 => 1,
        }
    }

    /// Get the expected buffer size for a frame of this format
    pub fn frame_size(self, width: u32, height: u32) -> usize {
        width as usize * height as usize * self.bytes_per_pixel()
    }
}

/// One captured image snapshot.
#[derive(Debug, Clone)]
pub struct Frame {
    width: u32,
    height: u32,
    format: FrameFormat,
    data: Vec<u8>,
    captured_at: DateTime<Utc>,
    /// Sequence number assigned by the frame buffer on publish (0 = unpublished)
    seq: u64,
}

impl Frame {
    /// Wrap raw pixel data, checking that the buffer matches the dimensions.
    pub fn new(width: u32, height: u32, format: FrameFormat, data: Vec<u8>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::CaptureUnavailable(format!(
                "invalid frame dimensions {}x{}",
                width, height
            )));
        }
        let expected = format.frame_size(width, height);
        if data.len() != expected {
            return Err(Error::CaptureUnavailable(format!(
                "frame buffer is {} bytes, expected {} for {}x{} {:?}",
                data.len(),
                expected,
                width,
                height,
                format
            )));
        }

        Ok(Self {
            width,
            height,
            format,
            data,
            captured_at: Utc::now(),
            seq: 0,
        })
    }

    /// A black BGR frame.
    pub fn blank(width: u32, height: u32) -> Result<Self> {
        let data = vec![0u8; FrameFormat::BGR8.frame_size(width, height)];
        Self::new(width, height, FrameFormat::BGR8, data)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn format(&self) -> FrameFormat {
        self.format
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    /// Override the capture timestamp, e.g. for replayed footage.
    pub fn with_captured_at(mut self, captured_at: DateTime<Utc>) -> Self {
        self.captured_at = captured_at;
        self
    }

    /// Time since capture. Zero if the clock went backwards.
    pub fn age(&self) -> Duration {
        (Utc::now() - self.captured_at).to_std().unwrap_or(Duration::ZERO)
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Screen centre in frame pixel coordinates.
    pub fn center(&self) -> (i32, i32) {
        ((self.width / 2) as i32, (self.height / 2) as i32)
    }

    pub(crate) fn set_seq(&mut self, seq: u64) {
        self.seq = seq;
    }
}
