//! Frame sources that need no platform capture API
//!
//! [`SyntheticSource`] renders test frames, [`ImageSequenceSource`] replays
//! images from disk, and [`Limited`] caps any source at a frame count.

use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use tracing::{debug, info};
use vantage_core::{Error, Frame, FrameFormat, FrameSource, Result};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp"];

/// Gradient frames of a fixed size; never fails.
pub struct SyntheticSource {
    width: u32,
    height: u32,
    tick: u32,
}

impl SyntheticSource {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            tick: 0,
        }
    }
}

impl FrameSource for SyntheticSource {
    fn capture(&mut self) -> Result<Frame> {
        let (w, h) = (self.width, self.height);
        let mut data = vec![0u8; FrameFormat::BGR8.frame_size(w, h)];

        // Fill with a gradient that drifts each frame
        for y in 0..h {
            for x in 0..w {
                let idx = ((y * w + x) * 3) as usize;
                data[idx] = 128; // B
                data[idx + 1] = ((y + self.tick) % 256) as u8; // G
                data[idx + 2] = ((x + self.tick) % 256) as u8; // R
            }
        }
        self.tick = self.tick.wrapping_add(1);

        Frame::new(w, h, FrameFormat::BGR8, data)
    }

    fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Replays one image, or every image in a directory sorted by file name,
/// looping forever.
pub struct ImageSequenceSource {
    width: u32,
    height: u32,
    /// Decoded BGR frames at the configured resolution
    frames: Vec<Vec<u8>>,
    next: usize,
}

impl ImageSequenceSource {
    /// Decode all images under `path`, resized to `width`x`height`.
    pub fn open(path: impl AsRef<Path>, width: u32, height: u32) -> Result<Self> {
        let path = path.as_ref();
        let files = collect_images(path)?;

        if files.is_empty() {
            return Err(Error::CaptureUnavailable(format!(
                "no images found at {}",
                path.display()
            )));
        }

        let mut frames = Vec::with_capacity(files.len());
        for file in &files {
            frames.push(decode_bgr(file, width, height)?);
            debug!("Loaded replay frame {}", file.display());
        }

        info!(
            "Replaying {} image(s) from {} at {}x{}",
            frames.len(),
            path.display(),
            width,
            height
        );

        Ok(Self {
            width,
            height,
            frames,
            next: 0,
        })
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl FrameSource for ImageSequenceSource {
    fn capture(&mut self) -> Result<Frame> {
        let data = self
            .frames
            .get(self.next)
            .cloned()
            .ok_or_else(|| Error::CaptureUnavailable("replay sequence is empty".to_string()))?;
        self.next = (self.next + 1) % self.frames.len();

        Frame::new(self.width, self.height, FrameFormat::BGR8, data)
    }

    fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Ends a source after `max_frames` captures, the same way a lost capture
/// handle would.
pub struct Limited<S> {
    inner: S,
    remaining: u64,
}

impl<S: FrameSource> Limited<S> {
    pub fn new(inner: S, max_frames: u64) -> Self {
        Self {
            inner,
            remaining: max_frames,
        }
    }
}

impl<S: FrameSource> FrameSource for Limited<S> {
    fn capture(&mut self) -> Result<Frame> {
        if self.remaining == 0 {
            return Err(Error::CaptureUnavailable("frame limit reached".to_string()));
        }
        self.remaining -= 1;
        self.inner.capture()
    }

    fn resolution(&self) -> (u32, u32) {
        self.inner.resolution()
    }
}

fn collect_images(path: &Path) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    let entries = std::fs::read_dir(path).map_err(|e| {
        Error::CaptureUnavailable(format!("cannot read capture path {}: {}", path.display(), e))
    })?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
                .unwrap_or(false)
        })
        .collect();
    files.sort();
    Ok(files)
}

fn decode_bgr(file: &Path, width: u32, height: u32) -> Result<Vec<u8>> {
    let img = image::open(file).map_err(|e| {
        Error::CaptureUnavailable(format!("failed to decode {}: {}", file.display(), e))
    })?;

    let img = if img.width() != width || img.height() != height {
        img.resize_exact(width, height, FilterType::Triangle)
    } else {
        img
    };

    let mut data = img.to_rgb8().into_raw();
    // RGB to BGR
    for px in data.chunks_exact_mut(3) {
        px.swap(0, 2);
    }
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthetic_source_resolution() {
        let mut source = SyntheticSource::new(32, 16);
        let frame = source.capture().unwrap();
        assert_eq!(frame.dimensions(), (32, 16));
        assert_eq!(frame.format(), FrameFormat::BGR8);
        assert_eq!(source.resolution(), (32, 16));
    }

    #[test]
    fn test_synthetic_frames_change() {
        let mut source = SyntheticSource::new(8, 8);
        let a = source.capture().unwrap();
        let b = source.capture().unwrap();
        assert_ne!(a.data(), b.data());
    }

    #[test]
    fn test_limited_source_ends_with_capture_unavailable() {
        let mut source = Limited::new(SyntheticSource::new(4, 4), 2);
        assert!(source.capture().is_ok());
        assert!(source.capture().is_ok());
        let err = source.capture().unwrap_err();
        assert!(matches!(err, Error::CaptureUnavailable(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_missing_path_is_capture_unavailable() {
        // the directory listing fails, and must not surface as a plain io error
        match ImageSequenceSource::open("/definitely/not/here", 4, 4) {
            Err(Error::CaptureUnavailable(msg)) => assert!(msg.contains("cannot read capture path")),
            Err(other) => panic!("expected CaptureUnavailable, got {}", other),
            Ok(_) => panic!("expected CaptureUnavailable, got a source"),
        }
    }
}
