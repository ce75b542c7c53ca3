//! Seams to the external collaborators of the pipeline.

use crate::error::Result;
use crate::frame::Frame;
use crate::types::{DetectionBatch, TargetVector};

/// Produces frames on demand (screen grabber, file replay, test generator).
pub trait FrameSource: Send {
    /// Capture one frame at the fixed configured resolution.
    ///
    /// An `Err` is treated as `CaptureUnavailable` and ends the pipeline.
    fn capture(&mut self) -> Result<Frame>;

    /// Fixed output resolution, set at startup.
    fn resolution(&self) -> (u32, u32);
}

/// Runs inference on a frame.
pub trait Detector: Send {
    /// Detect objects in `frame`. Nothing found is an empty batch, not an
    /// error.
    fn detect(&mut self, frame: &Frame) -> Result<DetectionBatch>;
}

/// Receives target vectors, best effort.
pub trait DeliverySink: Send {
    fn send(&mut self, vector: &TargetVector) -> std::io::Result<()>;
}

impl<T: FrameSource + ?Sized> FrameSource for Box<T> {
    fn capture(&mut self) -> Result<Frame> {
        (**self).capture()
    }

    fn resolution(&self) -> (u32, u32) {
        (**self).resolution()
    }
}

impl<T: Detector + ?Sized> Detector for Box<T> {
    fn detect(&mut self, frame: &Frame) -> Result<DetectionBatch> {
        (**self).detect(frame)
    }
}

impl<T: DeliverySink + ?Sized> DeliverySink for Box<T> {
    fn send(&mut self, vector: &TargetVector) -> std::io::Result<()> {
        (**self).send(vector)
    }
}
