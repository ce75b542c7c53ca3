//! Pipeline driver
//!
//! Wires a [`FrameSource`], a [`Detector`] and a [`DeliverySink`] together
//! through a shared [`FrameBuffer`] and runs them until capture fails or
//! shutdown is requested.
//!
//! Two schedules are supported:
//!
//! - **Inline**: capture, publish, detect on the same frame, repeat. The
//!   detector's latency directly throttles the capture rate.
//! - **Decoupled**: a capture thread publishes as fast as the source allows
//!   while the calling thread detects on whatever frame is newest. Frames
//!   published while a detection is in flight are dropped; at most one
//!   detection is ever in flight.
//!
//! Only a capture failure ends a run with an error. Detector errors, empty
//! batches, unqualified candidates and delivery failures all just suppress
//! output for that cycle.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{debug, error, info, warn};
use vantage_core::tracing::prefix;
use vantage_core::{
    DeliverySink, Detector, Error, Frame, FrameBuffer, FrameSource, Result, Selection,
    TargetSelector,
};

use crate::config::PipelineMode;
use crate::shutdown::Shutdown;

/// Scheduling knobs for a driver.
#[derive(Debug, Clone, Copy)]
pub struct DriverSettings {
    /// Targeting origin, normally the capture centre
    pub reference: (i32, i32),
    pub mode: PipelineMode,
    /// Decoupled detector wake-up interval
    pub frame_wait: Duration,
}

/// Counters reported when a run ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub frames_captured: u64,
    /// Frames replaced before the detector got to them
    pub frames_dropped: u64,
    pub detections_run: u64,
    pub detection_errors: u64,
    pub targets_sent: u64,
    pub delivery_failures: u64,
}

/// Detection, selection and delivery for one frame at a time.
struct DetectionStage<D, K> {
    detector: D,
    sink: K,
    selector: TargetSelector,
    reference: (i32, i32),
    buffer: Arc<FrameBuffer>,
    summary: RunSummary,
}

impl<D: Detector, K: DeliverySink> DetectionStage<D, K> {
    fn process(&mut self, frame: &Frame) -> Option<Selection> {
        let batch = match self.detector.detect(frame) {
            Ok(batch) => batch,
            Err(e) => {
                warn!("Detection failed on frame {}: {}", frame.seq(), e);
                self.summary.detection_errors += 1;
                return None;
            }
        };
        self.summary.detections_run += 1;

        if batch.is_empty() {
            debug!(frame = frame.seq(), "no detections");
            return None;
        }

        let batch = self.buffer.publish_result(batch);
        debug!(
            frame = frame.seq(),
            detections = batch.len(),
            age_ms = frame.age().as_millis() as u64,
            "detections published"
        );

        let selection = self.selector.select_batch(&batch, self.reference)?;

        info!(
            "{} Target acquired (X: {}, Y: {}, confidence: {:.3}) (dx: {}, dy: {})",
            prefix::TARGET,
            selection.center.0,
            selection.center.1,
            selection.confidence,
            selection.vector.delta_x,
            selection.vector.delta_y
        );

        match self.sink.send(&selection.vector) {
            Ok(()) => self.summary.targets_sent += 1,
            Err(e) => {
                // best effort: the next cycle's vector supersedes this one
                warn!("{}", Error::Delivery(e));
                self.summary.delivery_failures += 1;
            }
        }

        Some(selection)
    }
}

pub struct PipelineDriver<S, D, K> {
    source: S,
    stage: DetectionStage<D, K>,
    buffer: Arc<FrameBuffer>,
    mode: PipelineMode,
    frame_wait: Duration,
    shutdown: Shutdown,
}

impl<S, D, K> PipelineDriver<S, D, K>
where
    S: FrameSource,
    D: Detector,
    K: DeliverySink,
{
    pub fn new(source: S, detector: D, sink: K, selector: TargetSelector, settings: DriverSettings) -> Self {
        let buffer = Arc::new(FrameBuffer::new());
        Self {
            source,
            stage: DetectionStage {
                detector,
                sink,
                selector,
                reference: settings.reference,
                buffer: Arc::clone(&buffer),
                summary: RunSummary::default(),
            },
            buffer,
            mode: settings.mode,
            frame_wait: settings.frame_wait,
            shutdown: Shutdown::new(),
        }
    }

    /// Share an existing buffer, e.g. with an overlay monitor.
    pub fn with_buffer(mut self, buffer: Arc<FrameBuffer>) -> Self {
        self.stage.buffer = Arc::clone(&buffer);
        self.buffer = buffer;
        self
    }

    pub fn with_shutdown(mut self, shutdown: Shutdown) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn buffer(&self) -> Arc<FrameBuffer> {
        Arc::clone(&self.buffer)
    }

    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Run until shutdown (`Ok`) or capture failure (`Err`).
    pub fn run(&mut self) -> Result<RunSummary> {
        let (width, height) = self.source.resolution();
        info!(
            "{} Pipeline starting: {:?} mode, {}x{} capture, reference ({}, {})",
            prefix::OPEN,
            self.mode,
            width,
            height,
            self.stage.reference.0,
            self.stage.reference.1
        );

        let result = match self.mode {
            PipelineMode::Inline => self.run_inline(),
            PipelineMode::Decoupled => self.run_decoupled(),
        };

        let summary = self.summary();
        info!(
            "{} Pipeline stopped: {} frames captured, {} dropped, {} detections, {} targets sent, {} delivery failures",
            prefix::CLOSE,
            summary.frames_captured,
            summary.frames_dropped,
            summary.detections_run,
            summary.targets_sent,
            summary.delivery_failures
        );

        if let Err(e) = &result {
            error!("{} {}", prefix::CAPTURE, e);
        }
        result.map(|_| summary)
    }

    /// Counters so far.
    pub fn summary(&self) -> RunSummary {
        let stats = self.buffer.stats();
        RunSummary {
            frames_captured: stats.frames_published,
            frames_dropped: stats.frames_dropped,
            ..self.stage.summary
        }
    }

    fn run_inline(&mut self) -> Result<()> {
        let mut last_seq = 0;

        while !self.shutdown.is_triggered() {
            let frame = match self.source.capture() {
                Ok(frame) => frame,
                Err(e) => {
                    self.shutdown.trigger();
                    return Err(capture_failure(e));
                }
            };

            self.buffer.publish_frame(frame);
            if let Some(frame) = self.buffer.claim_frame(last_seq, Duration::ZERO) {
                last_seq = frame.seq();
                self.stage.process(&frame);
            }
        }

        Ok(())
    }

    fn run_decoupled(&mut self) -> Result<()> {
        let buffer = Arc::clone(&self.buffer);
        let shutdown = self.shutdown.clone();
        let frame_wait = self.frame_wait;
        let source = &mut self.source;
        let stage = &mut self.stage;

        thread::scope(|scope| {
            let capture = thread::Builder::new()
                .name("vantage-capture".to_string())
                .spawn_scoped(scope, || capture_loop(source, &buffer, &shutdown))?;

            let mut last_seq = 0;
            while !shutdown.is_triggered() {
                if let Some(frame) = buffer.claim_frame(last_seq, frame_wait) {
                    last_seq = frame.seq();
                    stage.process(&frame);
                }
            }

            capture.join().unwrap_or_else(|_| {
                Err(Error::CaptureUnavailable("capture thread panicked".to_string()))
            })
        })
    }
}

/// Publish frames until shutdown or the source fails.
fn capture_loop<S: FrameSource>(source: &mut S, buffer: &FrameBuffer, shutdown: &Shutdown) -> Result<()> {
    while !shutdown.is_triggered() {
        match source.capture() {
            Ok(frame) => {
                buffer.publish_frame(frame);
            }
            Err(e) => {
                shutdown.trigger();
                return Err(capture_failure(e));
            }
        }
    }
    Ok(())
}

/// Any capture error ends the pipeline as `CaptureUnavailable`.
fn capture_failure(err: Error) -> Error {
    if err.is_fatal() {
        err
    } else {
        Error::CaptureUnavailable(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use vantage_core::{BoundingBox, ClassId, Detection, DetectionBatch, SelectorConfig, TargetVector};

    /// Fixed number of blank frames, then capture loss.
    struct CountingSource {
        remaining: u32,
    }

    impl FrameSource for CountingSource {
        fn capture(&mut self) -> Result<Frame> {
            if self.remaining == 0 {
                return Err(Error::CaptureUnavailable("handle lost".to_string()));
            }
            self.remaining -= 1;
            Frame::blank(16, 16)
        }

        fn resolution(&self) -> (u32, u32) {
            (16, 16)
        }
    }

    /// Returns the same detections for every frame.
    struct FixedDetector(Vec<Detection>);

    impl Detector for FixedDetector {
        fn detect(&mut self, frame: &Frame) -> Result<DetectionBatch> {
            Ok(DetectionBatch::new(frame.seq(), self.0.clone()))
        }
    }

    struct FailingDetector;

    impl Detector for FailingDetector {
        fn detect(&mut self, _frame: &Frame) -> Result<DetectionBatch> {
            Err(Error::Detection("inference timeout".to_string()))
        }
    }

    #[derive(Default)]
    struct VecSink(Vec<TargetVector>);

    impl DeliverySink for VecSink {
        fn send(&mut self, vector: &TargetVector) -> io::Result<()> {
            self.0.push(*vector);
            Ok(())
        }
    }

    struct BrokenSink;

    impl DeliverySink for BrokenSink {
        fn send(&mut self, _vector: &TargetVector) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::ConnectionRefused, "peer gone"))
        }
    }

    fn settings(mode: PipelineMode) -> DriverSettings {
        DriverSettings {
            reference: (8, 8),
            mode,
            frame_wait: Duration::from_millis(5),
        }
    }

    fn selector() -> TargetSelector {
        TargetSelector::new(SelectorConfig {
            threshold: 0.5,
            ..SelectorConfig::default()
        })
        .unwrap()
    }

    fn hostile_at(x: f32, y: f32, confidence: f32) -> Detection {
        Detection::new(BoundingBox::new(x, y, 4.0, 4.0), ClassId::Hostile, confidence)
    }

    #[test]
    fn test_inline_sends_one_vector_per_frame() {
        let mut driver = PipelineDriver::new(
            CountingSource { remaining: 3 },
            FixedDetector(vec![hostile_at(0.0, 0.0, 0.9)]),
            VecSink::default(),
            selector(),
            settings(PipelineMode::Inline),
        );

        let err = driver.run().unwrap_err();
        assert!(matches!(err, Error::CaptureUnavailable(_)));

        let summary = driver.summary();
        assert_eq!(summary.frames_captured, 3);
        assert_eq!(summary.frames_dropped, 0);
        assert_eq!(summary.detections_run, 3);
        assert_eq!(summary.targets_sent, 3);
        assert_eq!(driver.stage.sink.0, vec![TargetVector::new(-6, -6); 3]);
        assert!(driver.shutdown_handle().is_triggered());
    }

    #[test]
    fn test_nothing_sent_without_qualifying_target() {
        let mut driver = PipelineDriver::new(
            CountingSource { remaining: 2 },
            FixedDetector(vec![
                hostile_at(0.0, 0.0, 0.4),
                Detection::new(BoundingBox::new(0.0, 0.0, 4.0, 4.0), ClassId::Ally, 0.99),
            ]),
            VecSink::default(),
            selector(),
            settings(PipelineMode::Inline),
        );

        assert!(driver.run().is_err());
        assert!(driver.stage.sink.0.is_empty());
        // the batch was still published for display
        assert_eq!(driver.buffer().stats().results_published, 2);
    }

    #[test]
    fn test_empty_batch_is_not_published() {
        let mut driver = PipelineDriver::new(
            CountingSource { remaining: 2 },
            FixedDetector(Vec::new()),
            VecSink::default(),
            selector(),
            settings(PipelineMode::Inline),
        );

        assert!(driver.run().is_err());
        assert_eq!(driver.summary().detections_run, 2);
        assert_eq!(driver.buffer().stats().results_published, 0);
        assert!(driver.stage.sink.0.is_empty());
    }

    #[test]
    fn test_detector_errors_do_not_stop_pipeline() {
        let mut driver = PipelineDriver::new(
            CountingSource { remaining: 4 },
            FailingDetector,
            VecSink::default(),
            selector(),
            settings(PipelineMode::Inline),
        );

        let err = driver.run().unwrap_err();
        assert!(matches!(err, Error::CaptureUnavailable(_)));
        assert_eq!(driver.summary().detection_errors, 4);
        assert_eq!(driver.summary().frames_captured, 4);
    }

    #[test]
    fn test_delivery_failures_are_swallowed() {
        let mut driver = PipelineDriver::new(
            CountingSource { remaining: 3 },
            FixedDetector(vec![hostile_at(0.0, 0.0, 0.9)]),
            BrokenSink,
            selector(),
            settings(PipelineMode::Inline),
        );

        assert!(driver.run().is_err());
        let summary = driver.summary();
        assert_eq!(summary.delivery_failures, 3);
        assert_eq!(summary.targets_sent, 0);
        assert_eq!(summary.detections_run, 3);
    }

    #[test]
    fn test_shutdown_before_run_is_graceful() {
        let shutdown = Shutdown::new();
        shutdown.trigger();

        let mut driver = PipelineDriver::new(
            CountingSource { remaining: 10 },
            FixedDetector(Vec::new()),
            VecSink::default(),
            selector(),
            settings(PipelineMode::Decoupled),
        )
        .with_shutdown(shutdown);

        let summary = driver.run().unwrap();
        assert_eq!(summary.frames_captured, 0);
    }

    #[test]
    fn test_non_capture_error_is_reported_as_capture_unavailable() {
        let err = capture_failure(Error::Io(io::Error::new(io::ErrorKind::Other, "gdi")));
        assert!(matches!(err, Error::CaptureUnavailable(_)));
        assert!(err.is_fatal());

        let err = capture_failure(Error::Config("bad source".to_string()));
        assert!(matches!(err, Error::CaptureUnavailable(ref msg) if msg.contains("bad source")));

        // already fatal errors pass through untouched
        let err = capture_failure(Error::CaptureUnavailable("handle lost".to_string()));
        assert_eq!(err.to_string(), "capture unavailable: handle lost");
    }
}
