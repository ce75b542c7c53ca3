//! Headless overlay monitor
//!
//! Polls the frame buffer at a fixed refresh rate the way a display would,
//! without rendering anything. Each refresh spends one unit of the result
//! slot's TTL, so detections disappear after `ttl_refreshes` refreshes unless
//! a newer batch arrives. Has no influence on targeting.

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::debug;
use vantage_core::{ClassId, FrameBuffer};

use crate::shutdown::Shutdown;

/// What one refresh would have displayed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OverlaySnapshot {
    /// Sequence number of the frame on screen, if any yet
    pub frame_seq: Option<u64>,
    pub detections: usize,
    pub hostiles: usize,
}

/// Totals over a monitor's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OverlayStats {
    pub refreshes: u64,
    pub refreshes_with_detections: u64,
}

pub struct OverlayMonitor {
    buffer: Arc<FrameBuffer>,
    refresh: Duration,
    shutdown: Shutdown,
}

impl OverlayMonitor {
    pub fn new(buffer: Arc<FrameBuffer>, refresh: Duration, shutdown: Shutdown) -> Self {
        Self {
            buffer,
            refresh,
            shutdown,
        }
    }

    /// One display refresh.
    pub fn refresh(&self) -> OverlaySnapshot {
        let frame_seq = self.buffer.read_frame().map(|f| f.seq());

        match self.buffer.peek_result() {
            Some(batch) => OverlaySnapshot {
                frame_seq,
                detections: batch.len(),
                hostiles: batch.count_of(ClassId::Hostile),
            },
            None => OverlaySnapshot {
                frame_seq,
                ..OverlaySnapshot::default()
            },
        }
    }

    /// Run on a dedicated thread until shutdown.
    pub fn spawn(self) -> io::Result<JoinHandle<OverlayStats>> {
        thread::Builder::new()
            .name("vantage-overlay".to_string())
            .spawn(move || self.run())
    }

    fn run(self) -> OverlayStats {
        let ticker = crossbeam_channel::tick(self.refresh);
        let mut stats = OverlayStats::default();

        while !self.shutdown.is_triggered() {
            if ticker.recv().is_err() {
                break;
            }

            let snapshot = self.refresh();
            stats.refreshes += 1;
            if snapshot.detections > 0 {
                stats.refreshes_with_detections += 1;
                debug!(
                    frame = ?snapshot.frame_seq,
                    detections = snapshot.detections,
                    hostiles = snapshot.hostiles,
                    "overlay refresh"
                );
            }
        }

        stats
    }
}
