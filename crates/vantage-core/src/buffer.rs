//! Latest-value frame buffer
//!
//! Holds exactly the most recent [`Frame`] and the most recent
//! [`DetectionBatch`]. Each slot is a replace-whole-value cell behind its own
//! lock; the locks are only held long enough to swap or clone an `Arc`, so
//! neither the capture side nor the detector side ever waits on the other's
//! work. Cross-slot consistency is not provided: a reader may see a frame
//! that is newer than the batch in the result slot.
//!
//! Overwriting a frame nobody claimed silently drops it. Freshness wins over
//! completeness.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use tracing::trace;

use crate::frame::Frame;
use crate::types::DetectionBatch;

/// Display refreshes a published result stays visible through `peek_result`.
pub const DEFAULT_RESULT_TTL: u32 = 30;

/// Counters snapshot for observability.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferStats {
    pub frames_published: u64,
    /// Frames replaced before any detector claimed them
    pub frames_dropped: u64,
    pub results_published: u64,
}

struct FrameSlot {
    latest: Option<Arc<Frame>>,
    /// Sequence number of the newest frame handed to a detector
    claimed_seq: u64,
    published: u64,
    dropped: u64,
}

struct ResultSlot {
    latest: Option<Arc<DetectionBatch>>,
    /// Remaining `peek_result` calls before auto-clear
    refreshes_left: u32,
    published: u64,
}

/// Shared latest-frame / latest-result cells.
pub struct FrameBuffer {
    frame: Mutex<FrameSlot>,
    frame_ready: Condvar,
    result: Mutex<ResultSlot>,
    result_ttl: u32,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::with_result_ttl(DEFAULT_RESULT_TTL)
    }

    /// Create a buffer whose result slot auto-clears after `ttl` display
    /// refreshes.
    pub fn with_result_ttl(ttl: u32) -> Self {
        Self {
            frame: Mutex::new(FrameSlot {
                latest: None,
                claimed_seq: 0,
                published: 0,
                dropped: 0,
            }),
            frame_ready: Condvar::new(),
            result: Mutex::new(ResultSlot {
                latest: None,
                refreshes_left: 0,
                published: 0,
            }),
            result_ttl: ttl.max(1),
        }
    }

    /// Replace the latest frame, whether or not it was consumed.
    ///
    /// Assigns the frame its sequence number (starting at 1) and wakes any
    /// detector waiting in [`claim_frame`](Self::claim_frame).
    pub fn publish_frame(&self, mut frame: Frame) -> Arc<Frame> {
        let frame = {
            let mut slot = self.frame.lock();
            slot.published += 1;
            frame.set_seq(slot.published);

            let unclaimed = slot
                .latest
                .as_ref()
                .map(|previous| previous.seq() > slot.claimed_seq)
                .unwrap_or(false);
            if unclaimed {
                slot.dropped += 1;
                trace!(seq = slot.published - 1, "frame dropped before detection");
            }

            let frame = Arc::new(frame);
            slot.latest = Some(Arc::clone(&frame));
            frame
        };
        self.frame_ready.notify_all();
        frame
    }

    /// Latest published frame, or `None` before the first publish.
    ///
    /// Non-destructive; does not count as a detector claim.
    pub fn read_frame(&self) -> Option<Arc<Frame>> {
        self.frame.lock().latest.clone()
    }

    /// Sequence number of the latest frame (0 before the first publish).
    pub fn latest_seq(&self) -> u64 {
        self.frame.lock().published
    }

    /// Claim the newest frame with a sequence number greater than `after_seq`.
    ///
    /// Waits up to `timeout` for one to be published. Intermediate frames are
    /// skipped; only the newest is ever returned.
    pub fn claim_frame(&self, after_seq: u64, timeout: Duration) -> Option<Arc<Frame>> {
        let mut slot = self.frame.lock();

        let is_newer = |slot: &FrameSlot| {
            slot.latest
                .as_ref()
                .map(|f| f.seq() > after_seq)
                .unwrap_or(false)
        };

        if !is_newer(&*slot) && !timeout.is_zero() {
            // a single bounded wait; callers loop and re-check their shutdown flag
            let _ = self.frame_ready.wait_for(&mut slot, timeout);
        }

        if !is_newer(&*slot) {
            return None;
        }

        let frame = slot.latest.clone()?;
        slot.claimed_seq = slot.claimed_seq.max(frame.seq());
        Some(frame)
    }

    /// Replace the latest detection batch atomically.
    pub fn publish_result(&self, batch: DetectionBatch) -> Arc<DetectionBatch> {
        let batch = Arc::new(batch);
        let mut slot = self.result.lock();
        slot.latest = Some(Arc::clone(&batch));
        slot.refreshes_left = self.result_ttl;
        slot.published += 1;
        batch
    }

    /// Take the latest batch. Returns `None` until the next publish.
    pub fn consume_result(&self) -> Option<Arc<DetectionBatch>> {
        let mut slot = self.result.lock();
        slot.refreshes_left = 0;
        slot.latest.take()
    }

    /// Read the latest batch for one display refresh.
    ///
    /// Each call spends one refresh of the result's TTL; once spent the slot
    /// is cleared so stale detections never linger.
    pub fn peek_result(&self) -> Option<Arc<DetectionBatch>> {
        let mut slot = self.result.lock();
        if slot.refreshes_left == 0 {
            slot.latest = None;
            return None;
        }
        slot.refreshes_left -= 1;
        slot.latest.clone()
    }

    pub fn result_ttl(&self) -> u32 {
        self.result_ttl
    }

    pub fn stats(&self) -> BufferStats {
        let (frames_published, frames_dropped) = {
            let slot = self.frame.lock();
            (slot.published, slot.dropped)
        };
        let results_published = self.result.lock().published;

        BufferStats {
            frames_published,
            frames_dropped,
            results_published,
        }
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}
