//! Target selection
//!
//! Picks at most one detection per cycle and turns it into a
//! [`TargetVector`] relative to a reference point (normally screen centre).
//!
//! Candidates are the detections of the configured class whose confidence is
//! strictly above the threshold. Among them the winner is the minimum under
//! a total order:
//!
//! 1. `center_x - ref_x`, ascending and signed (left of centre sorts first)
//! 2. `center_y - ref_y`, ascending and signed
//! 3. confidence, direction given by [`TieBreak`]
//!
//! This is nearest by horizontal offset, not by Euclidean distance. Exact
//! ties on all three keys resolve to the earliest detection in the batch.
//! Each call is stateless.

use std::cmp::Ordering;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::types::{BoundingBox, ClassId, Detection, DetectionBatch, TargetVector};

/// Final tie-break among candidates with identical offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// Prefer the less confident candidate (reference ordering)
    #[default]
    LowerConfidence,
    /// Prefer the more confident candidate
    HigherConfidence,
}

impl TieBreak {
    fn compare(self, a: f32, b: f32) -> Ordering {
        match self {
            TieBreak::LowerConfidence => a.total_cmp(&b),
            TieBreak::HigherConfidence => b.total_cmp(&a),
        }
    }
}

/// Selector tuning, fixed for the lifetime of a pipeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelectorConfig {
    pub target_class: ClassId,
    /// Candidates need confidence strictly greater than this
    pub threshold: f32,
    pub tie_break: TieBreak,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            target_class: ClassId::Hostile,
            threshold: 0.65,
            tie_break: TieBreak::LowerConfidence,
        }
    }
}

/// The chosen target for one cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Selection {
    pub vector: TargetVector,
    /// Box centre in frame pixel coordinates
    pub center: (i32, i32),
    pub confidence: f32,
    pub bbox: BoundingBox,
}

/// A candidate with its precomputed sort keys.
struct Candidate<'a> {
    detection: &'a Detection,
    center: (i32, i32),
    offset: (i32, i32),
}

#[derive(Debug, Clone)]
pub struct TargetSelector {
    config: SelectorConfig,
}

impl TargetSelector {
    pub fn new(config: SelectorConfig) -> Result<Self> {
        if !(0.0..=1.0).contains(&config.threshold) {
            return Err(Error::Config(format!(
                "selection threshold must be between 0.0 and 1.0, got {}",
                config.threshold
            )));
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &SelectorConfig {
        &self.config
    }

    /// Whether a detection may be selected at all.
    pub fn qualifies(&self, detection: &Detection) -> bool {
        detection.class_id == self.config.target_class
            && detection.confidence > self.config.threshold
    }

    /// Select at most one target from `detections`.
    ///
    /// Returns `None` when nothing qualifies; callers must not send anything
    /// in that case.
    pub fn select(&self, detections: &[Detection], reference: (i32, i32)) -> Option<Selection> {
        let (ref_x, ref_y) = reference;

        let best = detections
            .iter()
            .filter(|d| self.qualifies(d))
            .map(|detection| {
                let center = detection.bbox.center();
                Candidate {
                    detection,
                    center,
                    offset: (center.0 - ref_x, center.1 - ref_y),
                }
            })
            .min_by(|a, b| self.order(a, b))?;

        Some(Selection {
            vector: TargetVector::new(best.offset.0, best.offset.1),
            center: best.center,
            confidence: best.detection.confidence,
            bbox: best.detection.bbox,
        })
    }

    /// Convenience wrapper over [`select`](Self::select) for a whole batch.
    pub fn select_batch(&self, batch: &DetectionBatch, reference: (i32, i32)) -> Option<Selection> {
        self.select(&batch.detections, reference)
    }

    fn order(&self, a: &Candidate<'_>, b: &Candidate<'_>) -> Ordering {
        a.offset
            .0
            .cmp(&b.offset.0)
            .then(a.offset.1.cmp(&b.offset.1))
            .then_with(|| {
                self.config
                    .tie_break
                    .compare(a.detection.confidence, b.detection.confidence)
            })
    }
}
