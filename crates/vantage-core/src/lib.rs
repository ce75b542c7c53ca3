//! # Vantage Core
//!
//! Shared data model and algorithms for the Vantage acquisition pipeline:
//! - **frame**: immutable captured images
//! - **types**: detections, class ids and the target vector
//! - **buffer**: latest-frame / latest-result slots shared across threads
//! - **select**: deterministic single-target selection
//! - **interfaces**: the capture, detector and delivery seams
//! - **error**: pipeline error taxonomy
//! - **tracing**: logging setup with Vantage segment prefixes
//!
//! ## Data flow
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌──────────┐   ┌─────────────┐   ┌──────┐
//! │ FrameSource │──▶│ FrameBuffer │──▶│ Detector │──▶│ Selector    │──▶│ Sink │
//! │ (capture)   │   │ (latest)    │   │ (engine) │   │ (one target)│   │ (UDP)│
//! └─────────────┘   └─────────────┘   └──────────┘   └─────────────┘   └──────┘
//! ```

pub mod buffer;
pub mod error;
pub mod frame;
pub mod interfaces;
pub mod select;
pub mod tracing;
pub mod types;

pub use buffer::{BufferStats, FrameBuffer, DEFAULT_RESULT_TTL};
pub use error::{Error, Result};
pub use frame::{Frame, FrameFormat};
pub use interfaces::{DeliverySink, Detector, FrameSource};
pub use select::{Selection, SelectorConfig, TargetSelector, TieBreak};
pub use types::{BoundingBox, ClassId, Detection, DetectionBatch, TargetVector};
