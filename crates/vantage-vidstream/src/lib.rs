//! Vantage Video Processing Library
//!
//! Frame acquisition and object detection for the Vantage pipeline.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌────────────────┐
//! │ FrameSource │────▶│ VideoEngine  │────▶│ DetectionBatch │
//! │ (BGR frame) │     │ (Rust/ONNX)  │     │ (frame coords) │
//! └─────────────┘     └──────────────┘     └────────────────┘
//! ```
//!
//! The engine letterboxes the frame into the model input, runs the backend,
//! decodes YOLOv8 output, applies per-class NMS, maps model classes onto the
//! closed [`ClassId`](vantage_core::ClassId) set and rescales boxes back to
//! frame pixels.
//!
//! ONNX Runtime support is behind the `onnx` feature, on by default. Without it,
//! [`VideoEngine::new`] reports [`EngineError::OnnxDisabled`] and a custom
//! [`InferenceBackend`] can be supplied through [`VideoEngine::with_backend`].

pub mod backend;
pub mod engine;
pub mod postprocess;
pub mod preprocess;
pub mod source;
pub mod types;

// Re-export main types
pub use backend::{InferenceBackend, ModelOutput};
pub use engine::{EngineError, VideoEngine};
pub use source::{ImageSequenceSource, Limited, SyntheticSource};
pub use types::{ProcessingStats, RawDetection, VideoEngineConfig};

#[cfg(feature = "onnx")]
pub use backend::OnnxBackend;
