//! Engine configuration and statistics types

use std::collections::HashMap;

use serde::Deserialize;
use vantage_core::{BoundingBox, ClassId};

/// A model output before class mapping and rescaling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawDetection {
    /// Class index as emitted by the model
    pub class_index: u32,
    /// Confidence score 0.0-1.0
    pub confidence: f32,
    /// Bounding box in model input coordinates
    pub bbox: BoundingBox,
}

impl RawDetection {
    pub fn new(class_index: u32, confidence: f32, bbox: BoundingBox) -> Self {
        Self {
            class_index,
            confidence,
            bbox,
        }
    }
}

/// Processing statistics for performance monitoring
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessingStats {
    /// Frame preprocessing time (microseconds)
    pub preprocess_us: u64,
    /// Model inference time (microseconds)
    pub inference_us: u64,
    /// Post-processing/NMS time (microseconds)
    pub postprocess_us: u64,
    /// Total processing time (microseconds)
    pub total_us: u64,
    /// Frame width processed
    pub frame_width: u32,
    /// Frame height processed
    pub frame_height: u32,
    /// Number of detections above the confidence floor, before NMS
    pub detections_raw: u32,
    /// Number of detections after NMS and class mapping
    pub detections_final: u32,
}

/// Configuration for video engine initialization
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VideoEngineConfig {
    /// Path to ONNX model file
    pub model_path: String,
    /// Confidence floor for raw detections (0.0-1.0)
    pub confidence_threshold: f32,
    /// IoU threshold for NMS (0.0-1.0)
    pub nms_threshold: f32,
    /// Model input width
    pub input_width: u32,
    /// Model input height
    pub input_height: u32,
    /// Preserve aspect ratio with padding instead of stretching
    pub letterbox: bool,
    /// Number of inference threads (0 for auto)
    pub num_threads: u32,
    /// Class labels (newline-separated or JSON array)
    pub labels: Option<String>,
    /// Model class index to pipeline class; unlisted indices are dropped
    pub class_map: HashMap<u32, ClassId>,
}

impl Default for VideoEngineConfig {
    fn default() -> Self {
        Self {
            model_path: String::new(),
            confidence_threshold: 0.25,
            nms_threshold: 0.45,
            input_width: 640,
            input_height: 640,
            letterbox: true,
            num_threads: 0, // auto
            labels: None,
            class_map: default_class_map(),
        }
    }
}

/// Index 0 is the ally class, index 1 the hostile class.
pub fn default_class_map() -> HashMap<u32, ClassId> {
    ClassId::ALL.iter().map(|c| (c.index(), *c)).collect()
}
