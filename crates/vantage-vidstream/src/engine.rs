//! Video processing engine
//!
//! Detector adapter around an inference backend. Designed for low latency
//! with minimal allocations in the hot path: the input tensor buffer is
//! allocated once and reused for every frame.

use std::time::Instant;

use parking_lot::Mutex;
use thiserror::Error;
use tracing::debug;
use vantage_core::{Detection, DetectionBatch, Detector, Frame};

use crate::backend::InferenceBackend;
use crate::postprocess::{decode_yolov8, non_max_suppression};
use crate::preprocess::{preprocess_frame, InputTransform};
use crate::types::{ProcessingStats, VideoEngineConfig};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("failed to load model: {0}")]
    ModelLoad(String),

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("built without the `onnx` feature, no inference backend available")]
    OnnxDisabled,
}

impl From<EngineError> for vantage_core::Error {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Inference(_) => vantage_core::Error::Detection(err.to_string()),
            _ => vantage_core::Error::Config(err.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

/// Thread-safe video processing engine
pub struct VideoEngine {
    config: VideoEngineConfig,
    labels: Vec<String>,
    /// Score columns in the model output
    num_classes: usize,
    /// Backend plus reusable buffers
    state: Mutex<EngineState>,
}

struct EngineState {
    backend: Box<dyn InferenceBackend>,
    /// Preprocessed frame buffer (resized to model input)
    input_buffer: Vec<f32>,
    /// Frame counter for tracking
    frame_count: u64,
}

impl VideoEngine {
    /// Create a video engine backed by ONNX Runtime.
    ///
    /// Loading happens once, here; the per-frame path never touches the
    /// model file again.
    pub fn new(config: VideoEngineConfig) -> Result<Self> {
        validate(&config)?;
        if config.model_path.trim().is_empty() {
            return Err(EngineError::InvalidConfig(
                "model_path is required (set detector.model_path or pass --model)".to_string(),
            ));
        }

        #[cfg(feature = "onnx")]
        {
            let backend = crate::backend::OnnxBackend::load(&config)?;
            Self::with_backend(config, Box::new(backend))
        }

        #[cfg(not(feature = "onnx"))]
        {
            Err(EngineError::OnnxDisabled)
        }
    }

    /// Create a video engine around an already-initialised backend.
    pub fn with_backend(config: VideoEngineConfig, backend: Box<dyn InferenceBackend>) -> Result<Self> {
        validate(&config)?;

        // Parse labels if provided
        let labels = match config.labels {
            Some(ref labels_str) => parse_labels(labels_str),
            None => default_labels(),
        };

        // the output carries a score for every label and every mapped class
        let max_mapped = config.class_map.keys().max().map_or(0, |k| *k as usize + 1);
        let num_classes = labels.len().max(max_mapped);

        // Pre-allocate buffers for the expected input size
        let input_size = (config.input_width * config.input_height * 3) as usize;

        Ok(Self {
            config,
            labels,
            num_classes,
            state: Mutex::new(EngineState {
                backend,
                input_buffer: vec![0.0f32; input_size],
                frame_count: 0,
            }),
        })
    }

    /// Process a single frame and return detections in frame coordinates.
    ///
    /// This is the hot path. An empty batch means nothing was found.
    pub fn process_frame(&self, frame: &Frame) -> Result<(DetectionBatch, ProcessingStats)> {
        let total_start = Instant::now();
        let mut stats = ProcessingStats {
            frame_width: frame.width(),
            frame_height: frame.height(),
            ..Default::default()
        };

        let input = self.input_dimensions();
        let transform = if self.config.letterbox {
            InputTransform::letterbox(frame.dimensions(), input)
        } else {
            InputTransform::stretch(frame.dimensions(), input)
        };

        // === PREPROCESSING ===
        let preprocess_start = Instant::now();

        let mut state = self.state.lock();
        state.frame_count += 1;
        preprocess_frame(frame, &transform, input, &mut state.input_buffer);

        stats.preprocess_us = preprocess_start.elapsed().as_micros() as u64;

        // === INFERENCE ===
        let inference_start = Instant::now();

        let shape = [1, 3, input.1 as usize, input.0 as usize];
        let EngineState {
            backend,
            input_buffer,
            ..
        } = &mut *state;
        let output = backend.infer(input_buffer, shape)?;
        drop(state);

        stats.inference_us = inference_start.elapsed().as_micros() as u64;

        // === POST-PROCESSING ===
        let postprocess_start = Instant::now();

        let raw = decode_yolov8(
            &output.data,
            &output.shape,
            self.num_classes,
            self.config.confidence_threshold,
        )
        .map_err(EngineError::Inference)?;
        stats.detections_raw = raw.len() as u32;

        let detections: Vec<Detection> = non_max_suppression(&raw, self.config.nms_threshold)
            .into_iter()
            .filter_map(|det| {
                debug!("detected {}", self.describe(det.class_index, det.confidence));
                // closed class set: unmapped model classes never leave the engine
                let class_id = self.config.class_map.get(&det.class_index).copied()?;
                Some(Detection::new(
                    transform.to_frame(&det.bbox),
                    class_id,
                    det.confidence,
                ))
            })
            .collect();

        stats.postprocess_us = postprocess_start.elapsed().as_micros() as u64;
        stats.detections_final = detections.len() as u32;
        stats.total_us = total_start.elapsed().as_micros() as u64;

        Ok((DetectionBatch::new(frame.seq(), detections), stats))
    }

    /// Get the model input dimensions
    pub fn input_dimensions(&self) -> (u32, u32) {
        (self.config.input_width, self.config.input_height)
    }

    /// Get label for a class index
    pub fn get_label(&self, class_index: u32) -> Option<&str> {
        self.labels.get(class_index as usize).map(|s| s.as_str())
    }

    /// Number of class score columns expected in the model output
    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    /// Label and score of one model detection, e.g. `"Enemy 0.87"`.
    pub fn describe(&self, class_index: u32, confidence: f32) -> String {
        match self.get_label(class_index) {
            Some(label) => format!("{} {:.2}", label, confidence),
            None => format!("class {} {:.2}", class_index, confidence),
        }
    }

    /// Frames processed so far
    pub fn frame_count(&self) -> u64 {
        self.state.lock().frame_count
    }

    pub fn config(&self) -> &VideoEngineConfig {
        &self.config
    }
}

impl Detector for VideoEngine {
    fn detect(&mut self, frame: &Frame) -> vantage_core::Result<DetectionBatch> {
        let (batch, stats) = self.process_frame(frame)?;
        debug!(
            frame = frame.seq(),
            detections = stats.detections_final,
            raw = stats.detections_raw,
            preprocess_us = stats.preprocess_us,
            inference_us = stats.inference_us,
            postprocess_us = stats.postprocess_us,
            total_us = stats.total_us,
            "frame processed"
        );
        Ok(batch)
    }
}

fn validate(config: &VideoEngineConfig) -> Result<()> {
    if !(0.0..=1.0).contains(&config.confidence_threshold) {
        return Err(EngineError::InvalidConfig(
            "confidence_threshold must be between 0.0 and 1.0".to_string(),
        ));
    }
    if !(0.0..=1.0).contains(&config.nms_threshold) {
        return Err(EngineError::InvalidConfig(
            "nms_threshold must be between 0.0 and 1.0".to_string(),
        ));
    }
    if config.input_width == 0 || config.input_height == 0 {
        return Err(EngineError::InvalidConfig(format!(
            "model input size must be non-zero, got {}x{}",
            config.input_width, config.input_height
        )));
    }
    if config.class_map.is_empty() {
        return Err(EngineError::InvalidConfig(
            "class_map must map at least one model class".to_string(),
        ));
    }
    Ok(())
}

/// Parse labels from string (newline-separated or JSON array)
fn parse_labels(labels_str: &str) -> Vec<String> {
    let trimmed = labels_str.trim();

    // Try JSON array first
    if trimmed.starts_with('[') {
        if let Ok(labels) = serde_json::from_str::<Vec<String>>(trimmed) {
            return labels;
        }
    }

    // Fall back to newline-separated
    trimmed.lines().map(|s| s.trim().to_string()).collect()
}

/// Labels of the stock two-class model
fn default_labels() -> Vec<String> {
    vec!["Teammate".to_string(), "Enemy".to_string()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ModelOutput;
    use vantage_core::{BoundingBox, ClassId};

    /// Backend returning a fixed output tensor
    struct FixedBackend(ModelOutput);

    impl InferenceBackend for FixedBackend {
        fn infer(&mut self, input: &[f32], shape: [usize; 4]) -> Result<ModelOutput> {
            assert_eq!(input.len(), shape.iter().product::<usize>());
            Ok(self.0.clone())
        }
    }

    struct FailingBackend;

    impl InferenceBackend for FailingBackend {
        fn infer(&mut self, _input: &[f32], _shape: [usize; 4]) -> Result<ModelOutput> {
            Err(EngineError::Inference("device lost".to_string()))
        }
    }

    /// One anchor per (cx, cy, w, h, score0, score1, score2) row, channels-first.
    fn output(anchors: &[[f32; 7]]) -> ModelOutput {
        let n = anchors.len();
        let mut data = vec![0.0; 7 * n];
        for (i, anchor) in anchors.iter().enumerate() {
            for (c, v) in anchor.iter().enumerate() {
                data[c * n + i] = *v;
            }
        }
        ModelOutput {
            shape: vec![1, 7, n],
            data,
        }
    }

    /// Three-class model; class 2 has no ClassId mapping.
    fn small_config() -> VideoEngineConfig {
        VideoEngineConfig {
            input_width: 64,
            input_height: 64,
            labels: Some(r#"["Teammate", "Enemy", "Spectator"]"#.to_string()),
            ..VideoEngineConfig::default()
        }
    }

    #[test]
    fn test_invalid_threshold() {
        let config = VideoEngineConfig {
            confidence_threshold: 1.5,
            ..VideoEngineConfig::default()
        };
        let result = VideoEngine::with_backend(config, Box::new(FailingBackend));
        assert!(matches!(result, Err(EngineError::InvalidConfig(_))));
    }

    #[test]
    fn test_zero_input_size() {
        let config = VideoEngineConfig {
            input_width: 0,
            ..VideoEngineConfig::default()
        };
        assert!(VideoEngine::with_backend(config, Box::new(FailingBackend)).is_err());
    }

    #[test]
    fn test_new_requires_model_path() {
        let result = VideoEngine::new(VideoEngineConfig::default());
        match result {
            Err(EngineError::InvalidConfig(msg)) => assert!(msg.contains("model_path")),
            _ => panic!("expected InvalidConfig for a missing model path"),
        }
    }

    #[cfg(not(feature = "onnx"))]
    #[test]
    fn test_new_without_onnx() {
        let config = VideoEngineConfig {
            model_path: "model.onnx".to_string(),
            ..VideoEngineConfig::default()
        };
        assert!(matches!(VideoEngine::new(config), Err(EngineError::OnnxDisabled)));
    }

    #[cfg(feature = "onnx")]
    #[test]
    fn test_new_with_missing_model_file() {
        let config = VideoEngineConfig {
            model_path: "/nonexistent/vantage/model.onnx".to_string(),
            ..VideoEngineConfig::default()
        };
        assert!(matches!(VideoEngine::new(config), Err(EngineError::ModelLoad(_))));
    }

    #[test]
    fn test_class_count_follows_labels_and_class_map() {
        let engine = VideoEngine::with_backend(small_config(), Box::new(FailingBackend)).unwrap();
        assert_eq!(engine.num_classes(), 3);

        let mut class_map = crate::types::default_class_map();
        class_map.insert(4, ClassId::Hostile);
        let config = VideoEngineConfig {
            class_map,
            ..VideoEngineConfig::default()
        };
        let engine = VideoEngine::with_backend(config, Box::new(FailingBackend)).unwrap();
        assert_eq!(engine.num_classes(), 5);
    }

    #[test]
    fn test_single_anchor_output_decodes() {
        // [1, 7, 1]: fewer anchors than channels
        let backend = FixedBackend(output(&[[20.0, 20.0, 10.0, 10.0, 0.1, 0.9, 0.0]]));
        let engine = VideoEngine::with_backend(small_config(), Box::new(backend)).unwrap();

        let (batch, _) = engine.process_frame(&Frame::blank(64, 64).unwrap()).unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch.detections[0].class_id, ClassId::Hostile);
        assert_eq!(batch.detections[0].bbox, BoundingBox::new(15.0, 15.0, 10.0, 10.0));
    }

    #[test]
    fn test_describe_uses_labels() {
        let engine = VideoEngine::with_backend(small_config(), Box::new(FailingBackend)).unwrap();
        assert_eq!(engine.describe(1, 0.873), "Enemy 0.87");
        assert_eq!(engine.describe(2, 0.5), "Spectator 0.50");
        assert_eq!(engine.describe(9, 0.5), "class 9 0.50");
    }

    #[test]
    fn test_process_frame_maps_back_to_frame() {
        // 128x128 frame -> 64x64 input: scale 0.5, no padding
        let backend = FixedBackend(output(&[
            [20.0, 20.0, 10.0, 10.0, 0.1, 0.9, 0.0],
            [40.0, 40.0, 8.0, 8.0, 0.8, 0.1, 0.0],
        ]));
        let engine = VideoEngine::with_backend(small_config(), Box::new(backend)).unwrap();

        let frame = Frame::blank(128, 128).unwrap();
        let (batch, stats) = engine.process_frame(&frame).unwrap();

        assert_eq!(batch.len(), 2);
        assert_eq!(stats.detections_raw, 2);
        assert_eq!(stats.detections_final, 2);
        assert_eq!(engine.frame_count(), 1);

        let hostile = batch.iter().find(|d| d.class_id == ClassId::Hostile).unwrap();
        assert_eq!(hostile.bbox, BoundingBox::new(30.0, 30.0, 20.0, 20.0));
        assert_eq!(hostile.confidence, 0.9);

        let ally = batch.iter().find(|d| d.class_id == ClassId::Ally).unwrap();
        assert_eq!(ally.bbox, BoundingBox::new(72.0, 72.0, 16.0, 16.0));
    }

    #[test]
    fn test_unmapped_class_is_dropped() {
        let backend = FixedBackend(output(&[[20.0, 20.0, 10.0, 10.0, 0.0, 0.0, 0.95]]));
        let engine = VideoEngine::with_backend(small_config(), Box::new(backend)).unwrap();

        let (batch, stats) = engine.process_frame(&Frame::blank(64, 64).unwrap()).unwrap();
        assert!(batch.is_empty());
        assert_eq!(stats.detections_raw, 1);
        assert_eq!(stats.detections_final, 0);
    }

    #[test]
    fn test_nothing_found_is_empty_batch() {
        let backend = FixedBackend(output(&[[20.0, 20.0, 10.0, 10.0, 0.01, 0.02, 0.0]]));
        let mut engine = VideoEngine::with_backend(small_config(), Box::new(backend)).unwrap();

        let batch = engine.detect(&Frame::blank(64, 64).unwrap()).unwrap();
        assert!(batch.is_empty());
    }

    #[test]
    fn test_backend_failure_is_detection_error() {
        let mut engine = VideoEngine::with_backend(small_config(), Box::new(FailingBackend)).unwrap();
        let err = engine.detect(&Frame::blank(64, 64).unwrap()).unwrap_err();
        assert!(matches!(err, vantage_core::Error::Detection(_)));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_label_parsing() {
        let newline = "person\ncar\nbike";
        let labels = parse_labels(newline);
        assert_eq!(labels, vec!["person", "car", "bike"]);

        let json = r#"["Teammate", "Enemy"]"#;
        let labels = parse_labels(json);
        assert_eq!(labels, vec!["Teammate", "Enemy"]);
    }

    #[test]
    fn test_default_labels() {
        let engine =
            VideoEngine::with_backend(VideoEngineConfig::default(), Box::new(FailingBackend)).unwrap();
        assert_eq!(engine.get_label(0), Some("Teammate"));
        assert_eq!(engine.get_label(1), Some("Enemy"));
        assert_eq!(engine.get_label(2), None);
    }
}
