//! Inference backends
//!
//! The engine hands a preprocessed `[1, 3, H, W]` tensor to a backend and
//! gets back the raw output tensor. ONNX Runtime is the production backend
//! (feature `onnx`); anything else implementing [`InferenceBackend`] can be
//! plugged in through [`VideoEngine::with_backend`](crate::VideoEngine::with_backend).

use crate::engine::EngineError;

/// Raw output tensor: shape plus row-major values.
#[derive(Debug, Clone, Default)]
pub struct ModelOutput {
    pub shape: Vec<usize>,
    pub data: Vec<f32>,
}

/// Runs the model on one input tensor.
pub trait InferenceBackend: Send {
    /// `input` is `shape[0] * shape[1] * shape[2] * shape[3]` floats in NCHW order.
    fn infer(&mut self, input: &[f32], shape: [usize; 4]) -> Result<ModelOutput, EngineError>;
}

#[cfg(feature = "onnx")]
pub use onnx::OnnxBackend;

#[cfg(feature = "onnx")]
mod onnx {
    use std::path::Path;

    use ort::session::builder::GraphOptimizationLevel;
    use ort::session::Session;
    use ort::value::Tensor;
    use tracing::info;

    use super::{InferenceBackend, ModelOutput};
    use crate::engine::EngineError;
    use crate::types::VideoEngineConfig;

    /// ONNX Runtime session wrapper.
    pub struct OnnxBackend {
        session: Session,
    }

    impl OnnxBackend {
        /// Load the model named by `config.model_path`.
        pub fn load(config: &VideoEngineConfig) -> Result<Self, EngineError> {
            if !Path::new(&config.model_path).exists() {
                return Err(EngineError::ModelLoad(format!(
                    "model file not found: {}",
                    config.model_path
                )));
            }

            info!("Loading detector model from {}", config.model_path);

            let mut builder = Session::builder()
                .map_err(|e| EngineError::ModelLoad(e.to_string()))?
                .with_optimization_level(GraphOptimizationLevel::Level3)
                .map_err(|e| EngineError::ModelLoad(e.to_string()))?;

            if config.num_threads > 0 {
                builder = builder
                    .with_intra_threads(config.num_threads as usize)
                    .map_err(|e| EngineError::ModelLoad(e.to_string()))?;
            }

            let session = builder
                .commit_from_file(&config.model_path)
                .map_err(|e| EngineError::ModelLoad(e.to_string()))?;

            info!("Detector model loaded");
            Ok(Self { session })
        }
    }

    impl InferenceBackend for OnnxBackend {
        fn infer(&mut self, input: &[f32], shape: [usize; 4]) -> Result<ModelOutput, EngineError> {
            let tensor = Tensor::from_array((shape, input.to_vec()))
                .map_err(|e| EngineError::Inference(e.to_string()))?;

            let outputs = self
                .session
                .run(ort::inputs![tensor])
                .map_err(|e| EngineError::Inference(e.to_string()))?;

            let (out_shape, data) = outputs[0]
                .try_extract_tensor::<f32>()
                .map_err(|e| EngineError::Inference(e.to_string()))?;

            Ok(ModelOutput {
                shape: out_shape.iter().map(|&d| d.max(0) as usize).collect(),
                data: data.to_vec(),
            })
        }
    }
}
