//! Agent configuration
//!
//! Loaded from a JSON file (every field optional) and then overridden from
//! the command line. Everything here is fixed for the lifetime of a run.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use vantage_core::{ClassId, Error, Result, SelectorConfig, TieBreak, DEFAULT_RESULT_TTL};
use vantage_vidstream::VideoEngineConfig;

/// Source name that selects generated frames instead of files
pub const SYNTHETIC_SOURCE: &str = "synthetic";

/// How capture and detection are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum PipelineMode {
    /// Capture, then detect on the same thread; detection throttles capture
    #[default]
    Inline,
    /// Capture and detection on separate threads sharing only the frame buffer
    Decoupled,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub capture: CaptureConfig,
    pub detector: VideoEngineConfig,
    pub targeting: TargetingConfig,
    pub sink: SinkConfig,
    pub pipeline: PipelineConfig,
    pub overlay: OverlayConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub width: u32,
    pub height: u32,
    /// `synthetic`, an image file, or a directory of images
    pub source: String,
    /// End the run after this many frames
    pub max_frames: Option<u64>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            source: SYNTHETIC_SOURCE.to_string(),
            max_frames: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TargetingConfig {
    pub target_class: ClassId,
    /// Candidates need confidence strictly above this
    pub threshold: f32,
    pub tie_break: TieBreak,
    /// Reference point; defaults to the capture centre
    pub reference: Option<(i32, i32)>,
}

impl Default for TargetingConfig {
    fn default() -> Self {
        Self {
            target_class: ClassId::Hostile,
            threshold: 0.65,
            tie_break: TieBreak::LowerConfidence,
            reference: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    /// Peer that receives target vectors
    pub peer: String,
    /// Local address to send from
    pub bind: String,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            peer: "127.0.0.1:7483".to_string(),
            bind: "0.0.0.0:0".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub mode: PipelineMode,
    /// How long the decoupled detector waits for a new frame before
    /// re-checking for shutdown
    pub frame_wait_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            mode: PipelineMode::Inline,
            frame_wait_ms: 50,
        }
    }
}

impl PipelineConfig {
    pub fn frame_wait(&self) -> Duration {
        Duration::from_millis(self.frame_wait_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    pub enabled: bool,
    pub refresh_hz: u32,
    /// Display refreshes a detection batch stays visible
    pub ttl_refreshes: u32,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            refresh_hz: 60,
            ttl_refreshes: DEFAULT_RESULT_TTL,
        }
    }
}

impl OverlayConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.refresh_hz.max(1) as f64)
    }
}

impl AgentConfig {
    /// Read a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read {}: {}", path.display(), e)))?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::Config(format!("invalid config: {}", e)))
    }

    pub fn validate(&self) -> Result<()> {
        let capture = &self.capture;
        if capture.width == 0 || capture.height == 0 {
            return Err(Error::Config(format!(
                "capture resolution must be non-zero, got {}x{}",
                capture.width, capture.height
            )));
        }
        if capture.source.trim().is_empty() {
            return Err(Error::Config("capture source must not be empty".to_string()));
        }

        if !(0.0..=1.0).contains(&self.targeting.threshold) {
            return Err(Error::Config(format!(
                "targeting threshold must be between 0.0 and 1.0, got {}",
                self.targeting.threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.detector.confidence_threshold)
            || !(0.0..=1.0).contains(&self.detector.nms_threshold)
        {
            return Err(Error::Config(
                "detector thresholds must be between 0.0 and 1.0".to_string(),
            ));
        }

        if let Some((x, y)) = self.targeting.reference {
            if x < 0 || y < 0 || x >= capture.width as i32 || y >= capture.height as i32 {
                return Err(Error::Config(format!(
                    "reference point ({}, {}) lies outside the {}x{} capture",
                    x, y, capture.width, capture.height
                )));
            }
        }

        if self.sink.peer.trim().is_empty() {
            return Err(Error::Config("sink peer must not be empty".to_string()));
        }

        if self.overlay.refresh_hz == 0 || self.overlay.ttl_refreshes == 0 {
            return Err(Error::Config(
                "overlay refresh_hz and ttl_refreshes must be non-zero".to_string(),
            ));
        }

        Ok(())
    }

    /// Targeting origin: configured, or the centre of the capture.
    pub fn reference_point(&self) -> (i32, i32) {
        self.targeting.reference.unwrap_or((
            (self.capture.width / 2) as i32,
            (self.capture.height / 2) as i32,
        ))
    }

    pub fn selector_config(&self) -> SelectorConfig {
        SelectorConfig {
            target_class: self.targeting.target_class,
            threshold: self.targeting.threshold,
            tie_break: self.targeting.tie_break,
        }
    }

    pub fn is_synthetic_source(&self) -> bool {
        self.capture.source == SYNTHETIC_SOURCE
    }
}
