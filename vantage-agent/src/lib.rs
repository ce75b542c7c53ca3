//! Vantage Agent Library
//!
//! Runs the capture → detection → target selection pipeline and delivers
//! target vectors to a UDP peer.

pub mod config;
pub mod driver;
pub mod overlay;
pub mod shutdown;
pub mod sink;

pub use config::{AgentConfig, PipelineMode};
pub use driver::{DriverSettings, PipelineDriver, RunSummary};
pub use overlay::{OverlayMonitor, OverlaySnapshot, OverlayStats};
pub use shutdown::{shutdown_signal, Shutdown};
pub use sink::UdpSink;
