// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! ExamWatch - visual proctoring monitor
//!
//! Samples a live camera on a fixed tick, runs each sampled frame through an
//! object-detection model, and reports integrity violations (a watched object
//! in frame) and camera or detector faults to an exam-session controller.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                  Proctoring Monitor                      │
//! │        tick scheduler · overlap guard · watchlist        │
//! ├──────────────────────────────────────────────────────────┤
//! │  ┌───────────────┐                 ┌──────────────────┐  │
//! │  │ CameraSession │ ── frames ──→   │ DetectionEngine  │  │
//! │  │ (stream owner)│                 │ (model owner)    │  │
//! │  └───────────────┘                 └──────────────────┘  │
//! │         │ on_disabled                       │ load result│
//! │         ↓                                   ↓            │
//! │  ┌────────────────────────────────────────────────────┐  │
//! │  │            Event Sink (e.g. EventBus)              │  │
//! │  └────────────────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────────────────┘
//! ```

pub mod camera;
pub mod config;
pub mod core;
pub mod detection;

// Re-exports for convenience
pub use camera::{CameraDevice, CameraSession, CameraState, Frame, SimulatedCamera, VideoTrack};
pub use config::{Config, MonitorConfig};
pub use self::core::{EventBus, EventSink, MonitorLifecycle, ProctoringMonitor};
pub use detection::{Detection, DetectionEngine, DetectorState, ScriptedModel, WatchlistEntry};

/// ExamWatch version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// ExamWatch name
pub const NAME: &str = "ExamWatch";

/// Build info
pub fn build_info() -> BuildInfo {
    BuildInfo {
        version: VERSION.to_string(),
        target: std::env::consts::ARCH.to_string(),
        os: std::env::consts::OS.to_string(),
    }
}

/// Build information
#[derive(Debug, Clone)]
pub struct BuildInfo {
    /// Version string
    pub version: String,
    /// Target architecture
    pub target: String,
    /// Operating system
    pub os: String,
}
