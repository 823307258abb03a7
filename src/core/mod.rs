//! Core module - orchestrates camera, detector and event delivery

mod event_bus;
mod monitor;
mod scheduler;

pub use event_bus::{
    CameraFaultEvent, DetectorFaultEvent, Event, EventBus, EventPayload, EventSink, EventType,
    ViolationEvent,
};
pub use monitor::ProctoringMonitor;
pub use scheduler::TickScheduler;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Monitor lifecycle: `Idle -> Running -> Stopped`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MonitorLifecycle {
    Idle,
    Running,
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MonitorError {
    #[error("cannot start monitor from {from:?}")]
    InvalidTransition { from: MonitorLifecycle },
}

/// Monitor counters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonitorStats {
    pub started_at: Option<DateTime<Utc>>,
    /// Ticks that fired while sampling
    pub ticks: u64,
    pub skipped_busy: u64,
    pub skipped_unready: u64,
    pub skipped_no_frame: u64,
    pub inferences: u64,
    pub inference_failures: u64,
    pub violations: u64,
    /// Results that completed after sampling ended
    pub discarded_results: u64,
    pub last_inference_ms: Option<u64>,
    pub last_error: Option<String>,
}
