// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Detection module - model lifecycle, single-frame inference and watchlist classification

mod engine;
mod model;
mod simulator;
mod watchlist;

pub use engine::DetectionEngine;
pub use model::{ModelLoader, ObjectDetector};
pub use simulator::{ScriptedModel, ScriptedModelConfig};
pub use watchlist::{LabelMatcher, Watchlist, WatchlistEntry, WatchlistMatch};

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Model readiness
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DetectorState {
    Loading,
    Ready,
    /// Load failed; the engine never becomes usable
    Failed,
}

/// Axis-aligned box in frame pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// One object found in a frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub label: String,
    /// 0-1
    pub confidence: f32,
    pub bounding_box: Option<BoundingBox>,
}

impl Detection {
    pub fn new(label: &str, confidence: f32) -> Self {
        Self {
            label: label.to_string(),
            confidence: confidence.clamp(0.0, 1.0),
            bounding_box: None,
        }
    }

    pub fn with_box(mut self, x: f32, y: f32, width: f32, height: f32) -> Self {
        self.bounding_box = Some(BoundingBox { x, y, width, height });
        self
    }
}

/// Model load failure. Terminal for the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
pub enum ModelError {
    #[error("model load failed: {0}")]
    LoadFailed(String),
}

/// Per-call inference failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InferenceError {
    #[error("detector not ready")]
    NotReady,

    #[error("inference failed: {0}")]
    InferenceFailed(String),

    #[error("detector busy with another frame")]
    Busy,

    #[error("inference timed out after {0:?}")]
    TimedOut(Duration),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_is_clamped() {
        assert_eq!(Detection::new("phone", 1.4).confidence, 1.0);
        assert_eq!(Detection::new("phone", -0.2).confidence, 0.0);
    }

    #[test]
    fn test_with_box() {
        let detection = Detection::new("cell phone", 0.8).with_box(10.0, 20.0, 30.0, 40.0);
        let bbox = detection.bounding_box.unwrap();
        assert_eq!(bbox.width, 30.0);
        assert_eq!(bbox.y, 20.0);
    }
}
