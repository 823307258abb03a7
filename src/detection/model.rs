// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Object-detection model capability traits

use async_trait::async_trait;

use super::{Detection, InferenceError, ModelError};
use crate::camera::Frame;

/// Produces a ready-to-run detector. May suspend while weights are fetched.
#[async_trait]
pub trait ModelLoader: Send + Sync {
    /// Model name for logs
    fn name(&self) -> &str;

    async fn load(&self) -> Result<Box<dyn ObjectDetector>, ModelError>;
}

/// A loaded model. Not required to be reentrant.
///
/// `detect` runs on the async runtime and may be cancelled at any await point
/// by the inference watchdog. CPU-heavy inference belongs in
/// `tokio::task::spawn_blocking`; a call that never yields cannot be timed out.
#[async_trait]
pub trait ObjectDetector: Send {
    async fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, InferenceError>;
}
