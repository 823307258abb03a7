// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Detection engine - owns the model handle and its readiness

use std::sync::Arc;
use std::time::Instant;

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::{Detection, DetectorState, InferenceError, ModelError, ModelLoader, ObjectDetector};
use crate::camera::Frame;

type LoadFuture = Shared<BoxFuture<'static, Result<(), ModelError>>>;

struct EngineInner {
    loader: Arc<dyn ModelLoader>,
    state: watch::Sender<DetectorState>,
    model: tokio::sync::Mutex<Option<Box<dyn ObjectDetector>>>,
}

/// Loads the model once and runs single-frame inference
pub struct DetectionEngine {
    inner: Arc<EngineInner>,
    pending: parking_lot::Mutex<Option<LoadFuture>>,
}

impl DetectionEngine {
    pub fn new(loader: Arc<dyn ModelLoader>) -> Self {
        let (state, _) = watch::channel(DetectorState::Loading);
        Self {
            inner: Arc::new(EngineInner {
                loader,
                state,
                model: tokio::sync::Mutex::new(None),
            }),
            pending: parking_lot::Mutex::new(None),
        }
    }

    pub fn state(&self) -> DetectorState {
        *self.inner.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<DetectorState> {
        self.inner.state.subscribe()
    }

    /// Load the model. Every caller shares the first load; a failure is final.
    pub async fn load(&self) -> Result<(), ModelError> {
        let pending = {
            let mut slot = self.pending.lock();
            slot.get_or_insert_with(|| load_model(Arc::clone(&self.inner))).clone()
        };
        pending.await
    }

    /// Run the model on one frame. Calls must not overlap; an overlapping call gets `Busy`.
    pub async fn detect(&self, frame: &Frame) -> Result<Vec<Detection>, InferenceError> {
        if self.state() != DetectorState::Ready {
            return Err(InferenceError::NotReady);
        }

        let mut model = self.inner.model.try_lock().map_err(|_| InferenceError::Busy)?;
        let detector = model.as_mut().ok_or(InferenceError::NotReady)?;

        let started = Instant::now();
        let detections = sanitize(detector.detect(frame).await?);
        debug!(
            "Frame {} -> {} detection(s) in {:?}",
            frame.sequence,
            detections.len(),
            started.elapsed()
        );
        Ok(detections)
    }
}

/// Clamp confidences into 0-1 and drop detections whose confidence is not a number
fn sanitize(detections: Vec<Detection>) -> Vec<Detection> {
    detections
        .into_iter()
        .filter(|detection| {
            let finite = detection.confidence.is_finite();
            if !finite {
                warn!("Dropping '{}' with confidence {}", detection.label, detection.confidence);
            }
            finite
        })
        .map(|mut detection| {
            detection.confidence = detection.confidence.clamp(0.0, 1.0);
            detection
        })
        .collect()
}

fn load_model(inner: Arc<EngineInner>) -> LoadFuture {
    async move {
        let name = inner.loader.name().to_string();
        info!("Loading detection model '{}'...", name);
        let started = Instant::now();

        match inner.loader.load().await {
            Ok(detector) => {
                *inner.model.lock().await = Some(detector);
                inner.state.send_replace(DetectorState::Ready);
                info!("Detection model '{}' ready in {:?}", name, started.elapsed());
                Ok(())
            }
            Err(err) => {
                inner.state.send_replace(DetectorState::Failed);
                error!("Detection model '{}' unusable: {}", name, err);
                Err(err)
            }
        }
    }
    .boxed()
    .shared()
}
