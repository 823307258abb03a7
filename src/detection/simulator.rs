// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Scripted detection model for demo/testing

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::prelude::*;
use serde::{Deserialize, Serialize};

use super::{Detection, InferenceError, ModelError, ModelLoader, ObjectDetector};
use crate::camera::Frame;

/// Behaviour knobs for `ScriptedModel`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptedModelConfig {
    #[serde(with = "millis")]
    pub load_delay: Duration,

    /// Fail the load with this message
    pub load_error: Option<String>,

    /// Time spent in each `detect` call
    #[serde(with = "millis")]
    pub latency: Duration,

    /// Chance that an unscripted frame shows a phone (0-1)
    pub phone_probability: f64,
}

impl Default for ScriptedModelConfig {
    fn default() -> Self {
        Self {
            load_delay: Duration::ZERO,
            load_error: None,
            latency: Duration::ZERO,
            phone_probability: 0.0,
        }
    }
}

type Response = Result<Vec<Detection>, InferenceError>;

#[derive(Default)]
struct Counters {
    loads: AtomicUsize,
    calls: AtomicUsize,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

/// Model whose answers are queued up front.
///
/// Unscripted frames yield a random demo scene when `phone_probability > 0`,
/// otherwise an empty detection list.
pub struct ScriptedModel {
    config: ScriptedModelConfig,
    script: Arc<Mutex<VecDeque<Response>>>,
    counters: Arc<Counters>,
}

impl ScriptedModel {
    pub fn new(config: ScriptedModelConfig) -> Self {
        Self {
            config,
            script: Arc::new(Mutex::new(VecDeque::new())),
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn push_response(&self, response: Result<Vec<Detection>, InferenceError>) {
        self.script.lock().push_back(response);
    }

    pub fn push_detections(&self, detections: Vec<Detection>) {
        self.push_response(Ok(detections));
    }

    pub fn push_failure(&self, message: &str) {
        self.push_response(Err(InferenceError::InferenceFailed(message.to_string())));
    }

    pub fn load_count(&self) -> usize {
        self.counters.loads.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.counters.calls.load(Ordering::SeqCst)
    }

    /// Highest number of `detect` calls observed running at once
    pub fn max_concurrent(&self) -> usize {
        self.counters.max_active.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelLoader for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn load(&self) -> Result<Box<dyn ObjectDetector>, ModelError> {
        self.counters.loads.fetch_add(1, Ordering::SeqCst);
        if !self.config.load_delay.is_zero() {
            tokio::time::sleep(self.config.load_delay).await;
        }
        if let Some(message) = &self.config.load_error {
            return Err(ModelError::LoadFailed(message.clone()));
        }

        Ok(Box::new(ScriptedDetector {
            script: Arc::clone(&self.script),
            counters: Arc::clone(&self.counters),
            latency: self.config.latency,
            phone_probability: sanitize_probability(self.config.phone_probability),
            rng: StdRng::from_entropy(),
        }))
    }
}

fn sanitize_probability(p: f64) -> f64 {
    if p.is_finite() {
        p.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

struct ScriptedDetector {
    script: Arc<Mutex<VecDeque<Response>>>,
    counters: Arc<Counters>,
    latency: Duration,
    phone_probability: f64,
    rng: StdRng,
}

impl ScriptedDetector {
    fn demo_scene(&mut self, frame: &Frame) -> Vec<Detection> {
        let w = frame.width as f32;
        let h = frame.height as f32;
        let mut scene = vec![Detection::new("person", self.rng.gen_range(0.85..0.99))
            .with_box(w * 0.25, h * 0.1, w * 0.5, h * 0.85)];

        if self.rng.gen_bool(self.phone_probability) {
            scene.push(
                Detection::new("cell phone", self.rng.gen_range(0.35..0.95))
                    .with_box(w * 0.6, h * 0.55, w * 0.08, h * 0.15),
            );
        }
        scene
    }
}

/// Tracks overlapping calls, including ones cancelled mid-flight
struct ActiveCall<'a>(&'a Counters);

impl<'a> ActiveCall<'a> {
    fn enter(counters: &'a Counters) -> Self {
        counters.calls.fetch_add(1, Ordering::SeqCst);
        let now = counters.active.fetch_add(1, Ordering::SeqCst) + 1;
        counters.max_active.fetch_max(now, Ordering::SeqCst);
        Self(counters)
    }
}

impl Drop for ActiveCall<'_> {
    fn drop(&mut self) {
        self.0.active.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ObjectDetector for ScriptedDetector {
    async fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, InferenceError> {
        let counters = Arc::clone(&self.counters);
        let _active = ActiveCall::enter(&counters);

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let scripted = self.script.lock().pop_front();
        match scripted {
            Some(response) => response,
            None if self.phone_probability > 0.0 => Ok(self.demo_scene(frame)),
            None => Ok(Vec::new()),
        }
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
