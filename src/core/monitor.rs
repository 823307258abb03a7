// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Proctoring monitor - sampling loop, overlap guard, classification and event dispatch

use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use chrono::Utc;
use parking_lot::{Mutex, ReentrantMutex};
use tracing::{debug, error, info, warn};

use super::{
    CameraFaultEvent, DetectorFaultEvent, EventSink, MonitorError, MonitorLifecycle, MonitorStats,
    TickScheduler, ViolationEvent,
};
use crate::camera::{CameraSession, CameraState, DisableReason, Frame};
use crate::config::{ConfigError, MonitorConfig};
use crate::detection::{Detection, DetectionEngine, DetectorState, InferenceError, ModelError, Watchlist};

struct MonitorInner {
    lifecycle: MonitorLifecycle,
    /// Ticks do detection work only while set
    sampling: bool,
    /// Ticket of the outstanding `detect` call
    in_flight: Option<u64>,
    next_ticket: u64,
    camera_fault_reported: bool,
    detector_fault_reported: bool,
    stats: MonitorStats,
}

struct Shared {
    config: MonitorConfig,
    watchlist: Watchlist,
    camera: Arc<CameraSession>,
    detector: Arc<DetectionEngine>,
    sink: Arc<dyn EventSink>,
    scheduler: TickScheduler,
    /// Held around every sink call and by `stop()`. Reentrant so a sink may
    /// call back into the monitor.
    delivery: ReentrantMutex<()>,
    inner: Mutex<MonitorInner>,
}

/// Samples the camera on a fixed tick, runs one inference at a time and
/// reports violations and faults to the sink.
///
/// All bookkeeping sits behind one lock. Fault handling and result dispatch
/// make their decision under it and release it before calling the sink, so a
/// sink may call `stop()`. Sink calls are serialized by a separate delivery
/// gate that `stop()` also takes, so nothing is delivered after `stop()`
/// returns. A camera fault clears `sampling` before the sink hears of it, so
/// no later tick starts detection work.
pub struct ProctoringMonitor {
    shared: Arc<Shared>,
}

impl ProctoringMonitor {
    pub fn new(
        config: MonitorConfig,
        camera: Arc<CameraSession>,
        detector: Arc<DetectionEngine>,
        sink: Arc<dyn EventSink>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        Ok(Self {
            shared: Arc::new(Shared {
                watchlist: config.watchlist(),
                scheduler: TickScheduler::new(config.tick_interval()),
                config,
                camera,
                detector,
                sink,
                delivery: ReentrantMutex::new(()),
                inner: Mutex::new(MonitorInner {
                    lifecycle: MonitorLifecycle::Idle,
                    sampling: false,
                    in_flight: None,
                    next_ticket: 0,
                    camera_fault_reported: false,
                    detector_fault_reported: false,
                    stats: MonitorStats::default(),
                }),
            }),
        })
    }

    /// Open the camera, load the model and arm the tick. Returns immediately;
    /// ticks before both are ready do nothing.
    pub fn start(&self) -> Result<(), MonitorError> {
        {
            let mut inner = self.shared.inner.lock();
            if inner.lifecycle != MonitorLifecycle::Idle {
                return Err(MonitorError::InvalidTransition { from: inner.lifecycle });
            }
            inner.lifecycle = MonitorLifecycle::Running;
            inner.sampling = true;
            inner.stats.started_at = Some(Utc::now());
        }

        info!(
            "Starting proctoring monitor: tick {:?}, {} watchlist entr(ies)",
            self.shared.config.tick_interval(),
            self.shared.watchlist.entries().len()
        );

        let weak = Arc::downgrade(&self.shared);
        self.shared.camera.set_on_disabled(Arc::new(move |reason| {
            if let Some(shared) = weak.upgrade() {
                shared.handle_camera_fault(reason);
            }
        }));

        let camera = Arc::clone(&self.shared.camera);
        tokio::spawn(async move {
            // failures reach the sink through the disable callback
            if let Err(err) = camera.open().await {
                debug!("Camera open finished with {}", err);
            }
        });

        let weak = Arc::downgrade(&self.shared);
        let detector = Arc::clone(&self.shared.detector);
        tokio::spawn(async move {
            if let Err(err) = detector.load().await {
                if let Some(shared) = weak.upgrade() {
                    shared.handle_detector_fault(err);
                }
            }
        });

        let weak: Weak<Shared> = Arc::downgrade(&self.shared);
        self.shared.scheduler.arm(move || {
            if let Some(shared) = weak.upgrade() {
                Shared::tick(&shared);
            }
        });

        Ok(())
    }

    /// Disarm the tick and release the camera. Idempotent; valid from any state.
    ///
    /// An inference still running completes in the background and its result
    /// is dropped.
    pub fn stop(&self) {
        let _delivery = self.shared.delivery.lock();
        {
            let mut inner = self.shared.inner.lock();
            if inner.lifecycle == MonitorLifecycle::Stopped {
                return;
            }
            inner.lifecycle = MonitorLifecycle::Stopped;
            inner.sampling = false;
        }

        self.shared.scheduler.disarm();
        self.shared.camera.close();
        info!("Proctoring monitor stopped");
    }

    pub fn lifecycle(&self) -> MonitorLifecycle {
        self.shared.inner.lock().lifecycle
    }

    /// False once stopped or after a camera fault
    pub fn is_sampling(&self) -> bool {
        self.shared.inner.lock().sampling
    }

    pub fn is_inference_in_flight(&self) -> bool {
        self.shared.inner.lock().in_flight.is_some()
    }

    pub fn stats(&self) -> MonitorStats {
        self.shared.inner.lock().stats.clone()
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.shared.config
    }

    pub fn camera_state(&self) -> CameraState {
        self.shared.camera.state()
    }

    pub fn detector_state(&self) -> DetectorState {
        self.shared.detector.state()
    }
}

impl Drop for ProctoringMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

impl Shared {
    fn tick(self: &Arc<Self>) {
        let mut inner = self.inner.lock();
        if !inner.sampling {
            return;
        }
        inner.stats.ticks += 1;

        if inner.in_flight.is_some() {
            inner.stats.skipped_busy += 1;
            debug!("Tick skipped: inference in flight");
            return;
        }

        if self.camera.state() != CameraState::Active || self.detector.state() != DetectorState::Ready {
            inner.stats.skipped_unready += 1;
            debug!(
                "Tick skipped: camera {:?}, detector {:?}",
                self.camera.state(),
                self.detector.state()
            );
            return;
        }

        let Some(frame) = self.camera.current_frame() else {
            inner.stats.skipped_no_frame += 1;
            debug!("Tick skipped: no frame yet");
            return;
        };

        let ticket = inner.next_ticket;
        inner.next_ticket += 1;
        inner.in_flight = Some(ticket);
        inner.stats.inferences += 1;
        drop(inner);

        let shared = Arc::clone(self);
        tokio::spawn(async move { shared.run_inference(ticket, frame).await });
    }

    async fn run_inference(self: Arc<Self>, ticket: u64, frame: Frame) {
        let _flight = InFlight { shared: &*self, ticket };

        let started = Instant::now();
        let outcome = match self.config.inference_timeout() {
            Some(limit) => match tokio::time::timeout(limit, self.detector.detect(&frame)).await {
                Ok(result) => result,
                Err(_) => Err(InferenceError::TimedOut(limit)),
            },
            None => self.detector.detect(&frame).await,
        };

        self.dispatch(ticket, &frame, outcome, started.elapsed());
    }

    fn dispatch(
        &self,
        ticket: u64,
        frame: &Frame,
        outcome: Result<Vec<Detection>, InferenceError>,
        elapsed: Duration,
    ) {
        let _delivery = self.delivery.lock();
        let mut inner = self.inner.lock();
        if inner.in_flight == Some(ticket) {
            inner.in_flight = None;
        }
        inner.stats.last_inference_ms = Some(elapsed.as_millis() as u64);

        if !inner.sampling {
            inner.stats.discarded_results += 1;
            debug!("Discarding result for frame {}: sampling ended", frame.sequence);
            return;
        }

        let detections = match outcome {
            Ok(detections) => detections,
            Err(err) => {
                inner.stats.inference_failures += 1;
                inner.stats.last_error = Some(err.to_string());
                warn!("Inference failed for frame {}: {}", frame.sequence, err);
                return;
            }
        };

        let Some(hit) = self.watchlist.first_match(&detections) else {
            debug!("Frame {}: no watchlist match in {} detection(s)", frame.sequence, detections.len());
            return;
        };

        inner.stats.violations += 1;
        drop(inner);

        warn!(
            "Violation on frame {}: '{}' ({:.2})",
            frame.sequence, hit.detection.label, hit.detection.confidence
        );
        self.sink.on_violation(ViolationEvent {
            matched_label: hit.detection.label.clone(),
            confidence: hit.detection.confidence,
            bounding_box: hit.detection.bounding_box,
            watchlist_index: hit.entry_index,
            frame_sequence: frame.sequence,
            timestamp: Utc::now(),
        });
    }

    fn handle_camera_fault(&self, reason: DisableReason) {
        let _delivery = self.delivery.lock();
        {
            let mut inner = self.inner.lock();
            if inner.lifecycle != MonitorLifecycle::Running || inner.camera_fault_reported {
                return;
            }
            inner.camera_fault_reported = true;
            inner.sampling = false;
        }
        self.scheduler.disarm();

        warn!("Camera fault, sampling halted: {}", reason);
        self.sink.on_camera_fault(CameraFaultEvent {
            reason,
            timestamp: Utc::now(),
        });
    }

    fn handle_detector_fault(&self, err: ModelError) {
        let _delivery = self.delivery.lock();
        {
            let mut inner = self.inner.lock();
            if inner.lifecycle != MonitorLifecycle::Running || inner.detector_fault_reported {
                return;
            }
            inner.detector_fault_reported = true;
        }

        error!("Detector unavailable, monitor degraded: {}", err);
        self.sink.on_detector_fault(DetectorFaultEvent {
            error: err,
            timestamp: Utc::now(),
        });
    }
}

/// Releases the in-flight slot even if the detector panics
struct InFlight<'a> {
    shared: &'a Shared,
    ticket: u64,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut inner = self.shared.inner.lock();
        if inner.in_flight == Some(self.ticket) {
            inner.in_flight = None;
        }
    }
}
