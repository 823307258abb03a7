// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Simulated camera for demo/testing

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::Rng;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{CameraDevice, CameraError, Frame, VideoConstraints, VideoTrack};

struct SimulatedTrack {
    id: String,
    frame: Mutex<Option<Frame>>,
    dimensions: Mutex<(u32, u32)>,
    sequence: AtomicU64,
    ended: CancellationToken,
    stopped: AtomicBool,
}

impl SimulatedTrack {
    fn new(id: String) -> Self {
        Self {
            id,
            frame: Mutex::new(None),
            dimensions: Mutex::new((640, 480)),
            sequence: AtomicU64::new(0),
            ended: CancellationToken::new(),
            stopped: AtomicBool::new(false),
        }
    }

    fn push(&self, fill: u8) -> u64 {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let (width, height) = *self.dimensions.lock();
        let len = (width as usize) * (height as usize) * 4;
        *self.frame.lock() = Some(Frame::new(sequence, width, height, vec![fill; len]));
        sequence
    }

    fn is_live(&self) -> bool {
        !self.stopped.load(Ordering::SeqCst) && !self.ended.is_cancelled()
    }
}

#[async_trait]
impl VideoTrack for SimulatedTrack {
    fn id(&self) -> &str {
        &self.id
    }

    fn latest_frame(&self) -> Option<Frame> {
        if !self.is_live() {
            return None;
        }
        self.frame.lock().clone()
    }

    async fn ended(&self) {
        self.ended.cancelled().await
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}

/// Test/demo control over one simulated track
#[derive(Clone)]
pub struct TrackHandle {
    track: Arc<SimulatedTrack>,
}

impl TrackHandle {
    pub fn id(&self) -> &str {
        &self.track.id
    }

    /// Produce a new frame, returns its sequence number
    pub fn push_frame(&self) -> u64 {
        self.track.push(0)
    }

    /// Emulate unplug / OS revoke. No-op on a released track.
    pub fn end(&self) {
        if !self.track.stopped.load(Ordering::SeqCst) {
            self.track.ended.cancel();
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.track.stopped.load(Ordering::SeqCst)
    }
}

/// Camera device backed by in-memory tracks.
///
/// Tracks exist from construction so frames can be scripted before or after `open`.
pub struct SimulatedCamera {
    tracks: Vec<Arc<SimulatedTrack>>,
    failure: Option<CameraError>,
    open_delay: Duration,
    auto_frames: bool,
    opens: AtomicUsize,
}

impl SimulatedCamera {
    /// One track, frames pushed manually
    pub fn new() -> Self {
        Self {
            tracks: vec![Arc::new(SimulatedTrack::new("sim-track-0".to_string()))],
            failure: None,
            open_delay: Duration::ZERO,
            auto_frames: false,
            opens: AtomicUsize::new(0),
        }
    }

    pub fn with_tracks(mut self, count: usize) -> Self {
        self.tracks = (0..count)
            .map(|i| Arc::new(SimulatedTrack::new(format!("sim-track-{}", i))))
            .collect();
        self
    }

    /// Every `open` fails with `err`
    pub fn failing(mut self, err: CameraError) -> Self {
        self.failure = Some(err);
        self
    }

    /// Emulate a permission prompt
    pub fn with_open_delay(mut self, delay: Duration) -> Self {
        self.open_delay = delay;
        self
    }

    /// Produce frames at the requested frame rate once opened
    pub fn with_auto_frames(mut self) -> Self {
        self.auto_frames = true;
        self
    }

    pub fn tracks(&self) -> Vec<TrackHandle> {
        self.tracks
            .iter()
            .map(|track| TrackHandle { track: Arc::clone(track) })
            .collect()
    }

    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

impl Default for SimulatedCamera {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CameraDevice for SimulatedCamera {
    async fn open(&self, constraints: &VideoConstraints) -> Result<Vec<Arc<dyn VideoTrack>>, CameraError> {
        self.opens.fetch_add(1, Ordering::SeqCst);

        if !self.open_delay.is_zero() {
            tokio::time::sleep(self.open_delay).await;
        }
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }

        for track in &self.tracks {
            *track.dimensions.lock() = (constraints.width, constraints.height);
            if self.auto_frames {
                spawn_producer(Arc::clone(track), constraints.frame_rate);
            }
        }

        Ok(self
            .tracks
            .iter()
            .map(|track| Arc::clone(track) as Arc<dyn VideoTrack>)
            .collect())
    }
}

fn spawn_producer(track: Arc<SimulatedTrack>, frame_rate: f64) {
    let period = Duration::from_secs_f64(1.0 / frame_rate.max(0.1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            if !track.is_live() {
                debug!("Frame producer for {} exiting", track.id);
                break;
            }
            let fill = rand::thread_rng().gen::<u8>();
            track.push(fill);
        }
    });
}
