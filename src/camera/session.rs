// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Camera session - owns the live stream and reports involuntary loss

use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{CameraDevice, CameraError, CameraState, DisableReason, Frame, VideoConstraints, VideoTrack};

/// One-shot notification fired when the session becomes `Disabled`
pub type DisabledCallback = Arc<dyn Fn(DisableReason) + Send + Sync>;

struct SessionInner {
    state: CameraState,
    tracks: Vec<Arc<dyn VideoTrack>>,
    watchers: CancellationToken,
    on_disabled: Option<DisabledCallback>,
    disable_reason: Option<DisableReason>,
    notified: bool,
}

/// Acquires a live video stream and tracks its health.
///
/// The session is the sole owner of the delivered tracks: it stops them on
/// `close()`, on involuntary loss, and when dropped.
pub struct CameraSession {
    device: Arc<dyn CameraDevice>,
    constraints: VideoConstraints,
    inner: Arc<Mutex<SessionInner>>,
}

impl CameraSession {
    pub fn new(device: Arc<dyn CameraDevice>, constraints: VideoConstraints) -> Self {
        Self {
            device,
            constraints,
            inner: Arc::new(Mutex::new(SessionInner {
                state: CameraState::Uninitialized,
                tracks: Vec::new(),
                watchers: CancellationToken::new(),
                on_disabled: None,
                disable_reason: None,
                notified: false,
            })),
        }
    }

    /// Register the disable callback, replacing any earlier one.
    ///
    /// If the session was disabled before anyone listened, the callback fires now.
    pub fn set_on_disabled(&self, callback: DisabledCallback) {
        let pending = {
            let mut inner = self.inner.lock();
            if inner.state == CameraState::Disabled && !inner.notified {
                inner.notified = true;
                inner.disable_reason.clone()
            } else {
                inner.on_disabled = Some(callback.clone());
                None
            }
        };

        if let Some(reason) = pending {
            callback(reason);
        }
    }

    pub fn state(&self) -> CameraState {
        self.inner.lock().state
    }

    pub fn disable_reason(&self) -> Option<DisableReason> {
        self.inner.lock().disable_reason.clone()
    }

    pub fn constraints(&self) -> &VideoConstraints {
        &self.constraints
    }

    /// Request stream access: `Uninitialized -> Requesting -> Active | Disabled`
    pub async fn open(&self) -> Result<(), CameraError> {
        {
            let mut inner = self.inner.lock();
            if inner.state != CameraState::Uninitialized {
                return Err(CameraError::AlreadyOpened(inner.state));
            }
            inner.state = CameraState::Requesting;
        }

        info!(
            "Requesting camera stream {}x{} @ {} fps",
            self.constraints.width, self.constraints.height, self.constraints.frame_rate
        );

        let tracks = match self.device.open(&self.constraints).await {
            Ok(tracks) if tracks.is_empty() => return self.fail(CameraError::NoDevice),
            Ok(tracks) => tracks,
            Err(err) => return self.fail(err),
        };

        let mut inner = self.inner.lock();
        if inner.state != CameraState::Requesting {
            // closed while the request was pending
            drop(inner);
            for track in &tracks {
                track.stop();
            }
            debug!("Camera acquired after close, released {} track(s)", tracks.len());
            return Err(CameraError::Closed);
        }

        for track in &tracks {
            spawn_end_watcher(Arc::clone(&self.inner), Arc::clone(track), inner.watchers.clone());
        }
        inner.state = CameraState::Active;
        inner.tracks = tracks;

        info!("Camera active with {} track(s)", inner.tracks.len());
        Ok(())
    }

    fn fail(&self, err: CameraError) -> Result<(), CameraError> {
        warn!("Camera acquisition failed: {}", err);
        disable(&self.inner, DisableReason::from_acquisition(&err));
        Err(err)
    }

    /// Latest decodable frame while `Active`
    pub fn current_frame(&self) -> Option<Frame> {
        let inner = self.inner.lock();
        if inner.state != CameraState::Active {
            return None;
        }
        inner.tracks.iter().find_map(|track| track.latest_frame())
    }

    /// Release all tracks. Moves to `Stopped` unless already `Disabled`.
    pub fn close(&self) {
        let tracks = {
            let mut inner = self.inner.lock();
            inner.watchers.cancel();
            if inner.state != CameraState::Disabled && inner.state != CameraState::Stopped {
                inner.state = CameraState::Stopped;
                info!("Camera session stopped");
            }
            std::mem::take(&mut inner.tracks)
        };

        for track in &tracks {
            track.stop();
        }
    }
}

impl Drop for CameraSession {
    fn drop(&mut self) {
        self.close();
    }
}

fn spawn_end_watcher(inner: Arc<Mutex<SessionInner>>, track: Arc<dyn VideoTrack>, token: CancellationToken) {
    tokio::spawn(async move {
        tokio::select! {
            biased;
            _ = token.cancelled() => {}
            _ = track.ended() => {
                let track_id = track.id().to_string();
                warn!("Camera track {} ended", track_id);
                disable(&inner, DisableReason::TrackEnded { track_id });
            }
        }
    });
}

/// Idempotent transition into `Disabled`; fires the callback at most once.
fn disable(inner: &Mutex<SessionInner>, reason: DisableReason) {
    let (callback, tracks) = {
        let mut guard = inner.lock();
        if guard.state.is_terminal() {
            debug!("Ignoring camera loss ({}), session already {:?}", reason, guard.state);
            return;
        }
        guard.state = CameraState::Disabled;
        guard.disable_reason = Some(reason.clone());
        guard.watchers.cancel();

        let callback = guard.on_disabled.take();
        guard.notified = callback.is_some();
        (callback, std::mem::take(&mut guard.tracks))
    };

    for track in &tracks {
        track.stop();
    }

    warn!("Camera disabled: {}", reason);
    if let Some(callback) = callback {
        callback(reason);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::SimulatedCamera;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn counting_callback() -> (DisabledCallback, Arc<Mutex<Vec<DisableReason>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let callback: DisabledCallback = Arc::new(move |reason| sink.lock().push(reason));
        (callback, seen)
    }

    #[tokio::test]
    async fn test_open_activates_and_serves_frames() {
        let camera = Arc::new(SimulatedCamera::new());
        let session = CameraSession::new(camera.clone(), VideoConstraints::default());

        assert_eq!(session.state(), CameraState::Uninitialized);
        assert!(session.current_frame().is_none());

        session.open().await.unwrap();
        assert_eq!(session.state(), CameraState::Active);

        // active but no frame produced yet
        assert!(session.current_frame().is_none());

        camera.tracks()[0].push_frame();
        let frame = session.current_frame().unwrap();
        assert_eq!(frame.sequence, 1);
        assert_eq!(frame.width, 640);
    }

    #[tokio::test]
    async fn test_open_twice_is_rejected() {
        let session = CameraSession::new(Arc::new(SimulatedCamera::new()), VideoConstraints::default());
        session.open().await.unwrap();

        assert_eq!(session.open().await, Err(CameraError::AlreadyOpened(CameraState::Active)));
    }

    #[tokio::test]
    async fn test_no_device_disables_and_notifies() {
        let camera = Arc::new(SimulatedCamera::new().failing(CameraError::NoDevice));
        let session = CameraSession::new(camera, VideoConstraints::default());
        let (callback, seen) = counting_callback();
        session.set_on_disabled(callback);

        assert_eq!(session.open().await, Err(CameraError::NoDevice));
        assert_eq!(session.state(), CameraState::Disabled);
        assert_eq!(*seen.lock(), vec![DisableReason::NoDevice]);
    }

    #[tokio::test]
    async fn test_empty_track_list_is_no_device() {
        let camera = Arc::new(SimulatedCamera::new().with_tracks(0));
        let session = CameraSession::new(camera, VideoConstraints::default());

        assert_eq!(session.open().await, Err(CameraError::NoDevice));
        assert_eq!(session.disable_reason(), Some(DisableReason::NoDevice));
    }

    #[tokio::test]
    async fn test_concurrent_track_ends_notify_once() {
        let camera = Arc::new(SimulatedCamera::new().with_tracks(3));
        let session = CameraSession::new(camera.clone(), VideoConstraints::default());
        let (callback, seen) = counting_callback();
        session.set_on_disabled(callback);
        session.open().await.unwrap();

        for handle in camera.tracks() {
            handle.end();
        }
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(session.state(), CameraState::Disabled);
        assert_eq!(seen.lock().len(), 1);
        assert!(matches!(seen.lock()[0], DisableReason::TrackEnded { .. }));
        assert!(session.current_frame().is_none());
        assert!(camera.tracks().iter().all(|h| h.is_stopped()));
    }

    #[tokio::test]
    async fn test_close_releases_tracks_without_fault() {
        let camera = Arc::new(SimulatedCamera::new().with_tracks(2));
        let session = CameraSession::new(camera.clone(), VideoConstraints::default());
        let (callback, seen) = counting_callback();
        session.set_on_disabled(callback);
        session.open().await.unwrap();

        session.close();
        session.close();
        assert_eq!(session.state(), CameraState::Stopped);
        assert!(camera.tracks().iter().all(|h| h.is_stopped()));

        // a late end signal from a released track is not a fault
        camera.tracks()[0].end();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(seen.lock().is_empty());
    }

    #[tokio::test]
    async fn test_close_after_disable_keeps_disabled() {
        let camera = Arc::new(SimulatedCamera::new());
        let session = CameraSession::new(camera.clone(), VideoConstraints::default());
        session.open().await.unwrap();

        camera.tracks()[0].end();
        tokio::time::sleep(Duration::from_millis(20)).await;
        session.close();

        assert_eq!(session.state(), CameraState::Disabled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_during_acquisition() {
        let camera = Arc::new(SimulatedCamera::new().with_open_delay(Duration::from_millis(500)));
        let session = Arc::new(CameraSession::new(camera.clone(), VideoConstraints::default()));

        let opener = {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.open().await })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(session.state(), CameraState::Requesting);

        session.close();
        assert_eq!(opener.await.unwrap(), Err(CameraError::Closed));
        assert_eq!(session.state(), CameraState::Stopped);
        assert!(camera.tracks()[0].is_stopped());
    }

    #[tokio::test]
    async fn test_late_registration_still_notified() {
        let camera = Arc::new(SimulatedCamera::new().failing(CameraError::AccessDenied("blocked".into())));
        let session = CameraSession::new(camera, VideoConstraints::default());
        let _ = session.open().await;

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        session.set_on_disabled(Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        session.set_on_disabled(Arc::new(|_| panic!("already notified")));

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
