// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Camera module - live video acquisition, health tracking and teardown

mod session;
mod simulator;
mod traits;

pub use session::{CameraSession, DisabledCallback};
pub use simulator::{SimulatedCamera, TrackHandle};
pub use traits::{CameraDevice, VideoConstraints, VideoTrack};

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle of a camera session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CameraState {
    Uninitialized,
    Requesting,
    Active,
    /// Involuntary loss: denied, unplugged, revoked
    Disabled,
    /// Released through `close()`
    Stopped,
}

impl CameraState {
    pub fn is_terminal(self) -> bool {
        matches!(self, CameraState::Disabled | CameraState::Stopped)
    }
}

/// Errors raised while acquiring the video stream
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CameraError {
    #[error("camera access denied: {0}")]
    AccessDenied(String),

    #[error("no camera device available")]
    NoDevice,

    #[error("camera session closed while acquisition was pending")]
    Closed,

    #[error("camera session already opened (state {0:?})")]
    AlreadyOpened(CameraState),
}

/// Why a session moved into `Disabled`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisableReason {
    AccessDenied(String),
    NoDevice,
    TrackEnded { track_id: String },
}

impl DisableReason {
    pub(crate) fn from_acquisition(err: &CameraError) -> Self {
        match err {
            CameraError::AccessDenied(msg) => DisableReason::AccessDenied(msg.clone()),
            _ => DisableReason::NoDevice,
        }
    }
}

impl std::fmt::Display for DisableReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DisableReason::AccessDenied(msg) => write!(f, "access denied ({})", msg),
            DisableReason::NoDevice => write!(f, "no device"),
            DisableReason::TrackEnded { track_id } => write!(f, "track {} ended", track_id),
        }
    }
}

/// A single decodable video frame
#[derive(Debug, Clone)]
pub struct Frame {
    pub sequence: u64,
    pub width: u32,
    pub height: u32,
    pub captured_at: DateTime<Utc>,

    /// Packed RGBA pixels, shared between clones
    pub data: Arc<[u8]>,
}

impl Frame {
    pub fn new(sequence: u64, width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            sequence,
            width,
            height,
            captured_at: Utc::now(),
            data: data.into(),
        }
    }

    /// Blank frame of the given size
    pub fn blank(sequence: u64, width: u32, height: u32) -> Self {
        let len = (width as usize) * (height as usize) * 4;
        Self::new(sequence, width, height, vec![0; len])
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(CameraState::Disabled.is_terminal());
        assert!(CameraState::Stopped.is_terminal());
        assert!(!CameraState::Active.is_terminal());
        assert!(!CameraState::Requesting.is_terminal());
    }

    #[test]
    fn test_disable_reason_from_acquisition() {
        let denied = CameraError::AccessDenied("user dismissed prompt".to_string());
        assert_eq!(
            DisableReason::from_acquisition(&denied),
            DisableReason::AccessDenied("user dismissed prompt".to_string())
        );
        assert_eq!(DisableReason::from_acquisition(&CameraError::NoDevice), DisableReason::NoDevice);
    }

    #[test]
    fn test_blank_frame_size() {
        let frame = Frame::blank(3, 4, 2);
        assert_eq!(frame.len(), 32);
        assert_eq!(frame.sequence, 3);
        assert!(!frame.is_empty());
    }
}
