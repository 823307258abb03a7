// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Camera capability traits

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{CameraError, Frame};

/// Requested stream shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConstraints {
    pub width: u32,
    pub height: u32,
    pub frame_rate: f64,
    pub device_id: Option<String>,
}

impl Default for VideoConstraints {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            frame_rate: 15.0,
            device_id: None,
        }
    }
}

/// Hardware/OS media capability. The only place a camera is touched.
#[async_trait]
pub trait CameraDevice: Send + Sync {
    /// Request the stream. May suspend on a permission prompt.
    async fn open(&self, constraints: &VideoConstraints) -> Result<Vec<Arc<dyn VideoTrack>>, CameraError>;
}

/// One live video track delivered by a `CameraDevice`
#[async_trait]
pub trait VideoTrack: Send + Sync {
    fn id(&self) -> &str;

    /// Latest decodable frame, `None` until the feed has produced one. Never blocks.
    fn latest_frame(&self) -> Option<Frame>;

    /// Resolves when the track ends involuntarily (unplug, revoke, user disable).
    /// A release through `stop()` does not resolve it.
    async fn ended(&self);

    /// Release the track
    fn stop(&self);
}
