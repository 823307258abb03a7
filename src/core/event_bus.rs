// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Event sink interface and the broadcast event bus

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::camera::DisableReason;
use crate::detection::{BoundingBox, ModelError};

/// A watched object was seen in a sampled frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViolationEvent {
    pub matched_label: String,
    pub confidence: f32,
    pub bounding_box: Option<BoundingBox>,
    /// Index of the watchlist entry that matched
    pub watchlist_index: usize,
    pub frame_sequence: u64,
    pub timestamp: DateTime<Utc>,
}

/// The camera was lost or never acquired
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraFaultEvent {
    pub reason: DisableReason,
    pub timestamp: DateTime<Utc>,
}

/// The model never became usable; violations can no longer be detected
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorFaultEvent {
    pub error: ModelError,
    pub timestamp: DateTime<Utc>,
}

/// Receiver of monitor decisions.
///
/// Calls are serialized and made without the monitor's state lock held, so an
/// implementation may call back into the monitor (for example `stop()` on a
/// camera fault). Calls block the tick that produced them; return promptly.
pub trait EventSink: Send + Sync {
    fn on_violation(&self, event: ViolationEvent);

    fn on_camera_fault(&self, event: CameraFaultEvent);

    fn on_detector_fault(&self, event: DetectorFaultEvent);
}

/// Event types in the system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    Violation,
    CameraFault,
    DetectorFault,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EventPayload {
    Violation(ViolationEvent),
    CameraFault(CameraFaultEvent),
    DetectorFault(DetectorFaultEvent),
}

impl EventPayload {
    pub fn event_type(&self) -> EventType {
        match self {
            EventPayload::Violation(_) => EventType::Violation,
            EventPayload::CameraFault(_) => EventType::CameraFault,
            EventPayload::DetectorFault(_) => EventType::DetectorFault,
        }
    }
}

/// Generic event wrapper
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: u64,
    pub event_type: EventType,
    pub timestamp: DateTime<Utc>,
    pub payload: EventPayload,
}

/// Broadcast sink for pub/sub delivery. Publishing never blocks; slow
/// subscribers lag and lose the oldest events.
pub struct EventBus {
    violation_tx: broadcast::Sender<ViolationEvent>,
    fault_tx: broadcast::Sender<EventPayload>,
    event_tx: broadcast::Sender<Event>,
    event_counter: AtomicU64,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (violation_tx, _) = broadcast::channel(capacity);
        let (fault_tx, _) = broadcast::channel(capacity);
        let (event_tx, _) = broadcast::channel(capacity);

        Self {
            violation_tx,
            fault_tx,
            event_tx,
            event_counter: AtomicU64::new(0),
        }
    }

    fn publish_event(&self, payload: EventPayload) {
        let id = self.event_counter.fetch_add(1, Ordering::Relaxed);
        let event = Event {
            id,
            event_type: payload.event_type(),
            timestamp: Utc::now(),
            payload,
        };
        let _ = self.event_tx.send(event);
    }

    pub fn subscribe_violations(&self) -> broadcast::Receiver<ViolationEvent> {
        self.violation_tx.subscribe()
    }

    /// Camera and detector faults
    pub fn subscribe_faults(&self) -> broadcast::Receiver<EventPayload> {
        self.fault_tx.subscribe()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    pub fn published(&self) -> u64 {
        self.event_counter.load(Ordering::Relaxed)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

impl EventSink for EventBus {
    fn on_violation(&self, event: ViolationEvent) {
        let _ = self.violation_tx.send(event.clone());
        self.publish_event(EventPayload::Violation(event));
    }

    fn on_camera_fault(&self, event: CameraFaultEvent) {
        let payload = EventPayload::CameraFault(event);
        let _ = self.fault_tx.send(payload.clone());
        self.publish_event(payload);
    }

    fn on_detector_fault(&self, event: DetectorFaultEvent) {
        let payload = EventPayload::DetectorFault(event);
        let _ = self.fault_tx.send(payload.clone());
        self.publish_event(payload);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn violation(label: &str) -> ViolationEvent {
        ViolationEvent {
            matched_label: label.to_string(),
            confidence: 0.9,
            bounding_box: None,
            watchlist_index: 0,
            frame_sequence: 1,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::new(8);
        bus.on_violation(violation("phone"));
        bus.on_camera_fault(CameraFaultEvent {
            reason: DisableReason::NoDevice,
            timestamp: Utc::now(),
        });
        assert_eq!(bus.published(), 2);
    }

    #[test]
    fn test_typed_and_combined_streams() {
        let bus = EventBus::new(8);
        let mut violations = bus.subscribe_violations();
        let mut faults = bus.subscribe_faults();
        let mut events = bus.subscribe_events();

        bus.on_violation(violation("cell phone"));
        bus.on_detector_fault(DetectorFaultEvent {
            error: ModelError::LoadFailed("no weights".into()),
            timestamp: Utc::now(),
        });

        assert_eq!(violations.try_recv().unwrap().matched_label, "cell phone");
        assert!(violations.try_recv().is_err());
        assert!(matches!(faults.try_recv().unwrap(), EventPayload::DetectorFault(_)));

        let first = events.try_recv().unwrap();
        let second = events.try_recv().unwrap();
        assert_eq!((first.id, first.event_type), (0, EventType::Violation));
        assert_eq!((second.id, second.event_type), (1, EventType::DetectorFault));
    }

    #[test]
    fn test_event_serializes_to_json() {
        let bus = EventBus::new(8);
        let mut events = bus.subscribe_events();
        bus.on_camera_fault(CameraFaultEvent {
            reason: DisableReason::TrackEnded { track_id: "cam-0".into() },
            timestamp: Utc::now(),
        });

        let json = serde_json::to_value(events.try_recv().unwrap()).unwrap();
        assert_eq!(json["event_type"], "CameraFault");
        assert_eq!(json["payload"]["CameraFault"]["reason"]["TrackEnded"]["track_id"], "cam-0");
    }
}
