use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Names of the events published to observers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A device completed an authenticated REGISTER
    DeviceRegistered,
    /// A device sent REGISTER with `Expires: 0`
    DeviceUnregistered,
    /// The expiry sweep dropped a stale registration
    DeviceExpired,
    /// The set of active calls changed
    CallUpdate,
    /// Fresh quality samples for one active call
    QualityUpdate,
    /// A SIP message crossed the wire (either direction)
    SipMessage,
    /// A call to one of the synthetic test extensions was answered
    TestCallStarted,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::DeviceRegistered => "device_registered",
            EventKind::DeviceUnregistered => "device_unregistered",
            EventKind::DeviceExpired => "device_expired",
            EventKind::CallUpdate => "call_update",
            EventKind::QualityUpdate => "quality_update",
            EventKind::SipMessage => "sip_message",
            EventKind::TestCallStarted => "test_call_started",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named event with a JSON payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorEvent {
    pub event: EventKind,
    pub payload: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl MonitorEvent {
    /// Create an event stamped with the current time
    pub fn new(event: EventKind, payload: serde_json::Value) -> Self {
        Self {
            event,
            payload,
            timestamp: Utc::now(),
        }
    }

    /// Serialize a payload, falling back to `null` if it can't be represented
    pub fn from_serializable<T: Serialize>(event: EventKind, payload: &T) -> Self {
        let value = serde_json::to_value(payload).unwrap_or_else(|e| {
            tracing::warn!(event = %event, "Dropping unserializable event payload: {}", e);
            serde_json::Value::Null
        });
        Self::new(event, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn kind_serializes_snake_case() {
        let ev = MonitorEvent::new(EventKind::TestCallStarted, json!({"extension": "999"}));
        let text = serde_json::to_string(&ev).unwrap();
        assert!(text.contains("\"event\":\"test_call_started\""));
        assert_eq!(EventKind::DeviceExpired.to_string(), "device_expired");
    }
}
