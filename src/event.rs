//! Event intake — validates and normalizes an incoming action into a typed
//! record. Mirrors the wire-stable schema in the spec's external-interfaces
//! section: unknown enum tags are rejected by serde's own enum
//! deserialization and surfaced as [`EngineError::SchemaError`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Post,
    Comment,
    Like,
    Share,
    Follow,
    Story,
    Video,
    LiveStream,
    DailyLogin,
    QuestComplete,
    Milestone,
    ViralContent,
    ReferralL1ActivityDecay,
    ReferralL2ActivityDecay,
    ReferralL3ActivityDecay,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    TikTok,
    YouTube,
    Instagram,
    Facebook,
    X,
    LinkedIn,
    OwnApp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaDescriptor {
    pub media_type: String,
    pub duration_secs: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentPayload {
    pub text_hash: String,
    pub text: Option<String>,
    pub media_descriptor: Option<MediaDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    pub fingerprint_hex: String,
    pub primary: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionType {
    Residential,
    Mobile,
    Datacenter,
    Vpn,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkDescriptor {
    pub country: String,
    pub connection_type: ConnectionType,
}

/// Wire-stable event record, deserialized directly from the RPC boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEventWire {
    pub event_id: String,
    pub user_id: String,
    pub kind: ActivityKind,
    pub platform: Platform,
    pub timestamp: DateTime<Utc>,
    pub content: Option<ContentPayload>,
    pub device: DeviceDescriptor,
    pub network_descriptor: NetworkDescriptor,
}

/// Normalized, validated activity event used internally by the engine.
#[derive(Debug, Clone)]
pub struct ActivityEvent {
    pub event_id: String,
    pub user_id: String,
    pub kind: ActivityKind,
    pub platform: Platform,
    pub timestamp: DateTime<Utc>,
    pub content: Option<ContentPayload>,
    pub device_fingerprint: String,
    pub ip_descriptor: NetworkDescriptor,
}

impl ActivityEvent {
    /// Validate and normalize a wire record. `user_id` must be non-empty,
    /// case-sensitive, and at most 64 bytes per the `UserAccount.id`
    /// contract in the data model.
    pub fn from_wire(wire: ActivityEventWire) -> Result<ActivityEvent, EngineError> {
        if wire.user_id.is_empty() || wire.user_id.len() > 64 {
            return Err(EngineError::SchemaError(format!(
                "user_id must be 1..=64 bytes, got {}",
                wire.user_id.len()
            )));
        }
        if wire.event_id.is_empty() {
            return Err(EngineError::SchemaError("event_id must be non-empty".into()));
        }
        if wire.device.fingerprint_hex.is_empty() {
            return Err(EngineError::SchemaError(
                "device fingerprint must be non-empty".into(),
            ));
        }

        Ok(ActivityEvent {
            event_id: wire.event_id,
            user_id: wire.user_id,
            kind: wire.kind,
            platform: wire.platform,
            timestamp: wire.timestamp,
            content: wire.content,
            device_fingerprint: wire.device.fingerprint_hex,
            ip_descriptor: wire.network_descriptor,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_wire() -> ActivityEventWire {
        ActivityEventWire {
            event_id: "E1".into(),
            user_id: "user-1".into(),
            kind: ActivityKind::Post,
            platform: Platform::Instagram,
            timestamp: Utc::now(),
            content: None,
            device: DeviceDescriptor {
                fingerprint_hex: "deadbeef".into(),
                primary: true,
            },
            network_descriptor: NetworkDescriptor {
                country: "USA".into(),
                connection_type: ConnectionType::Residential,
            },
        }
    }

    #[test]
    fn accepts_valid_event() {
        assert!(ActivityEvent::from_wire(sample_wire()).is_ok());
    }

    #[test]
    fn rejects_oversized_user_id() {
        let mut w = sample_wire();
        w.user_id = "x".repeat(65);
        assert!(matches!(
            ActivityEvent::from_wire(w),
            Err(EngineError::SchemaError(_))
        ));
    }

    #[test]
    fn unknown_enum_tag_rejected_by_serde() {
        let json = r#"{
            "event_id": "E1", "user_id": "u1", "kind": "teleport",
            "platform": "instagram", "timestamp": "2024-01-01T00:00:00Z",
            "content": null,
            "device": {"fingerprint_hex": "ab", "primary": true},
            "network_descriptor": {"country": "USA", "connection_type": "residential"}
        }"#;
        let parsed: Result<ActivityEventWire, _> = serde_json::from_str(json);
        assert!(parsed.is_err());
    }
}
