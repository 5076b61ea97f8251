// Common Crate - messages.rs
// Wire events exchanged over a realtime connection.
//
// Every frame is `{"event": <name>, "data": <payload>}`.
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::geo::Coordinates;
use crate::models::{EnvironmentalData, Identity, LocationSample, Resource};

/// Shared channel every joined connection subscribes to
pub const REALTIME_CHANNEL: &str = "realtime";

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("unknown event: {0}")]
    UnknownEvent(String),
}

#[derive(Debug, Deserialize)]
struct Frame {
    event: String,
    #[serde(default)]
    data: Value,
}

/// Inbound event from a client
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    Join(JoinPayload),
    LocationUpdate(LocationPayload),
    SosAlert(SosAlertPayload),
    SosResolve,
}

impl ClientEvent {
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let frame: Frame = serde_json::from_str(text)?;
        let data = match frame.data {
            Value::Null => Value::Object(Default::default()),
            other => other,
        };

        match frame.event.as_str() {
            "join" => Ok(Self::Join(serde_json::from_value(data)?)),
            "location_update" => Ok(Self::LocationUpdate(serde_json::from_value(data)?)),
            "sos_alert" => Ok(Self::SosAlert(serde_json::from_value(data)?)),
            "sos_resolve" => Ok(Self::SosResolve),
            other => Err(ProtocolError::UnknownEvent(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct JoinPayload {
    #[serde(default)]
    pub user: Option<UserPayload>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct UserPayload {
    pub id: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
}

impl JoinPayload {
    pub fn into_identity(self, session_id: Uuid) -> Identity {
        let user = self.user.unwrap_or_default();
        Identity::from_parts(session_id, user.id, user.name, user.email)
    }
}

/// Raw location fields. Numbers and numeric strings are both accepted.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct LocationPayload {
    pub lat: Value,
    pub lng: Value,
    pub ts: Value,
    pub accuracy: Value,
}

/// Latest accepted sample timestamp (9999-12-31T23:59:59Z)
pub const MAX_TIMESTAMP_SECS: i64 = 253_402_300_799;

/// Outcome of interpreting a location payload
#[derive(Debug, Clone, PartialEq)]
pub enum LocationInput {
    Sample(LocationSample),
    /// Client reports it has no position
    Cleared,
    /// Dropped without any broadcast
    Invalid,
}

impl LocationPayload {
    pub fn interpret(&self, now: i64) -> LocationInput {
        if self.lat.is_null() || self.lng.is_null() {
            return LocationInput::Cleared;
        }

        let (Some(lat), Some(lng)) = (numeric(&self.lat), numeric(&self.lng)) else {
            return LocationInput::Invalid;
        };

        // Zero counts as "not sent", like null
        let timestamp = match &self.ts {
            Value::Null => now,
            other => match numeric(other).map(f64::trunc) {
                Some(ts) if ts == 0.0 => now,
                Some(ts) if (0.0..=MAX_TIMESTAMP_SECS as f64).contains(&ts) => ts as i64,
                _ => return LocationInput::Invalid,
            },
        };

        let accuracy = match &self.accuracy {
            Value::Null => None,
            other => match numeric(other) {
                Some(acc) => Some(acc),
                None => return LocationInput::Invalid,
            },
        };

        LocationInput::Sample(LocationSample::new(lat, lng, timestamp, accuracy))
    }
}

/// Position a client may attach to `sos_alert`; only used when nothing is tracked
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SosAlertPayload {
    pub lat: Value,
    pub lng: Value,
}

impl SosAlertPayload {
    pub fn position(&self) -> Option<Coordinates> {
        Some(Coordinates::new(numeric(&self.lat)?, numeric(&self.lng)?))
    }
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|v| v.is_finite())
}

/// Entry of the `presence` snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PresenceUser {
    pub session_id: Uuid,
    pub id: String,
    pub name: String,
    pub contact: Option<String>,
    pub location: Option<LocationSample>,
}

/// Entry of the `locations_update` snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationEntry {
    pub session_id: Uuid,
    pub name: String,
    pub lat: f64,
    pub lng: f64,
    pub ts: i64,
    pub accuracy: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SosStarted {
    pub sos_id: String,
    pub message: String,
    pub resources: Vec<Resource>,
    pub safe_zones: Vec<Resource>,
    pub environmental_data: EnvironmentalData,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SosResolvedFinal {
    pub sos_id: String,
    pub message: String,
    pub footprint_estimate: f64,
    pub duration_minutes: f64,
    pub sample_count: usize,
}

/// Outbound event to a client
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    Presence { users: Vec<PresenceUser> },
    LocationsUpdate(Vec<LocationEntry>),
    SosLocation(LocationSample),
    SosStarted(SosStarted),
    SosResolved { sos_id: String, message: String },
    SosResolvedFinal(SosResolvedFinal),
    SosError { message: String },
}

impl ServerEvent {
    pub fn error(message: impl Into<String>) -> Self {
        Self::SosError {
            message: message.into(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Presence { .. } => "presence",
            Self::LocationsUpdate(_) => "locations_update",
            Self::SosLocation(_) => "sos_location",
            Self::SosStarted(_) => "sos_started",
            Self::SosResolved { .. } => "sos_resolved",
            Self::SosResolvedFinal(_) => "sos_resolved_final",
            Self::SosError { .. } => "sos_error",
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
