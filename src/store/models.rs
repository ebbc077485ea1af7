//! Persisted attendance entities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::payload::AttendancePayload;

/// One entry of the flat attendance log. Never updated once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    /// Assigned by the store on append.
    pub id: Option<String>,
    pub talk: String,
    pub date: String,
    pub national_id: String,
    pub email: String,
    pub timestamp: DateTime<Utc>,
}

impl AttendanceRecord {
    pub fn from_payload(payload: &AttendancePayload, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: None,
            talk: payload.talk.clone(),
            date: payload.date.clone(),
            national_id: payload.national_id.clone(),
            email: payload.email.clone(),
            timestamp,
        }
    }
}

/// Membership entry in an event's attendee set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendeeMarker {
    pub user_id: String,
    pub registered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CreateOutcome {
    Created,
    AlreadyExists,
}
