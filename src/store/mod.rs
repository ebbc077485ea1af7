//! Attendance storage.
//!
//! [`AttendanceStore`] is what the registrar talks to. [`Database`] is the
//! SQLite implementation shipped with the crate.

pub mod connection;
mod helpers;
mod migrations;
pub mod models;
mod repositories;

use anyhow::Result;
use async_trait::async_trait;

pub use connection::Database;
pub use models::{AttendanceRecord, AttendeeMarker, CreateOutcome};

#[async_trait]
pub trait AttendanceStore: Send + Sync {
    async fn read_attendee(&self, event_id: &str, user_id: &str) -> Result<Option<AttendeeMarker>>;

    /// Atomic create-if-absent on the `(event_id, marker.user_id)` key.
    async fn create_attendee_if_absent(
        &self,
        event_id: &str,
        marker: &AttendeeMarker,
    ) -> Result<CreateOutcome>;

    /// Drops the user from the event's attendee set. Returns whether an
    /// entry was removed.
    async fn remove_attendee(&self, event_id: &str, user_id: &str) -> Result<bool>;

    /// Appends to the attendance log, returning the assigned id.
    async fn append_attendance(&self, record: &AttendanceRecord) -> Result<String>;

    async fn list_attendances(&self) -> Result<Vec<AttendanceRecord>>;

    async fn count_attendees(&self, event_id: &str) -> Result<u64>;

    async fn events_for_user(&self, user_id: &str) -> Result<Vec<String>>;
}
