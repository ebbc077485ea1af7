mod attendances;
mod attendees;

use anyhow::Result;
use async_trait::async_trait;

use super::{AttendanceRecord, AttendanceStore, AttendeeMarker, CreateOutcome, Database};

#[async_trait]
impl AttendanceStore for Database {
    async fn read_attendee(&self, event_id: &str, user_id: &str) -> Result<Option<AttendeeMarker>> {
        self.get_attendee(event_id, user_id).await
    }

    async fn create_attendee_if_absent(
        &self,
        event_id: &str,
        marker: &AttendeeMarker,
    ) -> Result<CreateOutcome> {
        self.insert_attendee_if_absent(event_id, marker).await
    }

    async fn remove_attendee(&self, event_id: &str, user_id: &str) -> Result<bool> {
        self.delete_attendee(event_id, user_id).await
    }

    async fn append_attendance(&self, record: &AttendanceRecord) -> Result<String> {
        self.insert_attendance(record).await
    }

    async fn list_attendances(&self) -> Result<Vec<AttendanceRecord>> {
        self.get_attendances().await
    }

    async fn count_attendees(&self, event_id: &str) -> Result<u64> {
        self.get_attendee_count(event_id).await
    }

    async fn events_for_user(&self, user_id: &str) -> Result<Vec<String>> {
        self.get_events_for_user(user_id).await
    }
}
