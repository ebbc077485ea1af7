use anyhow::{Context, Result};
use rusqlite::{params, Row};

use crate::store::{
    connection::Database,
    helpers::{parse_datetime, to_u64},
    models::{AttendeeMarker, CreateOutcome},
};

fn row_to_marker(row: &Row) -> Result<AttendeeMarker> {
    let registered_at: String = row.get("registered_at")?;

    Ok(AttendeeMarker {
        user_id: row.get("user_id")?,
        registered_at: parse_datetime(&registered_at, "registered_at")?,
    })
}

impl Database {
    pub async fn get_attendee(&self, event_id: &str, user_id: &str) -> Result<Option<AttendeeMarker>> {
        let event_id = event_id.to_string();
        let user_id = user_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT user_id, registered_at
                 FROM event_attendees
                 WHERE event_id = ?1 AND user_id = ?2",
            )?;

            let mut rows = stmt.query(params![event_id, user_id])?;
            match rows.next()? {
                Some(row) => Ok(Some(row_to_marker(row)?)),
                None => Ok(None),
            }
        })
        .await
    }

    /// Adds `marker` to the event's attendee set unless the user is already
    /// in it. The check and the write are a single statement.
    pub async fn insert_attendee_if_absent(
        &self,
        event_id: &str,
        marker: &AttendeeMarker,
    ) -> Result<CreateOutcome> {
        let event_id = event_id.to_string();
        let marker = marker.clone();
        self.execute(move |conn| {
            let inserted = conn
                .execute(
                    "INSERT INTO event_attendees (event_id, user_id, registered_at)
                     VALUES (?1, ?2, ?3)
                     ON CONFLICT(event_id, user_id) DO NOTHING",
                    params![event_id, marker.user_id, marker.registered_at.to_rfc3339()],
                )
                .with_context(|| "failed to insert attendee")?;

            Ok(if inserted == 0 {
                CreateOutcome::AlreadyExists
            } else {
                CreateOutcome::Created
            })
        })
        .await
    }

    pub async fn delete_attendee(&self, event_id: &str, user_id: &str) -> Result<bool> {
        let event_id = event_id.to_string();
        let user_id = user_id.to_string();
        self.execute(move |conn| {
            let deleted = conn
                .execute(
                    "DELETE FROM event_attendees WHERE event_id = ?1 AND user_id = ?2",
                    params![event_id, user_id],
                )
                .with_context(|| "failed to delete attendee")?;
            Ok(deleted > 0)
        })
        .await
    }

    pub async fn get_attendee_count(&self, event_id: &str) -> Result<u64> {
        let event_id = event_id.to_string();
        self.execute(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM event_attendees WHERE event_id = ?1",
                params![event_id],
                |row| row.get(0),
            )?;
            to_u64(count, "attendee count")
        })
        .await
    }

    /// Events whose attendee set contains `user_id`, earliest registration first.
    pub async fn get_events_for_user(&self, user_id: &str) -> Result<Vec<String>> {
        let user_id = user_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT event_id
                 FROM event_attendees
                 WHERE user_id = ?1
                 ORDER BY registered_at ASC, event_id ASC",
            )?;

            let events = stmt
                .query_map(params![user_id], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;

            Ok(events)
        })
        .await
    }
}
