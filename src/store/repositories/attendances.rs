use anyhow::{Context, Result};
use rusqlite::{params, Row};
use uuid::Uuid;

use crate::store::{connection::Database, helpers::parse_datetime, models::AttendanceRecord};

fn row_to_attendance(row: &Row) -> Result<AttendanceRecord> {
    let timestamp: String = row.get("timestamp")?;

    Ok(AttendanceRecord {
        id: Some(row.get("id")?),
        talk: row.get("talk")?,
        date: row.get("date")?,
        national_id: row.get("national_id")?,
        email: row.get("email")?,
        timestamp: parse_datetime(&timestamp, "timestamp")?,
    })
}

impl Database {
    /// Appends to the attendance log and returns the new record id.
    /// No deduplication happens here.
    pub async fn insert_attendance(&self, record: &AttendanceRecord) -> Result<String> {
        let record = record.clone();
        self.execute(move |conn| {
            let id = Uuid::new_v4().to_string();
            conn.execute(
                "INSERT INTO attendances (id, talk, date, national_id, email, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    id,
                    record.talk,
                    record.date,
                    record.national_id,
                    record.email,
                    record.timestamp.to_rfc3339(),
                ],
            )
            .with_context(|| "failed to insert attendance")?;
            Ok(id)
        })
        .await
    }

    /// Whole attendance log, newest first.
    pub async fn get_attendances(&self) -> Result<Vec<AttendanceRecord>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, talk, date, national_id, email, timestamp
                 FROM attendances
                 ORDER BY timestamp DESC",
            )?;

            let mut rows = stmt.query([])?;
            let mut records = Vec::new();
            while let Some(row) = rows.next()? {
                records.push(row_to_attendance(row)?);
            }

            Ok(records)
        })
        .await
    }
}
