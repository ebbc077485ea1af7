//! Attendance registration against the shared store.

use chrono::{DateTime, Utc};
use log::{error, info};
use serde::{Deserialize, Serialize};

use crate::error::{IntakeError, Result};
use crate::payload::AttendancePayload;
use crate::store::{AttendanceRecord, AttendanceStore, AttendeeMarker, CreateOutcome};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "camelCase")]
pub enum RegistrationOutcome {
    Registered,
    AlreadyRegistered,
    Failed(String),
}

/// Writes attendance through an [`AttendanceStore`].
///
/// Nothing is cached between calls; every registration re-reads the store.
#[derive(Clone)]
pub struct Registrar<S> {
    store: S,
}

impl<S: AttendanceStore> Registrar<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Adds `user_id` to the event's attendee set.
    ///
    /// Uses the store's create-if-absent primitive, so two devices scanning
    /// the same attendee concurrently yield exactly one `Registered`.
    pub async fn register_event_attendance(
        &self,
        event_id: &str,
        user_id: &str,
    ) -> RegistrationOutcome {
        let marker = AttendeeMarker {
            user_id: user_id.to_string(),
            registered_at: Utc::now(),
        };

        match self.store.create_attendee_if_absent(event_id, &marker).await {
            Ok(CreateOutcome::Created) => {
                info!("registered {user_id} for event {event_id}");
                RegistrationOutcome::Registered
            }
            Ok(CreateOutcome::AlreadyExists) => {
                info!("{user_id} already registered for event {event_id}");
                RegistrationOutcome::AlreadyRegistered
            }
            Err(err) => {
                error!("failed to register {user_id} for event {event_id}: {err:?}");
                RegistrationOutcome::Failed(format!("{err:#}"))
            }
        }
    }

    /// Undoes a registration whose attendance could not be logged, so a
    /// rescan is not turned away as `AlreadyRegistered`.
    pub async fn withdraw_event_attendance(&self, event_id: &str, user_id: &str) -> Result<bool> {
        let removed = self
            .store
            .remove_attendee(event_id, user_id)
            .await
            .map_err(IntakeError::store)?;
        if removed {
            info!("withdrew {user_id} from event {event_id}");
        }
        Ok(removed)
    }

    /// Appends one record to the attendance log. No dedupe at this layer.
    pub async fn log_attendance(
        &self,
        payload: &AttendancePayload,
        captured_at: DateTime<Utc>,
    ) -> Result<AttendanceRecord> {
        let mut record = AttendanceRecord::from_payload(payload, captured_at);

        let id = self.store.append_attendance(&record).await.map_err(|err| {
            error!("failed to log attendance for talk '{}': {err:?}", payload.talk);
            IntakeError::store(err)
        })?;

        info!("logged attendance {id} for talk '{}'", record.talk);
        record.id = Some(id);
        Ok(record)
    }

    pub async fn is_registered(&self, event_id: &str, user_id: &str) -> Result<bool> {
        self.store
            .read_attendee(event_id, user_id)
            .await
            .map(|marker| marker.is_some())
            .map_err(IntakeError::store)
    }

    pub async fn attendee_count(&self, event_id: &str) -> Result<u64> {
        self.store
            .count_attendees(event_id)
            .await
            .map_err(IntakeError::store)
    }

    pub async fn registered_events(&self, user_id: &str) -> Result<Vec<String>> {
        self.store
            .events_for_user(user_id)
            .await
            .map_err(IntakeError::store)
    }

    /// Every logged attendance, newest first.
    pub async fn attendance_log(&self) -> Result<Vec<AttendanceRecord>> {
        self.store
            .list_attendances()
            .await
            .map_err(IntakeError::store)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use anyhow::anyhow;
    use async_trait::async_trait;

    use super::*;
    use crate::store::Database;

    fn payload() -> AttendancePayload {
        AttendancePayload {
            talk: "Intro to Rust".into(),
            date: "2025-03-01".into(),
            national_id: "12345678-9".into(),
            email: "a@b.com".into(),
        }
    }

    struct UnreachableStore;

    #[async_trait]
    impl AttendanceStore for UnreachableStore {
        async fn read_attendee(&self, _: &str, _: &str) -> anyhow::Result<Option<AttendeeMarker>> {
            Err(anyhow!("connection refused"))
        }

        async fn create_attendee_if_absent(
            &self,
            _: &str,
            _: &AttendeeMarker,
        ) -> anyhow::Result<CreateOutcome> {
            Err(anyhow!("connection refused"))
        }

        async fn remove_attendee(&self, _: &str, _: &str) -> anyhow::Result<bool> {
            Err(anyhow!("connection refused"))
        }

        async fn append_attendance(&self, _: &AttendanceRecord) -> anyhow::Result<String> {
            Err(anyhow!("write rejected"))
        }

        async fn list_attendances(&self) -> anyhow::Result<Vec<AttendanceRecord>> {
            Err(anyhow!("connection refused"))
        }

        async fn count_attendees(&self, _: &str) -> anyhow::Result<u64> {
            Err(anyhow!("connection refused"))
        }

        async fn events_for_user(&self, _: &str) -> anyhow::Result<Vec<String>> {
            Err(anyhow!("connection refused"))
        }
    }

    #[tokio::test]
    async fn second_registration_is_already_registered() {
        let registrar = Registrar::new(Database::in_memory().unwrap());

        assert_eq!(
            registrar.register_event_attendance("evt", "user-1").await,
            RegistrationOutcome::Registered
        );
        assert_eq!(
            registrar.register_event_attendance("evt", "user-1").await,
            RegistrationOutcome::AlreadyRegistered
        );
        assert_eq!(registrar.attendee_count("evt").await.unwrap(), 1);
        assert!(registrar.is_registered("evt", "user-1").await.unwrap());
        assert!(!registrar.is_registered("evt", "user-2").await.unwrap());
        assert_eq!(registrar.registered_events("user-1").await.unwrap(), vec!["evt"]);
    }

    #[tokio::test]
    async fn concurrent_registrations_yield_one_winner() {
        let registrar = Arc::new(Registrar::new(Database::in_memory().unwrap()));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let registrar = Arc::clone(&registrar);
            handles.push(tokio::spawn(async move {
                registrar.register_event_attendance("evt", "same-user").await
            }));
        }

        let mut registered = 0;
        for handle in handles {
            match handle.await.unwrap() {
                RegistrationOutcome::Registered => registered += 1,
                RegistrationOutcome::AlreadyRegistered => {}
                RegistrationOutcome::Failed(reason) => panic!("unexpected failure: {reason}"),
            }
        }

        assert_eq!(registered, 1);
        assert_eq!(registrar.attendee_count("evt").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn logging_stamps_and_assigns_id() {
        let registrar = Registrar::new(Database::in_memory().unwrap());
        let captured_at = Utc::now();

        let record = registrar.log_attendance(&payload(), captured_at).await.unwrap();
        assert!(record.id.is_some());
        assert_eq!(record.timestamp, captured_at);
        assert_eq!(record.talk, "Intro to Rust");

        let log = registrar.attendance_log().await.unwrap();
        assert_eq!(log, vec![record]);
    }

    #[tokio::test]
    async fn store_failures_are_surfaced() {
        let registrar = Registrar::new(UnreachableStore);

        match registrar.register_event_attendance("evt", "user").await {
            RegistrationOutcome::Failed(reason) => assert!(reason.contains("connection refused")),
            other => panic!("expected failure, got {other:?}"),
        }

        let err = registrar.log_attendance(&payload(), Utc::now()).await.unwrap_err();
        assert_eq!(err, IntakeError::StoreUnavailable("write rejected".into()));
        assert!(registrar.is_registered("evt", "user").await.is_err());
        assert!(registrar.withdraw_event_attendance("evt", "user").await.is_err());
    }

    #[tokio::test]
    async fn withdrawn_attendee_registers_again() {
        let registrar = Registrar::new(Database::in_memory().unwrap());
        registrar.register_event_attendance("evt", "user-1").await;

        assert!(registrar.withdraw_event_attendance("evt", "user-1").await.unwrap());
        assert!(!registrar.is_registered("evt", "user-1").await.unwrap());
        assert_eq!(
            registrar.register_event_attendance("evt", "user-1").await,
            RegistrationOutcome::Registered
        );
    }
}
