//! Scan → decode → register, reported once to the presentation layer.

use std::sync::Arc;

use chrono::Utc;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::IntakeError;
use crate::geometry::CaptureZone;
use crate::payload::{self, AttendancePayload};
use crate::registrar::{Registrar, RegistrationOutcome};
use crate::scan::{Detection, ScannerDevice};
use crate::store::{AttendanceRecord, AttendanceStore};

/// UI capabilities handed to the orchestrator instead of global controllers.
pub trait Presenter: Send + Sync {
    /// Scanner closed, with the accepted detection if there was one. Not
    /// called when the run never got the device.
    fn dismiss_scanner(&self, detection: Option<&Detection>);

    /// Terminal outcome of the run.
    fn present(&self, outcome: &IntakeOutcome);
}

impl<P: Presenter + ?Sized> Presenter for Arc<P> {
    fn dismiss_scanner(&self, detection: Option<&Detection>) {
        (**self).dismiss_scanner(detection)
    }

    fn present(&self, outcome: &IntakeOutcome) {
        (**self).present(outcome)
    }
}

/// Event an intake run registers attendance against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventScope {
    pub event_id: String,
    /// Self check-in: the signed-in user is the attendee. When unset the
    /// decoded national id is used.
    pub acting_user: Option<String>,
}

impl EventScope {
    fn attendee_for<'a>(&'a self, payload: &'a AttendancePayload) -> &'a str {
        self.acting_user.as_deref().unwrap_or(&payload.national_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Severity {
    Success,
    Warning,
    Danger,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum IntakeOutcome {
    Recorded { record: AttendanceRecord },
    AlreadyRegistered { event_id: String, attendee: String },
    EmptyScan,
    InvalidFormat,
    PermissionDenied,
    ScannerBusy,
    ScannerUnavailable { reason: String },
    StoreUnavailable { reason: String },
    Cancelled,
}

impl IntakeOutcome {
    pub fn message(&self) -> String {
        match self {
            IntakeOutcome::Recorded { .. } => "Attendance registered successfully.".into(),
            IntakeOutcome::AlreadyRegistered { .. } => {
                "Already registered for this event.".into()
            }
            IntakeOutcome::EmptyScan => "No scanned data.".into(),
            IntakeOutcome::InvalidFormat => "Invalid QR format.".into(),
            IntakeOutcome::PermissionDenied => "Camera permission denied.".into(),
            IntakeOutcome::ScannerBusy => "Another scan is already in progress.".into(),
            IntakeOutcome::ScannerUnavailable { reason } => {
                format!("Scanner unavailable: {reason}")
            }
            IntakeOutcome::StoreUnavailable { .. } => "Error saving attendance.".into(),
            IntakeOutcome::Cancelled => "Scan cancelled.".into(),
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            IntakeOutcome::Recorded { .. } => Severity::Success,
            IntakeOutcome::AlreadyRegistered { .. }
            | IntakeOutcome::EmptyScan
            | IntakeOutcome::ScannerBusy
            | IntakeOutcome::Cancelled => Severity::Warning,
            IntakeOutcome::InvalidFormat
            | IntakeOutcome::PermissionDenied
            | IntakeOutcome::ScannerUnavailable { .. }
            | IntakeOutcome::StoreUnavailable { .. } => Severity::Danger,
        }
    }
}

impl From<IntakeError> for IntakeOutcome {
    fn from(err: IntakeError) -> Self {
        match err {
            IntakeError::PermissionDenied => IntakeOutcome::PermissionDenied,
            IntakeError::SessionBusy => IntakeOutcome::ScannerBusy,
            IntakeError::MalformedPayload => IntakeOutcome::InvalidFormat,
            IntakeError::StoreUnavailable(reason) => IntakeOutcome::StoreUnavailable { reason },
            other @ (IntakeError::SensorUnsupported
            | IntakeError::SessionClosed
            | IntakeError::NotScanning
            | IntakeError::Sensor(_)) => IntakeOutcome::ScannerUnavailable {
                reason: other.to_string(),
            },
        }
    }
}

pub struct IntakeOrchestrator<S, P> {
    device: ScannerDevice,
    zone: Option<CaptureZone>,
    registrar: Registrar<S>,
    presenter: P,
}

impl<S, P> IntakeOrchestrator<S, P>
where
    S: AttendanceStore,
    P: Presenter,
{
    pub fn new(
        device: ScannerDevice,
        zone: Option<CaptureZone>,
        registrar: Registrar<S>,
        presenter: P,
    ) -> Self {
        Self {
            device,
            zone,
            registrar,
            presenter,
        }
    }

    pub fn registrar(&self) -> &Registrar<S> {
        &self.registrar
    }

    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    /// Runs one intake. Cancelling `dismiss` before a detection is accepted
    /// ends the run with `Cancelled` and touches no storage. Failures are
    /// reported once; nothing is retried.
    pub async fn run(&self, scope: Option<&EventScope>, dismiss: &CancellationToken) -> IntakeOutcome {
        let outcome = self.process(scope, dismiss).await;
        info!("intake finished: {:?}", outcome.severity());
        self.presenter.present(&outcome);
        outcome
    }

    async fn process(&self, scope: Option<&EventScope>, dismiss: &CancellationToken) -> IntakeOutcome {
        let detection = match self.scan(dismiss).await {
            Ok(Some(detection)) => detection,
            Ok(None) => return IntakeOutcome::Cancelled,
            Err(err) => return err.into(),
        };

        if detection.raw_text.trim().is_empty() {
            return IntakeOutcome::EmptyScan;
        }

        let payload = match decode_detection(&detection) {
            Ok(payload) => payload,
            Err(err) => {
                warn!("rejected scanned payload: {err}");
                return err.into();
            }
        };
        let captured_at = Utc::now();

        if dismiss.is_cancelled() {
            return IntakeOutcome::Cancelled;
        }

        let mut registered = None;
        if let Some(scope) = scope {
            let attendee = scope.attendee_for(&payload);
            match self
                .registrar
                .register_event_attendance(&scope.event_id, attendee)
                .await
            {
                RegistrationOutcome::Registered => registered = Some((scope, attendee)),
                RegistrationOutcome::AlreadyRegistered => {
                    return IntakeOutcome::AlreadyRegistered {
                        event_id: scope.event_id.clone(),
                        attendee: attendee.to_string(),
                    };
                }
                RegistrationOutcome::Failed(reason) => {
                    return IntakeOutcome::StoreUnavailable { reason };
                }
            }
        }

        match self.registrar.log_attendance(&payload, captured_at).await {
            Ok(record) => IntakeOutcome::Recorded { record },
            Err(err) => {
                // a mark without a log entry would turn every rescan away
                if let Some((scope, attendee)) = registered {
                    if let Err(undo_err) = self
                        .registrar
                        .withdraw_event_attendance(&scope.event_id, attendee)
                        .await
                    {
                        error!(
                            "could not withdraw {attendee} from event {} after failed log: {undo_err}",
                            scope.event_id
                        );
                    }
                }
                err.into()
            }
        }
    }

    async fn scan(&self, dismiss: &CancellationToken) -> Result<Option<Detection>, IntakeError> {
        let mut session = self.device.open_session(self.zone).with_dismiss(dismiss);

        let result = match session.start().await {
            Ok(()) => session.next_detection().await,
            Err(err) => Err(err),
        };
        if let Err(err) = session.close().await {
            warn!("scan session teardown failed: {err}");
        }

        match &result {
            Ok(detection) => self.presenter.dismiss_scanner(detection.as_ref()),
            Err(IntakeError::SessionBusy) => {}
            Err(_) => self.presenter.dismiss_scanner(None),
        }
        result
    }
}

fn decode_detection(detection: &Detection) -> Result<AttendancePayload, IntakeError> {
    payload::decode(&detection.raw_text).ok_or(IntakeError::MalformedPayload)
}
