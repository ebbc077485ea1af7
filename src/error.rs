//! Failure taxonomy for the intake pipeline.
//!
//! Detections outside the capture zone and repeat registrations are not
//! errors: the first is dropped silently, the second is a
//! [`RegistrationOutcome`](crate::registrar::RegistrationOutcome).

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IntakeError {
    /// Camera access refused by the user
    #[error("camera permission denied")]
    PermissionDenied,

    /// Device has no usable barcode sensor
    #[error("barcode scanning is not supported on this device")]
    SensorUnsupported,

    /// Another scan session already holds the sensor
    #[error("a scan session is already active on this device")]
    SessionBusy,

    /// Session already reached its terminal state
    #[error("scan session is closed")]
    SessionClosed,

    /// Operation requires an active scan
    #[error("scan session is not scanning")]
    NotScanning,

    /// Sensor collaborator failed
    #[error("sensor error: {0}")]
    Sensor(String),

    /// QR text did not match the expected four-line format
    #[error("malformed attendance payload")]
    MalformedPayload,

    /// Remote store unreachable or write rejected
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
}

impl IntakeError {
    pub(crate) fn sensor(err: anyhow::Error) -> Self {
        Self::Sensor(format!("{err:#}"))
    }

    pub(crate) fn store(err: anyhow::Error) -> Self {
        Self::StoreUnavailable(format!("{err:#}"))
    }
}

pub type Result<T> = std::result::Result<T, IntakeError>;
