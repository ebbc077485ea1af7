use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use crate::error::{IntakeError, Result};
use crate::geometry::CaptureZone;

use super::{ScanSession, Sensor};

/// A device's barcode sensor, shared by every scan session opened on it.
///
/// At most one session may be scanning at a time; a second `start` fails with
/// [`IntakeError::SessionBusy`] instead of racing the first.
#[derive(Clone)]
pub struct ScannerDevice {
    sensor: Arc<dyn Sensor>,
    busy: Arc<AtomicBool>,
}

impl ScannerDevice {
    pub fn new(sensor: Arc<dyn Sensor>) -> Self {
        Self {
            sensor,
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn open_session(&self, zone: Option<CaptureZone>) -> ScanSession {
        ScanSession::new(self.clone(), zone)
    }

    pub fn sensor(&self) -> Arc<dyn Sensor> {
        Arc::clone(&self.sensor)
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub(crate) fn claim(&self) -> Result<DeviceClaim> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| IntakeError::SessionBusy)?;

        Ok(DeviceClaim {
            busy: Arc::clone(&self.busy),
            held: Arc::new(AtomicBool::new(true)),
        })
    }
}

/// Exclusive hold on the sensor; released on drop.
pub(crate) struct DeviceClaim {
    busy: Arc<AtomicBool>,
    held: Arc<AtomicBool>,
}

impl DeviceClaim {
    /// Flag that stays true until this particular claim is released, even if
    /// the device is claimed again afterwards.
    pub(crate) fn held_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.held)
    }
}

impl Drop for DeviceClaim {
    fn drop(&mut self) {
        self.held.store(false, Ordering::Release);
        self.busy.store(false, Ordering::Release);
    }
}
