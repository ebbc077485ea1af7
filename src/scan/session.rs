use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use serde::{Deserialize, Serialize};
use tokio::{sync::oneshot, task::JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::error::{IntakeError, Result};
use crate::geometry::CaptureZone;

use super::device::{DeviceClaim, ScannerDevice};
use super::listener::detection_listener;
use super::sensor::{Detection, Permission};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ScanState {
    Idle,
    Scanning,
    Closed,
}

impl Default for ScanState {
    fn default() -> Self {
        ScanState::Idle
    }
}

/// One pass of the scanner: `Idle -> Scanning -> Closed`.
///
/// A session yields at most one accepted detection and cannot be restarted
/// once closed. Dropping a scanning session cancels it; the listener task
/// still stops the sensor and frees the device.
pub struct ScanSession {
    device: ScannerDevice,
    zone: Option<CaptureZone>,
    state: ScanState,
    cancel_token: CancellationToken,
    listener: Option<JoinHandle<()>>,
    accepted_rx: Option<oneshot::Receiver<Detection>>,
    /// Cleared by the listener when it releases the device.
    claim_held: Option<Arc<AtomicBool>>,
    torch_on: bool,
}

impl ScanSession {
    pub fn new(device: ScannerDevice, zone: Option<CaptureZone>) -> Self {
        Self {
            device,
            zone,
            state: ScanState::Idle,
            cancel_token: CancellationToken::new(),
            listener: None,
            accepted_rx: None,
            claim_held: None,
            torch_on: false,
        }
    }

    /// Ties the session to an outer dismiss signal; cancelling `parent`
    /// cancels the session.
    pub fn with_dismiss(mut self, parent: &CancellationToken) -> Self {
        self.cancel_token = parent.child_token();
        self
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    pub fn zone(&self) -> Option<&CaptureZone> {
        self.zone.as_ref()
    }

    /// Handle the UI can use to dismiss the scanner without a result.
    pub fn dismiss_handle(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Acquires the sensor and begins listening.
    ///
    /// If another session holds the device this fails with `SessionBusy` and
    /// the session stays `Idle`. Any later failure closes the session.
    pub async fn start(&mut self) -> Result<()> {
        match self.state {
            ScanState::Idle => {}
            ScanState::Scanning => return Err(IntakeError::SessionBusy),
            ScanState::Closed => return Err(IntakeError::SessionClosed),
        }

        let claim = self.device.claim()?;

        match self.acquire(claim).await {
            Ok(()) => {
                self.state = ScanState::Scanning;
                log_info!("scan session started");
                Ok(())
            }
            Err(err) => {
                self.state = ScanState::Closed;
                log_warn!("scan session failed to start: {err}");
                Err(err)
            }
        }
    }

    async fn acquire(&mut self, claim: DeviceClaim) -> Result<()> {
        let sensor = self.device.sensor();

        if !sensor.is_supported().await.map_err(IntakeError::sensor)? {
            return Err(IntakeError::SensorUnsupported);
        }

        let mut permission = sensor
            .check_permission()
            .await
            .map_err(IntakeError::sensor)?;
        if permission != Permission::Granted {
            log_info!("requesting camera permission");
            permission = sensor
                .request_permission()
                .await
                .map_err(IntakeError::sensor)?;
        }
        if permission != Permission::Granted {
            return Err(IntakeError::PermissionDenied);
        }

        let feed = match sensor.start(self.zone).await {
            Ok(feed) => feed,
            Err(err) => {
                if let Err(stop_err) = sensor.stop().await {
                    log_error!("failed to stop sensor after start error: {stop_err:?}");
                }
                return Err(IntakeError::sensor(err));
            }
        };

        self.claim_held = Some(claim.held_flag());
        let (accepted_tx, accepted_rx) = oneshot::channel();
        let handle = tokio::spawn(detection_listener(
            feed,
            self.zone,
            sensor,
            claim,
            accepted_tx,
            self.cancel_token.clone(),
        ));

        self.listener = Some(handle);
        self.accepted_rx = Some(accepted_rx);
        Ok(())
    }

    /// Waits for the first detection inside the capture zone.
    ///
    /// Returns `Ok(None)` if the session was dismissed or the sensor feed
    /// ended. Either way the session is `Closed` and the sensor released
    /// when this returns.
    pub async fn next_detection(&mut self) -> Result<Option<Detection>> {
        match self.state {
            ScanState::Idle => return Err(IntakeError::NotScanning),
            ScanState::Closed => return Err(IntakeError::SessionClosed),
            ScanState::Scanning => {}
        }

        let accepted_rx = self.accepted_rx.take().ok_or(IntakeError::NotScanning)?;
        let accepted = accepted_rx.await.ok();

        self.close().await?;
        Ok(accepted)
    }

    /// Signals dismissal. Safe from any task; `close` or `next_detection`
    /// completes the teardown.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    /// Moves to `Closed`, waiting until the sensor has been stopped.
    pub async fn close(&mut self) -> Result<()> {
        if self.state == ScanState::Closed && self.listener.is_none() {
            return Ok(());
        }

        self.cancel_token.cancel();
        self.state = ScanState::Closed;
        self.accepted_rx = None;
        self.claim_held = None;
        self.torch_on = false;

        if let Some(handle) = self.listener.take() {
            handle
                .await
                .map_err(|err| IntakeError::Sensor(format!("detection listener failed to join: {err}")))?;
        }

        log_info!("scan session closed");
        Ok(())
    }

    /// False once the listener has finished with the sensor, which can be
    /// before `next_detection` moves the session to `Closed`.
    fn holds_device(&self) -> bool {
        self.claim_held
            .as_ref()
            .is_some_and(|held| held.load(Ordering::Acquire))
    }

    pub async fn is_torch_available(&self) -> bool {
        self.device.sensor().is_torch_available().await
    }

    /// Flips the torch. Only valid while scanning; returns the new state.
    pub async fn toggle_torch(&mut self) -> Result<bool> {
        if self.state != ScanState::Scanning || !self.holds_device() {
            return Err(IntakeError::NotScanning);
        }

        let enabled = !self.torch_on;
        self.device
            .sensor()
            .set_torch(enabled)
            .await
            .map_err(IntakeError::sensor)?;
        self.torch_on = enabled;
        Ok(enabled)
    }
}

impl Drop for ScanSession {
    fn drop(&mut self) {
        if self.listener.is_some() {
            self.cancel_token.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::geometry::Quad;
    use crate::scan::ChannelSensor;

    fn detection(text: &str, min: f64, max: f64) -> Detection {
        Detection {
            raw_text: text.to_string(),
            corners: Quad::new([[min, min], [max, min], [max, max], [min, max]]),
        }
    }

    fn zone() -> Option<CaptureZone> {
        Some(CaptureZone::new(Quad::new([
            [0.0, 0.0],
            [100.0, 0.0],
            [100.0, 100.0],
            [0.0, 100.0],
        ])))
    }

    fn setup(sensor: ChannelSensor) -> (Arc<ChannelSensor>, ScannerDevice) {
        let sensor = Arc::new(sensor);
        let device = ScannerDevice::new(sensor.clone());
        (sensor, device)
    }

    #[tokio::test]
    async fn first_accepted_detection_wins() {
        let (sensor, device) = setup(ChannelSensor::new(Permission::Granted));
        let mut session = device.open_session(zone());
        session.start().await.unwrap();
        assert_eq!(session.state(), ScanState::Scanning);

        sensor.deliver(detection("first", 10.0, 20.0)).await;
        sensor.deliver(detection("second", 10.0, 20.0)).await;
        sensor.deliver(detection("third", 10.0, 20.0)).await;

        let accepted = session.next_detection().await.unwrap().unwrap();
        assert_eq!(accepted.raw_text, "first");
        assert_eq!(session.state(), ScanState::Closed);
        assert_eq!(sensor.stop_count(), 1);
        assert!(!sensor.is_running());
        assert!(!device.is_busy());

        assert_eq!(
            session.next_detection().await.unwrap_err(),
            IntakeError::SessionClosed
        );
        assert_eq!(session.start().await.unwrap_err(), IntakeError::SessionClosed);
    }

    #[tokio::test]
    async fn out_of_zone_detection_keeps_scanning() {
        let (sensor, device) = setup(ChannelSensor::new(Permission::Granted));
        let mut session = device.open_session(zone());
        session.start().await.unwrap();

        sensor.deliver(detection("too big", 10.0, 500.0)).await;
        sensor.deliver(detection("fits", 30.0, 60.0)).await;

        let accepted = session.next_detection().await.unwrap().unwrap();
        assert_eq!(accepted.raw_text, "fits");
    }

    #[tokio::test]
    async fn permission_requested_when_not_granted() {
        let (sensor, device) = setup(ChannelSensor::new(Permission::Denied));
        let mut session = device.open_session(None);
        session.start().await.unwrap();
        assert!(sensor.is_running());
        session.close().await.unwrap();
    }

    #[tokio::test]
    async fn refused_permission_closes_session() {
        let (sensor, device) = setup(ChannelSensor::new(Permission::Denied).deny_on_request());
        let mut session = device.open_session(None);

        assert_eq!(session.start().await.unwrap_err(), IntakeError::PermissionDenied);
        assert_eq!(session.state(), ScanState::Closed);
        assert_eq!(sensor.start_count(), 0);
        assert!(!device.is_busy());
    }

    #[tokio::test]
    async fn unsupported_sensor_closes_session() {
        let (_sensor, device) = setup(ChannelSensor::new(Permission::Granted).unsupported());
        let mut session = device.open_session(None);
        assert_eq!(session.start().await.unwrap_err(), IntakeError::SensorUnsupported);
        assert_eq!(session.state(), ScanState::Closed);
    }

    #[tokio::test]
    async fn dismiss_releases_sensor_without_result() {
        let (sensor, device) = setup(ChannelSensor::new(Permission::Granted));
        let mut session = device.open_session(zone());
        session.start().await.unwrap();

        session.dismiss_handle().cancel();
        assert_eq!(session.next_detection().await.unwrap(), None);
        assert_eq!(sensor.stop_count(), 1);
        assert!(!device.is_busy());
    }

    #[tokio::test]
    async fn second_session_on_busy_device_is_refused() {
        let (_sensor, device) = setup(ChannelSensor::new(Permission::Granted));
        let mut first = device.open_session(None);
        first.start().await.unwrap();

        let mut second = device.open_session(None);
        assert_eq!(second.start().await.unwrap_err(), IntakeError::SessionBusy);
        assert_eq!(second.state(), ScanState::Idle);

        first.close().await.unwrap();
        second.start().await.unwrap();
        second.close().await.unwrap();
    }

    #[tokio::test]
    async fn torch_only_while_scanning() {
        let (sensor, device) = setup(ChannelSensor::new(Permission::Granted).with_torch());
        let mut session = device.open_session(None);
        assert_eq!(session.toggle_torch().await.unwrap_err(), IntakeError::NotScanning);

        session.start().await.unwrap();
        assert!(session.is_torch_available().await);
        assert!(session.toggle_torch().await.unwrap());
        assert!(sensor.is_torch_on());
        assert!(!session.toggle_torch().await.unwrap());
        assert!(!sensor.is_torch_on());

        session.close().await.unwrap();
        assert_eq!(session.toggle_torch().await.unwrap_err(), IntakeError::NotScanning);
    }

    #[tokio::test]
    async fn torch_refused_once_listener_released_the_sensor() {
        let (sensor, device) = setup(ChannelSensor::new(Permission::Granted).with_torch());
        let mut session = device.open_session(zone());
        session.start().await.unwrap();

        sensor.deliver(detection("hit", 10.0, 20.0)).await;
        for _ in 0..50 {
            if !device.is_busy() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(!device.is_busy());
        assert_eq!(session.state(), ScanState::Scanning);

        let mut other = device.open_session(None);
        other.start().await.unwrap();

        assert_eq!(session.toggle_torch().await.unwrap_err(), IntakeError::NotScanning);
        assert!(!sensor.is_torch_on());

        assert_eq!(session.next_detection().await.unwrap().unwrap().raw_text, "hit");
        other.close().await.unwrap();
    }

    #[tokio::test]
    async fn dropping_a_scanning_session_frees_the_device() {
        let (sensor, device) = setup(ChannelSensor::new(Permission::Granted));
        {
            let mut session = device.open_session(None);
            session.start().await.unwrap();
        }

        for _ in 0..50 {
            if !device.is_busy() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(!device.is_busy());
        assert_eq!(sensor.stop_count(), 1);
    }
}
