use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::geometry::{self, CaptureZone};

use super::device::DeviceClaim;
use super::sensor::{Detection, Sensor};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

/// Consumes the detection feed until one detection lands inside the capture
/// zone, the feed ends, or the session is cancelled.
///
/// On every exit path the sensor is stopped and the device claim released
/// before the accepted detection (if any) is handed to the session.
pub(crate) async fn detection_listener(
    mut feed: mpsc::Receiver<Detection>,
    zone: Option<CaptureZone>,
    sensor: Arc<dyn Sensor>,
    claim: DeviceClaim,
    accepted_tx: oneshot::Sender<Detection>,
    cancel_token: CancellationToken,
) {
    let accepted = loop {
        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => {
                log_info!("detection listener cancelled");
                break None;
            }
            next = feed.recv() => match next {
                Some(detection) => {
                    if geometry::accepts(zone.as_ref(), &detection.corners) {
                        log_info!("detection accepted ({} bytes)", detection.raw_text.len());
                        break Some(detection);
                    }
                    log_warn!("detection outside capture zone, ignoring");
                }
                None => {
                    log_warn!("sensor closed the detection feed");
                    break None;
                }
            }
        }
    };

    feed.close();
    let mut stragglers = 0usize;
    while feed.try_recv().is_ok() {
        stragglers += 1;
    }
    if stragglers > 0 {
        log_debug!("discarded {stragglers} detection(s) delivered after close");
    }

    if let Err(err) = sensor.stop().await {
        log_error!("failed to stop sensor: {err:?}");
    }
    drop(claim);

    if let Some(detection) = accepted {
        if accepted_tx.send(detection).is_err() {
            log_warn!("scan session dropped before receiving its detection");
        }
    }
}
