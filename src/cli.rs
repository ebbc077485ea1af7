//! Console front end: replays detections from stdin and prints the outcome.

use std::sync::Arc;

use anyhow::{Context, Result};
use log::{info, warn};
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt},
    time::{sleep, Duration},
};
use tokio_util::sync::CancellationToken;

use crate::intake::{IntakeOutcome, Presenter};
use crate::scan::{ChannelSensor, Detection};

const SENSOR_POLL_MS: u64 = 10;

/// Writes scanner and outcome events to stdout.
pub struct ConsolePresenter;

impl Presenter for ConsolePresenter {
    fn dismiss_scanner(&self, detection: Option<&Detection>) {
        match detection {
            Some(detection) => info!("scanner closed with code: {:?}", detection.raw_text),
            None => warn!("scanner closed without a valid code"),
        }
    }

    fn present(&self, outcome: &IntakeOutcome) {
        println!("[{:?}] {}", outcome.severity(), outcome.message());
        match serde_json::to_string(outcome) {
            Ok(json) => println!("{json}"),
            Err(err) => warn!("failed to serialize outcome: {err}"),
        }
    }
}

/// Feeds one JSON detection per line into `sensor`. End of input closes the
/// feed, which the session treats as a dismiss once buffered detections are
/// consumed.
pub async fn replay_detections<R>(
    reader: R,
    sensor: Arc<ChannelSensor>,
    dismiss: CancellationToken,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();

    while let Some(line) = lines.next_line().await.context("failed to read detection")? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let detection: Detection = match serde_json::from_str(line) {
            Ok(detection) => detection,
            Err(err) => {
                warn!("skipping unparsable detection: {err}");
                continue;
            }
        };

        if !wait_for_sensor(&sensor, &dismiss).await {
            return Ok(());
        }
        if !sensor.deliver(detection).await {
            info!("scanner no longer listening, stopping replay");
            return Ok(());
        }
    }

    if wait_for_sensor(&sensor, &dismiss).await {
        sensor.close_feed();
    }
    Ok(())
}

async fn wait_for_sensor(sensor: &ChannelSensor, dismiss: &CancellationToken) -> bool {
    while !sensor.is_running() {
        if dismiss.is_cancelled() {
            return false;
        }
        sleep(Duration::from_millis(SENSOR_POLL_MS)).await;
    }
    true
}
