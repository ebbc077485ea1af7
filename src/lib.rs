pub mod cli;
pub mod error;
pub mod geometry;
pub mod intake;
pub mod payload;
pub mod registrar;
pub mod scan;
pub mod settings;
pub mod store;
mod utils;

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use log::{info, warn};
use tokio_util::sync::CancellationToken;

use cli::{replay_detections, ConsolePresenter};
use intake::{IntakeOrchestrator, IntakeOutcome};
use registrar::Registrar;
use scan::{ChannelSensor, Permission, ScannerDevice};
use settings::{ScannerSettings, SettingsStore};
use store::Database;

const DATA_DIR_ENV: &str = "CHECKIN_DATA_DIR";
const DEFAULT_DATA_DIR: &str = "checkin-data";
const RUNTIME_SHUTDOWN_MS: u64 = 250;

/// Runs a single intake, reading detections from stdin.
pub fn run() -> Result<()> {
    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let data_dir = std::env::var_os(DATA_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;

    info!("checkin starting up in {}", data_dir.display());

    let settings = SettingsStore::new(data_dir.join("settings.json"))?;
    let database = Database::new(data_dir.join("checkin.sqlite3"))?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;

    let outcome = runtime.block_on(intake_from_stdin(database, settings.scanner()));
    // stdin reads park a blocking thread that never finishes on its own
    runtime.shutdown_timeout(Duration::from_millis(RUNTIME_SHUTDOWN_MS));

    let outcome = outcome?;
    info!("intake outcome: {}", outcome.message());
    Ok(())
}

async fn intake_from_stdin(database: Database, scanner: ScannerSettings) -> Result<IntakeOutcome> {
    let sensor = Arc::new(
        ChannelSensor::new(Permission::Granted).with_capacity(scanner.detection_buffer),
    );
    let device = ScannerDevice::new(sensor.clone());
    let orchestrator = IntakeOrchestrator::new(
        device,
        scanner.capture_zone(),
        Registrar::new(database),
        ConsolePresenter,
    );

    let dismiss = CancellationToken::new();

    let ctrl_c = {
        let dismiss = dismiss.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupted, dismissing scanner");
                dismiss.cancel();
            }
        })
    };

    let replay = {
        let reader = tokio::io::BufReader::new(tokio::io::stdin());
        let sensor = sensor.clone();
        let dismiss = dismiss.clone();
        tokio::spawn(async move {
            if let Err(err) = replay_detections(reader, sensor, dismiss).await {
                warn!("detection replay stopped: {err:#}");
            }
        })
    };

    let scope = scanner.event_scope();
    let outcome = orchestrator.run(scope.as_ref(), &dismiss).await;

    replay.abort();
    ctrl_c.abort();
    Ok(outcome)
}
