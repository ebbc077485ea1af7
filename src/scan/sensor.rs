use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::geometry::{CaptureZone, Quad};

/// One barcode read reported by the sensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Detection {
    pub raw_text: String,
    pub corners: Quad,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Permission {
    Granted,
    Denied,
}

/// Camera + barcode detector, implemented by the platform layer.
///
/// `start` hands back the receiving end of the detection feed. The feed ends
/// when the sensor drops its sender, which `stop` must cause.
#[async_trait]
pub trait Sensor: Send + Sync {
    async fn is_supported(&self) -> Result<bool> {
        Ok(true)
    }

    async fn check_permission(&self) -> Result<Permission>;

    async fn request_permission(&self) -> Result<Permission>;

    async fn start(&self, zone_hint: Option<CaptureZone>) -> Result<mpsc::Receiver<Detection>>;

    async fn stop(&self) -> Result<()>;

    async fn is_torch_available(&self) -> bool {
        false
    }

    /// Idempotent: setting the current state again is a no-op.
    async fn set_torch(&self, enabled: bool) -> Result<()>;
}
