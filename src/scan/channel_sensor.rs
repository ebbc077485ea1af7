use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Mutex, MutexGuard,
};

use anyhow::{bail, Result};
use async_trait::async_trait;
use log::debug;
use tokio::sync::mpsc;

use crate::geometry::CaptureZone;

use super::sensor::{Detection, Permission, Sensor};

const DEFAULT_CAPACITY: usize = 16;

/// In-process sensor whose detections are pushed by the caller.
///
/// Backs the stdin replay in the binary and the pipeline tests.
pub struct ChannelSensor {
    capacity: usize,
    supported: bool,
    grant_on_request: bool,
    torch_available: bool,
    permission: Mutex<Permission>,
    active: Mutex<Option<mpsc::Sender<Detection>>>,
    torch_on: AtomicBool,
    starts: AtomicUsize,
    stops: AtomicUsize,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl ChannelSensor {
    pub fn new(permission: Permission) -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            supported: true,
            grant_on_request: true,
            torch_available: false,
            permission: Mutex::new(permission),
            active: Mutex::new(None),
            torch_on: AtomicBool::new(false),
            starts: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
        }
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    /// Permission prompts are refused.
    pub fn deny_on_request(mut self) -> Self {
        self.grant_on_request = false;
        self
    }

    pub fn unsupported(mut self) -> Self {
        self.supported = false;
        self
    }

    pub fn with_torch(mut self) -> Self {
        self.torch_available = true;
        self
    }

    /// Pushes a detection into the running feed. Returns false when no scan
    /// is running or the listener has gone away.
    pub async fn deliver(&self, detection: Detection) -> bool {
        let sender = lock(&self.active).clone();
        match sender {
            Some(tx) => tx.send(detection).await.is_ok(),
            None => {
                debug!("detection delivered while sensor idle, dropping");
                false
            }
        }
    }

    /// Ends the running feed as if the camera had gone away. Detections
    /// already delivered are still consumed.
    pub fn close_feed(&self) {
        lock(&self.active).take();
    }

    pub fn is_running(&self) -> bool {
        lock(&self.active).is_some()
    }

    pub fn is_torch_on(&self) -> bool {
        self.torch_on.load(Ordering::Acquire)
    }

    pub fn start_count(&self) -> usize {
        self.starts.load(Ordering::Acquire)
    }

    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::Acquire)
    }
}

#[async_trait]
impl Sensor for ChannelSensor {
    async fn is_supported(&self) -> Result<bool> {
        Ok(self.supported)
    }

    async fn check_permission(&self) -> Result<Permission> {
        Ok(*lock(&self.permission))
    }

    async fn request_permission(&self) -> Result<Permission> {
        let mut permission = lock(&self.permission);
        if self.grant_on_request {
            *permission = Permission::Granted;
        }
        Ok(*permission)
    }

    async fn start(&self, _zone_hint: Option<CaptureZone>) -> Result<mpsc::Receiver<Detection>> {
        let mut active = lock(&self.active);
        if active.is_some() {
            bail!("sensor already started");
        }
        let (tx, rx) = mpsc::channel(self.capacity);
        *active = Some(tx);
        self.starts.fetch_add(1, Ordering::AcqRel);
        Ok(rx)
    }

    async fn stop(&self) -> Result<()> {
        lock(&self.active).take();
        self.torch_on.store(false, Ordering::Release);
        self.stops.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    async fn is_torch_available(&self) -> bool {
        self.torch_available
    }

    async fn set_torch(&self, enabled: bool) -> Result<()> {
        if !self.torch_available {
            bail!("torch not available");
        }
        self.torch_on.store(enabled, Ordering::Release);
        Ok(())
    }
}
