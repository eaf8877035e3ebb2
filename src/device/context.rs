//! Device registry shared by pipelines.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use super::{Device, DeviceDescription, Pacing, SyntheticDevice};
use crate::error::Result;

/// Registry of connected devices plus devices loaded from files.
///
/// File devices are kept apart from the connected list and cached per
/// path, so every config naming the same file resolves to the same device.
#[derive(Default)]
pub struct Context {
    devices: RwLock<Vec<Arc<dyn Device>>>,
    files: Mutex<HashMap<PathBuf, Arc<SyntheticDevice>>>,
    file_pacing: Pacing,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// A context whose file devices use `pacing`.
    pub fn with_file_pacing(pacing: Pacing) -> Self {
        Self {
            file_pacing: pacing,
            ..Self::default()
        }
    }

    /// A context holding one realtime synthetic D400.
    pub fn synthetic() -> Result<Self> {
        let context = Self::new();
        let device = SyntheticDevice::new(DeviceDescription::synthetic_d400(), Pacing::Realtime)?;
        context.add_device(Arc::new(device));
        Ok(context)
    }

    pub fn add_device(&self, device: Arc<dyn Device>) {
        let info = device.info();
        tracing::info!(name = %info.name, serial = %info.serial, "Device added");
        self.devices
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(device);
    }

    /// Connected devices, in the order they were added.
    pub fn devices(&self) -> Vec<Arc<dyn Device>> {
        self.devices
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|device| device.is_connected())
            .cloned()
            .collect()
    }

    pub fn query_by_serial(&self, serial: &str) -> Option<Arc<dyn Device>> {
        self.devices().into_iter().find(|device| device.info().serial == serial)
    }

    /// Loads the device described by `path`, reusing an earlier load.
    pub fn load_device_file(&self, path: impl AsRef<Path>) -> Result<Arc<SyntheticDevice>> {
        let path = path.as_ref();
        let key = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());

        let mut files = self.files.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(device) = files.get(&key) {
            return Ok(Arc::clone(device));
        }

        let device = Arc::new(SyntheticDevice::from_file(path, self.file_pacing)?);
        tracing::info!(path = %path.display(), serial = %device.info().serial, "Device file loaded");
        files.insert(key, Arc::clone(&device));
        Ok(device)
    }
}
