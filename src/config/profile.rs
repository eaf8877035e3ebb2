//! Resolved pipeline profiles.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::device::{Device, Sensor};
use crate::error::{Error, Result};
use crate::stream::{StreamKind, StreamProfile};

/// Concrete profiles bound to one sensor.
#[derive(Clone)]
pub struct SensorStreams {
    pub sensor: Arc<dyn Sensor>,
    pub profiles: Vec<StreamProfile>,
}

impl fmt::Debug for SensorStreams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SensorStreams")
            .field("sensor", &self.sensor.name())
            .field("profiles", &self.profiles)
            .finish()
    }
}

/// The outcome of resolving a config: a device and the exact streams to
/// open on each of its sensors.
#[derive(Clone)]
pub struct PipelineProfile {
    device: Arc<dyn Device>,
    sensor_streams: Vec<SensorStreams>,
    record_path: Option<PathBuf>,
}

impl PipelineProfile {
    pub(crate) fn new(device: Arc<dyn Device>, sensor_streams: Vec<SensorStreams>, record_path: Option<PathBuf>) -> Self {
        Self {
            device,
            sensor_streams,
            record_path,
        }
    }

    pub fn device(&self) -> &Arc<dyn Device> {
        &self.device
    }

    /// All selected profiles, grouped by sensor in device order.
    pub fn streams(&self) -> Vec<StreamProfile> {
        self.sensor_streams
            .iter()
            .flat_map(|group| group.profiles.iter().copied())
            .collect()
    }

    /// The selected profile for `kind`; `index` of `None` takes the first.
    pub fn stream(&self, kind: StreamKind, index: Option<u32>) -> Result<StreamProfile> {
        self.streams()
            .into_iter()
            .find(|p| p.kind() == kind && index.map_or(true, |i| i == p.index()))
            .ok_or(Error::StreamNotFound { stream: kind, index })
    }

    pub fn sensor_streams(&self) -> &[SensorStreams] {
        &self.sensor_streams
    }

    /// Where the session is recorded, if recording was requested.
    pub fn record_path(&self) -> Option<&Path> {
        self.record_path.as_deref()
    }
}

impl fmt::Debug for PipelineProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineProfile")
            .field("device", &self.device.info().serial)
            .field("sensor_streams", &self.sensor_streams)
            .field("record_path", &self.record_path)
            .finish()
    }
}
