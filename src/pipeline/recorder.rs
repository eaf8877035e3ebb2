//! Session recording.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::config::PipelineProfile;
use crate::device::{DeviceDescription, DeviceInfo, ProfileDescription, SensorDescription};
use crate::error::Result;
use crate::frame::Frame;

/// Writes a replayable description of a session.
///
/// The file holds the active device restricted to the streams being
/// recorded, so resolving it with `enable_device_from_file` reproduces the
/// same stream selection.
pub struct Recorder {
    path: PathBuf,
    recorded: AtomicU64,
}

impl Recorder {
    /// Writes the description for `profile` to `path`.
    pub fn create(path: impl AsRef<Path>, profile: &PipelineProfile) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        describe(profile).to_file(&path)?;
        tracing::info!(path = %path.display(), streams = profile.streams().len(), "Recording session");
        Ok(Self {
            path,
            recorded: AtomicU64::new(0),
        })
    }

    /// Accounts for one delivered composite.
    pub fn record(&self, composite: &Frame) {
        if !composite.is_released() {
            self.recorded.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Composites recorded so far.
    pub fn recorded(&self) -> u64 {
        self.recorded.load(Ordering::Relaxed)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// The active device of `profile`, limited to its selected streams.
pub fn describe(profile: &PipelineProfile) -> DeviceDescription {
    let info = profile.device().info();
    DeviceDescription {
        info: DeviceInfo {
            source_file: None,
            ..info.clone()
        },
        sensors: profile
            .sensor_streams()
            .iter()
            .map(|group| SensorDescription {
                name: group.sensor.name().to_string(),
                depth_scale: group.sensor.depth_scale(),
                timestamp_domain: group.sensor.timestamp_domain(),
                seed: None,
                profiles: group.profiles.iter().map(ProfileDescription::from_profile).collect(),
            })
            .collect(),
    }
}
