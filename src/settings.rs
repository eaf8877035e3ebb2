//! File-based settings.
//!
//! Pipeline tuning, device selection and CLI output behaviour, loaded from
//! a TOML file. Every section and field has a default, so an empty file is
//! valid.
//!
//! ```toml
//! [pipeline]
//! queue_capacity = 16
//! sync_streams = ["depth", "color"]
//!
//! [device]
//! pacing = "manual"
//!
//! [output]
//! frame_count = 100
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::device::Pacing;
use crate::frame::FrameSetPool;
use crate::stream::StreamKind;

/// Settings validation and loading errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SettingsError {
    #[error("queue capacity must be at least 1")]
    InvalidQueueCapacity,
    #[error("pool capacity must be at least 1")]
    InvalidPoolCapacity,
    #[error("wait timeout must be at least 1 ms")]
    InvalidTimeout,
    #[error("sync streams may not contain the wildcard kind")]
    InvalidSyncStream,
    #[error("failed to read settings file: {0}")]
    FileReadError(String),
    #[error("failed to parse settings file: {0}")]
    ParseError(String),
}

/// Frame delivery tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Composite frames buffered between capture and consumer.
    pub queue_capacity: usize,
    /// Idle frame set wrappers kept for reuse.
    pub pool_capacity: usize,
    /// Default bound for a blocking wait.
    pub wait_timeout_ms: u64,
    /// Stream kinds grouped by timestamp; others are delivered alone.
    pub sync_streams: Vec<StreamKind>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            queue_capacity: 16,
            pool_capacity: FrameSetPool::DEFAULT_CAPACITY,
            wait_timeout_ms: 5000,
            sync_streams: vec![
                StreamKind::Depth,
                StreamKind::Color,
                StreamKind::Infrared,
                StreamKind::Fisheye,
            ],
        }
    }
}

impl PipelineSettings {
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.queue_capacity == 0 {
            return Err(SettingsError::InvalidQueueCapacity);
        }
        if self.pool_capacity == 0 {
            return Err(SettingsError::InvalidPoolCapacity);
        }
        if self.wait_timeout_ms == 0 {
            return Err(SettingsError::InvalidTimeout);
        }
        if self.sync_streams.contains(&StreamKind::Any) {
            return Err(SettingsError::InvalidSyncStream);
        }
        Ok(())
    }
}

/// Which device to stream from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceSettings {
    /// Device description file; the built-in synthetic D400 when unset.
    pub description: Option<PathBuf>,
    /// Serial number to select.
    pub serial: Option<String>,
    pub pacing: Pacing,
}

/// CLI output behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    /// Run until interrupted instead of stopping after `frame_count` sets.
    pub continuous: bool,
    /// Frame sets to receive if not continuous.
    pub frame_count: u32,
    /// Metrics server port (0 to disable).
    pub metrics_port: u16,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            continuous: false,
            frame_count: 30,
            metrics_port: 9090,
        }
    }
}

/// Full settings file format.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileSettings {
    #[serde(default)]
    pub pipeline: PipelineSettings,
    #[serde(default)]
    pub device: DeviceSettings,
    #[serde(default)]
    pub output: OutputSettings,
}

impl FileSettings {
    /// Loads settings from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let content =
            std::fs::read_to_string(path.as_ref()).map_err(|e| SettingsError::FileReadError(e.to_string()))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, SettingsError> {
        let settings: FileSettings = toml::from_str(content).map_err(|e| SettingsError::ParseError(e.to_string()))?;
        settings.pipeline.validate()?;
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_valid() {
        let settings = FileSettings::default();
        assert!(settings.pipeline.validate().is_ok());
        assert_eq!(settings.pipeline.wait_timeout(), Duration::from_secs(5));
        assert_eq!(settings.output.frame_count, 30);
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let settings = FileSettings::from_toml("").unwrap();
        assert_eq!(settings, FileSettings::default());
    }

    #[test]
    fn test_partial_sections() {
        let settings = FileSettings::from_toml(
            r#"
            [pipeline]
            queue_capacity = 4
            sync_streams = ["depth", "color"]

            [device]
            serial = "000000000001"
            pacing = "manual"
            "#,
        )
        .unwrap();
        assert_eq!(settings.pipeline.queue_capacity, 4);
        assert_eq!(settings.pipeline.pool_capacity, 32);
        assert_eq!(settings.pipeline.sync_streams, vec![StreamKind::Depth, StreamKind::Color]);
        assert_eq!(settings.device.pacing, Pacing::Manual);
        assert_eq!(settings.output.metrics_port, 9090);
    }

    #[test]
    fn test_zero_queue_capacity_invalid() {
        let result = FileSettings::from_toml("[pipeline]\nqueue_capacity = 0\n");
        assert!(matches!(result, Err(SettingsError::InvalidQueueCapacity)));
    }

    #[test]
    fn test_zero_timeout_invalid() {
        let settings = PipelineSettings {
            wait_timeout_ms: 0,
            ..Default::default()
        };
        assert!(matches!(settings.validate(), Err(SettingsError::InvalidTimeout)));
    }

    #[test]
    fn test_wildcard_sync_stream_invalid() {
        let settings = PipelineSettings {
            sync_streams: vec![StreamKind::Any],
            ..Default::default()
        };
        assert!(matches!(settings.validate(), Err(SettingsError::InvalidSyncStream)));
    }

    #[test]
    fn test_malformed_file() {
        assert!(matches!(
            FileSettings::from_toml("[pipeline\n"),
            Err(SettingsError::ParseError(_))
        ));
    }
}
