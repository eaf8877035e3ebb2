//! Sensor and device abstraction.
//!
//! This is the seam between the streaming core and whatever produces the
//! bytes. A real transport and the synthetic backend both implement these
//! traits; the pipeline only ever talks to them.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::frame::RawFrame;
use crate::stream::{StreamProfile, TimestampDomain};

/// Callback invoked on the sensor's thread for every captured buffer.
///
/// The [`RawFrame`] is only valid for the duration of the call.
pub type FrameCallback = Arc<dyn Fn(&RawFrame) + Send + Sync>;

/// One capture unit of a device (stereo module, RGB camera, IMU).
///
/// Methods take `&self`; implementations keep their state behind a lock so
/// sensors can be shared between the pipeline and the device.
pub trait Sensor: Send + Sync {
    fn name(&self) -> &str;

    /// Every profile the sensor can stream.
    fn stream_profiles(&self) -> Vec<StreamProfile>;

    /// Reserves the sensor for `profiles`.
    ///
    /// Fails when a profile is not offered by this sensor or the sensor is
    /// already open.
    fn open(&self, profiles: &[StreamProfile]) -> Result<()>;

    /// Begins delivering frames to `callback`. Requires an open, idle sensor.
    fn start(&self, callback: FrameCallback) -> Result<()>;

    /// Stops delivery. No callback runs after this returns, except when
    /// called from the callback itself.
    fn stop(&self) -> Result<()>;

    fn close(&self) -> Result<()>;

    fn is_streaming(&self) -> bool;

    /// Meters per raw depth unit, for sensors producing depth.
    fn depth_scale(&self) -> Option<f32> {
        None
    }

    fn timestamp_domain(&self) -> TimestampDomain {
        TimestampDomain::HardwareClock
    }
}

/// Identification of a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub name: String,
    pub serial: String,
    #[serde(default)]
    pub firmware: String,
    /// File the device was loaded from, if any.
    #[serde(skip)]
    pub source_file: Option<PathBuf>,
}

/// A capture device: a named collection of sensors.
pub trait Device: Send + Sync {
    fn info(&self) -> &DeviceInfo;

    fn sensors(&self) -> Vec<Arc<dyn Sensor>>;

    /// Profiles of all sensors, in sensor order.
    fn stream_profiles(&self) -> Vec<StreamProfile> {
        self.sensors()
            .iter()
            .flat_map(|sensor| sensor.stream_profiles())
            .collect()
    }

    fn is_connected(&self) -> bool;
}
