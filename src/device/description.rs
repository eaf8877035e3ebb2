//! TOML device descriptions.
//!
//! A description lists a device's sensors and the profiles each one
//! offers. It is what the synthetic backend is built from and what a
//! recording writes out, so a recorded session can be replayed with
//! [`Config::enable_device_from_file`](crate::config::Config::enable_device_from_file).
//!
//! ```toml
//! [info]
//! name = "Synthetic D400"
//! serial = "000000000001"
//!
//! [[sensor]]
//! name = "Stereo Module"
//! depth_scale = 0.001
//!
//! [[sensor.profile]]
//! stream = "depth"
//! format = "z16"
//! width = 640
//! height = 480
//! framerate = 30
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::DeviceInfo;
use crate::error::{Error, Result};
use crate::stream::{Format, StreamKind, StreamProfile, TimestampDomain};

/// A device and its sensors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceDescription {
    pub info: DeviceInfo,
    #[serde(default, rename = "sensor")]
    pub sensors: Vec<SensorDescription>,
}

/// One sensor of a described device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorDescription {
    pub name: String,
    /// Meters per raw depth unit; set for sensors producing depth.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth_scale: Option<f32>,
    #[serde(default)]
    pub timestamp_domain: TimestampDomain,
    /// Seed for synthetic noise. Unset means seeded from the OS.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    #[serde(default, rename = "profile")]
    pub profiles: Vec<ProfileDescription>,
}

/// One stream profile; `width`/`height` are zero for non-video streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileDescription {
    pub stream: StreamKind,
    #[serde(default)]
    pub index: u32,
    pub format: Format,
    pub framerate: u32,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
}

impl ProfileDescription {
    pub fn from_profile(profile: &StreamProfile) -> Self {
        Self {
            stream: profile.kind(),
            index: profile.index(),
            format: profile.format(),
            framerate: profile.framerate(),
            width: profile.width(),
            height: profile.height(),
        }
    }

    fn to_profile(self, unique_id: u32) -> StreamProfile {
        if self.width > 0 && self.height > 0 {
            StreamProfile::video(
                self.stream,
                self.index,
                self.format,
                self.framerate,
                unique_id,
                self.width,
                self.height,
            )
        } else {
            StreamProfile::new(self.stream, self.index, self.format, self.framerate, unique_id)
        }
    }
}

impl DeviceDescription {
    /// Loads and validates a description from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::native("load_device_file", path.display().to_string(), e.to_string()))?;
        let mut description: DeviceDescription = toml::from_str(&content)
            .map_err(|e| Error::native("load_device_file", path.display().to_string(), e.to_string()))?;
        description.validate()?;
        description.info.source_file = Some(path.to_path_buf());
        Ok(description)
    }

    /// Writes the description as TOML.
    pub fn to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::native("save_device_file", path.display().to_string(), e.to_string()))?;
        std::fs::write(path, content)
            .map_err(|e| Error::native("save_device_file", path.display().to_string(), e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |message: String| Error::native("validate_device", self.info.serial.clone(), message);
        if self.info.serial.is_empty() {
            return Err(invalid("device serial is empty".into()));
        }
        for sensor in &self.sensors {
            if sensor.name.is_empty() {
                return Err(invalid("sensor name is empty".into()));
            }
            for profile in &sensor.profiles {
                if profile.stream == StreamKind::Any || profile.format == Format::Any {
                    return Err(invalid(format!("sensor '{}' lists a wildcard profile", sensor.name)));
                }
                if profile.framerate == 0 {
                    return Err(invalid(format!(
                        "sensor '{}' lists {} with zero framerate",
                        sensor.name, profile.stream
                    )));
                }
                if (profile.width == 0) != (profile.height == 0) {
                    return Err(invalid(format!(
                        "sensor '{}' lists {} with a partial resolution",
                        sensor.name, profile.stream
                    )));
                }
            }
        }
        Ok(())
    }

    /// Concrete profiles per sensor, with unique ids numbered across the
    /// whole device starting at 1.
    pub fn sensor_profiles(&self) -> Vec<Vec<StreamProfile>> {
        let mut next_id = 1;
        self.sensors
            .iter()
            .map(|sensor| {
                sensor
                    .profiles
                    .iter()
                    .map(|profile| {
                        let unique_id = next_id;
                        next_id += 1;
                        profile.to_profile(unique_id)
                    })
                    .collect()
            })
            .collect()
    }

    /// A D400-style device: stereo depth with two infrared imagers, an RGB
    /// camera and an IMU.
    pub fn synthetic_d400() -> Self {
        let video = |stream: StreamKind, index: u32, format: Format, (width, height): (u32, u32), framerate: u32| {
            ProfileDescription {
                stream,
                index,
                format,
                framerate,
                width,
                height,
            }
        };
        let motion = |stream: StreamKind, framerate: u32| ProfileDescription {
            stream,
            index: 0,
            format: Format::MotionXyz32f,
            framerate,
            width: 0,
            height: 0,
        };

        let resolutions = [(640, 480), (1280, 720), (424, 240)];
        let rates = [30, 15, 6];

        let mut stereo = Vec::new();
        let mut color = Vec::new();
        for resolution in resolutions {
            for framerate in rates {
                stereo.push(video(StreamKind::Depth, 0, Format::Z16, resolution, framerate));
                stereo.push(video(StreamKind::Infrared, 1, Format::Y8, resolution, framerate));
                stereo.push(video(StreamKind::Infrared, 2, Format::Y8, resolution, framerate));
                for format in [Format::Rgb8, Format::Bgr8, Format::Yuyv] {
                    color.push(video(StreamKind::Color, 0, format, resolution, framerate));
                }
            }
        }
        stereo.push(video(StreamKind::Depth, 0, Format::Z16, (848, 480), 90));

        Self {
            info: DeviceInfo {
                name: "Synthetic D400".into(),
                serial: "000000000001".into(),
                firmware: "5.13.0".into(),
                source_file: None,
            },
            sensors: vec![
                SensorDescription {
                    name: "Stereo Module".into(),
                    depth_scale: Some(0.001),
                    timestamp_domain: TimestampDomain::HardwareClock,
                    seed: Some(1),
                    profiles: stereo,
                },
                SensorDescription {
                    name: "RGB Camera".into(),
                    depth_scale: None,
                    timestamp_domain: TimestampDomain::HardwareClock,
                    seed: Some(2),
                    profiles: color,
                },
                SensorDescription {
                    name: "Motion Module".into(),
                    depth_scale: None,
                    timestamp_domain: TimestampDomain::GlobalTime,
                    seed: Some(3),
                    profiles: vec![
                        motion(StreamKind::Gyro, 200),
                        motion(StreamKind::Gyro, 400),
                        motion(StreamKind::Accel, 63),
                        motion(StreamKind::Accel, 250),
                    ],
                },
            ],
        }
    }
}
