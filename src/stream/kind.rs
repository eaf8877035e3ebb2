//! Stream, format and clock-domain enumerations.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The kind of data a stream carries.
///
/// `Any` is a wildcard used in requests; device profiles never carry it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamKind {
    Any,
    Depth,
    Color,
    Infrared,
    Fisheye,
    Gyro,
    Accel,
    Pose,
    Confidence,
}

impl StreamKind {
    /// All concrete stream kinds, in canonical order.
    pub const ALL: [StreamKind; 8] = [
        StreamKind::Depth,
        StreamKind::Color,
        StreamKind::Infrared,
        StreamKind::Fisheye,
        StreamKind::Gyro,
        StreamKind::Accel,
        StreamKind::Pose,
        StreamKind::Confidence,
    ];

    pub fn name(self) -> &'static str {
        match self {
            StreamKind::Any => "any",
            StreamKind::Depth => "depth",
            StreamKind::Color => "color",
            StreamKind::Infrared => "infrared",
            StreamKind::Fisheye => "fisheye",
            StreamKind::Gyro => "gyro",
            StreamKind::Accel => "accel",
            StreamKind::Pose => "pose",
            StreamKind::Confidence => "confidence",
        }
    }

    /// Motion streams carry vectors rather than images.
    pub fn is_motion(self) -> bool {
        matches!(self, StreamKind::Gyro | StreamKind::Accel | StreamKind::Pose)
    }

    /// The format the resolver prefers when a request leaves it open.
    pub fn preferred_format(self) -> Option<Format> {
        match self {
            StreamKind::Depth => Some(Format::Z16),
            StreamKind::Color => Some(Format::Rgb8),
            StreamKind::Infrared => Some(Format::Y8),
            _ => None,
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StreamKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let kind = match s.to_ascii_lowercase().as_str() {
            "any" => StreamKind::Any,
            "depth" => StreamKind::Depth,
            "color" => StreamKind::Color,
            "infrared" | "ir" => StreamKind::Infrared,
            "fisheye" => StreamKind::Fisheye,
            "gyro" => StreamKind::Gyro,
            "accel" => StreamKind::Accel,
            "pose" => StreamKind::Pose,
            "confidence" => StreamKind::Confidence,
            other => return Err(format!("unknown stream kind '{other}'")),
        };
        Ok(kind)
    }
}

/// Pixel or sample layout of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Format {
    Any,
    Z16,
    Disparity16,
    Disparity32,
    Xyz32f,
    Yuyv,
    Uyvy,
    Rgb8,
    Bgr8,
    Rgba8,
    Bgra8,
    Y8,
    Y16,
    Raw10,
    Raw16,
    MotionXyz32f,
    MotionRaw,
    SixDof,
}

impl Format {
    pub fn name(self) -> &'static str {
        match self {
            Format::Any => "any",
            Format::Z16 => "z16",
            Format::Disparity16 => "disparity16",
            Format::Disparity32 => "disparity32",
            Format::Xyz32f => "xyz32f",
            Format::Yuyv => "yuyv",
            Format::Uyvy => "uyvy",
            Format::Rgb8 => "rgb8",
            Format::Bgr8 => "bgr8",
            Format::Rgba8 => "rgba8",
            Format::Bgra8 => "bgra8",
            Format::Y8 => "y8",
            Format::Y16 => "y16",
            Format::Raw10 => "raw10",
            Format::Raw16 => "raw16",
            Format::MotionXyz32f => "motion_xyz32f",
            Format::MotionRaw => "motion_raw",
            Format::SixDof => "six_dof",
        }
    }

    /// Bytes per pixel for image formats, `None` for motion and wildcard.
    pub fn bytes_per_pixel(self) -> Option<u32> {
        match self {
            Format::Y8 => Some(1),
            Format::Z16
            | Format::Disparity16
            | Format::Yuyv
            | Format::Uyvy
            | Format::Y16
            | Format::Raw10
            | Format::Raw16 => Some(2),
            Format::Rgb8 | Format::Bgr8 => Some(3),
            Format::Rgba8 | Format::Bgra8 | Format::Disparity32 => Some(4),
            Format::Xyz32f => Some(12),
            Format::Any | Format::MotionXyz32f | Format::MotionRaw | Format::SixDof => None,
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.to_ascii_lowercase();
        [
            Format::Any,
            Format::Z16,
            Format::Disparity16,
            Format::Disparity32,
            Format::Xyz32f,
            Format::Yuyv,
            Format::Uyvy,
            Format::Rgb8,
            Format::Bgr8,
            Format::Rgba8,
            Format::Bgra8,
            Format::Y8,
            Format::Y16,
            Format::Raw10,
            Format::Raw16,
            Format::MotionXyz32f,
            Format::MotionRaw,
            Format::SixDof,
        ]
        .into_iter()
        .find(|format| format.name() == lowered)
        .ok_or_else(|| format!("unknown format '{s}'"))
    }
}

/// Clock a frame timestamp was taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampDomain {
    /// Device clock, milliseconds since the sensor started streaming.
    #[default]
    HardwareClock,
    /// Host wall clock, milliseconds since the Unix epoch.
    SystemTime,
    /// Device clock translated to host time.
    GlobalTime,
}
