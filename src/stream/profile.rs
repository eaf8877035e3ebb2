//! Immutable stream descriptors.

use std::fmt;

use super::{Format, StreamKind};

/// Width and height of a video stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

/// Describes one stream a sensor can produce.
///
/// Used both as a capability advertised by a device and as the
/// descriptor attached to every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamProfile {
    kind: StreamKind,
    index: u32,
    format: Format,
    framerate: u32,
    unique_id: u32,
    resolution: Option<Resolution>,
}

impl StreamProfile {
    /// Creates a non-video profile (motion, pose).
    pub fn new(kind: StreamKind, index: u32, format: Format, framerate: u32, unique_id: u32) -> Self {
        Self {
            kind,
            index,
            format,
            framerate,
            unique_id,
            resolution: None,
        }
    }

    /// Creates a video profile.
    pub fn video(
        kind: StreamKind,
        index: u32,
        format: Format,
        framerate: u32,
        unique_id: u32,
        width: u32,
        height: u32,
    ) -> Self {
        Self {
            resolution: Some(Resolution { width, height }),
            ..Self::new(kind, index, format, framerate, unique_id)
        }
    }

    #[inline]
    pub fn kind(&self) -> StreamKind {
        self.kind
    }

    #[inline]
    pub fn index(&self) -> u32 {
        self.index
    }

    #[inline]
    pub fn format(&self) -> Format {
        self.format
    }

    #[inline]
    pub fn framerate(&self) -> u32 {
        self.framerate
    }

    #[inline]
    pub fn unique_id(&self) -> u32 {
        self.unique_id
    }

    #[inline]
    pub fn resolution(&self) -> Option<Resolution> {
        self.resolution
    }

    #[inline]
    pub fn is_video(&self) -> bool {
        self.resolution.is_some()
    }

    /// Width in pixels, 0 for non-video profiles.
    pub fn width(&self) -> u32 {
        self.resolution.map_or(0, |r| r.width)
    }

    /// Height in pixels, 0 for non-video profiles.
    pub fn height(&self) -> u32 {
        self.resolution.map_or(0, |r| r.height)
    }

    /// Frame period in milliseconds, `None` when the framerate is unknown.
    pub fn period_ms(&self) -> Option<f64> {
        (self.framerate > 0).then(|| 1000.0 / self.framerate as f64)
    }
}

impl fmt::Display for StreamProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.kind, self.index)?;
        if let Some(Resolution { width, height }) = self.resolution {
            write!(f, " {width}x{height}")?;
        }
        write!(f, " {} @{}fps", self.format, self.framerate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_profile_accessors() {
        let p = StreamProfile::video(StreamKind::Depth, 0, Format::Z16, 30, 7, 640, 480);
        assert!(p.is_video());
        assert_eq!(p.width(), 640);
        assert_eq!(p.height(), 480);
        assert_eq!(p.unique_id(), 7);
        assert_eq!(p.to_string(), "depth.0 640x480 z16 @30fps");
    }

    #[test]
    fn test_motion_profile_has_no_resolution() {
        let p = StreamProfile::new(StreamKind::Gyro, 0, Format::MotionXyz32f, 200, 1);
        assert!(!p.is_video());
        assert_eq!(p.width(), 0);
        assert_eq!(p.period_ms(), Some(5.0));
    }
}
