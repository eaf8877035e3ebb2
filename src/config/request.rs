//! Declarative stream requests.

use std::fmt;
use std::str::FromStr;

use crate::stream::{Format, StreamKind, StreamProfile};

/// A request for one stream, any field of which may be a wildcard.
///
/// Wildcards are `StreamKind::Any`, `index: None`, `Format::Any` and zero
/// for width, height and framerate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamRequest {
    pub stream: StreamKind,
    pub index: Option<u32>,
    pub width: u32,
    pub height: u32,
    pub format: Format,
    pub framerate: u32,
}

impl StreamRequest {
    /// A request for `stream` with every other field left open.
    pub fn new(stream: StreamKind) -> Self {
        Self {
            stream,
            index: None,
            width: 0,
            height: 0,
            format: Format::Any,
            framerate: 0,
        }
    }

    /// The fully specified request that selects exactly `profile`.
    pub fn from_profile(profile: &StreamProfile) -> Self {
        Self {
            stream: profile.kind(),
            index: Some(profile.index()),
            width: profile.width(),
            height: profile.height(),
            format: profile.format(),
            framerate: profile.framerate(),
        }
    }

    pub fn index(mut self, index: u32) -> Self {
        self.index = Some(index);
        self
    }

    pub fn resolution(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn format(mut self, format: Format) -> Self {
        self.format = format;
        self
    }

    pub fn framerate(mut self, framerate: u32) -> Self {
        self.framerate = framerate;
        self
    }

    /// Whether any field still needs to be filled in from a device profile.
    ///
    /// Resolution is only considered for image streams; motion streams have
    /// none.
    pub fn has_wildcards(&self) -> bool {
        if self.stream == StreamKind::Any
            || self.index.is_none()
            || self.format == Format::Any
            || self.framerate == 0
        {
            return true;
        }
        !self.stream.is_motion() && (self.width == 0 || self.height == 0)
    }

    /// Whether `profile` satisfies every non-wildcard field.
    pub fn matches(&self, profile: &StreamProfile) -> bool {
        (self.stream == StreamKind::Any || self.stream == profile.kind())
            && self.index.map_or(true, |index| index == profile.index())
            && (self.format == Format::Any || self.format == profile.format())
            && (self.framerate == 0 || self.framerate == profile.framerate())
            && (self.width == 0 || self.width == profile.width())
            && (self.height == 0 || self.height == profile.height())
    }

    /// Whether this request targets the (`kind`, `index`) stream slot.
    pub(crate) fn covers(&self, kind: StreamKind, index: u32) -> bool {
        (self.stream == StreamKind::Any || self.stream == kind) && self.index.map_or(true, |i| i == index)
    }
}

impl fmt::Display for StreamRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.stream)?;
        if let Some(index) = self.index {
            write!(f, ".{index}")?;
        }
        if self.width != 0 || self.height != 0 {
            write!(f, ":{}x{}", self.width, self.height)?;
        }
        if self.format != Format::Any {
            write!(f, ":{}", self.format)?;
        }
        if self.framerate != 0 {
            write!(f, "@{}", self.framerate)?;
        }
        Ok(())
    }
}

/// Parses `kind[.index][:WxH][:format][@fps]`, e.g. `infrared.1:640x480:y8@30`.
impl FromStr for StreamRequest {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (body, framerate) = match s.rsplit_once('@') {
            Some((body, fps)) => {
                let fps = fps
                    .parse::<u32>()
                    .map_err(|_| format!("invalid framerate '{fps}' in '{s}'"))?;
                (body, fps)
            }
            None => (s, 0),
        };

        let mut parts = body.split(':');
        let head = parts.next().unwrap_or_default();
        let (kind, index) = match head.split_once('.') {
            Some((kind, index)) => {
                let index = index
                    .parse::<u32>()
                    .map_err(|_| format!("invalid stream index '{index}' in '{s}'"))?;
                (kind, Some(index))
            }
            None => (head, None),
        };

        let mut request = StreamRequest::new(kind.parse()?);
        request.index = index;
        request.framerate = framerate;

        for part in parts {
            match parse_resolution(part) {
                Some((width, height)) => {
                    request.width = width;
                    request.height = height;
                }
                None => request.format = part.parse()?,
            }
        }
        Ok(request)
    }
}

fn parse_resolution(part: &str) -> Option<(u32, u32)> {
    let (width, height) = part.split_once(['x', 'X'])?;
    Some((width.parse().ok()?, height.parse().ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_request() {
        let request: StreamRequest = "infrared.1:640x480:y8@30".parse().unwrap();
        assert_eq!(
            request,
            StreamRequest::new(StreamKind::Infrared)
                .index(1)
                .resolution(640, 480)
                .format(Format::Y8)
                .framerate(30)
        );
        assert!(!request.has_wildcards());
        assert_eq!(request.to_string(), "infrared.1:640x480:y8@30");
    }

    #[test]
    fn test_parse_partial_requests() {
        let depth: StreamRequest = "depth".parse().unwrap();
        assert_eq!(depth, StreamRequest::new(StreamKind::Depth));
        assert!(depth.has_wildcards());

        let gyro: StreamRequest = "gyro:motion_xyz32f@200".parse().unwrap();
        assert_eq!(gyro.format, Format::MotionXyz32f);
        assert_eq!(gyro.framerate, 200);
        assert_eq!((gyro.width, gyro.height), (0, 0));
    }

    #[test]
    fn test_parse_errors() {
        assert!("thermal".parse::<StreamRequest>().is_err());
        assert!("depth@fast".parse::<StreamRequest>().is_err());
        assert!("depth.x".parse::<StreamRequest>().is_err());
        assert!("depth:jpeg".parse::<StreamRequest>().is_err());
    }

    #[test]
    fn test_wildcards_match_any_profile_of_kind() {
        let profile = StreamProfile::video(StreamKind::Depth, 0, Format::Z16, 30, 1, 1280, 720);
        let open = StreamRequest::new(StreamKind::Depth);
        assert!(open.matches(&profile));

        let vga = StreamRequest::new(StreamKind::Depth).resolution(640, 480);
        assert!(!vga.matches(&profile));

        let color = StreamRequest::new(StreamKind::Color);
        assert!(!color.matches(&profile));
    }

    #[test]
    fn test_motion_requests_need_no_resolution() {
        let profile = StreamProfile::new(StreamKind::Gyro, 0, Format::MotionXyz32f, 200, 4);
        let request = StreamRequest::from_profile(&profile);
        assert!(!request.has_wildcards());
        assert!(request.matches(&profile));
    }
}
