//! Capture-side frame buffers.
//!
//! A [`RawFrame`] is what a sensor hands to its callback. It is only
//! guaranteed to live for the duration of that callback; consumers that
//! need the data afterwards keep it with [`Frame::acquire`](super::Frame::acquire).
//!
//! The buffer itself lives in a shared core. Every live `Frame` holds one
//! strong reference to that core, so the reference count of a buffer is
//! the number of `Frame` values pointing at it. When the last one goes
//! away the core's `Drop` hands byte storage back to its [`BufferSink`],
//! which happens exactly once per buffer.

use std::fmt;
use std::sync::Arc;

use bytemuck::{Pod, Zeroable};

use super::Frame;
use crate::error::{Error, Result};
use crate::stream::{StreamProfile, TimestampDomain};

/// Receives byte buffers back from frames whose last reference dropped.
pub trait BufferSink: Send + Sync {
    fn reclaim(&self, buffer: Vec<u8>);
}

/// Runtime discriminant of a frame's capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// Opaque sample data (motion, pose).
    Motion,
    Video,
    Depth,
    Points,
    Composite,
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FrameKind::Motion => "motion",
            FrameKind::Video => "video",
            FrameKind::Depth => "depth",
            FrameKind::Points => "points",
            FrameKind::Composite => "composite",
        };
        f.write_str(name)
    }
}

/// A point cloud vertex in meters.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// A normalized texture coordinate.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct TexCoord {
    pub u: f32,
    pub v: f32,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct VideoLayout {
    pub width: u32,
    pub height: u32,
    pub stride: u32,
    pub bits_per_pixel: u32,
}

pub(crate) enum Payload {
    Motion(Vec<u8>),
    Video(Vec<u8>, VideoLayout),
    Depth(Vec<u8>, VideoLayout, f32),
    Points {
        vertices: Vec<Vertex>,
        tex_coords: Vec<TexCoord>,
    },
    Composite(Vec<Frame>),
}

pub(crate) struct FrameCore {
    pub profile: StreamProfile,
    pub number: u64,
    pub timestamp: f64,
    pub domain: TimestampDomain,
    pub payload: Payload,
    sink: Option<Arc<dyn BufferSink>>,
}

impl FrameCore {
    pub fn kind(&self) -> FrameKind {
        match self.payload {
            Payload::Motion(_) => FrameKind::Motion,
            Payload::Video(..) => FrameKind::Video,
            Payload::Depth(..) => FrameKind::Depth,
            Payload::Points { .. } => FrameKind::Points,
            Payload::Composite(_) => FrameKind::Composite,
        }
    }

    pub fn data(&self) -> &[u8] {
        match &self.payload {
            Payload::Motion(data) | Payload::Video(data, _) | Payload::Depth(data, _, _) => data,
            Payload::Points { vertices, .. } => bytemuck::cast_slice(vertices),
            Payload::Composite(_) => &[],
        }
    }

    pub fn layout(&self) -> Option<&VideoLayout> {
        match &self.payload {
            Payload::Video(_, layout) | Payload::Depth(_, layout, _) => Some(layout),
            _ => None,
        }
    }

    pub fn components(&self) -> Option<&[Frame]> {
        match &self.payload {
            Payload::Composite(frames) => Some(frames),
            _ => None,
        }
    }
}

impl Drop for FrameCore {
    fn drop(&mut self) {
        let Some(sink) = self.sink.take() else {
            return;
        };
        match &mut self.payload {
            Payload::Motion(data) | Payload::Video(data, _) | Payload::Depth(data, _, _) => {
                sink.reclaim(std::mem::take(data));
            }
            Payload::Points { .. } | Payload::Composite(_) => {}
        }
    }
}

/// A borrowed handle to a captured buffer, as delivered to sensor callbacks.
///
/// May be null, mirroring a zero native handle.
#[derive(Default)]
pub struct RawFrame {
    pub(crate) core: Option<Arc<FrameCore>>,
}

impl RawFrame {
    /// A handle referring to nothing.
    pub fn null() -> Self {
        Self { core: None }
    }

    pub fn is_null(&self) -> bool {
        self.core.is_none()
    }

    /// Stream profile of the buffer, `None` for a null handle.
    pub fn profile(&self) -> Option<StreamProfile> {
        self.core.as_ref().map(|core| core.profile)
    }
}

impl fmt::Debug for RawFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.core {
            Some(core) => f
                .debug_struct("RawFrame")
                .field("profile", &core.profile)
                .field("number", &core.number)
                .finish(),
            None => f.write_str("RawFrame(null)"),
        }
    }
}

/// Builds capture-side buffers.
pub struct FrameBuilder {
    profile: StreamProfile,
    number: u64,
    timestamp: f64,
    domain: TimestampDomain,
    payload: Payload,
    sink: Option<Arc<dyn BufferSink>>,
}

impl FrameBuilder {
    fn with_payload(profile: StreamProfile, payload: Payload) -> Self {
        Self {
            profile,
            number: 0,
            timestamp: 0.0,
            domain: TimestampDomain::default(),
            payload,
            sink: None,
        }
    }

    /// Opaque sample data such as motion vectors.
    pub fn motion(profile: StreamProfile, data: Vec<u8>) -> Self {
        Self::with_payload(profile, Payload::Motion(data))
    }

    /// A video image laid out row by row with `stride` bytes per row.
    pub fn video(profile: StreamProfile, data: Vec<u8>, width: u32, height: u32, stride: u32, bits_per_pixel: u32) -> Self {
        let layout = VideoLayout {
            width,
            height,
            stride,
            bits_per_pixel,
        };
        Self::with_payload(profile, Payload::Video(data, layout))
    }

    /// A Z16 depth image; `depth_scale` converts raw units to meters.
    pub fn depth(profile: StreamProfile, data: Vec<u8>, width: u32, height: u32, stride: u32, depth_scale: f32) -> Self {
        let layout = VideoLayout {
            width,
            height,
            stride,
            bits_per_pixel: 16,
        };
        Self::with_payload(profile, Payload::Depth(data, layout, depth_scale))
    }

    /// A point cloud. Texture coordinates, when present, pair with vertices.
    pub fn points(profile: StreamProfile, vertices: Vec<Vertex>, tex_coords: Vec<TexCoord>) -> Self {
        Self::with_payload(profile, Payload::Points { vertices, tex_coords })
    }

    pub fn number(mut self, number: u64) -> Self {
        self.number = number;
        self
    }

    pub fn timestamp(mut self, timestamp_ms: f64, domain: TimestampDomain) -> Self {
        self.timestamp = timestamp_ms;
        self.domain = domain;
        self
    }

    /// Byte storage is handed to `sink` when the last reference drops.
    pub fn recycle_into(mut self, sink: Arc<dyn BufferSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn build(self) -> Result<RawFrame> {
        match &self.payload {
            Payload::Video(data, layout) | Payload::Depth(data, layout, _) => {
                let row = (layout.width as usize * layout.bits_per_pixel as usize).div_ceil(8);
                if (layout.stride as usize) < row {
                    return Err(Error::SizeMismatch {
                        expected: row,
                        actual: layout.stride as usize,
                    });
                }
                let needed = layout.stride as usize * layout.height as usize;
                if data.len() < needed {
                    return Err(Error::SizeMismatch {
                        expected: needed,
                        actual: data.len(),
                    });
                }
            }
            Payload::Points { vertices, tex_coords } => {
                if !tex_coords.is_empty() && tex_coords.len() != vertices.len() {
                    return Err(Error::SizeMismatch {
                        expected: vertices.len() * std::mem::size_of::<TexCoord>(),
                        actual: tex_coords.len() * std::mem::size_of::<TexCoord>(),
                    });
                }
            }
            Payload::Motion(_) | Payload::Composite(_) => {}
        }
        let core = FrameCore {
            profile: self.profile,
            number: self.number,
            timestamp: self.timestamp,
            domain: self.domain,
            payload: self.payload,
            sink: self.sink,
        };
        Ok(RawFrame {
            core: Some(Arc::new(core)),
        })
    }
}

/// Builds a composite core over already-kept frames.
pub(crate) fn composite_core(frames: Vec<Frame>) -> Result<Arc<FrameCore>> {
    let first = frames.first().ok_or(Error::InvalidHandle)?;
    let profile = first.profile()?;
    let number = first.frame_number()?;
    let timestamp = first.timestamp()?;
    let domain = first.timestamp_domain()?;
    if frames.iter().any(Frame::is_released) {
        return Err(Error::UseAfterRelease);
    }
    Ok(Arc::new(FrameCore {
        profile,
        number,
        timestamp,
        domain,
        payload: Payload::Composite(frames),
        sink: None,
    }))
}
