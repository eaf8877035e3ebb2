//! Frames, frame sets and their ownership rules.
//!
//! A sensor delivers a [`RawFrame`] to its callback; the buffer is only
//! guaranteed to live for that call. [`Frame::acquire`] keeps it, after
//! which the caller owns one reference and must let it go (explicitly via
//! [`Frame::release`] or by dropping it). The buffer goes back to the
//! capture subsystem when the last reference is gone.
//!
//! Frame variants are decided when the buffer is built and exposed through
//! typed views: [`VideoFrame`], [`DepthFrame`], [`Points`] and the
//! composite [`FrameSet`].

mod buffer;
mod frameset;
mod handle;
mod points;
mod pool;
mod video;

pub use buffer::{BufferSink, FrameBuilder, FrameKind, RawFrame, TexCoord, Vertex};
pub use frameset::{FrameSet, Frames};
pub use handle::Frame;
pub use points::Points;
pub use pool::{FrameSetPool, PoolStats};
pub use video::{DepthFrame, VideoFrame};
