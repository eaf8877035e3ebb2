//! Stream descriptors.
//!
//! A [`StreamProfile`] names what a sensor produces: stream kind, index,
//! pixel format, framerate and (for video) resolution. Profiles are
//! immutable and cheap to copy.

mod kind;
mod profile;

pub use kind::{Format, StreamKind, TimestampDomain};
pub use profile::{Resolution, StreamProfile};
