//! Stream configuration and resolution.
//!
//! A [`Config`] is a declarative wish list: which streams, optionally at
//! which resolution, format and framerate, from which device. Resolving it
//! against a pipeline's devices yields a [`PipelineProfile`] naming the
//! exact profile each sensor will stream.

mod builder;
mod profile;
mod request;
mod resolver;

pub use builder::Config;
pub use profile::{PipelineProfile, SensorStreams};
pub use request::StreamRequest;
