//! Capture devices.
//!
//! The streaming core never touches hardware directly. It sees devices
//! through the [`Device`] and [`Sensor`] traits; this module defines those
//! traits, the [`Context`] registry, and a synthetic backend that produces
//! plausible frames from a [`DeviceDescription`] so every path can run
//! without a camera attached.

mod buffers;
mod context;
mod description;
mod sensor;
mod synthetic;

pub use buffers::BufferPool;
pub use context::Context;
pub use description::{DeviceDescription, ProfileDescription, SensorDescription};
pub use sensor::{Device, DeviceInfo, FrameCallback, Sensor};
pub use synthetic::{Pacing, SyntheticDevice, SyntheticSensor};
