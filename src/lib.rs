//! Depth Camera Streaming Library
//!
//! The frame ownership and pipeline resolution core of a depth-camera SDK:
//! reference-counted frames, pooled frame sets, declarative stream
//! configuration and a pipeline that turns sensor callbacks into
//! synchronized frame sets.
//!
//! # Architecture
//!
//! ```text
//! Config ──resolve──→ PipelineProfile ──start──→ sensors
//!                                                  │ RawFrame callbacks
//!                                                  ↓
//!               wait/poll ←── FrameQueue ←── Syncer (composites)
//!                   │
//!                   ↓
//!               FrameSet (checked out of FrameSetPool)
//! ```
//!
//! # Design Principles
//!
//! - **Explicit ownership**: every kept frame holds one reference; the
//!   buffer returns to its sensor exactly once, when the last goes away
//! - **Handles fail, they don't crash**: using a released handle is an
//!   error value, never undefined behaviour
//! - **Bounded waiting**: consumers wait with a timeout and a timeout is
//!   a retryable error
//! - **Hardware optional**: a synthetic device backs every code path
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use depthstream::{Config, Context, Format, Pipeline, StreamKind};
//!
//! let context = Arc::new(Context::synthetic().unwrap());
//! let pipeline = Pipeline::new(context);
//!
//! let mut config = Config::new();
//! config.enable_stream(StreamKind::Depth, None, 640, 480, Format::Z16, 30);
//! pipeline.start_with(&config).unwrap();
//!
//! for _ in 0..30 {
//!     let frames = pipeline.wait_for_frames(Duration::from_secs(5)).unwrap();
//!     if let Some(depth) = frames.depth_frame().unwrap() {
//!         println!("center: {:.3} m", depth.distance(320, 240).unwrap());
//!     }
//! }
//!
//! pipeline.stop();
//! ```

#![warn(rust_2018_idioms)]

pub mod config;
pub mod device;
pub mod error;
pub mod frame;
pub mod metrics;
pub mod pipeline;
pub mod settings;
pub mod stream;

// Re-export commonly used types at crate root
pub use config::{Config, PipelineProfile, StreamRequest};
pub use device::{Context, Device, Pacing, Sensor, SyntheticDevice};
pub use error::{Error, Result};
pub use frame::{DepthFrame, Frame, FrameSet, FrameSetPool, Points, VideoFrame};
pub use pipeline::{Pipeline, PipelineStats};
pub use settings::{FileSettings, PipelineSettings};
pub use stream::{Format, StreamKind, StreamProfile};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
