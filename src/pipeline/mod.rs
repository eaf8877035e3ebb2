//! Capture session orchestration.
//!
//! Sensors produce on their own threads. The pipeline keeps each delivered
//! frame, aligns synchronized streams into composites and hands them over
//! through a bounded queue or a callback.

#[allow(clippy::module_inception)]
mod pipeline;
mod queue;
mod recorder;
mod syncer;

pub use pipeline::{Pipeline, PipelineStats};
pub use queue::FrameQueue;
pub use recorder::{describe, Recorder};
pub use syncer::Syncer;
