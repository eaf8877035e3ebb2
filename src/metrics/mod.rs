//! Prometheus metrics exporter for pipeline monitoring.
//!
//! # Metrics Exposed
//!
//! ## Session Metrics
//! - `depthstream_started` - Whether the pipeline is streaming (1=started, 0=stopped)
//! - `depthstream_queue_depth` - Composite frames waiting for the consumer
//!
//! ## Delivery Metrics
//! - `depthstream_frames_received_total` - Frames received from sensors
//! - `depthstream_sets_delivered_total` - Frame sets delivered to the application
//! - `depthstream_frames_dropped_total` - Composites evicted from a full queue
//! - `depthstream_stale_frames_total` - Frames released without a synchronization partner
//! - `depthstream_wait_timeouts_total` - Waits for frames that timed out
//!
//! ## Pool Metrics
//! - `depthstream_pool_hits_total` - Frame set checkouts served from the pool
//! - `depthstream_pool_misses_total` - Frame set checkouts that allocated
//! - `depthstream_pool_idle` - Idle frame set wrappers held by the pool
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use depthstream::device::Context;
//! use depthstream::metrics::{MetricsRegistry, MetricsSnapshot};
//! use depthstream::pipeline::Pipeline;
//!
//! let registry = MetricsRegistry::new().expect("Failed to create registry");
//! let pipeline = Pipeline::new(Arc::new(Context::synthetic().expect("synthetic device")));
//!
//! let snapshot = MetricsSnapshot::from_components(&pipeline.stats(), &pipeline.pool().stats());
//! registry.update(&snapshot);
//! println!("{}", registry.encode().expect("encode"));
//! ```

mod collector;
#[cfg(feature = "metrics")]
mod server;

pub use collector::{MetricsError, MetricsRegistry, MetricsSnapshot};
#[cfg(feature = "metrics")]
pub use server::{MetricsServer, MetricsServerConfig, ServerError};
