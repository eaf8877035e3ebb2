//! Metrics collection and registry.

use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};
use thiserror::Error;

use crate::frame::PoolStats;
use crate::pipeline::PipelineStats;

/// Errors that can occur during metrics operations.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),
}

/// A snapshot of pipeline state for metrics update.
#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    /// Whether a session is streaming.
    pub started: bool,
    /// Frames kept from sensor callbacks.
    pub frames_received: u64,
    /// Frame sets handed to the application.
    pub sets_delivered: u64,
    /// Composites evicted from a full queue.
    pub frames_dropped: u64,
    /// Frames released by the syncer without a partner.
    pub stale_frames: u64,
    /// Waits that ended without a frame set.
    pub wait_timeouts: u64,
    /// Composites waiting in the queue.
    pub queue_depth: usize,
    /// Frame set checkouts served from the pool.
    pub pool_hits: u64,
    /// Frame set checkouts that allocated.
    pub pool_misses: u64,
    /// Frame set wrappers currently idle.
    pub pool_idle: usize,
}

/// Prometheus metrics registry for pipeline monitoring.
pub struct MetricsRegistry {
    registry: Registry,

    // Session metrics
    started: IntGauge,
    queue_depth: IntGauge,

    // Delivery metrics
    frames_received: IntCounter,
    sets_delivered: IntCounter,
    frames_dropped: IntCounter,
    stale_frames: IntCounter,
    wait_timeouts: IntCounter,

    // Pool metrics
    pool_hits: IntCounter,
    pool_misses: IntCounter,
    pool_idle: IntGauge,
}

/// Advances a counter to an externally tracked total.
fn catch_up(counter: &IntCounter, total: u64) {
    let current = counter.get();
    if total > current {
        counter.inc_by(total - current);
    }
}

impl MetricsRegistry {
    /// Creates a new metrics registry with all pipeline metrics registered.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let started = IntGauge::new("depthstream_started", "Whether the pipeline is streaming (1=started, 0=stopped)")?;
        let queue_depth = IntGauge::new("depthstream_queue_depth", "Composite frames waiting for the consumer")?;

        let frames_received = IntCounter::new("depthstream_frames_received_total", "Frames received from sensors")?;
        let sets_delivered = IntCounter::new("depthstream_sets_delivered_total", "Frame sets delivered to the application")?;
        let frames_dropped = IntCounter::new("depthstream_frames_dropped_total", "Composite frames evicted from a full queue")?;
        let stale_frames = IntCounter::new("depthstream_stale_frames_total", "Frames released without a synchronization partner")?;
        let wait_timeouts = IntCounter::new("depthstream_wait_timeouts_total", "Waits for frames that timed out")?;

        let pool_hits = IntCounter::new("depthstream_pool_hits_total", "Frame set checkouts served from the pool")?;
        let pool_misses = IntCounter::new("depthstream_pool_misses_total", "Frame set checkouts that allocated")?;
        let pool_idle = IntGauge::new("depthstream_pool_idle", "Idle frame set wrappers held by the pool")?;

        registry.register(Box::new(started.clone()))?;
        registry.register(Box::new(queue_depth.clone()))?;
        registry.register(Box::new(frames_received.clone()))?;
        registry.register(Box::new(sets_delivered.clone()))?;
        registry.register(Box::new(frames_dropped.clone()))?;
        registry.register(Box::new(stale_frames.clone()))?;
        registry.register(Box::new(wait_timeouts.clone()))?;
        registry.register(Box::new(pool_hits.clone()))?;
        registry.register(Box::new(pool_misses.clone()))?;
        registry.register(Box::new(pool_idle.clone()))?;

        Ok(Self {
            registry,
            started,
            queue_depth,
            frames_received,
            sets_delivered,
            frames_dropped,
            stale_frames,
            wait_timeouts,
            pool_hits,
            pool_misses,
            pool_idle,
        })
    }

    /// Updates all metrics from a snapshot of pipeline state.
    pub fn update(&self, snapshot: &MetricsSnapshot) {
        self.started.set(i64::from(snapshot.started));
        self.queue_depth.set(snapshot.queue_depth as i64);

        // Counters only move forward; totals come from the pipeline.
        catch_up(&self.frames_received, snapshot.frames_received);
        catch_up(&self.sets_delivered, snapshot.sets_delivered);
        catch_up(&self.frames_dropped, snapshot.frames_dropped);
        catch_up(&self.stale_frames, snapshot.stale_frames);
        catch_up(&self.wait_timeouts, snapshot.wait_timeouts);

        catch_up(&self.pool_hits, snapshot.pool_hits);
        catch_up(&self.pool_misses, snapshot.pool_misses);
        self.pool_idle.set(snapshot.pool_idle as i64);
    }

    /// Returns the underlying Prometheus registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Encodes all metrics in Prometheus text format.
    pub fn encode(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

impl MetricsSnapshot {
    /// Creates a snapshot from pipeline and pool counters.
    pub fn from_components(pipeline: &PipelineStats, pool: &PoolStats) -> Self {
        Self {
            started: pipeline.started,
            frames_received: pipeline.frames_received,
            sets_delivered: pipeline.sets_delivered,
            frames_dropped: pipeline.frames_dropped,
            stale_frames: pipeline.stale_frames,
            wait_timeouts: pipeline.wait_timeouts,
            queue_depth: pipeline.queue_depth,
            pool_hits: pool.hits,
            pool_misses: pool.misses,
            pool_idle: pool.idle,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_creation() {
        assert!(MetricsRegistry::new().is_ok());
    }

    #[test]
    fn test_metrics_update() {
        let registry = MetricsRegistry::new().unwrap();
        let pipeline = PipelineStats {
            frames_received: 60,
            sets_delivered: 28,
            frames_dropped: 2,
            queue_depth: 1,
            started: true,
            ..Default::default()
        };
        let pool = PoolStats {
            hits: 27,
            misses: 1,
            idle: 1,
            ..Default::default()
        };

        registry.update(&MetricsSnapshot::from_components(&pipeline, &pool));

        let output = registry.encode().unwrap();
        assert!(output.contains("depthstream_started 1"));
        assert!(output.contains("depthstream_frames_received_total 60"));
        assert!(output.contains("depthstream_sets_delivered_total 28"));
        assert!(output.contains("depthstream_pool_hits_total 27"));
        assert!(output.contains("depthstream_queue_depth 1"));
    }

    #[test]
    fn test_counters_never_decrease() {
        let registry = MetricsRegistry::new().unwrap();
        registry.update(&MetricsSnapshot {
            sets_delivered: 10,
            ..Default::default()
        });
        registry.update(&MetricsSnapshot {
            sets_delivered: 4,
            ..Default::default()
        });

        let output = registry.encode().unwrap();
        assert!(output.contains("depthstream_sets_delivered_total 10"));
        assert!(output.contains("depthstream_started 0"));
    }

    #[test]
    fn test_metrics_encode() {
        let registry = MetricsRegistry::new().unwrap();
        let output = registry.encode().unwrap();

        assert!(output.contains("depthstream_frames_dropped_total"));
        assert!(output.contains("depthstream_wait_timeouts_total"));
        assert!(output.contains("depthstream_pool_idle"));
    }
}
