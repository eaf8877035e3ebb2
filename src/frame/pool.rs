//! Reuse cache for frame set scratch state.
//!
//! Capture loops run at tens of frames per second indefinitely. Instead of
//! allocating a wrapper per delivered set, released sets hand their state
//! back here and the next checkout rebinds it to a new composite.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use super::frameset::FrameSetState;
use super::{Frame, FrameSet};
use crate::error::Result;

static GLOBAL_POOL: OnceLock<Arc<FrameSetPool>> = OnceLock::new();

/// Counters describing pool behaviour.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Checkouts served from an idle instance.
    pub hits: u64,
    /// Checkouts that had to allocate.
    pub misses: u64,
    /// Instances handed back and kept.
    pub returns: u64,
    /// Instances handed back while the pool was full.
    pub discarded: u64,
    /// Instances currently idle.
    pub idle: usize,
}

/// Thread-safe stack of idle frame set state.
///
/// Shared between capture threads and consumer threads. Idle entries never
/// hold a composite reference.
pub struct FrameSetPool {
    idle: Mutex<Vec<Box<FrameSetState>>>,
    capacity: usize,
    hits: AtomicU64,
    misses: AtomicU64,
    returns: AtomicU64,
    discarded: AtomicU64,
}

impl FrameSetPool {
    pub const DEFAULT_CAPACITY: usize = 32;

    /// Creates a pool keeping at most `capacity` idle instances.
    pub fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            idle: Mutex::new(Vec::with_capacity(capacity)),
            capacity,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            returns: AtomicU64::new(0),
            discarded: AtomicU64::new(0),
        })
    }

    /// Process-wide pool used by [`FrameSet::from_composite`].
    pub fn global() -> Arc<Self> {
        Arc::clone(GLOBAL_POOL.get_or_init(|| Self::new(Self::DEFAULT_CAPACITY)))
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Box<FrameSetState>>> {
        // Entries are plain data; a panic elsewhere cannot leave one half-reset.
        self.idle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Checks out a frame set bound to `composite`.
    ///
    /// The returned set has been fully reset: count and cursor describe
    /// `composite` only and no attachments are carried over.
    pub fn get(self: &Arc<Self>, composite: Frame) -> Result<FrameSet> {
        let reused = self.lock().pop();
        let mut state = match reused {
            Some(state) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                state
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                Box::new(FrameSetState::empty())
            }
        };

        match state.bind(composite) {
            Ok(()) => Ok(FrameSet::new(state, Arc::clone(self))),
            Err(e) => {
                self.recycle(state);
                Err(e)
            }
        }
    }

    /// Releases `set`, returning its state to the pool it came from.
    pub fn release(&self, mut set: FrameSet) {
        set.release();
    }

    pub(crate) fn recycle(&self, mut state: Box<FrameSetState>) {
        if state.is_bound() {
            tracing::warn!("Frame set state returned while still bound, releasing composite");
            state.clear();
        }
        let mut idle = self.lock();
        if idle.len() < self.capacity {
            idle.push(state);
            self.returns.fetch_add(1, Ordering::Relaxed);
        } else {
            self.discarded.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn idle_count(&self) -> usize {
        self.lock().len()
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            returns: self.returns.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
            idle: self.idle_count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FrameBuilder;
    use crate::stream::{Format, StreamKind, StreamProfile};
    use std::thread;

    fn composite(frames: usize) -> Frame {
        let parts = (0..frames)
            .map(|i| {
                let profile = StreamProfile::new(StreamKind::Gyro, i as u32, Format::MotionXyz32f, 200, i as u32);
                Frame::from_raw(FrameBuilder::motion(profile, vec![0u8; 12]).build().unwrap()).unwrap()
            })
            .collect();
        Frame::composite(parts).unwrap()
    }

    #[test]
    fn test_release_returns_state_to_pool() {
        let pool = FrameSetPool::new(4);
        let set = pool.get(composite(2)).unwrap();
        assert_eq!(pool.idle_count(), 0);

        pool.release(set);
        assert_eq!(pool.idle_count(), 1);

        let _again = pool.get(composite(1)).unwrap();
        let stats = pool.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.returns, 1);
    }

    #[test]
    fn test_reused_state_carries_nothing_over() {
        let pool = FrameSetPool::new(4);
        let first = composite(3);
        let first_probe = first.clone();

        let mut set = pool.get(first).unwrap();
        set.attach(String::from("scratch")).unwrap();
        set.attach(7u32).unwrap();
        set.frames().unwrap().next().unwrap();
        assert_eq!(set.position().unwrap(), 1);
        drop(set);
        assert_eq!(first_probe.ref_count(), 1);

        let second = pool.get(composite(1)).unwrap();
        assert_eq!(pool.stats().hits, 1);
        assert_eq!(second.count().unwrap(), 1);
        assert_eq!(second.position().unwrap(), 0);
        assert_eq!(second.attached_count().unwrap(), 0);
        assert!(!second.as_frame().unwrap().same_buffer(&first_probe));
    }

    #[test]
    fn test_full_pool_discards() {
        let pool = FrameSetPool::new(1);
        let a = pool.get(composite(1)).unwrap();
        let b = pool.get(composite(1)).unwrap();
        drop(a);
        drop(b);
        let stats = pool.stats();
        assert_eq!(stats.idle, 1);
        assert_eq!(stats.discarded, 1);
    }

    #[test]
    fn test_failed_checkout_keeps_state() {
        let pool = FrameSetPool::new(2);
        let mut released = composite(1);
        released.release();
        assert!(pool.get(released).is_err());
        assert_eq!(pool.idle_count(), 1);
    }

    #[test]
    fn test_concurrent_get_release() {
        let pool = FrameSetPool::new(8);
        let workers: Vec<_> = (0..4)
            .map(|worker| {
                let pool = Arc::clone(&pool);
                thread::spawn(move || {
                    for i in 0..200 {
                        let count = 1 + (worker + i) % 3;
                        let mut set = pool.get(composite(count)).unwrap();
                        assert_eq!(set.count().unwrap(), count);
                        assert_eq!(set.position().unwrap(), 0);
                        assert_eq!(set.attached_count().unwrap(), 0);
                        set.attach(i).unwrap();
                        set.frames().unwrap().next();
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        let stats = pool.stats();
        assert_eq!(stats.hits + stats.misses, 800);
        assert_eq!(stats.returns + stats.discarded, 800);
        assert!(stats.idle <= 8);
    }
}
