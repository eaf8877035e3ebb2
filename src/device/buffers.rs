//! Capture-side byte buffer recycling.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::frame::BufferSink;

/// Free list of byte buffers shared by a device's sensors.
///
/// Frames built with [`FrameBuilder::recycle_into`](crate::frame::FrameBuilder::recycle_into)
/// return their storage here once the last reference drops.
#[derive(Debug)]
pub struct BufferPool {
    free: Mutex<Vec<Vec<u8>>>,
    max_idle: usize,
    allocated: AtomicU64,
    reclaimed: AtomicU64,
}

impl BufferPool {
    pub fn new(max_idle: usize) -> Self {
        Self {
            free: Mutex::new(Vec::with_capacity(max_idle)),
            max_idle,
            allocated: AtomicU64::new(0),
            reclaimed: AtomicU64::new(0),
        }
    }

    /// Returns a zeroed buffer of `len` bytes, reusing storage when possible.
    pub fn take(&self, len: usize) -> Vec<u8> {
        let reused = self.free.lock().unwrap_or_else(PoisonError::into_inner).pop();
        match reused {
            Some(mut buffer) => {
                buffer.clear();
                buffer.resize(len, 0);
                buffer
            }
            None => {
                self.allocated.fetch_add(1, Ordering::Relaxed);
                vec![0u8; len]
            }
        }
    }

    /// Buffers allocated fresh.
    pub fn allocated(&self) -> u64 {
        self.allocated.load(Ordering::Relaxed)
    }

    /// Buffers handed back by released frames.
    pub fn reclaimed(&self) -> u64 {
        self.reclaimed.load(Ordering::Relaxed)
    }

    pub fn idle(&self) -> usize {
        self.free.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new(64)
    }
}

impl BufferSink for BufferPool {
    fn reclaim(&self, buffer: Vec<u8>) {
        self.reclaimed.fetch_add(1, Ordering::Relaxed);
        let mut free = self.free.lock().unwrap_or_else(PoisonError::into_inner);
        if free.len() < self.max_idle {
            free.push(buffer);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{Frame, FrameBuilder};
    use crate::stream::{Format, StreamKind, StreamProfile};
    use std::sync::Arc;

    #[test]
    fn test_take_reuses_reclaimed_storage() {
        let pool = BufferPool::new(2);
        let buffer = pool.take(16);
        assert_eq!(pool.allocated(), 1);

        pool.reclaim(buffer);
        assert_eq!(pool.idle(), 1);

        let again = pool.take(8);
        assert_eq!(again.len(), 8);
        assert!(again.iter().all(|&b| b == 0));
        assert_eq!(pool.allocated(), 1);
    }

    #[test]
    fn test_frames_return_buffers_on_last_release() {
        let pool = Arc::new(BufferPool::new(4));
        let profile = StreamProfile::new(StreamKind::Accel, 0, Format::MotionXyz32f, 63, 3);
        let raw = FrameBuilder::motion(profile, pool.take(12))
            .recycle_into(pool.clone())
            .build()
            .unwrap();

        let mut kept = Frame::acquire(&raw).unwrap();
        drop(raw);
        let extra = kept.clone();
        assert_eq!(pool.reclaimed(), 0);

        kept.release();
        assert_eq!(pool.reclaimed(), 0);
        drop(extra);
        assert_eq!(pool.reclaimed(), 1);
    }

    #[test]
    fn test_idle_list_is_bounded() {
        let pool = BufferPool::new(1);
        pool.reclaim(vec![0; 4]);
        pool.reclaim(vec![0; 4]);
        assert_eq!(pool.idle(), 1);
        assert_eq!(pool.reclaimed(), 2);
    }
}
