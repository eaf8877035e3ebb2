//! Bounded handoff between capture threads and the consumer.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender, TrySendError};

use crate::frame::Frame;

/// A bounded frame queue that favours fresh data.
///
/// When full, enqueueing drops the oldest queued frame. Queued frames hold
/// a reference; dequeueing transfers it to the caller.
pub struct FrameQueue {
    sender: Mutex<Option<Sender<Frame>>>,
    receiver: Receiver<Frame>,
    capacity: usize,
    dropped: AtomicU64,
}

impl FrameQueue {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, receiver) = channel::bounded(capacity);
        Self {
            sender: Mutex::new(Some(sender)),
            receiver,
            capacity,
            dropped: AtomicU64::new(0),
        }
    }

    /// Queues `frame`, evicting the oldest entry if the queue is full.
    ///
    /// Returns `true` when a frame was evicted. Frames offered to a closed
    /// queue are released.
    pub fn enqueue(&self, frame: Frame) -> bool {
        let guard = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(sender) = guard.as_ref() else {
            return false;
        };

        let mut evicted = false;
        let mut pending = frame;
        loop {
            match sender.try_send(pending) {
                Ok(()) => return evicted,
                Err(TrySendError::Full(frame)) => {
                    if self.receiver.try_recv().is_ok() {
                        self.dropped.fetch_add(1, Ordering::Relaxed);
                        evicted = true;
                    }
                    pending = frame;
                }
                Err(TrySendError::Disconnected(_)) => return evicted,
            }
        }
    }

    /// Blocks up to `timeout` for a frame.
    ///
    /// Returns `None` on timeout, or immediately once the queue is closed
    /// and drained.
    pub fn dequeue(&self, timeout: Duration) -> Option<Frame> {
        match self.receiver.recv_timeout(timeout) {
            Ok(frame) => Some(frame),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    pub fn try_dequeue(&self) -> Option<Frame> {
        self.receiver.try_recv().ok()
    }

    /// Releases every queued frame.
    pub fn clear(&self) {
        while self.receiver.try_recv().is_ok() {}
    }

    /// Refuses further frames, wakes blocked consumers and releases what
    /// was queued.
    pub fn close(&self) {
        self.sender.lock().unwrap_or_else(PoisonError::into_inner).take();
        self.clear();
    }

    pub fn is_closed(&self) -> bool {
        self.sender.lock().unwrap_or_else(PoisonError::into_inner).is_none()
    }

    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Frames evicted to make room for newer ones.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
