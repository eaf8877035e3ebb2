//! Time alignment of frames into composites.

use std::collections::{BTreeMap, VecDeque};

use crate::frame::Frame;
use crate::stream::{StreamKind, StreamProfile};

/// Frames held per stream while waiting for partners.
const MAX_PENDING: usize = 16;

/// Groups frames of synchronized streams into composites.
///
/// A composite is emitted once every synchronized stream has a frame and
/// their timestamps lie within half the shortest frame period. Frames that
/// fall behind are released. Streams outside the synchronized set are
/// passed through as single-frame composites.
pub struct Syncer {
    pending: BTreeMap<(StreamKind, u32), VecDeque<Frame>>,
    tolerance_ms: f64,
    stale: u64,
}

impl Syncer {
    /// Synchronizes the `profiles` whose kind is listed in `sync_kinds`.
    pub fn new(profiles: &[StreamProfile], sync_kinds: &[StreamKind]) -> Self {
        let synced: Vec<&StreamProfile> = profiles.iter().filter(|p| sync_kinds.contains(&p.kind())).collect();
        let shortest = synced
            .iter()
            .filter_map(|p| p.period_ms())
            .fold(f64::INFINITY, f64::min);
        let tolerance_ms = if shortest.is_finite() { shortest / 2.0 } else { 0.0 };

        Self {
            pending: synced.iter().map(|p| ((p.kind(), p.index()), VecDeque::new())).collect(),
            tolerance_ms,
            stale: 0,
        }
    }

    /// Offers a frame; returns the composites it completed.
    pub fn push(&mut self, frame: Frame) -> Vec<Frame> {
        let Ok(profile) = frame.profile() else {
            return Vec::new();
        };

        let Some(queue) = self.pending.get_mut(&(profile.kind(), profile.index())) else {
            return single(frame).into_iter().collect();
        };
        queue.push_back(frame);
        if queue.len() > MAX_PENDING {
            queue.pop_front();
            self.stale += 1;
        }

        let mut out = Vec::new();
        while let Some(composite) = self.try_match() {
            out.push(composite);
        }
        out
    }

    fn try_match(&mut self) -> Option<Frame> {
        loop {
            let mut oldest = f64::INFINITY;
            let mut newest = f64::NEG_INFINITY;
            for queue in self.pending.values() {
                let timestamp = queue.front()?.timestamp().unwrap_or(0.0);
                oldest = oldest.min(timestamp);
                newest = newest.max(timestamp);
            }

            if newest - oldest <= self.tolerance_ms {
                let parts: Vec<Frame> = self.pending.values_mut().filter_map(VecDeque::pop_front).collect();
                return match Frame::composite(parts) {
                    Ok(composite) => Some(composite),
                    Err(e) => {
                        tracing::warn!(error = %e, "Dropping unaligned frame group");
                        None
                    }
                };
            }

            for queue in self.pending.values_mut() {
                let behind = queue
                    .front()
                    .and_then(|f| f.timestamp().ok())
                    .is_some_and(|t| t < newest - self.tolerance_ms);
                if behind {
                    queue.pop_front();
                    self.stale += 1;
                }
            }
        }
    }

    /// Releases every held frame.
    pub fn clear(&mut self) {
        for queue in self.pending.values_mut() {
            queue.clear();
        }
    }

    /// Frames released without being delivered.
    pub fn stale(&self) -> u64 {
        self.stale
    }

    /// Frames currently held.
    pub fn pending(&self) -> usize {
        self.pending.values().map(VecDeque::len).sum()
    }

    pub fn tolerance_ms(&self) -> f64 {
        self.tolerance_ms
    }
}

fn single(frame: Frame) -> Option<Frame> {
    match Frame::composite(vec![frame]) {
        Ok(composite) => Some(composite),
        Err(e) => {
            tracing::warn!(error = %e, "Dropping unsynchronized frame");
            None
        }
    }
}
