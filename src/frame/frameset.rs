//! Composite frames.
//!
//! A [`FrameSet`] wraps one composite frame holding several time-aligned
//! component frames. Its scratch state (iteration cursor, attached
//! resources) is checked out of a [`FrameSetPool`](super::FrameSetPool)
//! and handed back on release, so capture loops running indefinitely do
//! not allocate a wrapper per frame.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use super::{DepthFrame, Frame, FrameKind, FrameSetPool, VideoFrame};
use crate::error::{Error, Result};
use crate::stream::{Format, StreamKind};

/// Reusable part of a frame set.
pub(crate) struct FrameSetState {
    composite: Option<Frame>,
    count: usize,
    cursor: usize,
    attachments: Vec<Box<dyn Any + Send>>,
}

impl FrameSetState {
    pub(crate) fn empty() -> Self {
        Self {
            composite: None,
            count: 0,
            cursor: 0,
            attachments: Vec::new(),
        }
    }

    /// Resets every field to describe `composite` only.
    pub(crate) fn bind(&mut self, composite: Frame) -> Result<()> {
        let count = {
            let core = composite.core()?;
            core.components()
                .ok_or(Error::WrongFrameKind {
                    expected: FrameKind::Composite,
                    actual: core.kind(),
                })?
                .len()
        };
        self.clear();
        self.composite = Some(composite);
        self.count = count;
        Ok(())
    }

    /// Disposes attachments first, then drops the composite reference.
    pub(crate) fn clear(&mut self) {
        self.attachments.clear();
        if let Some(mut composite) = self.composite.take() {
            composite.release();
        }
        self.count = 0;
        self.cursor = 0;
    }

    pub(crate) fn is_bound(&self) -> bool {
        self.composite.is_some()
    }

    fn component(&self, index: usize) -> Result<Frame> {
        let composite = self.composite.as_ref().ok_or(Error::UseAfterRelease)?;
        let frames = composite.core()?.components().ok_or(Error::UseAfterRelease)?;
        frames.get(index).cloned().ok_or(Error::IndexOutOfRange {
            index,
            count: self.count,
        })
    }
}

/// A set of time-aligned frames delivered together.
///
/// `count` is fixed when the set is created. Every frame taken out of the
/// set is a new reference the caller owns; the set keeps its own.
pub struct FrameSet {
    state: Option<Box<FrameSetState>>,
    pool: Arc<FrameSetPool>,
}

impl FrameSet {
    pub(crate) fn new(state: Box<FrameSetState>, pool: Arc<FrameSetPool>) -> Self {
        Self {
            state: Some(state),
            pool,
        }
    }

    /// Wraps a composite frame using the process-wide pool.
    pub fn from_composite(composite: Frame) -> Result<Self> {
        FrameSetPool::global().get(composite)
    }

    fn state(&self) -> Result<&FrameSetState> {
        self.state.as_deref().ok_or(Error::UseAfterRelease)
    }

    fn state_mut(&mut self) -> Result<&mut FrameSetState> {
        self.state.as_deref_mut().ok_or(Error::UseAfterRelease)
    }

    /// Number of embedded frames.
    pub fn count(&self) -> Result<usize> {
        Ok(self.state()?.count)
    }

    /// New reference to the frame at `index`.
    pub fn at(&self, index: usize) -> Result<Frame> {
        self.state()?.component(index)
    }

    /// First frame satisfying `predicate`. Frames that do not match are
    /// released before moving on.
    pub fn find<P>(&self, mut predicate: P) -> Result<Option<Frame>>
    where
        P: FnMut(&Frame) -> bool,
    {
        let state = self.state()?;
        for index in 0..state.count {
            let frame = state.component(index)?;
            if predicate(&frame) {
                return Ok(Some(frame));
            }
        }
        Ok(None)
    }

    /// First frame of `kind` (and `format`, unless `Format::Any`).
    pub fn first_matching(&self, kind: StreamKind, format: Format) -> Result<Option<Frame>> {
        self.find(|frame| {
            frame.profile().is_ok_and(|p| {
                (kind == StreamKind::Any || p.kind() == kind)
                    && (format == Format::Any || p.format() == format)
            })
        })
    }

    pub fn depth_frame(&self) -> Result<Option<DepthFrame>> {
        Ok(self
            .first_matching(StreamKind::Depth, Format::Z16)?
            .and_then(|frame| frame.into_depth().ok()))
    }

    pub fn color_frame(&self) -> Result<Option<VideoFrame>> {
        Ok(self
            .first_matching(StreamKind::Color, Format::Any)?
            .and_then(|frame| frame.into_video().ok()))
    }

    /// Infrared frame with the given stream index, or the first one.
    pub fn infrared_frame(&self, index: Option<u32>) -> Result<Option<VideoFrame>> {
        let found = self.find(|frame| {
            frame.profile().is_ok_and(|p| {
                p.kind() == StreamKind::Infrared && index.map_or(true, |i| p.index() == i)
            })
        })?;
        Ok(found.and_then(|frame| frame.into_video().ok()))
    }

    pub fn motion_frame(&self, kind: StreamKind) -> Result<Option<Frame>> {
        self.first_matching(kind, Format::Any)
    }

    /// Calls `action` for every embedded frame. Each frame is released
    /// once its call returns, including when it fails or panics.
    pub fn for_each<F>(&self, mut action: F) -> Result<()>
    where
        F: FnMut(&Frame) -> Result<()>,
    {
        let state = self.state()?;
        for index in 0..state.count {
            let frame = state.component(index)?;
            action(&frame)?;
        }
        Ok(())
    }

    /// Iterates the embedded frames from the start, advancing the set's
    /// cursor.
    pub fn frames(&mut self) -> Result<Frames<'_>> {
        let state = self.state_mut()?;
        state.cursor = 0;
        Ok(Frames { state })
    }

    /// Current cursor position of [`FrameSet::frames`].
    pub fn position(&self) -> Result<usize> {
        Ok(self.state()?.cursor)
    }

    /// New reference to the composite frame itself.
    pub fn as_frame(&self) -> Result<Frame> {
        let composite = self.state()?.composite.as_ref().ok_or(Error::UseAfterRelease)?;
        Ok(composite.clone())
    }

    pub fn frame_number(&self) -> Result<u64> {
        self.composite()?.frame_number()
    }

    pub fn timestamp(&self) -> Result<f64> {
        self.composite()?.timestamp()
    }

    fn composite(&self) -> Result<&Frame> {
        self.state()?.composite.as_ref().ok_or(Error::UseAfterRelease)
    }

    /// Keeps `resource` alive until this set is released. Attached
    /// resources are dropped before the composite reference.
    pub fn attach<T: Send + 'static>(&mut self, resource: T) -> Result<()> {
        self.state_mut()?.attachments.push(Box::new(resource));
        Ok(())
    }

    pub fn attached_count(&self) -> Result<usize> {
        Ok(self.state()?.attachments.len())
    }

    #[inline]
    pub fn is_released(&self) -> bool {
        self.state.is_none()
    }

    /// Releases attachments and the composite, then returns the scratch
    /// state to its pool. Safe to call any number of times.
    pub fn release(&mut self) {
        if let Some(mut state) = self.state.take() {
            state.clear();
            self.pool.recycle(state);
        }
    }
}

impl Drop for FrameSet {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for FrameSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.state {
            Some(state) => f
                .debug_struct("FrameSet")
                .field("count", &state.count)
                .field("cursor", &state.cursor)
                .field("attachments", &state.attachments.len())
                .field("composite", &state.composite)
                .finish(),
            None => f.write_str("FrameSet(released)"),
        }
    }
}

/// Cursor-driven iterator over a [`FrameSet`].
pub struct Frames<'a> {
    state: &'a mut FrameSetState,
}

impl Iterator for Frames<'_> {
    type Item = Frame;

    fn next(&mut self) -> Option<Frame> {
        if self.state.cursor >= self.state.count {
            return None;
        }
        let frame = self.state.component(self.state.cursor).ok()?;
        self.state.cursor += 1;
        Some(frame)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.state.count.saturating_sub(self.state.cursor);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Frames<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FrameBuilder;
    use crate::stream::StreamProfile;
    use std::panic::{catch_unwind, AssertUnwindSafe};

    fn depth() -> Frame {
        let profile = StreamProfile::video(StreamKind::Depth, 0, Format::Z16, 30, 1, 2, 2);
        let raw = FrameBuilder::depth(profile, vec![0u8; 8], 2, 2, 4, 0.001)
            .number(5)
            .build()
            .unwrap();
        Frame::from_raw(raw).unwrap()
    }

    fn color() -> Frame {
        let profile = StreamProfile::video(StreamKind::Color, 0, Format::Rgb8, 30, 2, 2, 2);
        let raw = FrameBuilder::video(profile, vec![0u8; 12], 2, 2, 6, 24).build().unwrap();
        Frame::from_raw(raw).unwrap()
    }

    fn infrared(index: u32) -> Frame {
        let profile = StreamProfile::video(StreamKind::Infrared, index, Format::Y8, 30, 2 + index, 2, 2);
        let raw = FrameBuilder::video(profile, vec![0u8; 4], 2, 2, 2, 8).build().unwrap();
        Frame::from_raw(raw).unwrap()
    }

    fn set_of(frames: Vec<Frame>) -> FrameSet {
        FrameSetPool::new(4).get(Frame::composite(frames).unwrap()).unwrap()
    }

    #[test]
    fn test_first_matching_does_not_leak_skipped_frames() {
        let d = depth();
        let c = color();
        // Color first so the depth lookup has to skip it.
        let set = set_of(vec![c.clone(), d.clone()]);
        let color_refs = c.ref_count();

        let found = set.first_matching(StreamKind::Depth, Format::Z16).unwrap().unwrap();
        assert!(found.same_buffer(&d));
        assert_eq!(c.ref_count(), color_refs);
        assert_eq!(d.ref_count(), 3);
    }

    #[test]
    fn test_at_out_of_range() {
        let set = set_of(vec![depth(), color()]);
        assert!(matches!(
            set.at(2),
            Err(Error::IndexOutOfRange { index: 2, count: 2 })
        ));
    }

    #[test]
    fn test_count_is_stable_while_extracting() {
        let mut set = set_of(vec![depth(), color()]);
        let initial = set.count().unwrap();
        let extracted: Vec<Frame> = set.frames().unwrap().collect();
        assert_eq!(extracted.len(), 2);
        let _again = set.at(0).unwrap();
        assert_eq!(set.count().unwrap(), initial);
    }

    #[test]
    fn test_typed_accessors() {
        let set = set_of(vec![depth(), color(), infrared(1), infrared(2)]);
        assert_eq!(set.depth_frame().unwrap().unwrap().frame_number().unwrap(), 5);
        assert!(set.color_frame().unwrap().is_some());
        let ir2 = set.infrared_frame(Some(2)).unwrap().unwrap();
        assert_eq!(ir2.profile().unwrap().index(), 2);
        assert!(set.motion_frame(StreamKind::Gyro).unwrap().is_none());
    }

    #[test]
    fn test_for_each_releases_on_error() {
        let d = depth();
        let c = color();
        let set = set_of(vec![d.clone(), c.clone()]);
        let result = set.for_each(|frame| {
            if frame.profile()?.kind() == StreamKind::Color {
                return Err(Error::NotStarted);
            }
            Ok(())
        });
        assert!(matches!(result, Err(Error::NotStarted)));
        assert_eq!(d.ref_count(), 2);
        assert_eq!(c.ref_count(), 2);
    }

    #[test]
    fn test_for_each_releases_on_panic() {
        let d = depth();
        let set = set_of(vec![d.clone()]);
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            set.for_each(|_| panic!("callback failed")).ok();
        }));
        assert!(outcome.is_err());
        assert_eq!(d.ref_count(), 2);
    }

    #[test]
    fn test_as_frame_and_release_order() {
        let d = depth();
        let mut set = set_of(vec![d.clone()]);
        let whole = set.as_frame().unwrap();
        assert_eq!(whole.kind().unwrap(), FrameKind::Composite);
        assert_eq!(whole.ref_count(), 2);

        set.attach(d.clone()).unwrap();
        assert_eq!(set.attached_count().unwrap(), 1);
        assert_eq!(d.ref_count(), 3);

        set.release();
        set.release();
        assert!(set.is_released());
        assert_eq!(whole.ref_count(), 1);
        // Still referenced by `whole`.
        assert_eq!(d.ref_count(), 2);
        assert!(matches!(set.count(), Err(Error::UseAfterRelease)));
        drop(whole);
        assert_eq!(d.ref_count(), 1);
    }

    #[test]
    fn test_non_composite_rejected() {
        let pool = FrameSetPool::new(4);
        assert!(matches!(
            pool.get(depth()),
            Err(Error::WrongFrameKind {
                expected: FrameKind::Composite,
                actual: FrameKind::Depth
            })
        ));
    }

    #[test]
    fn test_frames_advances_cursor() {
        let mut set = set_of(vec![depth(), color()]);
        let mut frames = set.frames().unwrap();
        assert_eq!(frames.len(), 2);
        frames.next().unwrap();
        assert_eq!(set.position().unwrap(), 1);
        assert_eq!(set.frames().unwrap().count(), 2);
        assert_eq!(set.position().unwrap(), 2);
    }
}
