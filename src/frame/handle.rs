//! Reference-counted frame handles.

use std::fmt;
use std::sync::Arc;

use super::buffer::{composite_core, FrameCore, FrameKind, RawFrame};
use super::{DepthFrame, FrameSet, Points, VideoFrame};
use crate::error::{Error, Result};
use crate::stream::{StreamProfile, TimestampDomain};

/// An owned reference to a captured buffer.
///
/// Cloning adds a reference; [`Frame::release`] (or dropping the value)
/// removes it. Releasing twice is a no-op. Every accessor fails with
/// [`Error::UseAfterRelease`] once this value has been released.
pub struct Frame {
    core: Option<Arc<FrameCore>>,
}

impl Frame {
    /// Keeps a buffer handed out by a capture callback beyond the callback.
    pub fn acquire(raw: &RawFrame) -> Result<Self> {
        let core = raw.core.as_ref().ok_or(Error::InvalidHandle)?;
        Ok(Self::from_core(Arc::clone(core)))
    }

    /// Takes ownership of the callback's own reference.
    pub fn from_raw(raw: RawFrame) -> Result<Self> {
        raw.core.map(Self::from_core).ok_or(Error::InvalidHandle)
    }

    /// Builds a composite frame over `frames`, taking ownership of their
    /// references. Metadata is taken from the first component.
    pub fn composite(frames: Vec<Frame>) -> Result<Self> {
        composite_core(frames).map(Self::from_core)
    }

    pub(crate) fn from_core(core: Arc<FrameCore>) -> Self {
        Self { core: Some(core) }
    }

    pub(crate) fn core(&self) -> Result<&FrameCore> {
        self.core.as_deref().ok_or(Error::UseAfterRelease)
    }

    /// Drops this reference. Safe to call any number of times.
    pub fn release(&mut self) {
        if let Some(core) = self.core.take() {
            tracing::trace!(
                stream = %core.profile.kind(),
                number = core.number,
                remaining = Arc::strong_count(&core) - 1,
                "Frame released"
            );
        }
    }

    #[inline]
    pub fn is_released(&self) -> bool {
        self.core.is_none()
    }

    /// Number of live references to the underlying buffer, 0 once released.
    pub fn ref_count(&self) -> usize {
        self.core.as_ref().map_or(0, Arc::strong_count)
    }

    /// True when both values refer to the same live buffer.
    pub fn same_buffer(&self, other: &Frame) -> bool {
        match (&self.core, &other.core) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub fn kind(&self) -> Result<FrameKind> {
        Ok(self.core()?.kind())
    }

    pub fn profile(&self) -> Result<StreamProfile> {
        Ok(self.core()?.profile)
    }

    pub fn frame_number(&self) -> Result<u64> {
        Ok(self.core()?.number)
    }

    /// Timestamp in milliseconds, in [`Frame::timestamp_domain`].
    pub fn timestamp(&self) -> Result<f64> {
        Ok(self.core()?.timestamp)
    }

    pub fn timestamp_domain(&self) -> Result<TimestampDomain> {
        Ok(self.core()?.domain)
    }

    /// Raw buffer contents. Empty for composite frames.
    pub fn data(&self) -> Result<&[u8]> {
        Ok(self.core()?.data())
    }

    pub fn data_size(&self) -> Result<usize> {
        Ok(self.core()?.data().len())
    }

    /// Video view of this buffer (new reference), for video and depth frames.
    pub fn as_video(&self) -> Option<VideoFrame> {
        self.clone().into_video().ok()
    }

    pub fn as_depth(&self) -> Option<DepthFrame> {
        self.clone().into_depth().ok()
    }

    pub fn as_points(&self) -> Option<Points> {
        self.clone().into_points().ok()
    }

    /// Wraps a composite frame in a pooled [`FrameSet`] (new reference).
    pub fn as_frameset(&self) -> Option<FrameSet> {
        FrameSet::from_composite(self.clone()).ok()
    }

    pub fn into_video(self) -> Result<VideoFrame> {
        match self.kind()? {
            FrameKind::Video | FrameKind::Depth => Ok(VideoFrame::new(self)),
            actual => Err(Error::WrongFrameKind {
                expected: FrameKind::Video,
                actual,
            }),
        }
    }

    pub fn into_depth(self) -> Result<DepthFrame> {
        match self.kind()? {
            FrameKind::Depth => Ok(DepthFrame::new(VideoFrame::new(self))),
            actual => Err(Error::WrongFrameKind {
                expected: FrameKind::Depth,
                actual,
            }),
        }
    }

    pub fn into_points(self) -> Result<Points> {
        match self.kind()? {
            FrameKind::Points => Ok(Points::new(self)),
            actual => Err(Error::WrongFrameKind {
                expected: FrameKind::Points,
                actual,
            }),
        }
    }

    pub fn into_frameset(self) -> Result<FrameSet> {
        FrameSet::from_composite(self)
    }
}

impl Clone for Frame {
    fn clone(&self) -> Self {
        Self {
            core: self.core.clone(),
        }
    }
}

impl Drop for Frame {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.core {
            Some(core) => f
                .debug_struct("Frame")
                .field("kind", &core.kind())
                .field("profile", &core.profile)
                .field("number", &core.number)
                .field("timestamp", &core.timestamp)
                .field("refs", &Arc::strong_count(core))
                .finish(),
            None => f.write_str("Frame(released)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::buffer::{BufferSink, FrameBuilder};
    use crate::stream::{Format, StreamKind};
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingSink(AtomicUsize);

    impl BufferSink for CountingSink {
        fn reclaim(&self, _buffer: Vec<u8>) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn color_raw(sink: Arc<CountingSink>) -> RawFrame {
        let profile = StreamProfile::video(StreamKind::Color, 0, Format::Rgb8, 30, 2, 2, 2);
        FrameBuilder::video(profile, vec![7u8; 12], 2, 2, 6, 24)
            .number(42)
            .timestamp(1400.0, TimestampDomain::HardwareClock)
            .recycle_into(sink)
            .build()
            .unwrap()
    }

    #[test]
    fn test_acquire_null_is_invalid_handle() {
        assert!(matches!(
            Frame::acquire(&RawFrame::null()),
            Err(Error::InvalidHandle)
        ));
        assert!(matches!(
            Frame::from_raw(RawFrame::null()),
            Err(Error::InvalidHandle)
        ));
    }

    #[test]
    fn test_acquire_keeps_buffer_past_callback() {
        let sink = Arc::new(CountingSink::default());
        let raw = color_raw(sink.clone());
        let frame = Frame::acquire(&raw).unwrap();
        assert_eq!(frame.ref_count(), 2);

        drop(raw);
        assert_eq!(frame.ref_count(), 1);
        assert_eq!(sink.0.load(Ordering::SeqCst), 0);
        assert_eq!(frame.frame_number().unwrap(), 42);
        assert_eq!(frame.data().unwrap(), &[7u8; 12][..]);

        drop(frame);
        assert_eq!(sink.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_release_is_idempotent() {
        let sink = Arc::new(CountingSink::default());
        let mut frame = Frame::from_raw(color_raw(sink.clone())).unwrap();
        frame.release();
        frame.release();
        assert!(frame.is_released());
        assert_eq!(frame.ref_count(), 0);
        assert_eq!(sink.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_accessors_fail_after_release() {
        let mut frame = Frame::from_raw(color_raw(Arc::default())).unwrap();
        frame.release();
        assert!(matches!(frame.timestamp(), Err(Error::UseAfterRelease)));
        assert!(matches!(frame.data(), Err(Error::UseAfterRelease)));
        assert!(matches!(frame.profile(), Err(Error::UseAfterRelease)));
        assert!(matches!(frame.timestamp_domain(), Err(Error::UseAfterRelease)));
        assert!(frame.as_video().is_none());
    }

    #[test]
    fn test_clone_of_released_frame_is_released() {
        let mut frame = Frame::from_raw(color_raw(Arc::default())).unwrap();
        frame.release();
        let copy = frame.clone();
        assert!(copy.is_released());
    }

    #[test]
    fn test_wrong_variant_conversion() {
        let frame = Frame::from_raw(color_raw(Arc::default())).unwrap();
        assert!(frame.as_video().is_some());
        assert!(frame.as_depth().is_none());
        assert!(matches!(
            frame.clone().into_points(),
            Err(Error::WrongFrameKind {
                expected: FrameKind::Points,
                actual: FrameKind::Video
            })
        ));
        assert!(frame.as_frameset().is_none());
    }

    #[test]
    fn test_composite_requires_frames() {
        assert!(matches!(Frame::composite(Vec::new()), Err(Error::InvalidHandle)));
    }

    proptest! {
        #[test]
        fn prop_buffer_freed_exactly_once(clones in 0usize..16, extra_releases in 0usize..4) {
            let sink = Arc::new(CountingSink::default());
            let original = Frame::from_raw(color_raw(sink.clone())).unwrap();
            let mut frames: Vec<Frame> = (0..clones).map(|_| original.clone()).collect();
            frames.push(original);
            prop_assert_eq!(frames[0].ref_count(), clones + 1);

            let last = frames.len() - 1;
            for frame in frames.iter_mut().take(last) {
                frame.release();
            }
            prop_assert_eq!(sink.0.load(Ordering::SeqCst), 0);
            prop_assert_eq!(frames[last].ref_count(), 1);

            for _ in 0..=extra_releases {
                frames[last].release();
            }
            prop_assert_eq!(sink.0.load(Ordering::SeqCst), 1);
        }
    }
}
