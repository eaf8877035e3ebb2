//! Video and depth views over a frame.

use std::ops::Deref;

use super::buffer::{Payload, VideoLayout};
use super::Frame;
use crate::error::{Error, Result};

/// A frame carrying a 2D image.
#[derive(Debug, Clone)]
pub struct VideoFrame(Frame);

impl VideoFrame {
    pub(crate) fn new(frame: Frame) -> Self {
        Self(frame)
    }

    fn layout(&self) -> Result<&VideoLayout> {
        let core = self.0.core()?;
        // Only constructed from video or depth frames.
        core.layout().ok_or(Error::UseAfterRelease)
    }

    pub fn width(&self) -> Result<u32> {
        Ok(self.layout()?.width)
    }

    pub fn height(&self) -> Result<u32> {
        Ok(self.layout()?.height)
    }

    /// Bytes per row, including padding.
    pub fn stride(&self) -> Result<u32> {
        Ok(self.layout()?.stride)
    }

    pub fn bits_per_pixel(&self) -> Result<u32> {
        Ok(self.layout()?.bits_per_pixel)
    }

    pub fn bytes_per_pixel(&self) -> Result<u32> {
        Ok(self.layout()?.bits_per_pixel / 8)
    }

    /// Copies `stride * height` bytes into `dest`, which must be exactly
    /// that long.
    pub fn copy_to(&self, dest: &mut [u8]) -> Result<()> {
        let layout = *self.layout()?;
        let expected = layout.stride as usize * layout.height as usize;
        if dest.len() != expected {
            return Err(Error::SizeMismatch {
                expected,
                actual: dest.len(),
            });
        }
        dest.copy_from_slice(&self.0.data()?[..expected]);
        Ok(())
    }

    pub fn into_frame(self) -> Frame {
        self.0
    }
}

impl Deref for VideoFrame {
    type Target = Frame;

    fn deref(&self) -> &Frame {
        &self.0
    }
}

impl AsRef<Frame> for VideoFrame {
    fn as_ref(&self) -> &Frame {
        &self.0
    }
}

/// A Z16 depth image.
#[derive(Debug, Clone)]
pub struct DepthFrame(VideoFrame);

impl DepthFrame {
    pub(crate) fn new(video: VideoFrame) -> Self {
        Self(video)
    }

    /// Meters per raw depth unit.
    pub fn depth_scale(&self) -> Result<f32> {
        match &self.0.core()?.payload {
            Payload::Depth(_, _, scale) => Ok(*scale),
            _ => Err(Error::UseAfterRelease),
        }
    }

    /// Distance in meters at pixel (`x`, `y`).
    ///
    /// Coordinates outside the image yield `0.0`, the same value as a pixel
    /// without depth data.
    pub fn distance(&self, x: i32, y: i32) -> Result<f32> {
        let scale = self.depth_scale()?;
        let width = self.0.width()?;
        let height = self.0.height()?;
        let stride = self.0.stride()? as usize;
        if x < 0 || y < 0 || x as u32 >= width || y as u32 >= height {
            return Ok(0.0);
        }
        let data = self.0.data()?;
        let offset = y as usize * stride + x as usize * 2;
        let raw = u16::from_le_bytes([data[offset], data[offset + 1]]);
        Ok(raw as f32 * scale)
    }

    pub fn into_video(self) -> VideoFrame {
        self.0
    }
}

impl Deref for DepthFrame {
    type Target = VideoFrame;

    fn deref(&self) -> &VideoFrame {
        &self.0
    }
}

impl AsRef<Frame> for DepthFrame {
    fn as_ref(&self) -> &Frame {
        &self.0 .0
    }
}
