//! Point cloud frames.

use std::mem::size_of;
use std::ops::Deref;

use super::buffer::{Payload, TexCoord, Vertex};
use super::Frame;
use crate::error::{Error, Result};

/// A frame holding a point cloud, typically produced by a processing block.
#[derive(Debug, Clone)]
pub struct Points(Frame);

impl Points {
    pub(crate) fn new(frame: Frame) -> Self {
        Self(frame)
    }

    fn parts(&self) -> Result<(&[Vertex], &[TexCoord])> {
        match &self.0.core()?.payload {
            Payload::Points { vertices, tex_coords } => Ok((vertices, tex_coords)),
            _ => Err(Error::UseAfterRelease),
        }
    }

    /// Number of vertices.
    pub fn count(&self) -> Result<usize> {
        Ok(self.parts()?.0.len())
    }

    pub fn vertices(&self) -> Result<&[Vertex]> {
        Ok(self.parts()?.0)
    }

    /// Texture coordinates; empty when the cloud was not textured.
    pub fn texture_coordinates(&self) -> Result<&[TexCoord]> {
        Ok(self.parts()?.1)
    }

    pub fn copy_vertices(&self, dest: &mut [Vertex]) -> Result<()> {
        let (vertices, _) = self.parts()?;
        check_capacity::<Vertex>(vertices.len(), dest.len())?;
        dest.copy_from_slice(vertices);
        Ok(())
    }

    pub fn copy_texture_coordinates(&self, dest: &mut [TexCoord]) -> Result<()> {
        let (vertices, tex_coords) = self.parts()?;
        check_capacity::<TexCoord>(vertices.len(), dest.len())?;
        if tex_coords.is_empty() {
            dest.fill(TexCoord::default());
        } else {
            dest.copy_from_slice(tex_coords);
        }
        Ok(())
    }

    pub fn into_frame(self) -> Frame {
        self.0
    }
}

fn check_capacity<T>(count: usize, capacity: usize) -> Result<()> {
    if count != capacity {
        return Err(Error::SizeMismatch {
            expected: count * size_of::<T>(),
            actual: capacity * size_of::<T>(),
        });
    }
    Ok(())
}

impl Deref for Points {
    type Target = Frame;

    fn deref(&self) -> &Frame {
        &self.0
    }
}

impl AsRef<Frame> for Points {
    fn as_ref(&self) -> &Frame {
        &self.0
    }
}
