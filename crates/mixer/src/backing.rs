//! Ring of reusable output images.

use livemix_scene_model::{ImageHandle, PixelFormat};

use crate::compute::ComputeContext;
use crate::error::MixerError;

/// Output images the picture mixer draws into, one per tick.
///
/// The ring grows lazily up to `capacity`, then hands images out again in
/// order. An emitted image stays intact for `capacity - 1` further ticks.
#[derive(Debug)]
pub struct BackingRing {
    capacity: usize,
    format: PixelFormat,
    width: u32,
    height: u32,
    images: Vec<ImageHandle>,
    cursor: usize,
}

impl BackingRing {
    pub fn new(capacity: usize, format: PixelFormat, width: u32, height: u32) -> Self {
        Self {
            capacity: capacity.max(1),
            format,
            width,
            height,
            images: Vec::new(),
            cursor: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Images allocated so far.
    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Next image to draw into.
    pub fn acquire(&mut self, ctx: &mut dyn ComputeContext) -> Result<ImageHandle, MixerError> {
        if self.images.len() < self.capacity {
            let image = ctx.create_image(self.format, self.width, self.height)?;
            self.images.push(image);
            return Ok(image);
        }
        let image = self.images[self.cursor];
        self.cursor = (self.cursor + 1) % self.images.len();
        Ok(image)
    }

    /// Free every image back to `ctx`.
    pub fn release_all(&mut self, ctx: &mut dyn ComputeContext) {
        for image in self.images.drain(..) {
            ctx.release(image);
        }
        self.cursor = 0;
    }
}
