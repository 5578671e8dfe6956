//! Compute collaborator contract.
//!
//! The picture mixer never touches pixels. It asks a [`ComputeContext`] to
//! allocate images, clear them and composite sources into them, one pass
//! per tick. Kernels are named `img_{input}_{target}` after the pixel
//! formats they read and write (`img_clear_{target}` for the clear pass);
//! which pairs exist is decided by a [`KernelRegistry`], and a missing pair
//! is an error rather than a skipped draw.

use std::collections::BTreeSet;

use glam::{Mat4, Vec4};
use livemix_scene_model::{ImageHandle, PictureData, PictureSample, PixelFormat};

use crate::error::{kernel_name, MixerError};

/// A resolved kernel: the format pair it converts between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KernelId {
    /// `None` for the clear kernel.
    pub input: Option<PixelFormat>,
    pub target: PixelFormat,
}

impl KernelId {
    pub fn name(&self) -> String {
        kernel_name(&self.input, &self.target)
    }

    pub fn is_clear(&self) -> bool {
        self.input.is_none()
    }
}

/// Kernels every context is expected to provide.
const DEFAULT_KERNELS: &[&str] = &[
    "img_nv12_nv12",
    "img_bgra_nv12",
    "img_rgba_nv12",
    "img_bgra_bgra",
    "img_rgba_rgba",
    "img_y420p_y420p",
    "img_y420p_nv12",
    "img_rgba_y420p",
    "img_bgra_y420p",
    "img_clear_nv12",
    "img_clear_bgra",
    "img_clear_rgba",
    "img_clear_y420p",
];

/// Set of kernel names a mixer may dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelRegistry {
    names: BTreeSet<String>,
}

impl Default for KernelRegistry {
    fn default() -> Self {
        Self {
            names: DEFAULT_KERNELS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl KernelRegistry {
    pub fn empty() -> Self {
        Self {
            names: BTreeSet::new(),
        }
    }

    pub fn register(&mut self, name: impl Into<String>) {
        self.names.insert(name.into());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// Resolve the kernel for drawing `input` (or clearing) into `target`.
    pub fn lookup(
        &self,
        input: Option<PixelFormat>,
        target: PixelFormat,
    ) -> Result<KernelId, MixerError> {
        let id = KernelId { input, target };
        if self.names.contains(&id.name()) {
            Ok(id)
        } else {
            Err(MixerError::KernelNotFound { input, target })
        }
    }
}

/// Per-draw parameters handed to a composite kernel.
///
/// Matrices map the unit square into normalized device coordinates; kernels
/// invert them to find which source texel (or border fill) lands on each
/// target pixel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageUniforms {
    pub matrix: Mat4,
    pub texture_matrix: Mat4,
    pub border_matrix: Mat4,
    pub fill_color: Vec4,
    pub opacity: f32,
}

impl ImageUniforms {
    pub fn from_sample(sample: &PictureSample) -> Self {
        Self {
            matrix: sample.matrix,
            texture_matrix: sample.texture_matrix,
            border_matrix: sample.border_matrix,
            fill_color: sample.fill_color,
            opacity: sample.opacity,
        }
    }
}

/// GPU (or GPU-like) execution backend for the picture mixer.
///
/// All drawing happens between [`begin_pass`](Self::begin_pass) and
/// [`end_pass`](Self::end_pass). Operations inside a pass are applied in
/// call order, which is what makes z-ordering meaningful.
pub trait ComputeContext: Send {
    /// Backend name for logs.
    fn name(&self) -> &str;

    /// Allocate a target image.
    fn create_image(
        &mut self,
        format: PixelFormat,
        width: u32,
        height: u32,
    ) -> Result<ImageHandle, MixerError>;

    /// Copy CPU planes into a new image.
    fn upload(
        &mut self,
        data: &PictureData,
        format: PixelFormat,
        width: u32,
        height: u32,
    ) -> Result<ImageHandle, MixerError>;

    fn begin_pass(&mut self) -> Result<(), MixerError>;

    /// Run a clear kernel on `target`.
    fn clear(&mut self, target: ImageHandle, kernel: &KernelId) -> Result<(), MixerError>;

    /// Blend `source` into `target` through `uniforms`.
    fn composite(
        &mut self,
        source: ImageHandle,
        target: ImageHandle,
        kernel: &KernelId,
        uniforms: &ImageUniforms,
    ) -> Result<(), MixerError>;

    /// Close the pass; with `wait`, return only once its work has finished.
    fn end_pass(&mut self, wait: bool) -> Result<(), MixerError>;

    /// Read an image back into CPU planes.
    fn download(&self, image: ImageHandle) -> Result<PictureData, MixerError>;

    /// Free an image. Unknown handles are ignored.
    fn release(&mut self, image: ImageHandle);
}
