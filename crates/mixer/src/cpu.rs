//! CPU reference compute context.
//!
//! Images are stored as linear RGBA `f32` pixels whatever their declared
//! format; YUV planes are converted on upload and download. Sampling is
//! nearest-neighbour. Slow, but exact enough to test compositing against.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use glam::{Mat4, Vec4, Vec4Swizzles};
use livemix_scene_model::{rgb_to_yuv, yuv_to_rgb, ImageHandle, PictureData, PixelFormat};

use crate::compute::{ComputeContext, ImageUniforms, KernelId};
use crate::error::MixerError;

#[derive(Debug, Clone)]
struct CpuImage {
    format: PixelFormat,
    width: u32,
    height: u32,
    pixels: Vec<Vec4>,
}

impl CpuImage {
    fn blank(format: PixelFormat, width: u32, height: u32) -> Self {
        Self {
            format,
            width,
            height,
            pixels: vec![format.clear_rgba(); width as usize * height as usize],
        }
    }

    fn texel(&self, u: f32, v: f32) -> Vec4 {
        let x = ((u * self.width as f32) as usize).min(self.width.saturating_sub(1) as usize);
        let y = ((v * self.height as f32) as usize).min(self.height.saturating_sub(1) as usize);
        self.pixels
            .get(y * self.width as usize + x)
            .copied()
            .unwrap_or(Vec4::ZERO)
    }
}

#[derive(Debug, Default)]
struct CpuStore {
    next_id: u64,
    images: HashMap<u64, CpuImage>,
    in_pass: bool,
    passes: u64,
}

impl CpuStore {
    fn insert(&mut self, image: CpuImage) -> ImageHandle {
        self.next_id += 1;
        self.images.insert(self.next_id, image);
        ImageHandle(self.next_id)
    }

    fn require_pass(&self) -> Result<(), MixerError> {
        if self.in_pass {
            Ok(())
        } else {
            Err(MixerError::compute("kernel dispatched outside a compute pass"))
        }
    }
}

/// Shareable CPU compute context.
///
/// Clones share one image store, so a test can keep a clone to download
/// what a mixer drew.
#[derive(Debug, Clone, Default)]
pub struct CpuCompute {
    store: Arc<Mutex<CpuStore>>,
}

impl CpuCompute {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, CpuStore> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of live images.
    pub fn image_count(&self) -> usize {
        self.lock().images.len()
    }

    /// Number of completed passes.
    pub fn pass_count(&self) -> u64 {
        self.lock().passes
    }

    /// Linear RGBA of one pixel, for inspection.
    pub fn pixel(&self, image: ImageHandle, x: u32, y: u32) -> Result<Vec4, MixerError> {
        let store = self.lock();
        let img = store
            .images
            .get(&image.0)
            .ok_or(MixerError::ImageNotFound { handle: image })?;
        if x >= img.width || y >= img.height {
            return Err(MixerError::compute(format!(
                "pixel ({x}, {y}) outside {}x{} image",
                img.width, img.height
            )));
        }
        Ok(img.pixels[(y * img.width + x) as usize])
    }
}

fn unit(byte: u8) -> f32 {
    byte as f32 / 255.0
}

fn byte(value: f32) -> u8 {
    (value * 255.0).round().clamp(0.0, 255.0) as u8
}

fn decode(
    data: &PictureData,
    format: PixelFormat,
    width: u32,
    height: u32,
) -> Result<Vec<Vec4>, MixerError> {
    if data.planes.len() != format.plane_count() {
        return Err(MixerError::format_mismatch(format!(
            "{format} expects {} planes, got {}",
            format.plane_count(),
            data.planes.len()
        )));
    }
    for (plane, bytes) in data.planes.iter().enumerate() {
        let expected = format.plane_len(plane, width, height);
        if bytes.len() < expected {
            return Err(MixerError::format_mismatch(format!(
                "{format} plane {plane} holds {} bytes, expected {expected}",
                bytes.len()
            )));
        }
    }

    let (w, h) = (width as usize, height as usize);
    let cw = format.plane_dims(1, width, height).0;
    let mut pixels = Vec::with_capacity(w * h);
    for y in 0..h {
        for x in 0..w {
            let i = y * w + x;
            let c = (y / 2) * cw + x / 2;
            let px = match format {
                PixelFormat::Rgba => {
                    let p = &data.planes[0][i * 4..i * 4 + 4];
                    Vec4::new(unit(p[0]), unit(p[1]), unit(p[2]), unit(p[3]))
                }
                PixelFormat::Bgra => {
                    let p = &data.planes[0][i * 4..i * 4 + 4];
                    Vec4::new(unit(p[2]), unit(p[1]), unit(p[0]), unit(p[3]))
                }
                PixelFormat::Y420p => {
                    let (r, g, b) = yuv_to_rgb(
                        unit(data.planes[0][i]),
                        unit(data.planes[1][c]),
                        unit(data.planes[2][c]),
                    );
                    Vec4::new(r, g, b, 1.0)
                }
                PixelFormat::Nv12 => {
                    let (r, g, b) = yuv_to_rgb(
                        unit(data.planes[0][i]),
                        unit(data.planes[1][c * 2]),
                        unit(data.planes[1][c * 2 + 1]),
                    );
                    Vec4::new(r, g, b, 1.0)
                }
            };
            pixels.push(px);
        }
    }
    Ok(pixels)
}

fn encode(image: &CpuImage) -> PictureData {
    let (w, h) = (image.width as usize, image.height as usize);
    let format = image.format;
    let mut planes: Vec<Vec<u8>> = (0..format.plane_count())
        .map(|plane| Vec::with_capacity(format.plane_len(plane, image.width, image.height)))
        .collect();

    match format {
        PixelFormat::Rgba | PixelFormat::Bgra => {
            for px in &image.pixels {
                let rgb = if format == PixelFormat::Rgba { px.xyz() } else { px.zyx() };
                planes[0].extend_from_slice(&[byte(rgb.x), byte(rgb.y), byte(rgb.z), byte(px.w)]);
            }
        }
        PixelFormat::Y420p | PixelFormat::Nv12 => {
            for px in &image.pixels {
                planes[0].push(byte(rgb_to_yuv(px.x, px.y, px.z).0));
            }
            let (cw, ch, _) = format.plane_dims(1, image.width, image.height);
            for cy in 0..ch {
                for cx in 0..cw {
                    // Chroma comes from the top-left pixel of each 2x2 block.
                    let px = image.pixels[(cy * 2).min(h - 1) * w + (cx * 2).min(w - 1)];
                    let (_, u, v) = rgb_to_yuv(px.x, px.y, px.z);
                    if format == PixelFormat::Nv12 {
                        planes[1].extend_from_slice(&[byte(u), byte(v)]);
                    } else {
                        planes[1].push(byte(u));
                        planes[2].push(byte(v));
                    }
                }
            }
        }
    }
    PictureData { planes }
}

fn inside_unit(p: Vec4) -> bool {
    (0.0..=1.0).contains(&p.x) && (0.0..=1.0).contains(&p.y)
}

fn invert(m: &Mat4) -> Option<Mat4> {
    let det = m.determinant();
    (det != 0.0 && det.is_finite()).then(|| m.inverse())
}

fn blend(cur: Vec4, color: Vec4, alpha: f32) -> Vec4 {
    cur * (1.0 - alpha) + color.xyz().extend(1.0) * alpha
}

fn composite_into(target: &mut CpuImage, source: &CpuImage, uniforms: &ImageUniforms) {
    let (Some(inv_matrix), Some(inv_border), Some(inv_texture)) = (
        invert(&uniforms.matrix),
        invert(&uniforms.border_matrix),
        invert(&uniforms.texture_matrix),
    ) else {
        return;
    };
    let (w, h) = (target.width as f32, target.height as f32);
    let fill_alpha = uniforms.opacity * uniforms.fill_color.w;

    for gy in 0..target.height {
        for gx in 0..target.width {
            let normpos = Vec4::new(gx as f32 / w * 2.0 - 1.0, gy as f32 / h * 2.0 - 1.0, 0.0, 1.0);
            if !inside_unit(inv_border * normpos) {
                continue;
            }
            let idx = (gy * target.width + gx) as usize;
            let cur = target.pixels[idx];
            let tx = inv_matrix * normpos;
            if inside_unit(tx) {
                let uv = inv_texture * tx;
                if inside_unit(uv) {
                    let src = source.texel(uv.x, uv.y);
                    target.pixels[idx] = blend(cur, src, uniforms.opacity * src.w);
                    continue;
                }
            }
            if fill_alpha > 0.0 {
                target.pixels[idx] = blend(cur, uniforms.fill_color, fill_alpha);
            }
        }
    }
}

impl ComputeContext for CpuCompute {
    fn name(&self) -> &str {
        "cpu"
    }

    fn create_image(
        &mut self,
        format: PixelFormat,
        width: u32,
        height: u32,
    ) -> Result<ImageHandle, MixerError> {
        if width == 0 || height == 0 {
            return Err(MixerError::compute(format!("cannot allocate {width}x{height} image")));
        }
        Ok(self.lock().insert(CpuImage::blank(format, width, height)))
    }

    fn upload(
        &mut self,
        data: &PictureData,
        format: PixelFormat,
        width: u32,
        height: u32,
    ) -> Result<ImageHandle, MixerError> {
        let pixels = decode(data, format, width, height)?;
        Ok(self.lock().insert(CpuImage {
            format,
            width,
            height,
            pixels,
        }))
    }

    fn begin_pass(&mut self) -> Result<(), MixerError> {
        let mut store = self.lock();
        if store.in_pass {
            return Err(MixerError::compute("compute pass already open"));
        }
        store.in_pass = true;
        Ok(())
    }

    fn clear(&mut self, target: ImageHandle, kernel: &KernelId) -> Result<(), MixerError> {
        let mut store = self.lock();
        store.require_pass()?;
        let image = store
            .images
            .get_mut(&target.0)
            .ok_or(MixerError::ImageNotFound { handle: target })?;
        if image.format != kernel.target {
            return Err(MixerError::format_mismatch(format!(
                "{} run on a {} image",
                kernel.name(),
                image.format
            )));
        }
        let clear = image.format.clear_rgba();
        image.pixels.fill(clear);
        Ok(())
    }

    fn composite(
        &mut self,
        source: ImageHandle,
        target: ImageHandle,
        kernel: &KernelId,
        uniforms: &ImageUniforms,
    ) -> Result<(), MixerError> {
        let mut store = self.lock();
        store.require_pass()?;
        let src = store
            .images
            .get(&source.0)
            .cloned()
            .ok_or(MixerError::ImageNotFound { handle: source })?;
        let dst = store
            .images
            .get_mut(&target.0)
            .ok_or(MixerError::ImageNotFound { handle: target })?;
        if Some(src.format) != kernel.input || dst.format != kernel.target {
            return Err(MixerError::format_mismatch(format!(
                "{} run on {} -> {}",
                kernel.name(),
                src.format,
                dst.format
            )));
        }
        composite_into(dst, &src, uniforms);
        Ok(())
    }

    fn end_pass(&mut self, _wait: bool) -> Result<(), MixerError> {
        // Work is synchronous, so every pass is complete on return.
        let mut store = self.lock();
        if !store.in_pass {
            return Err(MixerError::compute("no compute pass open"));
        }
        store.in_pass = false;
        store.passes += 1;
        Ok(())
    }

    fn download(&self, image: ImageHandle) -> Result<PictureData, MixerError> {
        let store = self.lock();
        let img = store
            .images
            .get(&image.0)
            .ok_or(MixerError::ImageNotFound { handle: image })?;
        Ok(encode(img))
    }

    fn release(&mut self, image: ImageHandle) {
        self.lock().images.remove(&image.0);
    }
}
