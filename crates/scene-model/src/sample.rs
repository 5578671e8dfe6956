//! Media samples exchanged between sources, animators, and mixers.
//!
//! Routing is explicit: anything entering the composer is a [`MediaSample`]
//! and only its `Audio` and `Picture` variants reach a mixer.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use glam::{Mat3, Mat4, Vec2, Vec4};
use livemix_common::RationalTime;
use serde::{Deserialize, Serialize};

/// Sample layout for audio buffers.
///
/// `*i` formats interleave every channel in one buffer, `*p` formats keep
/// one buffer per channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    S16i,
    S16p,
    F32i,
    F32p,
    F64i,
    F64p,
    S64i,
    S64p,
}

/// Pixel layout for picture buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    /// Luma plane plus one interleaved half-resolution chroma plane.
    Nv12,
    /// Luma plane plus two half-resolution chroma planes.
    Y420p,
    Rgba,
    Bgra,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} format '{name}'")]
pub struct UnknownFormat {
    pub kind: &'static str,
    pub name: String,
}

impl AudioFormat {
    pub fn name(self) -> &'static str {
        match self {
            AudioFormat::S16i => "s16i",
            AudioFormat::S16p => "s16p",
            AudioFormat::F32i => "f32i",
            AudioFormat::F32p => "f32p",
            AudioFormat::F64i => "f64i",
            AudioFormat::F64p => "f64p",
            AudioFormat::S64i => "s64i",
            AudioFormat::S64p => "s64p",
        }
    }

    pub fn is_planar(self) -> bool {
        matches!(
            self,
            AudioFormat::S16p | AudioFormat::F32p | AudioFormat::F64p | AudioFormat::S64p
        )
    }

    /// Bytes for one value of one channel.
    pub fn bytes_per_sample(self) -> usize {
        match self {
            AudioFormat::S16i | AudioFormat::S16p => 2,
            AudioFormat::F32i | AudioFormat::F32p => 4,
            AudioFormat::F64i | AudioFormat::F64p | AudioFormat::S64i | AudioFormat::S64p => 8,
        }
    }

    /// Number of buffers a sample with `channels` channels carries.
    pub fn buffer_count(self, channels: usize) -> usize {
        if self.is_planar() {
            channels
        } else {
            1
        }
    }

    /// Bytes one frame occupies within a single buffer.
    pub fn frame_stride(self, channels: usize) -> usize {
        if self.is_planar() {
            self.bytes_per_sample()
        } else {
            self.bytes_per_sample() * channels
        }
    }

    fn read_value(self, bytes: &[u8]) -> f64 {
        match self {
            AudioFormat::S16i | AudioFormat::S16p => {
                i16::from_le_bytes([bytes[0], bytes[1]]) as f64 / 32_768.0
            }
            AudioFormat::F32i | AudioFormat::F32p => {
                f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f64
            }
            AudioFormat::F64i | AudioFormat::F64p => {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(&bytes[..8]);
                f64::from_le_bytes(raw)
            }
            AudioFormat::S64i | AudioFormat::S64p => {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(&bytes[..8]);
                i64::from_le_bytes(raw) as f64 / 9_223_372_036_854_775_808.0
            }
        }
    }

    /// Append one value, hard-clipped to the format's range.
    fn write_value(self, value: f64, out: &mut Vec<u8>) {
        let value = value.clamp(-1.0, 1.0);
        match self {
            AudioFormat::S16i | AudioFormat::S16p => {
                let v = (value * 32_768.0)
                    .round()
                    .clamp(i16::MIN as f64, i16::MAX as f64) as i16;
                out.extend_from_slice(&v.to_le_bytes());
            }
            AudioFormat::F32i | AudioFormat::F32p => {
                out.extend_from_slice(&(value as f32).to_le_bytes());
            }
            AudioFormat::F64i | AudioFormat::F64p => {
                out.extend_from_slice(&value.to_le_bytes());
            }
            AudioFormat::S64i | AudioFormat::S64p => {
                // `as` saturates at i64::MAX for +1.0.
                let v = (value * 9_223_372_036_854_775_808.0) as i64;
                out.extend_from_slice(&v.to_le_bytes());
            }
        }
    }

    /// Decode buffers into one `[-1, 1]` plane per channel.
    ///
    /// Trailing partial frames and missing planar buffers decode as silence.
    pub fn decode(self, buffers: &[Vec<u8>], channels: usize) -> Vec<Vec<f64>> {
        if buffers.is_empty() {
            return vec![Vec::new(); channels];
        }
        let bps = self.bytes_per_sample();
        let stride = self.frame_stride(channels);
        let frames = buffers
            .first()
            .map(|b| b.len() / stride.max(1))
            .unwrap_or(0);
        let mut planes = vec![vec![0.0; frames]; channels];
        for (ch, plane) in planes.iter_mut().enumerate() {
            let (buffer, base) = if self.is_planar() {
                match buffers.get(ch) {
                    Some(buffer) => (buffer, 0),
                    None => continue,
                }
            } else {
                (&buffers[0], ch * bps)
            };
            for (frame, value) in plane.iter_mut().enumerate() {
                let at = frame * stride + base;
                if at + bps <= buffer.len() {
                    *value = self.read_value(&buffer[at..at + bps]);
                }
            }
        }
        planes
    }

    /// Encode per-channel planes, clipping every value.
    pub fn encode(self, planes: &[Vec<f64>]) -> Vec<Vec<u8>> {
        let channels = planes.len();
        let frames = planes.iter().map(Vec::len).max().unwrap_or(0);
        let bps = self.bytes_per_sample();
        if self.is_planar() {
            planes
                .iter()
                .map(|plane| {
                    let mut out = Vec::with_capacity(frames * bps);
                    for frame in 0..frames {
                        self.write_value(plane.get(frame).copied().unwrap_or(0.0), &mut out);
                    }
                    out
                })
                .collect()
        } else {
            let mut out = Vec::with_capacity(frames * channels * bps);
            for frame in 0..frames {
                for plane in planes {
                    self.write_value(plane.get(frame).copied().unwrap_or(0.0), &mut out);
                }
            }
            vec![out]
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AudioFormat {
    type Err = UnknownFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let format = match s.to_ascii_lowercase().as_str() {
            "s16i" => AudioFormat::S16i,
            "s16p" => AudioFormat::S16p,
            "f32i" => AudioFormat::F32i,
            "f32p" => AudioFormat::F32p,
            "f64i" => AudioFormat::F64i,
            "f64p" => AudioFormat::F64p,
            "s64i" => AudioFormat::S64i,
            "s64p" => AudioFormat::S64p,
            _ => {
                return Err(UnknownFormat {
                    kind: "audio",
                    name: s.to_string(),
                })
            }
        };
        Ok(format)
    }
}

impl PixelFormat {
    pub fn name(self) -> &'static str {
        match self {
            PixelFormat::Nv12 => "nv12",
            PixelFormat::Y420p => "y420p",
            PixelFormat::Rgba => "rgba",
            PixelFormat::Bgra => "bgra",
        }
    }

    pub fn is_yuv(self) -> bool {
        matches!(self, PixelFormat::Nv12 | PixelFormat::Y420p)
    }

    pub fn plane_count(self) -> usize {
        match self {
            PixelFormat::Nv12 => 2,
            PixelFormat::Y420p => 3,
            PixelFormat::Rgba | PixelFormat::Bgra => 1,
        }
    }

    /// `(width, height, bytes per pixel)` of one plane.
    pub fn plane_dims(self, plane: usize, width: u32, height: u32) -> (usize, usize, usize) {
        let (w, h) = (width as usize, height as usize);
        let (cw, ch) = ((w + 1) / 2, (h + 1) / 2);
        match (self, plane) {
            (PixelFormat::Rgba | PixelFormat::Bgra, _) => (w, h, 4),
            (_, 0) => (w, h, 1),
            (PixelFormat::Nv12, _) => (cw, ch, 2),
            (PixelFormat::Y420p, _) => (cw, ch, 1),
        }
    }

    pub fn plane_len(self, plane: usize, width: u32, height: u32) -> usize {
        let (w, h, bpp) = self.plane_dims(plane, width, height);
        w * h * bpp
    }

    /// Linear RGBA a freshly cleared image of this format represents.
    ///
    /// YUV images clear to opaque black, RGB images to transparent black.
    pub fn clear_rgba(self) -> Vec4 {
        if self.is_yuv() {
            Vec4::new(0.0, 0.0, 0.0, 1.0)
        } else {
            Vec4::ZERO
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PixelFormat {
    type Err = UnknownFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let format = match s.to_ascii_lowercase().as_str() {
            "nv12" => PixelFormat::Nv12,
            "y420p" => PixelFormat::Y420p,
            "rgba" => PixelFormat::Rgba,
            "bgra" => PixelFormat::Bgra,
            _ => {
                return Err(UnknownFormat {
                    kind: "pixel",
                    name: s.to_string(),
                })
            }
        };
        Ok(format)
    }
}

/// Full-range BT.601 RGB to YUV, all components in `[0, 1]`.
pub fn rgb_to_yuv(r: f32, g: f32, b: f32) -> (f32, f32, f32) {
    let y = 0.299 * r + 0.587 * g + 0.114 * b;
    let u = -0.169 * r - 0.331 * g + 0.5 * b + 0.5;
    let v = 0.5 * r - 0.419 * g - 0.081 * b + 0.5;
    (y, u.clamp(0.0, 1.0), v.clamp(0.0, 1.0))
}

/// Inverse of [`rgb_to_yuv`], clamped to `[0, 1]`.
pub fn yuv_to_rgb(y: f32, u: f32, v: f32) -> (f32, f32, f32) {
    let (u, v) = (u - 0.5, v - 0.5);
    let r = y + 1.402 * v;
    let g = y - 0.344 * u - 0.714 * v;
    let b = y + 1.772 * u;
    (r.clamp(0.0, 1.0), g.clamp(0.0, 1.0), b.clamp(0.0, 1.0))
}

/// Provenance of one contribution to a mixed output sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaConstituent {
    /// Mixer-facing source id that contributed.
    pub source_id: String,
    /// Start of the contribution in the source's own timeline.
    pub pts: RationalTime,
    /// Length of the contribution.
    pub duration: RationalTime,
    /// Start of the contribution in the mixer's timeline.
    pub normalized_pts: RationalTime,
}

/// A block of PCM audio.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioSample {
    /// One buffer (interleaved) or one per channel (planar).
    pub buffers: Vec<Vec<u8>>,
    pub sample_rate: u32,
    pub channels: u32,
    pub format: AudioFormat,
    /// Frames per channel.
    pub sample_count: usize,
    /// Clock time the sample was produced at.
    pub time: RationalTime,
    pub pts: RationalTime,
    pub asset_id: String,
    pub workspace_id: String,
    /// Key the audio mixer queues this sample under.
    pub source_id: String,
    /// Pan/gain transform on the unit audio plane.
    pub transform: Mat3,
    pub constituents: Vec<MediaConstituent>,
}

impl AudioSample {
    /// Wrap already encoded buffers. `source_id` starts as the asset id.
    pub fn new(
        buffers: Vec<Vec<u8>>,
        sample_rate: u32,
        channels: u32,
        format: AudioFormat,
        sample_count: usize,
        pts: RationalTime,
        asset_id: impl Into<String>,
    ) -> Self {
        let asset_id = asset_id.into();
        Self {
            buffers,
            sample_rate,
            channels,
            format,
            sample_count,
            time: pts,
            pts,
            source_id: asset_id.clone(),
            asset_id,
            workspace_id: String::new(),
            transform: Mat3::IDENTITY,
            constituents: Vec::new(),
        }
    }

    /// Encode per-channel planes into a new sample.
    pub fn from_planes(
        planes: &[Vec<f64>],
        sample_rate: u32,
        format: AudioFormat,
        pts: RationalTime,
        asset_id: impl Into<String>,
    ) -> Self {
        let sample_count = planes.iter().map(Vec::len).max().unwrap_or(0);
        Self::new(
            format.encode(planes),
            sample_rate,
            planes.len() as u32,
            format,
            sample_count,
            pts,
            asset_id,
        )
    }

    /// Decode into one plane per channel.
    pub fn to_planes(&self) -> Vec<Vec<f64>> {
        let mut planes = self.format.decode(&self.buffers, self.channels as usize);
        for plane in &mut planes {
            plane.truncate(self.sample_count);
        }
        planes
    }

    /// Duration in the sample's own rate.
    pub fn duration(&self) -> RationalTime {
        RationalTime::new(self.sample_count as i64, self.sample_rate.max(1) as i64)
    }

    pub fn with_workspace(mut self, workspace_id: impl Into<String>) -> Self {
        self.workspace_id = workspace_id.into();
        self
    }
}

/// Opaque image reference owned by a compute context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ImageHandle(pub u64);

/// CPU-resident pixel planes, tightly packed per [`PixelFormat::plane_dims`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PictureData {
    pub planes: Vec<Vec<u8>>,
}

impl PictureData {
    /// A `width`x`height` image of one solid RGBA color.
    pub fn solid(format: PixelFormat, width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let [r, g, b, a] = rgba;
        let (y, u, v) = rgb_to_yuv(r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0);
        let to_byte = |x: f32| (x * 255.0).round().clamp(0.0, 255.0) as u8;
        let planes = (0..format.plane_count())
            .map(|plane| {
                let (w, h, _) = format.plane_dims(plane, width, height);
                let texel: Vec<u8> = match (format, plane) {
                    (PixelFormat::Rgba, _) => vec![r, g, b, a],
                    (PixelFormat::Bgra, _) => vec![b, g, r, a],
                    (_, 0) => vec![to_byte(y)],
                    (PixelFormat::Nv12, _) => vec![to_byte(u), to_byte(v)],
                    (PixelFormat::Y420p, 1) => vec![to_byte(u)],
                    (PixelFormat::Y420p, _) => vec![to_byte(v)],
                };
                texel.repeat(w * h)
            })
            .collect();
        Self { planes }
    }
}

/// Where a picture's pixels live.
#[derive(Debug, Clone, PartialEq)]
pub enum PictureBuffer {
    Cpu(Arc<PictureData>),
    Gpu(ImageHandle),
}

/// A single picture with its placement on the output canvas.
#[derive(Debug, Clone, PartialEq)]
pub struct PictureSample {
    pub buffer: PictureBuffer,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    /// Maps the unit square onto normalized device coordinates.
    pub matrix: Mat4,
    /// Maps the unit square onto texture coordinates.
    pub texture_matrix: Mat4,
    /// Maps the unit square onto the border/matte rectangle.
    pub border_matrix: Mat4,
    pub fill_color: Vec4,
    pub opacity: f32,
    pub time: RationalTime,
    pub pts: RationalTime,
    pub asset_id: String,
    pub workspace_id: String,
    /// Key the picture mixer keeps the latest sample under.
    pub source_id: String,
    pub constituents: Vec<MediaConstituent>,
}

impl PictureSample {
    /// A picture with identity placement. `source_id` starts as the asset id.
    pub fn new(
        buffer: PictureBuffer,
        width: u32,
        height: u32,
        format: PixelFormat,
        pts: RationalTime,
        asset_id: impl Into<String>,
    ) -> Self {
        let asset_id = asset_id.into();
        Self {
            buffer,
            width,
            height,
            format,
            matrix: Mat4::IDENTITY,
            texture_matrix: Mat4::IDENTITY,
            border_matrix: Mat4::IDENTITY,
            fill_color: Vec4::ZERO,
            opacity: 1.0,
            time: pts,
            pts,
            source_id: asset_id.clone(),
            asset_id,
            workspace_id: String::new(),
            constituents: Vec::new(),
        }
    }

    pub fn size(&self) -> Vec2 {
        Vec2::new(self.width as f32, self.height as f32)
    }

    /// Draw order: the depth of the placement's translation.
    ///
    /// The depth is not rounded, so fractional z values order continuously
    /// (0.25 draws under 0.5, which draws under 1).
    pub fn z_index(&self) -> f32 {
        self.matrix.w_axis.z
    }

    pub fn with_workspace(mut self, workspace_id: impl Into<String>) -> Self {
        self.workspace_id = workspace_id.into();
        self
    }
}

/// Encoded media; passes through the composer untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct CodedSample {
    pub data: Vec<u8>,
    pub codec: String,
    pub pts: RationalTime,
    pub dts: RationalTime,
    pub asset_id: String,
}

/// Every sample kind the engine routes.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaSample {
    Audio(AudioSample),
    Picture(PictureSample),
    Coded(CodedSample),
}

impl MediaSample {
    pub fn asset_id(&self) -> &str {
        match self {
            MediaSample::Audio(s) => &s.asset_id,
            MediaSample::Picture(s) => &s.asset_id,
            MediaSample::Coded(s) => &s.asset_id,
        }
    }

    pub fn pts(&self) -> RationalTime {
        match self {
            MediaSample::Audio(s) => s.pts,
            MediaSample::Picture(s) => s.pts,
            MediaSample::Coded(s) => s.pts,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            MediaSample::Audio(_) => "audio",
            MediaSample::Picture(_) => "picture",
            MediaSample::Coded(_) => "coded",
        }
    }
}

impl From<AudioSample> for MediaSample {
    fn from(sample: AudioSample) -> Self {
        MediaSample::Audio(sample)
    }
}

impl From<PictureSample> for MediaSample {
    fn from(sample: PictureSample) -> Self {
        MediaSample::Picture(sample)
    }
}

impl From<CodedSample> for MediaSample {
    fn from(sample: CodedSample) -> Self {
        MediaSample::Coded(sample)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const AUDIO_FORMATS: [AudioFormat; 8] = [
        AudioFormat::S16i,
        AudioFormat::S16p,
        AudioFormat::F32i,
        AudioFormat::F32p,
        AudioFormat::F64i,
        AudioFormat::F64p,
        AudioFormat::S64i,
        AudioFormat::S64p,
    ];

    /// Largest decode error one encode may introduce for a `[-1, 1]` value.
    fn quantization_step(format: AudioFormat) -> f64 {
        match format {
            AudioFormat::S16i | AudioFormat::S16p => 1.0 / 32_768.0,
            AudioFormat::F32i | AudioFormat::F32p => f32::EPSILON as f64,
            AudioFormat::F64i | AudioFormat::F64p => 0.0,
            AudioFormat::S64i | AudioFormat::S64p => 1e-15,
        }
    }

    fn picture_at_depth(z: f32) -> PictureSample {
        let mut sample = PictureSample::new(
            PictureBuffer::Gpu(ImageHandle(1)),
            4,
            4,
            PixelFormat::Rgba,
            RationalTime::zero(30_000),
            "cam",
        );
        sample.matrix = Mat4::from_translation(glam::Vec3::new(0.0, 0.0, z));
        sample
    }

    #[test]
    fn test_s16_interleaved_decode_encode() {
        let raw: Vec<i16> = vec![1000, -1000, 16384, -32768];
        let bytes: Vec<u8> = raw.iter().flat_map(|v| v.to_le_bytes()).collect();
        let planes = AudioFormat::S16i.decode(&[bytes.clone()], 2);
        assert_eq!(planes.len(), 2);
        assert_eq!(planes[0], vec![1000.0 / 32768.0, 0.5]);
        assert_eq!(planes[1], vec![-1000.0 / 32768.0, -1.0]);
        assert_eq!(AudioFormat::S16i.encode(&planes), vec![bytes]);
    }

    #[test]
    fn test_encode_clips_out_of_range() {
        let out = AudioFormat::S16p.encode(&[vec![2.0, -3.0]]);
        let values: Vec<i16> = out[0]
            .chunks(2)
            .map(|c| i16::from_le_bytes([c[0], c[1]]))
            .collect();
        assert_eq!(values, vec![i16::MAX, i16::MIN]);
    }

    #[test]
    fn test_planar_layout_has_buffer_per_channel() {
        let sample = AudioSample::from_planes(
            &[vec![0.25; 4], vec![-0.25; 4]],
            48_000,
            AudioFormat::F32p,
            RationalTime::zero(48_000),
            "mic",
        );
        assert_eq!(sample.buffers.len(), 2);
        assert_eq!(sample.buffers[0].len(), 16);
        assert_eq!(sample.to_planes()[1][3], -0.25);
        assert_eq!(sample.duration(), RationalTime::new(4, 48_000));
    }

    #[test]
    fn test_pixel_plane_sizes() {
        assert_eq!(PixelFormat::Y420p.plane_len(0, 5, 3), 15);
        assert_eq!(PixelFormat::Y420p.plane_len(1, 5, 3), 6);
        assert_eq!(PixelFormat::Nv12.plane_len(1, 4, 4), 8);
        assert_eq!(PixelFormat::Rgba.plane_len(0, 2, 2), 16);
    }

    #[test]
    fn test_format_names_round_trip() {
        for format in [PixelFormat::Nv12, PixelFormat::Y420p, PixelFormat::Rgba, PixelFormat::Bgra] {
            assert_eq!(format.name().parse::<PixelFormat>().unwrap(), format);
        }
        assert_eq!("S16I".parse::<AudioFormat>().unwrap(), AudioFormat::S16i);
        assert!("s24".parse::<AudioFormat>().is_err());
    }

    #[test]
    fn test_yuv_black_and_white() {
        let (y, u, v) = rgb_to_yuv(1.0, 1.0, 1.0);
        assert!((y - 1.0).abs() < 1e-3);
        assert!((u - 0.5).abs() < 1e-2 && (v - 0.5).abs() < 1e-2);
        let (r, g, b) = yuv_to_rgb(0.0, 0.5, 0.5);
        assert_eq!((r, g, b), (0.0, 0.0, 0.0));
    }

    #[test]
    fn test_z_index_reads_translation_depth() {
        let sample = picture_at_depth(3.0);
        assert_eq!(sample.z_index(), 3.0);
        assert_eq!(MediaSample::from(sample).kind(), "picture");
    }

    #[test]
    fn test_fractional_depths_order_without_rounding() {
        let mut depths: Vec<f32> = [1.0, 0.5, 0.25, 0.75]
            .into_iter()
            .map(|z| picture_at_depth(z).z_index())
            .collect();
        depths.sort_by(f32::total_cmp);
        assert_eq!(depths, vec![0.25, 0.5, 0.75, 1.0]);
        assert!(picture_at_depth(0.4).z_index() < picture_at_depth(0.6).z_index());
    }

    #[test]
    fn test_solid_rgba_fill() {
        let data = PictureData::solid(PixelFormat::Bgra, 2, 1, [10, 20, 30, 255]);
        assert_eq!(data.planes[0], vec![30, 20, 10, 255, 30, 20, 10, 255]);
    }

    proptest! {
        #[test]
        fn prop_audio_encode_decode_within_one_step(
            format in prop::sample::select(AUDIO_FORMATS.to_vec()),
            planes in prop::collection::vec(prop::collection::vec(-1.0f64..=1.0, 1..48), 1..4)
                .prop_map(|mut planes| {
                    let len = planes.iter().map(Vec::len).min().unwrap_or(0);
                    planes.iter_mut().for_each(|p| p.truncate(len));
                    planes
                }),
        ) {
            let decoded = format.decode(&format.encode(&planes), planes.len());
            prop_assert_eq!(decoded.len(), planes.len());
            let step = quantization_step(format);
            for (original, round) in planes.iter().zip(&decoded) {
                prop_assert_eq!(original.len(), round.len());
                for (a, b) in original.iter().zip(round) {
                    prop_assert!((a - b).abs() <= step, "{} {} -> {}", format.name(), a, b);
                }
            }
        }
    }
}
