//! Declared element states.
//!
//! A [`DeclaredState`] is the static target an element's animators move
//! toward. Picture and sound parameters live side by side so a single
//! `setState` drives both animators.

use glam::{Vec2, Vec3, Vec4};
use serde::{Deserialize, Serialize};

/// How a picture's texture is fitted into its on-canvas rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum AspectPolicy {
    /// Preserve the whole image, letterboxing with the fill color.
    Fit,
    /// Cover the whole rectangle, cropping the image.
    Fill,
    /// Stretch the image to the rectangle.
    #[default]
    Stretch,
}

/// Which point of the element `picPos` refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum OriginAnchor {
    #[default]
    TopLeft,
    Center,
}

/// Corner of the parent an element tracks when the parent resizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ParentAnchor {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

/// Target picture/audio parameters for one element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeclaredState {
    /// Position in canvas pixels; `z` orders drawing (higher is on top).
    pub pic_pos: Vec3,

    /// Size in canvas pixels.
    pub size: Vec2,

    /// Rotation about the z axis, radians.
    pub rotation: f32,

    /// 0.0 is opaque, 1.0 is invisible.
    pub transparency: f32,

    pub pic_aspect: AspectPolicy,

    pub pic_origin: OriginAnchor,

    /// Offset applied to texture coordinates (normalized).
    pub texture_offset: Vec2,

    /// Border thickness in pixels: left, top, right, bottom.
    pub border_size: Vec4,

    /// RGBA fill for borders and letterbox bars. Absent means transparent.
    pub fill_color: Option<Vec4>,

    /// Parent corners this element tracks. Empty means top-left only.
    #[serde(alias = "parentAnchor")]
    pub parent_anchors: Vec<ParentAnchor>,

    /// Suppresses picture output.
    pub hidden: bool,

    /// Linear gain applied to the element's audio.
    pub audio_gain: f32,

    /// Pan position on the unit audio plane.
    pub audio_pos: Vec2,

    /// Suppresses audio output.
    pub muted: bool,
}

impl Default for DeclaredState {
    fn default() -> Self {
        Self {
            pic_pos: Vec3::ZERO,
            size: Vec2::ZERO,
            rotation: 0.0,
            transparency: 0.0,
            pic_aspect: AspectPolicy::default(),
            pic_origin: OriginAnchor::default(),
            texture_offset: Vec2::ZERO,
            border_size: Vec4::ZERO,
            fill_color: None,
            parent_anchors: Vec::new(),
            hidden: false,
            audio_gain: 1.0,
            audio_pos: Vec2::ZERO,
            muted: false,
        }
    }
}

impl DeclaredState {
    /// A visible picture rectangle at `pos` with `size`, full gain.
    pub fn rect(pos: Vec3, size: Vec2) -> Self {
        Self {
            pic_pos: pos,
            size,
            ..Self::default()
        }
    }

    /// Fill color, transparent black when unset.
    pub fn fill_color_or_clear(&self) -> Vec4 {
        self.fill_color.unwrap_or(Vec4::ZERO)
    }

    /// Declared anchors, defaulting to top-left.
    pub fn effective_anchors(&self) -> Vec<ParentAnchor> {
        if self.parent_anchors.is_empty() {
            vec![ParentAnchor::TopLeft]
        } else {
            self.parent_anchors.clone()
        }
    }
}
