//! Picture animator: places an element's pictures on the output canvas.
//!
//! Placement is computed in canvas pixels (origin top-left) and projected to
//! normalized device coordinates only when a sample is emitted, so parents
//! hand their children pixel-space matrices.

use std::sync::Arc;

use glam::{Mat4, Vec2, Vec3, Vec4};
use livemix_common::{RationalTime, SharedClock};
use livemix_scene_model::{
    AspectPolicy, DeclaredState, OriginAnchor, ParentAnchor, PictureSample,
};

use crate::error::AnimatorError;
use crate::transition::{self, lock, AnimatorPhase, SharedState, Transition};

/// Placement of an element at one instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComputedPictureState {
    /// Unit square to canvas pixels.
    pub matrix: Mat4,
    /// Unit square to texture coordinates.
    pub texture_matrix: Mat4,
    /// Unit square to the border rectangle, canvas pixels.
    pub border_matrix: Mat4,
    pub fill_color: Vec4,
    /// Opacity including every ancestor's.
    pub opacity: f32,
}

/// Animates one element's picture placement.
#[derive(Clone)]
pub struct PictureAnimator {
    clock: SharedClock,
    canvas_size: Vec2,
    revision: Arc<str>,
    state: SharedState,
}

impl std::fmt::Debug for PictureAnimator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PictureAnimator")
            .field("revision", &self.revision)
            .field("canvas_size", &self.canvas_size)
            .field("phase", &self.phase())
            .finish()
    }
}

impl PictureAnimator {
    pub fn new(clock: SharedClock, canvas_size: Vec2) -> Self {
        Self {
            clock,
            canvas_size,
            revision: uuid::Uuid::new_v4().to_string().into(),
            state: SharedState::default(),
        }
    }

    /// Source id stamped on every emitted sample.
    pub fn revision(&self) -> &str {
        &self.revision
    }

    pub fn canvas_size(&self) -> Vec2 {
        self.canvas_size
    }

    /// Move toward `target` over `duration`.
    pub fn set_state(&self, target: DeclaredState, duration: RationalTime) -> Transition {
        tracing::trace!(revision = %self.revision, duration = %duration, "picture set_state");
        transition::set_state(&self.state, &self.clock, target, duration)
    }

    pub fn phase(&self) -> AnimatorPhase {
        lock(&self.state).phase()
    }

    pub fn current_state(&self) -> Option<DeclaredState> {
        lock(&self.state).current.clone()
    }

    /// Forget the captured parent placement (after the parent link changes).
    pub fn reset_parent(&self) {
        lock(&self.state).initial_parent = None;
    }

    /// Placement at the clock's current time.
    ///
    /// The first call with a parent captures that parent's placement; later
    /// parent resizes are measured against it for anchored elements.
    pub fn computed_state(
        &self,
        source_size: Vec2,
        parent: Option<&ComputedPictureState>,
    ) -> Result<ComputedPictureState, AnimatorError> {
        let now = self.clock.now();
        let mut state = lock(&self.state);
        let resolved = state.resolved(now)?;
        let anchors = resolved.effective_anchors();
        if let Some(parent) = parent {
            if state.initial_parent.is_none() {
                state.initial_parent = Some(parent.matrix);
            }
        }
        let initial_parent = state.initial_parent;
        drop(state);

        let mut computed = compute_picture_state(
            &resolved,
            source_size,
            parent.map(|p| &p.matrix),
            initial_parent.as_ref(),
            &anchors,
        );
        if let Some(parent) = parent {
            computed.opacity *= parent.opacity;
        }
        Ok(computed)
    }

    /// Place `sample` on the canvas, or suppress it.
    ///
    /// Returns `None` while the element is unset or hidden.
    pub fn apply(
        &self,
        sample: PictureSample,
        parent: Option<&ComputedPictureState>,
    ) -> Option<PictureSample> {
        let hidden = lock(&self.state)
            .current
            .as_ref()
            .map(|s| s.hidden)
            .unwrap_or(true);
        if hidden {
            return None;
        }
        let computed = match self.computed_state(sample.size(), parent) {
            Ok(computed) => computed,
            Err(e) => {
                tracing::trace!(revision = %self.revision, error = %e, "picture suppressed");
                return None;
            }
        };
        let projection = projection(self.canvas_size);
        Some(PictureSample {
            matrix: projection * computed.matrix,
            texture_matrix: computed.texture_matrix,
            border_matrix: projection * computed.border_matrix,
            fill_color: computed.fill_color,
            opacity: computed.opacity,
            source_id: self.revision.to_string(),
            ..sample
        })
    }
}

/// Canvas pixels (origin top-left) to normalized device coordinates.
pub fn projection(canvas_size: Vec2) -> Mat4 {
    let w = canvas_size.x.max(1.0);
    let h = canvas_size.y.max(1.0);
    Mat4::from_cols(
        Vec4::new(2.0 / w, 0.0, 0.0, 0.0),
        Vec4::new(0.0, 2.0 / h, 0.0, 0.0),
        Vec4::new(0.0, 0.0, 1.0, 0.0),
        Vec4::new(-1.0, -1.0, 1.0, 1.0),
    )
}

fn matrix_position(matrix: &Mat4) -> Vec3 {
    matrix.w_axis.truncate()
}

fn matrix_size(matrix: &Mat4) -> Vec3 {
    Vec3::new(
        matrix.x_axis.truncate().truncate().length(),
        matrix.y_axis.truncate().truncate().length(),
        0.0,
    )
}

/// Position and size after following the parent's resize on anchored edges.
fn compute_position_size(
    base_pos: Vec3,
    base_size: Vec2,
    parent_pos: Vec3,
    parent_delta: Vec3,
    anchors: &[ParentAnchor],
) -> (Vec3, Vec3) {
    let has = |anchor: ParentAnchor| anchors.contains(&anchor);
    let rel = base_pos + Vec3::new(parent_pos.x, parent_pos.y, 0.0);
    // top-left, top-right, bottom-left corners
    let mut verts = [
        rel,
        rel + Vec3::new(base_size.x, 0.0, 0.0),
        rel + Vec3::new(0.0, base_size.y, 0.0),
    ];

    if has(ParentAnchor::BottomRight) {
        for v in &mut verts {
            *v += parent_delta;
        }
        if has(ParentAnchor::BottomLeft) {
            verts[0].x = rel.x;
            verts[2].x = rel.x;
        }
        if has(ParentAnchor::TopRight) {
            verts[0].y = rel.y;
            verts[1].y = rel.y;
        }
        if has(ParentAnchor::TopLeft) {
            verts[0] = rel;
            verts[1] = rel + Vec3::new(base_size.x + parent_delta.x, 0.0, 0.0);
            verts[2] = rel + Vec3::new(0.0, base_size.y + parent_delta.y, 0.0);
        }
    } else if has(ParentAnchor::TopRight) {
        verts[1].x += parent_delta.x;
        if !has(ParentAnchor::TopLeft) && !has(ParentAnchor::BottomLeft) {
            verts[0].x += parent_delta.x;
            verts[2].x += parent_delta.x;
        } else if has(ParentAnchor::BottomLeft) {
            verts[2].y += parent_delta.y;
        }
    } else if has(ParentAnchor::BottomLeft) {
        verts[2].y += parent_delta.y;
        if !has(ParentAnchor::TopLeft) {
            verts[1].y += parent_delta.y;
            verts[0].y += parent_delta.y;
        }
    }

    (
        verts[0],
        Vec3::new(verts[1].x - verts[0].x, verts[2].y - verts[0].y, 1.0),
    )
}

fn texture_matrix(policy: AspectPolicy, offset: Vec2, source: Vec2, target: Vec3) -> Mat4 {
    if source.x <= 0.0 || source.y <= 0.0 || target.x <= 0.0 || target.y <= 0.0 {
        return Mat4::IDENTITY;
    }
    let source_aspect = source.x / source.y;
    let target_aspect = target.x / target.y;
    let (sx, sy) = match policy {
        AspectPolicy::Fit => (
            if source_aspect > target_aspect { 1.0 } else { source_aspect / target_aspect },
            if source_aspect <= target_aspect { 1.0 } else { target_aspect / source_aspect },
        ),
        AspectPolicy::Fill => (
            if source_aspect <= target_aspect { 1.0 } else { source_aspect / target_aspect },
            if source_aspect > target_aspect { 1.0 } else { target_aspect / source_aspect },
        ),
        AspectPolicy::Stretch => return Mat4::IDENTITY,
    };
    Mat4::from_translation(Vec3::new(
        offset.x + (1.0 - sx) / 2.0,
        offset.y + (1.0 - sy) / 2.0,
        0.0,
    )) * Mat4::from_scale(Vec3::new(sx, sy, 1.0))
}

/// Placement of `state` in canvas pixels, before projection.
pub fn compute_picture_state(
    state: &DeclaredState,
    source_size: Vec2,
    parent: Option<&Mat4>,
    initial_parent: Option<&Mat4>,
    anchors: &[ParentAnchor],
) -> ComputedPictureState {
    let (parent_pos, parent_size) = parent
        .map(|m| (matrix_position(m), matrix_size(m)))
        .unwrap_or((Vec3::ZERO, Vec3::ZERO));
    let initial_parent_size = initial_parent.map(matrix_size).unwrap_or(Vec3::ZERO);
    let parent_delta = parent_size - initial_parent_size;

    let origin = match state.pic_origin {
        OriginAnchor::TopLeft => Vec3::ZERO,
        OriginAnchor::Center => -Vec3::new(state.size.x / 2.0, state.size.y / 2.0, 0.0),
    };
    let (rel_pos, size) =
        compute_position_size(state.pic_pos, state.size, parent_pos, parent_delta, anchors);
    let pos = rel_pos + origin;

    let border = state.border_size;
    let border_pos = pos - Vec3::new(border.x, border.y, 0.0);
    let border_size = Vec3::new(border.x + size.x + border.z, border.y + size.y + border.w, 1.0);
    let rotation = Mat4::from_rotation_z(state.rotation);

    ComputedPictureState {
        matrix: Mat4::from_translation(pos) * rotation * Mat4::from_scale(size),
        texture_matrix: texture_matrix(state.pic_aspect, state.texture_offset, source_size, size),
        border_matrix: Mat4::from_translation(border_pos) * rotation * Mat4::from_scale(border_size),
        fill_color: state.fill_color_or_clear(),
        opacity: 1.0 - state.transparency,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use livemix_common::StepClock;
    use livemix_scene_model::{ImageHandle, PictureBuffer, PixelFormat};

    fn clock() -> (Arc<StepClock>, SharedClock) {
        let step = Arc::new(StepClock::new(RationalTime::new(1, 10)));
        (step.clone(), step)
    }

    fn sample(w: u32, h: u32) -> PictureSample {
        PictureSample::new(
            PictureBuffer::Gpu(ImageHandle(7)),
            w,
            h,
            PixelFormat::Rgba,
            RationalTime::zero(30_000),
            "cam",
        )
    }

    fn rect(x: f32, y: f32, w: f32, h: f32) -> DeclaredState {
        DeclaredState::rect(Vec3::new(x, y, 0.0), Vec2::new(w, h))
    }

    #[test]
    fn test_unset_animator_suppresses() {
        let (_, clock) = clock();
        let anim = PictureAnimator::new(clock, Vec2::new(100.0, 100.0));
        assert_eq!(
            anim.computed_state(Vec2::ONE, None).unwrap_err(),
            AnimatorError::NoCurrentState
        );
        assert!(anim.apply(sample(4, 4), None).is_none());
    }

    #[test]
    fn test_zero_duration_state_is_used_unmodified() {
        let (_, clock) = clock();
        let anim = PictureAnimator::new(clock, Vec2::new(100.0, 100.0));
        let s1 = rect(10.0, 20.0, 30.0, 40.0);
        anim.set_state(s1.clone(), RationalTime::zero(1000));
        assert_eq!(anim.current_state(), Some(s1));
        let computed = anim.computed_state(Vec2::new(30.0, 40.0), None).unwrap();
        assert_eq!(computed.matrix.w_axis.truncate(), Vec3::new(10.0, 20.0, 0.0));
        assert_eq!(computed.matrix.x_axis.x, 30.0);
        assert_eq!(computed.matrix.y_axis.y, 40.0);
        assert_eq!(computed.opacity, 1.0);
    }

    #[test]
    fn test_halfway_transition_interpolates_placement() {
        let (step, clock) = clock();
        let anim = PictureAnimator::new(clock, Vec2::new(100.0, 100.0));
        anim.set_state(rect(0.0, 0.0, 10.0, 10.0), RationalTime::zero(1000));
        anim.set_state(rect(20.0, 40.0, 30.0, 50.0), RationalTime::new(1, 1));
        for _ in 0..5 {
            step.advance();
        }
        let computed = anim.computed_state(Vec2::ONE, None).unwrap();
        let pos = computed.matrix.w_axis.truncate();
        assert!((pos - Vec3::new(10.0, 20.0, 0.0)).length() < 1e-4);
        assert!((computed.matrix.x_axis.x - 20.0).abs() < 1e-4);
        assert!((computed.matrix.y_axis.y - 30.0).abs() < 1e-4);
    }

    #[test]
    fn test_projection_maps_canvas_corners() {
        let p = projection(Vec2::new(200.0, 100.0));
        let top_left = p * Vec4::new(0.0, 0.0, 0.0, 1.0);
        let bottom_right = p * Vec4::new(200.0, 100.0, 0.0, 1.0);
        assert_eq!(top_left.truncate().truncate(), Vec2::new(-1.0, -1.0));
        assert_eq!(bottom_right.truncate().truncate(), Vec2::new(1.0, 1.0));
    }

    #[test]
    fn test_apply_projects_and_stamps_revision() {
        let (_, clock) = clock();
        let anim = PictureAnimator::new(clock, Vec2::new(100.0, 100.0));
        anim.set_state(rect(50.0, 50.0, 50.0, 50.0), RationalTime::zero(1000));
        let out = anim.apply(sample(4, 4), None).unwrap();
        assert_eq!(out.source_id, anim.revision());
        let corner = out.matrix * Vec4::new(1.0, 1.0, 0.0, 1.0);
        assert!((corner.x - 1.0).abs() < 1e-6 && (corner.y - 1.0).abs() < 1e-6);
        let origin = out.matrix * Vec4::new(0.0, 0.0, 0.0, 1.0);
        assert!(origin.x.abs() < 1e-6 && origin.y.abs() < 1e-6);
    }

    #[test]
    fn test_hidden_state_suppresses() {
        let (_, clock) = clock();
        let anim = PictureAnimator::new(clock, Vec2::new(100.0, 100.0));
        let mut state = rect(0.0, 0.0, 10.0, 10.0);
        state.hidden = true;
        anim.set_state(state, RationalTime::zero(1000));
        assert!(anim.apply(sample(4, 4), None).is_none());
    }

    #[test]
    fn test_center_origin_offsets_by_half_size() {
        let mut state = rect(50.0, 50.0, 20.0, 10.0);
        state.pic_origin = OriginAnchor::Center;
        let computed = compute_picture_state(&state, Vec2::ONE, None, None, &[ParentAnchor::TopLeft]);
        assert_eq!(computed.matrix.w_axis.truncate(), Vec3::new(40.0, 45.0, 0.0));
    }

    #[test]
    fn test_parent_position_and_opacity_carry_over() {
        let (_, clock) = clock();
        let parent = PictureAnimator::new(clock.clone(), Vec2::new(100.0, 100.0));
        let child = PictureAnimator::new(clock, Vec2::new(100.0, 100.0));
        let mut p = rect(10.0, 10.0, 80.0, 80.0);
        p.transparency = 0.5;
        parent.set_state(p, RationalTime::zero(1000));
        let mut c = rect(5.0, 5.0, 10.0, 10.0);
        c.transparency = 0.5;
        child.set_state(c, RationalTime::zero(1000));

        let parent_state = parent.computed_state(Vec2::ONE, None).unwrap();
        let child_state = child.computed_state(Vec2::ONE, Some(&parent_state)).unwrap();
        assert_eq!(child_state.matrix.w_axis.truncate(), Vec3::new(15.0, 15.0, 0.0));
        assert_eq!(child_state.opacity, 0.25);
    }

    #[test]
    fn test_bottom_right_anchor_follows_parent_growth() {
        let initial_parent = Mat4::from_scale(Vec3::new(100.0, 100.0, 1.0));
        let grown_parent = Mat4::from_scale(Vec3::new(150.0, 120.0, 1.0));
        let mut state = rect(80.0, 80.0, 10.0, 10.0);
        state.parent_anchors = vec![ParentAnchor::BottomRight];
        let computed = compute_picture_state(
            &state,
            Vec2::ONE,
            Some(&grown_parent),
            Some(&initial_parent),
            &state.effective_anchors(),
        );
        assert_eq!(computed.matrix.w_axis.truncate(), Vec3::new(130.0, 100.0, 0.0));
        assert_eq!(computed.matrix.x_axis.x, 10.0);
    }

    #[test]
    fn test_top_left_and_bottom_right_anchors_stretch() {
        let initial_parent = Mat4::from_scale(Vec3::new(100.0, 100.0, 1.0));
        let grown_parent = Mat4::from_scale(Vec3::new(150.0, 120.0, 1.0));
        let mut state = rect(10.0, 10.0, 80.0, 80.0);
        state.parent_anchors = vec![ParentAnchor::TopLeft, ParentAnchor::BottomRight];
        let computed = compute_picture_state(
            &state,
            Vec2::ONE,
            Some(&grown_parent),
            Some(&initial_parent),
            &state.effective_anchors(),
        );
        assert_eq!(computed.matrix.w_axis.truncate(), Vec3::new(10.0, 10.0, 0.0));
        assert_eq!(computed.matrix.x_axis.x, 130.0);
        assert_eq!(computed.matrix.y_axis.y, 100.0);
    }

    #[test]
    fn test_initial_parent_captured_once() {
        let (_, clock) = clock();
        let child = PictureAnimator::new(clock, Vec2::new(400.0, 400.0));
        let mut state = rect(0.0, 0.0, 10.0, 10.0);
        state.parent_anchors = vec![ParentAnchor::BottomRight];
        child.set_state(state, RationalTime::zero(1000));

        let small = ComputedPictureState {
            matrix: Mat4::from_scale(Vec3::new(100.0, 100.0, 1.0)),
            texture_matrix: Mat4::IDENTITY,
            border_matrix: Mat4::IDENTITY,
            fill_color: Vec4::ZERO,
            opacity: 1.0,
        };
        let big = ComputedPictureState {
            matrix: Mat4::from_scale(Vec3::new(200.0, 100.0, 1.0)),
            ..small
        };
        let first = child.computed_state(Vec2::ONE, Some(&small)).unwrap();
        assert_eq!(first.matrix.w_axis.x, 0.0);
        let second = child.computed_state(Vec2::ONE, Some(&big)).unwrap();
        assert_eq!(second.matrix.w_axis.x, 100.0);
        child.reset_parent();
        let third = child.computed_state(Vec2::ONE, Some(&big)).unwrap();
        assert_eq!(third.matrix.w_axis.x, 0.0);
    }

    #[test]
    fn test_aspect_fit_letterboxes_wide_source() {
        // 2:1 source in a 1:1 box: full width, half height band in the middle.
        let m = texture_matrix(
            AspectPolicy::Fit,
            Vec2::ZERO,
            Vec2::new(200.0, 100.0),
            Vec3::new(50.0, 50.0, 1.0),
        );
        let lo = m * Vec4::new(0.0, 0.0, 0.0, 1.0);
        let hi = m * Vec4::new(1.0, 1.0, 0.0, 1.0);
        assert_eq!((lo.x, lo.y), (0.0, 0.25));
        assert_eq!((hi.x, hi.y), (1.0, 0.75));
    }

    #[test]
    fn test_aspect_fill_crops_wide_source() {
        let m = texture_matrix(
            AspectPolicy::Fill,
            Vec2::ZERO,
            Vec2::new(200.0, 100.0),
            Vec3::new(50.0, 50.0, 1.0),
        );
        let lo = m * Vec4::new(0.0, 0.0, 0.0, 1.0);
        let hi = m * Vec4::new(1.0, 1.0, 0.0, 1.0);
        assert_eq!((lo.x, lo.y), (-0.5, 0.0));
        assert_eq!((hi.x, hi.y), (1.5, 1.0));
    }

    #[test]
    fn test_border_matrix_surrounds_picture() {
        let mut state = rect(10.0, 10.0, 20.0, 20.0);
        state.border_size = Vec4::new(1.0, 2.0, 3.0, 4.0);
        let computed = compute_picture_state(&state, Vec2::ONE, None, None, &[]);
        assert_eq!(computed.border_matrix.w_axis.truncate(), Vec3::new(9.0, 8.0, 0.0));
        assert_eq!(computed.border_matrix.x_axis.x, 24.0);
        assert_eq!(computed.border_matrix.y_axis.y, 26.0);
    }
}
