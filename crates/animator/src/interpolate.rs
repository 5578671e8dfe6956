//! Linear interpolation between declared states.

use livemix_scene_model::DeclaredState;

pub fn lerp(a: f32, b: f32, pct: f32) -> f32 {
    a + (b - a) * pct
}

/// Interpolate every numeric field of two states.
///
/// Aspect policy and origin snap to `next`. Visibility, mute, and parent
/// anchors stay with `current` until the transition completes. `pct` is
/// used as given, including values outside `[0, 1]`.
pub fn interpolate_state(current: &DeclaredState, next: &DeclaredState, pct: f32) -> DeclaredState {
    let fill_color = match (current.fill_color, next.fill_color) {
        (None, None) => None,
        _ => Some(
            current
                .fill_color_or_clear()
                .lerp(next.fill_color_or_clear(), pct),
        ),
    };
    DeclaredState {
        pic_pos: current.pic_pos.lerp(next.pic_pos, pct),
        size: current.size.lerp(next.size, pct),
        rotation: lerp(current.rotation, next.rotation, pct),
        transparency: lerp(current.transparency, next.transparency, pct),
        pic_aspect: next.pic_aspect,
        pic_origin: next.pic_origin,
        texture_offset: current.texture_offset.lerp(next.texture_offset, pct),
        border_size: current.border_size.lerp(next.border_size, pct),
        fill_color,
        parent_anchors: current.parent_anchors.clone(),
        hidden: current.hidden,
        audio_gain: lerp(current.audio_gain, next.audio_gain, pct),
        audio_pos: current.audio_pos.lerp(next.audio_pos, pct),
        muted: current.muted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Vec2, Vec3, Vec4};
    use livemix_scene_model::{AspectPolicy, OriginAnchor};
    use proptest::prelude::*;

    #[test]
    fn test_halfway_is_exact_midpoint() {
        let a = DeclaredState {
            pic_pos: Vec3::new(0.0, 0.0, 0.0),
            size: Vec2::new(100.0, 50.0),
            rotation: 0.0,
            transparency: 0.0,
            audio_gain: 0.0,
            audio_pos: Vec2::new(-1.0, 0.0),
            border_size: Vec4::ZERO,
            ..DeclaredState::default()
        };
        let b = DeclaredState {
            pic_pos: Vec3::new(200.0, 100.0, 2.0),
            size: Vec2::new(300.0, 150.0),
            rotation: 1.0,
            transparency: 1.0,
            audio_gain: 1.0,
            audio_pos: Vec2::new(1.0, 0.0),
            border_size: Vec4::splat(4.0),
            pic_aspect: AspectPolicy::Fill,
            pic_origin: OriginAnchor::Center,
            ..DeclaredState::default()
        };
        let mid = interpolate_state(&a, &b, 0.5);
        assert_eq!(mid.pic_pos, Vec3::new(100.0, 50.0, 1.0));
        assert_eq!(mid.size, Vec2::new(200.0, 100.0));
        assert_eq!(mid.rotation, 0.5);
        assert_eq!(mid.transparency, 0.5);
        assert_eq!(mid.audio_gain, 0.5);
        assert_eq!(mid.audio_pos, Vec2::ZERO);
        assert_eq!(mid.border_size, Vec4::splat(2.0));
        assert_eq!(mid.pic_aspect, AspectPolicy::Fill);
        assert_eq!(mid.pic_origin, OriginAnchor::Center);
        assert!(mid.fill_color.is_none());
    }

    #[test]
    fn test_fill_color_fades_in_from_clear() {
        let a = DeclaredState::default();
        let b = DeclaredState {
            fill_color: Some(Vec4::new(1.0, 1.0, 1.0, 1.0)),
            ..DeclaredState::default()
        };
        let mid = interpolate_state(&a, &b, 0.5);
        assert_eq!(mid.fill_color, Some(Vec4::splat(0.5)));
    }

    #[test]
    fn test_visibility_stays_with_current() {
        let a = DeclaredState::default();
        let b = DeclaredState {
            hidden: true,
            muted: true,
            ..DeclaredState::default()
        };
        let near_end = interpolate_state(&a, &b, 0.99);
        assert!(!near_end.hidden);
        assert!(!near_end.muted);
    }

    proptest! {
        #[test]
        fn prop_endpoints_reproduce_states(
            x0 in -1000.0f32..1000.0, x1 in -1000.0f32..1000.0,
            g0 in 0.0f32..4.0, g1 in 0.0f32..4.0,
        ) {
            let a = DeclaredState { pic_pos: Vec3::new(x0, 0.0, 0.0), audio_gain: g0, ..DeclaredState::default() };
            let b = DeclaredState { pic_pos: Vec3::new(x1, 0.0, 0.0), audio_gain: g1, ..DeclaredState::default() };
            let start = interpolate_state(&a, &b, 0.0);
            prop_assert_eq!(start.pic_pos.x, x0);
            prop_assert_eq!(start.audio_gain, g0);
            let end = interpolate_state(&a, &b, 1.0);
            prop_assert!((end.pic_pos.x - x1).abs() <= 1e-3);
            prop_assert!((end.audio_gain - g1).abs() <= 1e-5);
        }
    }
}
