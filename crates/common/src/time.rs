//! Exact rational timestamps.
//!
//! Every timestamp in livemix is a `value / scale` fraction of a second.
//! Audio typically ticks in a `48000` scale, video in `30000` (NTSC-style
//! `1001/30000` frames), and wall clocks in `100000`. Arithmetic between
//! differing scales moves both operands to the least common multiple of the
//! two scales, so sums and differences stay exact as long as the numerators
//! fit in an `i64`.
//!
//! Values are never normalized implicitly; call [`RationalTime::simplify`]
//! when a reduced fraction is wanted.

use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, AddAssign, Div, Mul, Neg, Rem, Sub, SubAssign};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Scale used when converting from floating-point seconds (1e-5 s resolution).
pub const DEFAULT_SCALE: i64 = 100_000;

/// A timestamp or duration of `value / scale` seconds.
///
/// Invariant: `scale > 0`. Equality and ordering compare the represented
/// rational, so `1/3 == 2/6`; compare the fields directly when the exact
/// representation matters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RationalTime {
    /// Numerator.
    pub value: i64,
    /// Denominator (ticks per second).
    pub scale: i64,
}

impl RationalTime {
    /// Create a new timestamp of `value / scale` seconds.
    pub const fn new(value: i64, scale: i64) -> Self {
        Self { value, scale }
    }

    /// Zero in the given scale.
    pub const fn zero(scale: i64) -> Self {
        Self { value: 0, scale }
    }

    /// Convert floating-point seconds at [`DEFAULT_SCALE`] resolution.
    pub fn from_secs_f64(secs: f64) -> Self {
        Self::new((secs * DEFAULT_SCALE as f64) as i64, DEFAULT_SCALE)
    }

    /// Convert a std duration at [`DEFAULT_SCALE`] resolution.
    pub fn from_duration(duration: Duration) -> Self {
        let ticks = duration.as_nanos() / (1_000_000_000 / DEFAULT_SCALE as u128);
        Self::new(ticks.min(i64::MAX as u128) as i64, DEFAULT_SCALE)
    }

    /// Seconds as `f64`. A non-positive scale yields zero.
    pub fn seconds(&self) -> f64 {
        if self.scale <= 0 {
            return 0.0;
        }
        self.value as f64 / self.scale as f64
    }

    /// Convert to a std duration, clamping negative values to zero.
    pub fn to_duration(&self) -> Duration {
        Duration::from_secs_f64(self.seconds().max(0.0))
    }

    pub fn is_zero(&self) -> bool {
        self.value == 0
    }

    pub fn is_positive(&self) -> bool {
        self.value > 0 && self.scale > 0
    }

    /// Express this time in another scale.
    ///
    /// Exact whenever `scale` is a multiple of `self.scale`; otherwise the
    /// numerator truncates toward zero. Non-positive scales return `self`.
    pub fn rescale(self, scale: i64) -> Self {
        if self.scale == scale || scale <= 0 || self.scale <= 0 {
            return self;
        }
        let value = (self.value as i128 * scale as i128) / self.scale as i128;
        Self::new(value as i64, scale)
    }

    /// Divide value and scale by their greatest common divisor.
    pub fn simplify(self) -> Self {
        let div = gcd(self.value.unsigned_abs(), self.scale.unsigned_abs());
        if div <= 1 {
            return self;
        }
        let div = div as i64;
        Self::new(self.value / div, self.scale / div)
    }

    /// Numerators of both operands expressed over their common scale.
    fn align(self, other: Self) -> (i64, i64, i64) {
        if self.scale == other.scale {
            return (self.value, other.value, self.scale);
        }
        let scale = lcm(self.scale, other.scale);
        if scale <= 0 || self.scale <= 0 || other.scale <= 0 {
            return (self.value, other.value, other.scale.max(1));
        }
        (
            self.value.wrapping_mul(scale / self.scale),
            other.value.wrapping_mul(scale / other.scale),
            scale,
        )
    }
}

impl Default for RationalTime {
    fn default() -> Self {
        Self::zero(1)
    }
}

impl fmt::Display for RationalTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.value, self.scale)
    }
}

impl PartialEq for RationalTime {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for RationalTime {}

impl PartialOrd for RationalTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RationalTime {
    fn cmp(&self, other: &Self) -> Ordering {
        let lhs = self.value as i128 * other.scale as i128;
        let rhs = other.value as i128 * self.scale as i128;
        lhs.cmp(&rhs)
    }
}

impl Add for RationalTime {
    type Output = RationalTime;

    fn add(self, rhs: Self) -> Self::Output {
        let (lhs, rhs, scale) = self.align(rhs);
        Self::new(lhs.wrapping_add(rhs), scale)
    }
}

impl AddAssign for RationalTime {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sub for RationalTime {
    type Output = RationalTime;

    fn sub(self, rhs: Self) -> Self::Output {
        let (lhs, rhs, scale) = self.align(rhs);
        Self::new(lhs.wrapping_sub(rhs), scale)
    }
}

impl SubAssign for RationalTime {
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl Neg for RationalTime {
    type Output = RationalTime;

    fn neg(self) -> Self::Output {
        Self::new(self.value.wrapping_neg(), self.scale)
    }
}

impl Mul<i64> for RationalTime {
    type Output = RationalTime;

    fn mul(self, rhs: i64) -> Self::Output {
        Self::new(self.value.wrapping_mul(rhs), self.scale)
    }
}

impl Div<i64> for RationalTime {
    type Output = RationalTime;

    /// Division by zero yields a zero value in the same scale.
    fn div(self, rhs: i64) -> Self::Output {
        Self::new(self.value.checked_div(rhs).unwrap_or(0), self.scale)
    }
}

impl Rem for RationalTime {
    type Output = RationalTime;

    /// A zero divisor yields zero in the divisor's scale.
    fn rem(self, rhs: Self) -> Self::Output {
        let (lhs, rhs, scale) = self.align(rhs);
        if rhs == 0 {
            return Self::zero(scale);
        }
        Self::new(lhs.wrapping_rem(rhs), scale)
    }
}

pub(crate) fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

pub(crate) fn lcm(a: i64, b: i64) -> i64 {
    let div = gcd(a.unsigned_abs(), b.unsigned_abs());
    if div == 0 {
        return 0;
    }
    (a / div as i64).wrapping_mul(b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_rescale_is_exact_for_multiples() {
        let t = RationalTime::new(1, 3).rescale(6);
        assert_eq!(t.value, 2);
        assert_eq!(t.scale, 6);
        assert_eq!(t, RationalTime::new(2, 6));
    }

    #[test]
    fn test_rescale_ntsc_to_wallclock() {
        let a = RationalTime::new(2_987_595, 30_000);
        let c = a.rescale(100_000);
        assert_eq!(c.value, 9_958_650);
    }

    #[test]
    fn test_add_same_scale() {
        let sum = RationalTime::new(1, 1000) + RationalTime::new(500, 1000);
        assert_eq!(sum.value, 1500);
        assert_eq!(sum.scale, 1000);
    }

    #[test]
    fn test_add_mixed_scales_uses_lcm() {
        let sum = RationalTime::new(1, 48_000) + RationalTime::new(1, 30_000);
        assert_eq!(sum.scale, 240_000);
        assert_eq!(sum.value, 5 + 8);
    }

    #[test]
    fn test_sub_and_compare_mixed_scales() {
        let a = RationalTime::new(2_957_595, 30_000);
        let c = a - RationalTime::new(1000, 30_000);
        assert_eq!(c, RationalTime::new(2_956_595, 30_000));
        assert!(RationalTime::new(2_987_595, 30_000) > RationalTime::new(9_955_317, 100_000));
        assert!(RationalTime::new(9_955_317, 100_000) < RationalTime::new(2_987_595, 30_000));
    }

    #[test]
    fn test_min_max_clamp() {
        let a = RationalTime::new(2_957_595, 30_000);
        let b = RationalTime::new(9_855_316, 100_000);
        assert_eq!(a.min(b).scale, 100_000);
        assert_eq!(a.max(b).scale, 30_000);
        let low = RationalTime::new(0, 1);
        let high = RationalTime::new(1, 1);
        assert_eq!(RationalTime::new(3, 2).clamp(low, high), high);
    }

    #[test]
    fn test_simplify_is_explicit() {
        let t = RationalTime::new(1920, 48_000) + RationalTime::new(960, 48_000);
        assert_eq!(t.scale, 48_000);
        let s = t.simplify();
        assert_eq!((s.value, s.scale), (3, 50));
    }

    #[test]
    fn test_scalar_ops_touch_value_only() {
        let t = RationalTime::new(1024, 48_000);
        assert_eq!((t * 3).value, 3072);
        assert_eq!((t * 3).scale, 48_000);
        assert_eq!((t / 2).value, 512);
        assert_eq!((t / 0).value, 0);
    }

    #[test]
    fn test_rem_by_zero_is_zero() {
        let t = RationalTime::new(7, 10) % RationalTime::new(0, 10);
        assert!(t.is_zero());
        let t = RationalTime::new(7, 10) % RationalTime::new(3, 10);
        assert_eq!(t.value, 1);
    }

    #[test]
    fn test_seconds_and_duration() {
        let t = RationalTime::from_secs_f64(1.5);
        assert_eq!(t.scale, DEFAULT_SCALE);
        assert!((t.seconds() - 1.5).abs() < 1e-9);
        assert_eq!(RationalTime::from_duration(Duration::from_millis(20)).value, 2000);
        assert_eq!(RationalTime::new(-5, 1).to_duration(), Duration::ZERO);
    }

    #[test]
    fn test_display() {
        assert_eq!(RationalTime::new(1001, 30_000).to_string(), "1001/30000");
    }

    proptest! {
        #[test]
        fn prop_rescale_chain_matches_direct(
            value in -1_000_000i64..1_000_000,
            scale in 1i64..1000,
            k1 in 1i64..100,
            k2 in 1i64..100,
        ) {
            let t = RationalTime::new(value, scale);
            let a = scale * k1;
            let b = a * k2;
            let chained = t.rescale(a).rescale(b);
            let direct = t.rescale(b);
            prop_assert_eq!(chained.value, direct.value);
            prop_assert_eq!(chained.scale, direct.scale);
        }

        #[test]
        fn prop_add_then_sub_round_trips(
            a in -1_000_000i64..1_000_000,
            sa in 1i64..50_000,
            b in -1_000_000i64..1_000_000,
            sb in 1i64..50_000,
        ) {
            let x = RationalTime::new(a, sa);
            let y = RationalTime::new(b, sb);
            prop_assert_eq!((x + y) - y, x);
            prop_assert_eq!(x + y, y + x);
        }
    }
}
