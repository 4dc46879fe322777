//! Q16.16 Fixed-Point Arithmetic
//!
//! Deterministic fixed-point math for the combat simulation.
//! All operations use integer arithmetic only - no floats anywhere,
//! not even for display.
//!
//! ## Format: Q16.16
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Bit Layout: Q16.16 (32-bit signed integer)                 │
//! ├─────────────────────────────────────────────────────────────┤
//! │  [S][IIIIIIIIIIIIIIII][FFFFFFFFFFFFFFFF]                    │
//! │   │  └──── 16 bits ────┘└──── 16 bits ────┘                 │
//! │   └─ Sign bit                                               │
//! │                                                             │
//! │  Range: -32768.0 to +32767.99998 (approx)                   │
//! │  Precision: 1/65536 ≈ 0.000015 units                        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Overflow Policy
//!
//! Every operation **saturates** at the i32 range. There is no wrapping
//! path anywhere in this module:
//!
//! | Operation | Intermediate | Rounding                         |
//! |-----------|--------------|----------------------------------|
//! | add/sub   | i32          | exact, saturating                |
//! | mul       | i64          | arithmetic shift (floor), saturate |
//! | div       | i64          | truncate toward zero, saturate   |
//! | sqrt      | u64          | exact floor, 32 fixed iterations |
//!
//! Division by zero is a precondition violation: [`Fixed::checked_div`]
//! returns `None`, the `/` operator panics.

use std::fmt;
use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub, SubAssign};
use serde::{Deserialize, Serialize};

/// Number of fractional bits (16)
pub const FIXED_SCALE: u32 = 16;

/// 1.0 as a raw value (65536)
pub const FIXED_ONE_RAW: i32 = 1 << FIXED_SCALE;

/// Q16.16 fixed-point number.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fixed(i32);

#[inline]
const fn saturate(wide: i64) -> i32 {
    if wide > i32::MAX as i64 {
        i32::MAX
    } else if wide < i32::MIN as i64 {
        i32::MIN
    } else {
        wide as i32
    }
}

impl Fixed {
    /// 0.0
    pub const ZERO: Self = Self(0);
    /// 1.0
    pub const ONE: Self = Self(FIXED_ONE_RAW);
    /// 0.5
    pub const HALF: Self = Self(FIXED_ONE_RAW >> 1);
    /// Largest representable value
    pub const MAX: Self = Self(i32::MAX);
    /// Smallest representable value
    pub const MIN: Self = Self(i32::MIN);

    /// Create from a raw Q16.16 value.
    #[inline]
    pub const fn from_raw(raw: i32) -> Self {
        Self(raw)
    }

    /// Create from an integer (saturating outside ±32767).
    #[inline]
    pub const fn from_int(i: i32) -> Self {
        Self(saturate((i as i64) << FIXED_SCALE))
    }

    /// Create from thousandths: `from_milli(1500)` is 1.5.
    ///
    /// Truncates toward zero, so `from_milli(1)` is 65 raw.
    #[inline]
    pub const fn from_milli(milli: i32) -> Self {
        Self(saturate(((milli as i64) << FIXED_SCALE) / 1000))
    }

    /// Create from a percentage: `from_percent(15)` is 0.15.
    #[inline]
    pub const fn from_percent(percent: i32) -> Self {
        Self(saturate(((percent as i64) << FIXED_SCALE) / 100))
    }

    /// Raw Q16.16 value.
    #[inline]
    pub const fn raw(self) -> i32 {
        self.0
    }

    /// Integer part, rounded toward negative infinity.
    #[inline]
    pub const fn to_int_floor(self) -> i32 {
        self.0 >> FIXED_SCALE
    }

    /// Saturating addition.
    #[inline]
    pub const fn saturating_add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }

    /// Saturating subtraction.
    #[inline]
    pub const fn saturating_sub(self, rhs: Self) -> Self {
        Self(self.0.saturating_sub(rhs.0))
    }

    /// Multiply with an i64 intermediate, floor shift, then saturate.
    #[inline]
    pub const fn saturating_mul(self, rhs: Self) -> Self {
        let wide = (self.0 as i64) * (rhs.0 as i64);
        Self(saturate(wide >> FIXED_SCALE))
    }

    /// Multiply by a plain integer, saturating.
    #[inline]
    pub const fn mul_int(self, n: i32) -> Self {
        Self(saturate((self.0 as i64) * (n as i64)))
    }

    /// Scale by `percent / 100` with an i64 intermediate.
    ///
    /// Truncates toward zero, then saturates.
    #[inline]
    pub const fn mul_percent(self, percent: i32) -> Self {
        Self(saturate((self.0 as i64) * (percent as i64) / 100))
    }

    /// Divide, pre-shifting the numerator for precision.
    ///
    /// Returns `None` on division by zero.
    #[inline]
    pub const fn checked_div(self, rhs: Self) -> Option<Self> {
        if rhs.0 == 0 {
            return None;
        }
        let wide = ((self.0 as i64) << FIXED_SCALE) / (rhs.0 as i64);
        Some(Self(saturate(wide)))
    }

    /// Divide by a plain integer. Returns `None` when `n == 0`.
    #[inline]
    pub const fn checked_div_int(self, n: i32) -> Option<Self> {
        if n == 0 {
            return None;
        }
        Some(Self(saturate((self.0 as i64) / (n as i64))))
    }

    /// Square root, exact floor, using 32 fixed iterations.
    ///
    /// Non-positive inputs return zero.
    pub const fn sqrt(self) -> Self {
        if self.0 <= 0 {
            return Self::ZERO;
        }
        // sqrt(raw / 2^16) * 2^16 == sqrt(raw * 2^16)
        let value = (self.0 as u64) << FIXED_SCALE;
        let mut remainder = value;
        let mut root: u64 = 0;
        let mut bit: u64 = 1 << 62;
        let mut i = 0;
        while i < 32 {
            if remainder >= root + bit {
                remainder -= root + bit;
                root = (root >> 1) + bit;
            } else {
                root >>= 1;
            }
            bit >>= 2;
            i += 1;
        }
        Self(saturate(root as i64))
    }

    /// Absolute value (saturating: `MIN.abs()` is `MAX`).
    #[inline]
    pub const fn abs(self) -> Self {
        Self(self.0.saturating_abs())
    }

    /// Minimum of two values.
    #[inline]
    pub fn min(self, other: Self) -> Self {
        if self < other { self } else { other }
    }

    /// Maximum of two values.
    #[inline]
    pub fn max(self, other: Self) -> Self {
        if self > other { self } else { other }
    }

    /// Clamp into `[lo, hi]`.
    #[inline]
    pub fn clamp(self, lo: Self, hi: Self) -> Self {
        self.min(hi).max(lo)
    }

    /// Linear interpolation: `a + (b - a) * t`, t in [0, ONE].
    #[inline]
    pub fn lerp(a: Self, b: Self, t: Self) -> Self {
        a.saturating_add(b.saturating_sub(a).saturating_mul(t))
    }

    /// Is this value strictly positive?
    #[inline]
    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }
}

impl Add for Fixed {
    type Output = Self;
    #[inline]
    fn add(self, rhs: Self) -> Self {
        self.saturating_add(rhs)
    }
}

impl AddAssign for Fixed {
    #[inline]
    fn add_assign(&mut self, rhs: Self) {
        *self = self.saturating_add(rhs);
    }
}

impl Sub for Fixed {
    type Output = Self;
    #[inline]
    fn sub(self, rhs: Self) -> Self {
        self.saturating_sub(rhs)
    }
}

impl SubAssign for Fixed {
    #[inline]
    fn sub_assign(&mut self, rhs: Self) {
        *self = self.saturating_sub(rhs);
    }
}

impl Mul for Fixed {
    type Output = Self;
    #[inline]
    fn mul(self, rhs: Self) -> Self {
        self.saturating_mul(rhs)
    }
}

impl Div for Fixed {
    type Output = Self;

    /// # Panics
    /// Panics on division by zero. Use [`Fixed::checked_div`] in the pipeline.
    #[inline]
    fn div(self, rhs: Self) -> Self {
        match self.checked_div(rhs) {
            Some(q) => q,
            None => panic!("fixed-point division by zero"),
        }
    }
}

impl Neg for Fixed {
    type Output = Self;
    #[inline]
    fn neg(self) -> Self {
        Self(self.0.saturating_neg())
    }
}

impl fmt::Display for Fixed {
    /// Four decimal places computed with integer math only.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let raw = self.0 as i64;
        let sign = if raw < 0 { "-" } else { "" };
        let magnitude = raw.abs();
        let int_part = magnitude >> FIXED_SCALE;
        let frac = ((magnitude & 0xFFFF) * 10_000) >> FIXED_SCALE;
        write!(f, "{}{}.{:04}", sign, int_part, frac)
    }
}

impl fmt::Debug for Fixed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fixed({})", self)
    }
}

/// Convert a millisecond duration to whole ticks (at least one).
#[inline]
pub const fn ms_to_ticks(ms: u32, tick_rate: u32) -> u32 {
    let ticks = (ms as u64 * tick_rate as u64) / 1000;
    if ticks == 0 { 1 } else { ticks as u32 }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_constants() {
        assert_eq!(Fixed::ONE.raw(), 65536);
        assert_eq!(Fixed::HALF.raw(), 32768);
        assert_eq!(Fixed::from_int(3).raw(), 3 * 65536);
        assert_eq!(Fixed::from_milli(1500).raw(), 98304);
        assert_eq!(Fixed::from_percent(50), Fixed::HALF);
    }

    #[test]
    fn test_fixed_mul() {
        let a = Fixed::from_int(2);
        let b = Fixed::from_int(3);
        assert_eq!(a * b, Fixed::from_int(6));

        assert_eq!(Fixed::HALF * Fixed::HALF, Fixed::from_milli(250));
        assert_eq!(Fixed::from_int(-2) * Fixed::from_int(3), Fixed::from_int(-6));
    }

    #[test]
    fn test_mul_floors_toward_negative_infinity() {
        // -1/65536 * 0.5 = -0.5/65536, floors to -1 raw
        let tiny = Fixed::from_raw(-1);
        assert_eq!((tiny * Fixed::HALF).raw(), -1);
        let tiny_pos = Fixed::from_raw(1);
        assert_eq!((tiny_pos * Fixed::HALF).raw(), 0);
    }

    #[test]
    fn test_saturation() {
        assert_eq!(Fixed::MAX + Fixed::ONE, Fixed::MAX);
        assert_eq!(Fixed::MIN - Fixed::ONE, Fixed::MIN);
        assert_eq!(Fixed::from_int(30000) * Fixed::from_int(30000), Fixed::MAX);
        assert_eq!(Fixed::from_int(-30000) * Fixed::from_int(30000), Fixed::MIN);
        assert_eq!(Fixed::from_int(40000), Fixed::MAX);
        assert_eq!(-Fixed::MIN, Fixed::MAX);
    }

    #[test]
    fn test_fixed_div() {
        assert_eq!(Fixed::from_int(6).checked_div(Fixed::from_int(2)), Some(Fixed::from_int(3)));
        assert_eq!(Fixed::ONE.checked_div(Fixed::from_int(4)), Some(Fixed::from_milli(250)));
        assert_eq!(Fixed::ONE.checked_div(Fixed::ZERO), None);
        assert_eq!(Fixed::from_int(9).checked_div_int(3), Some(Fixed::from_int(3)));
        assert_eq!(Fixed::ONE.checked_div_int(0), None);
    }

    #[test]
    #[should_panic(expected = "division by zero")]
    fn test_div_operator_panics_on_zero() {
        let _ = Fixed::ONE / Fixed::ZERO;
    }

    #[test]
    fn test_fixed_sqrt() {
        assert_eq!(Fixed::from_int(4).sqrt(), Fixed::from_int(2));
        assert_eq!(Fixed::ONE.sqrt(), Fixed::ONE);
        assert_eq!(Fixed::from_int(25).sqrt(), Fixed::from_int(5));
        assert_eq!(Fixed::ZERO.sqrt(), Fixed::ZERO);
        assert_eq!(Fixed::from_int(-4).sqrt(), Fixed::ZERO);

        // sqrt(2) ≈ 1.41421 → floor(1.41421 * 65536) = 92681
        assert_eq!(Fixed::from_int(2).sqrt().raw(), 92681);
        // Largest input still fits
        assert!(Fixed::MAX.sqrt() > Fixed::from_int(181));
    }

    #[test]
    fn test_clamp_and_lerp() {
        let lo = Fixed::from_int(-1);
        let hi = Fixed::from_int(1);
        assert_eq!(Fixed::from_int(5).clamp(lo, hi), hi);
        assert_eq!(Fixed::from_int(-5).clamp(lo, hi), lo);
        assert_eq!(Fixed::ZERO.clamp(lo, hi), Fixed::ZERO);

        let mid = Fixed::lerp(Fixed::from_int(2), Fixed::from_int(4), Fixed::HALF);
        assert_eq!(mid, Fixed::from_int(3));
        assert_eq!(Fixed::lerp(Fixed::from_int(2), Fixed::from_int(4), Fixed::ZERO), Fixed::from_int(2));
        assert_eq!(Fixed::lerp(Fixed::from_int(2), Fixed::from_int(4), Fixed::ONE), Fixed::from_int(4));
    }

    #[test]
    fn test_display_has_no_float_path() {
        assert_eq!(Fixed::from_milli(2500).to_string(), "2.5000");
        assert_eq!(Fixed::from_int(-3).to_string(), "-3.0000");
        assert_eq!(Fixed::from_milli(-250).to_string(), "-0.2500");
    }

    #[test]
    fn test_ms_to_ticks() {
        assert_eq!(ms_to_ticks(1000, 30), 30);
        assert_eq!(ms_to_ticks(700, 30), 21);
        assert_eq!(ms_to_ticks(1, 30), 1);
    }
}
