//! Fixed-Point 2D Vector
//!
//! Deterministic 2D vector operations for positions and movement.
//! All operations use saturating fixed-point arithmetic.

use std::fmt;
use std::ops::{Add, Neg, Sub};
use serde::{Deserialize, Serialize};

use super::fixed::Fixed;

/// Arena half-extent: the playfield spans [-40, 40] on both axes.
pub const ARENA_HALF_EXTENT: Fixed = Fixed::from_int(40);

/// 2D vector with fixed-point components.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct FixedVec2 {
    /// X component (Q16.16 fixed-point)
    pub x: Fixed,
    /// Y component (Q16.16 fixed-point)
    pub y: Fixed,
}

impl FixedVec2 {
    /// Zero vector
    pub const ZERO: Self = Self { x: Fixed::ZERO, y: Fixed::ZERO };

    /// Unit vector pointing right (+X)
    pub const RIGHT: Self = Self { x: Fixed::ONE, y: Fixed::ZERO };

    /// Create a new vector from fixed-point components.
    #[inline]
    pub const fn new(x: Fixed, y: Fixed) -> Self {
        Self { x, y }
    }

    /// Create a vector from integer components.
    #[inline]
    pub const fn from_ints(x: i32, y: i32) -> Self {
        Self { x: Fixed::from_int(x), y: Fixed::from_int(y) }
    }

    /// Create a vector from thousandths.
    #[inline]
    pub const fn from_milli(x: i32, y: i32) -> Self {
        Self { x: Fixed::from_milli(x), y: Fixed::from_milli(y) }
    }

    /// Scale by a fixed-point scalar.
    #[inline]
    pub fn scale(self, scalar: Fixed) -> Self {
        Self { x: self.x * scalar, y: self.y * scalar }
    }

    /// Squared length (avoids sqrt - prefer this for comparisons).
    #[inline]
    pub fn length_squared(self) -> Fixed {
        self.x * self.x + self.y * self.y
    }

    /// Length (magnitude). Prefer `length_squared` when possible.
    #[inline]
    pub fn length(self) -> Fixed {
        self.length_squared().sqrt()
    }

    /// Squared distance to another point.
    #[inline]
    pub fn distance_squared(self, other: Self) -> Fixed {
        (self - other).length_squared()
    }

    /// Is `other` within `radius` of this point (inclusive)?
    #[inline]
    pub fn within(self, other: Self, radius: Fixed) -> bool {
        self.distance_squared(other) <= radius * radius
    }

    /// Normalize to unit length.
    /// Returns ZERO if length is zero.
    pub fn normalize(self) -> Self {
        let len = self.length();
        match (self.x.checked_div(len), self.y.checked_div(len)) {
            (Some(x), Some(y)) => Self { x, y },
            _ => Self::ZERO,
        }
    }

    /// Move toward `target` by at most `max_step`, never overshooting.
    ///
    /// Returns the new position.
    pub fn step_toward(self, target: Self, max_step: Fixed) -> Self {
        let delta = target - self;
        let dist = delta.length();
        if dist <= max_step {
            return target;
        }
        self + delta.normalize().scale(max_step)
    }

    /// Mirror across the vertical axis.
    #[inline]
    pub fn mirror_x(self) -> Self {
        Self { x: -self.x, y: self.y }
    }

    /// Clamp to arena bounds.
    #[inline]
    pub fn clamp_to_arena(self) -> Self {
        Self {
            x: self.x.clamp(-ARENA_HALF_EXTENT, ARENA_HALF_EXTENT),
            y: self.y.clamp(-ARENA_HALF_EXTENT, ARENA_HALF_EXTENT),
        }
    }

    /// Check if position is within arena bounds.
    #[inline]
    pub fn is_in_arena(self) -> bool {
        self.x >= -ARENA_HALF_EXTENT
            && self.x <= ARENA_HALF_EXTENT
            && self.y >= -ARENA_HALF_EXTENT
            && self.y <= ARENA_HALF_EXTENT
    }
}

impl Add for FixedVec2 {
    type Output = Self;
    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self { x: self.x + rhs.x, y: self.y + rhs.y }
    }
}

impl Sub for FixedVec2 {
    type Output = Self;
    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self { x: self.x - rhs.x, y: self.y - rhs.y }
    }
}

impl Neg for FixedVec2 {
    type Output = Self;
    #[inline]
    fn neg(self) -> Self {
        Self { x: -self.x, y: -self.y }
    }
}

impl fmt::Debug for FixedVec2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Vec2({}, {})", self.x, self.y)
    }
}

impl fmt::Display for FixedVec2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

// =============================================================================
// TESTS
// =============================================================================
