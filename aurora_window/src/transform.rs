//! Native window transform bits and their composition algebra
//!
//! A native transform is built up from a horizontal flip, a vertical flip,
//! and a 90-degree clockwise rotation, all optional but always applied in
//! that order. The eight flip/rotate combinations form the symmetry group
//! of the square; `compose` implements the group operation so callers can
//! reason about cancellation (e.g. a pre-transform and its inverse).

use std::fmt;
use std::ops::BitOr;

/// Bit-encoded native window transform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct WindowTransform(u32);

impl WindowTransform {
    /// Identity transform
    pub const NONE: WindowTransform = WindowTransform(0);
    /// Mirror across the vertical axis
    pub const FLIP_H: WindowTransform = WindowTransform(0x1);
    /// Mirror across the horizontal axis
    pub const FLIP_V: WindowTransform = WindowTransform(0x2);
    /// Rotate 90 degrees clockwise
    pub const ROT_90: WindowTransform = WindowTransform(0x4);
    /// Rotate 180 degrees (FLIP_H | FLIP_V)
    pub const ROT_180: WindowTransform = WindowTransform(0x3);
    /// Rotate 270 degrees clockwise (FLIP_H | FLIP_V | ROT_90)
    pub const ROT_270: WindowTransform = WindowTransform(0x7);
    /// Apply the inverse of the display's own transform
    pub const INVERSE_DISPLAY: WindowTransform = WindowTransform(0x8);

    /// Build a transform from raw bits
    pub const fn from_bits(bits: u32) -> WindowTransform {
        WindowTransform(bits)
    }

    /// The raw bit encoding
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Whether all of `other`'s bits are set in `self`
    pub const fn contains(self, other: WindowTransform) -> bool {
        self.0 & other.0 == other.0
    }

    /// Decompose into (mirror, quarter-turns): an optional horizontal
    /// mirror followed by `r` clockwise 90-degree rotations.
    ///
    /// INVERSE_DISPLAY has no fixed geometric meaning and decomposes as
    /// identity.
    fn to_parts(self) -> (bool, u32) {
        match self.0 & 0x7 {
            0x0 => (false, 0),
            0x1 => (true, 0),  // FLIP_H
            0x2 => (true, 2),  // FLIP_V = mirror then rot180
            0x3 => (false, 2), // ROT_180
            0x4 => (false, 1), // ROT_90
            0x5 => (true, 1),  // FLIP_H then ROT_90
            0x6 => (true, 3),  // FLIP_V then ROT_90
            _ => (false, 3),   // ROT_270
        }
    }

    fn from_parts(mirror: bool, quarter_turns: u32) -> WindowTransform {
        match (mirror, quarter_turns % 4) {
            (false, 0) => Self::NONE,
            (true, 0) => Self::FLIP_H,
            (true, 2) => Self::FLIP_V,
            (false, 2) => Self::ROT_180,
            (false, 1) => Self::ROT_90,
            (true, 1) => WindowTransform(0x5),
            (true, 3) => WindowTransform(0x6),
            _ => Self::ROT_270,
        }
    }

    /// Compose two transforms: apply `self` first, then `then`.
    pub fn compose(self, then: WindowTransform) -> WindowTransform {
        let (m1, r1) = self.to_parts();
        let (m2, r2) = then.to_parts();
        // With T = R^r ∘ M^m, the second mirror conjugates the first
        // rotation into its inverse.
        let r1 = if m2 { (4 - r1) % 4 } else { r1 };
        WindowTransform::from_parts(m1 ^ m2, (r1 + r2) % 4)
    }

    /// The transform that cancels `self` under composition.
    pub fn inverse(self) -> WindowTransform {
        let (m, r) = self.to_parts();
        let r = if m { r } else { (4 - r) % 4 };
        WindowTransform::from_parts(m, r)
    }
}

impl BitOr for WindowTransform {
    type Output = WindowTransform;

    fn bitor(self, rhs: WindowTransform) -> WindowTransform {
        WindowTransform(self.0 | rhs.0)
    }
}

impl fmt::Display for WindowTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "transform_tests.rs"]
mod tests;
