// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Metric scale of the estimated translations.
//!
//! Monocular odometry only recovers translation directions.
//! A `ScaleSource` provides the length of each step,
//! typically from ground truth positions when they are available.

use crate::misc::type_aliases::{Float, Vec3};

/// Estimated translations shorter than this cannot be rescaled.
pub const MIN_TRANSLATION_NORM: Float = 1e-5;

/// Outcome of a scale resolution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scale {
    /// Scale factor obtained from a reference.
    Reference(Float),
    /// No reference scale, the translation is used as is.
    Fallback(Unscaled),
}

/// Why a translation could not be scaled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unscaled {
    /// The estimated translation is (almost) null.
    Degenerate,
    /// No reference is available for this frame.
    Unavailable,
}

impl Scale {
    /// Multiplicative factor to apply to the translation, 1.0 for a fallback.
    pub fn factor(&self) -> Float {
        match self {
            Self::Reference(s) => *s,
            Self::Fallback(_) => 1.0,
        }
    }

    /// True if the scale comes from a reference.
    pub fn is_reference(&self) -> bool {
        matches!(self, Self::Reference(_))
    }
}

/// Something able to tell the length of the translation between frames
/// `frame_index - 1` and `frame_index`.
pub trait ScaleSource {
    /// Scale to apply to the `estimated` translation (direction) of a frame.
    fn resolve_scale(&self, estimated: &Vec3, frame_index: usize) -> Scale;
}

/// Scale from ground truth camera positions, indexed by frame.
#[derive(Debug, Clone, Default)]
pub struct GroundTruthScale {
    positions: Vec<Vec3>,
}

impl GroundTruthScale {
    /// Use the given positions, the first one being for frame 0.
    pub fn new(positions: Vec<Vec3>) -> Self {
        Self { positions }
    }

    /// Number of known positions.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// True if no position is known.
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

impl ScaleSource for GroundTruthScale {
    fn resolve_scale(&self, estimated: &Vec3, frame_index: usize) -> Scale {
        if frame_index == 0 {
            return Scale::Fallback(Unscaled::Unavailable);
        }
        let pair = (
            self.positions.get(frame_index - 1),
            self.positions.get(frame_index),
        );
        match pair {
            (Some(previous), Some(current)) => {
                let norm = estimated.norm();
                if norm > MIN_TRANSLATION_NORM {
                    Scale::Reference((current - previous).norm() / norm)
                } else {
                    Scale::Fallback(Unscaled::Degenerate)
                }
            }
            _ => Scale::Fallback(Unscaled::Unavailable),
        }
    }
}

/// No scale reference, the trajectory stays up to scale.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnitScale;

impl ScaleSource for UnitScale {
    fn resolve_scale(&self, _estimated: &Vec3, _frame_index: usize) -> Scale {
        Scale::Fallback(Unscaled::Unavailable)
    }
}

// TESTS #############################################################

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;

    fn straight_line() -> GroundTruthScale {
        GroundTruthScale::new((0..5).map(|i| Vec3::new(0.0, 0.0, 2.0 * i as Float)).collect())
    }

    #[test]
    fn scale_from_ground_truth() {
        let source = straight_line();
        let t = Vec3::new(0.0, 0.0, 0.5);
        assert_eq!(Scale::Reference(4.0), source.resolve_scale(&t, 1));
        assert_eq!(4.0, source.resolve_scale(&t, 4).factor());
    }

    #[test]
    fn scale_unavailable_outside_ground_truth() {
        let source = straight_line();
        let t = Vec3::new(1.0, 0.0, 0.0);
        let unavailable = Scale::Fallback(Unscaled::Unavailable);
        assert_eq!(unavailable, source.resolve_scale(&t, 0));
        assert_eq!(unavailable, source.resolve_scale(&t, 5));
        assert_eq!(unavailable, GroundTruthScale::default().resolve_scale(&t, 1));
        assert_eq!(1.0, unavailable.factor());
    }

    #[test]
    fn unit_scale_is_never_a_reference() {
        let scale = UnitScale.resolve_scale(&Vec3::new(3.0, 0.0, 0.0), 7);
        assert!(!scale.is_reference());
        assert_eq!(1.0, scale.factor());
    }

    // PROPERTY TESTS ################################################

    #[quickcheck]
    fn tiny_translations_are_not_scaled(x: i8, y: i8, z: i8, frame: u8) -> bool {
        let t = Vec3::new(Float::from(x), Float::from(y), Float::from(z)) * 1e-8;
        let scale = straight_line().resolve_scale(&t, usize::from(frame % 5));
        !scale.is_reference() && scale.factor() == 1.0
    }
}
