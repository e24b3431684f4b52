// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Sparse feature tracking between consecutive frames.
//!
//! The `FeatureTracker` trait is what the odometry driver relies on.
//! `KltTracker` is the default implementation,
//! combining Shi-Tomasi corners and pyramidal Lucas-Kanade optical flow.

pub mod lucas_kanade;
pub mod shi_tomasi;

use nalgebra::DMatrix;

use crate::misc::type_aliases::{Float, Point2};

/// Index-paired points in a previous and a current frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Correspondences {
    /// Points in the previous frame.
    pub previous: Vec<Point2>,
    /// Matching points in the current frame.
    pub current: Vec<Point2>,
}

impl Correspondences {
    /// Number of correspondences.
    pub fn len(&self) -> usize {
        self.previous.len()
    }

    /// True if there is no correspondence.
    pub fn is_empty(&self) -> bool {
        self.previous.is_empty()
    }
}

/// Capability of detecting points and following them into the next frame.
pub trait FeatureTracker {
    /// Detect points worth tracking in a frame.
    /// Never fails, an untextured frame simply yields no point.
    fn detect(&self, frame: &DMatrix<u8>) -> Vec<Point2>;

    /// Track `points` of the `previous` frame into the `current` frame.
    /// Only points successfully tracked are kept, in both returned sets.
    fn track(
        &self,
        previous: &DMatrix<u8>,
        current: &DMatrix<u8>,
        points: &[Point2],
    ) -> Correspondences;
}

/// Kanade-Lucas-Tomasi tracker.
#[derive(Debug, Clone, Default)]
pub struct KltTracker {
    /// Corner detector configuration.
    pub detector: shi_tomasi::Config,
    /// Optical flow configuration.
    pub flow: lucas_kanade::Config,
}

impl FeatureTracker for KltTracker {
    fn detect(&self, frame: &DMatrix<u8>) -> Vec<Point2> {
        shi_tomasi::detect(&self.detector, frame)
    }

    fn track(
        &self,
        previous: &DMatrix<u8>,
        current: &DMatrix<u8>,
        points: &[Point2],
    ) -> Correspondences {
        let tracked = lucas_kanade::track(&self.flow, previous, current, points);
        let (previous, current) = points
            .iter()
            .zip(tracked)
            .filter_map(|(p, t)| t.map(|t| (*p, t)))
            .unzip();
        Correspondences { previous, current }
    }
}

/// Keep only correspondences with a pixel displacement of at least `min_parallax`.
///
/// Points barely moving carry no information on the translation direction.
pub fn filter_by_parallax(
    previous: &[Point2],
    current: &[Point2],
    min_parallax: Float,
) -> Correspondences {
    let (previous, current) = previous
        .iter()
        .zip(current.iter())
        .filter(|(p, c)| (*c - *p).norm() >= min_parallax)
        .map(|(p, c)| (*p, *c))
        .unzip();
    Correspondences { previous, current }
}

// TESTS #############################################################
