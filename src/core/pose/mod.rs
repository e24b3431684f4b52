// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Relative camera motion between two frames from point correspondences.
//!
//! The estimated motion maps points expressed in the previous camera frame
//! into the current camera frame: `X2 = R * X1 + t`.
//! The translation is only known up to scale, it has unit norm.

pub mod decompose;
pub mod essential;

pub use essential::RansacConfig;

use log::debug;

use crate::core::camera::Intrinsics;
use crate::misc::type_aliases::{Mat3, Point2, Vec3};

/// Rotation and unit translation direction between two frames.
#[derive(Debug, Clone, PartialEq)]
pub struct RelativePose {
    /// Rotation from the previous camera frame to the current one.
    pub rotation: Mat3,
    /// Translation direction, of unit norm.
    pub translation: Vec3,
}

impl RelativePose {
    /// No motion at all.
    pub fn identity() -> Self {
        Self {
            rotation: Mat3::identity(),
            translation: Vec3::zeros(),
        }
    }
}

/// Why no motion could be estimated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PoseFailure {
    /// Less than 8 correspondences, or not the same number of points in both frames.
    #[error("not enough correspondences")]
    NotEnoughPoints,
    /// No essential matrix could be estimated with enough inliers.
    #[error("degenerate configuration")]
    Degenerate,
    /// No decomposition of the essential matrix puts points in front of the cameras.
    #[error("no valid decomposition of the essential matrix")]
    NoValidDecomposition,
}

/// Outcome of the estimation.
#[derive(Debug, Clone, PartialEq)]
pub enum RelativeMotion {
    /// A motion was estimated.
    Estimated(RelativePose),
    /// Estimation failed, the motion is considered null.
    NoMotion(PoseFailure),
}

impl RelativeMotion {
    /// Rotation and translation, identity and zero if there is no motion.
    pub fn into_parts(self) -> (Mat3, Vec3) {
        let pose = match self {
            Self::Estimated(pose) => pose,
            Self::NoMotion(_) => RelativePose::identity(),
        };
        (pose.rotation, pose.translation)
    }

    /// True if a motion was actually estimated.
    pub fn is_estimated(&self) -> bool {
        matches!(self, Self::Estimated(_))
    }
}

/// Estimate the relative motion from pixel correspondences.
///
/// Pixels are normalized with the intrinsics, then an essential matrix is
/// robustly estimated and decomposed, using its inliers for the chirality check.
pub fn estimate(
    config: &RansacConfig,
    previous: &[Point2],
    current: &[Point2],
    intrinsics: &Intrinsics,
) -> RelativeMotion {
    match try_estimate(config, previous, current, intrinsics) {
        Ok(pose) => RelativeMotion::Estimated(pose),
        Err(failure) => {
            debug!("Relative pose estimation failed: {}", failure);
            RelativeMotion::NoMotion(failure)
        }
    }
}

fn try_estimate(
    config: &RansacConfig,
    previous: &[Point2],
    current: &[Point2],
    intrinsics: &Intrinsics,
) -> Result<RelativePose, PoseFailure> {
    if previous.len() < essential::SAMPLE_SIZE || previous.len() != current.len() {
        return Err(PoseFailure::NotEnoughPoints);
    }
    let normalize = |points: &[Point2]| -> Vec<Point2> {
        points.iter().map(|p| intrinsics.normalize(*p)).collect()
    };
    let (previous, current) = (normalize(previous), normalize(current));
    let consensus = essential::ransac(config, &previous, &current, intrinsics.mean_focal())
        .ok_or(PoseFailure::Degenerate)?;
    debug!(
        "Essential matrix with {} inliers out of {}",
        consensus.nb_inliers(),
        previous.len()
    );

    let (prev_in, cur_in): (Vec<Point2>, Vec<Point2>) = previous
        .iter()
        .zip(current.iter())
        .zip(consensus.inliers.iter())
        .filter(|(_, &inlier)| inlier)
        .map(|((p1, p2), _)| (*p1, *p2))
        .unzip();
    let (rotation, translation, _) = decompose::recover(&consensus.essential, &prev_in, &cur_in)
        .ok_or(PoseFailure::NoValidDecomposition)?;
    Ok(RelativePose {
        rotation,
        translation,
    })
}

// TESTS #############################################################
