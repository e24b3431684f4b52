// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Accumulation of relative motions into a global pose and a trajectory.

use crate::misc::type_aliases::{Float, Mat3, Vec3};

/// Accumulated camera pose since the first frame.
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalPose {
    /// Accumulated rotation.
    pub rotation: Mat3,
    /// Accumulated translation, the raw camera position.
    pub translation: Vec3,
}

impl GlobalPose {
    /// Pose of the first frame.
    pub fn identity() -> Self {
        Self {
            rotation: Mat3::identity(),
            translation: Vec3::zeros(),
        }
    }
}

impl Default for GlobalPose {
    fn default() -> Self {
        Self::identity()
    }
}

/// Chain a relative motion onto the current pose.
///
/// `t' = t + scale * (R * t_rel)` and `R' = R_rel * R`.
pub fn compose(
    current: &GlobalPose,
    rotation: &Mat3,
    translation: &Vec3,
    scale: Float,
) -> GlobalPose {
    GlobalPose {
        translation: current.translation + scale * (current.rotation * translation),
        rotation: rotation * current.rotation,
    }
}

/// Rotation of 180 degrees about the x axis.
///
/// Maps the estimated trajectory into the orientation of KITTI ground truth,
/// for display and comparison only.
pub fn flip_for_display(position: &Vec3) -> Vec3 {
    Vec3::new(position.x, -position.y, -position.z)
}

/// Append-only list of camera positions, one per processed frame.
#[derive(Debug, Clone, Default)]
pub struct Trajectory {
    positions: Vec<Vec3>,
}

impl Trajectory {
    /// Empty trajectory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the position of the next frame.
    pub fn push(&mut self, position: Vec3) {
        self.positions.push(position);
    }

    /// Number of positions.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// True if no frame was processed.
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Last position.
    pub fn last(&self) -> Option<&Vec3> {
        self.positions.last()
    }

    /// All positions, in frame order.
    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    /// Iterate over positions, in frame order.
    pub fn iter(&self) -> std::slice::Iter<'_, Vec3> {
        self.positions.iter()
    }

    /// Positions in display orientation.
    pub fn flipped(&self) -> Vec<Vec3> {
        self.positions.iter().map(flip_for_display).collect()
    }
}

// TESTS #############################################################
