// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Synthetic scenes with exact correspondences, for tests only.

use nalgebra::{DMatrix, Rotation3};
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::core::camera::Intrinsics;
use crate::core::track::{Correspondences, FeatureTracker};
use crate::misc::type_aliases::{Float, Mat3, Point2, Point3, Vec3};

/// Random 3D points in front of a camera.
pub struct Scene {
    pub points: Vec<Point3>,
}

impl Scene {
    /// Points with `x` in [-8, 8], `y` in [-3, 3] and depth in [5, 20].
    pub fn random(nb_points: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let points = (0..nb_points)
            .map(|_| {
                Point3::new(
                    rng.gen_range(-8.0..8.0),
                    rng.gen_range(-3.0..3.0),
                    rng.gen_range(5.0..20.0),
                )
            })
            .collect();
        Self { points }
    }

    /// Normalized coordinates of the points in the first camera
    /// and in a second camera such that `X2 = R * X1 + t`.
    pub fn normalized_pairs(
        &self,
        rotation: &Mat3,
        translation: &Vec3,
    ) -> (Vec<Point2>, Vec<Point2>) {
        self.points
            .iter()
            .map(|x1| {
                let x2 = rotation * x1.coords + translation;
                (
                    Point2::new(x1.x / x1.z, x1.y / x1.z),
                    Point2::new(x2.x / x2.z, x2.y / x2.z),
                )
            })
            .unzip()
    }

    /// Pixel coordinates of the points seen from a camera centered at `center`
    /// and axis-aligned with the world frame.
    pub fn pixels_from(&self, intrinsics: &Intrinsics, center: &Vec3) -> Vec<Point2> {
        self.points
            .iter()
            .map(|p| {
                let uvz = intrinsics.project(p - center);
                Point2::new(uvz.x / uvz.z, uvz.y / uvz.z)
            })
            .collect()
    }
}

/// A small rotation with a mostly forward translation of unit norm.
pub fn rotated_motion() -> (Mat3, Vec3) {
    let rotation = Rotation3::from_euler_angles(0.02, -0.05, 0.03);
    let translation = Vec3::new(0.3, -0.1, -1.0).normalize();
    (rotation.into_inner(), translation)
}

/// Essential matrix `[t]x * R` of a motion.
pub fn essential(rotation: &Mat3, translation: &Vec3) -> Mat3 {
    translation.cross_matrix() * rotation
}

/// Camera intrinsics of a 640x480 camera.
pub fn intrinsics() -> Intrinsics {
    Intrinsics {
        principal_point: (320.0, 240.0),
        focal: (500.0, 500.0),
        skew: 0.0,
    }
}

/// Frames of a synthetic sequence: the frame index is stored in the first pixel.
#[allow(clippy::cast_possible_truncation)]
pub fn index_frames(nb_frames: usize) -> Vec<DMatrix<u8>> {
    (0..nb_frames)
        .map(|i| DMatrix::repeat(1, 1, i as u8))
        .collect()
}

/// Feature tracker seeing a static scene from a camera moving along x,
/// one unit per frame. Frames must come from `index_frames`.
///
/// Frames with an index in `blind` see nothing.
pub struct SceneTracker {
    pub scene: Scene,
    pub intrinsics: Intrinsics,
    pub blind: Vec<usize>,
}

impl SceneTracker {
    pub fn lateral(nb_points: usize) -> Self {
        Self {
            scene: Scene::random(nb_points, 42),
            intrinsics: intrinsics(),
            blind: Vec::new(),
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn view(&self, frame: &DMatrix<u8>) -> Vec<Point2> {
        let index = usize::from(frame[(0, 0)]);
        if self.blind.contains(&index) {
            return Vec::new();
        }
        let center = Vec3::new(index as Float, 0.0, 0.0);
        self.scene.pixels_from(&self.intrinsics, &center)
    }
}

impl FeatureTracker for SceneTracker {
    fn detect(&self, frame: &DMatrix<u8>) -> Vec<Point2> {
        self.view(frame)
    }

    /// Points are identified by their position in the detection list.
    fn track(
        &self,
        previous: &DMatrix<u8>,
        current: &DMatrix<u8>,
        points: &[Point2],
    ) -> Correspondences {
        let before = self.view(previous);
        let after = self.view(current);
        let (previous, current) = points
            .iter()
            .filter_map(|p| {
                let id = before.iter().position(|q| q == p)?;
                after.get(id).map(|c| (*p, *c))
            })
            .unzip();
        Correspondences { previous, current }
    }
}
