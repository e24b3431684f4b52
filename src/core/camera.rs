// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Pinhole camera intrinsics.
//!
//! The intrinsics matrix K maps normalized image coordinates
//! (points on the plane z = 1 in the camera frame) to pixels:
//!
//! ```text
//! | fu  s   cu |
//! | 0   fv  cv |
//! | 0   0   1  |
//! ```

use crate::misc::type_aliases::{Float, Mat3, Point2, Point3, Vec3};

/// Intrinsic parameters of a pinhole camera.
#[derive(PartialEq, Debug, Clone)]
pub struct Intrinsics {
    /// Principal point (in pixels) `(cu, cv)`.
    pub principal_point: (Float, Float),
    /// Focal lengths (in pixels) `(fu, fv)`.
    pub focal: (Float, Float),
    /// Skew coefficient, usually 0.
    pub skew: Float,
}

impl Intrinsics {
    /// Intrinsics with unit focal, no skew and principal point at the origin.
    ///
    /// Used as a degraded fallback when the calibration is unknown:
    /// pixels are then taken as normalized coordinates.
    pub fn identity() -> Self {
        Self {
            principal_point: (0.0, 0.0),
            focal: (1.0, 1.0),
            skew: 0.0,
        }
    }

    /// Extract the intrinsics from the upper triangular 3x3 matrix K.
    pub fn from_matrix(k: &Mat3) -> Self {
        Self {
            principal_point: (k.m13 / k.m33, k.m23 / k.m33),
            focal: (k.m11 / k.m33, k.m22 / k.m33),
            skew: k.m12 / k.m33,
        }
    }

    /// Intrinsics matrix K.
    #[rustfmt::skip]
    pub fn matrix(&self) -> Mat3 {
        Mat3::new(
            self.focal.0, self.skew,    self.principal_point.0,
            0.0,          self.focal.1, self.principal_point.1,
            0.0,          0.0,          1.0,
        )
    }

    /// Mean of the two focal lengths.
    ///
    /// Used to convert pixel thresholds into normalized coordinates thresholds.
    pub fn mean_focal(&self) -> Float {
        0.5 * (self.focal.0.abs() + self.focal.1.abs())
    }

    /// Project a 3D point in the camera frame into homogeneous pixel coordinates.
    pub fn project(&self, point: Point3) -> Vec3 {
        Vec3::new(
            self.focal.0 * point[0] + self.skew * point[1] + self.principal_point.0 * point[2],
            self.focal.1 * point[1] + self.principal_point.1 * point[2],
            point[2],
        )
    }

    /// Back project a pixel with a known depth onto its 3D point in the camera frame.
    pub fn back_project(&self, point: Point2, depth: Float) -> Point3 {
        let z = depth;
        let y = (point[1] - self.principal_point.1) * z / self.focal.1;
        let x = ((point[0] - self.principal_point.0) * z - self.skew * y) / self.focal.0;
        Point3::new(x, y, z)
    }

    /// Normalized image coordinates of a pixel (K^-1 applied to the pixel).
    pub fn normalize(&self, point: Point2) -> Point2 {
        let p = self.back_project(point, 1.0);
        Point2::new(p.x, p.y)
    }
}
