// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Type aliases for common types used all over the code base.

use nalgebra as na;

/// Epipolar geometry is badly conditioned in single precision,
/// so the library works with f64 everywhere.
pub type Float = f64;

/// A point with two Float coordinates.
/// In image space, `x` is the column and `y` is the row.
pub type Point2 = na::Point2<Float>;
/// A point with three Float coordinates.
pub type Point3 = na::Point3<Float>;

/// A vector with two Float coordinates.
pub type Vec2 = na::Vector2<Float>;
/// A vector with three Float coordinates.
pub type Vec3 = na::Vector3<Float>;
/// A vector with six Float coordinates.
pub type Vec6 = na::Vector6<Float>;

/// A 2x2 matrix of Floats.
pub type Mat2 = na::Matrix2<Float>;
/// A 3x3 matrix of Floats.
pub type Mat3 = na::Matrix3<Float>;
/// A 3x4 matrix of Floats, typically a `[R | t]` pose or a projection matrix.
pub type Mat34 = na::Matrix3x4<Float>;
/// A 3x6 matrix of Floats.
pub type Mat36 = na::Matrix3x6<Float>;
/// A 6x3 matrix of Floats.
pub type Mat63 = na::Matrix6x3<Float>;
/// A 6x6 matrix of Floats.
pub type Mat6 = na::Matrix6<Float>;
