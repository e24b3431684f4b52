// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Recover a rotation and a translation direction from an essential matrix.
//!
//! An essential matrix admits four `(R, t)` decompositions.
//! Only one of them places the triangulated points in front of both cameras.

use nalgebra::{Matrix4, RowVector4};

use crate::misc::type_aliases::{Float, Mat3, Mat34, Point2, Point3, Vec3};

/// Triangulated points further than this (in units of the baseline) are ignored,
/// they are too close to infinity to disambiguate the decomposition.
pub const MAX_DEPTH: Float = 50.0;

/// The four motion candidates `(R, t)` of an essential matrix, with unit `t`.
pub fn candidates(e: &Mat3) -> Option<[(Mat3, Vec3); 4]> {
    let svd = e.svd(true, true);
    let mut u = svd.u?;
    let mut v_t = svd.v_t?;
    // Negating U or V^T only changes the sign of E, still a valid solution.
    if u.determinant() < 0.0 {
        u = -u;
    }
    if v_t.determinant() < 0.0 {
        v_t = -v_t;
    }
    #[rustfmt::skip]
    let w = Mat3::new(
        0.0, -1.0, 0.0,
        1.0,  0.0, 0.0,
        0.0,  0.0, 1.0,
    );
    let r1 = u * w * v_t;
    let r2 = u * w.transpose() * v_t;
    let t: Vec3 = u.column(2).into_owned();
    Some([(r1, t), (r1, -t), (r2, t), (r2, -t)])
}

/// Linear (DLT) triangulation of a correspondence in normalized coordinates,
/// with cameras `[I | 0]` and `[R | t]`.
/// The point is expressed in the first camera frame.
pub fn triangulate(
    rotation: &Mat3,
    translation: &Vec3,
    p1: &Point2,
    p2: &Point2,
) -> Option<Point3> {
    let first = Mat34::identity();
    let second = Mat34::from_columns(&[
        rotation.column(0).into_owned(),
        rotation.column(1).into_owned(),
        rotation.column(2).into_owned(),
        *translation,
    ]);
    let rows = |proj: &Mat34, p: &Point2| -> [RowVector4<Float>; 2] {
        [
            p.x * proj.row(2) - proj.row(0),
            p.y * proj.row(2) - proj.row(1),
        ]
    };
    let [a0, a1] = rows(&first, p1);
    let [a2, a3] = rows(&second, p2);
    let a = Matrix4::from_rows(&[a0, a1, a2, a3]);
    let svd = a.svd(false, true);
    let v_t = svd.v_t?;
    let x = v_t.row(svd.singular_values.imin());
    if x[3].abs() <= Float::EPSILON {
        return None;
    }
    Some(Point3::new(x[0] / x[3], x[1] / x[3], x[2] / x[3]))
}

/// Number of correspondences triangulated in front of both cameras, within `MAX_DEPTH`.
pub fn nb_in_front(
    rotation: &Mat3,
    translation: &Vec3,
    previous: &[Point2],
    current: &[Point2],
) -> usize {
    previous
        .iter()
        .zip(current.iter())
        .filter_map(|(p1, p2)| triangulate(rotation, translation, p1, p2))
        .filter(|x1| {
            let x2 = rotation * x1.coords + translation;
            x1.z > 0.0 && x2.z > 0.0 && x1.z < MAX_DEPTH && x2.z < MAX_DEPTH
        })
        .count()
}

/// Pick the decomposition of E with the most points in front of both cameras.
/// Returns the motion and its number of points in front,
/// or `None` if no candidate has any point in front.
pub fn recover(e: &Mat3, previous: &[Point2], current: &[Point2]) -> Option<(Mat3, Vec3, usize)> {
    candidates(e)?
        .iter()
        .map(|(r, t)| (*r, *t, nb_in_front(r, t, previous, current)))
        .filter(|(_, _, count)| *count > 0)
        .max_by_key(|(_, _, count)| *count)
}

// TESTS #############################################################

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::synthetic;
    use approx::assert_relative_eq;

    #[test]
    fn candidates_are_rotations() {
        let (rotation, translation) = synthetic::rotated_motion();
        let e = synthetic::essential(&rotation, &translation);
        for (r, t) in candidates(&e).expect("svd failed").iter() {
            assert_relative_eq!(1.0, r.determinant(), epsilon = 1e-9);
            assert_relative_eq!(Mat3::identity(), r * r.transpose(), epsilon = 1e-9);
            assert_relative_eq!(1.0, t.norm(), epsilon = 1e-9);
        }
    }

    #[test]
    fn triangulation_is_exact() {
        let (rotation, translation) = synthetic::rotated_motion();
        let x1 = Point3::new(1.0, -0.5, 8.0);
        let x2 = rotation * x1.coords + translation;
        let p1 = Point2::new(x1.x / x1.z, x1.y / x1.z);
        let p2 = Point2::new(x2.x / x2.z, x2.y / x2.z);
        let x = triangulate(&rotation, &translation, &p1, &p2).expect("triangulation failed");
        assert_relative_eq!(x1, x, epsilon = 1e-9);
    }

    #[test]
    fn recover_known_motion() {
        let scene = synthetic::Scene::random(50, 5);
        let (rotation, translation) = synthetic::rotated_motion();
        let (previous, current) = scene.normalized_pairs(&rotation, &translation);
        let e = synthetic::essential(&rotation, &translation);
        let (r, t, count) = recover(&e, &previous, &current).expect("no decomposition");
        assert_eq!(50, count);
        assert_relative_eq!(rotation, r, epsilon = 1e-9);
        assert_relative_eq!(translation, t, epsilon = 1e-9);
    }

    #[test]
    fn recover_without_points() {
        let (rotation, translation) = synthetic::rotated_motion();
        let e = synthetic::essential(&rotation, &translation);
        assert!(recover(&e, &[], &[]).is_none());
    }
}
