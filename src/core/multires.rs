// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Helper functions to generate multi-resolution images.
//!
//! Level 0 is the full resolution image,
//! each following level halves the resolution of the previous one.

use nalgebra::{DMatrix, Scalar};

use crate::misc::type_aliases::{Float, Point2};

/// Recursively generate a pyramid of matrices where each level
/// is half the previous resolution, computed with the mean of each 2x2 block.
///
/// Stops early if the image cannot be halved anymore.
pub fn mean_pyramid(max_levels: usize, mat: DMatrix<u8>) -> Vec<DMatrix<u8>> {
    limited_sequence(max_levels, mat, |m| {
        halve(m, |a, b, c, d| {
            let a = u16::from(a);
            let b = u16::from(b);
            let c = u16::from(c);
            let d = u16::from(d);
            ((a + b + c + d + 2) / 4) as u8
        })
    })
}

/// Recursively apply a function transforming the image
/// until it's not possible anymore or the max number of iterations is reached.
/// Using iterations = 0 has the same effect than iterations = 1 since it always has
/// at least one matrix (the init matrix).
pub fn limited_sequence<F, T>(iterations: usize, mat: DMatrix<T>, f: F) -> Vec<DMatrix<T>>
where
    F: Fn(&DMatrix<T>) -> Option<DMatrix<T>>,
    T: Scalar,
{
    let mut iteration = 1;
    let f_limited = |x: &DMatrix<T>| {
        if iteration < iterations {
            iteration += 1;
            f(x)
        } else {
            None
        }
    };
    sequence(mat, f_limited)
}

/// Recursively apply a function transforming the image
/// until it's not possible anymore.
pub fn sequence<F, T>(mat: DMatrix<T>, mut f: F) -> Vec<DMatrix<T>>
where
    F: FnMut(&DMatrix<T>) -> Option<DMatrix<T>>,
    T: Scalar,
{
    let mut pyr = vec![mat];
    while let Some(new_mat) = pyr.last().and_then(&mut f) {
        pyr.push(new_mat);
    }
    pyr
}

/// Halve the resolution of a matrix by applying a function to each 2x2 block.
/// If one size of the matrix is < 2 then this function returns None.
/// If one size is odd, its last line/column is dropped.
///
/// The block is of the form:
///   a c
///   b d
pub fn halve<F, T, U>(mat: &DMatrix<T>, f: F) -> Option<DMatrix<U>>
where
    F: Fn(T, T, T, T) -> U,
    T: Scalar + Copy,
    U: Scalar,
{
    let (r, c) = mat.shape();
    let half_r = r / 2;
    let half_c = c / 2;
    if half_r == 0 || half_c == 0 {
        None
    } else {
        let half_mat = DMatrix::<U>::from_fn(half_r, half_c, |i, j| {
            let a = mat[(2 * i, 2 * j)];
            let b = mat[(2 * i + 1, 2 * j)];
            let c = mat[(2 * i, 2 * j + 1)];
            let d = mat[(2 * i + 1, 2 * j + 1)];
            f(a, b, c, d)
        });
        Some(half_mat)
    }
}

/// Coordinates at pyramid level `level` of a full resolution pixel.
///
/// Pixel centers are at integer coordinates, so a 2x2 block with
/// top left pixel (2i, 2j) maps onto pixel (i, j) of the next level.
pub fn to_level(point: Point2, level: usize) -> Point2 {
    let scale = level_scale(level);
    Point2::new(
        (point.x + 0.5) / scale - 0.5,
        (point.y + 0.5) / scale - 0.5,
    )
}

/// Inverse of `to_level`.
pub fn from_level(point: Point2, level: usize) -> Point2 {
    let scale = level_scale(level);
    Point2::new(
        (point.x + 0.5) * scale - 0.5,
        (point.y + 0.5) * scale - 0.5,
    )
}

#[allow(clippy::cast_precision_loss)]
fn level_scale(level: usize) -> Float {
    (1_u64 << level) as Float
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn pyramid_levels_halve_resolution() {
        let mat = DMatrix::repeat(48, 64, 7_u8);
        let pyr = mean_pyramid(4, mat);
        let shapes: Vec<_> = pyr.iter().map(|m| m.shape()).collect();
        assert_eq!(vec![(48, 64), (24, 32), (12, 16), (6, 8)], shapes);
        assert!(pyr.iter().all(|m| m.iter().all(|&v| v == 7)));
    }

    #[test]
    fn pyramid_stops_when_too_small() {
        let mat = DMatrix::repeat(3, 9, 0_u8);
        assert_eq!(2, mean_pyramid(10, mat).len());
    }

    #[test]
    fn zero_levels_keeps_the_image() {
        let mat = DMatrix::repeat(4, 4, 1_u8);
        assert_eq!(1, mean_pyramid(0, mat).len());
    }

    #[test]
    fn halve_averages_blocks() {
        let mat = DMatrix::from_row_slice(2, 2, &[0_u8, 10, 20, 30]);
        let half = halve(&mat, |a: u8, b, c, d| {
            (u16::from(a) + u16::from(b) + u16::from(c) + u16::from(d)) / 4
        })
        .unwrap();
        assert_eq!(15, half[(0, 0)]);
    }

    #[quickcheck_macros::quickcheck]
    fn level_coordinates_round_trip(x: i16, y: i16, level: u8) -> bool {
        let level = usize::from(level % 6);
        let p = Point2::new(Float::from(x), Float::from(y));
        let back = from_level(to_level(p, level), level);
        approx::relative_eq!(p, back, epsilon = 1e-9)
    }

    #[test]
    fn block_center_maps_to_pixel() {
        // Center of the block made of pixels 2 and 3 is 2.5.
        let p = to_level(Point2::new(2.5, 2.5), 1);
        assert_relative_eq!(Point2::new(1.0, 1.0), p);
    }
}
