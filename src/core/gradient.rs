// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Helper functions to compute gradients and sample images at subpixel positions.
//!
//! Matrices are indexed `(row, column)`, i.e. `(y, x)`.
//! Out of image accesses replicate the border pixels.

use nalgebra::DMatrix;

use crate::misc::type_aliases::Float;

/// Horizontal and vertical Sobel gradients of an image.
///
/// Kernels are the usual unnormalized 3x3 Sobel kernels:
///
/// ```text
/// -1 0 1      -1 -2 -1
/// -2 0 2       0  0  0
/// -1 0 1       1  2  1
/// ```
pub fn sobel(img: &DMatrix<u8>) -> (DMatrix<Float>, DMatrix<Float>) {
    let (nb_rows, nb_cols) = img.shape();
    let at = |r: isize, c: isize| -> Float {
        let r = clamp_index(r, nb_rows);
        let c = clamp_index(c, nb_cols);
        Float::from(img[(r, c)])
    };
    let mut gx = DMatrix::zeros(nb_rows, nb_cols);
    let mut gy = DMatrix::zeros(nb_rows, nb_cols);
    for c in 0..nb_cols {
        for r in 0..nb_rows {
            let (ri, ci) = (r as isize, c as isize);
            let a = at(ri - 1, ci - 1);
            let b = at(ri - 1, ci);
            let d = at(ri - 1, ci + 1);
            let e = at(ri, ci - 1);
            let f = at(ri, ci + 1);
            let g = at(ri + 1, ci - 1);
            let h = at(ri + 1, ci);
            let i = at(ri + 1, ci + 1);
            gx[(r, c)] = (d + 2.0 * f + i) - (a + 2.0 * e + g);
            gy[(r, c)] = (g + 2.0 * h + i) - (a + 2.0 * b + d);
        }
    }
    (gx, gy)
}

/// Bilinear interpolation of the image at subpixel position `(x, y)`.
#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::many_single_char_names)]
pub fn interpolate(img: &DMatrix<u8>, x: Float, y: Float) -> Float {
    let (nb_rows, nb_cols) = img.shape();
    let u = x.floor();
    let v = y.floor();
    let a = x - u;
    let b = y - v;
    let u_0 = clamp_index(u as isize, nb_cols);
    let v_0 = clamp_index(v as isize, nb_rows);
    let u_1 = clamp_index(u as isize + 1, nb_cols);
    let v_1 = clamp_index(v as isize + 1, nb_rows);
    let vu_00 = Float::from(img[(v_0, u_0)]);
    let vu_10 = Float::from(img[(v_1, u_0)]);
    let vu_01 = Float::from(img[(v_0, u_1)]);
    let vu_11 = Float::from(img[(v_1, u_1)]);
    (1.0 - b) * (1.0 - a) * vu_00 + b * (1.0 - a) * vu_10 + (1.0 - b) * a * vu_01 + b * a * vu_11
}

/// Centered gradient `(gx, gy)` of the image at subpixel position `(x, y)`.
pub fn centered_at(img: &DMatrix<u8>, x: Float, y: Float) -> (Float, Float) {
    let gx = 0.5 * (interpolate(img, x + 1.0, y) - interpolate(img, x - 1.0, y));
    let gy = 0.5 * (interpolate(img, x, y + 1.0) - interpolate(img, x, y - 1.0));
    (gx, gy)
}

#[allow(clippy::cast_sign_loss)]
#[allow(clippy::cast_possible_wrap)]
fn clamp_index(i: isize, len: usize) -> usize {
    i.max(0).min(len as isize - 1) as usize
}
