// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Shi-Tomasi "good features to track" corner detection.
//!
//! The corner response of a pixel is the smallest eigenvalue of the
//! structure tensor of Sobel gradients summed over its 3x3 neighborhood.
//! Corners are local maxima of this response, above a threshold relative to
//! the strongest response, and greedily selected strongest first
//! so that no two corners are closer than a minimum distance.

use nalgebra::DMatrix;
use std::cmp::Ordering;

use crate::core::gradient;
use crate::misc::helper;
use crate::misc::type_aliases::{Float, Point2};

/// Configuration of the corner detector.
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum number of corners returned. 0 means no limit.
    pub max_corners: usize,
    /// Minimal accepted response, relative to the strongest response of the image.
    pub quality_level: Float,
    /// Minimal Euclidean distance (in pixels) between two returned corners.
    pub min_distance: Float,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_corners: 2000,
            quality_level: 0.01,
            min_distance: 7.0,
        }
    }
}

/// Detect corners in an image, strongest first.
///
/// Returns an empty vector for images without texture
/// or smaller than 3x3 pixels.
#[allow(clippy::cast_precision_loss)]
pub fn detect(config: &Config, img: &DMatrix<u8>) -> Vec<Point2> {
    let (nb_rows, nb_cols) = img.shape();
    if nb_rows < 3 || nb_cols < 3 {
        return Vec::new();
    }
    let response = min_eigen_response(img);
    let max_response = response.iter().cloned().fold(0.0, Float::max);
    if max_response <= 0.0 {
        return Vec::new();
    }
    let threshold = config.quality_level * max_response;

    // Local maxima above threshold, excluding the one pixel border.
    let mut candidates: Vec<(Float, usize, usize)> = response
        .iter()
        .enumerate()
        .filter_map(|(index, &r)| {
            let (col, row) = helper::div_rem(index, nb_rows);
            let inside = row > 0 && col > 0 && row < nb_rows - 1 && col < nb_cols - 1;
            if inside && r > 0.0 && r >= threshold && is_local_max(&response, row, col) {
                Some((r, row, col))
            } else {
                None
            }
        })
        .collect();
    candidates.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));

    let points = candidates
        .into_iter()
        .map(|(_, row, col)| Point2::new(col as Float, row as Float));
    select_spaced(config, nb_rows, nb_cols, points)
}

/// Smallest eigenvalue of the 3x3 box filtered structure tensor at each pixel.
pub fn min_eigen_response(img: &DMatrix<u8>) -> DMatrix<Float> {
    let (nb_rows, nb_cols) = img.shape();
    let (gx, gy) = gradient::sobel(img);
    let gxx = gx.component_mul(&gx);
    let gyy = gy.component_mul(&gy);
    let gxy = gx.component_mul(&gy);
    let (sxx, syy, sxy) = (box_3x3(&gxx), box_3x3(&gyy), box_3x3(&gxy));
    DMatrix::from_fn(nb_rows, nb_cols, |r, c| {
        min_eigenvalue(sxx[(r, c)], sxy[(r, c)], syy[(r, c)])
    })
}

/// Smallest eigenvalue of the symmetric matrix [a b; b c].
pub fn min_eigenvalue(a: Float, b: Float, c: Float) -> Float {
    let half_trace = 0.5 * (a + c);
    let half_diff = 0.5 * (a - c);
    half_trace - (half_diff * half_diff + b * b).sqrt()
}

/// Sum over the 3x3 neighborhood, with replicated border.
fn box_3x3(mat: &DMatrix<Float>) -> DMatrix<Float> {
    let (nb_rows, nb_cols) = mat.shape();
    DMatrix::from_fn(nb_rows, nb_cols, |r, c| {
        let mut sum = 0.0;
        for rr in neighbors(r, nb_rows) {
            for cc in neighbors(c, nb_cols) {
                sum += mat[(rr, cc)];
            }
        }
        sum
    })
}

fn neighbors(i: usize, len: usize) -> [usize; 3] {
    [i.saturating_sub(1), i, (i + 1).min(len - 1)]
}

fn is_local_max(response: &DMatrix<Float>, row: usize, col: usize) -> bool {
    let r = response[(row, col)];
    (row - 1..=row + 1).all(|rr| (col - 1..=col + 1).all(|cc| response[(rr, cc)] <= r))
}

/// Greedy selection of points (sorted by decreasing response)
/// such that every pair is at least `min_distance` apart.
/// A grid with cells of size `min_distance` limits the number of checks.
#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::cast_sign_loss)]
fn select_spaced<I>(config: &Config, nb_rows: usize, nb_cols: usize, points: I) -> Vec<Point2>
where
    I: Iterator<Item = Point2>,
{
    let max_corners = if config.max_corners == 0 {
        usize::MAX
    } else {
        config.max_corners
    };
    let min_dist = config.min_distance;
    if min_dist < 1.0 {
        return points.take(max_corners).collect();
    }

    let cell = min_dist.ceil() as usize;
    let grid_cols = nb_cols / cell + 1;
    let grid_rows = nb_rows / cell + 1;
    let mut grid: Vec<Vec<Point2>> = vec![Vec::new(); grid_cols * grid_rows];
    let min_dist_2 = min_dist * min_dist;
    let mut selected = Vec::new();

    for p in points {
        let (gc, gr) = (p.x as usize / cell, p.y as usize / cell);
        let too_close = (gr.saturating_sub(1)..=(gr + 1).min(grid_rows - 1)).any(|r| {
            (gc.saturating_sub(1)..=(gc + 1).min(grid_cols - 1)).any(|c| {
                grid[r * grid_cols + c]
                    .iter()
                    .any(|q| (*q - p).norm_squared() < min_dist_2)
            })
        });
        if !too_close {
            grid[gr * grid_cols + gc].push(p);
            selected.push(p);
            if selected.len() >= max_corners {
                break;
            }
        }
    }
    selected
}
