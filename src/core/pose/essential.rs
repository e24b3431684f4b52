// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Essential matrix estimation from normalized image coordinates.
//!
//! The essential matrix E relates a point `x1` in the previous frame
//! to its match `x2` in the current frame by the epipolar constraint
//! `x2^T * E * x1 = 0`, with both points in homogeneous normalized coordinates.

use nalgebra::DMatrix;
use rand::{rngs::StdRng, seq::index, SeedableRng};
use std::cmp::Ordering;

use crate::misc::type_aliases::{Float, Mat3, Point2, Vec3};

/// Number of correspondences of a minimal sample.
pub const SAMPLE_SIZE: usize = 8;

/// Relative size of the second smallest eigenvalue of `A^T A`
/// under which the eight-point system is considered degenerate.
const NULL_SPACE_TOLERANCE: Float = 1e-10;

/// Configuration of the RANSAC estimation.
#[derive(Debug, Clone)]
pub struct RansacConfig {
    /// Probability that at least one sample is free of outliers.
    pub confidence: Float,
    /// Maximal epipolar distance (in pixels) of an inlier.
    pub threshold: Float,
    /// Upper bound on the number of sampled models.
    pub max_iterations: usize,
    /// Seed of the random generator, runs are reproducible.
    pub seed: u64,
}

impl Default for RansacConfig {
    fn default() -> Self {
        Self {
            confidence: 0.999,
            threshold: 1.0,
            max_iterations: 1000,
            seed: 0,
        }
    }
}

/// Best model found by RANSAC.
#[derive(Debug, Clone)]
pub struct Consensus {
    /// Essential matrix, with singular values (1, 1, 0).
    pub essential: Mat3,
    /// Inlier mask, index-aligned with the correspondences.
    pub inliers: Vec<bool>,
}

impl Consensus {
    /// Number of inliers.
    pub fn nb_inliers(&self) -> usize {
        self.inliers.iter().filter(|&&b| b).count()
    }
}

/// Linear eight-point algorithm, for 8 or more correspondences.
///
/// The stacked epipolar constraints form a system `A e = 0` where `e` is E in row-major order.
/// The solution is the eigenvector of `A^T A` with smallest eigenvalue,
/// then projected onto the essential manifold.
/// Returns `None` if there are less than 8 correspondences or on numerical failure.
pub fn eight_point(previous: &[Point2], current: &[Point2]) -> Option<Mat3> {
    if previous.len() < SAMPLE_SIZE || previous.len() != current.len() {
        return None;
    }
    let mut ata = DMatrix::<Float>::zeros(9, 9);
    for (p1, p2) in previous.iter().zip(current.iter()) {
        let (x1, y1, x2, y2) = (p1.x, p1.y, p2.x, p2.y);
        let row = [
            x2 * x1,
            x2 * y1,
            x2,
            y2 * x1,
            y2 * y1,
            y2,
            x1,
            y1,
            1.0,
        ];
        for i in 0..9 {
            for j in 0..9 {
                ata[(i, j)] += row[i] * row[j];
            }
        }
    }
    let eigen = ata.symmetric_eigen();
    if !has_unique_solution(eigen.eigenvalues.as_slice()) {
        return None;
    }
    let min_id = eigen.eigenvalues.imin();
    let e = eigen.eigenvectors.column(min_id);
    if e.iter().any(|x| !x.is_finite()) {
        return None;
    }
    #[rustfmt::skip]
    let e = Mat3::new(
        e[0], e[1], e[2],
        e[3], e[4], e[5],
        e[6], e[7], e[8],
    );
    project_essential(&e)
}

/// The null space of `A^T A` must be one-dimensional,
/// otherwise the points are degenerate (e.g. all identical).
fn has_unique_solution(eigenvalues: &[Float]) -> bool {
    let mut sorted = eigenvalues.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    match (sorted.get(1), sorted.last()) {
        (Some(&second), Some(&largest)) => {
            largest > 0.0 && second > NULL_SPACE_TOLERANCE * largest
        }
        _ => false,
    }
}

/// Closest matrix with singular values (1, 1, 0), up to scale.
fn project_essential(e: &Mat3) -> Option<Mat3> {
    let svd = e.svd(true, true);
    let u = svd.u?;
    let v_t = svd.v_t?;
    let mut sigma = Vec3::repeat(1.0);
    sigma[svd.singular_values.imin()] = 0.0;
    Some(u * Mat3::from_diagonal(&sigma) * v_t)
}

/// First order geometric error (squared) of a correspondence for the essential matrix E.
pub fn sampson_error(e: &Mat3, p1: &Point2, p2: &Point2) -> Float {
    let x1 = Vec3::new(p1.x, p1.y, 1.0);
    let x2 = Vec3::new(p2.x, p2.y, 1.0);
    let ex1 = e * x1;
    let etx2 = e.transpose() * x2;
    let constraint = x2.dot(&ex1);
    let denominator = ex1.x * ex1.x + ex1.y * ex1.y + etx2.x * etx2.x + etx2.y * etx2.y;
    if denominator <= Float::EPSILON {
        Float::INFINITY
    } else {
        constraint * constraint / denominator
    }
}

/// Inlier mask of a model for a given squared error threshold.
fn inliers_of(e: &Mat3, previous: &[Point2], current: &[Point2], sq_threshold: Float) -> Vec<bool> {
    previous
        .iter()
        .zip(current.iter())
        .map(|(p1, p2)| sampson_error(e, p1, p2) <= sq_threshold)
        .collect()
}

/// Robust estimation of the essential matrix with RANSAC.
///
/// Points are in normalized image coordinates and `focal` is the mean focal length
/// used to convert the pixel threshold into normalized units.
/// The best model is refitted on all its inliers.
/// Returns `None` when no model has at least 8 inliers.
#[allow(clippy::cast_precision_loss)]
#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::cast_sign_loss)]
pub fn ransac(
    config: &RansacConfig,
    previous: &[Point2],
    current: &[Point2],
    focal: Float,
) -> Option<Consensus> {
    let nb_points = previous.len();
    if nb_points < SAMPLE_SIZE || nb_points != current.len() {
        return None;
    }
    let threshold = config.threshold / focal;
    let sq_threshold = threshold * threshold;
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut best: Option<Consensus> = None;
    let mut best_count = 0;
    let mut nb_needed = config.max_iterations;
    let mut iteration = 0;
    let mut sample_prev = Vec::with_capacity(SAMPLE_SIZE);
    let mut sample_cur = Vec::with_capacity(SAMPLE_SIZE);

    while iteration < nb_needed {
        iteration += 1;
        sample_prev.clear();
        sample_cur.clear();
        for id in index::sample(&mut rng, nb_points, SAMPLE_SIZE).iter() {
            sample_prev.push(previous[id]);
            sample_cur.push(current[id]);
        }
        let e = match eight_point(&sample_prev, &sample_cur) {
            Some(e) => e,
            None => continue,
        };
        let inliers = inliers_of(&e, previous, current, sq_threshold);
        let count = inliers.iter().filter(|&&b| b).count();
        if count > best_count {
            best_count = count;
            best = Some(Consensus {
                essential: e,
                inliers,
            });
            nb_needed = nb_needed.min(adaptive_iterations(
                config,
                count as Float / nb_points as Float,
            ));
        }
    }

    let best = best.filter(|c| c.nb_inliers() >= SAMPLE_SIZE)?;
    Some(refit(&best, previous, current, sq_threshold).unwrap_or(best))
}

/// Number of iterations needed to reach the confidence with a given inlier ratio.
#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::cast_sign_loss)]
fn adaptive_iterations(config: &RansacConfig, inlier_ratio: Float) -> usize {
    let outlier_free = inlier_ratio.powi(SAMPLE_SIZE as i32);
    if outlier_free >= 1.0 {
        return 0;
    }
    if outlier_free <= 0.0 {
        return config.max_iterations;
    }
    let needed = (1.0 - config.confidence).ln() / (1.0 - outlier_free).ln();
    if needed.is_finite() && needed >= 0.0 {
        (needed.ceil() as usize).min(config.max_iterations)
    } else {
        config.max_iterations
    }
}

/// Estimate again with all inliers, kept only if it does not lose inliers.
fn refit(
    best: &Consensus,
    previous: &[Point2],
    current: &[Point2],
    sq_threshold: Float,
) -> Option<Consensus> {
    let (prev_in, cur_in): (Vec<Point2>, Vec<Point2>) = previous
        .iter()
        .zip(current.iter())
        .zip(best.inliers.iter())
        .filter(|(_, &inlier)| inlier)
        .map(|((p1, p2), _)| (*p1, *p2))
        .unzip();
    let essential = eight_point(&prev_in, &cur_in)?;
    let refitted = Consensus {
        inliers: inliers_of(&essential, previous, current, sq_threshold),
        essential,
    };
    if refitted.nb_inliers() >= best.nb_inliers() {
        Some(refitted)
    } else {
        None
    }
}

// TESTS #############################################################

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::synthetic;
    use crate::misc::type_aliases::Vec2;
    use approx::assert_relative_eq;

    #[test]
    fn eight_point_satisfies_epipolar_constraint() {
        let scene = synthetic::Scene::random(40, 7);
        let (rotation, translation) = synthetic::rotated_motion();
        let (previous, current) = scene.normalized_pairs(&rotation, &translation);
        let e = eight_point(&previous, &current).expect("eight point failed");
        for (p1, p2) in previous.iter().zip(current.iter()) {
            assert!(sampson_error(&e, p1, p2) < 1e-14);
        }
        let sv = e.singular_values();
        let mut sorted = [sv[0], sv[1], sv[2]];
        sorted.sort_by(|a, b| b.partial_cmp(a).unwrap());
        assert_relative_eq!(sorted[0], sorted[1], epsilon = 1e-9);
        assert_relative_eq!(0.0, sorted[2], epsilon = 1e-9);
    }

    #[test]
    fn eight_point_needs_eight_points() {
        let p = vec![Point2::new(0.1, 0.2); 7];
        assert!(eight_point(&p, &p).is_none());
    }

    #[test]
    fn ransac_rejects_outliers() {
        let scene = synthetic::Scene::random(100, 11);
        let (rotation, translation) = synthetic::rotated_motion();
        let e_true = synthetic::essential(&rotation, &translation);
        let (previous, mut current) = scene.normalized_pairs(&rotation, &translation);
        // Move one point every five by 10 pixels away from its epipolar line.
        for (i, p) in current.iter_mut().enumerate().filter(|(i, _)| i % 5 == 0) {
            let line = e_true * Vec3::new(previous[i].x, previous[i].y, 1.0);
            let normal = Vec2::new(line.x, line.y).normalize();
            *p += 0.02 * normal;
        }
        let consensus = ransac(&RansacConfig::default(), &previous, &current, 500.0)
            .expect("ransac failed");
        for (i, &inlier) in consensus.inliers.iter().enumerate() {
            assert_eq!(i % 5 != 0, inlier, "wrong classification of point {}", i);
        }
    }

    #[test]
    fn identical_points_are_degenerate() {
        let p = vec![Point2::new(0.1, 0.2); 12];
        assert!(eight_point(&p, &p).is_none());
        assert!(ransac(&RansacConfig::default(), &p, &p, 500.0).is_none());
    }

    #[test]
    fn ransac_is_reproducible() {
        let scene = synthetic::Scene::random(30, 3);
        let (rotation, translation) = synthetic::rotated_motion();
        let (previous, current) = scene.normalized_pairs(&rotation, &translation);
        let config = RansacConfig::default();
        let a = ransac(&config, &previous, &current, 500.0).expect("ransac failed");
        let b = ransac(&config, &previous, &current, 500.0).expect("ransac failed");
        assert_eq!(a.essential, b.essential);
        assert_eq!(a.inliers, b.inliers);
    }

    #[test]
    fn adaptive_iterations_bounds() {
        let config = RansacConfig::default();
        assert_eq!(0, adaptive_iterations(&config, 1.0));
        assert_eq!(1000, adaptive_iterations(&config, 0.0));
        // 0.5^8 = 1/256, log(0.001) / log(255/256) ~= 1765.
        assert_eq!(1000, adaptive_iterations(&config, 0.5));
        // 0.9^8 ~= 0.43, log(0.001) / log(0.57) ~= 12.3.
        assert_eq!(13, adaptive_iterations(&config, 0.9));
    }
}
