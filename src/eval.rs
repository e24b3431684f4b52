// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Comparison of an estimated trajectory with ground truth positions.

use crate::core::trajectory::{self, Trajectory};
use crate::misc::type_aliases::{Float, Vec3};

/// Euclidean distance between the estimated positions (in display orientation)
/// and the ground truth, frame by frame, over the frames present in both.
pub fn position_errors(estimated: &Trajectory, ground_truth: &[Vec3]) -> Vec<Float> {
    estimated
        .iter()
        .zip(ground_truth.iter())
        .map(|(p, gt)| (trajectory::flip_for_display(p) - gt).norm())
        .collect()
}

/// Root mean square of errors, `None` if there is no error.
#[allow(clippy::cast_precision_loss)]
pub fn rmse(errors: &[Float]) -> Option<Float> {
    if errors.is_empty() {
        None
    } else {
        let sum_squares: Float = errors.iter().map(|e| e * e).sum();
        Some((sum_squares / errors.len() as Float).sqrt())
    }
}

// TESTS #############################################################

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn errors_over_common_prefix() {
        let mut estimated = Trajectory::new();
        estimated.push(Vec3::zeros());
        estimated.push(Vec3::new(1.0, 0.0, -2.0));
        estimated.push(Vec3::new(5.0, 5.0, 5.0));
        let ground_truth = vec![Vec3::zeros(), Vec3::new(1.0, 0.0, 2.0)];
        assert_eq!(vec![0.0, 0.0], position_errors(&estimated, &ground_truth));
    }

    #[test]
    fn rmse_of_errors() {
        assert_eq!(None, rmse(&[]));
        assert_relative_eq!(5.0_f64.sqrt(), rmse(&[1.0, 3.0]).unwrap_or(0.0));
    }
}
