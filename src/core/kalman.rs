// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Constant velocity Kalman filter smoothing the camera positions.
//!
//! The state is `[p, v]` (position and velocity, 3 coordinates each)
//! and only the position is measured.
//!
//! ```text
//! F = | I  dt*I |      H = | I  0 |
//!     | 0   I   |
//! ```

use log::warn;

use crate::misc::type_aliases::{Float, Mat3, Mat36, Mat6, Mat63, Vec3, Vec6};

/// Noise and time step parameters of the filter.
#[derive(Debug, Clone)]
pub struct FilterConfig {
    /// Time between two frames.
    pub dt: Float,
    /// Variance of the position measurements.
    pub measurement_noise: Float,
    /// Variance of the process noise, on every state coordinate.
    pub process_noise: Float,
    /// Initial variance of every state coordinate.
    pub initial_uncertainty: Float,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            dt: 1.0,
            measurement_noise: 1e-2,
            process_noise: 1e-4,
            initial_uncertainty: 1e-3,
        }
    }
}

/// Kalman filter with a constant velocity motion model.
#[derive(Debug, Clone)]
pub struct ConstantVelocityFilter {
    state: Vec6,
    covariance: Mat6,
    transition: Mat6,
    observation: Mat36,
    process_noise: Mat6,
    measurement_noise: Mat3,
}

impl ConstantVelocityFilter {
    /// Filter starting at `initial_position` with a null velocity.
    pub fn new(config: &FilterConfig, initial_position: Vec3) -> Self {
        let mut transition = Mat6::identity();
        transition
            .fixed_view_mut::<3, 3>(0, 3)
            .copy_from(&(config.dt * Mat3::identity()));
        let mut state = Vec6::zeros();
        state.fixed_rows_mut::<3>(0).copy_from(&initial_position);
        Self {
            state,
            covariance: config.initial_uncertainty * Mat6::identity(),
            transition,
            observation: Mat36::identity(),
            process_noise: config.process_noise * Mat6::identity(),
            measurement_noise: config.measurement_noise * Mat3::identity(),
        }
    }

    /// Propagate the state to the next frame.
    pub fn predict(&mut self) {
        let f = &self.transition;
        self.state = f * self.state;
        self.covariance = f * self.covariance * f.transpose() + self.process_noise;
    }

    /// Correct the state with a measured position.
    ///
    /// The covariance is updated in Joseph form, which keeps it symmetric positive.
    /// The update is skipped if the innovation covariance is not invertible.
    pub fn update(&mut self, measured_position: &Vec3) {
        let h = &self.observation;
        let innovation = measured_position - h * self.state;
        let innovation_cov = h * self.covariance * h.transpose() + self.measurement_noise;
        let innovation_cov_inv = match innovation_cov.try_inverse() {
            Some(inv) => inv,
            None => {
                warn!("Singular innovation covariance, skipping Kalman update");
                return;
            }
        };
        let gain: Mat63 = self.covariance * h.transpose() * innovation_cov_inv;
        self.state += gain * innovation;
        let i_kh = Mat6::identity() - gain * h;
        self.covariance = i_kh * self.covariance * i_kh.transpose()
            + gain * self.measurement_noise * gain.transpose();
    }

    /// Filtered position.
    pub fn position(&self) -> Vec3 {
        self.state.fixed_rows::<3>(0).into_owned()
    }

    /// Filtered velocity.
    pub fn velocity(&self) -> Vec3 {
        self.state.fixed_rows::<3>(3).into_owned()
    }

    /// Covariance of the state.
    pub fn covariance(&self) -> &Mat6 {
        &self.covariance
    }
}

// TESTS #############################################################

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn starts_at_initial_position() {
        let p0 = Vec3::new(1.0, -2.0, 3.0);
        let filter = ConstantVelocityFilter::new(&FilterConfig::default(), p0);
        assert_eq!(p0, filter.position());
        assert_eq!(Vec3::zeros(), filter.velocity());
    }

    #[test]
    fn steady_state_under_zero_motion() {
        let p0 = Vec3::new(4.0, 5.0, 6.0);
        let mut filter = ConstantVelocityFilter::new(&FilterConfig::default(), p0);
        for _ in 0..50 {
            filter.predict();
            filter.update(&p0);
        }
        assert_relative_eq!(p0, filter.position(), epsilon = 1e-12);
        assert_relative_eq!(Vec3::zeros(), filter.velocity(), epsilon = 1e-12);
    }

    #[test]
    fn predict_moves_with_velocity() {
        let config = FilterConfig {
            dt: 0.5,
            ..FilterConfig::default()
        };
        let mut filter = ConstantVelocityFilter::new(&config, Vec3::zeros());
        filter.state[3] = 2.0;
        filter.predict();
        assert_relative_eq!(Vec3::new(1.0, 0.0, 0.0), filter.position());
    }

    #[test]
    fn first_update_is_a_weighted_mean() {
        // After predict, the position variance is 1e-3 + 1e-3 (velocity) + 1e-4.
        let mut filter = ConstantVelocityFilter::new(&FilterConfig::default(), Vec3::zeros());
        filter.predict();
        filter.update(&Vec3::new(-1.0, 0.0, 0.0));
        let p = 2.1e-3;
        assert_relative_eq!(-p / (p + 1e-2), filter.position().x, epsilon = 1e-12);
    }

    #[test]
    fn tracks_constant_velocity() {
        let mut filter = ConstantVelocityFilter::new(&FilterConfig::default(), Vec3::zeros());
        let mut previous = filter.position();
        for i in 1..=30 {
            filter.predict();
            filter.update(&Vec3::new(-(i as Float), 0.0, 0.0));
            let step = (filter.position() - previous).norm();
            previous = filter.position();
            if i == 30 {
                assert_relative_eq!(1.0, step, epsilon = 1e-2);
            }
        }
        let covariance = filter.covariance();
        assert_relative_eq!(*covariance, covariance.transpose(), epsilon = 1e-15);
    }
}
