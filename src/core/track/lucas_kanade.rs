// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Sparse pyramidal Lucas-Kanade optical flow.
//!
//! Each point is tracked coarse to fine on mean pyramids of both images.
//! At every level, the flow is refined by Gauss-Newton iterations
//! on the sum of squared differences between a square window around the point
//! in the previous image (the template) and the warped window in the next image.
//! The template gradients are precomputed, so the hessian is constant
//! during the iterations of a level.

use nalgebra::DMatrix;

use crate::core::{gradient, multires, track::shi_tomasi};
use crate::math::optimizer::{self, Continue, State as _};
use crate::misc::type_aliases::{Float, Mat2, Point2, Vec2};

/// Configuration of the optical flow.
#[derive(Debug, Clone)]
pub struct Config {
    /// Half size of the square window, the window is `2 * window_radius + 1` wide.
    pub window_radius: usize,
    /// Number of levels in the multi-resolution pyramids of images.
    pub nb_levels: usize,
    /// Maximum number of Gauss-Newton iterations per level.
    pub max_iterations: usize,
    /// Iterations stop when the flow update is smaller than this (in pixels).
    pub epsilon: Float,
    /// Minimal eigenvalue of the window structure tensor, divided by the number of pixels
    /// in the window. Intensities are scaled to [0, 1].
    pub min_eigenvalue: Float,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            window_radius: 10,
            nb_levels: 4,
            max_iterations: 30,
            epsilon: 0.01,
            min_eigenvalue: 1e-6,
        }
    }
}

/// Track points from `prev` into `next`.
///
/// The returned vector is index-aligned with `points`,
/// `None` indicating that tracking failed for this point.
pub fn track(
    config: &Config,
    prev: &DMatrix<u8>,
    next: &DMatrix<u8>,
    points: &[Point2],
) -> Vec<Option<Point2>> {
    if prev.shape() != next.shape() || prev.is_empty() {
        return vec![None; points.len()];
    }
    let prev_multires = multires::mean_pyramid(config.nb_levels, prev.clone());
    let next_multires = multires::mean_pyramid(config.nb_levels, next.clone());
    points
        .iter()
        .map(|&p| track_point(config, &prev_multires, &next_multires, p))
        .collect()
}

/// Track one point through the pyramid, coarse to fine.
#[allow(clippy::cast_precision_loss)]
fn track_point(
    config: &Config,
    prev_multires: &[DMatrix<u8>],
    next_multires: &[DMatrix<u8>],
    point: Point2,
) -> Option<Point2> {
    let mut flow = Vec2::zeros();
    for lvl in (0..prev_multires.len()).rev() {
        let origin = multires::to_level(point, lvl);
        let template = Template::extract(&prev_multires[lvl], origin, config.window_radius);
        let nb_pixels = template.intensities.len() as Float;
        if template.min_eigenvalue() / nb_pixels < config.min_eigenvalue {
            return None;
        }
        let obs = Obs {
            config,
            template: &template,
            image: &next_multires[lvl],
        };
        let (state, _nb_iter) = LKState::iterative_solve(&obs, flow).ok()?;
        flow = state.eval_data.flow;
        if lvl > 0 {
            flow *= 2.0;
        }
    }

    let tracked = point + flow;
    let (nb_rows, nb_cols) = prev_multires[0].shape();
    let inside = tracked.x >= 0.0
        && tracked.y >= 0.0
        && tracked.x <= (nb_cols - 1) as Float
        && tracked.y <= (nb_rows - 1) as Float;
    if inside && tracked.x.is_finite() && tracked.y.is_finite() {
        Some(tracked)
    } else {
        None
    }
}

/// Window of the previous image around the tracked point.
struct Template {
    origin: Point2,
    offsets: Vec<Vec2>,
    intensities: Vec<Float>,
    gradients: Vec<Vec2>,
    hessian: Mat2,
}

impl Template {
    #[allow(clippy::cast_possible_wrap)]
    #[allow(clippy::cast_precision_loss)]
    fn extract(img: &DMatrix<u8>, origin: Point2, radius: usize) -> Self {
        let r = radius as isize;
        let side = 2 * radius + 1;
        let mut offsets = Vec::with_capacity(side * side);
        let mut intensities = Vec::with_capacity(side * side);
        let mut gradients = Vec::with_capacity(side * side);
        let mut hessian = Mat2::zeros();
        for dy in -r..=r {
            for dx in -r..=r {
                let offset = Vec2::new(dx as Float, dy as Float);
                let (x, y) = (origin.x + offset.x, origin.y + offset.y);
                let (gx, gy) = gradient::centered_at(img, x, y);
                let g = Vec2::new(gx, gy) / 255.0;
                hessian += g * g.transpose();
                offsets.push(offset);
                intensities.push(gradient::interpolate(img, x, y) / 255.0);
                gradients.push(g);
            }
        }
        Self {
            origin,
            offsets,
            intensities,
            gradients,
            hessian,
        }
    }

    fn min_eigenvalue(&self) -> Float {
        let h = &self.hessian;
        shi_tomasi::min_eigenvalue(h.m11, h.m12, h.m22)
    }

    /// Steepest descent "gradient" `sum(g * (T - I(x + flow)))`.
    fn residual_gradient(&self, image: &DMatrix<u8>, flow: &Vec2) -> Vec2 {
        let base = self.origin + *flow;
        self.offsets
            .iter()
            .zip(self.intensities.iter())
            .zip(self.gradients.iter())
            .fold(Vec2::zeros(), |acc, ((offset, &t), g)| {
                let i = gradient::interpolate(image, base.x + offset.x, base.y + offset.y) / 255.0;
                acc + g * (t - i)
            })
    }
}

/// Data available for the iterations at one pyramid level.
struct Obs<'a> {
    config: &'a Config,
    template: &'a Template,
    image: &'a DMatrix<u8>,
}

/// Evaluation of a flow.
struct EvalData {
    flow: Vec2,
    gradient: Vec2,
}

/// State of the Gauss-Newton iterations.
struct LKState {
    hessian_inverse: Option<Mat2>,
    max_iterations: usize,
    epsilon: Float,
    eval_data: EvalData,
}

impl<'a> optimizer::State<Obs<'a>, EvalData, Vec2, &'static str> for LKState {
    fn init(obs: &Obs, flow: Vec2) -> Self {
        Self {
            hessian_inverse: obs.template.hessian.try_inverse(),
            max_iterations: obs.config.max_iterations,
            epsilon: obs.config.epsilon,
            eval_data: EvalData {
                gradient: obs.template.residual_gradient(obs.image, &flow),
                flow,
            },
        }
    }

    /// Gauss-Newton step, the hessian is the template structure tensor.
    fn step(&self) -> Result<Vec2, &'static str> {
        let h_inv = self.hessian_inverse.ok_or("Singular structure tensor")?;
        Ok(self.eval_data.flow + h_inv * self.eval_data.gradient)
    }

    fn eval(&self, obs: &Obs, flow: Vec2) -> EvalData {
        EvalData {
            gradient: obs.template.residual_gradient(obs.image, &flow),
            flow,
        }
    }

    /// Stop after too many iterations or if the flow barely moved.
    fn stop_criterion(self, nb_iter: usize, eval_data: EvalData) -> (Self, Continue) {
        let moved = (eval_data.flow - self.eval_data.flow).norm();
        let continuation = if nb_iter >= self.max_iterations || moved < self.epsilon {
            Continue::Stop
        } else {
            Continue::Forward
        };
        (Self { eval_data, ..self }, continuation)
    }
}
