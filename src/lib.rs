// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Monocular visual odometry.
//!
//! Corners are tracked from frame to frame with a pyramidal Lucas-Kanade optical flow,
//! the relative camera motion is recovered from an essential matrix,
//! scaled with a reference when available, chained into a global pose
//! and smoothed with a constant velocity Kalman filter.
//!
//! The entry point is `core::odometry::Config::init`.

pub mod core;
pub mod dataset;
pub mod error;
pub mod eval;
pub mod math;
pub mod misc;
