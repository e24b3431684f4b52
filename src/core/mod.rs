// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Core functionalities of the monocular visual odometry.

pub mod camera;
pub mod gradient;
pub mod kalman;
pub mod multires;
pub mod odometry;
pub mod pose;
pub mod scale;
pub mod track;
pub mod trajectory;

#[cfg(test)]
pub(crate) mod synthetic;
