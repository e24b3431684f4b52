// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Helper functions to handle the KITTI odometry dataset.
//!
//! A sequence directory contains a `calib.txt` file with one projection matrix
//! per camera, and one directory of png images per camera (`image_0` for the left gray camera).
//! Ground truth poses are stored in a separate text file,
//! one row-major 3x4 `[R | t]` matrix per line.

use itertools::Itertools;
use log::{debug, warn};
use nalgebra::DMatrix;
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::camera::Intrinsics;
use crate::core::odometry::FrameSource;
use crate::error::{Error, Result};
use crate::misc::helper;
use crate::misc::type_aliases::{Mat3, Mat34, Vec3};

/// Camera of the left gray images.
pub const DEFAULT_CAMERA: &str = "P0";

/// A camera pose `[R | t]`.
pub type Pose34 = Mat34;

/// Read the intrinsics of a camera (`"P0"`, `"P1"`, ...) from a calibration file.
///
/// K is the left 3x3 block of the projection matrix of the camera.
pub fn read_calibration<P: AsRef<Path>>(file_path: P, camera_id: &str) -> Result<Intrinsics> {
    let content = fs::read_to_string(file_path)?;
    parse::calibration(&content, camera_id)
}

/// Same as `read_calibration` but falls back to identity intrinsics on error.
pub fn load_calibration<P: AsRef<Path>>(file_path: P, camera_id: &str) -> Intrinsics {
    let path = file_path.as_ref();
    read_calibration(path, camera_id).unwrap_or_else(|err| {
        warn!("Calibration {}: {}, using identity intrinsics", path.display(), err);
        Intrinsics::identity()
    })
}

/// Sorted list of the png images in a directory.
///
/// Returns an empty list if the directory cannot be read.
pub fn list_images<P: AsRef<Path>>(dir: P) -> Vec<PathBuf> {
    let dir = dir.as_ref();
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            warn!("Image directory {}: {}", dir.display(), err);
            return Vec::new();
        }
    };
    entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && path.extension().map_or(false, |ext| ext == "png"))
        .sorted()
        .collect()
}

/// Sequence of image files, read on demand as gray frames.
#[derive(Debug, Clone, Default)]
pub struct ImageSequence {
    paths: Vec<PathBuf>,
}

impl ImageSequence {
    /// Sequence of the given image files, in this order.
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self { paths }
    }

    /// All png images of a directory, sorted by file name.
    pub fn open<P: AsRef<Path>>(dir: P) -> Self {
        Self::new(list_images(dir))
    }

    /// Paths of the images.
    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }
}

impl FrameSource for ImageSequence {
    fn len(&self) -> usize {
        self.paths.len()
    }

    fn read(&self, index: usize) -> Result<DMatrix<u8>> {
        let path = self.paths.get(index).ok_or(Error::FrameIndex {
            index,
            len: self.paths.len(),
        })?;
        helper::read_gray(path)
    }
}

/// Read a ground truth poses file, see `parse_poses`.
pub fn read_poses<P: AsRef<Path>>(file_path: P) -> Result<Vec<Pose34>> {
    let content = fs::read_to_string(file_path)?;
    Ok(parse_poses(&content))
}

/// Same as `read_poses` but returns an empty list if the file cannot be read.
pub fn load_poses<P: AsRef<Path>>(file_path: P) -> Vec<Pose34> {
    let path = file_path.as_ref();
    read_poses(path).unwrap_or_else(|err| {
        warn!("Poses {}: {}", path.display(), err);
        Vec::new()
    })
}

/// Parse the content of a poses file.
///
/// Every line must contain exactly 12 numbers, other lines are skipped.
pub fn parse_poses(content: &str) -> Vec<Pose34> {
    content
        .lines()
        .enumerate()
        .filter_map(|(i, line)| match parse::twelve_numbers(line) {
            Some(values) => Some(Pose34::from_row_slice(&values)),
            None => {
                debug!("Poses line {}: skipped malformed row", i + 1);
                None
            }
        })
        .collect()
}

/// Camera positions (translation part) of poses.
pub fn positions(poses: &[Pose34]) -> Vec<Vec3> {
    poses.iter().map(|p| p.column(3).into_owned()).collect()
}

/// Write a pose as a line of 12 numbers, in the format of the ground truth files.
pub fn format_pose(rotation: &Mat3, translation: &Vec3) -> String {
    (0..3)
        .flat_map(|r| {
            let row = rotation.row(r);
            vec![row[0], row[1], row[2], translation[r]]
        })
        .join(" ")
}

/// nom parsers of the dataset text files.
mod parse {
    use super::*;
    use crate::misc::type_aliases::Float;
    use nom::{
        bytes::complete::take_while1,
        character::complete::{char, space0, space1},
        combinator::all_consuming,
        multi::separated_list1,
        number::complete::double,
        sequence::{delimited, separated_pair},
        IResult,
    };

    /// Extract the intrinsics of a camera from the content of a calibration file.
    pub fn calibration(content: &str, camera_id: &str) -> Result<Intrinsics> {
        for (i, line) in content.lines().enumerate() {
            let line = line.trim();
            match calibration_line(line) {
                Ok((_, (id, values))) if id == camera_id => {
                    if values.len() != 12 {
                        return Err(Error::Parse {
                            line: i + 1,
                            reason: format!("expected 12 numbers, got {}", values.len()),
                        });
                    }
                    let projection = Mat34::from_row_slice(&values);
                    let k: Mat3 = projection.fixed_view::<3, 3>(0, 0).into_owned();
                    return Ok(Intrinsics::from_matrix(&k));
                }
                Err(_) if line.starts_with(&format!("{}:", camera_id)) => {
                    return Err(Error::Parse {
                        line: i + 1,
                        reason: "malformed projection matrix".to_string(),
                    });
                }
                _ => (),
            }
        }
        Err(Error::MissingCamera(camera_id.to_string()))
    }

    /// Exactly 12 numbers separated by spaces, or nothing.
    pub fn twelve_numbers(line: &str) -> Option<Vec<Float>> {
        all_consuming(numbers)(line.trim())
            .ok()
            .map(|(_, values)| values)
            .filter(|values| values.len() == 12)
    }

    // nom parsers #############################################################

    // A calibration line is a camera id, a colon and numbers: `P0: 7.18e+02 0 ...`.
    fn calibration_line(input: &str) -> IResult<&str, (&str, Vec<Float>)> {
        all_consuming(separated_pair(camera, char(':'), numbers))(input)
    }

    fn camera(input: &str) -> IResult<&str, &str> {
        take_while1(|c: char| c.is_ascii_alphanumeric() || c == '_')(input)
    }

    fn numbers(input: &str) -> IResult<&str, Vec<Float>> {
        delimited(space0, separated_list1(space1, double), space0)(input)
    }
} // mod parse

// TESTS #############################################################
