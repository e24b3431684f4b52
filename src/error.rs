// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Error type shared by the fallible parts of the library (mostly data loading).
//!
//! Geometric failures during odometry are not errors:
//! they are absorbed at the frame level (see `core::pose::PoseFailure`).

use std::path::PathBuf;

/// Errors raised while reading datasets and frames.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Underlying file system error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// An image could not be opened or decoded.
    #[error("cannot read image {path}: {source}")]
    Image {
        /// Path of the image.
        path: PathBuf,
        /// Decoding error.
        source: image::ImageError,
    },

    /// A line of a text file could not be parsed.
    #[error("parse error at line {line}: {reason}")]
    Parse {
        /// One-based line number.
        line: usize,
        /// What went wrong.
        reason: String,
    },

    /// The calibration file has no entry for the requested camera.
    #[error("no calibration entry for camera {0}")]
    MissingCamera(String),

    /// Requested a frame outside of the sequence.
    #[error("frame index {index} out of range (sequence length {len})")]
    FrameIndex {
        /// Requested index.
        index: usize,
        /// Number of frames in the sequence.
        len: usize,
    },
}

/// Result type of the library.
pub type Result<T> = std::result::Result<T, Error>;
