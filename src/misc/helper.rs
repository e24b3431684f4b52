// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Miscellaneous helper functions that didn't fit elsewhere.

use nalgebra::DMatrix;
use std::path::Path;

use crate::error::{Error, Result};
use crate::misc::interop;

/// Read an image file and convert it to an 8 bits gray matrix.
///
/// Color images are converted to luma.
pub fn read_gray<P: AsRef<Path>>(file_path: P) -> Result<DMatrix<u8>> {
    let path = file_path.as_ref();
    let img = image::open(path).map_err(|source| Error::Image {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(interop::matrix_from_image(img.to_luma8()))
}

/// Compute the quotient and remainder of x/y both at the same time.
pub fn div_rem<T>(x: T, y: T) -> (T, T)
where
    T: std::ops::Div<Output = T> + std::ops::Rem<Output = T> + Copy,
{
    (x / y, x % y)
}
