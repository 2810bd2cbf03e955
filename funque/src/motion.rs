//! Mean absolute difference between two subbands.
//!
//! Used both temporally (current vs previous frame of one stream) and
//! across streams (reference vs distorted within one frame).

use crate::image::Plane;
use crate::Result;

/// Mean of `|a - b|`.
///
/// # Errors
/// Returns [`crate::FunqueError::ShapeMismatch`] if the planes differ in size.
pub fn mad(a: &Plane, b: &Plane) -> Result<f64> {
    a.check_same_size(b)?;
    if a.is_empty() {
        return Ok(0.0);
    }
    let sum: f64 = a
        .data()
        .iter()
        .zip(b.data())
        .map(|(x, y)| (x - y).abs())
        .sum();
    Ok(sum / a.len() as f64)
}
