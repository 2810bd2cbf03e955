//! Spatial activity of the coarsest detail pair, and the edge, blur and
//! activity-difference features built on it.

use crate::image::Plane;
use crate::Result;

/// Standard deviation of the gradient magnitude `sqrt(H² + V²)`.
///
/// # Errors
/// Returns [`crate::FunqueError::ShapeMismatch`] if the subbands differ in size.
pub fn spatial_activity(horizontal: &Plane, vertical: &Plane) -> Result<f64> {
    horizontal.check_same_size(vertical)?;
    if horizontal.is_empty() {
        return Ok(0.0);
    }
    let n = horizontal.len() as f64;
    let magnitudes: Vec<f64> = horizontal
        .data()
        .iter()
        .zip(vertical.data())
        .map(|(h, v)| h.hypot(*v))
        .collect();
    let mean = magnitudes.iter().sum::<f64>() / n;
    let var = magnitudes.iter().map(|m| (m - mean).powi(2)).sum::<f64>() / n;
    Ok(var.sqrt())
}

/// Activity of reference and distorted coarsest details.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActivityPair {
    pub reference: f64,
    pub distorted: f64,
}

impl ActivityPair {
    /// Computes both activities from `[H, V, D]` triples.
    ///
    /// # Errors
    /// Returns [`crate::FunqueError::ShapeMismatch`] on mismatched subbands.
    pub fn from_details(reference: &[Plane; 3], distorted: &[Plane; 3]) -> Result<Self> {
        reference[0].check_same_size(&distorted[0])?;
        Ok(Self {
            reference: spatial_activity(&reference[0], &reference[1])?,
            distorted: spatial_activity(&distorted[0], &distorted[1])?,
        })
    }

    /// Activity added by the distortion (ringing, blocking).
    #[must_use]
    pub fn edge(self) -> f64 {
        (self.distorted - self.reference).max(0.0)
    }

    /// Activity removed by the distortion.
    #[must_use]
    pub fn blur(self) -> f64 {
        (self.reference - self.distorted).max(0.0)
    }

    /// Difference of fourth roots, reference minus distorted.
    #[must_use]
    pub fn sai_diff(self) -> f64 {
        self.reference.powf(0.25) - self.distorted.powf(0.25)
    }
}
