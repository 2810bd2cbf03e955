//! Visual Information Fidelity on wavelet approximations.
//!
//! Local statistics come from `k × k` windows in `valid` mode (no border
//! extension), computed with summed-area tables.

use crate::consts::{VIF_EPS, VIF_SIGMA_NSQ, VIF_STABILITY, VIF_WINDOW};
use crate::convolve::IntegralImage;
use crate::image::Plane;
use crate::wavelet::Pyramid;
use crate::{FunqueError, Result};

/// VIF window and noise model.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct VifParams {
    /// Window side `k`.
    pub window: usize,
    /// Additive neural noise variance.
    pub sigma_nsq: f64,
}

impl Default for VifParams {
    fn default() -> Self {
        Self {
            window: VIF_WINDOW,
            sigma_nsq: VIF_SIGMA_NSQ,
        }
    }
}

impl VifParams {
    /// Checks the parameters.
    ///
    /// # Errors
    /// Returns [`FunqueError::InvalidParameter`] for a zero window or a
    /// non-positive noise variance.
    pub fn validate(&self) -> Result<()> {
        if self.window == 0 {
            return Err(FunqueError::InvalidParameter {
                name: "vif.window",
                reason: "must be at least 1".into(),
            });
        }
        if !(self.sigma_nsq > 0.0) {
            return Err(FunqueError::InvalidParameter {
                name: "vif.sigma_nsq",
                reason: format!("must be positive, got {}", self.sigma_nsq),
            });
        }
        Ok(())
    }
}

/// Scalar VIF between two equally sized planes.
///
/// The window is clamped to the plane size. Neighbourhoods where the
/// reference has no variance carry no information and contribute only the
/// stabilizer to both sums.
///
/// # Errors
/// Returns [`FunqueError::ShapeMismatch`] if the planes differ in size.
pub fn vif_spatial(reference: &Plane, distorted: &Plane, params: VifParams) -> Result<f64> {
    reference.check_same_size(distorted)?;
    let (w, h) = (reference.width(), reference.height());
    if w == 0 || h == 0 {
        return Ok(1.0);
    }
    let k = params.window.min(w).min(h).max(1);
    let sigma = params.sigma_nsq;

    let mu_x = IntegralImage::from_map(reference, |v| v).window_means(w, h, k);
    let mu_y = IntegralImage::from_map(distorted, |v| v).window_means(w, h, k);
    let xx = IntegralImage::from_map(reference, |v| v * v).window_means(w, h, k);
    let yy = IntegralImage::from_map(distorted, |v| v * v).window_means(w, h, k);
    let xy = IntegralImage::from_product(reference, distorted).window_means(w, h, k);

    let mut num = 0.0;
    let mut den = 0.0;
    for i in 0..mu_x.len() {
        let mx = mu_x.data()[i];
        let my = mu_y.data()[i];
        let mut var_x = (xx.data()[i] - mx * mx).max(0.0);
        let var_y = (yy.data()[i] - my * my).max(0.0);
        let cov = xy.data()[i] - mx * my;

        let mut g = cov / (var_x + VIF_EPS);
        let mut sv = var_y - g * cov;

        if var_x < VIF_EPS {
            g = 0.0;
            sv = var_y;
            var_x = 0.0;
        }
        if var_y < VIF_EPS {
            g = 0.0;
            sv = 0.0;
        }
        if g < 0.0 {
            sv = var_x;
            g = 0.0;
        }
        sv = sv.max(VIF_EPS);

        num += (1.0 + g * g * var_x / (sv + sigma)).ln() + VIF_STABILITY;
        den += (1.0 + var_x / sigma).ln() + VIF_STABILITY;
    }
    Ok(num / den)
}

/// VIF of every approximation level, finest first.
///
/// # Errors
/// Returns [`FunqueError::ShapeMismatch`] if the pyramids differ in shape.
pub fn vif_pyramid(reference: &Pyramid, distorted: &Pyramid, params: VifParams) -> Result<Vec<f64>> {
    if reference.levels() != distorted.levels() {
        return Err(FunqueError::ShapeMismatch {
            left: reference.approximation(0).dimensions(),
            right: distorted.approximation(0).dimensions(),
        });
    }
    (0..reference.levels())
        .map(|l| vif_spatial(reference.approximation(l), distorted.approximation(l), params))
        .collect()
}
