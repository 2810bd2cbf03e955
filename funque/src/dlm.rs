//! Detail loss measure (the detail half of ADM).
//!
//! Distorted detail coefficients are split into a restored part, which is
//! the reference scaled down where detail was lost, and an additive part
//! holding everything else. The additive part masks the restored part, and
//! the masked restored energy is compared with the reference energy.

use crate::consts::{
    DLM_ANGLE_THRESHOLD_DEG, DLM_BORDER_FRACTION, DLM_EPS, DLM_MASK_CENTER, DLM_MASK_NEIGHBOR,
    DLM_STABILITY,
};
use crate::convolve::mirror;
use crate::image::Plane;
use crate::wavelet::{Orientation, Pyramid};
use crate::{FunqueError, Result};

/// Pooling region control.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct DlmParams {
    /// Fraction of each side excluded from pooling, per border.
    pub border_fraction: f64,
}

impl Default for DlmParams {
    fn default() -> Self {
        Self {
            border_fraction: DLM_BORDER_FRACTION,
        }
    }
}

impl DlmParams {
    /// # Errors
    /// Returns [`FunqueError::InvalidParameter`] unless `0 <= border_fraction < 0.5`.
    pub fn validate(&self) -> Result<()> {
        if (0.0..0.5).contains(&self.border_fraction) {
            Ok(())
        } else {
            Err(FunqueError::InvalidParameter {
                name: "dlm.border_fraction",
                reason: format!("must lie in [0, 0.5), got {}", self.border_fraction),
            })
        }
    }
}

/// Full-pyramid DLM.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct DlmScores {
    /// Ratio of summed numerators to summed denominators.
    pub overall: f64,
    /// Ratio per level, finest first.
    pub levels: Vec<f64>,
}

/// Numerator and denominator energies of one level.
#[derive(Debug, Clone, Copy)]
struct LevelEnergy {
    num: f64,
    den: f64,
}

impl LevelEnergy {
    fn ratio(self) -> f64 {
        (self.num + DLM_STABILITY) / (self.den + DLM_STABILITY)
    }
}

/// Orientation angle of an (H, V) detail pair.
#[inline]
fn orientation_angle(h: f64, v: f64) -> f64 {
    let base = (v / (h + DLM_EPS)).atan();
    if h <= 0.0 {
        base + std::f64::consts::PI
    } else {
        base
    }
}

/// Splits distorted details into restored and additive parts.
fn decouple(reference: &[Plane; 3], distorted: &[Plane; 3]) -> ([Plane; 3], [Plane; 3]) {
    let threshold = DLM_ANGLE_THRESHOLD_DEG.to_radians();
    let (w, h) = (reference[0].width(), reference[0].height());
    let mut restored: [Plane; 3] = std::array::from_fn(|_| Plane::new(w, h));
    let mut additive: [Plane; 3] = std::array::from_fn(|_| Plane::new(w, h));

    let (rh, rv) = (&reference[0], &reference[1]);
    let (dh, dv) = (&distorted[0], &distorted[1]);
    for i in 0..rh.len() {
        let psi_ref = orientation_angle(rh.data()[i], rv.data()[i]);
        let psi_dis = orientation_angle(dh.data()[i], dv.data()[i]);
        let aligned = (psi_ref - psi_dis).abs() < threshold;
        for o in 0..3 {
            let r = reference[o].data()[i];
            let d = distorted[o].data()[i];
            let rest = if aligned {
                d
            } else {
                (d / (r + DLM_EPS)).clamp(0.0, 1.0) * r
            };
            restored[o].data_mut()[i] = rest;
            additive[o].data_mut()[i] = d - rest;
        }
    }
    (restored, additive)
}

/// Contrast masking threshold: 3×3 weighted sum of `|additive|` over all
/// orientations.
fn masking_threshold(additive: &[Plane; 3]) -> Plane {
    let (w, h) = (additive[0].width(), additive[0].height());
    let mut out = Plane::new(w, h);
    for plane in additive {
        for y in 0..h {
            for x in 0..w {
                let mut acc = 0.0;
                for dy in -1isize..=1 {
                    let sy = mirror(y as isize + dy, h);
                    for dx in -1isize..=1 {
                        let sx = mirror(x as isize + dx, w);
                        let weight = if dx == 0 && dy == 0 {
                            DLM_MASK_CENTER
                        } else {
                            DLM_MASK_NEIGHBOR
                        };
                        acc += weight * plane.get(sx, sy).abs();
                    }
                }
                out[(x, y)] += acc;
            }
        }
    }
    out
}

/// Pooling window `[start, end)` along one side.
fn pooling_range(len: usize, fraction: f64) -> (usize, usize) {
    let border = (len as f64 * fraction).floor() as usize;
    if 2 * border >= len {
        (0, len)
    } else {
        (border, len - border)
    }
}

fn level_energy(reference: &[Plane; 3], distorted: &[Plane; 3], params: DlmParams) -> Result<LevelEnergy> {
    for (r, d) in reference.iter().zip(distorted) {
        r.check_same_size(d)?;
        r.check_same_size(&reference[0])?;
    }
    let (restored, additive) = decouple(reference, distorted);
    let mask = masking_threshold(&additive);

    let (w, h) = (reference[0].width(), reference[0].height());
    let (x0, x1) = pooling_range(w, params.border_fraction);
    let (y0, y1) = pooling_range(h, params.border_fraction);

    let mut num = 0.0;
    let mut den = 0.0;
    for o in Orientation::ALL {
        let (rest, refp) = (&restored[o.index()], &reference[o.index()]);
        let mut masked_sum = 0.0;
        let mut ref_sum = 0.0;
        for y in y0..y1 {
            for x in x0..x1 {
                let masked = (rest.get(x, y).abs() - mask.get(x, y)).max(0.0);
                masked_sum += masked * masked * masked;
                ref_sum += refp.get(x, y).abs().powi(3);
            }
        }
        num += masked_sum.cbrt();
        den += ref_sum.cbrt();
    }
    Ok(LevelEnergy { num, den })
}

/// DLM of a single detail triple.
///
/// # Errors
/// Returns [`FunqueError::ShapeMismatch`] if any subbands differ in size.
pub fn dlm_triple(reference: &[Plane; 3], distorted: &[Plane; 3], params: DlmParams) -> Result<f64> {
    Ok(level_energy(reference, distorted, params)?.ratio())
}

/// DLM over every level of two pyramids.
///
/// # Errors
/// Returns [`FunqueError::ShapeMismatch`] if the pyramids differ in shape.
pub fn dlm_pyr(reference: &Pyramid, distorted: &Pyramid, params: DlmParams) -> Result<DlmScores> {
    if reference.levels() != distorted.levels() {
        return Err(FunqueError::ShapeMismatch {
            left: reference.approximation(0).dimensions(),
            right: distorted.approximation(0).dimensions(),
        });
    }
    let energies = (0..reference.levels())
        .map(|l| level_energy(reference.details(l), distorted.details(l), params))
        .collect::<Result<Vec<_>>>()?;
    let total = energies.iter().fold(LevelEnergy { num: 0.0, den: 0.0 }, |acc, e| LevelEnergy {
        num: acc.num + e.num,
        den: acc.den + e.den,
    });
    Ok(DlmScores {
        overall: total.ratio(),
        levels: energies.into_iter().map(LevelEnergy::ratio).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Wavelet;

    fn texture(w: usize, h: usize) -> Plane {
        Plane::from_fn(w, h, |x, y| {
            0.5 + 0.2 * (x as f64 * 0.8).sin() * (y as f64 * 0.3 + 1.0).cos()
        })
    }

    fn pyramid(p: &Plane, levels: usize) -> Pyramid {
        Pyramid::decompose(p, Wavelet::Haar, levels).unwrap()
    }

    #[test]
    fn test_identical_is_one() {
        let pyr = pyramid(&texture(64, 64), 3);
        let scores = dlm_pyr(&pyr, &pyr, DlmParams::default()).unwrap();
        assert!((scores.overall - 1.0).abs() < 1e-12);
        assert_eq!(scores.levels.len(), 3);
        for s in &scores.levels {
            assert!((s - 1.0).abs() < 1e-12);
        }
        let single = dlm_triple(pyr.coarsest_details(), pyr.coarsest_details(), DlmParams::default())
            .unwrap();
        assert!((single - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_blur_loses_detail() {
        let reference = texture(64, 64);
        let blurred = Plane::from_fn(64, 64, |x, y| {
            let xl = x.saturating_sub(1);
            let xr = (x + 1).min(63);
            (reference.get(xl, y) + 2.0 * reference.get(x, y) + reference.get(xr, y)) / 4.0
        });
        let scores = dlm_pyr(&pyramid(&reference, 2), &pyramid(&blurred, 2), DlmParams::default())
            .unwrap();
        assert!(scores.overall < 1.0, "{}", scores.overall);
        assert!(scores.overall > 0.0);
    }

    #[test]
    fn test_restored_never_exceeds_reference() {
        let a = pyramid(&texture(32, 32), 1);
        let b = pyramid(&Plane::from_fn(32, 32, |x, y| ((x * y) % 5) as f64 / 5.0), 1);
        let (restored, _) = decouple(a.details(0), b.details(0));
        for o in 0..3 {
            for (r, d) in restored[o].data().iter().zip(a.details(0)[o].data()) {
                // Either copied from the distorted subband or a shrunk reference.
                assert!(r.abs() <= d.abs() + 1e-12 || b.details(0)[o].data().contains(r));
            }
        }
    }

    #[test]
    fn test_orientation_angle_quadrants() {
        assert!(orientation_angle(1.0, 0.0).abs() < 1e-12);
        assert!((orientation_angle(-1.0, 0.0) - std::f64::consts::PI).abs() < 1e-12);
        assert!((orientation_angle(1.0, 1.0) - std::f64::consts::FRAC_PI_4).abs() < 1e-12);
    }

    #[test]
    fn test_pooling_range() {
        assert_eq!(pooling_range(100, 0.1), (10, 90));
        assert_eq!(pooling_range(4, 0.1), (0, 4));
        assert_eq!(pooling_range(2, 0.49), (0, 2));
    }

    #[test]
    fn test_masking_threshold_of_constant() {
        let ones: [Plane; 3] = std::array::from_fn(|_| Plane::filled(5, 5, 1.0));
        let mask = masking_threshold(&ones);
        // 3 orientations × (1/15 + 8/30) = 1
        assert!(mask.data().iter().all(|v| (v - 1.0).abs() < 1e-12));
    }

    #[test]
    fn test_validate() {
        assert!(DlmParams::default().validate().is_ok());
        assert!(DlmParams { border_fraction: 0.5 }.validate().is_err());
    }
}
