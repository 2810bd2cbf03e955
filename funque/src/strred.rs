//! Spatio-temporal reduced-reference entropy differences (ST-RRED).
//!
//! Each horizontal and vertical detail subband is summarized by the
//! Gaussian entropy of its local block variances, scaled by `ln(1 + var)`.
//! The spatial term compares those summaries between reference and
//! distorted; the temporal term does the same on frame differences.

use crate::consts::{STRRED_BLOCK_SIZE, STRRED_SIGMA_NSQ};
use crate::image::Plane;
use crate::wavelet::{Orientation, Pyramid};
use crate::{FunqueError, Result};

/// Entropy model parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct StrredParams {
    /// Side of the non-overlapping variance blocks.
    pub block_size: usize,
    /// Neural noise variance added before taking entropies.
    pub sigma_nsq: f64,
}

impl Default for StrredParams {
    fn default() -> Self {
        Self {
            block_size: STRRED_BLOCK_SIZE,
            sigma_nsq: STRRED_SIGMA_NSQ,
        }
    }
}

impl StrredParams {
    /// # Errors
    /// Returns [`FunqueError::InvalidParameter`] for a zero block size or a
    /// non-positive noise variance.
    pub fn validate(&self) -> Result<()> {
        if self.block_size == 0 {
            return Err(FunqueError::InvalidParameter {
                name: "strred.block_size",
                reason: "must be at least 1".into(),
            });
        }
        if self.sigma_nsq <= 0.0 || self.sigma_nsq.is_nan() {
            return Err(FunqueError::InvalidParameter {
                name: "strred.sigma_nsq",
                reason: format!("must be positive, got {}", self.sigma_nsq),
            });
        }
        Ok(())
    }
}

/// ST-RRED terms of one level.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct StrredLevel {
    /// Spatial entropy difference.
    pub srred: f64,
    /// Temporal entropy difference.
    pub trred: f64,
    /// `srred × trred`.
    pub strred: f64,
}

/// Scaled entropies of the `b × b` block variances of a subband.
///
/// Partial blocks at the right and bottom edges are dropped.
fn scaled_entropies(subband: &Plane, params: StrredParams) -> Vec<f64> {
    let b = params.block_size;
    let (bw, bh) = (subband.width() / b, subband.height() / b);
    let norm = 1.0 / (b * b) as f64;
    let two_pi_e = 2.0 * std::f64::consts::PI * std::f64::consts::E;
    let mut out = Vec::with_capacity(bw * bh);
    for by in 0..bh {
        for bx in 0..bw {
            let mut energy = 0.0;
            for y in by * b..(by + 1) * b {
                for &v in &subband.row(y)[bx * b..(bx + 1) * b] {
                    energy += v * v;
                }
            }
            let var = energy * norm;
            let entropy = 0.5 * (two_pi_e * (var + params.sigma_nsq)).ln();
            out.push(entropy * (1.0 + var).ln());
        }
    }
    out
}

/// `current - previous`; sizes are checked by the caller.
fn difference(current: &Plane, previous: &Plane) -> Plane {
    Plane::from_fn(current.width(), current.height(), |x, y| {
        current.get(x, y) - previous.get(x, y)
    })
}

/// Mean absolute difference of the scaled entropies of H and V subbands.
fn entropy_difference(reference: [&Plane; 2], distorted: [&Plane; 2], params: StrredParams) -> f64 {
    let mut sum = 0.0;
    let mut count = 0usize;
    for (r, d) in reference.iter().zip(&distorted) {
        let er = scaled_entropies(r, params);
        let ed = scaled_entropies(d, params);
        sum += er.iter().zip(&ed).map(|(a, b)| (a - b).abs()).sum::<f64>();
        count += er.len();
    }
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

const ORIENTED: [Orientation; 2] = [Orientation::Horizontal, Orientation::Vertical];

fn check_shapes(pyramids: [&Pyramid; 4]) -> Result<()> {
    let first = pyramids[0];
    for other in &pyramids[1..] {
        if other.levels() != first.levels() {
            return Err(FunqueError::ShapeMismatch {
                left: first.approximation(0).dimensions(),
                right: other.approximation(0).dimensions(),
            });
        }
        for l in 0..first.levels() {
            first
                .approximation(l)
                .check_same_size(other.approximation(l))?;
        }
    }
    Ok(())
}

/// Spatial entropy difference per level, finest first.
///
/// # Errors
/// Returns [`FunqueError::ShapeMismatch`] if the pyramids differ in shape.
pub fn srred_pyr(reference: &Pyramid, distorted: &Pyramid, params: StrredParams) -> Result<Vec<f64>> {
    check_shapes([reference, distorted, reference, distorted])?;
    Ok((0..reference.levels())
        .map(|l| {
            entropy_difference(
                ORIENTED.map(|o| reference.detail(l, o)),
                ORIENTED.map(|o| distorted.detail(l, o)),
                params,
            )
        })
        .collect())
}

/// Spatial, temporal and combined terms per level, finest first.
///
/// Needs the previous frame's pyramids; at the first frame the caller
/// supplies zeros instead of calling this.
///
/// # Errors
/// Returns [`FunqueError::ShapeMismatch`] if any pyramids differ in shape.
pub fn strred_pyr(
    reference: &Pyramid,
    distorted: &Pyramid,
    previous_reference: &Pyramid,
    previous_distorted: &Pyramid,
    params: StrredParams,
) -> Result<Vec<StrredLevel>> {
    check_shapes([reference, distorted, previous_reference, previous_distorted])?;
    let spatial = srred_pyr(reference, distorted, params)?;
    Ok(spatial
        .into_iter()
        .enumerate()
        .map(|(l, srred)| {
            let ref_diff =
                ORIENTED.map(|o| difference(reference.detail(l, o), previous_reference.detail(l, o)));
            let dis_diff =
                ORIENTED.map(|o| difference(distorted.detail(l, o), previous_distorted.detail(l, o)));
            let trred = entropy_difference(
                [&ref_diff[0], &ref_diff[1]],
                [&dis_diff[0], &dis_diff[1]],
                params,
            );
            StrredLevel {
                srred,
                trred,
                strred: srred * trred,
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Wavelet;

    fn frame(seed: usize) -> Pyramid {
        let img = Plane::from_fn(32, 32, |x, y| ((x * 13 + y * 7 + seed * 5) % 11) as f64 / 11.0);
        Pyramid::decompose(&img, Wavelet::Haar, 2).unwrap()
    }

    #[test]
    fn test_identical_streams_are_zero() {
        let (cur, prev) = (frame(1), frame(0));
        let levels = strred_pyr(&cur, &cur, &prev, &prev, StrredParams::default()).unwrap();
        assert_eq!(levels.len(), 2);
        for l in levels {
            assert_eq!(l, StrredLevel::default());
        }
    }

    #[test]
    fn test_static_content_has_zero_trred() {
        let reference = frame(0);
        let distorted = frame(3);
        let levels =
            strred_pyr(&reference, &distorted, &reference, &distorted, StrredParams::default())
                .unwrap();
        for l in &levels {
            assert!(l.srred > 0.0);
            assert_eq!(l.trred, 0.0);
            assert_eq!(l.strred, 0.0);
        }
    }

    #[test]
    fn test_block_variance() {
        let sub = Plane::from_vec(vec![1.0, 1.0, 3.0, 3.0, 1.0, 1.0, 3.0, 3.0], 4, 2).unwrap();
        let params = StrredParams {
            block_size: 2,
            sigma_nsq: 0.1,
        };
        let ent = scaled_entropies(&sub, params);
        assert_eq!(ent.len(), 2);
        let expected = |var: f64| {
            0.5 * (2.0 * std::f64::consts::PI * std::f64::consts::E * (var + 0.1)).ln()
                * (1.0 + var).ln()
        };
        assert!((ent[0] - expected(1.0)).abs() < 1e-12);
        assert!((ent[1] - expected(9.0)).abs() < 1e-12);
    }

    #[test]
    fn test_shape_mismatch() {
        let small = Pyramid::decompose(&Plane::new(16, 16), Wavelet::Haar, 2).unwrap();
        let big = frame(0);
        assert!(srred_pyr(&big, &small, StrredParams::default()).is_err());
    }
}
