//! Contrast sensitivity function (CSF) weighting.
//!
//! Five models are available. Two are spatial pre-filters applied to the
//! image before the wavelet transform (`ngan_spat`, `nadenau_spat`); three
//! weight the detail subbands after it (`nadenau_weight`, `li`, `watson`).
//!
//! All frequencies are in cycles per degree of visual angle. A sampling
//! frequency of `f` cycles/sample maps to `f * ppd` cycles/degree, where
//! `ppd` is the number of samples per degree at the configured viewing
//! distance.

use std::fmt;
use std::str::FromStr;

use crate::consts::{
    CHROMA_CUTOFF, CSF_BAND_SAMPLES, CSF_TAPS, NADENAU_EXPONENT, NADENAU_GAIN, NADENAU_OFFSET,
    NADENAU_SCALE, NGAN_A, NGAN_B, NGAN_C, WATSON_BASIS_AMPLITUDE, WATSON_ORIENTATION_GAIN,
    WATSON_PARAMS,
};
use crate::convolve::convolve_separable;
use crate::image::{Channel, Plane};
use crate::wavelet::{Orientation, Pyramid};
use crate::{FunqueError, Result};

/// Samples per degree of visual angle for a picture `height` samples tall
/// viewed from `viewing_distance` picture heights.
#[must_use]
pub fn pixels_per_degree(viewing_distance: f64, height: usize) -> f64 {
    viewing_distance * height as f64 * std::f64::consts::PI / 180.0
}

/// Where a model is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CsfMode {
    /// Convolution on the image before decomposition.
    Spatial,
    /// Per-subband scaling after decomposition.
    Subband,
}

/// Named CSF model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum CsfModel {
    /// Ngan et al. curve as a spatial filter.
    NganSpat,
    /// Nadenau (Mannos-Sakrison form) curve as a spatial filter.
    NadenauSpat,
    /// Nadenau curve averaged over each subband's band.
    NadenauWeight,
    /// Li et al.: plateau-modified curve at each band center.
    Li,
    /// Watson et al. DWT quantization thresholds.
    Watson,
}

impl CsfModel {
    /// Canonical model name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            CsfModel::NganSpat => "ngan_spat",
            CsfModel::NadenauSpat => "nadenau_spat",
            CsfModel::NadenauWeight => "nadenau_weight",
            CsfModel::Li => "li",
            CsfModel::Watson => "watson",
        }
    }

    /// Whether the model filters images or weights subbands.
    #[must_use]
    pub fn mode(self) -> CsfMode {
        match self {
            CsfModel::NganSpat | CsfModel::NadenauSpat => CsfMode::Spatial,
            CsfModel::NadenauWeight | CsfModel::Li | CsfModel::Watson => CsfMode::Subband,
        }
    }

    fn curve(self, channel: Channel) -> Curve {
        match channel {
            Channel::Y => match self {
                CsfModel::NganSpat => Curve::Ngan,
                _ => Curve::Mannos,
            },
            Channel::U => Curve::ChromaLowpass(CHROMA_CUTOFF[0]),
            Channel::V => Curve::ChromaLowpass(CHROMA_CUTOFF[1]),
        }
    }

    fn wrong_mode(self, wanted: CsfMode) -> FunqueError {
        FunqueError::InvalidParameter {
            name: "csf",
            reason: format!("model '{}' cannot be used in {wanted:?} mode", self.name()),
        }
    }

    /// Odd-length separable kernel for a spatial model.
    ///
    /// Synthesized by frequency sampling the plateau-modified curve, so the
    /// DC gain is exactly 1.
    ///
    /// # Errors
    /// Returns [`FunqueError::InvalidParameter`] for subband models.
    pub fn spatial_kernel(self, channel: Channel, ppd: f64) -> Result<Vec<f64>> {
        if self.mode() != CsfMode::Spatial {
            return Err(self.wrong_mode(CsfMode::Spatial));
        }
        let curve = self.curve(channel);
        let peak = curve.peak();
        let n = CSF_TAPS;
        let half = (n / 2) as isize;
        let response: Vec<f64> = (-half..=half)
            .map(|k| curve.plateau(k.unsigned_abs() as f64 / n as f64 * ppd, peak))
            .collect();
        Ok((-half..=half)
            .map(|t| {
                let sum: f64 = (-half..=half)
                    .zip(&response)
                    .map(|(k, r)| {
                        r * (2.0 * std::f64::consts::PI * (k * t) as f64 / n as f64).cos()
                    })
                    .sum();
                sum / n as f64
            })
            .collect())
    }

    /// Weight of one detail subband for a subband model.
    ///
    /// `level` is 0 for the finest level.
    ///
    /// # Errors
    /// Returns [`FunqueError::InvalidParameter`] for spatial models.
    pub fn subband_weight(
        self,
        level: usize,
        orientation: Orientation,
        channel: Channel,
        ppd: f64,
    ) -> Result<f64> {
        let diag = if orientation == Orientation::Diagonal {
            std::f64::consts::SQRT_2
        } else {
            1.0
        };
        // Level `l` details cover [0.25, 0.5] / 2^l cycles/sample.
        let band_lo = 0.25 / (1u64 << level) as f64 * ppd * diag;
        let band_hi = 2.0 * band_lo;
        let curve = self.curve(channel);
        match self {
            CsfModel::NganSpat | CsfModel::NadenauSpat => Err(self.wrong_mode(CsfMode::Subband)),
            CsfModel::NadenauWeight => {
                let peak = curve.value(curve.peak());
                let step = (band_hi - band_lo) / CSF_BAND_SAMPLES as f64;
                let sum: f64 = (0..CSF_BAND_SAMPLES)
                    .map(|i| curve.value(band_lo + (i as f64 + 0.5) * step))
                    .sum();
                Ok(sum / CSF_BAND_SAMPLES as f64 / peak)
            }
            CsfModel::Li => Ok(curve.plateau(0.5 * (band_lo + band_hi), curve.peak())),
            CsfModel::Watson => {
                let q = watson_threshold(level + 1, orientation, channel, ppd);
                Ok((watson_min_threshold(ppd) / q).min(1.0))
            }
        }
    }

    /// Applies a spatial model to one plane.
    ///
    /// # Errors
    /// Returns [`FunqueError::InvalidParameter`] for subband models.
    pub fn filter_image(self, plane: &Plane, channel: Channel, ppd: f64) -> Result<Plane> {
        let kernel = self.spatial_kernel(channel, ppd)?;
        Ok(convolve_separable(plane, &kernel))
    }

    /// Scales every detail subband of `pyramid` in place.
    ///
    /// # Errors
    /// Returns [`FunqueError::InvalidParameter`] for spatial models.
    pub fn filter_pyramid(self, pyramid: &mut Pyramid, channel: Channel, ppd: f64) -> Result<()> {
        for level in 0..pyramid.levels() {
            for orientation in Orientation::ALL {
                let weight = self.subband_weight(level, orientation, channel, ppd)?;
                pyramid.details_mut(level)[orientation.index()].scale(weight);
            }
        }
        Ok(())
    }
}

/// Spatial kernels of one model for a fixed viewing geometry, one per channel.
#[derive(Debug, Clone)]
pub struct SpatialFilter {
    model: CsfModel,
    kernels: [Vec<f64>; 3],
}

impl SpatialFilter {
    /// Synthesizes the kernels of every channel.
    ///
    /// # Errors
    /// Returns [`FunqueError::InvalidParameter`] for subband models.
    pub fn new(model: CsfModel, ppd: f64) -> Result<Self> {
        let [y, u, v] = Channel::ALL.map(|channel| model.spatial_kernel(channel, ppd));
        Ok(Self {
            model,
            kernels: [y?, u?, v?],
        })
    }

    #[must_use]
    pub fn model(&self) -> CsfModel {
        self.model
    }

    #[must_use]
    pub fn kernel(&self, channel: Channel) -> &[f64] {
        &self.kernels[channel.index()]
    }

    /// Filters one plane of `channel`.
    #[must_use]
    pub fn apply(&self, plane: &Plane, channel: Channel) -> Plane {
        convolve_separable(plane, self.kernel(channel))
    }
}

impl FromStr for CsfModel {
    type Err = FunqueError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ngan_spat" => Ok(CsfModel::NganSpat),
            "nadenau_spat" => Ok(CsfModel::NadenauSpat),
            "nadenau_weight" => Ok(CsfModel::NadenauWeight),
            "li" => Ok(CsfModel::Li),
            "watson" => Ok(CsfModel::Watson),
            _ => Err(FunqueError::UnknownFilterModel(s.to_string())),
        }
    }
}

impl fmt::Display for CsfModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy)]
enum Curve {
    Ngan,
    Mannos,
    ChromaLowpass(f64),
}

impl Curve {
    fn value(self, f: f64) -> f64 {
        match self {
            Curve::Ngan => (NGAN_A + NGAN_B * f) * (-NGAN_C * f).exp(),
            Curve::Mannos => {
                NADENAU_GAIN
                    * (NADENAU_OFFSET + NADENAU_SCALE * f)
                    * (-(NADENAU_SCALE * f).powf(NADENAU_EXPONENT)).exp()
            }
            Curve::ChromaLowpass(cutoff) => (-f / cutoff).exp(),
        }
    }

    /// Frequency of the curve maximum.
    fn peak(self) -> f64 {
        match self {
            Curve::Ngan => 1.0 / NGAN_C - NGAN_A / NGAN_B,
            Curve::ChromaLowpass(_) => 0.0,
            Curve::Mannos => {
                // Unimodal; a fine scan is plenty.
                let mut best = (0.0, self.value(0.0));
                for i in 1..=6000 {
                    let f = i as f64 * 0.01;
                    let v = self.value(f);
                    if v > best.1 {
                        best = (f, v);
                    }
                }
                best.0
            }
        }
    }

    /// Unit-peak curve held at 1 below the peak frequency.
    fn plateau(self, f: f64, peak: f64) -> f64 {
        if f <= peak {
            1.0
        } else {
            self.value(f) / self.value(peak)
        }
    }
}

/// Watson quantization threshold for a detail subband; `level` is 1-based.
fn watson_threshold(level: usize, orientation: Orientation, channel: Channel, ppd: f64) -> f64 {
    let [a, k, f0] = WATSON_PARAMS[channel.index()];
    let theta = if orientation == Orientation::Diagonal { 2 } else { 1 };
    let g = WATSON_ORIENTATION_GAIN[channel.index()][theta];
    let amplitude = WATSON_BASIS_AMPLITUDE[(level - 1).min(WATSON_BASIS_AMPLITUDE.len() - 1)][theta];
    let log_term = ((1u64 << level) as f64 * f0 * g / ppd).log10();
    let y = a * 10f64.powf(k * log_term * log_term);
    2.0 * y / amplitude
}

/// Smallest luma detail threshold over the tabulated levels.
fn watson_min_threshold(ppd: f64) -> f64 {
    (1..=WATSON_BASIS_AMPLITUDE.len())
        .flat_map(|level| {
            [Orientation::Horizontal, Orientation::Diagonal]
                .map(|o| watson_threshold(level, o, Channel::Y, ppd))
        })
        .fold(f64::INFINITY, f64::min)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PPD: f64 = 28.27; // 3 heights at 540 lines

    #[test]
    fn test_parse_and_mode() {
        assert_eq!("li".parse::<CsfModel>().unwrap(), CsfModel::Li);
        assert_eq!(
            "nadenau_spat".parse::<CsfModel>().unwrap().mode(),
            CsfMode::Spatial
        );
        assert!(matches!(
            "daly".parse::<CsfModel>(),
            Err(FunqueError::UnknownFilterModel(name)) if name == "daly"
        ));
    }

    #[test]
    fn test_ppd() {
        let ppd = pixels_per_degree(3.0, 1080);
        assert!((ppd - 56.548667764616276).abs() < 1e-9);
    }

    #[test]
    fn test_spatial_kernel_unit_dc_gain() {
        for model in [CsfModel::NganSpat, CsfModel::NadenauSpat] {
            for channel in Channel::ALL {
                let kernel = model.spatial_kernel(channel, PPD).unwrap();
                assert_eq!(kernel.len(), CSF_TAPS);
                let dc: f64 = kernel.iter().sum();
                assert!((dc - 1.0).abs() < 1e-10, "{model} {channel:?}");
                // Symmetric.
                for i in 0..CSF_TAPS / 2 {
                    assert!((kernel[i] - kernel[CSF_TAPS - 1 - i]).abs() < 1e-12);
                }
            }
        }
    }

    #[test]
    fn test_spatial_filter_matches_per_call_kernel() {
        let ppd = pixels_per_degree(3.0, 270);
        let filter = SpatialFilter::new(CsfModel::NganSpat, ppd).unwrap();
        assert_eq!(filter.model(), CsfModel::NganSpat);
        let plane = Plane::from_fn(24, 20, |x, y| ((x * 7 + y * 3) % 11) as f64 / 10.0);
        for channel in Channel::ALL {
            assert_eq!(
                filter.kernel(channel),
                CsfModel::NganSpat.spatial_kernel(channel, ppd).unwrap().as_slice()
            );
            let direct = CsfModel::NganSpat.filter_image(&plane, channel, ppd).unwrap();
            assert_eq!(filter.apply(&plane, channel), direct);
        }
        assert!(SpatialFilter::new(CsfModel::Li, ppd).is_err());
    }

    #[test]
    fn test_spatial_filter_keeps_flat_image() {
        let img = Plane::filled(40, 30, 0.4);
        let out = CsfModel::NganSpat.filter_image(&img, Channel::Y, PPD).unwrap();
        assert!(out.data().iter().all(|v| (v - 0.4).abs() < 1e-10));
    }

    #[test]
    fn test_mode_mismatch_is_rejected() {
        assert!(CsfModel::Watson.spatial_kernel(Channel::Y, PPD).is_err());
        assert!(CsfModel::NganSpat
            .subband_weight(0, Orientation::Horizontal, Channel::Y, PPD)
            .is_err());
    }

    #[test]
    fn test_subband_weights_in_unit_range() {
        for model in [CsfModel::NadenauWeight, CsfModel::Li, CsfModel::Watson] {
            for channel in Channel::ALL {
                for level in 0..5 {
                    for o in Orientation::ALL {
                        let w = model.subband_weight(level, o, channel, PPD).unwrap();
                        assert!(w > 0.0 && w <= 1.0 + 1e-12, "{model} {level} {o:?} {w}");
                    }
                }
            }
        }
    }

    #[test]
    fn test_fine_diagonal_weighted_below_horizontal() {
        let h = CsfModel::Li
            .subband_weight(0, Orientation::Horizontal, Channel::Y, PPD)
            .unwrap();
        let d = CsfModel::Li
            .subband_weight(0, Orientation::Diagonal, Channel::Y, PPD)
            .unwrap();
        assert!(d < h);
    }

    #[test]
    fn test_filter_pyramid_leaves_approximation() {
        let img = Plane::from_fn(32, 32, |x, y| ((x ^ y) % 7) as f64 / 7.0);
        let mut pyr = Pyramid::decompose(&img, crate::Wavelet::Haar, 2).unwrap();
        let before = pyr.clone();
        CsfModel::NadenauWeight
            .filter_pyramid(&mut pyr, Channel::Y, PPD)
            .unwrap();
        assert_eq!(pyr.approximation(1), before.approximation(1));
        assert_ne!(pyr.details(0), before.details(0));
    }
}
