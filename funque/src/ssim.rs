//! Wavelet-domain SSIM and MS-SSIM.
//!
//! One coefficient at level `l` (0 = finest) covers a `2^(l+1)` square of
//! the input. For an orthonormal transform the local mean of that square is
//! the approximation divided by `2^(l+1)`, and its variance is the energy of
//! every detail coefficient underneath it divided by the square's area.
//! Cross-energies give the covariance the same way, so SSIM maps at every
//! level fall out of the pyramid without any further filtering.

use std::fmt;
use std::str::FromStr;

use crate::consts::{SSIM_K1, SSIM_K2, SSIM_MAX_VAL};
use crate::image::Plane;
use crate::wavelet::Pyramid;
use crate::{FunqueError, Result};

/// Stabilizer constants.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SsimParams {
    /// Luminance factor `K1`.
    pub k1: f64,
    /// Contrast-structure factor `K2`.
    pub k2: f64,
    /// Dynamic range of the samples.
    pub max_val: f64,
}

impl Default for SsimParams {
    fn default() -> Self {
        Self {
            k1: SSIM_K1,
            k2: SSIM_K2,
            max_val: SSIM_MAX_VAL,
        }
    }
}

impl SsimParams {
    fn c1(&self) -> f64 {
        (self.k1 * self.max_val).powi(2)
    }

    fn c2(&self) -> f64 {
        (self.k2 * self.max_val).powi(2)
    }

    /// # Errors
    /// Returns [`FunqueError::InvalidParameter`] unless all constants are positive.
    pub fn validate(&self) -> Result<()> {
        if self.k1 > 0.0 && self.k2 > 0.0 && self.max_val > 0.0 {
            Ok(())
        } else {
            Err(FunqueError::InvalidParameter {
                name: "ssim",
                reason: format!(
                    "k1, k2 and max_val must be positive, got {}, {}, {}",
                    self.k1, self.k2, self.max_val
                ),
            })
        }
    }
}

/// Reduction of a similarity map to a scalar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Pooling {
    /// Arithmetic mean.
    Mean,
    /// Population variance of the map (spatial non-uniformity).
    Cov,
    /// `1 - cbrt(mean(|1 - s|^3))`.
    Mink3,
}

impl Pooling {
    /// All poolings in output order.
    pub const ALL: [Pooling; 3] = [Pooling::Mean, Pooling::Cov, Pooling::Mink3];

    /// Name used in feature and score columns.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Pooling::Mean => "mean",
            Pooling::Cov => "cov",
            Pooling::Mink3 => "mink3",
        }
    }

    /// Pools a map. An empty map pools to 0.
    #[must_use]
    pub fn pool(self, map: &Plane) -> f64 {
        if map.is_empty() {
            return 0.0;
        }
        let n = map.len() as f64;
        match self {
            Pooling::Mean => map.mean(),
            Pooling::Cov => {
                let mean = map.mean();
                map.data().iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n
            }
            Pooling::Mink3 => {
                let deficit = map.data().iter().map(|s| (1.0 - s).abs().powi(3)).sum::<f64>() / n;
                1.0 - deficit.cbrt()
            }
        }
    }
}

impl FromStr for Pooling {
    type Err = FunqueError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "mean" => Ok(Pooling::Mean),
            "cov" => Ok(Pooling::Cov),
            "mink3" => Ok(Pooling::Mink3),
            _ => Err(FunqueError::InvalidParameter {
                name: "pooling",
                reason: format!("unknown pooling '{s}'"),
            }),
        }
    }
}

impl fmt::Display for Pooling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A map pooled every way.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Pooled {
    pub mean: f64,
    pub cov: f64,
    pub mink3: f64,
}

impl Pooled {
    fn of(map: &Plane) -> Self {
        Self {
            mean: Pooling::Mean.pool(map),
            cov: Pooling::Cov.pool(map),
            mink3: Pooling::Mink3.pool(map),
        }
    }

    /// The value for one pooling.
    #[must_use]
    pub fn get(&self, pooling: Pooling) -> f64 {
        match pooling {
            Pooling::Mean => self.mean,
            Pooling::Cov => self.cov,
            Pooling::Mink3 => self.mink3,
        }
    }
}

/// SSIM and contrast-structure maps of one level.
#[derive(Debug, Clone)]
pub struct LevelMaps {
    /// Luminance × contrast-structure.
    pub ssim: Plane,
    /// Contrast-structure only.
    pub cs: Plane,
}

/// Sums every 2×2 block.
fn block_sum_2x2(input: &Plane) -> Plane {
    Plane::from_fn(input.width() / 2, input.height() / 2, |x, y| {
        input.get(2 * x, 2 * y)
            + input.get(2 * x + 1, 2 * y)
            + input.get(2 * x, 2 * y + 1)
            + input.get(2 * x + 1, 2 * y + 1)
    })
}

/// Cross-energy `Σ a·b` over the three detail subbands.
fn detail_energy(a: &[Plane; 3], b: &[Plane; 3]) -> Plane {
    let (w, h) = (a[0].width(), a[0].height());
    let mut out = Plane::new(w, h);
    for (pa, pb) in a.iter().zip(b) {
        for (o, (x, y)) in out.data_mut().iter_mut().zip(pa.data().iter().zip(pb.data())) {
            *o += x * y;
        }
    }
    out
}

fn check_pyramids(reference: &Pyramid, distorted: &Pyramid) -> Result<()> {
    if reference.levels() != distorted.levels() {
        return Err(FunqueError::ShapeMismatch {
            left: reference.approximation(0).dimensions(),
            right: distorted.approximation(0).dimensions(),
        });
    }
    for l in 0..reference.levels() {
        reference
            .approximation(l)
            .check_same_size(distorted.approximation(l))?;
    }
    Ok(())
}

/// SSIM and CS maps for every level, finest first.
///
/// # Errors
/// Returns [`FunqueError::ShapeMismatch`] if the pyramids differ in shape.
pub fn level_maps(
    reference: &Pyramid,
    distorted: &Pyramid,
    params: SsimParams,
) -> Result<Vec<LevelMaps>> {
    check_pyramids(reference, distorted)?;
    let (c1, c2) = (params.c1(), params.c2());

    let mut maps = Vec::with_capacity(reference.levels());
    let mut energy_x: Option<Plane> = None;
    let mut energy_y: Option<Plane> = None;
    let mut energy_xy: Option<Plane> = None;

    for l in 0..reference.levels() {
        let (dr, dd) = (reference.details(l), distorted.details(l));
        let mut ex = detail_energy(dr, dr);
        let mut ey = detail_energy(dd, dd);
        let mut exy = detail_energy(dr, dd);
        if let (Some(px), Some(py), Some(pxy)) = (&energy_x, &energy_y, &energy_xy) {
            for (acc, prev) in [(&mut ex, px), (&mut ey, py), (&mut exy, pxy)] {
                let coarse = block_sum_2x2(prev);
                for (a, c) in acc.data_mut().iter_mut().zip(coarse.data()) {
                    *a += c;
                }
            }
        }

        let side = (1u64 << (l + 1)) as f64;
        let area = side * side;
        let (ar, ad) = (reference.approximation(l), distorted.approximation(l));
        let (w, h) = (ar.width(), ar.height());
        let mut ssim = Plane::new(w, h);
        let mut cs = Plane::new(w, h);
        for i in 0..ar.len() {
            let mu_x = ar.data()[i] / side;
            let mu_y = ad.data()[i] / side;
            let var_x = ex.data()[i] / area;
            let var_y = ey.data()[i] / area;
            let cov = exy.data()[i] / area;
            let lum = (2.0 * mu_x * mu_y + c1) / (mu_x * mu_x + mu_y * mu_y + c1);
            let contrast = (2.0 * cov + c2) / (var_x + var_y + c2);
            cs.data_mut()[i] = contrast;
            ssim.data_mut()[i] = lum * contrast;
        }
        maps.push(LevelMaps { ssim, cs });

        energy_x = Some(ex);
        energy_y = Some(ey);
        energy_xy = Some(exy);
    }
    Ok(maps)
}

/// Single-scale SSIM, pooled at the coarsest level of the pyramids.
///
/// # Errors
/// Returns [`FunqueError::ShapeMismatch`] if the pyramids differ in shape.
pub fn ssim_pyr(reference: &Pyramid, distorted: &Pyramid, params: SsimParams) -> Result<Pooled> {
    let maps = level_maps(reference, distorted, params)?;
    Ok(maps
        .last()
        .map_or(Pooled { mean: 1.0, cov: 0.0, mink3: 1.0 }, |m| Pooled::of(&m.ssim)))
}

/// Combined MS-SSIM maps per level, finest first.
///
/// The map at level `l` is `ssim_l · Π_{j<l} cs_j`, with every finer CS map
/// averaged down over 2×2 blocks to the resolution of level `l`.
///
/// # Errors
/// Returns [`FunqueError::ShapeMismatch`] if the pyramids differ in shape.
pub fn ms_ssim_maps(
    reference: &Pyramid,
    distorted: &Pyramid,
    params: SsimParams,
) -> Result<Vec<Plane>> {
    let maps = level_maps(reference, distorted, params)?;
    let mut out = Vec::with_capacity(maps.len());
    let mut cs_product: Option<Plane> = None;
    for m in &maps {
        let mut combined = m.ssim.clone();
        let mut next = m.cs.clone();
        if let Some(prod) = &cs_product {
            for ((c, n), p) in combined
                .data_mut()
                .iter_mut()
                .zip(next.data_mut().iter_mut())
                .zip(prod.data())
            {
                *c *= p;
                *n *= p;
            }
        }
        out.push(combined);
        let mut coarse = block_sum_2x2(&next);
        coarse.scale(0.25);
        cs_product = Some(coarse);
    }
    Ok(out)
}

/// MS-SSIM per level: every pooling of the combined map of [`ms_ssim_maps`].
///
/// # Errors
/// Returns [`FunqueError::ShapeMismatch`] if the pyramids differ in shape.
pub fn ms_ssim_pyr(
    reference: &Pyramid,
    distorted: &Pyramid,
    params: SsimParams,
) -> Result<Vec<Pooled>> {
    Ok(ms_ssim_maps(reference, distorted, params)?
        .iter()
        .map(Pooled::of)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Wavelet;

    fn texture(w: usize, h: usize) -> Plane {
        Plane::from_fn(w, h, |x, y| {
            0.5 + 0.25 * ((x as f64 * 0.9).sin() + (y as f64 * 0.35).cos()) / 2.0
        })
    }

    /// Direct block statistics for a Haar pyramid: SSIM and CS maps.
    fn brute_force_maps(a: &Plane, b: &Plane, side: usize, params: SsimParams) -> (Plane, Plane) {
        let (c1, c2) = (params.c1(), params.c2());
        let (w, h) = (a.width() / side, a.height() / side);
        let mut ssim = Plane::new(w, h);
        let mut cs = Plane::new(w, h);
        let n = (side * side) as f64;
        for by in 0..h {
            for bx in 0..w {
                let (mut sa, mut sb, mut saa, mut sbb, mut sab) = (0.0, 0.0, 0.0, 0.0, 0.0);
                for y in by * side..(by + 1) * side {
                    for x in bx * side..(bx + 1) * side {
                        let (u, v) = (a.get(x, y), b.get(x, y));
                        sa += u;
                        sb += v;
                        saa += u * u;
                        sbb += v * v;
                        sab += u * v;
                    }
                }
                let (ma, mb) = (sa / n, sb / n);
                let va = saa / n - ma * ma;
                let vb = sbb / n - mb * mb;
                let cov = sab / n - ma * mb;
                let contrast = (2.0 * cov + c2) / (va + vb + c2);
                cs.set(bx, by, contrast);
                ssim.set(bx, by, (2.0 * ma * mb + c1) / (ma * ma + mb * mb + c1) * contrast);
            }
        }
        (ssim, cs)
    }

    fn patterned_distortion(a: &Plane) -> Plane {
        Plane::from_fn(a.width(), a.height(), |x, y| {
            a.get(x, y) + if (x / 3 + y / 2) % 2 == 0 { 0.08 } else { -0.03 }
        })
    }

    #[test]
    fn test_pooling() {
        let map = Plane::from_vec(vec![1.0, 0.5, 1.0, 0.5], 2, 2).unwrap();
        assert!((Pooling::Mean.pool(&map) - 0.75).abs() < 1e-12);
        assert!((Pooling::Cov.pool(&map) - 0.0625).abs() < 1e-12);
        // mean(|1-s|^3) = 0.0625, cbrt = 0.39685
        assert!((Pooling::Mink3.pool(&map) - (1.0 - 0.0625f64.cbrt())).abs() < 1e-12);
        assert_eq!("mink3".parse::<Pooling>().unwrap(), Pooling::Mink3);
    }

    #[test]
    fn test_identical_inputs() {
        let pyr = Pyramid::decompose(&texture(64, 64), Wavelet::Haar, 3).unwrap();
        let s = ssim_pyr(&pyr, &pyr, SsimParams::default()).unwrap();
        assert!((s.mean - 1.0).abs() < 1e-12);
        assert!(s.cov.abs() < 1e-12);
        assert!((s.mink3 - 1.0).abs() < 1e-12);
        for level in ms_ssim_pyr(&pyr, &pyr, SsimParams::default()).unwrap() {
            assert!((level.mean - 1.0).abs() < 1e-12);
            assert!(level.cov.abs() < 1e-12);
        }
    }

    #[test]
    fn test_haar_matches_block_statistics() {
        let a = texture(32, 32);
        let b = Plane::from_fn(32, 32, |x, y| (a.get(x, y) * 0.9 + 0.03 * ((x + y) % 3) as f64));
        let pa = Pyramid::decompose(&a, Wavelet::Haar, 2).unwrap();
        let pb = Pyramid::decompose(&b, Wavelet::Haar, 2).unwrap();
        let maps = level_maps(&pa, &pb, SsimParams::default()).unwrap();
        for (l, m) in maps.iter().enumerate() {
            let (direct, _) = brute_force_maps(&a, &b, 1 << (l + 1), SsimParams::default());
            for (x, y) in m.ssim.data().iter().zip(direct.data()) {
                assert!((x - y).abs() < 1e-9, "level {l}: {x} vs {y}");
            }
        }
    }

    #[test]
    fn test_distortion_lowers_mean() {
        let a = texture(64, 64);
        let b = Plane::from_fn(64, 64, |x, y| a.get(x, y) + if (x + y) % 2 == 0 { 0.1 } else { -0.1 });
        let pa = Pyramid::decompose(&a, Wavelet::Haar, 2).unwrap();
        let pb = Pyramid::decompose(&b, Wavelet::Haar, 2).unwrap();
        let s = ssim_pyr(&pa, &pb, SsimParams::default()).unwrap();
        assert!(s.mean < 1.0);
        let ms = ms_ssim_pyr(&pa, &pb, SsimParams::default()).unwrap();
        assert_eq!(ms.len(), 2);
        assert!(ms[0].mean < 1.0);
    }

    #[test]
    fn test_ms_ssim_combines_maps_before_pooling() {
        let params = SsimParams::default();
        let a = texture(32, 32);
        let b = patterned_distortion(&a);
        let pa = Pyramid::decompose(&a, Wavelet::Haar, 3).unwrap();
        let pb = Pyramid::decompose(&b, Wavelet::Haar, 3).unwrap();

        // Map-level reference: ssim_l times the block-averaged product of finer cs maps.
        let mut expected = Vec::new();
        let mut carry: Option<Plane> = None;
        for l in 0..3 {
            let (ssim, cs) = brute_force_maps(&a, &b, 1 << (l + 1), params);
            let combined = Plane::from_fn(ssim.width(), ssim.height(), |x, y| {
                ssim.get(x, y) * carry.as_ref().map_or(1.0, |c| c.get(x, y))
            });
            let weighted = Plane::from_fn(cs.width(), cs.height(), |x, y| {
                cs.get(x, y) * carry.as_ref().map_or(1.0, |c| c.get(x, y))
            });
            carry = Some(Plane::from_fn(cs.width() / 2, cs.height() / 2, |x, y| {
                (weighted.get(2 * x, 2 * y)
                    + weighted.get(2 * x + 1, 2 * y)
                    + weighted.get(2 * x, 2 * y + 1)
                    + weighted.get(2 * x + 1, 2 * y + 1))
                    / 4.0
            }));
            expected.push(combined);
        }

        let maps = ms_ssim_maps(&pa, &pb, params).unwrap();
        let pooled = ms_ssim_pyr(&pa, &pb, params).unwrap();
        assert_eq!(maps.len(), 3);
        for (l, (map, reference)) in maps.iter().zip(&expected).enumerate() {
            assert_eq!(map.dimensions(), reference.dimensions());
            for (x, y) in map.data().iter().zip(reference.data()) {
                assert!((x - y).abs() < 1e-9, "level {l}: {x} vs {y}");
            }
            for pool in Pooling::ALL {
                let want = pool.pool(reference);
                let got = pooled[l].get(pool);
                assert!((got - want).abs() < 1e-9, "level {l} {pool}: {got} vs {want}");
            }
        }
        assert!(pooled[2].mean < 1.0);
        assert!(pooled[2].cov > 0.0);
    }

    #[test]
    fn test_ms_ssim_cov_keeps_scale_of_level_map() {
        let params = SsimParams::default();
        let a = Plane::from_fn(128, 128, |x, y| {
            let (fx, fy) = (x as f64, y as f64);
            0.5 + 0.2 * (fx * 0.7).sin() * (fy * 0.45).cos() + 0.1 * ((fx + 2.0 * fy) * 0.23).sin()
        });
        let b = patterned_distortion(&a);
        let pa = Pyramid::decompose(&a, Wavelet::Haar, 4).unwrap();
        let pb = Pyramid::decompose(&b, Wavelet::Haar, 4).unwrap();

        let own = level_maps(&pa, &pb, params).unwrap();
        let ms = ms_ssim_pyr(&pa, &pb, params).unwrap();
        let own_cov = Pooling::Cov.pool(&own[3].ssim);
        let ms_cov = ms[3].cov;
        assert!(own_cov > 0.0);
        assert!(
            ms_cov > own_cov / 50.0 && ms_cov < own_cov * 50.0,
            "coarsest cov {ms_cov} vs level map cov {own_cov}"
        );
    }

    #[test]
    fn test_level_mismatch() {
        let a = Pyramid::decompose(&texture(32, 32), Wavelet::Haar, 2).unwrap();
        let b = Pyramid::decompose(&texture(32, 32), Wavelet::Haar, 1).unwrap();
        assert!(matches!(
            ssim_pyr(&a, &b, SsimParams::default()),
            Err(FunqueError::ShapeMismatch { .. })
        ));
    }
}
