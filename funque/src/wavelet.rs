//! Periodized orthogonal 2D discrete wavelet transform.
//!
//! Each level splits a plane into an approximation and three detail
//! subbands of half the size. Signals are treated as periodic, so an
//! aligned input yields exactly `N/2` coefficients per axis and the
//! inverse transform reconstructs the input.

use std::fmt;
use std::str::FromStr;

use crate::image::Plane;
use crate::{Dimensions, FunqueError, Result};

const SQRT_HALF: f64 = std::f64::consts::FRAC_1_SQRT_2;

const HAAR_LO: [f64; 2] = [SQRT_HALF, SQRT_HALF];

const DB2_LO: [f64; 4] = [
    0.48296291314469025,
    0.836516303737469,
    0.22414386804185735,
    -0.12940952255092145,
];

const DB3_LO: [f64; 6] = [
    0.3326705529509569,
    0.8068915093133388,
    0.4598775021193313,
    -0.13501102001039084,
    -0.08544127388224149,
    0.035226291882100656,
];

/// Orthogonal wavelet family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Wavelet {
    /// Haar (`db1`).
    #[default]
    Haar,
    /// Daubechies, 2 vanishing moments.
    Db2,
    /// Daubechies, 3 vanishing moments.
    Db3,
}

impl Wavelet {
    /// Canonical lowercase name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Wavelet::Haar => "haar",
            Wavelet::Db2 => "db2",
            Wavelet::Db3 => "db3",
        }
    }

    /// Lowpass analysis filter.
    #[must_use]
    pub fn lowpass(self) -> &'static [f64] {
        match self {
            Wavelet::Haar => &HAAR_LO,
            Wavelet::Db2 => &DB2_LO,
            Wavelet::Db3 => &DB3_LO,
        }
    }

    /// Highpass analysis filter, the quadrature mirror of [`Self::lowpass`].
    #[must_use]
    pub fn highpass(self) -> Vec<f64> {
        let lo = self.lowpass();
        let n = lo.len();
        (0..n)
            .map(|k| if k % 2 == 0 { lo[n - 1 - k] } else { -lo[n - 1 - k] })
            .collect()
    }
}

impl FromStr for Wavelet {
    type Err = FunqueError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "haar" | "db1" => Ok(Wavelet::Haar),
            "db2" => Ok(Wavelet::Db2),
            "db3" => Ok(Wavelet::Db3),
            _ => Err(FunqueError::UnknownWavelet(s.to_string())),
        }
    }
}

impl fmt::Display for Wavelet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Detail subband orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Orientation {
    /// Row lowpass, column highpass (responds to horizontal edges).
    Horizontal,
    /// Row highpass, column lowpass (responds to vertical edges).
    Vertical,
    /// Highpass along both axes.
    Diagonal,
}

impl Orientation {
    /// The three orientations in storage order.
    pub const ALL: [Orientation; 3] = [
        Orientation::Horizontal,
        Orientation::Vertical,
        Orientation::Diagonal,
    ];

    /// Index into a detail triple.
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        match self {
            Orientation::Horizontal => 0,
            Orientation::Vertical => 1,
            Orientation::Diagonal => 2,
        }
    }
}

/// Multi-level wavelet decomposition of one plane.
///
/// Level 0 is the finest. `approximations[l]` and every plane of
/// `details[l]` share one shape, half the shape of level `l - 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct Pyramid {
    wavelet: Wavelet,
    approximations: Vec<Plane>,
    details: Vec<[Plane; 3]>,
}

impl Pyramid {
    /// Decomposes `input` into `levels` levels.
    ///
    /// # Errors
    /// - [`FunqueError::InvalidParameter`] if `levels == 0`
    /// - [`FunqueError::DimensionMismatch`] if either side is not a
    ///   positive multiple of `2^levels`
    pub fn decompose(input: &Plane, wavelet: Wavelet, levels: usize) -> Result<Self> {
        if levels == 0 {
            return Err(FunqueError::InvalidParameter {
                name: "levels",
                reason: "a pyramid needs at least one level".into(),
            });
        }
        let step = 1usize << levels;
        let (w, h) = (input.width(), input.height());
        if w == 0 || h == 0 || w % step != 0 || h % step != 0 {
            return Err(FunqueError::DimensionMismatch {
                expected: Dimensions::new(w.div_ceil(step).max(1) * step, h.div_ceil(step).max(1) * step),
                actual: input.dimensions(),
            });
        }

        let lo = wavelet.lowpass();
        let hi = wavelet.highpass();
        let mut approximations = Vec::with_capacity(levels);
        let mut details = Vec::with_capacity(levels);
        let mut current = input.clone();
        for _ in 0..levels {
            let (approx, triple) = analyze_2d(&current, lo, &hi);
            approximations.push(approx);
            details.push(triple);
            current = approximations[approximations.len() - 1].clone();
        }
        Ok(Self {
            wavelet,
            approximations,
            details,
        })
    }

    /// Inverts the transform from the coarsest approximation and all details.
    #[must_use]
    pub fn reconstruct(&self) -> Plane {
        let lo = self.wavelet.lowpass();
        let hi = self.wavelet.highpass();
        let mut current = self.approximations[self.levels() - 1].clone();
        for triple in self.details.iter().rev() {
            current = synthesize_2d(&current, triple, lo, &hi);
        }
        current
    }

    /// Wavelet used for the decomposition.
    #[must_use]
    pub fn wavelet(&self) -> Wavelet {
        self.wavelet
    }

    /// Number of levels.
    #[inline]
    #[must_use]
    pub fn levels(&self) -> usize {
        self.approximations.len()
    }

    /// Approximation subband of a level.
    #[inline]
    #[must_use]
    pub fn approximation(&self, level: usize) -> &Plane {
        &self.approximations[level]
    }

    /// Detail triple `[H, V, D]` of a level.
    #[inline]
    #[must_use]
    pub fn details(&self, level: usize) -> &[Plane; 3] {
        &self.details[level]
    }

    #[inline]
    pub fn details_mut(&mut self, level: usize) -> &mut [Plane; 3] {
        &mut self.details[level]
    }

    /// One detail subband.
    #[inline]
    #[must_use]
    pub fn detail(&self, level: usize, orientation: Orientation) -> &Plane {
        &self.details[level][orientation.index()]
    }

    /// Approximation of the coarsest level.
    #[must_use]
    pub fn coarsest_approximation(&self) -> &Plane {
        self.approximation(self.levels() - 1)
    }

    /// Detail triple of the coarsest level.
    #[must_use]
    pub fn coarsest_details(&self) -> &[Plane; 3] {
        self.details(self.levels() - 1)
    }

    /// Copy keeping only the finest `levels` levels.
    ///
    /// # Errors
    /// Returns [`FunqueError::InvalidParameter`] if `levels` is 0 or exceeds
    /// [`Self::levels`].
    pub fn truncated(&self, levels: usize) -> Result<Self> {
        if levels == 0 || levels > self.levels() {
            return Err(FunqueError::InvalidParameter {
                name: "levels",
                reason: format!("cannot keep {levels} of {} levels", self.levels()),
            });
        }
        Ok(Self {
            wavelet: self.wavelet,
            approximations: self.approximations[..levels].to_vec(),
            details: self.details[..levels].to_vec(),
        })
    }
}

/// One analysis step along a periodic line.
fn analyze_line(src: &[f64], lo: &[f64], hi: &[f64], approx: &mut [f64], detail: &mut [f64]) {
    let n = src.len();
    for (i, (a, d)) in approx.iter_mut().zip(detail.iter_mut()).enumerate() {
        let mut sa = 0.0;
        let mut sd = 0.0;
        for k in 0..lo.len() {
            let x = src[(2 * i + k) % n];
            sa += lo[k] * x;
            sd += hi[k] * x;
        }
        *a = sa;
        *d = sd;
    }
}

/// Adjoint of [`analyze_line`]; `dst` must be zeroed.
fn synthesize_line(approx: &[f64], detail: &[f64], lo: &[f64], hi: &[f64], dst: &mut [f64]) {
    let n = dst.len();
    for (i, (&a, &d)) in approx.iter().zip(detail).enumerate() {
        for k in 0..lo.len() {
            dst[(2 * i + k) % n] += lo[k] * a + hi[k] * d;
        }
    }
}

fn analyze_rows(input: &Plane, lo: &[f64], hi: &[f64]) -> (Plane, Plane) {
    let half = input.width() / 2;
    let mut low = Plane::new(half, input.height());
    let mut high = Plane::new(half, input.height());
    for y in 0..input.height() {
        analyze_line(input.row(y), lo, hi, low.row_mut(y), high.row_mut(y));
    }
    (low, high)
}

fn analyze_cols(input: &Plane, lo: &[f64], hi: &[f64]) -> (Plane, Plane) {
    let (w, h) = (input.width(), input.height());
    let half = h / 2;
    let mut low = Plane::new(w, half);
    let mut high = Plane::new(w, half);
    let mut column = vec![0.0; h];
    let mut col_lo = vec![0.0; half];
    let mut col_hi = vec![0.0; half];
    for x in 0..w {
        for (y, c) in column.iter_mut().enumerate() {
            *c = input.get(x, y);
        }
        analyze_line(&column, lo, hi, &mut col_lo, &mut col_hi);
        for y in 0..half {
            low.set(x, y, col_lo[y]);
            high.set(x, y, col_hi[y]);
        }
    }
    (low, high)
}

fn analyze_2d(input: &Plane, lo: &[f64], hi: &[f64]) -> (Plane, [Plane; 3]) {
    let (row_lo, row_hi) = analyze_rows(input, lo, hi);
    let (approx, horizontal) = analyze_cols(&row_lo, lo, hi);
    let (vertical, diagonal) = analyze_cols(&row_hi, lo, hi);
    (approx, [horizontal, vertical, diagonal])
}

fn synthesize_cols(low: &Plane, high: &Plane, lo: &[f64], hi: &[f64]) -> Plane {
    let (w, half) = (low.width(), low.height());
    let h = half * 2;
    let mut out = Plane::new(w, h);
    let mut col_lo = vec![0.0; half];
    let mut col_hi = vec![0.0; half];
    let mut column = vec![0.0; h];
    for x in 0..w {
        for y in 0..half {
            col_lo[y] = low.get(x, y);
            col_hi[y] = high.get(x, y);
        }
        column.fill(0.0);
        synthesize_line(&col_lo, &col_hi, lo, hi, &mut column);
        for (y, &c) in column.iter().enumerate() {
            out.set(x, y, c);
        }
    }
    out
}

fn synthesize_2d(approx: &Plane, details: &[Plane; 3], lo: &[f64], hi: &[f64]) -> Plane {
    let row_lo = synthesize_cols(approx, &details[0], lo, hi);
    let row_hi = synthesize_cols(&details[1], &details[2], lo, hi);
    let mut out = Plane::new(row_lo.width() * 2, row_lo.height());
    for y in 0..row_lo.height() {
        synthesize_line(row_lo.row(y), row_hi.row(y), lo, hi, out.row_mut(y));
    }
    out
}
