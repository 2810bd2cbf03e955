//! Size alignment: cubic resizing, reflect padding and cropping.
//!
//! Periodized wavelet transforms need every side to be a multiple of
//! `2^levels`. Frames are brought there by padding with a mirror of the
//! adjacent samples (never zeros), or by cropping for pipelines that
//! prefer to drop the remainder.

use crate::consts::CUBIC_A;
use crate::image::Plane;
use crate::{Dimensions, FunqueError, Result};

/// Smallest multiple of `2^levels` that is `>= n`.
#[inline]
#[must_use]
pub fn align_up(n: usize, levels: u32) -> usize {
    let step = 1usize << levels;
    n.div_ceil(step) * step
}

/// Largest multiple of `2^levels` that is `<= n`.
#[inline]
#[must_use]
pub fn align_down(n: usize, levels: u32) -> usize {
    (n >> levels) << levels
}

/// Keys cubic convolution weight at distance `t`.
#[inline]
fn cubic_weight(t: f64) -> f64 {
    let t = t.abs();
    if t <= 1.0 {
        ((CUBIC_A + 2.0) * t - (CUBIC_A + 3.0)) * t * t + 1.0
    } else if t < 2.0 {
        ((CUBIC_A * t - 5.0 * CUBIC_A) * t + 8.0 * CUBIC_A) * t - 4.0 * CUBIC_A
    } else {
        0.0
    }
}

/// Precomputed source taps and weights for one output axis.
struct AxisTaps {
    index: Vec<[usize; 4]>,
    weight: Vec<[f64; 4]>,
}

impl AxisTaps {
    /// Pixel-center aligned mapping with clamped borders.
    fn new(src_len: usize, dst_len: usize) -> Self {
        let scale = src_len as f64 / dst_len as f64;
        let last = src_len as isize - 1;
        let mut index = Vec::with_capacity(dst_len);
        let mut weight = Vec::with_capacity(dst_len);
        for d in 0..dst_len {
            let pos = (d as f64 + 0.5) * scale - 0.5;
            let base = pos.floor();
            let t = pos - base;
            let base = base as isize;
            let mut idx = [0usize; 4];
            let mut w = [0.0; 4];
            for k in 0..4 {
                idx[k] = (base + k as isize - 1).clamp(0, last) as usize;
                w[k] = cubic_weight(t - (k as f64 - 1.0));
            }
            index.push(idx);
            weight.push(w);
        }
        Self { index, weight }
    }
}

/// Resizes a plane with separable cubic interpolation.
///
/// Sample centers are aligned (`src = (dst + 0.5) * scale - 0.5`) and
/// out-of-range taps are clamped to the border.
///
/// # Errors
/// Returns [`FunqueError::DimensionMismatch`] if either size is empty.
pub fn resize_cubic(input: &Plane, width: usize, height: usize) -> Result<Plane> {
    if width == 0 || height == 0 || input.is_empty() {
        return Err(FunqueError::DimensionMismatch {
            expected: Dimensions::new(width.max(1), height.max(1)),
            actual: input.dimensions(),
        });
    }
    if width == input.width() && height == input.height() {
        return Ok(input.clone());
    }

    let xt = AxisTaps::new(input.width(), width);
    let mut horizontal = Plane::new(width, input.height());
    for y in 0..input.height() {
        let src = input.row(y);
        let dst = horizontal.row_mut(y);
        for x in 0..width {
            let idx = &xt.index[x];
            let w = &xt.weight[x];
            dst[x] = src[idx[0]] * w[0] + src[idx[1]] * w[1] + src[idx[2]] * w[2] + src[idx[3]] * w[3];
        }
    }

    let yt = AxisTaps::new(input.height(), height);
    let mut output = Plane::new(width, height);
    for y in 0..height {
        let idx = yt.index[y];
        let w = yt.weight[y];
        for x in 0..width {
            output.set(
                x,
                y,
                horizontal.get(x, idx[0]) * w[0]
                    + horizontal.get(x, idx[1]) * w[1]
                    + horizontal.get(x, idx[2]) * w[2]
                    + horizontal.get(x, idx[3]) * w[3],
            );
        }
    }
    Ok(output)
}

/// Halves both sides (rounding down) with cubic interpolation.
///
/// # Errors
/// Returns [`FunqueError::DimensionMismatch`] for planes smaller than 2x2.
pub fn downsample_half(input: &Plane) -> Result<Plane> {
    resize_cubic(input, input.width() / 2, input.height() / 2)
}

/// Reflects index `i` into `[0, n)` without repeating the edge sample.
///
/// `-1 → 1`, `n → n - 2`. A single-sample axis always maps to 0.
#[inline]
#[must_use]
pub fn reflect_index(i: isize, n: usize) -> usize {
    if n == 1 {
        return 0;
    }
    let period = 2 * (n as isize - 1);
    let m = i.rem_euclid(period);
    if m >= n as isize {
        (period - m) as usize
    } else {
        m as usize
    }
}

/// Split of a padding amount: leading half, remainder on the trailing edge.
#[inline]
#[must_use]
pub fn split_padding(amount: usize) -> (usize, usize) {
    let before = amount / 2;
    (before, amount - before)
}

/// Pads a plane to `width × height` with reflect extension.
///
/// # Errors
/// Returns [`FunqueError::DimensionMismatch`] if the target is smaller
/// than the plane.
pub fn pad_reflect(input: &Plane, width: usize, height: usize) -> Result<Plane> {
    if width < input.width() || height < input.height() || input.is_empty() {
        return Err(FunqueError::DimensionMismatch {
            expected: Dimensions::new(width, height),
            actual: input.dimensions(),
        });
    }
    let (left, _) = split_padding(width - input.width());
    let (top, _) = split_padding(height - input.height());
    let (in_w, in_h) = (input.width(), input.height());

    let columns: Vec<usize> = (0..width)
        .map(|x| reflect_index(x as isize - left as isize, in_w))
        .collect();
    let mut output = Plane::new(width, height);
    for y in 0..height {
        let src = input.row(reflect_index(y as isize - top as isize, in_h));
        let dst = output.row_mut(y);
        for (d, &c) in dst.iter_mut().zip(&columns) {
            *d = src[c];
        }
    }
    Ok(output)
}

/// Keeps the top-left `width × height` window.
///
/// # Errors
/// Returns [`FunqueError::DimensionMismatch`] if the window is empty or
/// larger than the plane.
pub fn crop_top_left(input: &Plane, width: usize, height: usize) -> Result<Plane> {
    if width == 0 || height == 0 || width > input.width() || height > input.height() {
        return Err(FunqueError::DimensionMismatch {
            expected: Dimensions::new(width, height),
            actual: input.dimensions(),
        });
    }
    Ok(input.window(0, 0, width, height))
}
