//! Separable convolution and box-sum helpers.
//!
//! The spatial CSF filter is a separable convolution with mirrored
//! boundaries. Each pass convolves rows and writes the result transposed,
//! so the second (vertical) pass is again a cache-friendly row pass.
//!
//! Box sums over sliding windows (VIF moments) use summed-area tables.

use crate::image::Plane;
use wide::f64x4;

/// Mirrors a coordinate outside `[0, size)`.
///
/// The mirror is placed outside the last sample, so the edge sample is
/// repeated: `-1 → 0`, `-2 → 1`, `size → size - 1`.
#[inline]
pub fn mirror(mut x: isize, size: usize) -> usize {
    let size = size as isize;
    while x < 0 || x >= size {
        if x < 0 {
            x = -x - 1;
        } else {
            x = 2 * size - 1 - x;
        }
    }
    x as usize
}

/// Convolves every row with `kernel` and writes the result transposed.
fn convolve_rows_transpose(input: &Plane, kernel: &[f64], output: &mut Plane) {
    let width = input.width();
    let height = input.height();
    let half = kernel.len() / 2;

    let border1 = half.min(width);
    let border2 = if width > half { width - half } else { 0 };

    for y in 0..height {
        let row_in = input.row(y);
        for x in (0..border1).chain(border2.max(border1)..width) {
            let mut sum = 0.0;
            for (j, &k) in kernel.iter().enumerate() {
                let src = mirror(x as isize + j as isize - half as isize, width);
                sum += row_in[src] * k;
            }
            output.set(y, x, sum);
        }
    }

    if border2 > border1 {
        convolve_interior_simd(input, kernel, border1, border2, output);
    }
}

/// SIMD interior convolution with transpose.
///
/// Processes 4 x-positions at a time using f64x4 lanes.
#[multiversion::multiversion(targets(
    "x86_64+avx+avx2+bmi1+bmi2+fma+lzcnt+popcnt+sse+sse2+sse3+sse4.1+sse4.2+ssse3",
    "x86_64+popcnt+sse+sse2+sse3+sse4.1+sse4.2+ssse3",
))]
fn convolve_interior_simd(
    input: &Plane,
    kernel: &[f64],
    border1: usize,
    border2: usize,
    output: &mut Plane,
) {
    let height = input.height();
    let half = kernel.len() / 2;
    let chunks = (border2 - border1) / 4;

    for y in 0..height {
        let row_in = input.row(y);

        for chunk in 0..chunks {
            let x = border1 + chunk * 4;
            let d = x - half;
            let mut sum = f64x4::splat(0.0);
            for (j, &k) in kernel.iter().enumerate() {
                let lanes = [
                    row_in[d + j],
                    row_in[d + j + 1],
                    row_in[d + j + 2],
                    row_in[d + j + 3],
                ];
                sum += f64x4::from(lanes) * f64x4::splat(k);
            }
            for (i, &val) in sum.to_array().iter().enumerate() {
                output.set(y, x + i, val);
            }
        }

        for x in border1 + chunks * 4..border2 {
            let d = x - half;
            let sum: f64 = kernel
                .iter()
                .enumerate()
                .map(|(j, &k)| row_in[d + j] * k)
                .sum();
            output.set(y, x, sum);
        }
    }
}

/// Applies the same odd-length 1D kernel horizontally and vertically.
///
/// Boundaries are mirrored; the output has the input's size.
#[must_use]
pub fn convolve_separable(input: &Plane, kernel: &[f64]) -> Plane {
    debug_assert!(kernel.len() % 2 == 1);
    let mut transposed = Plane::new(input.height(), input.width());
    convolve_rows_transpose(input, kernel, &mut transposed);
    let mut output = Plane::new(input.width(), input.height());
    convolve_rows_transpose(&transposed, kernel, &mut output);
    output
}

/// Summed-area table with one row and column of leading zeros.
pub struct IntegralImage {
    sums: Vec<f64>,
    stride: usize,
}

impl IntegralImage {
    /// Builds the table from `f(value)` applied to every sample.
    pub fn from_map(plane: &Plane, f: impl Fn(f64) -> f64) -> Self {
        Self::build(plane.width(), plane.height(), |x, y| f(plane.get(x, y)))
    }

    /// Builds the table of products of two equally sized planes.
    pub fn from_product(a: &Plane, b: &Plane) -> Self {
        Self::build(a.width(), a.height(), |x, y| a.get(x, y) * b.get(x, y))
    }

    fn build(width: usize, height: usize, value: impl Fn(usize, usize) -> f64) -> Self {
        let stride = width + 1;
        let mut sums = vec![0.0; stride * (height + 1)];
        for y in 0..height {
            let mut row_sum = 0.0;
            for x in 0..width {
                row_sum += value(x, y);
                sums[(y + 1) * stride + x + 1] = sums[y * stride + x + 1] + row_sum;
            }
        }
        Self { sums, stride }
    }

    /// Sum over the `w × h` window with top-left corner `(x, y)`.
    #[inline]
    pub fn window_sum(&self, x: usize, y: usize, w: usize, h: usize) -> f64 {
        let s = self.stride;
        self.sums[(y + h) * s + x + w] - self.sums[y * s + x + w] - self.sums[(y + h) * s + x]
            + self.sums[y * s + x]
    }

    /// Sliding `k × k` window means in `valid` mode.
    ///
    /// The result is `(width - k + 1) × (height - k + 1)`.
    pub fn window_means(&self, width: usize, height: usize, k: usize) -> Plane {
        let out_w = width + 1 - k;
        let out_h = height + 1 - k;
        let scale = 1.0 / (k * k) as f64;
        Plane::from_fn(out_w, out_h, |x, y| self.window_sum(x, y, k, k) * scale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mirror() {
        assert_eq!(mirror(-1, 5), 0);
        assert_eq!(mirror(-2, 5), 1);
        assert_eq!(mirror(5, 5), 4);
        assert_eq!(mirror(6, 5), 3);
        assert_eq!(mirror(2, 5), 2);
        assert_eq!(mirror(-7, 3), 0);
    }

    #[test]
    fn test_convolve_constant_image() {
        let img = Plane::filled(32, 24, 0.5);
        let kernel = [0.1, 0.2, 0.4, 0.2, 0.1];
        let out = convolve_separable(&img, &kernel);
        assert_eq!(out.width(), 32);
        assert_eq!(out.height(), 24);
        for y in 0..24 {
            for x in 0..32 {
                assert!((out.get(x, y) - 0.5).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_convolve_identity_kernel() {
        let img = Plane::from_fn(13, 7, |x, y| (x * 7 + y) as f64);
        let out = convolve_separable(&img, &[0.0, 1.0, 0.0]);
        assert_eq!(out, img);
    }

    #[test]
    fn test_convolve_matches_scalar_reference() {
        let img = Plane::from_fn(19, 11, |x, y| ((x * 31 + y * 17) % 23) as f64 / 23.0);
        let kernel = [0.05, 0.1, 0.2, 0.3, 0.2, 0.1, 0.05];
        let out = convolve_separable(&img, &kernel);

        let half = 3isize;
        let mut tmp = Plane::new(19, 11);
        for y in 0..11 {
            for x in 0..19 {
                let mut s = 0.0;
                for (j, k) in kernel.iter().enumerate() {
                    s += img.get(mirror(x as isize + j as isize - half, 19), y) * k;
                }
                tmp.set(x, y, s);
            }
        }
        for y in 0..11 {
            for x in 0..19 {
                let mut s = 0.0;
                for (j, k) in kernel.iter().enumerate() {
                    s += tmp.get(x, mirror(y as isize + j as isize - half, 11)) * k;
                }
                assert!((out.get(x, y) - s).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_integral_window_sum() {
        let img = Plane::from_fn(5, 4, |x, y| (x + y * 5) as f64);
        let integral = IntegralImage::from_map(&img, |v| v);
        let direct: f64 = (1..4)
            .flat_map(|y| (2..5).map(move |x| (x + y * 5) as f64))
            .sum();
        assert!((integral.window_sum(2, 1, 3, 3) - direct).abs() < 1e-9);

        let means = integral.window_means(5, 4, 3);
        assert_eq!(means.width(), 3);
        assert_eq!(means.height(), 2);
        assert!((means.get(0, 0) - 6.0).abs() < 1e-12);
    }
}
