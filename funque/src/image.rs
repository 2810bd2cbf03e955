//! Plane and frame buffer types.
//!
//! A [`Plane`] is a single channel of `f64` samples, normally in the
//! normalized `[0, 1]` range. A [`Frame`] is a planar collection of one
//! (luma only) or three (Y, U, V) planes for one instant of a video.

use std::ops::{Index, IndexMut};

use imgref::{ImgRef, ImgVec};
use rgb::RGB8;

use crate::{Dimensions, FunqueError, Result};

/// Single-channel floating point image.
///
/// Rows are stored contiguously without padding; every pyramid subband,
/// similarity map and filtered image in the crate is a `Plane`.
#[derive(Debug, Clone, PartialEq)]
pub struct Plane {
    data: Vec<f64>,
    width: usize,
    height: usize,
}

impl Plane {
    /// Creates a new plane filled with zeros.
    #[must_use]
    pub fn new(width: usize, height: usize) -> Self {
        Self::filled(width, height, 0.0)
    }

    /// Creates a plane filled with a constant value.
    #[must_use]
    pub fn filled(width: usize, height: usize, value: f64) -> Self {
        Self {
            data: vec![value; width * height],
            width,
            height,
        }
    }

    /// Creates a plane from row-major samples.
    ///
    /// # Errors
    /// Returns [`FunqueError::DimensionMismatch`] if `data.len() != width * height`.
    pub fn from_vec(data: Vec<f64>, width: usize, height: usize) -> Result<Self> {
        if data.len() != width * height {
            return Err(FunqueError::DimensionMismatch {
                expected: Dimensions::new(width, height),
                actual: Dimensions::new(data.len(), 1),
            });
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    /// Creates a plane by evaluating `f(x, y)` at every sample.
    #[must_use]
    pub fn from_fn(width: usize, height: usize, mut f: impl FnMut(usize, usize) -> f64) -> Self {
        let mut data = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Self {
            data,
            width,
            height,
        }
    }

    /// Creates a plane from integer samples, dividing by `range`.
    ///
    /// # Errors
    /// Returns [`FunqueError::DimensionMismatch`] if the sample count is wrong.
    pub fn from_samples<T: Copy + Into<f64>>(
        samples: &[T],
        width: usize,
        height: usize,
        range: f64,
    ) -> Result<Self> {
        if samples.len() != width * height {
            return Err(FunqueError::DimensionMismatch {
                expected: Dimensions::new(width, height),
                actual: Dimensions::new(samples.len(), 1),
            });
        }
        let data = samples.iter().map(|&s| s.into() / range).collect();
        Ok(Self {
            data,
            width,
            height,
        })
    }

    /// Copies a strided `imgref` image into a plane.
    #[must_use]
    pub fn from_imgref(img: ImgRef<'_, f64>) -> Self {
        let mut data = Vec::with_capacity(img.width() * img.height());
        for row in img.rows() {
            data.extend_from_slice(row);
        }
        Self {
            data,
            width: img.width(),
            height: img.height(),
        }
    }

    /// Converts into an owned `imgref` image.
    #[must_use]
    pub fn into_imgvec(self) -> ImgVec<f64> {
        ImgVec::new(self.data, self.width, self.height)
    }

    /// Plane width in samples.
    #[inline]
    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Plane height in samples.
    #[inline]
    #[must_use]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Width and height as a pair.
    #[inline]
    #[must_use]
    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.width, self.height)
    }

    /// Number of samples.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true for a plane without samples.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns a reference to a row.
    #[inline]
    #[must_use]
    pub fn row(&self, y: usize) -> &[f64] {
        let start = y * self.width;
        &self.data[start..start + self.width]
    }

    /// Returns a mutable reference to a row.
    #[inline]
    pub fn row_mut(&mut self, y: usize) -> &mut [f64] {
        let start = y * self.width;
        &mut self.data[start..start + self.width]
    }

    /// Gets a sample value.
    #[inline]
    #[must_use]
    pub fn get(&self, x: usize, y: usize) -> f64 {
        self.data[y * self.width + x]
    }

    /// Sets a sample value.
    #[inline]
    pub fn set(&mut self, x: usize, y: usize, value: f64) {
        self.data[y * self.width + x] = value;
    }

    /// Returns the samples as a slice.
    #[inline]
    #[must_use]
    pub fn data(&self) -> &[f64] {
        &self.data
    }

    /// Returns the samples as a mutable slice.
    #[inline]
    pub fn data_mut(&mut self) -> &mut [f64] {
        &mut self.data
    }

    /// Checks if two planes have the same dimensions.
    #[must_use]
    pub fn same_size(&self, other: &Self) -> bool {
        self.width == other.width && self.height == other.height
    }

    /// Fails with [`FunqueError::ShapeMismatch`] unless both planes agree in size.
    ///
    /// # Errors
    /// See above.
    pub fn check_same_size(&self, other: &Self) -> Result<()> {
        if self.same_size(other) {
            Ok(())
        } else {
            Err(FunqueError::ShapeMismatch {
                left: self.dimensions(),
                right: other.dimensions(),
            })
        }
    }

    /// Multiplies every sample by `factor`.
    pub fn scale(&mut self, factor: f64) {
        for v in &mut self.data {
            *v *= factor;
        }
    }

    /// Arithmetic mean of all samples (0 for an empty plane).
    #[must_use]
    pub fn mean(&self) -> f64 {
        if self.data.is_empty() {
            return 0.0;
        }
        self.data.iter().sum::<f64>() / self.data.len() as f64
    }

    /// Copies the `width × height` window whose top-left corner is `(x0, y0)`.
    ///
    /// # Panics
    /// Panics if the window exceeds the plane.
    #[must_use]
    pub fn window(&self, x0: usize, y0: usize, width: usize, height: usize) -> Self {
        assert!(x0 + width <= self.width && y0 + height <= self.height);
        let mut data = Vec::with_capacity(width * height);
        for y in y0..y0 + height {
            data.extend_from_slice(&self.row(y)[x0..x0 + width]);
        }
        Self {
            data,
            width,
            height,
        }
    }
}

impl Index<(usize, usize)> for Plane {
    type Output = f64;

    #[inline]
    fn index(&self, (x, y): (usize, usize)) -> &Self::Output {
        &self.data[y * self.width + x]
    }
}

impl IndexMut<(usize, usize)> for Plane {
    #[inline]
    fn index_mut(&mut self, (x, y): (usize, usize)) -> &mut Self::Output {
        &mut self.data[y * self.width + x]
    }
}

/// Channel of a planar YUV frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Channel {
    /// Luma.
    Y,
    /// Blue-difference chroma.
    U,
    /// Red-difference chroma.
    V,
}

impl Channel {
    /// All three channels in planar order.
    pub const ALL: [Channel; 3] = [Channel::Y, Channel::U, Channel::V];

    /// Planar index of the channel.
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        match self {
            Channel::Y => 0,
            Channel::U => 1,
            Channel::V => 2,
        }
    }

    /// Lowercase name used in feature names.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Channel::Y => "y",
            Channel::U => "u",
            Channel::V => "v",
        }
    }

    /// True for the two chroma channels.
    #[inline]
    #[must_use]
    pub fn is_chroma(self) -> bool {
        self != Channel::Y
    }
}

/// One decoded video frame, planar per channel.
///
/// Holds either a single luma plane or Y, U, V planes. Chroma planes may
/// be smaller than luma (subsampled); the extractor resamples them.
#[derive(Debug, Clone)]
pub struct Frame {
    planes: Vec<Plane>,
}

impl Frame {
    /// Creates a luma-only frame.
    #[must_use]
    pub fn luma(y: Plane) -> Self {
        Self { planes: vec![y] }
    }

    /// Creates a three-plane YUV frame.
    #[must_use]
    pub fn yuv(y: Plane, u: Plane, v: Plane) -> Self {
        Self {
            planes: vec![y, u, v],
        }
    }

    /// Creates a luma-only frame from a strided `imgref` image.
    #[must_use]
    pub fn from_luma_imgref(img: ImgRef<'_, f64>) -> Self {
        Self::luma(Plane::from_imgref(img))
    }

    /// Converts an 8-bit RGB image into a full-range BT.601 YCbCr frame.
    ///
    /// Chroma is centered at 0.5 so all planes lie in `[0, 1]`.
    #[must_use]
    pub fn from_rgb8(img: ImgRef<'_, RGB8>) -> Self {
        let (width, height) = (img.width(), img.height());
        let mut y_plane = Plane::new(width, height);
        let mut u_plane = Plane::new(width, height);
        let mut v_plane = Plane::new(width, height);
        for (row_idx, row) in img.rows().enumerate() {
            for (x, px) in row.iter().enumerate() {
                let r = f64::from(px.r) / 255.0;
                let g = f64::from(px.g) / 255.0;
                let b = f64::from(px.b) / 255.0;
                let luma = 0.299 * r + 0.587 * g + 0.114 * b;
                y_plane.set(x, row_idx, luma);
                u_plane.set(x, row_idx, (0.5 + (b - luma) / 1.772).clamp(0.0, 1.0));
                v_plane.set(x, row_idx, (0.5 + (r - luma) / 1.402).clamp(0.0, 1.0));
            }
        }
        Self::yuv(y_plane, u_plane, v_plane)
    }

    /// Luma width.
    #[inline]
    #[must_use]
    pub fn width(&self) -> usize {
        self.planes[0].width()
    }

    /// Luma height.
    #[inline]
    #[must_use]
    pub fn height(&self) -> usize {
        self.planes[0].height()
    }

    /// Number of planes (1 or 3).
    #[inline]
    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.planes.len()
    }

    /// Returns the plane for a channel, if present.
    #[inline]
    #[must_use]
    pub fn plane(&self, channel: Channel) -> Option<&Plane> {
        self.planes.get(channel.index())
    }
}
