//! # FUNQUE
//!
//! Per-frame, multi-scale perceptual quality features for a reference and a
//! distorted video, computed in the wavelet domain. The features feed learned
//! video quality models of the FUNQUE family (FUNQUE, Y-FUNQUE+, 3C-FUNQUE+
//! and their full-scale versions) and a VMAF-like model.
//!
//! The pipeline per frame pair:
//! - Size alignment: optional half-resolution cubic resize, then reflect
//!   padding (or cropping) to a multiple of `2^levels`
//! - Contrast sensitivity filtering, either spatially before the transform
//!   or per subband after it
//! - Periodized wavelet pyramid decomposition
//! - Feature kernels: VIF, SSIM/MS-SSIM, DLM, ST-RRED, motion/MAD and
//!   edge/blur activity
//!
//! ## Example
//!
//! ```rust
//! use funque::{FeatureExtractor, Frame, PipelineConfig, Plane, Variant};
//!
//! let config = PipelineConfig::builder(Variant::Funque).build()?;
//! let extractor = FeatureExtractor::new(config);
//!
//! let reference: Vec<Frame> = (0..3)
//!     .map(|_| Frame::luma(Plane::from_fn(64, 64, |x, _| x as f64 / 63.0)))
//!     .collect();
//! let distorted = reference.clone();
//!
//! let extraction = extractor.extract_frames(
//!     reference.into_iter().map(Ok),
//!     distorted.into_iter().map(Ok),
//!     1,
//! )?;
//! assert_eq!(extraction.features().len(), 3);
//! # Ok::<(), funque::FunqueError>(())
//! ```
//!
//! ## Features
//!
//! - **`y4m`** (default): Y4M frame source
//! - **`serde`**: `Serialize` for result tables
//! - **`internals`**: Expose internal modules for testing/benchmarking (unstable API)

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::similar_names)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::unreadable_literal)]
#![allow(clippy::excessive_precision)]
#![allow(clippy::suboptimal_flops)]
#![allow(clippy::many_single_char_names)]
#![allow(clippy::needless_range_loop)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::imprecise_flops)]

pub mod activity;
pub mod config;

#[cfg(feature = "internals")]
pub mod consts;
#[cfg(not(feature = "internals"))]
pub(crate) mod consts;

#[cfg(feature = "internals")]
pub mod convolve;
#[cfg(not(feature = "internals"))]
pub(crate) mod convolve;

pub mod csf;
pub mod dlm;
pub mod extractor;
pub mod image;
pub mod motion;
pub mod resample;
pub mod results;
pub mod source;
pub mod ssim;
pub mod strred;
pub mod vif;
pub mod wavelet;

use std::fmt;
use std::path::PathBuf;

pub use config::{
    ChannelSet, DlmScope, FeatureKind, FeatureSpec, FrameCountPolicy, PipelineConfig,
    PipelineConfigBuilder, Resolution, SizePolicy, Variant,
};
pub use csf::{CsfModel, SpatialFilter};
pub use extractor::{Extraction, FeatureExtractor, PreviousState, Step};
pub use image::{Channel, Frame, Plane};
pub use results::{FeatureMatrix, FeatureRow, TimingRow, TimingTable};
pub use source::{Asset, ChromaSampling, StreamSpec, VideoStandard};
pub use ssim::Pooling;
pub use wavelet::{Pyramid, Wavelet};

// Re-export imgref and rgb types for convenience
pub use imgref::{Img, ImgRef, ImgVec};
pub use rgb::RGB8;

/// Width and height of a plane, frame or subband.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Dimensions {
    /// Width in samples.
    pub width: usize,
    /// Height in samples.
    pub height: usize,
}

impl Dimensions {
    /// Creates a dimension pair.
    #[must_use]
    pub const fn new(width: usize, height: usize) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Error type for feature extraction.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum FunqueError {
    /// A stream could not be opened or read.
    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        /// Path of the offending stream.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// Declared and actual geometry disagree, or a size is not aligned.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected (declared or aligned) dimensions.
        expected: Dimensions,
        /// Actual dimensions.
        actual: Dimensions,
    },
    /// Two kernel inputs differ in shape.
    #[error("shape mismatch between kernel inputs: {left} vs {right}")]
    ShapeMismatch {
        /// Shape of the first input.
        left: Dimensions,
        /// Shape of the second input.
        right: Dimensions,
    },
    /// The CSF model name is not recognized.
    #[error("unknown CSF filter model '{0}'")]
    UnknownFilterModel(String),
    /// The wavelet name is not recognized.
    #[error("unknown wavelet '{0}'")]
    UnknownWavelet(String),
    /// The pipeline variant name is not recognized.
    #[error("unknown pipeline variant '{0}'")]
    UnknownVariant(String),
    /// Reference and distorted streams have different lengths.
    #[error("frame count mismatch: reference has {reference} frames, distorted has {distorted}")]
    FrameCountMismatch {
        /// Frames decoded from the reference stream.
        reference: usize,
        /// Frames decoded from the distorted stream.
        distorted: usize,
    },
    /// A configuration parameter is out of range.
    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

/// Result alias used across the crate.
pub type Result<T, E = FunqueError> = std::result::Result<T, E>;
