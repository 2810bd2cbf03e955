//! Constants for the feature kernels and CSF models.

// ============================================================================
// Resampling
// ============================================================================

/// Free parameter of the cubic convolution kernel (Keys, `a = -0.75`).
pub const CUBIC_A: f64 = -0.75;

// ============================================================================
// VIF
// ============================================================================

/// Default VIF window side.
pub const VIF_WINDOW: usize = 9;
/// Default VIF additive noise variance.
pub const VIF_SIGMA_NSQ: f64 = 5.0;
/// Variances below this are treated as zero.
pub const VIF_EPS: f64 = 1e-10;
/// Per-sample stabilizer added to numerator and denominator terms.
pub const VIF_STABILITY: f64 = 1e-4;

// ============================================================================
// SSIM
// ============================================================================

/// Luminance stabilizer factor.
pub const SSIM_K1: f64 = 0.01;
/// Contrast-structure stabilizer factor.
pub const SSIM_K2: f64 = 0.03;
/// Dynamic range of normalized samples.
pub const SSIM_MAX_VAL: f64 = 1.0;

// ============================================================================
// DLM
// ============================================================================

/// Guards divisions by reference coefficients.
pub const DLM_EPS: f64 = 1e-30;
/// Orientation agreement (degrees) under which distortion counts as restoration.
pub const DLM_ANGLE_THRESHOLD_DEG: f64 = 1.0;
/// Stabilizer added to numerator and denominator sums.
pub const DLM_STABILITY: f64 = 1e-4;
/// Fraction of each subband side excluded from pooling.
pub const DLM_BORDER_FRACTION: f64 = 0.1;
/// Contrast masking weight of the center coefficient.
pub const DLM_MASK_CENTER: f64 = 1.0 / 15.0;
/// Contrast masking weight of each of the 8 neighbours.
pub const DLM_MASK_NEIGHBOR: f64 = 1.0 / 30.0;

// ============================================================================
// ST-RRED
// ============================================================================

/// Additive neural noise variance of the entropy model.
pub const STRRED_SIGMA_NSQ: f64 = 0.1;
/// Default block side used for local variance estimation.
pub const STRRED_BLOCK_SIZE: usize = 1;

// ============================================================================
// CSF
// ============================================================================

/// Default viewing distance, in picture heights.
pub const VIEWING_DISTANCE: f64 = 3.0;
/// Taps of the synthesized spatial CSF kernel.
pub const CSF_TAPS: usize = 21;
/// Midpoint samples used when averaging a CSF over a subband's band.
pub const CSF_BAND_SAMPLES: usize = 16;

/// Ngan CSF: `(NGAN_A + NGAN_B f) exp(-NGAN_C f)`.
pub const NGAN_A: f64 = 0.31;
/// Ngan CSF slope.
pub const NGAN_B: f64 = 0.69;
/// Ngan CSF decay.
pub const NGAN_C: f64 = 0.29;

/// Mannos-Sakrison form used by Nadenau: `2.6 (0.0192 + 0.114 f) exp(-(0.114 f)^1.1)`.
pub const NADENAU_GAIN: f64 = 2.6;
/// Nadenau CSF offset.
pub const NADENAU_OFFSET: f64 = 0.0192;
/// Nadenau CSF frequency scale.
pub const NADENAU_SCALE: f64 = 0.114;
/// Nadenau CSF decay exponent.
pub const NADENAU_EXPONENT: f64 = 1.1;

/// Lowpass chroma CSF cutoffs (cycles/degree) for U and V.
pub const CHROMA_CUTOFF: [f64; 2] = [3.2, 4.6];

/// Watson DWT quantization model parameters `[a, k, f0]` for Y, Cb, Cr.
pub const WATSON_PARAMS: [[f64; 3]; 3] = [
    [0.495, 0.466, 0.401],
    [1.633, 0.353, 0.209],
    [0.944, 0.521, 0.404],
];

/// Watson orientation gains `[LL, LH/HL, HH]` for Y, Cb, Cr.
pub const WATSON_ORIENTATION_GAIN: [[f64; 3]; 3] = [
    [1.501, 1.0, 0.534],
    [1.520, 1.0, 0.502],
    [1.868, 1.0, 0.516],
];

/// Watson basis function amplitudes `[LL, LH/HL, HH]` for levels 1 to 6.
pub const WATSON_BASIS_AMPLITUDE: [[f64; 3]; 6] = [
    [0.621710, 0.672340, 0.727610],
    [0.345374, 0.413174, 0.495050],
    [0.180040, 0.227273, 0.283050],
    [0.091401, 0.117920, 0.142040],
    [0.045943, 0.059758, 0.071812],
    [0.023013, 0.030018, 0.036054],
];
