//! Property-based tests for the algebraic laws of the transform and kernels.

mod common;

use common::generators::{add_noise, texture};
use funque::dlm::{dlm_pyr, DlmParams};
use funque::resample::{align_up, pad_reflect, split_padding};
use funque::ssim::{ms_ssim_pyr, ssim_pyr, SsimParams};
use funque::vif::{vif_pyramid, VifParams};
use funque::{Plane, Pyramid, Wavelet};
use proptest::prelude::*;

fn wavelet_strategy() -> impl Strategy<Value = Wavelet> {
    prop_oneof![Just(Wavelet::Haar), Just(Wavelet::Db2), Just(Wavelet::Db3)]
}

// ============================================================================
// Wavelet pyramid
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// Decompose then reconstruct returns the input for aligned planes.
    #[test]
    fn pyramid_round_trip(
        wavelet in wavelet_strategy(),
        levels in 1usize..=3,
        kw in 2usize..5,
        kh in 2usize..5,
        seed in any::<u64>(),
    ) {
        let (w, h) = (kw << levels, kh << levels);
        let plane = add_noise(&texture(w, h, 0.0, seed), 0.3, seed);
        let pyr = Pyramid::decompose(&plane, wavelet, levels).unwrap();
        prop_assert_eq!(pyr.levels(), levels);
        prop_assert_eq!(pyr.coarsest_approximation().width(), kw);

        let back = pyr.reconstruct();
        for (a, b) in plane.data().iter().zip(back.data()) {
            prop_assert!((a - b).abs() < 1e-9, "{} vs {} ({})", a, b, wavelet);
        }
    }

    /// Orthonormal transforms preserve energy.
    #[test]
    fn pyramid_preserves_energy(
        wavelet in wavelet_strategy(),
        seed in any::<u64>(),
    ) {
        let plane = texture(32, 16, 1.5, seed);
        let pyr = Pyramid::decompose(&plane, wavelet, 2).unwrap();
        let energy = |p: &Plane| p.data().iter().map(|v| v * v).sum::<f64>();
        let mut total = energy(pyr.coarsest_approximation());
        for l in 0..pyr.levels() {
            total += pyr.details(l).iter().map(energy).sum::<f64>();
        }
        let input = energy(&plane);
        prop_assert!((total - input).abs() < 1e-9 * input.max(1.0));
    }
}

// ============================================================================
// Padding
// ============================================================================

proptest! {
    /// Padded sizes are aligned and the padding mirrors the edge.
    #[test]
    fn padding_is_aligned_reflection(
        w in 1usize..40,
        h in 1usize..40,
        levels in 1u32..5,
        seed in any::<u64>(),
    ) {
        // Values in [0.1, 1]: a zero in the output would mean zero fill.
        let input = Plane::from_fn(w, h, |x, y| {
            0.1 + 0.9 * ((x * 31 + y * 17) as u64 ^ seed) as f64 % 97.0 / 97.0
        });
        let (tw, th) = (align_up(w, levels), align_up(h, levels));
        let padded = pad_reflect(&input, tw, th).unwrap();
        prop_assert_eq!(padded.width() % (1 << levels), 0);
        prop_assert_eq!(padded.height() % (1 << levels), 0);
        prop_assert!(padded.data().iter().all(|&v| v >= 0.1));

        let (left, _) = split_padding(tw - w);
        let (top, _) = split_padding(th - h);
        prop_assert_eq!(padded.get(left, top), input.get(0, 0));
        if tw > w && w >= 2 {
            // First sample past the right edge reflects without repeating it.
            prop_assert_eq!(padded.get(left + w, top), input.get(w - 2, 0));
        }
    }
}

// ============================================================================
// Kernel identities
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// Comparing a pyramid with itself gives the fidelity maximum.
    #[test]
    fn kernels_identity(
        wavelet in wavelet_strategy(),
        levels in 1usize..=3,
        seed in any::<u64>(),
        noise in 0.0f64..0.5,
    ) {
        let plane = add_noise(&texture(32, 32, 0.0, seed), noise, seed);
        let pyr = Pyramid::decompose(&plane, wavelet, levels).unwrap();

        for v in vif_pyramid(&pyr, &pyr, VifParams::default()).unwrap() {
            prop_assert!((v - 1.0).abs() < 1e-6, "vif {}", v);
        }

        let ssim = ssim_pyr(&pyr, &pyr, SsimParams::default()).unwrap();
        prop_assert!((ssim.mean - 1.0).abs() < 1e-12);
        prop_assert!(ssim.cov.abs() < 1e-12);
        for level in ms_ssim_pyr(&pyr, &pyr, SsimParams::default()).unwrap() {
            prop_assert!((level.mean - 1.0).abs() < 1e-12);
            prop_assert!(level.cov.abs() < 1e-12);
        }

        let dlm = dlm_pyr(&pyr, &pyr, DlmParams::default()).unwrap();
        prop_assert!((dlm.overall - 1.0).abs() < 1e-9, "dlm {}", dlm.overall);
    }
}
