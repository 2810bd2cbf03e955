//! End-to-end tests of the frame pipeline driver.

mod common;

use common::generators::{distort, luma_sequence, ramp, yuv420_bytes, yuv_sequence};
use funque::{
    Asset, Extraction, FeatureExtractor, Frame, FrameCountPolicy, FunqueError, PipelineConfig,
    StreamSpec, Variant, Wavelet,
};

fn run(
    config: PipelineConfig,
    reference: Vec<Frame>,
    distorted: Vec<Frame>,
    interval: usize,
) -> Extraction {
    FeatureExtractor::new(config)
        .extract_frames(
            reference.into_iter().map(Ok),
            distorted.into_iter().map(Ok),
            interval,
        )
        .unwrap()
}

fn score(extraction: &Extraction, frame: usize, name: &str) -> f64 {
    extraction
        .scores()
        .get(frame, &format!("FUNQUE_feature_{name}_score"))
        .unwrap_or_else(|| panic!("missing score {name} at frame {frame}"))
}

#[test]
fn test_ramp_with_offset() {
    let config = PipelineConfig::builder(Variant::Funque)
        .with_levels(2)
        .with_vif_extra_levels(0)
        .with_wavelet(Wavelet::Haar)
        .build()
        .unwrap();
    // Two identical frames per stream so motion at frame 1 is exactly 0.
    let reference = vec![Frame::luma(ramp(64, 64, 0.0)); 2];
    let distorted = vec![Frame::luma(ramp(64, 64, 0.01)); 2];
    let extraction = run(config, reference, distorted, 1);

    assert_eq!(extraction.features().len(), 2);
    for frame in 0..2 {
        for level in 0..2 {
            let vif = score(&extraction, frame, &format!("vif_scale{level}"));
            assert!((vif - 1.0).abs() < 1e-4, "vif level {level}: {vif}");
        }
        let ssim = score(&extraction, frame, "ssim_mean_scale0");
        assert!(ssim > 0.9 && ssim < 1.0, "ssim {ssim}");
        let dlm = score(&extraction, frame, "adm_scale0");
        assert!((dlm - 1.0).abs() < 1e-6, "dlm {dlm}");
        assert_eq!(score(&extraction, frame, "mad_scale0"), 0.0);
    }
    let names = extraction.feature_names();
    assert_eq!(names[0], "vif_approx_scalar_channel_y_scale_1");
    assert_eq!(names.last().unwrap(), "motion_channel_y_scale_2");
}

#[test]
fn test_first_frame_temporal_features_are_zero() {
    for variant in Variant::ALL {
        let config = PipelineConfig::new(variant).unwrap();
        let reference = yuv_sequence(64, 64, 2, 11);
        let distorted = distort(&reference, 0.2, 5);
        let temporal: Vec<usize> = config
            .features()
            .iter()
            .enumerate()
            .filter(|(_, f)| f.kind.is_temporal())
            .map(|(i, _)| i)
            .collect();
        let extraction = run(config, reference, distorted, 1);
        let rows = extraction.features().rows();
        assert_eq!(rows.len(), 2, "{variant}");
        for &i in &temporal {
            assert_eq!(rows[0].values[i], 0.0, "{variant}: {}", extraction.feature_names()[i]);
        }
        assert!(rows.iter().all(|r| r.values.iter().all(|v| v.is_finite())), "{variant}");
        // The drifting pattern gives non-zero motion once a previous frame exists.
        assert!(temporal.iter().any(|&i| rows[1].values[i] != 0.0), "{variant}");
    }
}

#[test]
fn test_sampling_interval_keeps_temporal_state() {
    let config = PipelineConfig::new(Variant::YFunquePlus).unwrap();
    let reference = luma_sequence(64, 64, 5, 3);
    let distorted = distort(&reference, 0.1, 9);

    let every = run(config.clone(), reference.clone(), distorted.clone(), 1);
    let sampled = run(config, reference, distorted, 2);

    assert_eq!(every.features().len(), 5);
    assert_eq!(sampled.features().len(), 3);
    assert_eq!(sampled.timing().rows().len(), 5);
    for row in sampled.features().rows() {
        let full = &every.features().rows()[row.frame];
        assert_eq!(full.frame, row.frame);
        assert_eq!(full.values, row.values, "frame {}", row.frame);
    }
}

#[test]
fn test_frame_count_policies() {
    let reference = luma_sequence(32, 32, 3, 1);
    let distorted = luma_sequence(32, 32, 2, 2);

    let strict = FeatureExtractor::new(PipelineConfig::new(Variant::Funque).unwrap());
    let err = strict
        .extract_frames(
            reference.clone().into_iter().map(Ok),
            distorted.clone().into_iter().map(Ok),
            1,
        )
        .unwrap_err();
    assert!(matches!(
        err,
        FunqueError::FrameCountMismatch {
            reference: 3,
            distorted: 2
        }
    ));

    let truncate = PipelineConfig::builder(Variant::Funque)
        .with_frame_count_policy(FrameCountPolicy::Truncate)
        .build()
        .unwrap();
    let extraction = run(truncate, reference, distorted, 1);
    assert_eq!(extraction.features().len(), 2);
}

#[test]
fn test_frame_size_change_rejected() {
    let extractor = FeatureExtractor::new(PipelineConfig::new(Variant::Funque).unwrap());
    let mut reference = luma_sequence(32, 32, 1, 1);
    reference.extend(luma_sequence(48, 32, 1, 1));
    let err = extractor
        .extract_frames(
            reference.clone().into_iter().map(Ok),
            reference.into_iter().map(Ok),
            1,
        )
        .unwrap_err();
    assert!(matches!(err, FunqueError::DimensionMismatch { .. }));
}

#[test]
fn test_timing_table_columns() {
    let config = PipelineConfig::new(Variant::VmafLike).unwrap();
    let reference = luma_sequence(64, 48, 2, 4);
    let distorted = distort(&reference, 0.1, 4);
    let extraction = run(config, reference, distorted, 1);

    assert_eq!(extraction.timing().stage_names(), ["vif", "adm", "mad"]);
    let mut buf = Vec::new();
    extraction.timing().write_csv(&mut buf).unwrap();
    let text = String::from_utf8(buf).unwrap();
    assert!(text.starts_with("Frame,time_taken,resizer,filters,dwt,vif,adm,mad\n"));
    assert!(text.lines().last().unwrap().starts_with("Sum,"));
}

#[test]
fn test_raw_yuv_asset_with_tables() {
    let (w, h) = (64, 48);
    let ref_path = common::temp_path("asset_ref.yuv");
    let dis_path = common::temp_path("asset_dis.yuv");
    let table = common::temp_path("asset_features.csv");
    common::write_raw(&ref_path, &yuv420_bytes(w, h, 3, 21));
    common::write_raw(&dis_path, &yuv420_bytes(w, h, 3, 22));

    let mut asset = Asset::new(StreamSpec::new(&ref_path, w, h), StreamSpec::new(&dis_path, w, h))
        .with_sample_interval(2);
    asset.feature_table = Some(table.clone());

    let extractor = FeatureExtractor::new(PipelineConfig::new(Variant::ThreeCFunquePlus).unwrap());
    let extraction = extractor.extract(&asset).unwrap();
    assert_eq!(extraction.features().len(), 2);
    assert_eq!(extraction.timing().rows().len(), 3);

    let csv = std::fs::read_to_string(&table).unwrap();
    let header = csv.lines().next().unwrap();
    assert!(header.starts_with("Frame,ms_ssim_cov_channel_y_levels_2,"));
    assert_eq!(csv.lines().count(), 3);

    let (matrix, names) = extraction.into_feature_matrix();
    assert_eq!(matrix.len(), 2);
    assert_eq!(matrix[0].len(), names.len());

    for p in [ref_path, dis_path, table] {
        std::fs::remove_file(p).ok();
    }
}

#[cfg(feature = "y4m")]
#[test]
fn test_y4m_asset() {
    let (w, h) = (64, 64);
    let ref_path = common::temp_path("asset_ref.y4m");
    let dis_path = common::temp_path("asset_dis.y4m");
    common::write_y4m(&ref_path, w, h, &yuv420_bytes(w, h, 2, 31));
    common::write_y4m(&dis_path, w, h, &yuv420_bytes(w, h, 2, 32));

    let extractor = FeatureExtractor::new(PipelineConfig::new(Variant::FsYFunquePlus).unwrap());
    let asset = Asset::new(StreamSpec::new(&ref_path, w, h), StreamSpec::new(&dis_path, w, h));
    let extraction = extractor.extract(&asset).unwrap();
    assert_eq!(extraction.features().len(), 2);
    assert_eq!(extraction.feature_names().len(), 4);

    // Declared size must match the header.
    let wrong = Asset::new(StreamSpec::new(&ref_path, 32, 32), StreamSpec::new(&dis_path, 32, 32));
    assert!(matches!(
        extractor.extract(&wrong),
        Err(FunqueError::DimensionMismatch { .. })
    ));

    for p in [ref_path, dis_path] {
        std::fs::remove_file(p).ok();
    }
}

#[test]
fn test_missing_stream_is_io_error() {
    let extractor = FeatureExtractor::new(PipelineConfig::new(Variant::Funque).unwrap());
    let asset = Asset::new(
        StreamSpec::new("/nonexistent/funque/ref.yuv", 64, 64),
        StreamSpec::new("/nonexistent/funque/dis.yuv", 64, 64),
    );
    assert!(matches!(extractor.extract(&asset), Err(FunqueError::Io { .. })));
}

#[test]
fn test_config_is_shareable() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<PipelineConfig>();
    assert_send_sync::<FeatureExtractor>();
}
