use funque::{FeatureExtractor, Frame, PipelineConfig, Plane, Variant};
use std::time::Instant;

fn main() {
    let width = 640;
    let height = 360;
    let frames = 8;

    // Drifting gradient with a small periodic distortion
    let reference: Vec<Frame> = (0..frames)
        .map(|i| {
            Frame::luma(Plane::from_fn(width, height, |x, y| {
                ((x + 2 * i) as f64 / width as f64 * 0.8 + y as f64 / height as f64 * 0.1)
                    .clamp(0.0, 1.0)
            }))
        })
        .collect();
    let distorted: Vec<Frame> = reference
        .iter()
        .map(|f| {
            let y = f.plane(funque::Channel::Y).unwrap();
            Frame::luma(Plane::from_fn(width, height, |x, yy| {
                (y.get(x, yy) + ((x * yy) % 10) as f64 / 400.0).clamp(0.0, 1.0)
            }))
        })
        .collect();

    for variant in [
        Variant::Funque,
        Variant::YFunquePlus,
        Variant::FsYFunquePlus,
        Variant::VmafLike,
    ] {
        let extractor = FeatureExtractor::new(PipelineConfig::new(variant).unwrap());

        let start = Instant::now();
        let extraction = extractor
            .extract_frames(
                reference.iter().cloned().map(Ok),
                distorted.iter().cloned().map(Ok),
                1,
            )
            .unwrap();
        let elapsed = start.elapsed();

        let sum = extraction.timing().sum();
        println!(
            "{:>14} {width}x{height}: {:.2}ms per frame (resize {:.1}ms, filters {:.1}ms, dwt {:.1}ms)",
            variant.name(),
            elapsed.as_secs_f64() * 1000.0 / frames as f64,
            sum.resizer * 1000.0,
            sum.filters * 1000.0,
            sum.dwt * 1000.0,
        );
    }
}
