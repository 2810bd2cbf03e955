//! Print the feature matrix of two Y4M files as CSV.
//!
//! cargo run --example extract_y4m -- ref.y4m dis.y4m [variant]

use funque::{Asset, FeatureExtractor, PipelineConfig, StreamSpec, Variant};
use std::env;

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        eprintln!("Usage: extract_y4m <reference.y4m> <distorted.y4m> [variant]");
        std::process::exit(1);
    }
    let variant: Variant = args
        .get(3)
        .map_or(Ok(Variant::Funque), |v| v.parse())
        .unwrap_or_else(|e| panic!("{e}"));

    let reference = StreamSpec::probe_y4m(&args[1]).unwrap_or_else(|e| panic!("{e}"));
    let distorted = StreamSpec::probe_y4m(&args[2]).unwrap_or_else(|e| panic!("{e}"));
    let extractor = FeatureExtractor::new(PipelineConfig::new(variant).unwrap());
    let extraction = extractor
        .extract(&Asset::new(reference, distorted))
        .unwrap_or_else(|e| panic!("{e}"));

    extraction
        .features()
        .write_csv(std::io::stdout().lock())
        .unwrap();
}
