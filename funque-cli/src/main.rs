//! funque CLI - wavelet-domain video quality features
//!
//! Extract per-frame FUNQUE-family or VMAF-like features from a reference
//! and a distorted video (or a pair of still images).

use std::fs::File;
use std::io::{self, BufWriter, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{ArgAction, ColorChoice, Parser, ValueEnum};
use colored::Colorize;
use funque::{
    Asset, ChromaSampling, Extraction, FeatureExtractor, FeatureMatrix, Frame, FrameCountPolicy,
    Img, PipelineConfig, StreamSpec, TimingTable, Variant, VideoStandard, RGB8,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// FUNQUE video quality feature extractor
///
/// Computes per-frame perceptual quality features comparing a distorted
/// video against its reference. Features are computed in the wavelet
/// domain: VIF, SSIM/MS-SSIM, DLM, ST-RRED, motion and edge/blur activity,
/// depending on the chosen model variant.
///
/// Inputs:
///   .y4m          - size, bit depth and chroma layout read from the header
///   .png/.jpg/.bmp - single-frame comparison
///   anything else - raw planar YUV, needs --width and --height
#[derive(Parser, Debug)]
#[command(name = "funque")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "EXAMPLES:
    Extract FUNQUE features from two Y4M files:
        funque ref.y4m dis.y4m

    Y-FUNQUE+ on raw 10-bit 4:2:0 video, every 2nd frame:
        funque -m y-funque+ --width 1920 --height 1080 --bit-depth 10 \\
            --sample-interval 2 ref.yuv dis.yuv

    Write feature, score and timing tables:
        funque --features-out f.csv --scores-out s.csv --timing-out t.csv ref.y4m dis.y4m

    Run a batch of assets described in a JSON file:
        funque --batch assets.json --json

VARIANTS:
    funque, y-funque+, fs-y-funque+, 3c-funque+, fs-3c-funque+, vmaf

EXIT CODES:
    0 - Success
    2 - Error (file not found, size mismatch, invalid option, etc.)")]
struct Cli {
    /// Reference video or image
    #[arg(value_name = "REFERENCE", required_unless_present = "batch")]
    reference: Option<PathBuf>,

    /// Distorted video or image
    #[arg(value_name = "DISTORTED", required_unless_present = "batch")]
    distorted: Option<PathBuf>,

    /// Model variant
    #[arg(short = 'm', long, default_value = "FUNQUE", value_parser = parse_variant)]
    variant: Variant,

    /// Luma width of raw YUV input
    #[arg(long, value_name = "PIXELS")]
    width: Option<usize>,

    /// Luma height of raw YUV input
    #[arg(long, value_name = "PIXELS")]
    height: Option<usize>,

    /// Bits per sample of raw YUV input
    #[arg(long, default_value = "8", value_name = "BITS")]
    bit_depth: u32,

    /// Chroma subsampling of raw YUV input (420, 422, 444, 400)
    #[arg(long, default_value = "420", value_parser = parse_chroma)]
    chroma: ChromaSampling,

    /// Keep every n-th frame
    #[arg(long, default_value = "1", value_name = "N")]
    sample_interval: usize,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Output JSON (shorthand for --format json)
    #[arg(long, conflicts_with = "format")]
    json: bool,

    /// Write the feature matrix as CSV
    #[arg(long, value_name = "FILE")]
    features_out: Option<PathBuf>,

    /// Write the raw score table as CSV
    #[arg(long, value_name = "FILE")]
    scores_out: Option<PathBuf>,

    /// Write the timing table as CSV
    #[arg(long, value_name = "FILE")]
    timing_out: Option<PathBuf>,

    /// Stop at the shorter stream instead of failing on a frame count mismatch
    #[arg(long)]
    truncate: bool,

    /// Batch mode: JSON file with a list of assets
    #[arg(long, short = 'b', value_name = "FILE")]
    batch: Option<PathBuf>,

    /// Continue on errors in batch mode
    #[arg(long)]
    keep_going: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Control color output
    #[arg(long, value_enum, default_value = "auto")]
    color: ColorChoice,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Per-feature summary over kept frames
    Text,
    /// Feature and score tables as JSON
    Json,
    /// Feature matrix as CSV
    Csv,
}

fn parse_variant(s: &str) -> Result<Variant, String> {
    s.parse().map_err(|e: funque::FunqueError| e.to_string())
}

fn parse_chroma(s: &str) -> Result<ChromaSampling, String> {
    s.parse().map_err(|e: funque::FunqueError| e.to_string())
}

/// One reference/distorted pair, from the command line or a batch file.
#[derive(Debug, Clone, Deserialize)]
struct Job {
    reference: PathBuf,
    distorted: PathBuf,
    #[serde(default)]
    width: Option<usize>,
    #[serde(default)]
    height: Option<usize>,
    #[serde(default)]
    bit_depth: Option<u32>,
    #[serde(default)]
    chroma: Option<String>,
    #[serde(default)]
    sample_interval: Option<usize>,
    #[serde(default)]
    features_out: Option<PathBuf>,
    #[serde(default)]
    scores_out: Option<PathBuf>,
    #[serde(default)]
    timing_out: Option<PathBuf>,
}

#[derive(Serialize)]
struct JsonOutput<'a> {
    reference: String,
    distorted: String,
    variant: &'static str,
    extractor: &'static str,
    features: &'a FeatureMatrix,
    scores: &'a FeatureMatrix,
    timing: &'a TimingTable,
}

#[derive(Serialize)]
struct JsonError {
    reference: String,
    distorted: String,
    error: String,
}

#[derive(Serialize)]
struct BatchJsonOutput<'a> {
    results: Vec<JsonOutput<'a>>,
    errors: Vec<JsonError>,
}

struct JobResult {
    job: Job,
    result: Result<Extraction, String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    setup_colors(&cli);
    setup_logging(cli.verbose);

    if cli.batch.is_some() {
        run_batch(&cli)
    } else {
        run_single(&cli)
    }
}

fn setup_colors(cli: &Cli) {
    match cli.color {
        ColorChoice::Always => colored::control::set_override(true),
        ColorChoice::Never => colored::control::set_override(false),
        ColorChoice::Auto => {
            if !io::stdout().is_terminal() {
                colored::control::set_override(false);
            }
        }
    }
}

fn setup_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .init();
}

fn get_format(cli: &Cli) -> OutputFormat {
    if cli.json {
        OutputFormat::Json
    } else {
        cli.format
    }
}

fn build_extractor(cli: &Cli) -> Result<FeatureExtractor, String> {
    let policy = if cli.truncate {
        FrameCountPolicy::Truncate
    } else {
        FrameCountPolicy::Strict
    };
    let config = PipelineConfig::builder(cli.variant)
        .with_frame_count_policy(policy)
        .build()
        .map_err(|e| e.to_string())?;
    Ok(FeatureExtractor::new(config))
}

fn run_single(cli: &Cli) -> ExitCode {
    let (Some(reference), Some(distorted)) = (&cli.reference, &cli.distorted) else {
        eprintln!("{}: REFERENCE and DISTORTED are required", "error".red().bold());
        return ExitCode::from(2);
    };
    let job = Job {
        reference: reference.clone(),
        distorted: distorted.clone(),
        width: cli.width,
        height: cli.height,
        bit_depth: None,
        chroma: None,
        sample_interval: Some(cli.sample_interval),
        features_out: cli.features_out.clone(),
        scores_out: cli.scores_out.clone(),
        timing_out: cli.timing_out.clone(),
    };

    let result = build_extractor(cli).and_then(|extractor| run_job(cli, &extractor, &job));
    match result {
        Ok(extraction) => match output_single(cli, &job, &extraction) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("{}: {}", "error".red().bold(), e);
                ExitCode::from(2)
            }
        },
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            ExitCode::from(2)
        }
    }
}

fn run_batch(cli: &Cli) -> ExitCode {
    let Some(batch) = &cli.batch else {
        return ExitCode::from(2);
    };
    let jobs = match load_batch(batch) {
        Ok(jobs) => jobs,
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            return ExitCode::from(2);
        }
    };
    if jobs.is_empty() {
        eprintln!("{}: batch file lists no assets", "warning".yellow().bold());
        return ExitCode::from(2);
    }
    let extractor = match build_extractor(cli) {
        Ok(extractor) => extractor,
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            return ExitCode::from(2);
        }
    };

    let mut results = Vec::with_capacity(jobs.len());
    let mut had_errors = false;
    for job in jobs {
        let result = run_job(cli, &extractor, &job);
        if let Err(e) = &result {
            had_errors = true;
            if !cli.keep_going {
                eprintln!(
                    "{}: {}: {}",
                    "error".red().bold(),
                    job.distorted.display(),
                    e
                );
                return ExitCode::from(2);
            }
        }
        results.push(JobResult { job, result });
    }

    if let Err(e) = output_batch(cli, &extractor, &results) {
        eprintln!("{}: {}", "error".red().bold(), e);
        return ExitCode::from(2);
    }
    if had_errors {
        ExitCode::from(2)
    } else {
        ExitCode::SUCCESS
    }
}

fn load_batch(path: &Path) -> Result<Vec<Job>, String> {
    let file =
        File::open(path).map_err(|e| format!("failed to open '{}': {}", path.display(), e))?;
    serde_json::from_reader(io::BufReader::new(file))
        .map_err(|e| format!("failed to parse batch file '{}': {}", path.display(), e))
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .is_some_and(|e| matches!(e.as_str(), "png" | "jpg" | "jpeg" | "bmp"))
}

fn load_image_frame(path: &Path) -> Result<Frame, String> {
    let img =
        image::open(path).map_err(|e| format!("failed to load '{}': {}", path.display(), e))?;
    let rgb = img.to_rgb8();
    let (width, height) = (rgb.width() as usize, rgb.height() as usize);
    let pixels: Vec<RGB8> = rgb
        .pixels()
        .map(|p| RGB8::new(p[0], p[1], p[2]))
        .collect();
    Ok(Frame::from_rgb8(Img::new(pixels, width, height).as_ref()))
}

fn stream_spec(cli: &Cli, job: &Job, path: &Path) -> Result<StreamSpec, String> {
    if path.extension().is_some_and(|e| e.eq_ignore_ascii_case("y4m")) {
        return StreamSpec::probe_y4m(path).map_err(|e| e.to_string());
    }
    let (Some(width), Some(height)) = (job.width, job.height) else {
        return Err(format!(
            "'{}' is raw YUV: --width and --height are required",
            path.display()
        ));
    };
    let chroma = match &job.chroma {
        Some(name) => name.parse().map_err(|e: funque::FunqueError| e.to_string())?,
        None => cli.chroma,
    };
    let standard = VideoStandard {
        bit_depth: job.bit_depth.unwrap_or(cli.bit_depth),
        chroma,
    };
    Ok(StreamSpec::new(path, width, height).with_standard(standard))
}

fn run_job(cli: &Cli, extractor: &FeatureExtractor, job: &Job) -> Result<Extraction, String> {
    let interval = job.sample_interval.unwrap_or(cli.sample_interval);
    if is_image(&job.reference) && is_image(&job.distorted) {
        debug!(reference = %job.reference.display(), "comparing still images");
        let reference = load_image_frame(&job.reference)?;
        let distorted = load_image_frame(&job.distorted)?;
        let extraction = extractor
            .extract_frames([Ok(reference)], [Ok(distorted)], interval)
            .map_err(|e| e.to_string())?;
        write_tables(job, &extraction)?;
        info!("Processed {}", job.distorted.display());
        return Ok(extraction);
    }

    let mut asset = Asset::new(
        stream_spec(cli, job, &job.reference)?,
        stream_spec(cli, job, &job.distorted)?,
    )
    .with_sample_interval(interval);
    asset.feature_table = job.features_out.clone();
    asset.score_table = job.scores_out.clone();
    asset.timing_table = job.timing_out.clone();
    extractor.extract(&asset).map_err(|e| e.to_string())
}

fn write_csv_file(
    path: &Path,
    write: impl FnOnce(&mut BufWriter<File>) -> io::Result<()>,
) -> Result<(), String> {
    let file =
        File::create(path).map_err(|e| format!("failed to create '{}': {}", path.display(), e))?;
    let mut out = BufWriter::new(file);
    write(&mut out)
        .and_then(|()| out.flush())
        .map_err(|e| format!("failed to write '{}': {}", path.display(), e))
}

/// Writes tables for image jobs; video assets write their own.
fn write_tables(job: &Job, extraction: &Extraction) -> Result<(), String> {
    if let Some(path) = &job.features_out {
        write_csv_file(path, |out| extraction.features().write_csv(out))?;
    }
    if let Some(path) = &job.scores_out {
        write_csv_file(path, |out| extraction.scores().write_csv(out))?;
    }
    if let Some(path) = &job.timing_out {
        write_csv_file(path, |out| extraction.timing().write_csv(out))?;
    }
    Ok(())
}

fn json_output<'a>(variant: Variant, job: &Job, extraction: &'a Extraction) -> JsonOutput<'a> {
    JsonOutput {
        reference: job.reference.display().to_string(),
        distorted: job.distorted.display().to_string(),
        variant: variant.name(),
        extractor: variant.extractor_id(),
        features: extraction.features(),
        scores: extraction.scores(),
        timing: extraction.timing(),
    }
}

/// Mean, min and max of each feature over kept frames.
fn print_summary(variant: Variant, job: &Job, extraction: &Extraction) {
    let features = extraction.features();
    println!(
        "{} features: {} ({} frames kept)",
        variant.name().bold(),
        job.distorted.display(),
        features.len()
    );
    let name_width = features.names().iter().map(String::len).max().unwrap_or(20);
    for name in features.names() {
        let Some(values) = features.column(name) else {
            continue;
        };
        if values.is_empty() {
            println!("  {name:name_width$}  {:>10}", "-".dimmed());
            continue;
        }
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        println!(
            "  {name:name_width$}  {:>10}  {}",
            format!("{mean:.6}").cyan(),
            format!("[{min:.6}, {max:.6}]").dimmed()
        );
    }
}

fn write_json(json: &str) -> Result<(), String> {
    writeln!(io::stdout().lock(), "{json}").map_err(|e| format!("failed to write JSON: {e}"))
}

fn flush_stdout() -> Result<(), String> {
    io::stdout()
        .flush()
        .map_err(|e| format!("failed to flush stdout: {e}"))
}

fn output_single(cli: &Cli, job: &Job, extraction: &Extraction) -> Result<(), String> {
    match get_format(cli) {
        OutputFormat::Text => print_summary(cli.variant, job, extraction),
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&json_output(cli.variant, job, extraction))
                .map_err(|e| format!("failed to serialize JSON: {e}"))?;
            write_json(&json)?;
        }
        OutputFormat::Csv => {
            let stdout = io::stdout();
            extraction
                .features()
                .write_csv(stdout.lock())
                .map_err(|e| format!("failed to write CSV: {e}"))?;
        }
    }
    flush_stdout()
}

fn output_batch(
    cli: &Cli,
    extractor: &FeatureExtractor,
    results: &[JobResult],
) -> Result<(), String> {
    let variant = extractor.config().variant();
    match get_format(cli) {
        OutputFormat::Json => {
            let mut output = BatchJsonOutput {
                results: Vec::new(),
                errors: Vec::new(),
            };
            for r in results {
                match &r.result {
                    Ok(extraction) => output.results.push(json_output(variant, &r.job, extraction)),
                    Err(e) => output.errors.push(JsonError {
                        reference: r.job.reference.display().to_string(),
                        distorted: r.job.distorted.display().to_string(),
                        error: e.clone(),
                    }),
                }
            }
            let json = serde_json::to_string_pretty(&output)
                .map_err(|e| format!("failed to serialize JSON: {e}"))?;
            write_json(&json)?;
        }
        OutputFormat::Csv => {
            let mut stdout = io::stdout().lock();
            for r in results {
                if let Ok(extraction) = &r.result {
                    writeln!(stdout, "# {}", r.job.distorted.display())
                        .and_then(|()| extraction.features().write_csv(&mut stdout))
                        .map_err(|e| format!("failed to write CSV: {e}"))?;
                }
            }
        }
        OutputFormat::Text => {
            let mut processed = 0;
            let mut errors = 0;
            for r in results {
                match &r.result {
                    Ok(extraction) => {
                        processed += 1;
                        print_summary(variant, &r.job, extraction);
                    }
                    Err(e) => {
                        errors += 1;
                        println!(
                            "{}  {}",
                            r.job.distorted.display(),
                            format!("ERROR: {e}").red()
                        );
                    }
                }
            }
            println!();
            println!("{}", "Summary:".bold());
            println!(
                "  Total: {}  Processed: {}  Errors: {}",
                results.len(),
                processed.to_string().green(),
                if errors > 0 {
                    errors.to_string().red()
                } else {
                    errors.to_string().normal()
                }
            );
        }
    }
    flush_stdout()
}
