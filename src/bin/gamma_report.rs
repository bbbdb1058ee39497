use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use chrono::Utc;
use clap::{Parser, ValueEnum};
use gamma_agreement::{
    read_delimited, Continuum, GammaConfig, GammaEstimatorBuilder, Meta, PivotType, Report,
    SamplerKind,
};
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

#[path = "gamma_report/json_report_formatter.rs"]
mod json_report_formatter;
#[path = "gamma_report/text_grid_loader.rs"]
mod text_grid_loader;

const REPORT_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum PivotChoice {
    Float,
    Int,
}

impl PivotChoice {
    fn pivot_type(self) -> PivotType {
        match self {
            Self::Float => PivotType::Float,
            Self::Int => PivotType::Int,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SamplerChoice {
    Pivot,
    Statistical,
}

impl SamplerChoice {
    fn sampler_kind(self) -> SamplerKind {
        match self {
            Self::Pivot => SamplerKind::Pivot,
            Self::Statistical => SamplerKind::Statistical,
        }
    }
}

/// Computes the gamma agreement of each input continuum.
///
/// Inputs ending in `.TextGrid` are read with one annotator per interval
/// tier; anything else is read as `annotator,label,start,end` records.
#[derive(Debug, Parser)]
struct Args {
    #[arg(required = true)]
    inputs: Vec<PathBuf>,
    /// JSON file with estimator settings; flags below override it.
    #[arg(long, env = "GAMMA_REPORT_CONFIG")]
    config: Option<PathBuf>,
    #[arg(long, env = "GAMMA_REPORT_N_SAMPLES")]
    n_samples: Option<usize>,
    #[arg(long, env = "GAMMA_REPORT_PRECISION_LEVEL")]
    precision_level: Option<f64>,
    #[arg(long, env = "GAMMA_REPORT_PIVOT", value_enum)]
    pivot: Option<PivotChoice>,
    #[arg(long, env = "GAMMA_REPORT_SAMPLER", value_enum)]
    sampler: Option<SamplerChoice>,
    #[arg(long, env = "GAMMA_REPORT_SEED")]
    seed: Option<u64>,
    /// Annotators whose tracks seed the pivot sampler.
    #[arg(long, env = "GAMMA_REPORT_GROUND_TRUTH", value_delimiter = ',')]
    ground_truth: Vec<String>,
    /// Report path; the report goes to stdout when omitted.
    #[arg(long, env = "GAMMA_REPORT_OUT")]
    out: Option<PathBuf>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run() {
        eprintln!("gamma_report: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let args = Args::parse();
    let config = resolve_config(&args)?;
    let estimator = GammaEstimatorBuilder::new(config.clone())
        .build()
        .map_err(|err| format!("Invalid estimator configuration: {err}"))?;

    let progress = ProgressBar::new(args.inputs.len() as u64);
    progress.set_style(
        ProgressStyle::with_template(
            "[{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({eta}) {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=>-"),
    );
    progress.set_message("starting...");

    let mut results = Vec::with_capacity(args.inputs.len());
    for input in &args.inputs {
        let id = input.display().to_string();
        progress.set_message(id.clone());
        let continuum = load_continuum(input)?;
        let result = estimator
            .compute_gamma(&continuum)
            .map_err(|err| format!("Failed to compute gamma for '{id}': {err}"))?;
        results.push(result.summary(&id));
        progress.inc(1);
    }
    progress.finish_with_message("done");

    let report = Report {
        schema_version: REPORT_SCHEMA_VERSION,
        meta: Meta {
            generated_at: Utc::now().to_rfc3339(),
            seed: config.seed,
            input_count: args.inputs.len(),
        },
        results,
    };

    match &args.out {
        Some(path) => json_report_formatter::write_report(path, &report),
        None => json_report_formatter::write_report_to(&mut std::io::stdout().lock(), &report),
    }
}

fn resolve_config(args: &Args) -> Result<GammaConfig, String> {
    let mut config = match &args.config {
        Some(path) => GammaConfig::load(path)
            .map_err(|err| format!("Failed to load config '{}': {err}", path.display()))?,
        None => GammaConfig::default(),
    };
    if let Some(n_samples) = args.n_samples {
        config.n_samples = n_samples;
    }
    if args.precision_level.is_some() {
        config.precision_level = args.precision_level;
    }
    if let Some(pivot) = args.pivot {
        config.pivot_type = pivot.pivot_type();
    }
    if let Some(sampler) = args.sampler {
        config.sampler = sampler.sampler_kind();
    }
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if !args.ground_truth.is_empty() {
        config.ground_truth_annotators = Some(args.ground_truth.clone());
    }
    Ok(config)
}

fn load_continuum(path: &Path) -> Result<Continuum, String> {
    if !path.exists() {
        return Err(format!("Required input not found: {}", path.display()));
    }
    let is_textgrid = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("textgrid"));
    if is_textgrid {
        return text_grid_loader::load_continuum(path);
    }
    let file = File::open(path)
        .map_err(|err| format!("Failed to open input '{}': {err}", path.display()))?;
    read_delimited(BufReader::new(file))
        .map_err(|err| format!("Failed to read input '{}': {err}", path.display()))
}
