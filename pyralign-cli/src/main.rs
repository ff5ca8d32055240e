use clap::Parser;
use nalgebra::SVector;
use pyralign::io::load_gray_image;
use pyralign::{
    align_images, Affine, AlignConfig, Alignment, AlignmentPolicy, Euclidean, ForwardAdditive,
    InverseCompositional, LevelReport, OwnedImage, ParametricWarp, Translation,
};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fs;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

const SCHEMA_JSON: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/config.schema.json"));
const EXAMPLE_JSON: &str =
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/config.example.json"));

#[derive(Parser, Debug)]
#[command(author, version, about = "Pyramidal image alignment CLI (JSON config driven)")]
struct Cli {
    /// Path to the JSON configuration file.
    #[arg(short, long, value_name = "FILE", default_value = "config.json")]
    config: PathBuf,
    /// Print the JSON schema and exit.
    #[arg(long)]
    print_schema: bool,
    /// Print an example config and exit.
    #[arg(long)]
    print_example: bool,
    /// Enable tracing output for performance profiling.
    #[arg(long)]
    trace: bool,
}

#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum WarpKind {
    Translation,
    Euclidean,
    Affine,
}

#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum Algorithm {
    ForwardAdditive,
    InverseCompositional,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct AlignConfigJson {
    pyramid_levels: usize,
    max_iterations: usize,
    eps: f64,
    record_steps: bool,
}

impl Default for AlignConfigJson {
    fn default() -> Self {
        let cfg = AlignConfig::default();
        Self {
            pyramid_levels: cfg.pyramid_levels,
            max_iterations: cfg.max_iterations,
            eps: cfg.eps,
            record_steps: cfg.record_steps,
        }
    }
}

impl From<&AlignConfigJson> for AlignConfig {
    fn from(value: &AlignConfigJson) -> Self {
        Self {
            pyramid_levels: value.pyramid_levels,
            max_iterations: value.max_iterations,
            eps: value.eps,
            record_steps: value.record_steps,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct Config {
    template_path: String,
    target_path: String,
    output_path: Option<String>,
    warp: WarpKind,
    algorithm: Algorithm,
    /// Initial parameters in level-0 coordinates; empty means identity.
    initial: Vec<f32>,
    parallel: bool,
    #[serde(rename = "align")]
    align_cfg: AlignConfigJson,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            template_path: String::new(),
            target_path: String::new(),
            output_path: None,
            warp: WarpKind::Translation,
            algorithm: Algorithm::InverseCompositional,
            initial: Vec::new(),
            parallel: false,
            align_cfg: AlignConfigJson::default(),
        }
    }
}

#[derive(Debug, Serialize)]
struct LevelRecord {
    level: usize,
    attempted: usize,
    accepted: usize,
    stop: &'static str,
    error: Option<f32>,
}

impl From<&LevelReport<f32>> for LevelRecord {
    fn from(value: &LevelReport<f32>) -> Self {
        Self {
            level: value.level,
            attempted: value.attempted,
            accepted: value.accepted,
            stop: value.stop.as_str(),
            error: value.error,
        }
    }
}

#[derive(Debug, Serialize)]
struct Output {
    params: Vec<f32>,
    last_error: Option<f32>,
    num_levels: usize,
    levels: Vec<LevelRecord>,
    steps: Vec<Vec<f32>>,
}

impl Output {
    fn from_alignment<W: ParametricWarp<N>, const N: usize>(value: &Alignment<W>) -> Self {
        Self {
            params: value.warp.params().iter().copied().collect(),
            last_error: value.last_error,
            num_levels: value.num_levels,
            levels: value.levels.iter().map(LevelRecord::from).collect(),
            steps: value
                .steps
                .iter()
                .map(|w| w.params().iter().copied().collect())
                .collect(),
        }
    }
}

fn initial_warp<W: ParametricWarp<N>, const N: usize>(params: &[f32]) -> Result<W, Box<dyn Error>> {
    if params.is_empty() {
        return Ok(W::identity());
    }
    if params.len() != N {
        return Err(format!("initial must have {N} values, got {}", params.len()).into());
    }
    Ok(W::from_params(SVector::from_column_slice(params)))
}

fn run<W, P, const N: usize>(
    policy: P,
    template: &OwnedImage<f32>,
    target: &OwnedImage<f32>,
    config: &Config,
) -> Result<Output, Box<dyn Error>>
where
    W: ParametricWarp<N>,
    P: AlignmentPolicy<W>,
{
    let initial = initial_warp::<W, N>(&config.initial)?;
    let result = align_images(
        policy,
        template.view(),
        target.view(),
        initial,
        &AlignConfig::from(&config.align_cfg),
    )?;
    tracing::info!(
        num_levels = result.num_levels,
        last_error = result.last_error.unwrap_or(f32::NAN),
        "alignment finished"
    );
    Ok(Output::from_alignment::<W, N>(&result))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.trace {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env().add_directive("pyralign=info".parse()?))
            .with_target(false)
            .init();
    }

    if cli.print_schema {
        println!("{SCHEMA_JSON}");
        return Ok(());
    }
    if cli.print_example {
        println!("{EXAMPLE_JSON}");
        return Ok(());
    }

    let config_text = fs::read_to_string(&cli.config)?;
    let config: Config = serde_json::from_str(&config_text)?;
    if config.template_path.is_empty() || config.target_path.is_empty() {
        return Err("template_path and target_path must be set in the config".into());
    }
    AlignConfig::from(&config.align_cfg).validate()?;

    let template = load_gray_image(&config.template_path)?;
    let target = load_gray_image(&config.target_path)?;
    let parallel = config.parallel;

    let output = match (config.warp, config.algorithm) {
        (WarpKind::Translation, Algorithm::ForwardAdditive) => run::<Translation, _, 2>(
            ForwardAdditive::<Translation, 2>::new().with_parallel(parallel),
            &template,
            &target,
            &config,
        )?,
        (WarpKind::Translation, Algorithm::InverseCompositional) => run::<Translation, _, 2>(
            InverseCompositional::<Translation, 2>::new().with_parallel(parallel),
            &template,
            &target,
            &config,
        )?,
        (WarpKind::Euclidean, Algorithm::ForwardAdditive) => run::<Euclidean, _, 3>(
            ForwardAdditive::<Euclidean, 3>::new().with_parallel(parallel),
            &template,
            &target,
            &config,
        )?,
        (WarpKind::Euclidean, Algorithm::InverseCompositional) => run::<Euclidean, _, 3>(
            InverseCompositional::<Euclidean, 3>::new().with_parallel(parallel),
            &template,
            &target,
            &config,
        )?,
        (WarpKind::Affine, Algorithm::ForwardAdditive) => run::<Affine, _, 6>(
            ForwardAdditive::<Affine, 6>::new().with_parallel(parallel),
            &template,
            &target,
            &config,
        )?,
        (WarpKind::Affine, Algorithm::InverseCompositional) => run::<Affine, _, 6>(
            InverseCompositional::<Affine, 6>::new().with_parallel(parallel),
            &template,
            &target,
            &config,
        )?,
    };
    let json = serde_json::to_string_pretty(&output)?;

    match config.output_path {
        Some(path) => fs::write(path, json)?,
        None => println!("{json}"),
    }

    Ok(())
}
