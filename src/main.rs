//! captcha-solver - decode captcha images with a trained ONNX model

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use captcha_solver::config::{self, SolverConfig};
use captcha_solver::vision::{CaptchaImage, ModelSource, ModelVariant, OnnxCaptchaEngine, OnnxRuntime};

/// captcha-solver - recognize captcha text with a trained model
#[derive(Parser, Debug)]
#[command(name = "captcha-solver")]
#[command(about = "Decode captcha images with an ONNX sequence model")]
struct Args {
    /// Captcha image files to decode
    #[arg(required = true)]
    images: Vec<PathBuf>,

    /// ONNX model file (overrides the config file)
    #[arg(short, long)]
    model: Option<PathBuf>,

    /// Configuration file (defaults to the user config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Model variant: stop_token or v1..v8 (overrides the config file and
    /// file name detection)
    #[arg(long)]
    variant: Option<ModelVariant>,

    /// Print one JSON object per image
    #[arg(long)]
    json: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

/// Per-image result line
#[derive(Debug, Serialize)]
struct Recognition<'a> {
    image: &'a Path,
    text: Option<String>,
    error: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut solver_config = load_solver_config(args.config.as_deref())?;

    if let Some(model) = &args.model {
        solver_config.model.path = Some(model.clone());
    }
    let Some(model_path) = solver_config.model.path.clone() else {
        bail!("No model given: pass --model or set model.path in the config file");
    };

    if let Some(variant) = args.variant {
        solver_config.model.variant = Some(variant);
    }
    let variant = solver_config.variant();
    info!(
        "Using {} model {} from {:?}",
        variant.display_name(),
        variant,
        model_path
    );

    let engine = OnnxCaptchaEngine::new(
        OnnxRuntime::new(solver_config.runtime.intra_threads),
        ModelSource::File(model_path),
        solver_config.engine_config()?,
    );
    engine.initialize().context("Captcha solving unavailable")?;

    for path in &args.images {
        let outcome = recognize_file(&engine, path);
        if args.json {
            let line = match outcome {
                Ok(text) => Recognition { image: path, text: Some(text), error: None },
                Err(e) => Recognition { image: path, text: None, error: Some(format!("{:#}", e)) },
            };
            println!("{}", serde_json::to_string(&line)?);
        } else {
            match outcome {
                Ok(text) if text.is_empty() => println!("{}: <no confident answer>", path.display()),
                Ok(text) => println!("{}: {}", path.display(), text),
                Err(e) => {
                    warn!("Failed to decode {:?}: {:#}", path, e);
                    println!("{}: <error>", path.display());
                }
            }
        }
    }

    engine.release();
    Ok(())
}

/// Load configuration from the given file, the default location, or defaults
fn load_solver_config(path: Option<&Path>) -> Result<SolverConfig> {
    if let Some(path) = path {
        let config = config::load_config(path)
            .with_context(|| format!("Failed to load configuration from {:?}", path))?;
        info!("Loaded configuration from {:?}", path);
        return Ok(config);
    }

    if let Ok(default_path) = config::default_config_path() {
        if default_path.exists() {
            let config = config::load_config(&default_path)
                .with_context(|| format!("Failed to load configuration from {:?}", default_path))?;
            info!("Loaded configuration from {:?}", default_path);
            return Ok(config);
        }
    }

    info!("Using default configuration");
    Ok(SolverConfig::default())
}

/// Decode one image file
fn recognize_file(engine: &OnnxCaptchaEngine, path: &Path) -> Result<String> {
    let img = image::open(path).with_context(|| format!("Failed to load image {:?}", path))?;
    let captcha = CaptchaImage::from_dynamic(&img)?;
    let text = engine.recognize(&captcha)?;
    Ok(text)
}
