//! # Command Implementations
//!
//! Each submodule handles one CLI command. Shared setup (config, model
//! loading, input parsing) lives here.

pub mod clean;
pub mod export;
pub mod generate;
pub mod project;
pub mod search;

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::cli::Provider;
use crate::config::{self, PipelineConfig};
use crate::models::{EmbeddingSession, SentenceModel};
use crate::pipeline::{Galaxy, Pipeline, Progress};
use crate::storage::EmbeddingCache;
use crate::ui;

/// Global flags shared by every command
#[derive(Debug, Clone, Default)]
pub struct Options {
	pub provider: Provider,
	pub models_dir: Option<PathBuf>,
	pub model: Option<String>,
	pub config: Option<PathBuf>,
	pub seed: Option<u64>,
	pub no_cache: bool,
}

impl Options {
	/// Defaults, then the config file, then command-line overrides
	pub fn pipeline_config(&self) -> Result<PipelineConfig> {
		let mut config = match &self.config {
			Some(path) => PipelineConfig::load(path)?,
			None => PipelineConfig::default(),
		};
		if let Some(model) = &self.model {
			config.model_id = model.clone();
		}
		Ok(config)
	}
}

/// Non-empty, trimmed lines of a text file
pub fn read_texts(path: &Path) -> Result<Vec<String>> {
	let content =
		fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;

	let texts: Vec<String> = content
		.lines()
		.map(str::trim)
		.filter(|line| !line.is_empty())
		.map(str::to_string)
		.collect();

	if texts.is_empty() {
		bail!("No text found in {}", path.display());
	}
	Ok(texts)
}

/// Start the embedding worker and load the configured model
pub fn open_pipeline(opts: &Options, config: PipelineConfig, input: &Path) -> Result<Pipeline> {
	let models_dir = config::models_dir(opts.models_dir.as_deref()).with_context(|| {
		format!(
			"Models directory not found. Pass --models-dir or set {}",
			config::MODELS_DIR_ENV
		)
	})?;

	let model = SentenceModel::new(models_dir.clone(), opts.provider);
	if !model.is_available(&config.model_id) {
		bail!(
			"Model files not found. Ensure {} and {} exist",
			config::model_path(&models_dir, &config.model_id).display(),
			config::tokenizer_path(&models_dir, &config.model_id).display()
		);
	}

	let mut pipeline = Pipeline::new(EmbeddingSession::start(model), config);
	if !opts.no_cache {
		pipeline = pipeline.with_cache(EmbeddingCache::beside(input));
	}
	if let Some(seed) = opts.seed {
		pipeline = pipeline.with_seed(seed);
	}

	ui::info(&format!("Loading model {}", pipeline.config().model_id));
	let mut printer = ProgressPrinter::default();
	let loaded = pipeline.load_model(|p| printer.show(p))?;
	ui::success(&format!("Model {} ready ({})", loaded.model_id, loaded.device));

	Ok(pipeline)
}

/// Run the pipeline over `texts` and wait for the galaxy
pub fn build_galaxy(pipeline: &mut Pipeline, texts: Vec<String>) -> Result<Galaxy> {
	let start = std::time::Instant::now();
	let count = texts.len();

	let mut printer = ProgressPrinter::default();
	let galaxy = pipeline.generate(texts).wait(|p| printer.show(p))?;

	ui::success(&format!(
		"Placed {} snippets via {} in {:.2}s",
		count,
		galaxy.method().as_str(),
		start.elapsed().as_secs_f32()
	));
	Ok(galaxy)
}

/// Prints progress in 10% steps unless verbose
#[derive(Debug, Default)]
pub struct ProgressPrinter {
	last_step: Option<i32>,
}

impl ProgressPrinter {
	pub fn show(&mut self, progress: &Progress) {
		let step = (progress.percentage / 10.0).floor() as i32;
		if ui::Log::is_verbose() || self.last_step != Some(step) {
			self.last_step = Some(step);
			ui::progress(progress.percentage, &progress.status);
		}
	}
}
