//! Application configuration and constants

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

// === Model Files ===
pub const DEFAULT_MODEL_ID: &str = "all-MiniLM-L6-v2";
pub const MODEL_FILE: &str = "model.onnx";
pub const TOKENIZER: &str = "tokenizer.json";
pub const MODELS_DIR_ENV: &str = "GALAXY_MODELS_DIR";

// === Model Parameters ===
pub const MAX_SEQUENCE_LEN: usize = 256;

// === Projection ===
pub const TARGET_DIM: usize = 3;
pub const LARGE_INPUT_THRESHOLD: usize = 500;
pub const SAMPLE_SIZE: usize = 300;
pub const SAMPLE_JITTER: f32 = 1.0;
pub const PROJECTION_TIMEOUT_SECS: f64 = 30.0;

// === Display ===
pub const NORMALIZE_SCALE: f32 = 100.0;

// === Search Defaults ===
pub const SIMILARITY_THRESHOLD: f32 = 0.3;
pub const PLACEMENT_NEIGHBORS: usize = 5;
pub const DEFAULT_LIMIT: usize = 10;

// === Session ===
pub const MODEL_LOAD_TIMEOUT_SECS: f64 = 180.0;
pub const EMBED_TIMEOUT_SECS: f64 = 120.0;

// === Storage ===
pub const CACHE_DIR: &str = ".galaxy";
pub const CACHE_EXT: &str = "msgpack";

/// How a search query is positioned relative to the existing layout
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum QueryPlacement {
	/// Keep every existing point fixed and place the query inside the frozen bounds
	#[default]
	Incremental,
	/// Re-project the batch together with the query and normalize everything again
	Recompute,
}

/// Projection used when the manifold layout is unavailable
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Fallback {
	/// Random `3 x D` matrix with unit rows
	#[default]
	Random,
	/// The three highest-variance input dimensions, centered
	Variance,
}

/// Tuning for the neighbor-graph embedding.
///
/// The neighbor and epoch formulas are heuristics; they are exposed here so
/// they can be adjusted without touching the algorithm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManifoldConfig {
	pub min_neighbors: usize,
	pub max_neighbors: usize,
	/// `n_neighbors = clamp(n / neighbor_divisor, min_neighbors, max_neighbors)`
	pub neighbor_divisor: usize,
	pub max_epochs: usize,
	/// `n_epochs = min(max_epochs, n * epochs_per_point)`
	pub epochs_per_point: usize,
	pub min_dist: f32,
	pub spread: f32,
	pub learning_rate: f32,
	pub negative_sample_rate: usize,
	/// Initial coordinates are uniform in `[-init_range, init_range]`
	pub init_range: f32,
}

impl Default for ManifoldConfig {
	fn default() -> Self {
		Self {
			min_neighbors: 2,
			max_neighbors: 15,
			neighbor_divisor: 3,
			max_epochs: 200,
			epochs_per_point: 10,
			min_dist: 0.5,
			spread: 3.0,
			learning_rate: 1.0,
			negative_sample_rate: 5,
			init_range: 10.0,
		}
	}
}

impl ManifoldConfig {
	pub fn n_neighbors(&self, n: usize) -> usize {
		let divisor = self.neighbor_divisor.max(1);
		(n / divisor).clamp(self.min_neighbors, self.max_neighbors.max(self.min_neighbors))
	}

	pub fn n_epochs(&self, n: usize) -> usize {
		self.max_epochs.min(n.saturating_mul(self.epochs_per_point))
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectionConfig {
	/// Batches larger than this are projected through the sampler
	pub large_input_threshold: usize,
	pub sample_size: usize,
	/// Per-axis jitter half-width for points placed next to a sample
	pub sample_jitter: f32,
	pub timeout_secs: f64,
	pub fallback: Fallback,
	pub manifold: ManifoldConfig,
}

impl Default for ProjectionConfig {
	fn default() -> Self {
		Self {
			large_input_threshold: LARGE_INPUT_THRESHOLD,
			sample_size: SAMPLE_SIZE,
			sample_jitter: SAMPLE_JITTER,
			timeout_secs: PROJECTION_TIMEOUT_SECS,
			fallback: Fallback::default(),
			manifold: ManifoldConfig::default(),
		}
	}
}

impl ProjectionConfig {
	pub fn timeout(&self) -> Duration {
		duration_from_secs(self.timeout_secs)
	}
}

/// Every tunable of the pipeline in one place
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
	pub model_id: String,
	pub projection: ProjectionConfig,
	/// Full width of the display range per axis
	pub scale: f32,
	pub similarity_threshold: f32,
	pub placement: QueryPlacement,
	pub placement_neighbors: usize,
	pub model_load_timeout_secs: f64,
	pub embed_timeout_secs: f64,
}

impl Default for PipelineConfig {
	fn default() -> Self {
		Self {
			model_id: DEFAULT_MODEL_ID.to_string(),
			projection: ProjectionConfig::default(),
			scale: NORMALIZE_SCALE,
			similarity_threshold: SIMILARITY_THRESHOLD,
			placement: QueryPlacement::default(),
			placement_neighbors: PLACEMENT_NEIGHBORS,
			model_load_timeout_secs: MODEL_LOAD_TIMEOUT_SECS,
			embed_timeout_secs: EMBED_TIMEOUT_SECS,
		}
	}
}

impl PipelineConfig {
	/// Load from a JSON file; missing fields keep their defaults
	pub fn load(path: &Path) -> Result<Self> {
		let content = fs::read_to_string(path)
			.with_context(|| format!("Failed to read config: {}", path.display()))?;
		serde_json::from_str(&content)
			.with_context(|| format!("Failed to parse config: {}", path.display()))
	}

	pub fn model_load_timeout(&self) -> Duration {
		duration_from_secs(self.model_load_timeout_secs)
	}

	pub fn embed_timeout(&self) -> Duration {
		duration_from_secs(self.embed_timeout_secs)
	}
}

fn duration_from_secs(secs: f64) -> Duration {
	if secs.is_finite() && secs > 0.0 {
		Duration::from_secs_f64(secs)
	} else {
		Duration::ZERO
	}
}

/// Get models directory (explicit path, GALAXY_MODELS_DIR, or `models/` next to the executable)
pub fn models_dir(custom: Option<&Path>) -> Option<PathBuf> {
	if let Some(custom) = custom {
		crate::ui::debug(&format!("Using custom model dir: {}", custom.display()));
		return Some(custom.to_path_buf());
	}

	if let Ok(env_path) = std::env::var(MODELS_DIR_ENV) {
		let path = PathBuf::from(&env_path);
		if path.is_dir() {
			crate::ui::debug(&format!("Using {}: {}", MODELS_DIR_ENV, env_path));
			return Some(path);
		}
	}

	if let Ok(exe) = std::env::current_exe() {
		if let Some(dir) = exe.parent() {
			let models = dir.join("models");
			if models.is_dir() {
				crate::ui::debug(&format!("Found models at: {}", models.display()));
				return Some(models);
			}
		}
	}

	None
}

pub fn model_path(models_dir: &Path, model_id: &str) -> PathBuf {
	models_dir.join(model_id).join(MODEL_FILE)
}

pub fn tokenizer_path(models_dir: &Path, model_id: &str) -> PathBuf {
	models_dir.join(model_id).join(TOKENIZER)
}
