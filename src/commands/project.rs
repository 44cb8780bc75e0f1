//! Project command - reduce precomputed vectors to normalized 3D

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fs;
use std::path::Path;

use super::export::{self, ProjectionExport};
use super::Options;
use crate::core::Embedding;
use crate::processing::{build_layout, Normalizer, Projector};
use crate::ui;

pub fn run(opts: &Options, embeddings: &Path, output: Option<&Path>) -> Result<()> {
	let config = opts.pipeline_config()?;
	let batch = read_vectors(embeddings)?;
	ui::info(&format!("Projecting {} vectors", batch.len()));

	let mut rng = match opts.seed {
		Some(seed) => StdRng::seed_from_u64(seed),
		None => StdRng::from_os_rng(),
	};

	let projector = Projector::new(config.projection.clone());
	let normalizer = Normalizer::new(config.scale);
	let (layout, method) = build_layout(&batch, &projector, &normalizer, &mut rng)?;

	ui::success(&format!("Projected {} points via {}", layout.len(), method.as_str()));
	export::write_json(&ProjectionExport::new(layout.points(), method.as_str(), layout.scale()), output)
}

/// JSON array of number arrays. `null` entries (JSON has no NaN) are read
/// as NaN so the projector rejects them.
pub fn read_vectors(path: &Path) -> Result<Vec<Embedding>> {
	let content =
		fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
	let rows: Vec<Vec<Option<f32>>> = serde_json::from_str(&content)
		.with_context(|| format!("Expected a JSON array of number arrays in {}", path.display()))?;

	Ok(rows
		.into_iter()
		.map(|row| Embedding::raw(row.into_iter().map(|v| v.unwrap_or(f32::NAN)).collect()))
		.collect())
}
