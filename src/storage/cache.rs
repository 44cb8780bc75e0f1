//! On-disk embedding cache (MessagePack, one file per batch)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::{CACHE_DIR, CACHE_EXT};
use crate::core::{hash::BatchKey, Embedding};
use crate::ui;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Serialize, Deserialize)]
pub struct CachedBatch {
	version: String,
	model_id: String,
	key: String,
	dim: usize,
	embeddings: Vec<Vec<f32>>,
}

impl CachedBatch {
	pub fn new(model_id: &str, key: &BatchKey, embeddings: &[Embedding]) -> Self {
		Self {
			version: VERSION.to_string(),
			model_id: model_id.to_string(),
			key: key.as_str().to_string(),
			dim: embeddings.first().map(Embedding::dim).unwrap_or(0),
			embeddings: embeddings.iter().map(|e| e.as_slice().to_vec()).collect(),
		}
	}

	pub fn is_current_version(&self) -> bool {
		self.version == VERSION
	}

	pub fn embeddings(&self) -> Vec<Embedding> {
		self.embeddings.iter().cloned().map(Embedding::raw).collect()
	}
}

/// Embeddings keyed by model and texts, stored under a `.galaxy` directory
#[derive(Debug, Clone)]
pub struct EmbeddingCache {
	dir: PathBuf,
}

impl EmbeddingCache {
	pub fn new(dir: impl Into<PathBuf>) -> Self {
		Self { dir: dir.into() }
	}

	/// Cache directory next to an input file
	pub fn beside(input: &Path) -> Self {
		let parent = input.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
		Self::new(parent.join(CACHE_DIR))
	}

	pub fn dir(&self) -> &Path {
		&self.dir
	}

	pub fn path(&self, key: &BatchKey) -> PathBuf {
		self.dir.join(format!("{}.{}", key.as_str(), CACHE_EXT))
	}

	/// Cached embeddings for exactly these texts, or `None` when missing,
	/// stale or unreadable
	pub fn load(&self, model_id: &str, texts: &[String]) -> Option<Vec<Embedding>> {
		let key = BatchKey::compute(model_id, texts);
		let path = self.path(&key);
		if !path.exists() {
			return None;
		}

		let cached = match read(&path) {
			Ok(cached) => cached,
			Err(e) => {
				ui::warn(&format!("Ignoring unreadable cache {}: {:#}", path.display(), e));
				return None;
			}
		};

		if !cached.is_current_version() {
			ui::debug(&format!("Cache {} is from version {}", key.short(), cached.version));
			return None;
		}
		if cached.model_id != model_id || cached.key != key.as_str() || cached.embeddings.len() != texts.len() {
			ui::debug(&format!("Cache {} does not match this batch", key.short()));
			return None;
		}

		let embeddings = cached.embeddings();
		if embeddings.iter().any(|e| e.dim() != cached.dim || !e.is_finite()) {
			ui::warn(&format!("Ignoring corrupt cache {}", path.display()));
			return None;
		}

		ui::debug(&format!("Cache hit {} ({} embeddings)", key.short(), embeddings.len()));
		Some(embeddings)
	}

	pub fn save(&self, model_id: &str, texts: &[String], embeddings: &[Embedding]) -> Result<PathBuf> {
		let key = BatchKey::compute(model_id, texts);
		let path = self.path(&key);

		fs::create_dir_all(&self.dir)
			.with_context(|| format!("Failed to create {}", self.dir.display()))?;

		let bytes = rmp_serde::to_vec(&CachedBatch::new(model_id, &key, embeddings))
			.context("Failed to serialize embeddings")?;
		fs::write(&path, bytes).with_context(|| format!("Failed to write {}", path.display()))?;

		Ok(path)
	}

	/// Remove every cached batch. Returns how many files were deleted.
	pub fn clear(&self) -> Result<usize> {
		if !self.dir.is_dir() {
			return Ok(0);
		}

		let mut removed = 0;
		for entry in fs::read_dir(&self.dir).context("Failed to read cache directory")? {
			let path = entry?.path();
			if path.extension().is_some_and(|ext| ext == CACHE_EXT) {
				fs::remove_file(&path).with_context(|| format!("Failed to remove {}", path.display()))?;
				removed += 1;
			}
		}

		Ok(removed)
	}
}

fn read(path: &Path) -> Result<CachedBatch> {
	let bytes = fs::read(path).context("Failed to read cache file")?;
	rmp_serde::from_slice(&bytes).context("Failed to deserialize cache file")
}
