//! Embedding vectors as produced by the text model

use serde::{Deserialize, Serialize};

use super::vector;
use crate::error::{GalaxyError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Embedding(Vec<f32>);

impl Embedding {
	/// Wrap raw model output without altering it
	pub fn raw(data: Vec<f32>) -> Self {
		Self(data)
	}

	pub fn as_slice(&self) -> &[f32] {
		&self.0
	}

	pub fn dim(&self) -> usize {
		self.0.len()
	}

	pub fn is_finite(&self) -> bool {
		vector::is_finite(&self.0)
	}

	/// Cosine similarity [-1.0, 1.0]
	pub fn similarity(&self, other: &Self) -> f32 {
		vector::cosine_similarity(&self.0, &other.0)
	}

	pub fn distance(&self, other: &Self) -> f32 {
		vector::euclidean_distance(&self.0, &other.0)
	}
}

impl From<Vec<f32>> for Embedding {
	fn from(data: Vec<f32>) -> Self {
		Self::raw(data)
	}
}

/// Checks the batch invariants: one dimension for every vector, every
/// component finite. Returns the shared dimension (0 for an empty batch).
pub fn validate_batch(batch: &[Embedding]) -> Result<usize> {
	let Some(first) = batch.first() else {
		return Ok(0);
	};

	let dim = first.dim();
	if dim == 0 {
		return Err(GalaxyError::InvalidInput("embedding has zero dimensions".into()));
	}

	for (index, emb) in batch.iter().enumerate() {
		if emb.dim() != dim {
			return Err(GalaxyError::DimensionMismatch {
				expected: dim,
				found: emb.dim(),
				index,
			});
		}
		if !emb.is_finite() {
			return Err(GalaxyError::InvalidInput(format!(
				"embedding {} contains NaN or infinite values",
				index
			)));
		}
	}

	Ok(dim)
}
