//! Display-side data: 3D points, search hits and the active query

use serde::{Deserialize, Serialize};

use super::Embedding;

/// A projected or normalized 3D coordinate
pub type Point3 = [f32; 3];

pub fn is_finite_point(p: &Point3) -> bool {
	p.iter().all(|v| v.is_finite())
}

/// One ranked search hit
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimilarityResult {
	/// Index into the embedding batch (and the input texts)
	pub index: usize,
	/// Cosine similarity [-1.0, 1.0]
	pub score: f32,
}

/// The active search query and where it sits in the galaxy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryPoint {
	pub text: String,
	pub embedding: Embedding,
	pub position: Point3,
}
