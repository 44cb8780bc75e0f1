//! Semantic search over an embedding batch

use rand::Rng;
use rayon::prelude::*;

use super::layout::Layout;
use super::normalize::Normalizer;
use super::projection::Projector;
use crate::config::QueryPlacement;
use crate::core::{Embedding, Point3, SimilarityResult};
use crate::error::{GalaxyError, Result};
use crate::ui;

/// Rank batch items by cosine similarity to `query`.
///
/// Only items scoring strictly above `threshold` are kept. Ordered by
/// descending score; ties keep input order.
pub fn rank(query: &Embedding, batch: &[Embedding], threshold: f32) -> Result<Vec<SimilarityResult>> {
	check_query(query, batch)?;

	let mut results: Vec<SimilarityResult> = batch
		.par_iter()
		.enumerate()
		.map(|(index, item)| SimilarityResult {
			index,
			score: query.similarity(item),
		})
		.filter(|r| r.score > threshold)
		.collect();

	// sort_by is stable, so equal scores stay in index order
	results.sort_by(|a, b| b.score.total_cmp(&a.score));
	Ok(results)
}

/// Where the query ended up, and the new layout if everything moved
#[derive(Debug, Clone)]
pub enum Placement {
	/// Existing points are unchanged
	Incremental { position: Point3 },
	/// The batch was re-projected together with the query
	Recompute { position: Point3, layout: Layout },
}

impl Placement {
	pub fn position(&self) -> Point3 {
		match self {
			Placement::Incremental { position } | Placement::Recompute { position, .. } => *position,
		}
	}
}

/// Positions a query vector in the galaxy according to a [`QueryPlacement`] mode
pub struct QueryPlacer<'a> {
	pub projector: &'a Projector,
	pub normalizer: &'a Normalizer,
	pub mode: QueryPlacement,
	/// Batch items averaged for incremental placement
	pub neighbors: usize,
}

impl QueryPlacer<'_> {
	pub fn place<R: Rng + ?Sized>(
		&self,
		layout: &Layout,
		batch: &[Embedding],
		query: &Embedding,
		rng: &mut R,
	) -> Result<Placement> {
		check_query(query, batch)?;

		match self.mode {
			QueryPlacement::Incremental => {
				let position = self.place_incremental(layout, batch, query);
				Ok(Placement::Incremental { position })
			}
			QueryPlacement::Recompute => self.place_recompute(batch, query, rng),
		}
	}

	/// Weighted mean of the raw positions of the most similar items, mapped
	/// through the layout's frozen bounds.
	fn place_incremental(&self, layout: &Layout, batch: &[Embedding], query: &Embedding) -> Point3 {
		let Some(bounds) = layout.bounds() else {
			return [0.0; 3];
		};

		let mut scored: Vec<(usize, f32)> = batch
			.iter()
			.enumerate()
			.map(|(i, item)| (i, query.similarity(item)))
			.collect();
		scored.sort_by(|a, b| b.1.total_cmp(&a.1));
		scored.truncate(self.neighbors.max(1));

		let total: f32 = scored.iter().map(|(_, s)| s.max(0.0)).sum();
		let weight = |s: f32| if total > 0.0 { s.max(0.0) / total } else { 1.0 / scored.len() as f32 };

		let mut raw = [0.0f32; 3];
		for &(i, s) in &scored {
			let w = weight(s);
			for (axis, v) in raw.iter_mut().enumerate() {
				*v += layout.raw()[i][axis] * w;
			}
		}

		ui::debug(&format!(
			"Query placed among {} neighbors (best similarity {:.3})",
			scored.len(),
			scored.first().map(|(_, s)| *s).unwrap_or(0.0)
		));

		self.normalizer.place(bounds, &raw)
	}

	fn place_recompute<R: Rng + ?Sized>(
		&self,
		batch: &[Embedding],
		query: &Embedding,
		rng: &mut R,
	) -> Result<Placement> {
		let mut extended = Vec::with_capacity(batch.len() + 1);
		extended.extend_from_slice(batch);
		extended.push(query.clone());

		let mut raw = self.projector.project(&extended, rng)?;
		let Some((bounds, mut points)) = self.normalizer.fit(&raw) else {
			return Err(GalaxyError::ProjectionFailure("empty projection for non-empty batch".into()));
		};

		let position = points.pop().unwrap_or([0.0; 3]);
		raw.pop();

		Ok(Placement::Recompute {
			position,
			layout: Layout::from_parts(raw, bounds, points, self.normalizer.scale()),
		})
	}
}

fn check_query(query: &Embedding, batch: &[Embedding]) -> Result<()> {
	if !query.is_finite() {
		return Err(GalaxyError::InvalidInput(
			"query embedding contains NaN or infinite values".into(),
		));
	}
	if let Some(first) = batch.first() {
		if first.dim() != query.dim() {
			return Err(GalaxyError::DimensionMismatch {
				expected: first.dim(),
				found: query.dim(),
				index: batch.len(),
			});
		}
	}
	Ok(())
}
