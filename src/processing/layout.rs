//! Projected + normalized coordinates for one embedding batch

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::normalize::{Bounds, Normalizer};
use super::projection::{Method, Projector};
use crate::core::{Embedding, Point3};
use crate::error::Result;

/// Display-ready coordinates plus what is needed to place new points
/// into the same frame later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layout {
	raw: Vec<Point3>,
	bounds: Option<Bounds>,
	points: Vec<Point3>,
	scale: f32,
}

impl Layout {
	/// Normalize already projected points (full recompute)
	pub fn from_projected(raw: Vec<Point3>, normalizer: &Normalizer) -> Self {
		let (bounds, points) = match normalizer.fit(&raw) {
			Some((bounds, points)) => (Some(bounds), points),
			None => (None, Vec::new()),
		};

		Self {
			raw,
			bounds,
			points,
			scale: normalizer.scale(),
		}
	}

	/// Layout whose bounds were computed over a larger set than `raw`
	/// (the batch plus a query that was split off afterwards).
	pub(crate) fn from_parts(raw: Vec<Point3>, bounds: Bounds, points: Vec<Point3>, scale: f32) -> Self {
		Self {
			raw,
			bounds: Some(bounds),
			points,
			scale,
		}
	}

	/// Normalized coordinates, index-aligned with the batch
	pub fn points(&self) -> &[Point3] {
		&self.points
	}

	/// Projector output before normalization
	pub fn raw(&self) -> &[Point3] {
		&self.raw
	}

	pub fn bounds(&self) -> Option<&Bounds> {
		self.bounds.as_ref()
	}

	pub fn scale(&self) -> f32 {
		self.scale
	}

	pub fn len(&self) -> usize {
		self.points.len()
	}

	pub fn is_empty(&self) -> bool {
		self.points.is_empty()
	}
}

/// Project and normalize a batch in one step
pub fn build_layout<R: Rng + ?Sized>(
	batch: &[Embedding],
	projector: &Projector,
	normalizer: &Normalizer,
	rng: &mut R,
) -> Result<(Layout, Method)> {
	let (raw, method) = projector.project_with_method(batch, rng)?;
	Ok((Layout::from_projected(raw, normalizer), method))
}
