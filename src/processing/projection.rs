//! Dimensionality reduction to 3D
//!
//! Small and medium batches go through the manifold embedding. Anything that
//! fails, times out or produces non-finite coordinates falls back to a random
//! or variance projection, which always succeeds for finite input. Oversized
//! batches are handed to the sampler.

use std::time::Instant;

use ndarray::{Array2, ArrayView1, Axis};
use rand::Rng;

use super::{sampler, umap};
use crate::config::{Fallback, ProjectionConfig, TARGET_DIM};
use crate::core::{is_finite_point, validate_batch, vector, Embedding, Point3};
use crate::error::{GalaxyError, Result};
use crate::ui;

/// Which algorithm produced a projection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
	Manifold,
	RandomProjection,
	VarianceProjection,
	Sampled,
}

impl Method {
	pub fn as_str(&self) -> &'static str {
		match self {
			Method::Manifold => "manifold",
			Method::RandomProjection => "random-projection",
			Method::VarianceProjection => "variance-projection",
			Method::Sampled => "sampled",
		}
	}
}

#[derive(Debug, Clone, Default)]
pub struct Projector {
	config: ProjectionConfig,
}

impl Projector {
	pub fn new(config: ProjectionConfig) -> Self {
		Self { config }
	}

	pub fn config(&self) -> &ProjectionConfig {
		&self.config
	}

	/// Project a batch to 3D, index-aligned with the input.
	///
	/// Rejects the whole batch with [`GalaxyError::InvalidInput`] or
	/// [`GalaxyError::DimensionMismatch`] if any vector is defective; never
	/// returns a partially projected result.
	pub fn project<R: Rng + ?Sized>(&self, vectors: &[Embedding], rng: &mut R) -> Result<Vec<Point3>> {
		self.project_with_method(vectors, rng).map(|(points, _)| points)
	}

	pub fn project_with_method<R: Rng + ?Sized>(
		&self,
		vectors: &[Embedding],
		rng: &mut R,
	) -> Result<(Vec<Point3>, Method)> {
		validate_batch(vectors)?;

		if vectors.is_empty() {
			return Ok((Vec::new(), Method::Manifold));
		}

		if vectors.len() > self.config.large_input_threshold {
			ui::debug(&format!(
				"{} vectors exceed threshold {}, sampling {}",
				vectors.len(),
				self.config.large_input_threshold,
				self.config.sample_size
			));
			let points = sampler::project_sampled(self, vectors, rng)?;
			return Ok((points, Method::Sampled));
		}

		self.project_direct(vectors, rng)
	}

	/// Manifold embedding with fallback, no sampling. Input must already be validated.
	pub(crate) fn project_direct<R: Rng + ?Sized>(
		&self,
		vectors: &[Embedding],
		rng: &mut R,
	) -> Result<(Vec<Point3>, Method)> {
		let deadline = Instant::now() + self.config.timeout();

		match umap::reduce_embeddings(vectors, TARGET_DIM, &self.config.manifold, deadline, rng) {
			Ok(embedding) => {
				let points: Vec<Point3> = embedding
					.outer_iter()
					.map(|row| [row[0], row[1], row[2]])
					.collect();

				if points.len() == vectors.len() && points.iter().all(is_finite_point) {
					return Ok((points, Method::Manifold));
				}
				ui::warn("Manifold layout was invalid, using fallback projection");
			}
			Err(umap::ManifoldError::TooFewPoints(n)) => {
				ui::debug(&format!("{} point(s) is too few for a manifold, using fallback projection", n));
			}
			Err(e) => {
				ui::warn(&format!("Manifold projection failed ({}), using fallback projection", e));
			}
		}

		self.fallback(vectors, rng)
	}

	fn fallback<R: Rng + ?Sized>(&self, vectors: &[Embedding], rng: &mut R) -> Result<(Vec<Point3>, Method)> {
		match self.config.fallback {
			Fallback::Random => Ok((random_projection(vectors, TARGET_DIM, rng)?, Method::RandomProjection)),
			Fallback::Variance => Ok((variance_projection(vectors, TARGET_DIM)?, Method::VarianceProjection)),
		}
	}
}

/// Project through a random `target_dim x D` matrix with L2-normalized rows.
///
/// Entries are drawn uniformly from [-1, 1]. For finite input the result is
/// finite; anything else is reported as a projection failure.
pub fn random_projection<R: Rng + ?Sized>(
	vectors: &[Embedding],
	target_dim: usize,
	rng: &mut R,
) -> Result<Vec<Point3>> {
	if vectors.is_empty() {
		return Ok(Vec::new());
	}
	if target_dim != TARGET_DIM {
		return Err(GalaxyError::ProjectionFailure(format!(
			"random projection targets {}D, asked for {}D",
			TARGET_DIM, target_dim
		)));
	}

	let source_dim = vectors[0].dim();
	let matrix = projection_matrix(target_dim, source_dim, rng);

	let points: Vec<Point3> = vectors
		.iter()
		.map(|v| {
			let projected = matrix.dot(&ArrayView1::from(v.as_slice()));
			[projected[0], projected[1], projected[2]]
		})
		.collect();

	if points.iter().all(is_finite_point) {
		Ok(points)
	} else {
		Err(GalaxyError::ProjectionFailure(
			"random projection produced non-finite values".into(),
		))
	}
}

/// Keep the `target_dim` input dimensions with the highest variance.
///
/// Vectors are centered on the batch mean first. Ties go to the lower
/// dimension index, and inputs with fewer than `target_dim` dimensions are
/// padded with zeros. Deterministic: no randomness involved.
pub fn variance_projection(vectors: &[Embedding], target_dim: usize) -> Result<Vec<Point3>> {
	if vectors.is_empty() {
		return Ok(Vec::new());
	}
	if target_dim != TARGET_DIM {
		return Err(GalaxyError::ProjectionFailure(format!(
			"variance projection targets {}D, asked for {}D",
			TARGET_DIM, target_dim
		)));
	}

	let source_dim = vectors[0].dim();
	let mut data = Array2::<f32>::zeros((vectors.len(), source_dim));
	for (mut row, v) in data.rows_mut().into_iter().zip(vectors) {
		for (dst, &src) in row.iter_mut().zip(v.as_slice()) {
			*dst = src;
		}
	}

	let Some(mean) = data.mean_axis(Axis(0)) else {
		return Ok(Vec::new());
	};
	let centered = &data - &mean;
	let variance = centered.mapv(|x| x * x).sum_axis(Axis(0)) / vectors.len() as f32;

	let mut dims: Vec<usize> = (0..source_dim).collect();
	dims.sort_by(|&a, &b| variance[b].total_cmp(&variance[a]).then(a.cmp(&b)));
	dims.truncate(target_dim);

	let points: Vec<Point3> = centered
		.outer_iter()
		.map(|row| {
			let mut point = [0.0f32; TARGET_DIM];
			for (slot, &d) in point.iter_mut().zip(&dims) {
				*slot = row[d];
			}
			point
		})
		.collect();

	if points.iter().all(is_finite_point) {
		Ok(points)
	} else {
		Err(GalaxyError::ProjectionFailure(
			"variance projection produced non-finite values".into(),
		))
	}
}

/// Random matrix with rows normalized to unit length
fn projection_matrix<R: Rng + ?Sized>(rows: usize, cols: usize, rng: &mut R) -> Array2<f32> {
	let mut matrix = Array2::<f32>::zeros((rows, cols));

	for mut row in matrix.rows_mut() {
		let raw = vector::random_vector(cols, 1.0, rng);
		let unit = vector::l2_normalize(&raw, rng);
		for (dst, src) in row.iter_mut().zip(unit) {
			*dst = src;
		}
	}

	matrix
}
