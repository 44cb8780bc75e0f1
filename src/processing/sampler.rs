//! Projection of oversized batches through a representative sample
//!
//! Only a fixed-stride subset is projected. Every other vector copies the
//! position of its nearest sampled vector (Euclidean, in the original
//! space) plus a small jitter so that points do not stack exactly.

use rand::Rng;
use rayon::prelude::*;

use super::projection::Projector;
use crate::core::{Embedding, Point3};
use crate::error::Result;
use crate::ui;

/// Deterministic stride sample: `stride = max(1, n / sample_size)`,
/// at most `sample_size` indices, in input order.
pub fn sample_indices(n: usize, sample_size: usize) -> Vec<usize> {
	if n == 0 || sample_size == 0 {
		return Vec::new();
	}
	let stride = (n / sample_size).max(1);
	(0..n).step_by(stride).take(sample_size).collect()
}

/// Index (into `samples`) of the sampled vector closest to `v`
fn nearest_sample(v: &Embedding, vectors: &[Embedding], samples: &[usize]) -> usize {
	samples
		.iter()
		.enumerate()
		.map(|(slot, &idx)| (slot, v.distance(&vectors[idx])))
		.min_by(|a, b| a.1.total_cmp(&b.1))
		.map(|(slot, _)| slot)
		.unwrap_or(0)
}

/// Project `vectors` via a sample. Input must already be validated.
pub fn project_sampled<R: Rng + ?Sized>(
	projector: &Projector,
	vectors: &[Embedding],
	rng: &mut R,
) -> Result<Vec<Point3>> {
	let config = projector.config();
	let samples = sample_indices(vectors.len(), config.sample_size);
	if samples.is_empty() {
		return Ok(Vec::new());
	}

	let sampled: Vec<Embedding> = samples.iter().map(|&i| vectors[i].clone()).collect();
	let (sample_points, method) = projector.project_direct(&sampled, rng)?;
	ui::debug(&format!(
		"Projected {} samples with {:?}, placing {} remaining",
		samples.len(),
		method,
		vectors.len() - samples.len()
	));

	let mut is_sample = vec![None; vectors.len()];
	for (slot, &idx) in samples.iter().enumerate() {
		is_sample[idx] = Some(slot);
	}

	// Nearest-sample search is the expensive part; jitter is drawn sequentially
	// afterwards so the RNG stays single-threaded.
	let nearest: Vec<usize> = vectors
		.par_iter()
		.enumerate()
		.map(|(i, v)| match is_sample[i] {
			Some(slot) => slot,
			None => nearest_sample(v, vectors, &samples),
		})
		.collect();

	let jitter = config.sample_jitter.abs();
	let points = nearest
		.into_iter()
		.enumerate()
		.map(|(i, slot)| {
			let base = sample_points[slot];
			if is_sample[i].is_some() || jitter == 0.0 {
				return base;
			}
			[
				base[0] + rng.random_range(-jitter..=jitter),
				base[1] + rng.random_range(-jitter..=jitter),
				base[2] + rng.random_range(-jitter..=jitter),
			]
		})
		.collect();

	Ok(points)
}
