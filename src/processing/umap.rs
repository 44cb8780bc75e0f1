//! UMAP manifold embedding for the 3D layout
//!
//! The neighbor graph and its optimization come from `umap-rs`. kNN and the
//! initial layout are computed here, and the optimizer is stepped in chunks
//! so the deadline can be checked between them.

use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use ndarray::Array2;
use rand::Rng;
use rayon::prelude::*;
use thiserror::Error;
use umap_rs::{EuclideanMetric, GraphParams, ManifoldParams, Metric, OptimizationParams, Optimizer, Umap, UmapConfig};

use crate::config::ManifoldConfig;
use crate::core::Embedding;
use crate::ui;

/// Epochs run between two deadline checks
const EPOCH_CHUNK: usize = 10;

/// Smallest batch the graph can be built for (`n_samples > n_neighbors >= 2`)
const MIN_SAMPLES: usize = 3;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ManifoldError {
	#[error("need at least 3 points, got {0}")]
	TooFewPoints(usize),

	#[error("min_dist {min_dist} must be between 0 and spread {spread}")]
	InvalidCurve { min_dist: f32, spread: f32 },

	#[error("timed out at epoch {epoch}/{n_epochs}")]
	TimedOut { epoch: usize, n_epochs: usize },

	#[error("optimizer aborted: {0}")]
	Aborted(String),

	#[error("layout contains NaN or infinite values")]
	NonFinite,
}

/// Reduce embeddings to `n_components` dimensions with UMAP.
///
/// `deadline` is checked after the graph is built and then every
/// [`EPOCH_CHUNK`] epochs; passing it aborts with [`ManifoldError::TimedOut`]
/// so the caller can fall back. `rng` seeds the initial layout only.
pub fn reduce_embeddings<R: Rng + ?Sized>(
	embeddings: &[Embedding],
	n_components: usize,
	config: &ManifoldConfig,
	deadline: Instant,
	rng: &mut R,
) -> Result<Array2<f32>, ManifoldError> {
	let n_samples = embeddings.len();
	if n_samples < MIN_SAMPLES {
		return Err(ManifoldError::TooFewPoints(n_samples));
	}
	if !(config.min_dist >= 0.0 && config.min_dist <= config.spread) {
		return Err(ManifoldError::InvalidCurve {
			min_dist: config.min_dist,
			spread: config.spread,
		});
	}

	let n_neighbors = config.n_neighbors(n_samples).clamp(2, n_samples - 1);
	let n_epochs = config.n_epochs(n_samples).max(1);
	let n_features = embeddings[0].dim();

	ui::debug(&format!(
		"UMAP: {} points, {}D -> {}D, neighbors={}, epochs={}, min_dist={}, spread={}",
		n_samples, n_features, n_components, n_neighbors, n_epochs, config.min_dist, config.spread
	));

	let mut data = Array2::<f32>::zeros((n_samples, n_features));
	for (mut row, emb) in data.rows_mut().into_iter().zip(embeddings) {
		for (dst, &src) in row.iter_mut().zip(emb.as_slice()) {
			*dst = src;
		}
	}

	let (knn_indices, knn_distances) = compute_knn(embeddings, n_neighbors);

	let mut knn_indices_array = Array2::<u32>::zeros((n_samples, n_neighbors));
	let mut knn_dists_array = Array2::<f32>::zeros((n_samples, n_neighbors));
	for i in 0..n_samples {
		for j in 0..n_neighbors {
			knn_indices_array[[i, j]] = knn_indices[i][j] as u32;
			knn_dists_array[[i, j]] = knn_distances[i][j];
		}
	}

	let init = initialize_embedding(n_samples, n_components, config.init_range, rng);
	let umap_config = umap_config(config, n_components, n_neighbors, n_epochs);

	// umap-rs reports bad input by panicking
	let embedding = panic::catch_unwind(AssertUnwindSafe(|| {
		let umap = Umap::new(umap_config.clone());
		let manifold = umap.learn_manifold(data.view(), knn_indices_array.view(), knn_dists_array.view());

		let metric = EuclideanMetric;
		let mut optimizer = Optimizer::new(manifold, init, n_epochs, &umap_config, metric.metric_type());

		while optimizer.remaining_epochs() > 0 {
			if Instant::now() >= deadline {
				return Err(ManifoldError::TimedOut {
					epoch: optimizer.current_epoch(),
					n_epochs,
				});
			}
			optimizer.step_epochs(optimizer.remaining_epochs().min(EPOCH_CHUNK), &metric);
		}

		Ok(optimizer.into_fitted(umap_config).into_embedding())
	}))
	.map_err(|payload| ManifoldError::Aborted(panic_message(payload.as_ref())))??;

	if embedding.iter().any(|v| !v.is_finite()) {
		return Err(ManifoldError::NonFinite);
	}

	Ok(embedding)
}

fn umap_config(config: &ManifoldConfig, n_components: usize, n_neighbors: usize, n_epochs: usize) -> UmapConfig {
	UmapConfig {
		n_components,
		manifold: ManifoldParams {
			min_dist: config.min_dist,
			spread: config.spread,
			..Default::default()
		},
		graph: GraphParams {
			n_neighbors,
			..Default::default()
		},
		optimization: OptimizationParams {
			n_epochs: Some(n_epochs),
			learning_rate: config.learning_rate,
			negative_sample_rate: config.negative_sample_rate,
			..Default::default()
		},
	}
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
	if let Some(s) = payload.downcast_ref::<&str>() {
		s.to_string()
	} else if let Some(s) = payload.downcast_ref::<String>() {
		s.clone()
	} else {
		"unknown panic".to_string()
	}
}

type KnnResult = (Vec<Vec<usize>>, Vec<Vec<f32>>);

/// Compute K-nearest neighbors using brute force cosine distance
fn compute_knn(embeddings: &[Embedding], k: usize) -> KnnResult {
	let n_samples = embeddings.len();

	ui::debug(&format!("Computing KNN (brute force) for {} samples, k={}", n_samples, k));

	let results: Vec<(Vec<usize>, Vec<f32>)> = (0..n_samples)
		.into_par_iter()
		.map(|i| {
			let mut distances: Vec<(usize, f32)> = (0..n_samples)
				.filter(|&j| i != j)
				.map(|j| (j, (1.0 - embeddings[i].similarity(&embeddings[j])).max(0.0)))
				.collect();

			distances.sort_by(|a, b| a.1.total_cmp(&b.1));
			distances.truncate(k);

			distances.into_iter().unzip()
		})
		.collect();

	results.into_iter().unzip()
}

/// Initialize embedding with random values in `[-range, range]`
fn initialize_embedding<R: Rng + ?Sized>(
	n_samples: usize,
	n_components: usize,
	range: f32,
	rng: &mut R,
) -> Array2<f32> {
	let range = if range.is_finite() && range > 0.0 { range } else { 10.0 };
	let mut init = Array2::<f32>::zeros((n_samples, n_components));
	for v in init.iter_mut() {
		*v = rng.random_range(-range..range);
	}
	init
}

#[cfg(test)]
mod tests {
	use super::*;
	use rand::rngs::StdRng;
	use rand::SeedableRng;
	use std::time::Duration;

	fn line(n: usize) -> Vec<Embedding> {
		(0..n)
			.map(|i| Embedding::raw(vec![i as f32, 1.0, (i * i) as f32 * 0.1]))
			.collect()
	}

	#[test]
	fn knn_orders_by_cosine_distance() {
		let embeddings = vec![
			Embedding::raw(vec![1.0, 0.0]),
			Embedding::raw(vec![0.9, 0.1]),
			Embedding::raw(vec![0.0, 1.0]),
			Embedding::raw(vec![-1.0, 0.0]),
		];
		let (indices, distances) = compute_knn(&embeddings, 2);

		assert_eq!(indices[0], vec![1, 2]);
		assert!(distances[0][0] < distances[0][1]);
		assert!(indices.iter().enumerate().all(|(i, row)| !row.contains(&i)));
	}

	#[test]
	fn init_stays_in_range() {
		let mut rng = StdRng::seed_from_u64(3);
		let init = initialize_embedding(50, 3, 10.0, &mut rng);
		assert_eq!(init.dim(), (50, 3));
		assert!(init.iter().all(|v| (-10.0..10.0).contains(v)));
	}

	#[test]
	fn config_maps_onto_umap_params() {
		let config = ManifoldConfig::default();
		let umap = umap_config(&config, 3, 4, 120);

		assert_eq!(umap.n_components, 3);
		assert_eq!(umap.graph.n_neighbors, 4);
		assert_eq!(umap.optimization.n_epochs, Some(120));
		assert_eq!(umap.manifold.min_dist, config.min_dist);
		assert_eq!(umap.manifold.spread, config.spread);
		assert_eq!(umap.optimization.negative_sample_rate, config.negative_sample_rate);
	}

	#[test]
	fn expired_deadline_times_out() {
		let mut rng = StdRng::seed_from_u64(7);
		let deadline = Instant::now();

		let result = reduce_embeddings(&line(10), 3, &ManifoldConfig::default(), deadline, &mut rng);
		assert!(matches!(result, Err(ManifoldError::TimedOut { epoch: 0, .. })));
	}

	#[test]
	fn tiny_batches_are_rejected() {
		let mut rng = StdRng::seed_from_u64(1);
		let deadline = Instant::now() + Duration::from_secs(5);
		let result = reduce_embeddings(&line(2), 3, &ManifoldConfig::default(), deadline, &mut rng);
		assert_eq!(result.unwrap_err(), ManifoldError::TooFewPoints(2));
	}

	#[test]
	fn bad_curve_is_rejected_before_fitting() {
		let mut rng = StdRng::seed_from_u64(1);
		let deadline = Instant::now() + Duration::from_secs(5);
		let config = ManifoldConfig {
			min_dist: 4.0,
			spread: 1.0,
			..ManifoldConfig::default()
		};
		let result = reduce_embeddings(&line(10), 3, &config, deadline, &mut rng);
		assert!(matches!(result, Err(ManifoldError::InvalidCurve { .. })));
	}

	#[test]
	fn three_points_get_a_layout() {
		let mut rng = StdRng::seed_from_u64(2);
		let deadline = Instant::now() + Duration::from_secs(30);
		let layout = reduce_embeddings(&line(3), 3, &ManifoldConfig::default(), deadline, &mut rng).unwrap();
		assert_eq!(layout.dim(), (3, 3));
		assert!(layout.iter().all(|v| v.is_finite()));
	}
}
