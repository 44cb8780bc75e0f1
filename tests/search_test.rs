// Similarity ranking and query placement

use galaxy::config::{PipelineConfig, QueryPlacement};
use galaxy::core::{is_finite_point, Embedding};
use galaxy::pipeline::Galaxy;
use galaxy::processing::{build_layout, rank, Normalizer, Projector};
use galaxy::GalaxyError;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn emb(v: &[f32]) -> Embedding {
	Embedding::raw(v.to_vec())
}

fn make_galaxy(n: usize, seed: u64) -> (Galaxy, StdRng) {
	let mut rng = StdRng::seed_from_u64(seed);
	let embeddings: Vec<Embedding> = (0..n)
		.map(|_| Embedding::raw((0..8).map(|_| rng.random_range(-1.0..1.0)).collect()))
		.collect();
	let texts = (0..n).map(|i| format!("snippet {}", i)).collect();

	let (layout, method) =
		build_layout(&embeddings, &Projector::default(), &Normalizer::default(), &mut rng).unwrap();
	(Galaxy::new("test-model", texts, embeddings, layout, method), rng)
}

#[test]
fn test_rank_sorted_and_thresholded() {
	let batch = vec![
		emb(&[0.0, 1.0]),
		emb(&[0.9, 0.1]),
		emb(&[1.0, 0.0]),
		emb(&[-1.0, 0.0]),
		emb(&[0.5, 0.5]),
	];

	let results = rank(&emb(&[1.0, 0.0]), &batch, 0.3).unwrap();
	let indices: Vec<usize> = results.iter().map(|r| r.index).collect();
	assert_eq!(indices, vec![2, 1, 4]);

	assert!(results[0].score > 0.999);
	assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
	assert!(results.iter().all(|r| r.score > 0.3));
}

#[test]
fn test_rank_threshold_is_strict() {
	let batch = vec![emb(&[1.0, 0.0]), emb(&[2.0, 0.0])];
	let results = rank(&emb(&[1.0, 0.0]), &batch, 1.0).unwrap();
	assert!(results.is_empty());
}

#[test]
fn test_rank_ties_keep_input_order() {
	let batch = vec![emb(&[1.0, 0.0]), emb(&[0.0, 1.0]), emb(&[1.0, 0.0])];
	let results = rank(&emb(&[1.0, 0.0]), &batch, 0.3).unwrap();
	assert_eq!(results.len(), 2);
	assert_eq!(results[0].index, 0);
	assert_eq!(results[1].index, 2);
}

#[test]
fn test_rank_rejects_bad_query() {
	let batch = vec![emb(&[1.0, 0.0, 0.0])];

	assert!(matches!(
		rank(&emb(&[f32::NAN, 0.0, 0.0]), &batch, 0.3),
		Err(GalaxyError::InvalidInput(_))
	));
	assert_eq!(
		rank(&emb(&[1.0, 0.0]), &batch, 0.3).unwrap_err(),
		GalaxyError::DimensionMismatch {
			expected: 3,
			found: 2,
			index: 1
		}
	);
}

#[test]
fn test_rank_empty_batch() {
	assert!(rank(&emb(&[1.0]), &[], 0.3).unwrap().is_empty());
}

#[test]
fn test_incremental_search_keeps_points() {
	let (mut galaxy, mut rng) = make_galaxy(30, 3);
	let before = galaxy.points().to_vec();
	let query = galaxy.embeddings()[7].clone();

	let config = PipelineConfig::default();
	let results = galaxy.search("query", query, &config, &mut rng).unwrap().to_vec();

	assert_eq!(galaxy.points(), before.as_slice());
	assert_eq!(results[0].index, 7);
	assert!(results[0].score > 0.999);

	let position = galaxy.query().unwrap().position;
	assert!(is_finite_point(&position));
	// weighted mean of existing raw points stays inside their bounds
	assert!(position.iter().all(|v| v.abs() <= 50.0 + 1e-3));
}

#[test]
fn test_recompute_search_replaces_layout() {
	let (mut galaxy, mut rng) = make_galaxy(25, 8);
	let query = galaxy.embeddings()[0].clone();

	let config = PipelineConfig {
		placement: QueryPlacement::Recompute,
		..PipelineConfig::default()
	};
	galaxy.search("query", query, &config, &mut rng).unwrap();

	assert_eq!(galaxy.points().len(), 25);
	assert!(galaxy.points().iter().all(is_finite_point));
	let position = galaxy.query().unwrap().position;
	assert!(position.iter().all(|v| v.is_finite() && v.abs() <= 50.0 + 1e-3));
}

#[test]
fn test_failed_search_leaves_state() {
	let (mut galaxy, mut rng) = make_galaxy(10, 1);
	let config = PipelineConfig::default();

	let query = galaxy.embeddings()[2].clone();
	galaxy.search("first", query, &config, &mut rng).unwrap();
	let results = galaxy.results().to_vec();

	let err = galaxy.search("bad", emb(&[1.0, 2.0]), &config, &mut rng).unwrap_err();
	assert!(matches!(err, GalaxyError::DimensionMismatch { .. }));
	assert_eq!(galaxy.query().unwrap().text, "first");
	assert_eq!(galaxy.results(), results.as_slice());

	galaxy.clear_query();
	assert!(galaxy.query().is_none());
	assert!(galaxy.results().is_empty());
}
