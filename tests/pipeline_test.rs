// Embedding session and pipeline runs against an in-process embedder

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Result};
use galaxy::config::PipelineConfig;
use galaxy::core::{is_finite_point, Embedding};
use galaxy::models::{Embedder, EmbeddingSession};
use galaxy::pipeline::{Pipeline, Progress};
use galaxy::storage::EmbeddingCache;
use galaxy::GalaxyError;

const DIM: usize = 8;

#[derive(Default, Clone)]
struct Counters {
	loads: Arc<AtomicUsize>,
	embeds: Arc<AtomicUsize>,
}

#[derive(Default)]
struct FakeEmbedder {
	counters: Counters,
	load_delay: Duration,
	embed_delay: Duration,
	per_text_delay: Duration,
	fail_embed: bool,
	nan_output: bool,
}

/// Byte histogram folded into DIM buckets
fn fake_vector(text: &str) -> Vec<f32> {
	let mut v = vec![0.0f32; DIM];
	for (i, b) in text.bytes().enumerate() {
		v[(b as usize + i) % DIM] += 1.0;
	}
	v[0] += 0.5;
	v
}

impl Embedder for FakeEmbedder {
	fn load(&mut self, _model_id: &str, progress: &mut dyn FnMut(Progress)) -> Result<String> {
		self.counters.loads.fetch_add(1, Ordering::SeqCst);
		progress(Progress::new(30.0, "loading"));
		thread::sleep(self.load_delay);
		progress(Progress::new(10.0, "out of order"));
		progress(Progress::new(100.0, "ready"));
		Ok("fake".to_string())
	}

	fn embed(&mut self, texts: &[String], progress: &mut dyn FnMut(Progress)) -> Result<Vec<Embedding>> {
		self.counters.embeds.fetch_add(1, Ordering::SeqCst);
		thread::sleep(self.embed_delay);
		if self.fail_embed {
			bail!("inference exploded");
		}

		let mut out = Vec::new();
		for (i, text) in texts.iter().enumerate() {
			let mut v = fake_vector(text);
			if self.nan_output {
				v[0] = f32::NAN;
			}
			out.push(Embedding::raw(v));
			thread::sleep(self.per_text_delay);
			progress(Progress::new((i + 1) as f32 / texts.len() as f32 * 100.0, "embedding"));
		}
		Ok(out)
	}
}

fn texts(n: usize) -> Vec<String> {
	(0..n).map(|i| format!("note number {} about topic {}", i, i % 4)).collect()
}

fn loaded_pipeline(embedder: FakeEmbedder) -> Pipeline {
	let mut pipeline = Pipeline::new(EmbeddingSession::start(embedder), PipelineConfig::default()).with_seed(17);
	pipeline.load_model(|_| {}).unwrap();
	pipeline
}

#[test]
fn test_load_model_once() {
	let counters = Counters::default();
	let mut session = EmbeddingSession::start(FakeEmbedder {
		counters: counters.clone(),
		..FakeEmbedder::default()
	});

	let mut seen = Vec::new();
	let model = session
		.load_model("mini", Duration::from_secs(5), |p| seen.push(p.percentage))
		.unwrap();
	assert_eq!(model.model_id, "mini");
	assert_eq!(model.device, "fake");
	assert_eq!(seen, vec![30.0, 30.0, 100.0]);

	session.load_model("mini", Duration::from_secs(5), |_| {}).unwrap();
	assert_eq!(counters.loads.load(Ordering::SeqCst), 1);

	session.load_model("other", Duration::from_secs(5), |_| {}).unwrap();
	assert_eq!(counters.loads.load(Ordering::SeqCst), 2);
	assert_eq!(session.loaded().unwrap().model_id, "other");
}

#[test]
fn test_load_model_timeout() {
	let mut session = EmbeddingSession::start(FakeEmbedder {
		load_delay: Duration::from_millis(400),
		..FakeEmbedder::default()
	});

	let err = session.load_model("slow", Duration::from_millis(50), |_| {}).unwrap_err();
	assert!(matches!(err, GalaxyError::ModelTimeout(_)), "got {:?}", err);
	assert!(session.loaded().is_none());
}

#[test]
fn test_stopped_session_reports_worker_gone() {
	let mut session = EmbeddingSession::start(FakeEmbedder::default());
	session.stop();

	assert!(!session.is_running());
	assert_eq!(
		session.load_model("mini", Duration::from_secs(1), |_| {}).unwrap_err(),
		GalaxyError::WorkerGone
	);
}

#[test]
fn test_generate_produces_aligned_galaxy() {
	let mut pipeline = loaded_pipeline(FakeEmbedder::default());

	let mut progress = Vec::new();
	let galaxy = pipeline
		.generate(texts(12))
		.wait(|p| progress.push(p.percentage))
		.unwrap();

	assert_eq!(galaxy.len(), 12);
	assert_eq!(galaxy.embeddings().len(), 12);
	assert_eq!(galaxy.points().len(), 12);
	assert!(galaxy.points().iter().all(is_finite_point));
	assert!(galaxy.query().is_none());

	assert!(progress.windows(2).all(|w| w[0] <= w[1]), "{:?}", progress);
	assert_eq!(progress.last().copied(), Some(100.0));
}

#[test]
fn test_generate_rejects_empty_input() {
	let mut pipeline = loaded_pipeline(FakeEmbedder::default());
	let err = pipeline.generate(Vec::new()).wait(|_| {}).unwrap_err();
	assert!(matches!(err, GalaxyError::InvalidInput(_)));
}

#[test]
fn test_embedding_failure_surfaces() {
	let mut pipeline = loaded_pipeline(FakeEmbedder {
		fail_embed: true,
		..FakeEmbedder::default()
	});

	let err = pipeline.generate(texts(3)).wait(|_| {}).unwrap_err();
	match err {
		GalaxyError::EmbeddingFailure(msg) => assert!(msg.contains("inference exploded")),
		other => panic!("unexpected error: {:?}", other),
	}
}

#[test]
fn test_non_finite_embeddings_rejected() {
	let mut pipeline = loaded_pipeline(FakeEmbedder {
		nan_output: true,
		..FakeEmbedder::default()
	});

	let err = pipeline.generate(texts(3)).wait(|_| {}).unwrap_err();
	assert!(matches!(err, GalaxyError::EmbeddingFailure(_)), "got {:?}", err);
}

#[test]
fn test_new_run_cancels_previous() {
	let mut pipeline = loaded_pipeline(FakeEmbedder {
		embed_delay: Duration::from_millis(200),
		..FakeEmbedder::default()
	});

	let first = pipeline.generate(texts(5));
	let second = pipeline.generate(texts(6));
	assert!(first.is_cancelled());
	assert!(second.id() > first.id());

	assert_eq!(first.wait(|_| {}).unwrap_err(), GalaxyError::Cancelled);
	assert_eq!(second.wait(|_| {}).unwrap().len(), 6);
}

#[test]
fn test_explicit_cancel() {
	let mut pipeline = loaded_pipeline(FakeEmbedder {
		embed_delay: Duration::from_millis(100),
		..FakeEmbedder::default()
	});

	let run = pipeline.generate(texts(4));
	run.cancel();
	assert_eq!(run.wait(|_| {}).unwrap_err(), GalaxyError::Cancelled);
}

#[test]
fn test_pipeline_search() {
	let mut pipeline = loaded_pipeline(FakeEmbedder::default());
	let inputs = texts(10);
	let mut galaxy = pipeline.generate(inputs.clone()).wait(|_| {}).unwrap();
	let before = galaxy.points().to_vec();

	pipeline.search(&mut galaxy, &format!("  {}  ", inputs[3])).unwrap();

	let query = galaxy.query().unwrap();
	assert_eq!(query.text, inputs[3]);
	assert!(is_finite_point(&query.position));
	assert_eq!(galaxy.results()[0].index, 3);
	assert_eq!(galaxy.points(), before.as_slice());

	assert!(matches!(
		pipeline.search(&mut galaxy, "   "),
		Err(GalaxyError::InvalidInput(_))
	));
}

#[test]
fn test_cache_skips_second_embedding() {
	let dir = tempfile::tempdir().unwrap();
	let counters = Counters::default();
	let mut pipeline = loaded_pipeline(FakeEmbedder {
		counters: counters.clone(),
		..FakeEmbedder::default()
	})
	.with_cache(EmbeddingCache::new(dir.path()));

	let first = pipeline.generate(texts(8)).wait(|_| {}).unwrap();
	let second = pipeline.generate(texts(8)).wait(|_| {}).unwrap();

	assert_eq!(counters.embeds.load(Ordering::SeqCst), 1);
	assert_eq!(first.embeddings(), second.embeddings());
}

#[test]
fn test_queued_embed_waits_without_timing_out() {
	let mut session = EmbeddingSession::start(FakeEmbedder {
		per_text_delay: Duration::from_millis(100),
		..FakeEmbedder::default()
	});
	session.load_model("mini", Duration::from_secs(5), |_| {}).unwrap();

	let busy = session.handle().unwrap();
	let first = thread::spawn(move || busy.embed(texts(4), Duration::from_secs(5), |_| {}));
	thread::sleep(Duration::from_millis(30));

	// Queued for ~400ms behind the first batch, longer than its own idle limit
	let second = session
		.handle()
		.unwrap()
		.embed(texts(3), Duration::from_millis(250), |_| {})
		.unwrap();
	assert_eq!(second.len(), 3);
	assert_eq!(first.join().unwrap().unwrap().len(), 4);
}

#[test]
fn test_run_after_cancel_survives_busy_worker() {
	let config = PipelineConfig {
		embed_timeout_secs: 0.25,
		..PipelineConfig::default()
	};
	let mut pipeline = Pipeline::new(
		EmbeddingSession::start(FakeEmbedder {
			per_text_delay: Duration::from_millis(100),
			..FakeEmbedder::default()
		}),
		config,
	)
	.with_seed(5);
	pipeline.load_model(|_| {}).unwrap();

	let first = pipeline.generate(texts(5));
	thread::sleep(Duration::from_millis(50));
	let second = pipeline.generate(texts(4));

	assert_eq!(first.wait(|_| {}).unwrap_err(), GalaxyError::Cancelled);
	assert_eq!(second.wait(|_| {}).unwrap().len(), 4);
}

#[test]
fn test_abandoned_request_is_skipped() {
	let counters = Counters::default();
	let mut pipeline = loaded_pipeline(FakeEmbedder {
		counters: counters.clone(),
		per_text_delay: Duration::from_millis(100),
		..FakeEmbedder::default()
	});

	let first = pipeline.generate(texts(4));
	thread::sleep(Duration::from_millis(50));
	let second = pipeline.generate(texts(5));
	let third = pipeline.generate(texts(6));

	assert_eq!(third.wait(|_| {}).unwrap().len(), 6);
	assert!(first.is_cancelled() && second.is_cancelled());
	// The second batch was abandoned while queued and never embedded
	assert_eq!(counters.embeds.load(Ordering::SeqCst), 2);
}
