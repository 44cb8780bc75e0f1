//! # Pipeline
//!
//! Texts in, galaxy out: embed (or reuse cached vectors), project, normalize.
//! Each run happens on its own thread. Starting a new run cancels the
//! previous one, and a cancelled run never delivers a result.

pub mod galaxy;
pub mod progress;

pub use galaxy::Galaxy;
pub use progress::{Progress, ProgressTracker};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use std::thread;

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::config::PipelineConfig;
use crate::core::Embedding;
use crate::error::{GalaxyError, Result};
use crate::models::{EmbedHandle, EmbeddingSession, LoadedModel};
use crate::processing::{build_layout, Normalizer, Projector};
use crate::storage::EmbeddingCache;
use crate::ui;

/// Shared flag checked between pipeline stages
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn cancel(&self) {
		self.0.store(true, Ordering::SeqCst);
	}

	pub fn is_cancelled(&self) -> bool {
		self.0.load(Ordering::SeqCst)
	}

	fn check(&self) -> Result<()> {
		if self.is_cancelled() {
			Err(GalaxyError::Cancelled)
		} else {
			Ok(())
		}
	}
}

#[derive(Debug)]
pub enum PipelineEvent {
	Progress(Progress),
	Finished(Box<Galaxy>),
	Failed(GalaxyError),
}

/// Receiving end of one run
pub struct RunHandle {
	id: u64,
	token: CancelToken,
	events: Receiver<PipelineEvent>,
}

impl RunHandle {
	pub fn id(&self) -> u64 {
		self.id
	}

	pub fn cancel(&self) {
		self.token.cancel();
	}

	pub fn is_cancelled(&self) -> bool {
		self.token.is_cancelled()
	}

	/// Block until the run finishes, forwarding non-decreasing progress.
	///
	/// A run cancelled at any point returns [`GalaxyError::Cancelled`], even
	/// if its result already arrived.
	pub fn wait(self, mut on_progress: impl FnMut(&Progress)) -> Result<Galaxy> {
		let mut tracker = ProgressTracker::new();

		for event in self.events.iter() {
			self.token.check()?;
			match event {
				PipelineEvent::Progress(p) => on_progress(&tracker.observe(p)),
				PipelineEvent::Finished(galaxy) => return Ok(*galaxy),
				PipelineEvent::Failed(e) => return Err(e),
			}
		}

		self.token.check()?;
		Err(GalaxyError::WorkerGone)
	}
}

/// Drives the embedding session and the projection core
pub struct Pipeline {
	session: EmbeddingSession,
	config: PipelineConfig,
	cache: Option<EmbeddingCache>,
	seed: Option<u64>,
	runs: u64,
	active: Option<CancelToken>,
}

impl Pipeline {
	pub fn new(session: EmbeddingSession, config: PipelineConfig) -> Self {
		Self {
			session,
			config,
			cache: None,
			seed: None,
			runs: 0,
			active: None,
		}
	}

	pub fn with_cache(mut self, cache: EmbeddingCache) -> Self {
		self.cache = Some(cache);
		self
	}

	/// Fix the random source for reproducible layouts
	pub fn with_seed(mut self, seed: u64) -> Self {
		self.seed = Some(seed);
		self
	}

	pub fn config(&self) -> &PipelineConfig {
		&self.config
	}

	pub fn session(&self) -> &EmbeddingSession {
		&self.session
	}

	/// Load the configured model, waiting at most the configured timeout
	pub fn load_model(&mut self, on_progress: impl FnMut(&Progress)) -> Result<LoadedModel> {
		let model_id = self.config.model_id.clone();
		let timeout = self.config.model_load_timeout();
		self.session.load_model(&model_id, timeout, on_progress)
	}

	/// Start a run over `texts`, cancelling any run still in flight
	pub fn generate(&mut self, texts: Vec<String>) -> RunHandle {
		self.cancel();

		self.runs += 1;
		let id = self.runs;
		let token = CancelToken::new();
		self.active = Some(token.clone());

		let (tx, rx) = channel();
		let job = RunJob {
			id,
			texts,
			config: self.config.clone(),
			embedder: self.session.handle(),
			cache: self.cache.clone(),
			seed: self.seed.map(|s| s.wrapping_add(id - 1)),
			token: token.clone(),
			events: tx,
		};

		thread::spawn(move || job.run());

		RunHandle { id, token, events: rx }
	}

	/// Cancel the active run, if any
	pub fn cancel(&mut self) {
		if let Some(token) = self.active.take() {
			token.cancel();
		}
	}

	/// Embed a single query text with the loaded model
	pub fn embed_query(&self, text: &str) -> Result<Embedding> {
		let text = text.trim();
		if text.is_empty() {
			return Err(GalaxyError::InvalidInput("query is empty".into()));
		}

		let handle = self.session.handle().ok_or(GalaxyError::WorkerGone)?;
		let mut embeddings = handle.embed(vec![text.to_string()], self.config.embed_timeout(), |_| {})?;
		embeddings.pop().ok_or_else(|| GalaxyError::EmbeddingFailure("no embedding for query".into()))
	}

	/// Embed `text` and run [`Galaxy::search`] with this pipeline's config
	pub fn search(&self, galaxy: &mut Galaxy, text: &str) -> Result<()> {
		let embedding = self.embed_query(text)?;
		let mut rng = self.rng();
		galaxy.search(text.trim(), embedding, &self.config, &mut rng)?;
		Ok(())
	}

	fn rng(&self) -> StdRng {
		make_rng(self.seed)
	}
}

impl Drop for Pipeline {
	fn drop(&mut self) {
		self.cancel();
	}
}

fn make_rng(seed: Option<u64>) -> StdRng {
	match seed {
		Some(seed) => StdRng::seed_from_u64(seed),
		None => StdRng::from_os_rng(),
	}
}

struct RunJob {
	id: u64,
	texts: Vec<String>,
	config: PipelineConfig,
	embedder: Option<EmbedHandle>,
	cache: Option<EmbeddingCache>,
	seed: Option<u64>,
	token: CancelToken,
	events: Sender<PipelineEvent>,
}

impl RunJob {
	fn run(self) {
		let event = match self.execute() {
			Ok(galaxy) => PipelineEvent::Finished(Box::new(galaxy)),
			Err(GalaxyError::Cancelled) => {
				ui::debug(&format!("Run {} cancelled", self.id));
				return;
			}
			Err(e) => PipelineEvent::Failed(e),
		};

		// Late results of a superseded run are dropped here
		if !self.token.is_cancelled() {
			let _ = self.events.send(event);
		}
	}

	fn report(&self, percentage: f32, status: impl Into<String>) {
		if !self.token.is_cancelled() {
			let _ = self.events.send(PipelineEvent::Progress(Progress::new(percentage, status)));
		}
	}

	fn execute(&self) -> Result<Galaxy> {
		if self.texts.is_empty() {
			return Err(GalaxyError::InvalidInput("no texts to embed".into()));
		}

		self.report(0.0, format!("Preparing {} texts", self.texts.len()));
		let embeddings = self.embeddings()?;
		self.token.check()?;

		self.report(50.0, "Computing 3D coordinates");
		let projector = Projector::new(self.config.projection.clone());
		let normalizer = Normalizer::new(self.config.scale);
		let mut rng = make_rng(self.seed);
		let (layout, method) = build_layout(&embeddings, &projector, &normalizer, &mut rng)?;
		self.token.check()?;

		ui::debug(&format!("Run {}: {} points via {}", self.id, layout.len(), method.as_str()));
		self.report(100.0, "Done");

		Ok(Galaxy::new(
			self.config.model_id.clone(),
			self.texts.clone(),
			embeddings,
			layout,
			method,
		))
	}

	fn embeddings(&self) -> Result<Vec<Embedding>> {
		let model_id = &self.config.model_id;

		if let Some(cached) = self.cache.as_ref().and_then(|c| c.load(model_id, &self.texts)) {
			self.report(45.0, "Loaded cached embeddings");
			return Ok(cached);
		}

		let embedder = self.embedder.as_ref().ok_or(GalaxyError::WorkerGone)?;
		self.report(10.0, "Embedding texts");
		let embeddings =
			embedder.embed_cancellable(self.texts.clone(), self.config.embed_timeout(), &self.token, |p| {
				let p = p.scaled(10.0, 45.0);
				self.report(p.percentage, p.status);
			})?;

		if let Some(cache) = &self.cache {
			match cache.save(model_id, &self.texts, &embeddings) {
				Ok(path) => ui::debug(&format!("Cached embeddings at {}", path.display())),
				Err(e) => ui::warn(&format!("Could not cache embeddings: {:#}", e)),
			}
		}

		Ok(embeddings)
	}
}
