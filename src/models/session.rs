//! Background embedding worker
//!
//! One thread owns the [`Embedder`]. Callers talk to it over channels and
//! wait with a timeout, so a stuck model never blocks the caller forever.

use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::Embedder;
use crate::core::Embedding;
use crate::error::{GalaxyError, Result};
use crate::pipeline::{CancelToken, Progress, ProgressTracker};
use crate::ui;

/// Identity of the model the worker has ready
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedModel {
	pub model_id: String,
	pub device: String,
}

/// What the worker reports while loading a model
#[derive(Debug, Clone)]
pub enum ModelEvent {
	Progress(Progress),
	Ready(LoadedModel),
	Error(String),
}

/// How often a queued embed request checks for cancellation
const QUEUE_POLL: Duration = Duration::from_millis(50);

enum EmbedEvent {
	/// The worker picked the request up
	Started,
	Progress(Progress),
	Done(std::result::Result<Vec<Embedding>, String>),
}

enum Request {
	Load { model_id: String, events: Sender<ModelEvent> },
	Embed { texts: Vec<String>, events: Sender<EmbedEvent> },
	Shutdown,
}

/// Owns the worker thread and the currently loaded model
pub struct EmbeddingSession {
	requests: Option<Sender<Request>>,
	worker: Option<JoinHandle<()>>,
	loaded: Option<LoadedModel>,
}

impl EmbeddingSession {
	/// Spawn the worker thread around `embedder`
	pub fn start<E: Embedder + 'static>(embedder: E) -> Self {
		let (tx, rx) = channel::<Request>();
		let worker = thread::spawn(move || worker_loop(Box::new(embedder), rx));

		Self {
			requests: Some(tx),
			worker: Some(worker),
			loaded: None,
		}
	}

	pub fn loaded(&self) -> Option<&LoadedModel> {
		self.loaded.as_ref()
	}

	pub fn is_running(&self) -> bool {
		self.requests.is_some()
	}

	/// Load `model_id` on the worker, waiting at most `timeout`.
	///
	/// Returns immediately when that model is already loaded. Progress
	/// passed to `on_progress` never decreases.
	pub fn load_model(
		&mut self,
		model_id: &str,
		timeout: Duration,
		mut on_progress: impl FnMut(&Progress),
	) -> Result<LoadedModel> {
		if let Some(loaded) = &self.loaded {
			if loaded.model_id == model_id {
				ui::debug(&format!("Model {} already loaded", model_id));
				return Ok(loaded.clone());
			}
		}

		let requests = self.requests.as_ref().ok_or(GalaxyError::WorkerGone)?;
		let (tx, rx) = channel();
		requests
			.send(Request::Load {
				model_id: model_id.to_string(),
				events: tx,
			})
			.map_err(|_| GalaxyError::WorkerGone)?;

		let deadline = Instant::now() + timeout;
		let mut tracker = ProgressTracker::new();

		loop {
			match recv_until(&rx, deadline, timeout)? {
				ModelEvent::Progress(p) => on_progress(&tracker.observe(p)),
				ModelEvent::Ready(model) => {
					ui::debug(&format!("Model {} ready on {}", model.model_id, model.device));
					self.loaded = Some(model.clone());
					return Ok(model);
				}
				ModelEvent::Error(msg) => {
					self.loaded = None;
					return Err(GalaxyError::EmbeddingFailure(msg));
				}
			}
		}
	}

	/// Cloneable handle for embedding from other threads
	pub fn handle(&self) -> Option<EmbedHandle> {
		self.requests.as_ref().map(|tx| EmbedHandle { requests: tx.clone() })
	}

	/// Stop the worker. Requests already queued finish first; later calls,
	/// including those through outstanding [`EmbedHandle`]s, fail with
	/// [`GalaxyError::WorkerGone`].
	pub fn stop(&mut self) {
		if let Some(requests) = self.requests.take() {
			let _ = requests.send(Request::Shutdown);
		}
		self.loaded = None;
		if let Some(worker) = self.worker.take() {
			if worker.join().is_err() {
				ui::warn("Embedding worker panicked during shutdown");
			}
		}
	}
}

impl Drop for EmbeddingSession {
	fn drop(&mut self) {
		self.stop();
	}
}

/// Sends embed requests to a running [`EmbeddingSession`]
#[derive(Clone)]
pub struct EmbedHandle {
	requests: Sender<Request>,
}

impl EmbedHandle {
	/// Embed `texts`. Fails if the worker stays silent for `timeout`; every
	/// progress report restarts the clock.
	pub fn embed(
		&self,
		texts: Vec<String>,
		timeout: Duration,
		on_progress: impl FnMut(&Progress),
	) -> Result<Vec<Embedding>> {
		self.embed_cancellable(texts, timeout, &CancelToken::new(), on_progress)
	}

	/// Like [`EmbedHandle::embed`], but gives up with
	/// [`GalaxyError::Cancelled`] once `cancel` is set.
	///
	/// Time spent queued behind other requests does not count against
	/// `timeout`; the clock starts when the worker picks this request up.
	/// A request abandoned while still queued is never run.
	pub fn embed_cancellable(
		&self,
		texts: Vec<String>,
		timeout: Duration,
		cancel: &CancelToken,
		mut on_progress: impl FnMut(&Progress),
	) -> Result<Vec<Embedding>> {
		let expected = texts.len();
		let (tx, rx) = channel();
		self.requests
			.send(Request::Embed { texts, events: tx })
			.map_err(|_| GalaxyError::WorkerGone)?;

		let mut pending = wait_started(&rx, cancel)?;
		let mut deadline = Instant::now() + timeout;
		let mut tracker = ProgressTracker::new();

		let embeddings = loop {
			let event = match pending.take() {
				Some(event) => event,
				None => recv_until(&rx, deadline, timeout)?,
			};
			if cancel.is_cancelled() {
				return Err(GalaxyError::Cancelled);
			}
			match event {
				EmbedEvent::Started => {}
				EmbedEvent::Progress(p) => {
					deadline = Instant::now() + timeout;
					on_progress(&tracker.observe(p));
				}
				EmbedEvent::Done(Ok(embeddings)) => break embeddings,
				EmbedEvent::Done(Err(msg)) => return Err(GalaxyError::EmbeddingFailure(msg)),
			}
		};

		if embeddings.len() != expected {
			return Err(GalaxyError::EmbeddingFailure(format!(
				"expected {} embeddings, got {}",
				expected,
				embeddings.len()
			)));
		}

		let invalid = embeddings.iter().filter(|e| !e.is_finite()).count();
		if invalid > 0 {
			return Err(GalaxyError::EmbeddingFailure(format!(
				"{} embeddings contain NaN or infinite values",
				invalid
			)));
		}

		Ok(embeddings)
	}
}

/// Block until the worker starts on the request. Returns any event that
/// arrived in place of `Started`.
fn wait_started(rx: &Receiver<EmbedEvent>, cancel: &CancelToken) -> Result<Option<EmbedEvent>> {
	loop {
		if cancel.is_cancelled() {
			return Err(GalaxyError::Cancelled);
		}
		match rx.recv_timeout(QUEUE_POLL) {
			Ok(EmbedEvent::Started) => return Ok(None),
			Ok(event) => return Ok(Some(event)),
			Err(RecvTimeoutError::Timeout) => continue,
			Err(RecvTimeoutError::Disconnected) => return Err(GalaxyError::WorkerGone),
		}
	}
}

fn recv_until<T>(rx: &Receiver<T>, deadline: Instant, timeout: Duration) -> Result<T> {
	let remaining = deadline.saturating_duration_since(Instant::now());
	match rx.recv_timeout(remaining) {
		Ok(event) => Ok(event),
		Err(RecvTimeoutError::Timeout) => Err(GalaxyError::ModelTimeout(timeout.as_secs_f32())),
		Err(RecvTimeoutError::Disconnected) => Err(GalaxyError::WorkerGone),
	}
}

fn worker_loop(mut embedder: Box<dyn Embedder>, requests: Receiver<Request>) {
	// Runs until shutdown or every sender is dropped
	while let Ok(request) = requests.recv() {
		match request {
			Request::Load { model_id, events } => {
				let mut report = |p: Progress| {
					let _ = events.send(ModelEvent::Progress(p));
				};
				let event = match embedder.load(&model_id, &mut report) {
					Ok(device) => ModelEvent::Ready(LoadedModel { model_id, device }),
					Err(e) => ModelEvent::Error(format!("{:#}", e)),
				};
				// The caller may have timed out and gone away
				let _ = events.send(event);
			}
			Request::Embed { texts, events } => {
				// Nobody is waiting for this batch any more
				if events.send(EmbedEvent::Started).is_err() {
					ui::debug(&format!("Skipping abandoned batch of {} texts", texts.len()));
					continue;
				}
				let mut report = |p: Progress| {
					let _ = events.send(EmbedEvent::Progress(p));
				};
				let result = embedder.embed(&texts, &mut report).map_err(|e| format!("{:#}", e));
				let _ = events.send(EmbedEvent::Done(result));
			}
			Request::Shutdown => break,
		}
	}
}
