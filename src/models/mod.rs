//! # Text Embedding Models
//!
//! The [`Embedder`] seam, the ONNX sentence model behind it, and the
//! background session that owns whichever embedder is in use.

pub mod session;
pub mod text;

pub use session::{EmbedHandle, EmbeddingSession, LoadedModel, ModelEvent};
pub use text::SentenceModel;

use anyhow::Result;

use crate::core::Embedding;
use crate::pipeline::Progress;

/// Anything that can turn texts into fixed-width vectors.
///
/// Implementations run on the session's worker thread and may block.
pub trait Embedder: Send {
	/// Prepare `model_id` for inference. Returns a short device description.
	fn load(&mut self, model_id: &str, progress: &mut dyn FnMut(Progress)) -> Result<String>;

	/// One vector per input text, in input order
	fn embed(&mut self, texts: &[String], progress: &mut dyn FnMut(Progress)) -> Result<Vec<Embedding>>;
}
