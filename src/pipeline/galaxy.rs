//! Everything a viewer needs after one pipeline run

use rand::Rng;

use crate::config::PipelineConfig;
use crate::core::{Embedding, Point3, QueryPoint, SimilarityResult};
use crate::error::Result;
use crate::processing::{rank, Layout, Method, Normalizer, Placement, Projector, QueryPlacer};

/// Texts, their embeddings and display coordinates, plus the active query.
///
/// `texts`, `embeddings` and `layout.points()` are index-aligned.
#[derive(Debug, Clone)]
pub struct Galaxy {
	model_id: String,
	texts: Vec<String>,
	embeddings: Vec<Embedding>,
	layout: Layout,
	method: Method,
	query: Option<QueryPoint>,
	results: Vec<SimilarityResult>,
}

impl Galaxy {
	pub fn new(
		model_id: impl Into<String>,
		texts: Vec<String>,
		embeddings: Vec<Embedding>,
		layout: Layout,
		method: Method,
	) -> Self {
		Self {
			model_id: model_id.into(),
			texts,
			embeddings,
			layout,
			method,
			query: None,
			results: Vec::new(),
		}
	}

	pub fn model_id(&self) -> &str {
		&self.model_id
	}

	pub fn texts(&self) -> &[String] {
		&self.texts
	}

	pub fn embeddings(&self) -> &[Embedding] {
		&self.embeddings
	}

	pub fn layout(&self) -> &Layout {
		&self.layout
	}

	pub fn points(&self) -> &[Point3] {
		self.layout.points()
	}

	pub fn method(&self) -> Method {
		self.method
	}

	pub fn query(&self) -> Option<&QueryPoint> {
		self.query.as_ref()
	}

	pub fn results(&self) -> &[SimilarityResult] {
		&self.results
	}

	pub fn len(&self) -> usize {
		self.texts.len()
	}

	pub fn is_empty(&self) -> bool {
		self.texts.is_empty()
	}

	/// Rank the batch against `embedding` and place the query point.
	///
	/// Nothing changes if ranking or placement fails. In recompute mode the
	/// whole layout is replaced.
	pub fn search<R: Rng + ?Sized>(
		&mut self,
		text: &str,
		embedding: Embedding,
		config: &PipelineConfig,
		rng: &mut R,
	) -> Result<&[SimilarityResult]> {
		let results = rank(&embedding, &self.embeddings, config.similarity_threshold)?;

		let projector = Projector::new(config.projection.clone());
		let normalizer = Normalizer::new(self.layout.scale());
		let placer = QueryPlacer {
			projector: &projector,
			normalizer: &normalizer,
			mode: config.placement,
			neighbors: config.placement_neighbors,
		};

		let position = match placer.place(&self.layout, &self.embeddings, &embedding, rng)? {
			Placement::Incremental { position } => position,
			Placement::Recompute { position, layout } => {
				self.layout = layout;
				position
			}
		};

		self.query = Some(QueryPoint {
			text: text.to_string(),
			embedding,
			position,
		});
		self.results = results;

		Ok(&self.results)
	}

	pub fn clear_query(&mut self) {
		self.query = None;
		self.results.clear();
	}
}
