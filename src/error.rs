use thiserror::Error;

/// Failures the projection and search core can surface to a caller.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GalaxyError {
	#[error("Invalid input: {0}")]
	InvalidInput(String),

	#[error("Dimension mismatch: expected {expected}D, got {found}D at index {index}")]
	DimensionMismatch {
		expected: usize,
		found: usize,
		index: usize,
	},

	#[error("Embedding failed: {0}")]
	EmbeddingFailure(String),

	/// Only raised when even the fallback projection cannot run.
	#[error("Projection failed: {0}")]
	ProjectionFailure(String),

	#[error("Timed out after {0:.1}s waiting for the embedding model")]
	ModelTimeout(f32),

	#[error("Run was cancelled")]
	Cancelled,

	#[error("Embedding worker is no longer running")]
	WorkerGone,
}

impl GalaxyError {
	/// Errors the user can fix by correcting input and retrying.
	pub fn is_retryable(&self) -> bool {
		matches!(
			self,
			GalaxyError::InvalidInput(_)
				| GalaxyError::DimensionMismatch { .. }
				| GalaxyError::EmbeddingFailure(_)
				| GalaxyError::ModelTimeout(_)
		)
	}
}

pub type Result<T> = std::result::Result<T, GalaxyError>;
