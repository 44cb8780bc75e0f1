//! Content keys for embedding batches

use xxhash_rust::xxh3::Xxh3;

/// Identifies one (model, ordered texts) combination
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BatchKey(String);

impl BatchKey {
	pub fn compute(model_id: &str, texts: &[String]) -> Self {
		let mut hasher = Xxh3::new();
		// Length prefixes keep ["ab", "c"] and ["a", "bc"] apart
		hasher.update(&(model_id.len() as u64).to_le_bytes());
		hasher.update(model_id.as_bytes());
		for text in texts {
			hasher.update(&(text.len() as u64).to_le_bytes());
			hasher.update(text.as_bytes());
		}
		Self(format!("{:016x}", hasher.digest()))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}

	pub fn short(&self) -> &str {
		&self.0[..8]
	}
}

impl std::fmt::Display for BatchKey {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.0)
	}
}
