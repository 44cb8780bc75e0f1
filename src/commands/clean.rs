//! Clean command - remove cached embeddings next to an input file

use std::path::Path;

use crate::storage::EmbeddingCache;
use crate::ui;

pub fn run(input: &Path) -> anyhow::Result<()> {
	let cache = EmbeddingCache::beside(input);
	ui::info(&format!("Cleaning: {}", cache.dir().display()));

	let removed = cache.clear()?;
	if removed == 0 {
		ui::success("No cached embeddings found");
		return Ok(());
	}

	ui::success(&format!("Removed {} cached batches", removed));
	Ok(())
}
