// Embedding cache on disk

use std::fs;

use galaxy::core::{BatchKey, Embedding};
use galaxy::storage::EmbeddingCache;

fn texts() -> Vec<String> {
	vec!["first note".to_string(), "second note".to_string()]
}

fn embeddings() -> Vec<Embedding> {
	vec![Embedding::raw(vec![0.1, 0.2, 0.3]), Embedding::raw(vec![-0.5, 0.25, 1.0])]
}

#[test]
fn test_save_then_load() {
	let dir = tempfile::tempdir().unwrap();
	let cache = EmbeddingCache::new(dir.path().join(".galaxy"));

	let path = cache.save("mini", &texts(), &embeddings()).unwrap();
	assert!(path.exists());
	assert_eq!(path, cache.path(&BatchKey::compute("mini", &texts())));

	assert_eq!(cache.load("mini", &texts()), Some(embeddings()));
}

#[test]
fn test_miss_on_other_model_or_texts() {
	let dir = tempfile::tempdir().unwrap();
	let cache = EmbeddingCache::new(dir.path());
	cache.save("mini", &texts(), &embeddings()).unwrap();

	assert!(cache.load("other", &texts()).is_none());

	let mut reordered = texts();
	reordered.reverse();
	assert!(cache.load("mini", &reordered).is_none());
}

#[test]
fn test_corrupt_file_is_ignored() {
	let dir = tempfile::tempdir().unwrap();
	let cache = EmbeddingCache::new(dir.path());
	let path = cache.save("mini", &texts(), &embeddings()).unwrap();

	fs::write(&path, b"not msgpack").unwrap();
	assert!(cache.load("mini", &texts()).is_none());
}

#[test]
fn test_clear_removes_entries() {
	let dir = tempfile::tempdir().unwrap();
	let cache = EmbeddingCache::new(dir.path());
	cache.save("mini", &texts(), &embeddings()).unwrap();
	cache.save("other", &texts(), &embeddings()).unwrap();
	fs::write(dir.path().join("keep.txt"), "x").unwrap();

	assert_eq!(cache.clear().unwrap(), 2);
	assert!(cache.load("mini", &texts()).is_none());
	assert!(dir.path().join("keep.txt").exists());
}

#[test]
fn test_beside_input_file() {
	let cache = EmbeddingCache::beside(std::path::Path::new("data/notes.txt"));
	assert_eq!(cache.dir(), std::path::Path::new("data/.galaxy"));

	let bare = EmbeddingCache::beside(std::path::Path::new("notes.txt"));
	assert_eq!(bare.dir(), std::path::Path::new("./.galaxy"));
}
