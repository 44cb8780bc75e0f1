//! Embedding storage system

pub mod cache;

pub use cache::{CachedBatch, EmbeddingCache};
