//! Core domain types

pub mod embedding;
pub mod hash;
pub mod point;
pub mod vector;

pub use embedding::{validate_batch, Embedding};
pub use hash::BatchKey;
pub use point::{is_finite_point, Point3, QueryPoint, SimilarityResult};
