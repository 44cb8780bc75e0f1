//! Projection, normalization and search over embedding batches

pub mod layout;
pub mod normalize;
pub mod projection;
pub mod sampler;
pub mod search;
pub mod umap;

pub use layout::{build_layout, Layout};
pub use normalize::{Bounds, Normalizer};
pub use projection::{random_projection, variance_projection, Method, Projector};
pub use search::{rank, Placement, QueryPlacer};
