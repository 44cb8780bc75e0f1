//! # Galaxy Library
//!
//! Turns short texts into a navigable 3D point cloud: sentence embeddings,
//! manifold projection with a random-projection fallback, normalization
//! into a fixed display range, and cosine-similarity search.

pub mod cli;
pub mod commands;
pub mod config;
pub mod core;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod processing;
pub mod runtime;
pub mod storage;
pub mod ui;

pub use error::{GalaxyError, Result};
