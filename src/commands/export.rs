//! JSON export of galaxies and projections

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs;
use std::path::Path;

use crate::core::Point3;
use crate::pipeline::Galaxy;
use crate::ui;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Serialize)]
pub struct GalaxyExport<'a> {
	version: &'static str,
	timestamp: DateTime<Utc>,
	model: &'a str,
	method: &'static str,
	scale: f32,
	points: Vec<PointExport<'a>>,
	#[serde(skip_serializing_if = "Option::is_none")]
	query: Option<QueryExport<'a>>,
	#[serde(skip_serializing_if = "Option::is_none")]
	results: Option<Vec<ResultExport<'a>>>,
}

#[derive(Debug, Serialize)]
pub struct PointExport<'a> {
	index: usize,
	#[serde(skip_serializing_if = "Option::is_none")]
	text: Option<&'a str>,
	position: Point3,
}

#[derive(Debug, Serialize)]
pub struct QueryExport<'a> {
	text: &'a str,
	position: Point3,
}

#[derive(Debug, Serialize)]
pub struct ResultExport<'a> {
	index: usize,
	text: &'a str,
	score: f32,
}

impl<'a> GalaxyExport<'a> {
	/// Every point, plus query and the first `limit` results when a search ran
	pub fn new(galaxy: &'a Galaxy, limit: Option<usize>) -> Self {
		let texts = galaxy.texts();

		let points = galaxy
			.points()
			.iter()
			.enumerate()
			.map(|(index, position)| PointExport {
				index,
				text: texts.get(index).map(String::as_str),
				position: *position,
			})
			.collect();

		let query = galaxy.query().map(|q| QueryExport {
			text: &q.text,
			position: q.position,
		});

		let results = query.as_ref().map(|_| {
			galaxy
				.results()
				.iter()
				.take(limit.unwrap_or(usize::MAX))
				.filter_map(|r| {
					texts.get(r.index).map(|text| ResultExport {
						index: r.index,
						text,
						score: r.score,
					})
				})
				.collect()
		});

		Self {
			version: VERSION,
			timestamp: Utc::now(),
			model: galaxy.model_id(),
			method: galaxy.method().as_str(),
			scale: galaxy.layout().scale(),
			points,
			query,
			results,
		}
	}
}

/// Points of a bare projection (no texts)
#[derive(Debug, Serialize)]
pub struct ProjectionExport {
	version: &'static str,
	timestamp: DateTime<Utc>,
	method: &'static str,
	scale: f32,
	points: Vec<PointExport<'static>>,
}

impl ProjectionExport {
	pub fn new(points: &[Point3], method: &'static str, scale: f32) -> Self {
		Self {
			version: VERSION,
			timestamp: Utc::now(),
			method,
			scale,
			points: points
				.iter()
				.enumerate()
				.map(|(index, position)| PointExport {
					index,
					text: None,
					position: *position,
				})
				.collect(),
		}
	}
}

/// Pretty JSON to `output`, or stdout when no path is given
pub fn write_json<T: Serialize>(value: &T, output: Option<&Path>) -> Result<()> {
	let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;

	match output {
		Some(path) => {
			fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
			ui::success(&format!("Saved {}", ui::path_link(path, 48)));
		}
		None => println!("{}", json),
	}

	Ok(())
}
