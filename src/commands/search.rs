//! Search command - rank snippets against a query and place it in the galaxy

use anyhow::Result;
use colored::*;
use std::path::Path;

use super::export::{self, GalaxyExport};
use super::Options;
use crate::config::QueryPlacement;
use crate::pipeline::Galaxy;
use crate::ui;

pub struct SearchArgs<'a> {
	pub query: &'a str,
	pub input: &'a Path,
	pub placement: Option<QueryPlacement>,
	pub threshold: Option<f32>,
	pub limit: usize,
	pub output: Option<&'a Path>,
}

pub fn run(opts: &Options, args: &SearchArgs) -> Result<()> {
	let texts = super::read_texts(args.input)?;

	let mut config = opts.pipeline_config()?;
	if let Some(placement) = args.placement {
		config.placement = placement;
	}
	if let Some(threshold) = args.threshold {
		config.similarity_threshold = threshold;
	}

	let mut pipeline = super::open_pipeline(opts, config, args.input)?;
	let mut galaxy = super::build_galaxy(&mut pipeline, texts)?;

	ui::info(&format!("Searching for: \"{}\"", args.query));
	let search_start = std::time::Instant::now();
	pipeline.search(&mut galaxy, args.query)?;
	ui::debug(&format!("Search took {:.2}s", search_start.elapsed().as_secs_f32()));

	print_results(&galaxy, args.limit);

	if args.output.is_some() {
		export::write_json(&GalaxyExport::new(&galaxy, Some(args.limit)), args.output)?;
	}

	Ok(())
}

fn print_results(galaxy: &Galaxy, limit: usize) {
	let results = galaxy.results();

	if let Some(query) = galaxy.query() {
		let [x, y, z] = query.position;
		ui::debug(&format!("Query placed at ({:.2}, {:.2}, {:.2})", x, y, z));
	}

	if results.is_empty() {
		ui::warn("No snippets above the similarity threshold");
		return;
	}

	ui::header(&format!("Top {} of {} matches", limit.min(results.len()), results.len()));

	for (rank, result) in results.iter().take(limit).enumerate() {
		let text = galaxy.texts().get(result.index).map(String::as_str).unwrap_or("");
		let score = format!("{:.3}", result.score);
		let score = if result.score >= 0.7 {
			score.bright_green()
		} else if result.score >= 0.5 {
			score.yellow()
		} else {
			score.white()
		};

		println!("{:>3}. {} {}", (rank + 1).to_string().dimmed(), score, text);
	}
}
