//! Generate command - embed a text file and lay it out in 3D

use anyhow::Result;
use std::path::Path;

use super::export::{self, GalaxyExport};
use super::Options;
use crate::ui;

pub fn run(opts: &Options, input: &Path, output: Option<&Path>) -> Result<()> {
	let texts = super::read_texts(input)?;
	ui::info(&format!("Read {} snippets from {}", texts.len(), ui::path_link(input, 48)));

	let config = opts.pipeline_config()?;
	let mut pipeline = super::open_pipeline(opts, config, input)?;
	let galaxy = super::build_galaxy(&mut pipeline, texts)?;

	export::write_json(&GalaxyExport::new(&galaxy, None), output)
}
