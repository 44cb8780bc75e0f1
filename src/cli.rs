use clap::builder::styling::{AnsiColor, Style, Styles};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::path::PathBuf;

use crate::config::QueryPlacement;

/// Execution provider for ONNX Runtime
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum Provider {
	/// Auto-detect best available (TensorRT → CUDA → CoreML → XNNPACK → CPU)
	#[default]
	Auto,
	/// CPU only
	Cpu,
	/// NVIDIA CUDA GPU
	Cuda,
	/// NVIDIA TensorRT (optimized inference)
	Tensorrt,
	/// Apple CoreML (macOS only)
	Coreml,
	/// XNNPACK (optimized CPU kernels)
	Xnnpack,
}

fn parse_threshold(s: &str) -> Result<f32, String> {
	let val: f32 = s.parse().map_err(|_| format!("'{}' is not a valid number", s))?;
	if !(-1.0..=1.0).contains(&val) {
		Err(format!("threshold must be between -1.0 and 1.0, got {}", val))
	} else {
		Ok(val)
	}
}

fn styles() -> Styles {
	Styles::styled()
		.header(AnsiColor::Magenta.on_default().bold())
		.usage(AnsiColor::Magenta.on_default().bold())
		.literal(AnsiColor::Magenta.on_default())
		.placeholder(AnsiColor::Yellow.on_default())
		.valid(Style::new().fg_color(Some(AnsiColor::Magenta.into())))
		.invalid(AnsiColor::Red.on_default())
}

#[derive(Parser, Debug)]
#[command(
	name = "galaxy",
	author,
	version,
	about = "Turn text snippets into a navigable 3D semantic galaxy",
	styles = styles(),
	after_help = format!(
		"{title}
  {galaxy} {generate} {generate_args}          {generate_desc}
  {galaxy} {search}   {search_args}  {search_desc}
  {galaxy} {project}  {project_args}        {project_desc}
  {galaxy} {clean}    {clean_args}            {clean_desc}",
		title = "Examples:".bright_magenta().bold(),
		galaxy = "galaxy".bright_magenta(),
		generate = "generate".yellow(),
		generate_args = "-i notes.txt -o map.json",
		generate_desc = "Embed and lay out every line".dimmed(),
		search = "search".yellow(),
		search_args = "\"rust async\" -i notes.txt",
		search_desc = "Rank lines and place the query".dimmed(),
		project = "project".yellow(),
		project_args = "-e vectors.json",
		project_desc = "Project precomputed vectors".dimmed(),
		clean = "clean".yellow(),
		clean_args = "-i notes.txt",
		clean_desc = "Drop cached embeddings for a file".dimmed(),
	),
)]
pub struct Cli {
	/// Enable verbose debug output
	#[arg(short = 'v', long = "verbose", global = true)]
	pub verbose: bool,

	/// Execution provider: auto, cpu, cuda, tensorrt, coreml, xnnpack
	#[arg(short = 'p', long = "provider", global = true, default_value = "auto")]
	pub provider: Provider,

	/// Directory containing <model-id>/model.onnx and tokenizer.json
	#[arg(long = "models-dir", global = true, value_name = "DIR")]
	pub models_dir: Option<PathBuf>,

	/// Embedding model id (subdirectory of the models directory)
	#[arg(short = 'm', long = "model", global = true, value_name = "ID")]
	pub model: Option<String>,

	/// JSON file overriding pipeline settings
	#[arg(short = 'c', long = "config", global = true, value_name = "PATH")]
	pub config: Option<PathBuf>,

	/// Seed for reproducible layouts
	#[arg(long = "seed", global = true)]
	pub seed: Option<u64>,

	/// Do not read or write the embedding cache
	#[arg(long = "no-cache", global = true)]
	pub no_cache: bool,

	#[command(subcommand)]
	pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
	/// Embed every non-empty line of a file and compute its 3D layout
	Generate {
		/// Text file, one snippet per line
		#[arg(short = 'i', long = "input", value_name = "PATH")]
		input: PathBuf,

		/// Write the galaxy as JSON here instead of stdout
		#[arg(short = 'o', long = "output", value_name = "PATH")]
		output: Option<PathBuf>,
	},

	/// Rank snippets by similarity to a query and place it in the galaxy
	Search {
		/// Search query
		#[arg(value_name = "QUERY")]
		query: String,

		/// Text file, one snippet per line
		#[arg(short = 'i', long = "input", value_name = "PATH")]
		input: PathBuf,

		/// How the query point is positioned
		#[arg(long = "placement")]
		placement: Option<QueryPlacement>,

		/// Keep results scoring strictly above this similarity
		#[arg(short = 's', long = "threshold", value_parser = parse_threshold)]
		threshold: Option<f32>,

		/// Number of results to print
		#[arg(short = 'n', long = "limit", default_value_t = crate::config::DEFAULT_LIMIT)]
		limit: usize,

		/// Write the galaxy with query and results as JSON here
		#[arg(short = 'o', long = "output", value_name = "PATH")]
		output: Option<PathBuf>,
	},

	/// Project precomputed vectors (JSON array of arrays) to normalized 3D
	Project {
		/// JSON file with one vector per entry
		#[arg(short = 'e', long = "embeddings", value_name = "PATH")]
		embeddings: PathBuf,

		/// Write points as JSON here instead of stdout
		#[arg(short = 'o', long = "output", value_name = "PATH")]
		output: Option<PathBuf>,
	},

	/// Remove the embedding cache kept next to an input file
	Clean {
		/// Text file whose cache should be removed
		#[arg(short = 'i', long = "input", value_name = "PATH")]
		input: PathBuf,
	},
}
