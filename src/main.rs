//! Galaxy - 3D semantic maps of text snippets
//!
//! Command-line front end over the galaxy library.

use anyhow::Result;
use clap::Parser;

use galaxy::cli::{Cli, Command};
use galaxy::commands::{self, Options};
use galaxy::ui;
use galaxy::GalaxyError;

fn main() {
	let cli = Cli::parse();
	ui::Log::set_verbose(cli.verbose);

	if let Err(e) = run(cli) {
		ui::error(&format!("{:#}", e));
		if e.chain().filter_map(|c| c.downcast_ref::<GalaxyError>()).any(GalaxyError::is_retryable) {
			ui::info("Check the input and model files, then run again");
		}
		std::process::exit(1);
	}
}

fn run(cli: Cli) -> Result<()> {
	let opts = Options {
		provider: cli.provider,
		models_dir: cli.models_dir,
		model: cli.model,
		config: cli.config,
		seed: cli.seed,
		no_cache: cli.no_cache,
	};

	match cli.command {
		Command::Generate { input, output } => {
			ui::print_logo();
			commands::generate::run(&opts, &input, output.as_deref())
		}
		Command::Search {
			query,
			input,
			placement,
			threshold,
			limit,
			output,
		} => {
			ui::print_logo();
			commands::search::run(
				&opts,
				&commands::search::SearchArgs {
					query: &query,
					input: &input,
					placement,
					threshold,
					limit,
					output: output.as_deref(),
				},
			)
		}
		Command::Project { embeddings, output } => commands::project::run(&opts, &embeddings, output.as_deref()),
		Command::Clean { input } => commands::clean::run(&input),
	}
}
