mod cli;
mod cli_utils;
mod commands;

use anyhow::Result;
use clap::Parser;

use cli::{Cli, Commands};
use magictask::logging::{self, LogSettings};
use magictask::settings_discovery::load_settings_with_discovery;

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    let settings = load_settings_with_discovery(cli.settings.as_deref())?;

    // Initialize structured logging
    logging::init(&LogSettings::from_config(&settings.log));

    // Dispatch to appropriate command handler
    match cli.command {
        Commands::Cache(args) => {
            commands::cache::run(&args.command, settings.cache_store(cli.cache_dir))
        }
        Commands::Config(args) => commands::config::run(args.command, &settings, cli.cache_dir),
    }
}
