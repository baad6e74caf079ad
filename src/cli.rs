use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// magictask - derive task arguments from configuration and skip up-to-date work
///
/// Inspects and maintains the state saved by skippable tasks: return values
/// under the cache directory and the task configuration they read.
#[derive(Parser, Debug)]
#[command(name = "magictask")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Inspect and maintain magictask state", long_about = None)]
pub struct Cli {
    /// Settings file (default: nearest magictask.toml)
    #[arg(long, global = true, env = "MAGICTASK_SETTINGS")]
    pub settings: Option<PathBuf>,

    /// Cache directory holding saved return values
    #[arg(long, global = true, env = "MAGICTASK_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage saved return values
    Cache(CacheArgs),

    /// Settings and task configuration utilities
    Config(ConfigArgs),
}

#[derive(Parser, Debug)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub command: CacheCommands,
}

#[derive(Subcommand, Debug)]
pub enum CacheCommands {
    /// Show saved return values of a task
    Status {
        /// Task name
        task: String,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Remove saved return values
    Clean {
        /// Task name (omit with --all to clean everything)
        task: Option<String>,

        /// Clean all tasks
        #[arg(long)]
        all: bool,
    },

    /// List tasks with saved return values
    List {
        /// Show detailed information
        #[arg(short, long)]
        verbose: bool,
    },

    /// Show cache statistics
    Stats,
}

#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Validate a settings file
    Validate {
        /// Path to settings file
        path: PathBuf,
    },

    /// Print example settings
    Generate,

    /// Show effective settings (file, environment and flags merged)
    Show,

    /// Resolve a dotted context path in a task configuration file
    Get {
        /// Dotted path starting with ctx or c (e.g. ctx.people.names_path)
        path: String,

        /// Task configuration file (TOML)
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Override a value before lookup (key=value, value parsed as JSON when possible)
        #[arg(short = 'D', long = "define", value_name = "KEY=VALUE")]
        defines: Vec<String>,
    },
}
