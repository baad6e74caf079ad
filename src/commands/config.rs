use anyhow::{Context as _, Result};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::cli::ConfigCommands;
use magictask::{Config, Context, Settings};

pub fn run(command: ConfigCommands, settings: &Settings, cache_dir: Option<PathBuf>) -> Result<()> {
    match command {
        ConfigCommands::Validate { path } => validate(&path),
        ConfigCommands::Generate => generate(),
        ConfigCommands::Show => show(settings, cache_dir),
        ConfigCommands::Get {
            path,
            file,
            defines,
        } => get(&path, file.as_deref(), &defines),
    }
}

fn validate(path: &Path) -> Result<()> {
    info!("Validating settings file: {}", path.display());

    let settings = Settings::from_file(path)?;

    println!("✓ Settings file is valid: {}", path.display());
    println!("\nSummary:");
    match &settings.cache.dir {
        Some(dir) => println!("  - Cache directory: {}", dir.display()),
        None => println!("  - Cache directory: (default)"),
    }
    println!("  - Namespace: {}", settings.cache.namespace);
    println!("  - Log level: {}", settings.log.level);
    println!(
        "  - Log format: {}",
        settings.log.format.as_deref().unwrap_or("(from environment)")
    );

    Ok(())
}

fn generate() -> Result<()> {
    println!("{}", Settings::example()?);
    Ok(())
}

fn show(settings: &Settings, cache_dir: Option<PathBuf>) -> Result<()> {
    info!("Showing effective settings");

    let store = settings.cache_store(cache_dir);
    let mut effective = settings.clone();
    effective.cache.dir = Some(store.root().to_path_buf());

    println!("Effective Settings:\n");
    println!("{}", toml::to_string_pretty(&effective)?);

    Ok(())
}

/// Print the JSON value at a dotted context path
fn get(path: &str, file: Option<&Path>, defines: &[String]) -> Result<()> {
    let mut config = match file {
        Some(file) => Config::from_toml_file(file)?,
        None => Config::new(),
    };
    for define in defines {
        config
            .set_override(define)
            .with_context(|| format!("Invalid override: {define}"))?;
    }

    let value = Context::new(config).get(path)?;
    println!("{}", serde_json::to_string_pretty(&value)?);

    Ok(())
}
