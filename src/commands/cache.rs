/// `magictask cache` command implementation
///
/// Manages saved return values (status, clean, list, stats).
use anyhow::{Context, Result};

use crate::cli::CacheCommands;
use crate::cli_utils::{format_size, magictask_prefix};
use magictask::task::ReturnValueCache;
use magictask::CacheStore;

pub fn run(command: &CacheCommands, store: CacheStore) -> Result<()> {
    let cache = ReturnValueCache::new(store);

    match command {
        CacheCommands::Status { task, verbose } => status(&cache, task, *verbose),
        CacheCommands::Clean { task, all } => clean(&cache, task.as_deref(), *all),
        CacheCommands::List { verbose } => list(&cache, *verbose),
        CacheCommands::Stats => stats(&cache),
    }
}

/// Show saved return values of a task
fn status(cache: &ReturnValueCache, task: &str, verbose: bool) -> Result<()> {
    let entries = cache
        .entries(task)
        .with_context(|| format!("Failed to read cache entries for task: {task}"))?;

    println!("Task: {task}");
    println!("Cache dir: {}", cache.store().task_dir(task)?.path().display());

    if entries.is_empty() {
        println!("Status: NOT CACHED");
        return Ok(());
    }

    println!("Status: CACHED ({} entries)", entries.len());
    println!();

    for entry in &entries {
        println!("  {}", entry.metadata.digest);
        println!(
            "    Created: {}",
            entry.metadata.created_at.format("%Y-%m-%d %H:%M:%S")
        );
        println!("    Size: {}", format_size(entry.size_bytes));
        if verbose {
            println!("    Fingerprint: {}", entry.metadata.fingerprint);
            println!("    Path: {}", entry.path.display());
        }
    }

    Ok(())
}

/// Clean saved values of a task or of all tasks
fn clean(cache: &ReturnValueCache, task: Option<&str>, all: bool) -> Result<()> {
    if all {
        println!("{} Cleaning all saved return values...", magictask_prefix());
        let removed = cache.clean_all().context("Failed to clean all caches")?;
        println!("{} Cleaned {removed} tasks.", magictask_prefix());
        return Ok(());
    }

    let Some(task) = task else {
        anyhow::bail!("Specify --all to clean all tasks, or provide a task name");
    };

    let removed = cache
        .remove_task(task)
        .with_context(|| format!("Failed to clean cache for task: {task}"))?;
    println!(
        "{} Cleaned {removed} saved return values of {task}.",
        magictask_prefix()
    );

    Ok(())
}

/// List tasks with saved return values
fn list(cache: &ReturnValueCache, verbose: bool) -> Result<()> {
    let tasks = cache.list_tasks().context("Failed to list cache entries")?;

    if tasks.is_empty() {
        println!("No saved return values.");
        return Ok(());
    }

    println!("Cached tasks ({} tasks):", tasks.len());
    println!();

    for task in tasks {
        let entries = cache.entries(&task)?;
        println!("  {task} ({} entries)", entries.len());

        if verbose {
            if let Some(latest) = entries.last() {
                println!(
                    "    Last saved: {}",
                    latest.metadata.created_at.format("%Y-%m-%d %H:%M:%S")
                );
            }
            let total_size: u64 = entries.iter().map(|e| e.size_bytes).sum();
            println!("    Total size: {}", format_size(total_size));
        }
    }

    Ok(())
}

/// Show cache statistics
fn stats(cache: &ReturnValueCache) -> Result<()> {
    let stats = cache.stats().context("Failed to get cache statistics")?;

    println!("Return Value Cache Statistics");
    println!();
    println!("Location: {}", cache.store().base_dir().display());
    println!("Total tasks: {}", stats.total_tasks);
    println!("Total entries: {}", stats.total_entries);
    println!("Total size: {}", format_size(stats.total_size_bytes));

    if stats.total_entries > 0 {
        println!(
            "Average size per entry: {}",
            format_size(stats.total_size_bytes / stats.total_entries as u64)
        );
    }

    Ok(())
}
