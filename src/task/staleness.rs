/// Make-like timestamp comparison between input and output paths
use chrono::{DateTime, Utc};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::error::{Error, Result};

/// Verdict of a skip check with a human-readable reason
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkipResult {
    pub skippable: bool,
    pub reason: String,
}

impl SkipResult {
    pub fn skip(reason: impl Into<String>) -> Self {
        Self {
            skippable: true,
            reason: reason.into(),
        }
    }

    pub fn run(reason: impl Into<String>) -> Self {
        Self {
            skippable: false,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone)]
struct PathInfo<'a> {
    path: &'a Path,
    modified: SystemTime,
}

impl PathInfo<'_> {
    fn read(path: &Path) -> Result<PathInfo<'_>> {
        let modified = fs::metadata(path)
            .and_then(|m| m.modified())
            .map_err(|e| Error::io(format!("Failed to get mtime: {}", path.display()), e))?;
        Ok(PathInfo { path, modified })
    }
}

impl fmt::Display for PathInfo<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let modified: DateTime<Utc> = self.modified.into();
        write!(
            f,
            "{} ({})",
            self.path.display(),
            modified.format("%Y-%m-%dT%H:%M:%S%.6fZ")
        )
    }
}

/// Decide whether outputs are up to date with respect to inputs
///
/// Rules, first match wins:
/// 1. no outputs: never skippable
/// 2. any input or output missing: not skippable
/// 3. outputs exist and there are no inputs: skippable
/// 4. skippable iff the newest input is strictly older than the oldest output
pub fn timestamp_differ(inputs: &[PathBuf], outputs: &[PathBuf]) -> Result<SkipResult> {
    if outputs.is_empty() {
        return Ok(SkipResult::run(format!(
            "no outputs (has_inputs:{})",
            !inputs.is_empty()
        )));
    }

    // Missing inputs run too, so the task can fail loudly instead of being skipped
    if let Some(missing) = inputs.iter().chain(outputs).find(|p| !p.exists()) {
        return Ok(SkipResult::run(format!("{} missing", missing.display())));
    }

    if inputs.is_empty() {
        return Ok(SkipResult::skip("outputs exist, no inputs required"));
    }

    let newest_input = newest(inputs)?;
    let oldest_output = oldest(outputs)?;
    let reason = format!("youngest_input={newest_input}, oldest_output={oldest_output}");

    if newest_input.modified < oldest_output.modified {
        Ok(SkipResult::skip(reason))
    } else {
        Ok(SkipResult::run(reason))
    }
}

fn newest(paths: &[PathBuf]) -> Result<PathInfo<'_>> {
    let infos = read_all(paths)?;
    infos
        .into_iter()
        .max_by_key(|info| info.modified)
        .ok_or_else(|| Error::io("No paths given", std::io::ErrorKind::InvalidInput.into()))
}

fn oldest(paths: &[PathBuf]) -> Result<PathInfo<'_>> {
    let infos = read_all(paths)?;
    infos
        .into_iter()
        .min_by_key(|info| info.modified)
        .ok_or_else(|| Error::io("No paths given", std::io::ErrorKind::InvalidInput.into()))
}

fn read_all(paths: &[PathBuf]) -> Result<Vec<PathInfo<'_>>> {
    paths.iter().map(|p| PathInfo::read(p)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    fn touch(dir: &TempDir, name: &str, modified: SystemTime) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, name).unwrap();
        fs::File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(modified)
            .unwrap();
        path
    }

    fn base() -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000)
    }

    #[test]
    fn test_no_outputs_never_skips() {
        let temp = TempDir::new().unwrap();
        let old_input = touch(&temp, "in.txt", base() - Duration::from_secs(86400 * 365));

        let result = timestamp_differ(&[old_input], &[]).unwrap();
        assert!(!result.skippable);
        assert!(result.reason.contains("no outputs"));
    }

    #[test]
    fn test_missing_paths_run() {
        let temp = TempDir::new().unwrap();
        let output = touch(&temp, "out.txt", base());
        let missing = temp.path().join("nope.txt");

        let result = timestamp_differ(&[missing.clone()], &[output.clone()]).unwrap();
        assert!(!result.skippable);
        assert!(result.reason.contains("nope.txt"));

        let result = timestamp_differ(&[], &[output, missing]).unwrap();
        assert!(!result.skippable);
    }

    #[test]
    fn test_outputs_without_inputs_skip() {
        let temp = TempDir::new().unwrap();
        let output = touch(&temp, "out.txt", base());

        let result = timestamp_differ(&[], &[output]).unwrap();
        assert!(result.skippable);
        assert_eq!(result.reason, "outputs exist, no inputs required");
    }

    #[test]
    fn test_timestamp_boundary() {
        let temp = TempDir::new().unwrap();
        let output = touch(&temp, "out.txt", base());

        let same = touch(&temp, "same.txt", base());
        let result = timestamp_differ(&[same], &[output.clone()]).unwrap();
        assert!(!result.skippable, "equal timestamps must not skip");

        let older = touch(&temp, "older.txt", base() - Duration::from_secs(1));
        let result = timestamp_differ(&[older.clone()], &[output.clone()]).unwrap();
        assert!(result.skippable);
        assert!(result.reason.contains("older.txt"));
        assert!(result.reason.contains("out.txt"));

        let newer = touch(&temp, "newer.txt", base() + Duration::from_secs(1));
        let result = timestamp_differ(&[older, newer], &[output]).unwrap();
        assert!(!result.skippable);
    }

    #[test]
    fn test_oldest_output_is_compared() {
        let temp = TempDir::new().unwrap();
        let input = touch(&temp, "in.txt", base());
        let old_out = touch(&temp, "a.out", base() - Duration::from_secs(10));
        let new_out = touch(&temp, "b.out", base() + Duration::from_secs(10));

        let result = timestamp_differ(&[input], &[old_out, new_out]).unwrap();
        assert!(!result.skippable);
        assert!(result.reason.contains("a.out"));
    }
}
