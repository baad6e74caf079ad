/// Persisted fingerprint of the behavior flags that produced each output
///
/// For an output `dir/out.txt` the marker lives at `dir/.<namespace>/out.txt`
/// and holds the hex SHA-256 of the call string.
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::debug;

use super::call::CallInfo;
use super::staleness::SkipResult;
use crate::error::Result;
use crate::storage::CachePath;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagChecker {
    marker_dir: String,
}

impl FlagChecker {
    /// `marker_dir` is the hidden directory name, e.g. `.magictask`
    pub fn new(marker_dir: impl Into<String>) -> Self {
        Self {
            marker_dir: marker_dir.into(),
        }
    }

    pub fn fingerprint(&self, call: &CallInfo) -> String {
        let call_str = call.call_str();
        let fingerprint = hex::encode(Sha256::digest(call_str.as_bytes()));
        debug!(task = call.name.as_str(), call_str = %call_str, fingerprint = %fingerprint, "determined call fingerprint");
        fingerprint
    }

    pub fn marker_path(&self, output: &Path) -> CachePath {
        let parent = output.parent().unwrap_or_else(|| Path::new(""));
        let name = output.file_name().unwrap_or(output.as_os_str());
        CachePath::new(parent.join(&self.marker_dir).join(name))
    }

    /// Whether the outputs were last generated with the same flags
    ///
    /// A call without flags is always flag-fresh. Otherwise every output and
    /// its marker must exist and the marker must hold `fingerprint`.
    pub fn can_skip(&self, call: &CallInfo, fingerprint: &str) -> Result<SkipResult> {
        if call.flags.is_empty() {
            return Ok(SkipResult::skip("has no flags"));
        }

        for output in &call.output_paths {
            if !output.exists() {
                return Ok(SkipResult::run(format!(
                    "output {} doesn't exist yet",
                    output.display()
                )));
            }
            let marker = self.marker_path(output);
            match marker.read_bytes()? {
                None => {
                    return Ok(SkipResult::run(format!(
                        "{} has no recorded flags",
                        output.display()
                    )))
                }
                Some(recorded) if recorded != fingerprint.as_bytes() => {
                    return Ok(SkipResult::run(format!(
                        "{} was last generated with different flags",
                        output.display()
                    )))
                }
                Some(_) => {}
            }
        }

        Ok(SkipResult::skip("no files were last generated with different flags"))
    }

    /// Write the fingerprint next to every output that now exists
    pub fn record(&self, call: &CallInfo, fingerprint: &str) -> Result<Vec<PathBuf>> {
        let mut written = Vec::new();
        for output in call.output_paths.iter().filter(|p| p.exists()) {
            let marker = self.marker_path(output);
            debug!(
                task = call.name.as_str(),
                output = %output.display(),
                marker = %marker.path().display(),
                "recording flags"
            );
            marker.write_bytes(fingerprint.as_bytes())?;
            written.push(marker.path().to_path_buf());
        }
        Ok(written)
    }

    /// Remove the markers of every output
    pub fn clear(&self, call: &CallInfo) -> Result<usize> {
        let mut removed = 0;
        for output in &call.output_paths {
            if self.marker_path(output).rm()? {
                removed += 1;
            }
        }
        Ok(removed)
    }
}
