/// Per-call view of a task invocation used by skip decisions
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::debug;

use super::args::{is_truthy, Arguments};
use super::classify::Classification;
use crate::error::{Error, Result};

/// Paths and behavior flags of one call
#[derive(Debug, Clone, PartialEq)]
pub struct CallInfo {
    pub name: String,
    pub args: Arguments,
    pub input_paths: Vec<PathBuf>,
    pub output_paths: Vec<PathBuf>,
    /// Behavior parameters in declaration order, then rejected optional paths
    pub flags: Vec<(String, Value)>,
    pub version: Option<String>,
}

impl CallInfo {
    /// Extract paths and flags from resolved arguments
    ///
    /// A path parameter may hold one value or a list. Falsy values (null,
    /// empty string, false) are treated as "no path" and recorded among the
    /// flags so they still take part in the fingerprint; other non-string
    /// values are an [`Error::InvalidPath`]. So are outputs without a final
    /// file name component (`/`, `.`, `out/..`), which have no marker slot.
    pub fn bind(
        name: &str,
        classification: &Classification,
        args: Arguments,
        version: Option<&str>,
    ) -> Result<Self> {
        let mut flags: Vec<(String, Value)> = classification
            .behavior_params
            .iter()
            .filter_map(|param| args.get(param).map(|v| (param.clone(), v.clone())))
            .collect();

        let output_paths = coerce_paths(name, &classification.output_params, &args, &mut flags, true)?;
        let input_paths =
            coerce_paths(name, &classification.input_params, &args, &mut flags, false)?;

        Ok(Self {
            name: name.to_string(),
            args,
            input_paths,
            output_paths,
            flags,
            version: version.map(str::to_string),
        })
    }

    /// `task=<name>\nflags=<n1>:<v1>, <n2>:<v2>`, plus a version line when set
    pub fn call_str(&self) -> String {
        let flags = self
            .flags
            .iter()
            .map(|(name, value)| format!("{name}:{value}"))
            .collect::<Vec<_>>()
            .join(", ");
        let mut call_str = format!("task={}\nflags={}", self.name, flags);
        if let Some(version) = &self.version {
            call_str.push_str(&format!("\nversion={version}"));
        }
        call_str
    }

    /// Short digest identifying this exact call
    ///
    /// Covers the name, every path, every flag and the version, so each
    /// distinct call of a task keeps its own return value.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.name.as_bytes());
        for path in self.input_paths.iter().chain(&self.output_paths) {
            hasher.update(b"\0path:");
            hasher.update(path.to_string_lossy().as_bytes());
        }
        for (name, value) in &self.flags {
            hasher.update(b"\0flag:");
            hasher.update(name.as_bytes());
            hasher.update(b"=");
            hasher.update(value.to_string().as_bytes());
        }
        if let Some(version) = &self.version {
            hasher.update(b"\0version:");
            hasher.update(version.as_bytes());
        }
        let hash = hex::encode(hasher.finalize());
        hash[..16].to_string()
    }
}

fn coerce_paths(
    task: &str,
    params: &[String],
    args: &Arguments,
    flags: &mut Vec<(String, Value)>,
    outputs: bool,
) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();

    for param in params {
        let Some(value) = args.get(param) else {
            continue;
        };
        let values = match value {
            Value::Array(items) => items.iter().collect::<Vec<_>>(),
            single => vec![single],
        };

        let mut rejected = Vec::new();
        for value in values {
            match value {
                Value::String(s)
                    if !s.is_empty()
                        && !s.contains('\0')
                        && (!outputs || Path::new(s).file_name().is_some()) =>
                {
                    paths.push(PathBuf::from(s));
                }
                other if !is_truthy(other) => {
                    debug!(
                        task,
                        param = param.as_str(),
                        value = %other,
                        "ignoring empty value for path parameter"
                    );
                    rejected.push(other.clone());
                }
                other => {
                    return Err(Error::InvalidPath {
                        task: task.to_string(),
                        param: param.clone(),
                        value: other.to_string(),
                    })
                }
            }
        }

        if !rejected.is_empty() {
            flags.push((param.clone(), Value::Array(rejected)));
        }
    }

    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::classify::classify;
    use crate::task::signature::{Param, Signature};
    use serde_json::json;

    fn sig() -> Signature {
        Signature::new(vec![
            Param::required("input_paths"),
            Param::with_default("output_path", Value::Null),
            Param::with_default("level", 1),
            Param::with_default("_verbose", false),
        ])
    }

    fn bind(values: Vec<(&str, Value)>) -> Result<CallInfo> {
        let args = Arguments::from_pairs(
            values
                .into_iter()
                .map(|(n, v)| (n.to_string(), v))
                .collect(),
        );
        CallInfo::bind("t", &classify(&sig()), args, None)
    }

    #[test]
    fn test_lists_and_single_paths() {
        let call = bind(vec![
            ("input_paths", json!(["a.txt", "b.txt"])),
            ("output_path", json!("out.txt")),
            ("level", json!(2)),
            ("_verbose", json!(true)),
        ])
        .unwrap();

        assert_eq!(
            call.input_paths,
            vec![PathBuf::from("a.txt"), PathBuf::from("b.txt")]
        );
        assert_eq!(call.output_paths, vec![PathBuf::from("out.txt")]);
        assert_eq!(call.flags, vec![("level".to_string(), json!(2))]);
        assert_eq!(call.call_str(), "task=t\nflags=level:2");
    }

    #[test]
    fn test_falsy_optional_path_goes_to_flags() {
        let call = bind(vec![
            ("input_paths", json!("in.txt")),
            ("output_path", Value::Null),
            ("level", json!(1)),
        ])
        .unwrap();

        assert!(call.output_paths.is_empty());
        assert_eq!(
            call.flags,
            vec![
                ("level".to_string(), json!(1)),
                ("output_path".to_string(), json!([null])),
            ]
        );
    }

    #[test]
    fn test_non_empty_invalid_path_is_fatal() {
        let err = bind(vec![("input_paths", json!(42)), ("output_path", json!("o"))]).unwrap_err();
        match err {
            Error::InvalidPath { param, value, .. } => {
                assert_eq!(param, "input_paths");
                assert_eq!(value, "42");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_output_without_file_name_is_fatal() {
        for output in ["/", ".", "out/..", ".."] {
            let err = bind(vec![("input_paths", json!("in.txt")), ("output_path", json!(output))])
                .unwrap_err();
            match err {
                Error::InvalidPath { param, value, .. } => {
                    assert_eq!(param, "output_path");
                    assert_eq!(value, json!(output).to_string());
                }
                other => panic!("unexpected error for {output:?}: {other}"),
            }
        }

        // Inputs may still name a directory
        let call = bind(vec![("input_paths", json!(".")), ("output_path", json!("out/x"))]).unwrap();
        assert_eq!(call.input_paths, vec![PathBuf::from(".")]);
        assert_eq!(call.output_paths, vec![PathBuf::from("out/x")]);
    }

    #[test]
    fn test_digest_distinguishes_calls() {
        let a = bind(vec![("input_paths", json!("a")), ("output_path", json!("o"))]).unwrap();
        let b = bind(vec![("input_paths", json!("b")), ("output_path", json!("o"))]).unwrap();
        let a_again = bind(vec![("input_paths", json!("a")), ("output_path", json!("o"))]).unwrap();

        assert_eq!(a.digest().len(), 16);
        assert_eq!(a.digest(), a_again.digest());
        assert_ne!(a.digest(), b.digest());
    }

    #[test]
    fn test_version_changes_call_str() {
        let args = Arguments::from_pairs(vec![("level".to_string(), json!(1))]);
        let c = classify(&Signature::new(vec![Param::required("level")]));
        let plain = CallInfo::bind("t", &c, args.clone(), None).unwrap();
        let versioned = CallInfo::bind("t", &c, args, Some("2")).unwrap();

        assert_eq!(versioned.call_str(), "task=t\nflags=level:1\nversion=2");
        assert_ne!(plain.digest(), versioned.digest());
    }
}
