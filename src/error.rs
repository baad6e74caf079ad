//! Error types for argument derivation and skip/cache orchestration
//!
//! Resolution errors (`ArgumentCount`, `UnexpectedKeyword`, `DuplicateArgument`,
//! `MissingRequiredArguments`, `Derivation`) always reach the caller.
//! `CacheSave` is raised after the task body already ran successfully.
use std::path::PathBuf;
use thiserror::Error;

/// Boxed source error carried by wrapping variants
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("{task}() takes {accepted} arguments but {received} were given")]
    ArgumentCount {
        task: String,
        accepted: usize,
        received: usize,
    },

    #[error("{task}() got an unexpected keyword argument '{name}'")]
    UnexpectedKeyword { task: String, name: String },

    #[error("{task}() got multiple values for argument '{name}'")]
    DuplicateArgument { task: String, name: String },

    #[error("'{task}' did not receive required arguments: {}", .missing.join(", "))]
    MissingRequiredArguments { task: String, missing: Vec<String> },

    #[error("{message}")]
    Derivation {
        task: String,
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("Received invalid path {value} for path-taking parameter '{param}' of {task}()")]
    InvalidPath {
        task: String,
        param: String,
        value: String,
    },

    #[error("Failed to save return value of {task}() to {}: {source}", .path.display())]
    CacheSave {
        task: String,
        path: PathBuf,
        #[source]
        source: BoxError,
    },

    #[error("Return value of {task}() is not representable as JSON: {source}")]
    ReturnValue {
        task: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid definition for task '{task}': {message}")]
    Definition { task: String, message: String },

    #[error("Invalid task name {name:?}: {reason}")]
    InvalidTaskName { name: String, reason: String },

    #[error("No task named '{name}'")]
    UnknownTask { name: String },

    #[error("{task}() failed: {source}")]
    Task {
        task: String,
        #[source]
        source: BoxError,
    },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias for task operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn derivation(task: &str, message: impl Into<String>) -> Self {
        Error::Derivation {
            task: task.to_string(),
            message: message.into(),
            source: None,
        }
    }

    pub(crate) fn derivation_from(
        task: &str,
        message: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        Error::Derivation {
            task: task.to_string(),
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub(crate) fn definition(task: &str, message: impl Into<String>) -> Self {
        Error::Definition {
            task: task.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Error::Io {
            context: context.into(),
            source,
        }
    }

    /// True for errors raised while binding or deriving arguments
    pub fn is_resolution_error(&self) -> bool {
        matches!(
            self,
            Error::ArgumentCount { .. }
                | Error::UnexpectedKeyword { .. }
                | Error::DuplicateArgument { .. }
                | Error::MissingRequiredArguments { .. }
                | Error::Derivation { .. }
        )
    }
}
