/// Skip/execute orchestration around a task body
///
/// Per call:
/// `START -> CLEAN? -> CLEANED | CHECK -> {SKIP+LOAD, SKIP+LOAD FAILED -> RUN, STALE -> RUN} -> RUN -> PERSIST`
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

use super::args::RunOverrides;
use super::call::CallInfo;
use super::fingerprint::FlagChecker;
use super::staleness::{timestamp_differ, SkipResult};
use super::value_cache::ReturnValueCache;
use crate::error::Result;
use crate::logging::{operations, status};
use crate::storage::{CachePath, CacheStore};

/// What a call of a skippable task ended with
#[derive(Debug, Clone, PartialEq)]
pub enum CallOutcome<R> {
    /// The body ran
    Ran(R),
    /// The body was skipped and the saved value returned
    Cached(R),
    /// Outputs and saved state were removed without running the body
    Cleaned(CleanReport),
}

impl<R> CallOutcome<R> {
    /// The task's value, `None` for a clean
    pub fn into_value(self) -> Option<R> {
        match self {
            CallOutcome::Ran(value) | CallOutcome::Cached(value) => Some(value),
            CallOutcome::Cleaned(_) => None,
        }
    }

    pub fn was_skipped(&self) -> bool {
        matches!(self, CallOutcome::Cached(_))
    }

    pub fn map<T>(self, f: impl FnOnce(R) -> T) -> CallOutcome<T> {
        match self {
            CallOutcome::Ran(value) => CallOutcome::Ran(f(value)),
            CallOutcome::Cached(value) => CallOutcome::Cached(f(value)),
            CallOutcome::Cleaned(report) => CallOutcome::Cleaned(report),
        }
    }
}

/// Summary of a clean request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanReport {
    /// Output files or directories that existed and were removed
    pub removed: usize,
    pub message: String,
}

impl CleanReport {
    fn new(removed: usize) -> Self {
        Self {
            removed,
            message: format!("Cleaned all {removed} output files!"),
        }
    }
}

/// Decides between running a task body and returning its saved value
#[derive(Debug, Clone)]
pub struct Skippable {
    checker: FlagChecker,
    cache: ReturnValueCache,
}

impl Skippable {
    pub fn new(store: CacheStore) -> Self {
        Self {
            checker: FlagChecker::new(store.marker_dir_name()),
            cache: ReturnValueCache::new(store),
        }
    }

    pub fn checker(&self) -> &FlagChecker {
        &self.checker
    }

    pub fn cache(&self) -> &ReturnValueCache {
        &self.cache
    }

    /// Flag check first, then timestamps; the first failing verdict wins
    pub fn check(&self, call: &CallInfo, fingerprint: &str) -> Result<SkipResult> {
        let flags = self.checker.can_skip(call, fingerprint)?;
        let timestamps = timestamp_differ(&call.input_paths, &call.output_paths)?;
        Ok(if flags.skippable { timestamps } else { flags })
    }

    /// Remove outputs, markers and every saved value of the task
    pub fn clean(&self, call: &CallInfo) -> Result<CleanReport> {
        debug!(
            task = call.name.as_str(),
            outputs = ?call.output_paths,
            "cleaning"
        );
        let mut removed = 0;
        for output in &call.output_paths {
            if CachePath::new(output).rm()? {
                removed += 1;
            }
        }
        self.checker.clear(call)?;
        self.cache.remove_task(&call.name)?;
        Ok(CleanReport::new(removed))
    }

    pub fn run<R, F>(&self, call: &CallInfo, overrides: RunOverrides, body: F) -> Result<CallOutcome<R>>
    where
        R: Serialize + DeserializeOwned,
        F: FnOnce() -> Result<R>,
    {
        let task = call.name.as_str();

        if overrides.clean {
            let report = self.clean(call)?;
            info!(
                task,
                operation = operations::CLEAN,
                removed = report.removed,
                "{}",
                report.message
            );
            if !overrides.force_run {
                return Ok(CallOutcome::Cleaned(report));
            }
        }

        let fingerprint = self.checker.fingerprint(call);
        let verdict = self.check(call, &fingerprint)?;
        debug!(
            task,
            operation = operations::CHECK,
            inputs = ?call.input_paths,
            outputs = ?call.output_paths,
            "{}skipping {task} because {}",
            if verdict.skippable { "" } else { "not " },
            verdict.reason
        );

        if verdict.skippable && !overrides.force_run {
            match self.cache.load::<R>(call) {
                Ok(Some(value)) => {
                    debug!(task, operation = operations::LOAD, status = status::SKIPPED, "returning saved value");
                    return Ok(CallOutcome::Cached(value));
                }
                Ok(None) => debug!(
                    task,
                    operation = operations::LOAD,
                    status = status::MISS,
                    "no saved return value, running"
                ),
                Err(e) => debug!(
                    task,
                    operation = operations::LOAD,
                    status = status::ERROR,
                    error = %e,
                    "failed to load saved return value, running"
                ),
            }
        }

        debug!(task, operation = operations::RUN, "running");
        let value = body()?;

        self.checker.record(call, &fingerprint)?;
        self.cache.save(call, &fingerprint, &value)?;
        Ok(CallOutcome::Ran(value))
    }
}
