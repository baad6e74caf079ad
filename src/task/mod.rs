//! Tasks with argument derivation and skip/cache orchestration
//!
//! A [`Task`] wraps a body closure with an explicit [`Signature`]. Two layers
//! can be switched on independently when building it:
//!
//! - argument derivation: missing arguments are filled from the context
//!   configuration, a `derive_kwargs` callback and callable defaults
//! - skipping: the body is skipped when outputs are newer than inputs and
//!   were produced with the same behavior flags, returning the saved value
//!
//! ```no_run
//! use magictask::task::{Param, Signature, Task};
//! use magictask::{CallArgs, Config, Context};
//!
//! let task = Task::magic(
//!     "count_lines",
//!     Signature::new(vec![Param::required("input_path"), Param::required("output_path")]),
//!     |_ctx, args| {
//!         let text = std::fs::read_to_string(args.path("input_path")?)?;
//!         let count = text.lines().count();
//!         std::fs::write(args.path("output_path")?, count.to_string())?;
//!         Ok(count)
//!     },
//! )
//! .build()?;
//!
//! let ctx = Context::new(Config::from_toml_str(
//!     "[count_lines]\ninput_path = 'in.txt'\noutput_path = 'count.txt'",
//! )?);
//! let lines = task.call(Some(&ctx), CallArgs::new())?.into_value();
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod args;
pub mod call;
pub mod classify;
pub mod fingerprint;
pub mod resolve;
pub mod signature;
pub mod skippable;
pub mod staleness;
pub mod value_cache;

pub use args::{Arguments, CallArgs, RunOverrides};
pub use call::CallInfo;
pub use classify::{classify, Classification, ParamRole};
pub use fingerprint::FlagChecker;
pub use resolve::{ConfigSource, DeriveFn, Resolver};
pub use signature::{Param, ParamDefault, Signature, TypeTag, CLEAN_FLAG, FORCE_RUN_FLAG};
pub use skippable::{CallOutcome, CleanReport, Skippable};
pub use staleness::{timestamp_differ, SkipResult};
pub use value_cache::{CacheEntry, CacheMetadata, CacheStats, ReturnValueCache};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::{Arc, OnceLock};
use tracing::debug;

use crate::context::{Context, CtxPath};
use crate::error::{Error, Result};
use crate::storage::{validate_task_name, CacheStore};

/// Body of a task: receives the context (if any) and the bound arguments
pub type TaskBody<R> = Arc<dyn Fn(Option<&Context>, &Arguments) -> anyhow::Result<R> + Send + Sync>;

/// A callable unit with an explicit parameter contract
pub struct Task<R> {
    name: String,
    signature: Arc<Signature>,
    body: TaskBody<R>,
    config_source: ConfigSource,
    derive: Option<DeriveFn>,
    skippable: Option<Skippable>,
    version: Option<String>,
    classification: OnceLock<Classification>,
}

impl<R> fmt::Debug for Task<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("signature", &self.signature)
            .field("config_source", &self.config_source)
            .field("derive", &self.derive.is_some())
            .field("skippable", &self.skippable.is_some())
            .field("version", &self.version)
            .finish()
    }
}

impl<R> Task<R>
where
    R: Serialize + DeserializeOwned,
{
    /// Plain task: strict binding with defaults, no derivation, no skipping
    pub fn builder<F>(name: impl Into<String>, signature: Signature, body: F) -> TaskBuilder<R>
    where
        F: Fn(Option<&Context>, &Arguments) -> anyhow::Result<R> + Send + Sync + 'static,
    {
        TaskBuilder {
            name: name.into(),
            signature,
            body: Arc::new(body),
            derivation: Derivation::Off,
            derive: None,
            skippable: false,
            store: None,
            version: None,
        }
    }

    /// Task deriving its arguments from `ctx.<name>` and skipping up-to-date calls
    pub fn magic<F>(name: impl Into<String>, signature: Signature, body: F) -> TaskBuilder<R>
    where
        F: Fn(Option<&Context>, &Arguments) -> anyhow::Result<R> + Send + Sync + 'static,
    {
        Self::builder(name, signature, body)
            .derive_params()
            .skippable()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Strict descriptor; required parameters stay required
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Relaxed descriptor for CLI generation
    ///
    /// Every required parameter is optional, and skippable tasks with at
    /// least one output get boolean `_clean` and `_force_run` parameters.
    pub fn cli_signature(&self) -> Signature {
        let with_overrides = self.skippable.is_some() && self.classification().has_outputs();
        self.signature.relaxed(with_overrides)
    }

    /// Parameter classification, computed on first use
    pub fn classification(&self) -> &Classification {
        self.classification
            .get_or_init(|| classify::classify(&self.signature))
    }

    pub fn config_source(&self) -> &ConfigSource {
        &self.config_source
    }

    pub fn is_skippable(&self) -> bool {
        self.skippable.is_some()
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Resolve arguments without running the body
    pub fn resolve(&self, ctx: Option<&Context>, args: CallArgs) -> Result<Arguments> {
        Resolver::new(
            &self.name,
            &self.signature,
            &self.config_source,
            self.derive.as_ref(),
        )
        .resolve(ctx, args)
    }

    /// Call the task
    ///
    /// `_clean` and `_force_run` keywords are accepted by skippable tasks only.
    pub fn call(&self, ctx: Option<&Context>, mut args: CallArgs) -> Result<CallOutcome<R>> {
        let overrides = if self.skippable.is_some() {
            args.take_overrides()
        } else {
            RunOverrides::default()
        };

        let arguments = self.resolve(ctx, args)?;
        debug!(task = self.name.as_str(), args = arguments.len(), "resolved arguments");

        let Some(skippable) = &self.skippable else {
            return self.invoke(ctx, &arguments).map(CallOutcome::Ran);
        };

        let call = CallInfo::bind(
            &self.name,
            self.classification(),
            arguments,
            self.version.as_deref(),
        )?;
        skippable.run(&call, overrides, || self.invoke(ctx, &call.args))
    }

    fn invoke(&self, ctx: Option<&Context>, arguments: &Arguments) -> Result<R> {
        (self.body)(ctx, arguments).map_err(|e| Error::Task {
            task: self.name.clone(),
            source: e.into(),
        })
    }
}

#[derive(Debug, Clone)]
enum Derivation {
    Off,
    Implicit,
    Explicit(String),
}

/// Builder for [`Task`]
pub struct TaskBuilder<R> {
    name: String,
    signature: Signature,
    body: TaskBody<R>,
    derivation: Derivation,
    derive: Option<DeriveFn>,
    skippable: bool,
    store: Option<CacheStore>,
    version: Option<String>,
}

impl<R> TaskBuilder<R>
where
    R: Serialize + DeserializeOwned,
{
    /// Fill missing arguments from `ctx.<task name>`; missing keys are ignored
    pub fn derive_params(mut self) -> Self {
        if matches!(self.derivation, Derivation::Off) {
            self.derivation = Derivation::Implicit;
        }
        self
    }

    /// Fill missing arguments from an explicit dotted path; missing keys are errors
    pub fn params_from(mut self, path: impl Into<String>) -> Self {
        self.derivation = Derivation::Explicit(path.into());
        self
    }

    /// Callback producing a table of argument values, called at most once per call
    pub fn derive_kwargs<F>(mut self, derive: F) -> Self
    where
        F: Fn(&Context) -> anyhow::Result<Map<String, Value>> + Send + Sync + 'static,
    {
        self.derive = Some(Arc::new(derive));
        self.derive_params()
    }

    /// Skip calls whose outputs are up to date
    pub fn skippable(mut self) -> Self {
        self.skippable = true;
        self
    }

    /// Where return values are saved; defaults to the user cache directory
    pub fn cache_store(mut self, store: CacheStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Version string mixed into the fingerprint; bump it when the body changes
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn build(self) -> Result<Task<R>> {
        let definition_error = |message: String| Error::definition(&self.name, message);

        validate_task_name(&self.name).map_err(definition_error)?;
        self.signature.validate().map_err(definition_error)?;

        let config_source = match &self.derivation {
            Derivation::Off => ConfigSource::Disabled,
            Derivation::Implicit => {
                ConfigSource::Implicit(CtxPath::for_task(&self.name).map_err(definition_error)?)
            }
            Derivation::Explicit(path) => {
                ConfigSource::Explicit(CtxPath::parse(path).map_err(definition_error)?)
            }
        };

        if !matches!(config_source, ConfigSource::Disabled) && !self.signature.takes_context() {
            return Err(definition_error(
                "argument derivation needs a task that takes a context".to_string(),
            ));
        }

        let skippable = self.skippable.then(|| {
            Skippable::new(self.store.clone().unwrap_or_else(CacheStore::default_location))
        });

        Ok(Task {
            name: self.name,
            signature: Arc::new(self.signature),
            body: self.body,
            config_source,
            derive: self.derive,
            skippable,
            version: self.version,
            classification: OnceLock::new(),
        })
    }
}
