// Library interface for magictask
// Tasks with argument derivation from a nested configuration and make-like
// skipping of up-to-date calls.

pub mod collection;
pub mod context;
pub mod error;
pub mod logging;
pub mod settings;
pub mod settings_discovery;
pub mod storage;
pub mod task;

// Re-export commonly used types
pub use collection::{Collection, Invoke, Registrar};
pub use context::{Config, Context, CtxPath, LookupError};
pub use error::{Error, Result};
pub use settings::Settings;
pub use settings_discovery::discover_settings;
pub use storage::{default_cache_dir, CachePath, CacheStore};
pub use task::{
    Arguments, CallArgs, CallOutcome, CleanReport, Param, ParamDefault, Signature, Task,
    TaskBuilder, TypeTag,
};
