pub mod cache_dir;
pub mod cache_path;

pub use cache_dir::{default_cache_dir, resolve_cache_dir, CACHE_DIR_ENV};
pub use cache_path::{validate_task_name, CachePath, CacheStore};

/// Namespace used when none is configured
pub const DEFAULT_NAMESPACE: &str = "magictask";
