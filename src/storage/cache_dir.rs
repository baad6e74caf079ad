use std::path::PathBuf;

/// Environment variable overriding the cache root
pub const CACHE_DIR_ENV: &str = "MAGICTASK_CACHE_DIR";

/// Get default cache directory following XDG conventions
///
/// - Linux/Unix: $XDG_CACHE_HOME/magictask or ~/.cache/magictask
/// - macOS: ~/Library/Caches/magictask
/// - Windows: %LOCALAPPDATA%/magictask
pub fn default_cache_dir() -> PathBuf {
    if let Some(cache_dir) = dirs::cache_dir() {
        cache_dir.join("magictask")
    } else {
        // Fallback to current directory if we can't determine cache dir
        PathBuf::from(".magictask/cache")
    }
}

/// Pick the cache root: explicit value, then `MAGICTASK_CACHE_DIR`, then the default
pub fn resolve_cache_dir(explicit: Option<PathBuf>) -> PathBuf {
    explicit
        .or_else(|| {
            std::env::var_os(CACHE_DIR_ENV)
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
        })
        .unwrap_or_else(default_cache_dir)
}
