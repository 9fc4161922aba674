use curriculum_core::paths;
use std::path::{Path, PathBuf};

/// Resolve the project root.
///
/// Priority:
/// 1. `--root` flag / `CURRICULUM_ROOT` env var (passed in as `explicit`)
/// 2. Walk upward from `cwd` looking for `.curriculum/`
/// 3. Fall back to `cwd`
pub fn resolve_root(explicit: Option<&Path>) -> PathBuf {
    if let Some(p) = explicit {
        return p.to_path_buf();
    }

    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    paths::find_root(&cwd).unwrap_or(cwd)
}
