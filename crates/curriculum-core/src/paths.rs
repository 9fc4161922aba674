use std::path::{Path, PathBuf};

pub const CURRICULUM_DIR: &str = ".curriculum";
pub const CONFIG_FILE: &str = ".curriculum/config.yaml";

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

/// Walk upward from `start` looking for a `.curriculum/` directory.
pub fn find_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(CURRICULUM_DIR).is_dir())
        .map(Path::to_path_buf)
}
