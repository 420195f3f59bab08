use std::path::{Path, PathBuf};

/// Expand environment variables and `~` in a path string
pub fn expand_path_str(path: &str) -> String {
    shellexpand::full(path)
        .unwrap_or_else(|_| path.into())
        .into_owned()
}

/// Expand a PathBuf with environment variables
pub fn expand_path_buf(path: &Path) -> PathBuf {
    let path_str = path.to_string_lossy();
    PathBuf::from(expand_path_str(&path_str))
}

/// Expand a path and make it relative to `base_dir` unless it is absolute
pub fn resolve_path(path: &Path, base_dir: &Path) -> PathBuf {
    let expanded_path = expand_path_buf(path);
    if expanded_path.is_absolute() {
        expanded_path
    } else {
        base_dir.join(expanded_path)
    }
}
