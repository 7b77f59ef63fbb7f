use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// An empty directory standing in for a volume root.
pub fn create_test_root() -> TempDir {
    TempDir::new().unwrap()
}

/// Write `content` to `name` under `root`, creating missing parent folders.
pub fn create_test_file(root: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = root.path().join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
    path
}
