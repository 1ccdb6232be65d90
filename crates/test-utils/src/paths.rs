//! Locating bundled test inputs and scratch directories.

use std::path::{Path, PathBuf};

/// Workspace root, two levels above this crate's manifest.
pub fn workspace_root() -> PathBuf {
    let here = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    here.ancestors().nth(2).map(Path::to_path_buf).unwrap_or(here)
}

/// `services/<service>/testdata/` under the workspace root.
pub fn service_testdata_dir(service: &str) -> PathBuf {
    workspace_root().join("services").join(service).join("testdata")
}

/// First existing candidate for a test input called `name`.
///
/// Looks in `$TEST_DATA_DIR`, then the skill runner's testdata, then
/// `testdata/` at the workspace root.
pub fn find_test_file(name: &str) -> Option<PathBuf> {
    let from_env = std::env::var_os("TEST_DATA_DIR").map(|dir| PathBuf::from(dir).join(name));
    let root = workspace_root();
    from_env
        .into_iter()
        .chain([
            service_testdata_dir("skill-runner").join(name),
            root.join("testdata").join(name),
        ])
        .find(|p| p.exists())
}

/// Scratch directory removed on drop.
pub fn temp_test_dir() -> tempfile::TempDir {
    tempfile::tempdir().expect("Failed to create temporary test directory")
}

/// Write `contents` to `dir/name`.
pub fn write_test_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).expect("Failed to write test file");
    path
}
