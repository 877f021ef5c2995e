// Storage path utilities.
// Resolves where durable client state lives on this platform.

use std::path::PathBuf;

use directories::ProjectDirs;

const STORAGE_FILE: &str = "local_storage.json";

/// Base data directory (~/.local/share/fooddash on Linux).
pub fn data_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "fooddash").map(|dirs| dirs.data_dir().to_path_buf())
}

/// Path to the key/value storage file.
pub fn storage_path() -> Option<PathBuf> {
    data_dir().map(|dir| dir.join(STORAGE_FILE))
}
