// SPDX-License-Identifier: GPL-3.0-only

//! Storage layout
//!
//! One directory per session under the public pictures root, one numbered
//! JPEG per sampled frame. The directory and file names are the only
//! persisted session state; there is no manifest.

use crate::constants::{FRAME_FILE_EXTENSION, FRAME_FILE_PREFIX};
use crate::errors::SessionError;
use std::path::{Path, PathBuf};
use tracing::info;

/// Root directory session folders are created under: the configured
/// override, the system pictures directory, or the working directory.
pub fn pictures_root(configured: Option<&Path>) -> PathBuf {
    if let Some(root) = configured {
        return root.to_path_buf();
    }
    dirs::picture_dir().unwrap_or_else(|| PathBuf::from("."))
}

/// Create the session directory. Idempotent: an existing directory is fine.
pub fn create_session_dir(path: &Path) -> Result<(), SessionError> {
    std::fs::create_dir_all(path).map_err(|e| SessionError::DirectoryCreate(e.to_string()))?;
    info!(path = %path.display(), "Session directory ready");
    Ok(())
}

/// Path of the stored frame with the given 1-based index.
pub fn frame_path(session_dir: &Path, index: u64) -> PathBuf {
    session_dir.join(format!(
        "{}{:03}.{}",
        FRAME_FILE_PREFIX, index, FRAME_FILE_EXTENSION
    ))
}
