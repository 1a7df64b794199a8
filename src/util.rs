//! Utility functions for Kujua.

use std::fs;
use std::path::Path;

use crate::error::{KujuaError, Result};

/// Maximum activity or progress file size that can be read into memory (10 MB).
///
/// Activity definitions are a few kilobytes; the progress log grows by one
/// line per completed segment. Anything near this limit is not ours.
pub const MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Read a file into a string, refusing files over `MAX_FILE_SIZE`.
pub fn read_to_string_limited(path: &Path) -> Result<String> {
    read_to_string_with_limit(path, MAX_FILE_SIZE)
}

/// Read a file into a string, refusing files over `max_size` bytes.
///
/// # Errors
///
/// Returns `Storage` if the file cannot be read and `Activity` if it is too
/// large.
pub fn read_to_string_with_limit(path: &Path, max_size: u64) -> Result<String> {
    let metadata = fs::metadata(path).map_err(|e| KujuaError::storage(path, e))?;

    let size = metadata.len();
    if size > max_size {
        return Err(KujuaError::activity(format!(
            "File {} is too large ({} bytes, max {} bytes)",
            path.display(),
            size,
            max_size
        )));
    }

    fs::read_to_string(path).map_err(|e| KujuaError::storage(path, e))
}
