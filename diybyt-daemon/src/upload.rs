//! Applying an uploaded snapshot to the program cache.
//!
//! The archive is written to the temp dir, extracted into a fresh staging
//! directory, and only then swapped in:
//!
//! ```text
//! cache        -> cache.old      (if present)
//! cache.staging -> cache
//! cache.old    -> removed
//! ```
//!
//! Any failure before the swap leaves the existing cache untouched. Callers
//! hold the orchestrator lock for the whole operation so no reconciliation
//! observes the cache mid-swap.

use std::fs;
use std::path::Path;

use crate::error::{io_err, DaemonError};
use crate::paths::DataPaths;

const UPLOAD_ARCHIVE: &str = "upload.zip";

/// Replace the program cache with the contents of `archive`. Returns the
/// number of files extracted. Blocking; run it on the blocking pool.
pub fn apply_snapshot(archive: &[u8], paths: &DataPaths) -> Result<usize, DaemonError> {
    let temp_dir = paths.temp_dir();
    fs::create_dir_all(&temp_dir).map_err(|e| io_err(&temp_dir, e))?;
    let archive_path = temp_dir.join(UPLOAD_ARCHIVE);
    fs::write(&archive_path, archive).map_err(|e| io_err(&archive_path, e))?;

    let result = stage_and_swap(&archive_path, paths);
    let _ = fs::remove_file(&archive_path);
    result
}

fn stage_and_swap(archive_path: &Path, paths: &DataPaths) -> Result<usize, DaemonError> {
    let staging = paths.staging_dir();
    remove_dir_if_present(&staging)?;
    fs::create_dir_all(&staging).map_err(|e| io_err(&staging, e))?;

    let file = fs::File::open(archive_path).map_err(|e| io_err(archive_path, e))?;
    let extracted = match diybyt_sync::archive::extract_into(file, &staging) {
        Ok(count) => count,
        Err(err) => {
            let _ = fs::remove_dir_all(&staging);
            return Err(err.into());
        }
    };

    swap_into_place(&staging, paths)?;
    tracing::info!(files = extracted, "program cache replaced");
    Ok(extracted)
}

fn swap_into_place(staging: &Path, paths: &DataPaths) -> Result<(), DaemonError> {
    let cache = paths.cache_dir();
    let retired = paths.retired_dir();
    remove_dir_if_present(&retired)?;

    if cache.exists() {
        fs::rename(&cache, &retired).map_err(|e| io_err(&cache, e))?;
    }
    if let Err(err) = fs::rename(staging, &cache) {
        // Put the previous cache back so the host keeps serving it.
        if retired.exists() {
            let _ = fs::rename(&retired, &cache);
        }
        let _ = fs::remove_dir_all(staging);
        return Err(io_err(&cache, err));
    }
    if let Err(err) = fs::remove_dir_all(&retired) {
        if err.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(path = %retired.display(), error = %err, "failed to remove previous cache");
        }
    }
    Ok(())
}

fn remove_dir_if_present(path: &Path) -> Result<(), DaemonError> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(io_err(path, err)),
    }
}
