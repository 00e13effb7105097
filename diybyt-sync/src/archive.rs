//! Zip snapshot format shared by the sync client and the render host.
//!
//! Members are the tracked files of the program directory, stored under their
//! `/`-separated relative paths in ascending order, deflate-compressed.

use std::io::{Cursor, Read, Seek, Write};
use std::path::{Component, Path};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::{io_err, SyncError};
use crate::fingerprint::TrackedFile;

/// Pack `files` (already sorted) into an in-memory zip.
pub fn pack(files: &[TrackedFile]) -> Result<Vec<u8>, SyncError> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for file in files {
        let bytes = std::fs::read(&file.path).map_err(|e| io_err(&file.path, e))?;
        writer.start_file(file.relative.as_str(), options)?;
        writer
            .write_all(&bytes)
            .map_err(|e| io_err(&file.path, e))?;
    }

    Ok(writer.finish()?.into_inner())
}

/// Extract every member of `archive` under `dest`, which must exist.
///
/// Members whose names are absolute or climb out of `dest` abort the whole
/// extraction with [`SyncError::UnsafeEntry`]. Returns the number of files
/// written.
pub fn extract_into<R: Read + Seek>(archive: R, dest: &Path) -> Result<usize, SyncError> {
    let mut archive = ZipArchive::new(archive)?;
    let mut written = 0usize;

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        let name = entry.name().to_string();
        let relative = entry
            .enclosed_name()
            .map(|p| p.to_path_buf())
            .filter(|p| is_plain_relative(p))
            .ok_or_else(|| SyncError::UnsafeEntry { name: name.clone() })?;
        let target = dest.join(&relative);

        if entry.is_dir() {
            std::fs::create_dir_all(&target).map_err(|e| io_err(&target, e))?;
            continue;
        }

        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
        }
        let mut out = std::fs::File::create(&target).map_err(|e| io_err(&target, e))?;
        std::io::copy(&mut entry, &mut out).map_err(|e| io_err(&target, e))?;
        written += 1;
    }

    Ok(written)
}

fn is_plain_relative(path: &Path) -> bool {
    !path.as_os_str().is_empty() && path.components().all(|c| matches!(c, Component::Normal(_)))
}
