//! Directory fingerprint: SHA-256 over every tracked file.
//!
//! Tracked files are all regular files under the root except hidden ones (any
//! path component starting with `.`). Each file contributes
//!
//! ```text
//! <relative path, '/' separated> 0x00 <len as u64 LE> <bytes>
//! ```
//!
//! in ascending relative-path order, so the digest does not depend on the
//! order in which the filesystem yields directory entries.

use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::error::{io_err, SyncError};

/// Hex-encoded SHA-256 digest of a directory snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SnapshotHash(pub String);

impl fmt::Display for SnapshotHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl SnapshotHash {
    /// First 12 hex digits, for log lines.
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }
}

/// A file included in snapshots.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct TrackedFile {
    /// Path relative to the root, `/` separated.
    pub relative: String,
    pub path: PathBuf,
}

/// Stateless fingerprinting helpers.
pub struct DirectoryFingerprint;

impl DirectoryFingerprint {
    /// Every tracked file under `root`, sorted by relative path.
    pub fn tracked_files(root: &Path) -> Result<Vec<TrackedFile>, SyncError> {
        let mut files = Vec::new();
        let mut dirs = vec![root.to_path_buf()];
        let mut cursor = 0;
        while cursor < dirs.len() {
            let current = dirs[cursor].clone();
            cursor += 1;
            let entries = std::fs::read_dir(&current).map_err(|e| io_err(&current, e))?;
            for entry in entries {
                let entry = entry.map_err(|e| io_err(&current, e))?;
                if is_hidden_name(&entry.file_name().to_string_lossy()) {
                    continue;
                }
                let path = entry.path();
                let ty = entry.file_type().map_err(|e| io_err(&path, e))?;
                if ty.is_dir() {
                    dirs.push(path);
                } else if path.is_file() {
                    let Some(relative) = relative_key(root, &path) else {
                        continue;
                    };
                    files.push(TrackedFile { relative, path });
                }
            }
        }
        files.sort();
        Ok(files)
    }

    /// Fingerprint the directory at `root`.
    pub fn compute(root: &Path) -> Result<SnapshotHash, SyncError> {
        let files = Self::tracked_files(root)?;
        Self::compute_files(&files)
    }

    /// Fingerprint an already-collected file list, streaming each file into
    /// the hasher.
    pub fn compute_files(files: &[TrackedFile]) -> Result<SnapshotHash, SyncError> {
        let mut sorted: Vec<&TrackedFile> = files.iter().collect();
        sorted.sort_by(|a, b| a.relative.cmp(&b.relative));

        let mut hasher = Sha256::new();
        for file in sorted {
            let handle = File::open(&file.path).map_err(|e| io_err(&file.path, e))?;
            let len = handle.metadata().map_err(|e| io_err(&file.path, e))?.len();
            hasher.update(file.relative.as_bytes());
            hasher.update([0u8]);
            hasher.update(len.to_le_bytes());
            let copied =
                io::copy(&mut handle.take(len), &mut hasher).map_err(|e| io_err(&file.path, e))?;
            if copied != len {
                let truncated = io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("file shrank while hashing ({copied} of {len} bytes)"),
                );
                return Err(io_err(&file.path, truncated));
            }
        }
        Ok(SnapshotHash(hex::encode(hasher.finalize())))
    }

    /// Fingerprint `(relative path, bytes)` pairs given in any order.
    pub fn from_entries<I>(entries: I) -> SnapshotHash
    where
        I: IntoIterator<Item = (String, Vec<u8>)>,
    {
        let mut entries: Vec<(String, Vec<u8>)> = entries.into_iter().collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        let mut hasher = Sha256::new();
        for (relative, bytes) in &entries {
            hasher.update(relative.as_bytes());
            hasher.update([0u8]);
            hasher.update((bytes.len() as u64).to_le_bytes());
            hasher.update(bytes);
        }
        SnapshotHash(hex::encode(hasher.finalize()))
    }
}

/// `true` for dot-files and dot-directories.
pub fn is_hidden_name(name: &str) -> bool {
    name.starts_with('.')
}

/// `true` when any component of `path` below `root` is hidden.
pub fn is_hidden_path(root: &Path, path: &Path) -> bool {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative.components().any(|c| match c {
        Component::Normal(name) => is_hidden_name(&name.to_string_lossy()),
        _ => false,
    })
}

fn relative_key(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}
