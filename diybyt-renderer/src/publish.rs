//! Slot table: generation-guarded atomic publishing.
//!
//! Every reconciliation opens a new [`Generation`] and claims the slots it
//! assigns. A render loop may only publish into a slot whose claim still
//! carries the loop's own generation, so a loop that was cancelled mid-cycle
//! can never overwrite the output of the loop that replaced it.
//!
//! ## Publish protocol
//!
//! 1. Copy the rendered file to `<slot_dir>/.slot<N>.gif.<gen>.tmp`
//!    (same filesystem as the target, outside the lock).
//! 2. Take the claims lock.
//! 3. Claim for slot N still equals `gen`? Rename the temp file onto
//!    `slot<N>.gif` (atomic on POSIX). Otherwise delete it.
//!
//! Claiming also happens under the lock, so a stale writer either finished its
//! rename before the new generation claimed the slot (and will be overwritten
//! by the new owner's first publish) or sees the newer claim and backs off.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::sync::Mutex;

use diybyt_core::slots::{parse_slot_file_name, slot_path};

use crate::error::{io_err, RenderError};

/// Monotonic reconciliation counter.
pub type Generation = u64;

/// Result of a publish attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// The slot file now holds the new render.
    Published { path: PathBuf },
    /// The slot belongs to another generation (or to nobody); nothing written.
    Superseded { owner: Option<Generation> },
}

/// Shared owner of the slot output directory.
#[derive(Debug)]
pub struct SlotTable {
    dir: PathBuf,
    claims: Mutex<BTreeMap<usize, Generation>>,
}

impl SlotTable {
    /// Open the slot directory, creating it and discarding temp files left
    /// behind by an earlier process.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, RenderError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| io_err(&dir, e))?;
        for entry in std::fs::read_dir(&dir).map_err(|e| io_err(&dir, e))? {
            let entry = entry.map_err(|e| io_err(&dir, e))?;
            let name = entry.file_name();
            if is_publish_temp(&name.to_string_lossy()) {
                let path = entry.path();
                if let Err(err) = std::fs::remove_file(&path) {
                    tracing::warn!(path = %path.display(), error = %err, "failed to remove stale slot temp file");
                }
            }
        }
        Ok(Self {
            dir,
            claims: Mutex::new(BTreeMap::new()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Hand slots `0..count` to `generation` and release everything above.
    ///
    /// Slot files beyond `count` are deleted so the display layer never shows
    /// a program that is no longer enabled.
    pub async fn claim(&self, generation: Generation, count: usize) -> Result<(), RenderError> {
        let mut claims = self.claims.lock().await;
        claims.clear();
        for slot in 0..count {
            claims.insert(slot, generation);
        }
        self.remove_slot_files_from(count).await
    }

    /// Current owner of `slot`, if any.
    pub async fn owner(&self, slot: usize) -> Option<Generation> {
        self.claims.lock().await.get(&slot).copied()
    }

    /// Publish `rendered` into `slot` on behalf of `generation`.
    pub async fn publish(
        &self,
        slot: usize,
        generation: Generation,
        rendered: &Path,
    ) -> Result<PublishOutcome, RenderError> {
        let target = slot_path(&self.dir, slot);
        let staged = self.dir.join(format!(".slot{slot}.gif.{generation}.tmp"));

        tokio::fs::copy(rendered, &staged)
            .await
            .map_err(|e| io_err(&staged, e))?;

        let claims = self.claims.lock().await;
        let owner = claims.get(&slot).copied();
        if owner != Some(generation) {
            drop(claims);
            let _ = tokio::fs::remove_file(&staged).await;
            return Ok(PublishOutcome::Superseded { owner });
        }

        if let Err(e) = tokio::fs::rename(&staged, &target).await {
            let _ = tokio::fs::remove_file(&staged).await;
            return Err(io_err(&target, e));
        }
        Ok(PublishOutcome::Published { path: target })
    }

    /// Indices of the slot files currently on disk, ascending.
    pub async fn published_slots(&self) -> Result<Vec<usize>, RenderError> {
        let mut slots = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|e| io_err(&self.dir, e))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| io_err(&self.dir, e))?
        {
            if let Some(slot) = parse_slot_file_name(&entry.file_name().to_string_lossy()) {
                slots.push(slot);
            }
        }
        slots.sort_unstable();
        Ok(slots)
    }

    async fn remove_slot_files_from(&self, first_unassigned: usize) -> Result<(), RenderError> {
        for slot in self.published_slots().await? {
            if slot < first_unassigned {
                continue;
            }
            let path = slot_path(&self.dir, slot);
            match tokio::fs::remove_file(&path).await {
                Ok(()) => tracing::debug!(slot, "removed unassigned slot file"),
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(err) => return Err(io_err(&path, err)),
            }
        }
        Ok(())
    }
}

fn is_publish_temp(name: &str) -> bool {
    name.starts_with(".slot") && name.ends_with(".tmp")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn rendered(dir: &TempDir, name: &str, body: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, body).expect("write rendered");
        path
    }

    #[tokio::test]
    async fn owner_publishes_atomically() {
        let work = TempDir::new().expect("work");
        let table = SlotTable::open(work.path().join("gifs")).expect("open");
        table.claim(1, 2).await.expect("claim");

        let src = rendered(&work, "a.gif", b"GIF89a-a");
        let outcome = table.publish(0, 1, &src).await.expect("publish");
        let path = slot_path(table.dir(), 0);
        assert_eq!(outcome, PublishOutcome::Published { path: path.clone() });
        assert_eq!(std::fs::read(&path).expect("read slot"), b"GIF89a-a");
        assert!(src.exists(), "publish must not consume the rendered file");

        let leftovers: Vec<_> = std::fs::read_dir(table.dir())
            .expect("read dir")
            .filter_map(|e| e.ok())
            .filter(|e| is_publish_temp(&e.file_name().to_string_lossy()))
            .collect();
        assert!(leftovers.is_empty(), "temp file must be renamed away");
    }

    #[tokio::test]
    async fn superseded_generation_cannot_overwrite_slot() {
        let work = TempDir::new().expect("work");
        let table = SlotTable::open(work.path().join("gifs")).expect("open");

        table.claim(1, 1).await.expect("claim gen 1");
        table.claim(2, 1).await.expect("claim gen 2");

        let fresh = rendered(&work, "fresh.gif", b"new owner");
        table.publish(0, 2, &fresh).await.expect("publish gen 2");

        let stale = rendered(&work, "stale.gif", b"old owner");
        let outcome = table.publish(0, 1, &stale).await.expect("publish gen 1");
        assert_eq!(outcome, PublishOutcome::Superseded { owner: Some(2) });
        assert_eq!(
            std::fs::read(slot_path(table.dir(), 0)).expect("read slot"),
            b"new owner"
        );
    }

    #[tokio::test]
    async fn shrinking_claim_removes_unassigned_slot_files() {
        let work = TempDir::new().expect("work");
        let table = SlotTable::open(work.path().join("gifs")).expect("open");
        table.claim(1, 3).await.expect("claim");
        let src = rendered(&work, "x.gif", b"x");
        for slot in 0..3 {
            table.publish(slot, 1, &src).await.expect("publish");
        }

        table.claim(2, 1).await.expect("shrink");
        assert_eq!(table.published_slots().await.expect("list"), vec![0]);
        assert_eq!(table.owner(0).await, Some(2));
        assert_eq!(table.owner(1).await, None);

        let outcome = table.publish(2, 1, &src).await.expect("publish released");
        assert_eq!(outcome, PublishOutcome::Superseded { owner: None });
    }

    #[test]
    fn open_discards_stale_temp_files() {
        let work = TempDir::new().expect("work");
        let dir = work.path().join("gifs");
        std::fs::create_dir_all(&dir).expect("mkdir");
        std::fs::write(dir.join(".slot0.gif.7.tmp"), b"partial").expect("write temp");
        std::fs::write(dir.join("slot0.gif"), b"whole").expect("write slot");

        SlotTable::open(&dir).expect("open");
        assert!(!dir.join(".slot0.gif.7.tmp").exists());
        assert!(dir.join("slot0.gif").exists());
    }
}
