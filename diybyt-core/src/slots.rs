//! Positional slot assignment.
//!
//! Slot files are addressed purely by index (`slot0.gif`, `slot1.gif`, ...),
//! so assignment is a function of input order only.

use std::path::{Path, PathBuf};

use crate::types::ProgramName;

/// `slot<index>.gif`
pub fn slot_file_name(index: usize) -> String {
    format!("slot{index}.gif")
}

/// `<slot_dir>/slot<index>.gif` (pure, no I/O).
pub fn slot_path(slot_dir: &Path, index: usize) -> PathBuf {
    slot_dir.join(slot_file_name(index))
}

/// Parse a slot index back out of a file name produced by [`slot_file_name`].
pub fn parse_slot_file_name(name: &str) -> Option<usize> {
    let digits = name.strip_prefix("slot")?.strip_suffix(".gif")?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Ordered program → slot mapping. Indices are contiguous from 0.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlotAssignment {
    entries: Vec<(ProgramName, usize)>,
}

impl SlotAssignment {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Slot index for `name`, if assigned.
    pub fn slot_of(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .find(|(program, _)| program.as_str() == name)
            .map(|(_, slot)| *slot)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ProgramName, usize)> {
        self.entries.iter().map(|(name, slot)| (name, *slot))
    }
}

/// Stateless assigner: the i-th program gets slot i.
#[derive(Debug, Clone, Copy, Default)]
pub struct SlotAssigner;

impl SlotAssigner {
    pub fn assign<'a, I>(programs: I) -> SlotAssignment
    where
        I: IntoIterator<Item = &'a ProgramName>,
    {
        let entries = programs
            .into_iter()
            .enumerate()
            .map(|(index, name)| (name.clone(), index))
            .collect();
        SlotAssignment { entries }
    }
}
