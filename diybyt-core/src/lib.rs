//! DIYbyt core library: program metadata model, slot assignment, errors.
//!
//! - [`types`]: newtypes and the parsed metadata document
//! - [`metadata`]: loading `program_metadata.json` from a program directory
//! - [`slots`]: positional slot assignment for enabled programs
//! - [`error`]: [`ConfigError`]

pub mod error;
pub mod metadata;
pub mod slots;
pub mod types;

pub use error::ConfigError;
pub use slots::{slot_file_name, SlotAssigner, SlotAssignment};
pub use types::{DurationUnit, GlobalSettings, ProgramConfig, ProgramMetadata, ProgramName};
