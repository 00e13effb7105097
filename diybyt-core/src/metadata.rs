//! Program metadata document (`program_metadata.json`).
//!
//! # Layout
//!
//! ```text
//! <program_dir>/
//!   program_metadata.json   ({"_config": {...}, "clock.star": {...}, ...})
//!   clock.star
//!   weather.star
//! ```
//!
//! The document is read wholesale; entry order is kept exactly as written
//! (serde_json `preserve_order`), because slot numbering depends on it.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::error::{io_err, ConfigError};
use crate::types::{GlobalSettings, ProgramConfig, ProgramMetadata, ProgramName, CONFIG_KEY};

pub const METADATA_FILE: &str = "program_metadata.json";

/// `<program_dir>/program_metadata.json` (pure, no I/O).
pub fn metadata_path_at(program_dir: &Path) -> PathBuf {
    program_dir.join(METADATA_FILE)
}

/// Load and parse the metadata document in `program_dir`.
///
/// Returns `ConfigError::MetadataNotFound` if absent and
/// `ConfigError::Parse` (with path) if the JSON is malformed. Bad entries
/// inside a well-formed document are skipped, see [`from_map`].
pub fn load_at(program_dir: &Path) -> Result<ProgramMetadata, ConfigError> {
    let path = metadata_path_at(program_dir);
    if !path.exists() {
        return Err(ConfigError::MetadataNotFound { path });
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    let root: Map<String, Value> =
        serde_json::from_str(&contents).map_err(|e| ConfigError::Parse { path, source: e })?;
    Ok(from_map(root))
}

/// Parse a metadata document held in memory.
pub fn parse(contents: &str) -> Result<ProgramMetadata, ConfigError> {
    let root: Map<String, Value> =
        serde_json::from_str(contents).map_err(|e| ConfigError::Parse {
            path: PathBuf::from(METADATA_FILE),
            source: e,
        })?;
    Ok(from_map(root))
}

/// Build a [`ProgramMetadata`] from the document's top-level object.
///
/// An entry that cannot be read is logged and left out; the rest of the
/// document still counts. A bad `_config` falls back to defaults.
pub fn from_map(root: Map<String, Value>) -> ProgramMetadata {
    let mut metadata = ProgramMetadata::default();
    for (key, value) in root {
        if key == CONFIG_KEY {
            match serde_json::from_value::<GlobalSettings>(value) {
                Ok(settings) => metadata.settings = settings,
                Err(err) => {
                    tracing::warn!(error = %err, "invalid _config entry, using defaults");
                }
            }
            continue;
        }
        match parse_program(&key, value) {
            Ok(program) => metadata.programs.push(program),
            Err(err) => tracing::warn!(program = %key, error = %err, "skipping program entry"),
        }
    }
    metadata
}

/// Parse one program entry; `name` is its document key.
pub fn parse_program(name: &str, value: Value) -> Result<ProgramConfig, ConfigError> {
    let mut program =
        serde_json::from_value::<ProgramConfig>(value).map_err(|e| ConfigError::InvalidProgram {
            name: name.to_owned(),
            source: e,
        })?;
    program.name = ProgramName::from(name);
    Ok(program)
}

/// Render server URL from the document in `program_dir`, falling back to the
/// default when the document is missing, malformed, or has no `_config`.
pub fn render_server_url_at(program_dir: &Path) -> String {
    load_at(program_dir)
        .map(|m| m.settings.render_server_url)
        .unwrap_or_else(|_| GlobalSettings::default().render_server_url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DurationUnit, DEFAULT_REFRESH_SECS, DEFAULT_RENDER_SERVER_URL};
    use tempfile::TempDir;

    #[test]
    fn document_order_is_preserved() {
        let metadata = parse(
            r#"{
                "zeta.star": {"enabled": true},
                "_config": {"render_server_url": "http://pi.local:8000"},
                "alpha.star": {"enabled": false},
                "mid.star": {"enabled": true}
            }"#,
        )
        .expect("parse");

        let names: Vec<&str> = metadata.programs.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["zeta.star", "alpha.star", "mid.star"]);
        assert_eq!(metadata.settings.render_server_url, "http://pi.local:8000");
    }

    #[test]
    fn missing_config_entry_uses_default_url() {
        let metadata = parse(r#"{"clock.star": {"enabled": true}}"#).expect("parse");
        assert_eq!(metadata.settings.render_server_url, DEFAULT_RENDER_SERVER_URL);
    }

    #[test]
    fn load_missing_document_returns_not_found() {
        let dir = TempDir::new().expect("tempdir");
        let err = load_at(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::MetadataNotFound { .. }), "got: {err}");
        assert!(err.to_string().contains(METADATA_FILE));
    }

    #[test]
    fn load_malformed_document_returns_parse_error_with_path() {
        let dir = TempDir::new().expect("tempdir");
        std::fs::write(metadata_path_at(dir.path()), b"{ not json").expect("write");
        let err = load_at(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }), "got: {err}");
        assert!(err.to_string().contains(METADATA_FILE));
    }

    #[test]
    fn top_level_array_is_a_parse_error() {
        let err = parse("[1, 2, 3]").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }), "got: {err}");
    }

    #[test]
    fn invalid_program_entry_names_the_program() {
        let err = parse_program("clock.star", serde_json::json!({"enabled": "maybe"})).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidProgram { .. }), "got: {err}");
        assert!(err.to_string().contains("clock.star"));
    }

    #[test]
    fn one_bad_entry_leaves_the_others_in_place() {
        let metadata = parse(
            r#"{
                "a.star": {"enabled": true},
                "b.star": {"enabled": true, "durationUnit": "Seconds", "refresh_rate": null},
                "c.star": {"enabled": true, "duration": "long"},
                "d.star": 42,
                "e.star": {"enabled": "yes"}
            }"#,
        )
        .expect("parse");

        let names: Vec<&str> = metadata.enabled().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["a.star", "b.star", "e.star"]);
        let b = metadata.get("b.star").expect("b.star");
        assert_eq!(b.duration_unit, DurationUnit::Seconds);
        assert_eq!(b.refresh_rate, DEFAULT_REFRESH_SECS);
    }

    #[test]
    fn bad_config_entry_keeps_programs_and_default_url() {
        let metadata =
            parse(r#"{"_config": "nope", "a.star": {"enabled": true}}"#).expect("parse");
        assert_eq!(metadata.settings.render_server_url, DEFAULT_RENDER_SERVER_URL);
        assert_eq!(metadata.enabled().count(), 1);
    }

    #[test]
    fn render_server_url_falls_back_when_document_missing() {
        let dir = TempDir::new().expect("tempdir");
        assert_eq!(render_server_url_at(dir.path()), DEFAULT_RENDER_SERVER_URL);

        std::fs::write(
            metadata_path_at(dir.path()),
            br#"{"_config": {"render_server_url": "http://render:9000"}}"#,
        )
        .expect("write");
        assert_eq!(render_server_url_at(dir.path()), "http://render:9000");
    }
}
