//! Domain types for the program metadata document.
//!
//! The document is a single JSON object keyed by program name. One reserved
//! key (`_config`) holds [`GlobalSettings`]; every other key is a
//! [`ProgramConfig`]. Entry order is significant: slot numbering follows it.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Reserved top-level key holding global settings.
pub const CONFIG_KEY: &str = "_config";

/// Render server used when `_config.render_server_url` is absent.
pub const DEFAULT_RENDER_SERVER_URL: &str = "http://localhost:8000";

pub const DEFAULT_REFRESH_SECS: f64 = 60.0;
pub const DEFAULT_DURATION: f64 = 30.0;
pub const DEFAULT_ORDER: i64 = 999;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Unique program identifier. Doubles as the program's file name inside the
/// program directory (e.g. `clock.star`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProgramName(pub String);

impl ProgramName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProgramName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for ProgramName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ProgramName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// How the display layer interprets [`ProgramConfig::duration`].
///
/// Only `"loops"` (any case) selects [`DurationUnit::Loops`]; every other
/// value, `null` included, means seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DurationUnit {
    Loops,
    #[default]
    Seconds,
}

impl fmt::Display for DurationUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DurationUnit::Loops => write!(f, "loops"),
            DurationUnit::Seconds => write!(f, "seconds"),
        }
    }
}

impl<'de> Deserialize<'de> for DurationUnit {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Value::deserialize(deserializer)? {
            Value::String(s) if s.trim().eq_ignore_ascii_case("loops") => DurationUnit::Loops,
            _ => DurationUnit::Seconds,
        })
    }
}

// ---------------------------------------------------------------------------
// Domain structs
// ---------------------------------------------------------------------------

/// Settings stored under the reserved `_config` key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalSettings {
    #[serde(default = "default_render_server_url")]
    pub render_server_url: String,
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            render_server_url: default_render_server_url(),
        }
    }
}

/// One authored program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramConfig {
    /// Filled from the document key, never from the entry body.
    #[serde(skip)]
    pub name: ProgramName,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub enabled: bool,
    /// Seconds between render cycles.
    #[serde(default = "default_refresh", deserialize_with = "lenient_refresh")]
    pub refresh_rate: f64,
    /// Key/value parameters forwarded to the renderer.
    #[serde(default)]
    pub config: Map<String, Value>,
    #[serde(default = "default_duration", deserialize_with = "lenient_duration")]
    pub duration: f64,
    #[serde(rename = "durationUnit", default)]
    pub duration_unit: DurationUnit,
    /// Display hint only; slot numbering ignores it.
    #[serde(default = "default_order", deserialize_with = "lenient_order")]
    pub order: i64,
}

impl ProgramConfig {
    /// A disabled program with every field at its default.
    pub fn new(name: impl Into<ProgramName>) -> Self {
        Self {
            name: name.into(),
            enabled: false,
            refresh_rate: DEFAULT_REFRESH_SECS,
            config: Map::new(),
            duration: DEFAULT_DURATION,
            duration_unit: DurationUnit::default(),
            order: DEFAULT_ORDER,
        }
    }

    /// Refresh interval as a [`Duration`]; negative or non-finite values
    /// collapse to zero.
    pub fn refresh_interval(&self) -> Duration {
        if self.refresh_rate.is_finite() && self.refresh_rate > 0.0 {
            Duration::from_secs_f64(self.refresh_rate)
        } else {
            Duration::ZERO
        }
    }

    /// Source file for this program inside `program_dir`.
    pub fn source_path(&self, program_dir: &Path) -> PathBuf {
        program_dir.join(&self.name.0)
    }

    /// Render parameters as `(key, value)` strings, in document order.
    ///
    /// String values are passed through verbatim; other values use their
    /// JSON text.
    pub fn render_params(&self) -> Vec<(String, String)> {
        self.config
            .iter()
            .map(|(key, value)| {
                let value = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (key.clone(), value)
            })
            .collect()
    }
}

/// The parsed metadata document.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProgramMetadata {
    pub settings: GlobalSettings,
    /// Programs in document order.
    pub programs: Vec<ProgramConfig>,
}

impl ProgramMetadata {
    /// Enabled programs, preserving document order.
    pub fn enabled(&self) -> impl Iterator<Item = &ProgramConfig> {
        self.programs.iter().filter(|p| p.enabled)
    }

    pub fn get(&self, name: &str) -> Option<&ProgramConfig> {
        self.programs.iter().find(|p| p.name.0 == name)
    }
}

// ---------------------------------------------------------------------------
// Serde helpers
// ---------------------------------------------------------------------------

fn default_render_server_url() -> String {
    DEFAULT_RENDER_SERVER_URL.to_string()
}

fn default_refresh() -> f64 {
    DEFAULT_REFRESH_SECS
}

fn default_duration() -> f64 {
    DEFAULT_DURATION
}

fn default_order() -> i64 {
    DEFAULT_ORDER
}

/// Authoring tools write numbers both as JSON numbers and as strings
/// (`"duration": "30"`); accept either. `null` means "use the default".
#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(f64),
    String(String),
}

fn number_or<'de, D>(deserializer: D, default: f64) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<NumberOrString>::deserialize(deserializer)? {
        None => Ok(default),
        Some(NumberOrString::Number(n)) => Ok(n),
        Some(NumberOrString::String(s)) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| serde::de::Error::custom(format!("expected a number, got '{s}'"))),
    }
}

fn lenient_refresh<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    number_or(deserializer, DEFAULT_REFRESH_SECS)
}

fn lenient_duration<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    number_or(deserializer, DEFAULT_DURATION)
}

fn lenient_order<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = number_or(deserializer, DEFAULT_ORDER as f64)?;
    if !value.is_finite() {
        return Err(serde::de::Error::custom("expected a finite number"));
    }
    Ok(value as i64)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BoolLike {
    Bool(bool),
    Number(f64),
    String(String),
}

/// `true`/`false`, `1`/`0`, `"yes"`/`"no"`, `"on"`/`"off"`; `null` is false.
fn lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<BoolLike>::deserialize(deserializer)? {
        None => Ok(false),
        Some(BoolLike::Bool(b)) => Ok(b),
        Some(BoolLike::Number(n)) => Ok(n != 0.0),
        Some(BoolLike::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Ok(true),
            "false" | "no" | "off" | "0" | "" => Ok(false),
            _ => Err(serde::de::Error::custom(format!("expected a boolean, got '{s}'"))),
        },
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
