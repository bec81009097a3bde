//! Runtime configuration
//!
//! A flat `key -> string` property map consulted by operators at
//! construction time (for example the TIMEBOX ceiling).
//!
//! ## Sources
//!
//! Properties come from a TOML document whose nested tables are flattened into
//! dotted keys, optionally overridden by environment variables:
//!
//! ```toml
//! [tempo.timebox]
//! maxtime = 30000   # -> tempo.timebox.maxtime
//! ```
//!
//! | Variable | Key | Default |
//! |----------|-----|---------|
//! | `TEMPO_TIMEBOX_MAXTIME` | `tempo.timebox.maxtime` | `30000` (ms) |
//! | `TEMPO_TIMEBOX_GRACE` | `tempo.timebox.grace` | `50` (ms) |
//! | `TEMPO_TIME_UNITS` | `tempo.time.units` | `us` |
//! | `TEMPO_SNAPSHOT_MAXCHARS` | `tempo.snapshot.maxchars` | `1000000` |
//! | `TEMPO_JSON_MAXCHARS` | `tempo.json.maxchars` | `1000000` |

use std::collections::BTreeMap;
use std::path::Path;
use tempo_core::{Result, ScriptError};
use tracing::{debug, warn};

/// Well-known property keys
pub mod keys {
    /// Ceiling (ms) for TIMEBOX deadlines
    pub const TIMEBOX_MAXTIME: &str = "tempo.timebox.maxtime";
    /// How long (ms) a timed-out TIMEBOX waits for its worker to exit
    pub const TIMEBOX_GRACE: &str = "tempo.timebox.grace";
    /// Platform time unit: `ms`, `us` or `ns`
    pub const TIME_UNITS: &str = "tempo.time.units";
    /// Character ceiling for SNAPSHOT output
    pub const SNAPSHOT_MAXCHARS: &str = "tempo.snapshot.maxchars";
    /// Character ceiling for ->JSON output
    pub const JSON_MAXCHARS: &str = "tempo.json.maxchars";

    pub const ALL: &[&str] = &[
        TIMEBOX_MAXTIME,
        TIMEBOX_GRACE,
        TIME_UNITS,
        SNAPSHOT_MAXCHARS,
        JSON_MAXCHARS,
    ];
}

/// Flat property map
#[derive(Debug, Clone, Default)]
pub struct Properties {
    values: BTreeMap<String, String>,
}

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse properties from a TOML document
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let table: toml::Table = toml::from_str(toml_str).map_err(|e| ScriptError::Config {
            key: "<toml>".to_string(),
            message: format!("Failed to parse properties: {}", e),
        })?;
        let mut values = BTreeMap::new();
        flatten("", &table, &mut values);
        Ok(Self { values })
    }

    /// Load properties from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let props = Self::from_toml(&content)?;
        debug!(path = %path.display(), count = props.values.len(), "loaded properties");
        Ok(props)
    }

    /// Apply `TEMPO_*` environment variables for every known key
    pub fn with_env_overrides(mut self) -> Self {
        for key in keys::ALL {
            if let Ok(value) = std::env::var(env_var_name(key)) {
                self.values.insert(key.to_string(), value);
            }
        }
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Value for `key`, or `default` when unset
    pub fn get_property(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or(default).to_string()
    }

    /// Numeric value for `key`; unset or unparsable values yield `default`
    pub fn get_u64(&self, key: &str, default: u64) -> u64 {
        match self.get(key) {
            None => default,
            Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
                warn!(key, value = raw, default, "ignoring non-numeric property");
                default
            }),
        }
    }

    /// Number of platform time units in one millisecond
    pub fn time_units_per_ms(&self) -> Result<u64> {
        match self.get_property(keys::TIME_UNITS, "us").as_str() {
            "ms" => Ok(1),
            "us" => Ok(1_000),
            "ns" => Ok(1_000_000),
            other => Err(ScriptError::Config {
                key: keys::TIME_UNITS.to_string(),
                message: format!("unknown time unit '{}' (expected ms, us or ns)", other),
            }),
        }
    }
}

/// `tempo.timebox.maxtime` -> `TEMPO_TIMEBOX_MAXTIME`
pub fn env_var_name(key: &str) -> String {
    key.replace(['.', '-'], "_").to_uppercase()
}

fn flatten(prefix: &str, table: &toml::Table, out: &mut BTreeMap<String, String>) {
    for (name, value) in table {
        let key = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{}.{}", prefix, name)
        };
        match value {
            toml::Value::Table(inner) => flatten(&key, inner, out),
            toml::Value::String(s) => {
                out.insert(key, s.clone());
            }
            other => {
                out.insert(key, other.to_string());
            }
        }
    }
}
