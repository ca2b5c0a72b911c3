//! Stream-chain configuration.
//!
//! Configuration lives in /etc/flare/config.toml (overridable with
//! FLARE_CONFIG). Each severity maps to an ordered chain of stream
//! specifications of the form `type-name(constructor-argument)`, delimited
//! by commas or colons. A `FLARE_<SEVERITY>` environment variable overrides
//! the file for that severity.

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::error::FlareError;
use crate::severity::Severity;
use crate::stream::manager::StreamSpec;

/// Default configuration file location.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/flare/config.toml";

/// Per-severity stream chains, as written in the `[streams]` table.
/// An empty string means no chain for that severity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    #[serde(default = "default_debug_chain")]
    pub debug: String,

    #[serde(default = "default_log_chain")]
    pub log: String,

    #[serde(default = "default_info_chain")]
    pub info: String,

    #[serde(default = "default_warning_chain")]
    pub warning: String,

    #[serde(default = "default_error_chain")]
    pub error: String,

    #[serde(default = "default_fatal_chain")]
    pub fatal: String,
}

fn default_debug_chain() -> String {
    "null".to_string()
}

fn default_log_chain() -> String {
    "null".to_string()
}

fn default_info_chain() -> String {
    "human(stdout)".to_string()
}

fn default_warning_chain() -> String {
    "human(stderr)".to_string()
}

fn default_error_chain() -> String {
    "human(stderr)".to_string()
}

fn default_fatal_chain() -> String {
    "human(stderr)".to_string()
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            debug: default_debug_chain(),
            log: default_log_chain(),
            info: default_info_chain(),
            warning: default_warning_chain(),
            error: default_error_chain(),
            fatal: default_fatal_chain(),
        }
    }
}

impl StreamConfig {
    /// Chain string configured for `severity`, before env overrides.
    pub fn chain_for(&self, severity: Severity) -> &str {
        match severity {
            Severity::Debug => &self.debug,
            Severity::Log => &self.log,
            Severity::Info => &self.info,
            Severity::Warning => &self.warning,
            Severity::Error => &self.error,
            Severity::Fatal => &self.fatal,
        }
    }

    /// Parsed chain for `severity`. A `FLARE_<SEVERITY>` environment
    /// variable (e.g. `FLARE_ERROR`) takes precedence over the file.
    pub fn resolved_chain(&self, severity: Severity) -> Result<Vec<StreamSpec>, FlareError> {
        let env_key = format!("FLARE_{}", severity.as_str().to_uppercase());
        match env::var(&env_key) {
            Ok(value) => parse_chain(&value),
            Err(_) => parse_chain(self.chain_for(severity)),
        }
    }
}

/// Whole configuration file.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FlareConfig {
    #[serde(default)]
    pub streams: StreamConfig,
}

impl FlareConfig {
    /// Load from FLARE_CONFIG or the system path, falling back to defaults.
    pub fn load() -> Self {
        let path = env::var("FLARE_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(SYSTEM_CONFIG_PATH));
        Self::load_from(&path)
    }

    /// Load from an explicit path. Missing or unparseable files fall back
    /// to defaults with a warning, so a broken config never takes issue
    /// reporting down with it.
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => config,
                Err(err) => {
                    warn!("unparseable config {}: {err}; using defaults", path.display());
                    Self::default()
                }
            },
            Err(err) => {
                warn!("unreadable config {}: {err}; using defaults", path.display());
                Self::default()
            }
        }
    }
}

/// Parse a chain string into ordered stream specifications.
///
/// Entries are `name` or `name(argument)`, separated by `,` or `:`;
/// delimiters inside parentheses do not split, so `xml(/var/a,b.xml)`
/// stays one entry. Empty segments are skipped; an all-empty string is an
/// empty chain.
pub fn parse_chain(input: &str) -> Result<Vec<StreamSpec>, FlareError> {
    let mut specs = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    for (i, c) in input.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                if depth == 0 {
                    return Err(FlareError::BadStreamSpec {
                        spec: input.to_string(),
                    });
                }
                depth -= 1;
            }
            ',' | ':' if depth == 0 => {
                push_spec(&mut specs, &input[start..i])?;
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(FlareError::BadStreamSpec {
            spec: input.to_string(),
        });
    }
    push_spec(&mut specs, &input[start..])?;
    Ok(specs)
}

fn push_spec(out: &mut Vec<StreamSpec>, raw: &str) -> Result<(), FlareError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(());
    }
    let bad = || FlareError::BadStreamSpec {
        spec: raw.to_string(),
    };
    let (name, arg) = match raw.find('(') {
        Some(open) => {
            if !raw.ends_with(')') {
                return Err(bad());
            }
            (&raw[..open], &raw[open + 1..raw.len() - 1])
        }
        None => (raw, ""),
    };
    let name = name.trim();
    if name.is_empty() || name.contains(|c: char| c.is_whitespace() || c == ')') {
        return Err(bad());
    }
    out.push(StreamSpec {
        name: name.to_string(),
        arg: arg.trim().to_string(),
    });
    Ok(())
}
