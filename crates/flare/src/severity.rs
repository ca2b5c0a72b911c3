//! Issue severity levels.
//!
//! Six fixed levels, ordered from least to most severe. The ordering is
//! load-bearing: stream chains are configured per severity and the dispatch
//! layer compares levels directly.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity of an issue, ordered `Debug < Log < Info < Warning < Error < Fatal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Debug,
    Log,
    Info,
    Warning,
    Error,
    Fatal,
}

impl Severity {
    /// All severities in ascending order.
    pub const ALL: [Severity; 6] = [
        Severity::Debug,
        Severity::Log,
        Severity::Info,
        Severity::Warning,
        Severity::Error,
        Severity::Fatal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Debug => "debug",
            Severity::Log => "log",
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Fatal => "fatal",
        }
    }

    /// Stable numeric form used by the foreign-boundary shape.
    pub fn ordinal(self) -> u8 {
        self as u8
    }

    /// Inverse of [`Severity::ordinal`]. `None` for out-of-range values.
    pub fn from_ordinal(value: u8) -> Option<Severity> {
        Severity::ALL.get(value as usize).copied()
    }

    /// Parse a severity name as written in configuration or serialized issues.
    pub fn from_name(name: &str) -> Option<Severity> {
        Severity::ALL.iter().copied().find(|s| s.as_str() == name)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
