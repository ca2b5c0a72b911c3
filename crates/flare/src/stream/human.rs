//! Human-readable issue writer.
//!
//! Renders one issue per `send`: severity, timestamp, source position,
//! message, then the attributes as `key = value` pairs between start/end
//! markers, and the cause chain on continuation lines. Send-only.

use std::fmt::Write as _;
use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::PathBuf;

use crate::error::FlareError;
use crate::issue::Issue;
use crate::stream::Stream;

enum Sink {
    Stdout,
    Stderr,
    File(PathBuf),
}

pub struct HumanStream {
    sink: Sink,
    separator: String,
    start: String,
    end: String,
}

impl HumanStream {
    /// `arg` selects the sink: empty or `stdout`, `stderr`, or a file path
    /// (opened for append on every send).
    pub fn new(arg: &str) -> Self {
        let sink = match arg {
            "" | "stdout" => Sink::Stdout,
            "stderr" => Sink::Stderr,
            path => Sink::File(PathBuf::from(path)),
        };
        Self {
            sink,
            separator: ", ".to_string(),
            start: "[".to_string(),
            end: "]".to_string(),
        }
    }

    /// Override the attribute separator.
    pub fn with_separator(mut self, separator: &str) -> Self {
        self.separator = separator.to_string();
        self
    }

    /// Override the attribute start/end markers.
    pub fn with_markers(mut self, start: &str, end: &str) -> Self {
        self.start = start.to_string();
        self.end = end.to_string();
        self
    }
}

/// Render an issue as a single human-readable line (plus one continuation
/// line per cause).
pub(crate) fn render(issue: &dyn Issue, separator: &str, start: &str, end: &str) -> String {
    let mut out = String::new();
    let _ = write!(
        out,
        "{} {} {} {}: {} {}",
        issue.time().format("%Y-%m-%d %H:%M:%S%.3f"),
        issue.severity().as_str().to_uppercase(),
        issue.class_tag(),
        issue.context().position(),
        issue.message(),
        start,
    );
    let mut first = true;
    for (key, value) in issue.attributes() {
        if !first {
            out.push_str(separator);
        }
        first = false;
        let _ = write!(out, "{} = {}", key, value);
    }
    out.push_str(end);
    if !issue.qualifiers().is_empty() {
        let _ = write!(out, " {{{}}}", issue.qualifiers().join(","));
    }
    if let Some(cause) = issue.cause() {
        let _ = write!(
            out,
            "\n    caused by: {}",
            render(cause, separator, start, end)
        );
    }
    out
}

impl Stream for HumanStream {
    fn send(&mut self, issue: &dyn Issue) -> Result<(), FlareError> {
        let line = render(issue, &self.separator, &self.start, &self.end);
        match &self.sink {
            Sink::Stdout => {
                let mut out = std::io::stdout().lock();
                writeln!(out, "{line}").map_err(|e| FlareError::sink("human", e))
            }
            Sink::Stderr => {
                let mut out = std::io::stderr().lock();
                writeln!(out, "{line}").map_err(|e| FlareError::sink("human", e))
            }
            Sink::File(path) => {
                let mut file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map_err(|e| FlareError::sink("human", e))?;
                writeln!(file, "{line}").map_err(|e| FlareError::sink("human", e))
            }
        }
    }
}
