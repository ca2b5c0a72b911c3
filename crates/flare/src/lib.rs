//! Flare — structured issue reporting.
//!
//! Application code raises typed *issues*: a message, a severity, the
//! provenance of the report site, and arbitrary string-encoded attributes,
//! optionally chained to the issue that caused them. Reported issues are
//! routed to per-severity chains of output streams (human-readable text,
//! XML files, or anything registered through
//! [`register_stream`](stream::register_stream)), or handed to an
//! asynchronous catcher callback running on its own worker thread.
//!
//! ```no_run
//! use flare::{here, AnyIssue, IssueRecord, Severity};
//!
//! let mut record = IssueRecord::new(here!(), Severity::Error, "config file missing");
//! record.set_value("path", "/etc/app.toml");
//! let issue = AnyIssue::new("app.ConfigMissing", record);
//! flare::error(&issue).ok();
//! ```

pub mod config;
pub mod context;
pub mod dto;
pub mod error;
pub mod factory;
pub mod issue;
pub mod local;
pub mod schema;
pub mod severity;
pub mod stream;

pub use config::{FlareConfig, StreamConfig};
pub use context::Context;
pub use dto::{ContextDto, IssueDto};
pub use error::FlareError;
pub use factory::IssueFactory;
pub use issue::{AnyIssue, Issue, IssueRecord};
pub use local::{CatcherGuard, LocalStream};
pub use schema::{AttrKind, IssueSchema, SchemaIssue};
pub use severity::Severity;
pub use stream::manager::{StreamManager, StreamSpec};
pub use stream::{register_stream, Stream};

/// Capture a [`Context`] for the current source position.
#[macro_export]
macro_rules! here {
    () => {
        $crate::Context::capture(env!("CARGO_PKG_NAME"), file!(), line!(), module_path!())
    };
}

/// Report an issue at debug severity through the process-wide stream.
pub fn debug(issue: &dyn Issue) -> Result<(), FlareError> {
    LocalStream::instance().report(Severity::Debug, issue)
}

/// Report an issue at log severity through the process-wide stream.
pub fn log(issue: &dyn Issue) -> Result<(), FlareError> {
    LocalStream::instance().report(Severity::Log, issue)
}

/// Report an issue at info severity through the process-wide stream.
pub fn info(issue: &dyn Issue) -> Result<(), FlareError> {
    LocalStream::instance().report(Severity::Info, issue)
}

/// Report an issue at warning severity through the process-wide stream.
pub fn warning(issue: &dyn Issue) -> Result<(), FlareError> {
    LocalStream::instance().report(Severity::Warning, issue)
}

/// Report an issue at error severity through the process-wide stream.
pub fn error(issue: &dyn Issue) -> Result<(), FlareError> {
    LocalStream::instance().report(Severity::Error, issue)
}

/// Report an issue at fatal severity through the process-wide stream.
pub fn fatal(issue: &dyn Issue) -> Result<(), FlareError> {
    LocalStream::instance().report(Severity::Fatal, issue)
}
