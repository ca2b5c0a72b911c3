//! The foreign-boundary issue shape.
//!
//! Language bindings and remote peers exchange issues in this flat,
//! serde-friendly form. Any [`Issue`] can be rendered into it, and any
//! instance can be turned back into a concrete issue through the
//! [`IssueFactory`], cause chain included.

use chrono::DateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::context::Context;
use crate::error::FlareError;
use crate::factory::IssueFactory;
use crate::issue::{Issue, IssueRecord};
use crate::severity::Severity;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextDto {
    pub package: String,
    pub file: String,
    pub function: String,
    pub line: u32,
    pub host: String,
    pub pid: u32,
    pub tid: i64,
    pub cwd: String,
    pub uid: u32,
    pub user: String,
    pub app: String,
}

impl From<&Context> for ContextDto {
    fn from(ctx: &Context) -> Self {
        Self {
            package: ctx.package.clone(),
            file: ctx.file.clone(),
            function: ctx.function.clone(),
            line: ctx.line,
            host: ctx.host.clone(),
            pid: ctx.pid,
            tid: ctx.tid,
            cwd: ctx.cwd.clone(),
            uid: ctx.uid,
            user: ctx.user.clone(),
            app: ctx.app.clone(),
        }
    }
}

impl ContextDto {
    fn into_context(self) -> Context {
        Context::remote(
            self.package,
            self.file,
            self.function,
            self.line,
            self.host,
            self.pid,
            self.tid,
            self.cwd,
            self.uid,
            self.user,
            self.app,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueDto {
    pub class_tag: String,
    pub message: String,
    /// Severity ordinal, see [`Severity::ordinal`].
    pub severity: u8,
    pub context: ContextDto,
    pub qualifiers: Vec<String>,
    pub attributes: BTreeMap<String, String>,
    /// Seconds since the Unix epoch, fractional.
    pub time: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<Box<IssueDto>>,
}

impl IssueDto {
    /// Render any issue into the boundary shape, recursing through the
    /// cause chain.
    pub fn from_issue(issue: &dyn Issue) -> Self {
        Self {
            class_tag: issue.class_tag().to_string(),
            message: issue.message().to_string(),
            severity: issue.severity().ordinal(),
            context: ContextDto::from(issue.context()),
            qualifiers: issue.qualifiers().to_vec(),
            attributes: issue.attributes().clone(),
            time: issue.time().timestamp_micros() as f64 / 1_000_000.0,
            cause: issue
                .cause()
                .map(|cause| Box::new(IssueDto::from_issue(cause))),
        }
    }

    /// Reconstruct a concrete issue through the [`IssueFactory`].
    pub fn into_issue(self) -> Result<Box<dyn Issue>, FlareError> {
        let severity =
            Severity::from_ordinal(self.severity).ok_or_else(|| FlareError::ValueParse {
                key: "severity".to_string(),
                value: self.severity.to_string(),
                target: "severity ordinal",
            })?;
        let time = DateTime::from_timestamp_micros((self.time * 1_000_000.0) as i64)
            .unwrap_or(DateTime::UNIX_EPOCH);
        let mut record = IssueRecord::new(self.context.into_context(), severity, self.message)
            .with_time(time)
            .with_qualifiers(self.qualifiers)
            .with_attributes(self.attributes);
        if let Some(cause) = self.cause {
            record = record.with_cause(cause.into_issue()?);
        }
        Ok(IssueFactory::build(&self.class_tag, record))
    }
}
