//! The issue data model: the [`IssueRecord`] value object, the [`Issue`]
//! capability contract, and [`AnyIssue`] for issues whose concrete type is
//! not known in this process.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::context::Context;
use crate::error::FlareError;
use crate::severity::Severity;

/// The concrete state carried by every issue: severity, message, string
/// encoded attributes, ordered qualifier tags, provenance, creation time,
/// and an optional exclusively-owned cause.
#[derive(Debug)]
pub struct IssueRecord {
    severity: Severity,
    message: String,
    attributes: BTreeMap<String, String>,
    qualifiers: Vec<String>,
    context: Context,
    time: DateTime<Utc>,
    cause: Option<Box<dyn Issue>>,
}

impl Clone for IssueRecord {
    fn clone(&self) -> Self {
        Self {
            severity: self.severity,
            message: self.message.clone(),
            attributes: self.attributes.clone(),
            qualifiers: self.qualifiers.clone(),
            context: self.context.clone(),
            time: self.time,
            // Deep copy: the cause chain is single-owner, never aliased.
            cause: self.cause.as_ref().map(|c| c.clone_issue()),
        }
    }
}

impl IssueRecord {
    pub fn new(context: Context, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            attributes: BTreeMap::new(),
            qualifiers: Vec::new(),
            context,
            time: Utc::now(),
            cause: None,
        }
    }

    /// Attach a cause. The record takes exclusive ownership of the chain.
    pub fn with_cause(mut self, cause: Box<dyn Issue>) -> Self {
        self.cause = Some(cause);
        self
    }

    /// Override the creation timestamp (used when reconstructing issues
    /// that were created in another process).
    pub fn with_time(mut self, time: DateTime<Utc>) -> Self {
        self.time = time;
        self
    }

    pub fn with_qualifiers(mut self, qualifiers: Vec<String>) -> Self {
        self.qualifiers = qualifiers;
        self
    }

    pub fn with_attributes(mut self, attributes: BTreeMap<String, String>) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    /// Overwrite the severity. Crate-visible only: the dispatch layer stamps
    /// the severity an issue was *reported* with, which takes precedence
    /// over the severity it was constructed with.
    pub(crate) fn set_severity(&mut self, severity: Severity) {
        self.severity = severity;
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn set_message(&mut self, message: impl Into<String>) {
        self.message = message.into();
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn time(&self) -> DateTime<Utc> {
        self.time
    }

    pub fn qualifiers(&self) -> &[String] {
        &self.qualifiers
    }

    /// Append a qualifier tag. Order of addition is preserved.
    pub fn add_qualifier(&mut self, tag: &str) {
        self.qualifiers.push(tag.to_string());
    }

    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    pub fn cause(&self) -> Option<&dyn Issue> {
        self.cause.as_deref()
    }

    /// Store an attribute under `key`, converted to its string form.
    pub fn set_value<T: ToString>(&mut self, key: &str, value: T) {
        self.attributes.insert(key.to_string(), value.to_string());
    }

    /// Read an attribute back as `T`. Fails with
    /// [`FlareError::ValueNotFound`] when the key was never written; never
    /// substitutes a default.
    pub fn get_value<T: FromStr>(&self, key: &str) -> Result<T, FlareError> {
        let raw = self
            .attributes
            .get(key)
            .ok_or_else(|| FlareError::ValueNotFound {
                key: key.to_string(),
            })?;
        raw.parse().map_err(|_| FlareError::ValueParse {
            key: key.to_string(),
            value: raw.clone(),
            target: std::any::type_name::<T>(),
        })
    }
}

/// The capability contract every issue type satisfies.
///
/// Concrete issue types embed an [`IssueRecord`] and expose it through
/// [`Issue::record`]; everything else is provided. `clone_issue` is the
/// polymorphic deep copy used whenever an issue crosses a thread boundary.
pub trait Issue: fmt::Debug + Send {
    fn record(&self) -> &IssueRecord;

    fn record_mut(&mut self) -> &mut IssueRecord;

    /// Stable type identifier, used for serialization and factory routing.
    fn class_tag(&self) -> &str;

    /// Polymorphic deep copy. The clone owns independent copies of the
    /// attribute map, qualifier list, and cause chain.
    fn clone_issue(&self) -> Box<dyn Issue>;

    fn severity(&self) -> Severity {
        self.record().severity()
    }

    fn message(&self) -> &str {
        self.record().message()
    }

    fn context(&self) -> &Context {
        self.record().context()
    }

    fn time(&self) -> DateTime<Utc> {
        self.record().time()
    }

    fn qualifiers(&self) -> &[String] {
        self.record().qualifiers()
    }

    fn attributes(&self) -> &BTreeMap<String, String> {
        self.record().attributes()
    }

    fn cause(&self) -> Option<&dyn Issue> {
        self.record().cause()
    }

    fn add_qualifier(&mut self, tag: &str) {
        self.record_mut().add_qualifier(tag);
    }
}

impl fmt::Display for dyn Issue + '_ {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} at {}: {}",
            self.severity(),
            self.class_tag(),
            self.context().position(),
            self.message()
        )?;
        if let Some(cause) = self.cause() {
            write!(f, " (caused by: {})", cause)?;
        }
        Ok(())
    }
}

/// Catch-all issue for data reconstructed from a serialized or foreign
/// representation whose class tag is not registered in this process.
#[derive(Debug, Clone)]
pub struct AnyIssue {
    class_tag: String,
    record: IssueRecord,
}

impl AnyIssue {
    pub fn new(class_tag: impl Into<String>, record: IssueRecord) -> Self {
        Self {
            class_tag: class_tag.into(),
            record,
        }
    }
}

impl Issue for AnyIssue {
    fn record(&self) -> &IssueRecord {
        &self.record
    }

    fn record_mut(&mut self) -> &mut IssueRecord {
        &mut self.record
    }

    fn class_tag(&self) -> &str {
        &self.class_tag
    }

    fn clone_issue(&self) -> Box<dyn Issue> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::here;

    fn issue(message: &str) -> AnyIssue {
        AnyIssue::new("test.Issue", IssueRecord::new(here!(), Severity::Error, message))
    }

    #[test]
    fn test_get_value_round_trip() {
        let mut issue = issue("disk full");
        issue.record_mut().set_value("free_bytes", 512u64);
        issue.record_mut().set_value("mount", "/var");
        assert_eq!(issue.record().get_value::<u64>("free_bytes").unwrap(), 512);
        assert_eq!(
            issue.record().get_value::<String>("mount").unwrap(),
            "/var"
        );
    }

    #[test]
    fn test_get_value_missing_key() {
        let issue = issue("disk full");
        match issue.record().get_value::<u64>("absent") {
            Err(FlareError::ValueNotFound { key }) => assert_eq!(key, "absent"),
            other => panic!("expected ValueNotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_get_value_parse_failure() {
        let mut issue = issue("disk full");
        issue.record_mut().set_value("free_bytes", "not-a-number");
        assert!(matches!(
            issue.record().get_value::<u64>("free_bytes"),
            Err(FlareError::ValueParse { .. })
        ));
    }

    #[test]
    fn test_qualifiers_preserve_order() {
        let mut issue = issue("x");
        issue.add_qualifier("a");
        issue.add_qualifier("b");
        assert_eq!(issue.qualifiers(), ["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_clone_is_independent() {
        let cause = issue("root cause");
        let mut original = issue("wrapper");
        original.record_mut().set_value("attempt", 1);
        original.add_qualifier("retried");
        original = AnyIssue::new(
            original.class_tag().to_string(),
            original.record().clone().with_cause(cause.clone_issue()),
        );

        let mut copy = original.clone_issue();
        copy.record_mut().set_value("attempt", 2);
        copy.add_qualifier("copied");

        assert_eq!(original.record().get_value::<i32>("attempt").unwrap(), 1);
        assert_eq!(original.qualifiers(), ["retried".to_string()]);
        assert_eq!(copy.record().get_value::<i32>("attempt").unwrap(), 2);

        // Cause chains are structurally equal but independently owned.
        let original_cause = original.cause().expect("original cause");
        let copied_cause = copy.cause().expect("copied cause");
        assert_eq!(original_cause.message(), copied_cause.message());
        assert!(!std::ptr::eq(
            original_cause as *const dyn Issue as *const u8,
            copied_cause as *const dyn Issue as *const u8
        ));
    }

    #[test]
    fn test_display_renders_cause_chain() {
        let cause = issue("root cause");
        let record =
            IssueRecord::new(here!(), Severity::Error, "wrapper").with_cause(cause.clone_issue());
        let wrapper = AnyIssue::new("test.Wrapper", record);

        let boxed: Box<dyn Issue> = Box::new(wrapper);
        let rendered = format!("{}", boxed.as_ref());
        assert!(rendered.contains("test.Wrapper"));
        assert!(rendered.contains("wrapper"));
        // The cause is a borrow with the owner's lifetime; Display must
        // accept it and recurse.
        assert!(rendered.contains("caused by:"));
        assert!(rendered.contains("root cause"));
    }

    #[test]
    fn test_set_severity_overwrites() {
        let mut issue = issue("x");
        assert_eq!(issue.severity(), Severity::Error);
        issue.record_mut().set_severity(Severity::Debug);
        // Unconditional overwrite, including downgrades.
        assert_eq!(issue.severity(), Severity::Debug);
    }
}
