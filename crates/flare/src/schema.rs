//! Declarative issue schemas.
//!
//! Instead of generating issue subclasses with macros, an [`IssueSchema`]
//! names a class tag and its typed attributes once, at runtime. The schema
//! builds validated [`SchemaIssue`] instances and can register itself in
//! the [`IssueFactory`] so serialized issues of that class come back as
//! `SchemaIssue` rather than the untyped fallback.

use crate::context::Context;
use crate::error::FlareError;
use crate::factory::IssueFactory;
use crate::issue::{Issue, IssueRecord};
use crate::severity::Severity;

/// Value type of a declared attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrKind {
    Text,
    Int,
    Float,
    Bool,
}

impl AttrKind {
    fn accepts(&self, value: &str) -> bool {
        match self {
            AttrKind::Text => true,
            AttrKind::Int => value.parse::<i64>().is_ok(),
            AttrKind::Float => value.parse::<f64>().is_ok(),
            AttrKind::Bool => value.parse::<bool>().is_ok(),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            AttrKind::Text => "text",
            AttrKind::Int => "integer",
            AttrKind::Float => "float",
            AttrKind::Bool => "boolean",
        }
    }
}

#[derive(Debug, Clone)]
struct AttrDecl {
    name: String,
    kind: AttrKind,
}

/// Declarative description of an issue class: tag plus typed attributes.
#[derive(Debug, Clone)]
pub struct IssueSchema {
    class_tag: String,
    attributes: Vec<AttrDecl>,
}

impl IssueSchema {
    pub fn new(class_tag: impl Into<String>) -> Self {
        Self {
            class_tag: class_tag.into(),
            attributes: Vec::new(),
        }
    }

    /// Declare an attribute. Declaration order is kept for documentation
    /// purposes only; storage order is the attribute map's.
    pub fn attribute(mut self, name: &str, kind: AttrKind) -> Self {
        self.attributes.push(AttrDecl {
            name: name.to_string(),
            kind,
        });
        self
    }

    pub fn class_tag(&self) -> &str {
        &self.class_tag
    }

    /// Build an issue of this class. Every declared attribute must be
    /// provided ([`FlareError::ValueNotFound`] otherwise) and must parse as
    /// its declared kind ([`FlareError::ValueParse`]).
    pub fn build(
        &self,
        context: Context,
        severity: Severity,
        message: &str,
        values: &[(&str, String)],
    ) -> Result<SchemaIssue, FlareError> {
        let mut record = IssueRecord::new(context, severity, message);
        for (key, value) in values {
            record.set_value(key, value);
        }
        for decl in &self.attributes {
            let value = record
                .attributes()
                .get(&decl.name)
                .ok_or_else(|| FlareError::ValueNotFound {
                    key: decl.name.clone(),
                })?;
            if !decl.kind.accepts(value) {
                return Err(FlareError::ValueParse {
                    key: decl.name.clone(),
                    value: value.clone(),
                    target: decl.kind.name(),
                });
            }
        }
        Ok(SchemaIssue {
            class_tag: self.class_tag.clone(),
            record,
        })
    }

    /// Install a constructor for this class in the [`IssueFactory`].
    /// Reconstruction from serialized data does not re-validate: missing
    /// attributes surface later through the typed accessors.
    pub fn register(&self) {
        let class_tag = self.class_tag.clone();
        IssueFactory::register(&self.class_tag, move |record| {
            Box::new(SchemaIssue {
                class_tag: class_tag.clone(),
                record,
            })
        });
    }
}

/// A concrete issue produced by an [`IssueSchema`].
#[derive(Debug, Clone)]
pub struct SchemaIssue {
    class_tag: String,
    record: IssueRecord,
}

impl Issue for SchemaIssue {
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
