//! Process-wide issue constructor registry, keyed by class tag.
//!
//! Streams and the foreign-boundary importer rebuild issues through this
//! registry so that a deserialized issue comes back as its concrete type
//! when that type is known here. Unknown tags fall back to [`AnyIssue`]:
//! data from a process with a richer issue vocabulary is still
//! representable, it just loses its concrete type.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock, PoisonError, RwLock};

use crate::issue::{AnyIssue, Issue, IssueRecord};

type IssueCtor = Arc<dyn Fn(IssueRecord) -> Box<dyn Issue> + Send + Sync>;

static REGISTRY: LazyLock<RwLock<HashMap<String, IssueCtor>>> =
    LazyLock::new(|| RwLock::new(HashMap::new()));

pub struct IssueFactory;

impl IssueFactory {
    /// Register a constructor for `class_tag`. Idempotent; the last
    /// registration wins.
    pub fn register<F>(class_tag: &str, ctor: F)
    where
        F: Fn(IssueRecord) -> Box<dyn Issue> + Send + Sync + 'static,
    {
        REGISTRY
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(class_tag.to_string(), Arc::new(ctor));
    }

    /// Build an issue for `class_tag` around `record`. Falls back to
    /// [`AnyIssue`] when the tag is not registered.
    pub fn build(class_tag: &str, record: IssueRecord) -> Box<dyn Issue> {
        let ctor = REGISTRY
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(class_tag)
            .cloned();
        match ctor {
            Some(ctor) => ctor(record),
            None => Box::new(AnyIssue::new(class_tag, record)),
        }
    }
}
