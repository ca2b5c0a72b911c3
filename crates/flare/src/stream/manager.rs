//! Severity-based stream dispatch.
//!
//! Each severity owns an ordered chain of stream specifications, resolved
//! into live [`Stream`] instances on the first dispatch for that severity.
//! The registry is populated once from configuration and only read after
//! that; a single mutex serializes dispatch, which keeps concurrent
//! reporters safe and lazy construction race-free.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use crate::config::StreamConfig;
use crate::error::FlareError;
use crate::issue::Issue;
use crate::severity::Severity;
use crate::stream::{self, Stream};

/// One entry of a configured chain: stream type name plus constructor
/// argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSpec {
    pub name: String,
    pub arg: String,
}

struct Chain {
    specs: Vec<StreamSpec>,
    live: Option<Vec<Box<dyn Stream>>>,
}

pub struct StreamManager {
    chains: Mutex<HashMap<Severity, Chain>>,
}

impl StreamManager {
    /// Build the registry from configuration. Fails on the first
    /// malformed chain specification.
    pub fn new(config: &StreamConfig) -> Result<Self, FlareError> {
        let mut chains = HashMap::new();
        for severity in Severity::ALL {
            let specs = config.resolved_chain(severity)?;
            if !specs.is_empty() {
                chains.insert(
                    severity,
                    Chain {
                        specs,
                        live: None,
                    },
                );
            }
        }
        Ok(Self {
            chains: Mutex::new(chains),
        })
    }

    fn empty() -> Self {
        Self {
            chains: Mutex::new(HashMap::new()),
        }
    }

    /// Send `issue` to every stream configured for `severity`, in order.
    /// The first failing `send` propagates and the remaining streams of the
    /// chain are not invoked for this call. No chain is a no-op.
    pub fn dispatch(&self, severity: Severity, issue: &dyn Issue) -> Result<(), FlareError> {
        let mut chains = self.chains.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(chain) = chains.get_mut(&severity) else {
            return Ok(());
        };
        if chain.live.is_none() {
            let mut live = Vec::with_capacity(chain.specs.len());
            for spec in &chain.specs {
                live.push(stream::create_stream(&spec.name, &spec.arg)?);
            }
            chain.live = Some(live);
        }
        for stream in chain.live.iter_mut().flatten() {
            stream.send(issue)?;
        }
        Ok(())
    }
}

impl Default for StreamManager {
    /// Registry over the built-in default chains.
    fn default() -> Self {
        StreamManager::new(&StreamConfig::default()).unwrap_or_else(|_| StreamManager::empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::here;
    use crate::issue::{AnyIssue, IssueRecord};

    fn issue(severity: Severity) -> AnyIssue {
        AnyIssue::new("test.Issue", IssueRecord::new(here!(), severity, "m"))
    }

    fn config_with(severity: Severity, chain: &str) -> StreamConfig {
        let mut config = StreamConfig {
            debug: String::new(),
            log: String::new(),
            info: String::new(),
            warning: String::new(),
            error: String::new(),
            fatal: String::new(),
        };
        match severity {
            Severity::Debug => config.debug = chain.to_string(),
            Severity::Log => config.log = chain.to_string(),
            Severity::Info => config.info = chain.to_string(),
            Severity::Warning => config.warning = chain.to_string(),
            Severity::Error => config.error = chain.to_string(),
            Severity::Fatal => config.fatal = chain.to_string(),
        }
        config
    }

    #[test]
    fn test_unconfigured_severity_is_noop() {
        let manager = StreamManager::new(&config_with(Severity::Error, "null")).unwrap();
        let issue = issue(Severity::Debug);
        assert!(manager.dispatch(Severity::Debug, &issue).is_ok());
    }

    #[test]
    fn test_dispatch_to_null_chain() {
        let manager = StreamManager::new(&config_with(Severity::Error, "null,null")).unwrap();
        let issue = issue(Severity::Error);
        assert!(manager.dispatch(Severity::Error, &issue).is_ok());
    }

    #[test]
    fn test_unknown_stream_type_surfaces_on_first_dispatch() {
        let manager =
            StreamManager::new(&config_with(Severity::Error, "not-a-stream")).unwrap();
        let issue = issue(Severity::Error);
        assert!(matches!(
            manager.dispatch(Severity::Error, &issue),
            Err(FlareError::UnknownStream { .. })
        ));
    }

    #[test]
    fn test_bad_chain_rejected_at_construction() {
        assert!(matches!(
            StreamManager::new(&config_with(Severity::Error, "human(stderr")),
            Err(FlareError::BadStreamSpec { .. })
        ));
    }
}
