//! Serialization endpoints for issues.
//!
//! A [`Stream`] writes issues out and, for the variants that support it,
//! reads them back. Streams are constructed by type name through a
//! process-wide factory so configuration strings like `xml(/var/e.xml)`
//! resolve to live instances, and user crates can plug in their own
//! variants with [`register_stream`].

use std::collections::HashMap;
use std::sync::{Arc, LazyLock, PoisonError, RwLock};

use crate::error::FlareError;
use crate::issue::Issue;

pub mod human;
pub mod manager;
pub mod null;
pub mod xml;

/// A serialization endpoint for issues.
pub trait Stream: Send {
    /// Serialize one issue out.
    fn send(&mut self, issue: &dyn Issue) -> Result<(), FlareError>;

    /// Deserialize one issue in. Send-only variants return `Ok(None)`,
    /// never an error.
    fn receive(&mut self) -> Result<Option<Box<dyn Issue>>, FlareError> {
        Ok(None)
    }
}

type StreamCtor = Arc<dyn Fn(&str) -> Result<Box<dyn Stream>, FlareError> + Send + Sync>;

static REGISTRY: LazyLock<RwLock<HashMap<String, StreamCtor>>> = LazyLock::new(|| {
    let mut builtin: HashMap<String, StreamCtor> = HashMap::new();
    builtin.insert(
        "human".to_string(),
        Arc::new(|arg| Ok(Box::new(human::HumanStream::new(arg)))),
    );
    builtin.insert(
        "null".to_string(),
        Arc::new(|_| Ok(Box::new(null::NullStream))),
    );
    builtin.insert(
        "xml".to_string(),
        Arc::new(|arg| Ok(Box::new(xml::XmlStream::new(arg)))),
    );
    RwLock::new(builtin)
});

/// Register a stream constructor under `name`, making it available to
/// chain configuration. The last registration for a name wins.
pub fn register_stream<F>(name: &str, ctor: F)
where
    F: Fn(&str) -> Result<Box<dyn Stream>, FlareError> + Send + Sync + 'static,
{
    REGISTRY
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(name.to_string(), Arc::new(ctor));
}

/// Instantiate a stream by type name and constructor argument.
pub(crate) fn create_stream(name: &str, arg: &str) -> Result<Box<dyn Stream>, FlareError> {
    let ctor = REGISTRY
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(name)
        .cloned();
    match ctor {
        Some(ctor) => ctor(arg),
        None => Err(FlareError::UnknownStream {
            name: name.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_are_registered() {
        assert!(create_stream("null", "").is_ok());
        assert!(create_stream("human", "stdout").is_ok());
        assert!(create_stream("xml", "/tmp/issues.xml").is_ok());
    }

    #[test]
    fn test_unknown_stream_type() {
        assert!(matches!(
            create_stream("carrier-pigeon", ""),
            Err(FlareError::UnknownStream { name }) if name == "carrier-pigeon"
        ));
    }

    #[test]
    fn test_default_receive_is_empty() {
        struct SendOnly;
        impl Stream for SendOnly {
            fn send(&mut self, _issue: &dyn Issue) -> Result<(), FlareError> {
                Ok(())
            }
        }
        let mut stream = SendOnly;
        assert!(stream.receive().unwrap().is_none());
    }
}
