//! Error types for flare.

use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FlareError {
    #[error("no value set for attribute key \"{key}\"")]
    ValueNotFound { key: String },

    #[error("attribute \"{key}\" holds \"{value}\", which does not parse as {target}")]
    ValueParse {
        key: String,
        value: String,
        target: &'static str,
    },

    #[error("an issue catcher is already installed")]
    CatcherAlreadyInstalled,

    #[error("{file}:{line}: cannot parse {element}")]
    ParseError {
        file: String,
        line: u64,
        element: String,
    },

    /// Reserved for stream implementations registered through
    /// [`register_stream`](crate::stream::register_stream) that reject an
    /// operation outright instead of no-oping. The built-in send-only
    /// streams answer `receive` with `Ok(None)` and never raise this.
    #[error("stream \"{stream}\" does not support {operation}")]
    UnsupportedOperation { stream: String, operation: String },

    #[error("stream \"{stream}\" failed to send: {source}")]
    SinkFailure {
        stream: String,
        #[source]
        source: io::Error,
    },

    #[error("malformed stream specification \"{spec}\"")]
    BadStreamSpec { spec: String },

    #[error("unknown stream type \"{name}\"")]
    UnknownStream { name: String },
}

impl FlareError {
    /// Wrap an io-shaped failure from a named stream.
    pub(crate) fn sink(stream: &str, source: io::Error) -> Self {
        FlareError::SinkFailure {
            stream: stream.to_string(),
            source,
        }
    }
}
