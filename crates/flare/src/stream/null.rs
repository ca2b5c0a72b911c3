//! Discarding sink, the default chain for debug and log severities.

use crate::error::FlareError;
use crate::issue::Issue;
use crate::stream::Stream;

pub struct NullStream;

impl Stream for NullStream {
    fn send(&mut self, _issue: &dyn Issue) -> Result<(), FlareError> {
        Ok(())
    }
}
