use crate::dns::ProtoError;
use std::{io, sync::Arc, time::Duration};
use thiserror::Error;

/// A relay to an upstream server could not be completed.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum UpstreamError {
    /// The configured server name did not resolve to any address
    #[error("no address found for upstream {0}")]
    NoAddress(String),
    /// No reply arrived in time
    #[error("no reply within {0:?}")]
    Timeout(Duration),
    /// The reply does not belong to the query that was sent
    #[error("reply id {received} does not match query id {expected}")]
    IdMismatch { expected: u16, received: u16 },
    /// An error got returned by the hickory-proto crate
    #[error("proto error: {0}")]
    Proto(#[from] ProtoError),
    /// An underlying IO error occurred
    #[error("io error: {0}")]
    Io(Arc<io::Error>),
}

impl From<io::Error> for UpstreamError {
    fn from(value: io::Error) -> Self {
        Self::Io(Arc::new(value))
    }
}
