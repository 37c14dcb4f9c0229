// Error definitions for connection sessions.

use std::io;

use crate::lock::Abandoned;
use crate::protocol::WireError;

/// Client broke the protocol. The connection is dropped without a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("message while acquiring")]
    MessageWhileAcquiring,
    #[error("acquiring lock twice")]
    DoubleAcquire,
    #[error("setting governor without exclusive lock")]
    GovernorWithoutExclusiveLock,
    #[error("unknown message")]
    UnknownAction,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("reading credentials: {0}")]
    Credentials(#[source] io::Error),
    #[error(transparent)]
    Wire(#[from] WireError),
    #[error(transparent)]
    Abandoned(#[from] Abandoned),
}
