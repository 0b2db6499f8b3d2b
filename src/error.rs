use std::fmt;

use crate::tagop::TagOpFailure;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReaderError {
    /// A wire exchange failed or timed out. Never retried at this layer.
    Communication(String),
    /// The keepalive watchdog declared the connection dead.
    ConnectionLost,
    /// A response carried a non-success LLRP status code.
    Protocol { status: u16, message: String },
    /// A tag operation completed with a failure outcome.
    TagOp(TagOpFailure),
    /// Rejected before any wire exchange took place.
    InvalidArgument(String),
    /// Feature not implemented for this reader model or protocol.
    Unsupported(String),
    MutexError(String),
}

impl std::error::Error for ReaderError {}

impl fmt::Display for ReaderError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ReaderError::Communication(val) => write!(f, "Communication Error: {val}"),
            ReaderError::ConnectionLost => write!(f, "Connection Lost"),
            ReaderError::Protocol { status, message } => {
                write!(f, "Protocol Error ({status}): {message}")
            }
            ReaderError::TagOp(failure) => write!(f, "Tag Operation Failed: {failure}"),
            ReaderError::InvalidArgument(val) => write!(f, "Invalid Argument: {val}"),
            ReaderError::Unsupported(val) => write!(f, "Unsupported: {val}"),
            ReaderError::MutexError(val) => write!(f, "Mutex Error: {val}"),
        }
    }
}
