//! Error types for the session engine

use crate::protocol::{ConnId, Port, Protocol};
use std::fmt;

/// Result type for session engine operations
pub type XtcpCoreResult<T> = std::result::Result<T, XtcpCoreError>;

/// Errors returned synchronously to the calling client.
///
/// Transient send failures, peer timeouts and aborts are not errors: they
/// reach the client as `ResendData`, `TimedOut` and `Aborted` events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XtcpCoreError {
    /// The (port, protocol) pair, or the UDP endpoint, is already taken
    PortInUse { port: Port, protocol: Protocol },
    /// No live connection with this id is visible to the caller
    UnknownConnection { id: ConnId },
    /// Operation issued out of sequence for the connection's current state
    ProtocolViolation {
        id: ConnId,
        operation: &'static str,
        state: String,
    },
    /// Send payload exceeds the connection's maximum segment size
    PayloadTooLarge { len: usize, mss: usize },
    /// Every connection slot is taken
    TableFull { capacity: usize },
    /// Malformed argument (bad offset, non-multicast group, unknown client...)
    InvalidArgument { message: String },
}

impl XtcpCoreError {
    /// Create a protocol violation error
    pub fn violation(id: ConnId, operation: &'static str, state: impl Into<String>) -> Self {
        XtcpCoreError::ProtocolViolation {
            id,
            operation,
            state: state.into(),
        }
    }

    /// Create an invalid-argument error
    pub fn invalid(message: impl Into<String>) -> Self {
        XtcpCoreError::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create an unknown-connection error
    pub fn unknown(id: ConnId) -> Self {
        XtcpCoreError::UnknownConnection { id }
    }

    /// Check if this error means the client broke the call-sequencing rules
    pub fn is_protocol_violation(&self) -> bool {
        matches!(self, XtcpCoreError::ProtocolViolation { .. })
    }
}

impl fmt::Display for XtcpCoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            XtcpCoreError::PortInUse { port, protocol } => {
                write!(f, "Port {port}/{protocol} is already in use")
            }
            XtcpCoreError::UnknownConnection { id } => write!(f, "Unknown connection {id}"),
            XtcpCoreError::ProtocolViolation {
                id,
                operation,
                state,
            } => write!(
                f,
                "Protocol violation: {operation} not allowed on connection {id} ({state})"
            ),
            XtcpCoreError::PayloadTooLarge { len, mss } => {
                write!(f, "Payload of {len} bytes exceeds mss of {mss}")
            }
            XtcpCoreError::TableFull { capacity } => {
                write!(f, "Connection table full ({capacity} slots)")
            }
            XtcpCoreError::InvalidArgument { message } => write!(f, "Invalid argument: {message}"),
        }
    }
}

impl std::error::Error for XtcpCoreError {}
