//! Error types for the xtcp stack runtime

use std::fmt;
use thiserror::Error;
use xtcp_core::{ConnId, Port, Protocol, XtcpCoreError};

/// Result type for stack and client operations
pub type Result<T> = std::result::Result<T, XtcpError>;

/// Errors returned to clients of the stack
#[derive(Error, Debug)]
pub enum XtcpError {
    /// I/O related errors from the network driver
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The (port, protocol) pair already has a listener
    #[error("Port {port}/{protocol} is already in use")]
    PortInUse { port: Port, protocol: Protocol },

    /// Operation referenced a connection that is gone or not owned by the caller
    #[error("Unknown connection {id}")]
    UnknownConnection { id: ConnId },

    /// Operation issued out of sequence for the connection's state
    #[error("Protocol violation: {operation} not allowed on connection {id} ({state})")]
    ProtocolViolation {
        id: ConnId,
        operation: &'static str,
        state: String,
    },

    /// Send payload exceeds the connection's maximum segment size
    #[error("Payload of {len} bytes exceeds mss of {mss}")]
    PayloadTooLarge { len: usize, mss: usize },

    /// Every connection slot is taken
    #[error("Connection table full ({capacity} slots)")]
    TableFull { capacity: usize },

    /// Malformed argument
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    /// The stack or the client endpoint is gone
    #[error("Connection error: {kind}")]
    Connection { kind: ConnectionError },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Internal errors that shouldn't normally occur
    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Why a client can no longer talk to the stack
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// The stack service has shut down
    StackClosed,
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionError::StackClosed => write!(f, "stack service closed"),
        }
    }
}

impl From<XtcpCoreError> for XtcpError {
    fn from(e: XtcpCoreError) -> Self {
        match e {
            XtcpCoreError::PortInUse { port, protocol } => XtcpError::PortInUse { port, protocol },
            XtcpCoreError::UnknownConnection { id } => XtcpError::UnknownConnection { id },
            XtcpCoreError::ProtocolViolation {
                id,
                operation,
                state,
            } => XtcpError::ProtocolViolation {
                id,
                operation,
                state,
            },
            XtcpCoreError::PayloadTooLarge { len, mss } => XtcpError::PayloadTooLarge { len, mss },
            XtcpCoreError::TableFull { capacity } => XtcpError::TableFull { capacity },
            XtcpCoreError::InvalidArgument { message } => XtcpError::InvalidArgument { message },
        }
    }
}

impl XtcpError {
    /// Create a connection error
    pub fn connection(kind: ConnectionError) -> Self {
        XtcpError::Connection { kind }
    }

    /// Create an invalid-argument error
    pub fn invalid(message: impl Into<String>) -> Self {
        XtcpError::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        XtcpError::Config {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        XtcpError::Internal {
            message: message.into(),
        }
    }

    /// Check if the caller can retry or carry on with the same connection
    pub fn is_recoverable(&self) -> bool {
        match self {
            XtcpError::Io(e) => {
                matches!(
                    e.kind(),
                    std::io::ErrorKind::WouldBlock
                        | std::io::ErrorKind::TimedOut
                        | std::io::ErrorKind::Interrupted
                )
            }
            XtcpError::PayloadTooLarge { .. }
            | XtcpError::TableFull { .. }
            | XtcpError::PortInUse { .. }
            | XtcpError::InvalidArgument { .. } => true,
            _ => false,
        }
    }

    /// Check if the client broke the call-sequencing rules
    pub fn is_protocol_violation(&self) -> bool {
        matches!(self, XtcpError::ProtocolViolation { .. })
    }

    /// Check if the connection id is stale
    pub fn is_unknown_connection(&self) -> bool {
        matches!(self, XtcpError::UnknownConnection { .. })
    }

    /// Check if this error indicates the stack can no longer be reached
    pub fn is_closed(&self) -> bool {
        matches!(self, XtcpError::Connection { .. })
    }
}
