//! Configuration types for the session engine

use crate::error::{XtcpCoreError, XtcpCoreResult};
use crate::protocol::Port;

/// Default client buffer size; also the advisory mss reported with send events
pub const DEFAULT_MSS: usize = 1472;
/// Largest payload announced by a single receive event
pub const DEFAULT_MAX_RECEIVE_SIZE: usize = 1472;
/// Default number of simultaneously open connections
pub const DEFAULT_MAX_CONNECTIONS: usize = 32;
/// Default cap on undelivered datagram bytes per UDP connection
pub const DEFAULT_RECV_BUFFER_SIZE: usize = 64 * 1024;

/// Protocol-only configuration for the [`StackEngine`](crate::StackEngine).
///
/// Contains only the fields the engine reads, no runtime or I/O settings.
#[derive(Debug, Clone)]
pub struct XtcpCoreConfig {
    /// Maximum number of live connection records
    pub max_connections: usize,
    /// Maximum segment size advertised on send events
    pub mss: usize,
    /// Inbound payloads larger than this are split over several receive events
    pub max_receive_size: usize,
    /// Datagrams arriving while a UDP connection already buffers this many
    /// undelivered bytes (counting the new payload) are dropped
    pub recv_buffer_size: usize,
    /// Inclusive range used to pick local ports for outbound connects
    pub ephemeral_ports: (Port, Port),
}

impl Default for XtcpCoreConfig {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            mss: DEFAULT_MSS,
            max_receive_size: DEFAULT_MAX_RECEIVE_SIZE,
            recv_buffer_size: DEFAULT_RECV_BUFFER_SIZE,
            ephemeral_ports: (49152, 65535),
        }
    }
}

impl XtcpCoreConfig {
    /// Check that the settings describe a usable engine
    pub fn validate(&self) -> XtcpCoreResult<()> {
        if self.max_connections == 0 {
            return Err(XtcpCoreError::invalid("max_connections must be greater than 0"));
        }
        if self.mss == 0 || self.max_receive_size == 0 {
            return Err(XtcpCoreError::invalid(
                "mss and max_receive_size must be greater than 0",
            ));
        }
        if self.recv_buffer_size == 0 {
            return Err(XtcpCoreError::invalid("recv_buffer_size must be greater than 0"));
        }
        let (lo, hi) = self.ephemeral_ports;
        if lo == 0 || lo > hi {
            return Err(XtcpCoreError::invalid("ephemeral port range is empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(XtcpCoreConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_empty_port_range() {
        let config = XtcpCoreConfig {
            ephemeral_ports: (5000, 4000),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(XtcpCoreError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_rejects_zero_recv_buffer() {
        let config = XtcpCoreConfig {
            recv_buffer_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
