//! Configuration types for the stack service.
//!
//! [`StackConfig`] extends the core [`XtcpCoreConfig`] with the link setup
//! and runtime settings (channel sizes, timer periods) used only by the
//! tokio layer.

use crate::error::{Result, XtcpError};
use std::net::{Ipv4Addr, Ipv6Addr};
use std::time::Duration;
use xtcp_core::config::{
    DEFAULT_MAX_CONNECTIONS, DEFAULT_MAX_RECEIVE_SIZE, DEFAULT_MSS, DEFAULT_RECV_BUFFER_SIZE,
};
use xtcp_core::{IpConfig, MacAddress, Port, XtcpCoreConfig};

// ── StackConfig ─────────────────────────────────────────────────────────

/// Full stack configuration: protocol settings, link setup, runtime settings.
#[derive(Debug, Clone)]
pub struct StackConfig {
    // Protocol settings (forwarded to the core engine)
    pub max_connections: usize,
    pub mss: usize,
    pub max_receive_size: usize,
    pub recv_buffer_size: usize,
    pub ephemeral_ports: (Port, Port),

    // Link setup
    /// Initial address; an all-zero IPv4 address asks for DHCP
    pub ip_config: IpConfig,
    /// Overrides the driver's factory MAC address
    pub mac_address: Option<MacAddress>,

    // Runtime settings (used only by xtcp-tokio)
    pub command_capacity: usize,
    pub input_capacity: usize,
    pub tick_interval: Duration,
    /// Poll the driver for link status; `None` when the driver pushes link events
    pub phy_poll_interval: Option<Duration>,
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            mss: DEFAULT_MSS,
            max_receive_size: DEFAULT_MAX_RECEIVE_SIZE,
            recv_buffer_size: DEFAULT_RECV_BUFFER_SIZE,
            ephemeral_ports: XtcpCoreConfig::default().ephemeral_ports,
            ip_config: IpConfig::unassigned(),
            mac_address: None,
            command_capacity: 64,
            input_capacity: 256,
            tick_interval: Duration::from_millis(10),
            phy_poll_interval: None,
        }
    }
}

/// Extracts the protocol-only fields that `StackEngine` reads.
impl From<StackConfig> for XtcpCoreConfig {
    fn from(c: StackConfig) -> Self {
        Self {
            max_connections: c.max_connections,
            mss: c.mss,
            max_receive_size: c.max_receive_size,
            recv_buffer_size: c.recv_buffer_size,
            ephemeral_ports: c.ephemeral_ports,
        }
    }
}

// ── Builder methods ─────────────────────────────────────────────────────

impl StackConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    pub fn mss(mut self, mss: usize) -> Self {
        self.mss = mss;
        self
    }

    pub fn max_receive_size(mut self, size: usize) -> Self {
        self.max_receive_size = size;
        self
    }

    pub fn recv_buffer_size(mut self, size: usize) -> Self {
        self.recv_buffer_size = size;
        self
    }

    pub fn ephemeral_ports(mut self, first: Port, last: Port) -> Self {
        self.ephemeral_ports = (first, last);
        self
    }

    pub fn ip_config(mut self, ip_config: IpConfig) -> Self {
        self.ip_config = ip_config;
        self
    }

    pub fn mac_address(mut self, mac: MacAddress) -> Self {
        self.mac_address = Some(mac);
        self
    }

    pub fn command_capacity(mut self, capacity: usize) -> Self {
        self.command_capacity = capacity;
        self
    }

    pub fn input_capacity(mut self, capacity: usize) -> Self {
        self.input_capacity = capacity;
        self
    }

    pub fn tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    pub fn phy_poll_interval(mut self, interval: Option<Duration>) -> Self {
        self.phy_poll_interval = interval;
        self
    }

    // -- Validation --

    pub fn validate(&self) -> Result<()> {
        XtcpCoreConfig::from(self.clone())
            .validate()
            .map_err(|e| XtcpError::config(e.to_string()))?;
        if self.command_capacity == 0 || self.input_capacity == 0 {
            return Err(XtcpError::config("Channel capacities must be greater than 0"));
        }
        if self.tick_interval.is_zero() {
            return Err(XtcpError::config("Tick interval must be greater than 0"));
        }
        if self.phy_poll_interval.is_some_and(|d| d.is_zero()) {
            return Err(XtcpError::config("PHY poll interval must be greater than 0"));
        }
        Ok(())
    }
}

// ── Presets ──────────────────────────────────────────────────────────────

impl StackConfig {
    /// IPv4 with the address obtained by DHCP
    pub fn dhcp() -> Self {
        Self::default().ip_config(IpConfig::unassigned())
    }

    /// Fixed IPv4 address
    pub fn static_ipv4(address: Ipv4Addr, netmask: Ipv4Addr, gateway: Ipv4Addr) -> Self {
        Self::default().ip_config(IpConfig::V4 {
            address,
            netmask,
            gateway,
        })
    }

    /// Fixed IPv6 address
    pub fn ipv6(address: Ipv6Addr) -> Self {
        Self::default().ip_config(IpConfig::V6 { address })
    }
}
