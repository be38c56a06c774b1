//! Link state: MAC address, IP configuration and multicast groups.

use crate::error::{XtcpCoreError, XtcpCoreResult};
use crate::protocol::{IpConfig, LinkEvent, MacAddress};
use std::collections::BTreeSet;
use std::net::IpAddr;

#[derive(Debug)]
pub struct LinkManager {
    mac: MacAddress,
    ip_config: IpConfig,
    multicast: BTreeSet<IpAddr>,
    up: bool,
}

impl LinkManager {
    pub fn new(mac: MacAddress, ip_config: IpConfig) -> Self {
        Self {
            mac,
            ip_config,
            multicast: BTreeSet::new(),
            up: false,
        }
    }

    pub fn mac_address(&self) -> MacAddress {
        self.mac
    }

    pub fn ip_config(&self) -> IpConfig {
        self.ip_config
    }

    pub fn is_up(&self) -> bool {
        self.up
    }

    /// Subscribe to a group. Returns `true` if the set changed.
    pub fn join(&mut self, group: IpAddr) -> XtcpCoreResult<bool> {
        if !group.is_multicast() {
            return Err(XtcpCoreError::invalid(format!("{group} is not a multicast address")));
        }
        Ok(self.multicast.insert(group))
    }

    /// Unsubscribe from a group. Returns `true` if the set changed.
    pub fn leave(&mut self, group: IpAddr) -> XtcpCoreResult<bool> {
        if !group.is_multicast() {
            return Err(XtcpCoreError::invalid(format!("{group} is not a multicast address")));
        }
        Ok(self.multicast.remove(&group))
    }

    pub fn groups(&self) -> impl Iterator<Item = &IpAddr> {
        self.multicast.iter()
    }

    /// Link came up, possibly with a new address. Returns the event to
    /// broadcast, if anything changed.
    pub fn set_up(&mut self, ip_config: Option<IpConfig>) -> Option<LinkEvent> {
        let mut changed = !self.up;
        if let Some(config) = ip_config {
            changed |= config != self.ip_config;
            self.ip_config = config;
        }
        self.up = true;
        changed.then_some(LinkEvent::Up {
            ip_config: self.ip_config,
        })
    }

    pub fn set_down(&mut self) -> Option<LinkEvent> {
        std::mem::replace(&mut self.up, false).then_some(LinkEvent::Down)
    }
}
