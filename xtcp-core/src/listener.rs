//! Port ownership for listeners and outbound connects.

use crate::error::{XtcpCoreError, XtcpCoreResult};
use crate::protocol::{ClientId, Port, Protocol};
use std::collections::HashMap;

/// Listening registrations keyed by (port, protocol)
#[derive(Debug)]
pub struct Listeners {
    owners: HashMap<(Port, Protocol), ClientId>,
    ephemeral: (Port, Port),
    next_ephemeral: Port,
}

impl Listeners {
    pub fn new(ephemeral: (Port, Port)) -> Self {
        Self {
            owners: HashMap::new(),
            ephemeral,
            next_ephemeral: ephemeral.0,
        }
    }

    pub fn listen(&mut self, client: ClientId, port: Port, protocol: Protocol) -> XtcpCoreResult<()> {
        if self.owners.contains_key(&(port, protocol)) {
            return Err(XtcpCoreError::PortInUse { port, protocol });
        }
        self.owners.insert((port, protocol), client);
        Ok(())
    }

    /// Remove the TCP listener on `port` if `client` owns it. UDP ports stay
    /// bound. Returns `true` if a registration was removed.
    pub fn unlisten(&mut self, client: ClientId, port: Port) -> bool {
        let key = (port, Protocol::Tcp);
        if self.owners.get(&key) == Some(&client) {
            self.owners.remove(&key);
            true
        } else {
            false
        }
    }

    pub fn owner_of(&self, port: Port, protocol: Protocol) -> Option<ClientId> {
        self.owners.get(&(port, protocol)).copied()
    }

    /// Drop every registration of `client`, returning the freed pairs
    pub fn remove_owner(&mut self, client: ClientId) -> Vec<(Port, Protocol)> {
        let freed: Vec<_> = self
            .owners
            .iter()
            .filter(|(_, owner)| **owner == client)
            .map(|(key, _)| *key)
            .collect();
        for key in &freed {
            self.owners.remove(key);
        }
        freed
    }

    /// Next port from the ephemeral range accepted by `is_free`
    pub fn allocate_ephemeral(
        &mut self,
        protocol: Protocol,
        is_free: impl Fn(Port) -> bool,
    ) -> Option<Port> {
        let (lo, hi) = self.ephemeral;
        let span = u32::from(hi - lo) + 1;
        for _ in 0..span {
            let port = self.next_ephemeral;
            self.next_ephemeral = if port >= hi { lo } else { port + 1 };
            if !self.owners.contains_key(&(port, protocol)) && is_free(port) {
                return Some(port);
            }
        }
        None
    }
}
