//! Connection table: owns every connection record and hands out ids.

use crate::dispatch::EventQueue;
use crate::error::{XtcpCoreError, XtcpCoreResult};
use crate::protocol::{ClientId, ConnId, ConnectionSnapshot, EventKind, Port, Protocol, Role};
use crate::recv::RecvFlow;
use crate::send::SendFlow;
use std::net::IpAddr;

/// Connection lifecycle as seen by the packet engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// TCP connect issued, peer has not answered yet
    Connecting,
    Established,
}

/// Per-connection poll timer; an interval of 0 disables it
#[derive(Debug, Clone, Copy, Default)]
pub struct PollTimer {
    pub interval_ms: u64,
    pub next_due_ms: u64,
}

impl PollTimer {
    pub fn arm(&mut self, interval_ms: u64, now_ms: u64) {
        self.interval_ms = interval_ms;
        self.next_due_ms = now_ms.saturating_add(interval_ms);
    }

    /// Returns `true` once per elapsed period
    pub fn fire(&mut self, now_ms: u64) -> bool {
        if self.interval_ms == 0 || now_ms < self.next_due_ms {
            return false;
        }
        // skip missed periods instead of bursting
        while self.next_due_ms <= now_ms {
            self.next_due_ms = self.next_due_ms.saturating_add(self.interval_ms);
        }
        true
    }
}

/// One connection record
#[derive(Debug)]
pub struct Connection<S> {
    pub id: ConnId,
    pub protocol: Protocol,
    pub role: Role,
    pub owner: ClientId,
    pub app_state: Option<S>,
    pub remote_addr: IpAddr,
    pub remote_port: Port,
    pub local_port: Port,
    pub mss: usize,
    pub phase: Phase,
    pub recv: RecvFlow,
    pub send: SendFlow,
    pub events: EventQueue,
    pub paused: bool,
    pub poll: PollTimer,
}

impl<S> Connection<S> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: ConnId,
        protocol: Protocol,
        role: Role,
        owner: ClientId,
        local_port: Port,
        remote_addr: IpAddr,
        remote_port: Port,
        mss: usize,
    ) -> Self {
        Self {
            id,
            protocol,
            role,
            owner,
            app_state: None,
            remote_addr,
            remote_port,
            local_port,
            mss,
            phase: Phase::Established,
            recv: RecvFlow::new(),
            send: SendFlow::new(),
            events: EventQueue::new(),
            paused: false,
            poll: PollTimer::default(),
        }
    }

    /// A terminal event is queued; the id no longer accepts operations
    pub fn is_terminating(&self) -> bool {
        self.events.is_terminal()
    }
}

impl<S: Clone> Connection<S> {
    /// Copy of the fields a client sees with `event`
    pub fn snapshot(&self, event: EventKind) -> ConnectionSnapshot<S> {
        ConnectionSnapshot {
            id: self.id,
            event,
            protocol: self.protocol,
            role: self.role,
            app_state: self.app_state.clone(),
            remote_addr: self.remote_addr,
            remote_port: self.remote_port,
            local_port: self.local_port,
            mss: self.mss,
            outstanding: self.send.outstanding(),
        }
    }
}

/// Fixed-capacity table of connection records.
///
/// Ids are slot indices. Allocation resumes after the last handed-out slot,
/// so a freed id is reused as late as possible.
#[derive(Debug)]
pub struct ConnectionTable<S> {
    slots: Vec<Option<Connection<S>>>,
    cursor: usize,
    len: usize,
}

impl<S> ConnectionTable<S> {
    pub fn new(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Self {
            slots,
            cursor: 0,
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Insert a record built for a free id
    pub fn insert_with(
        &mut self,
        build: impl FnOnce(ConnId) -> Connection<S>,
    ) -> XtcpCoreResult<ConnId> {
        let capacity = self.slots.len();
        let index = (0..capacity)
            .map(|step| (self.cursor + step) % capacity)
            .find(|&i| self.slots[i].is_none())
            .ok_or(XtcpCoreError::TableFull { capacity })?;

        let id = index as ConnId;
        self.slots[index] = Some(build(id));
        self.cursor = (index + 1) % capacity;
        self.len += 1;
        Ok(id)
    }

    /// Live record; terminating records are not visible
    pub fn get(&self, id: ConnId) -> XtcpCoreResult<&Connection<S>> {
        match self.get_any(id) {
            Some(conn) if !conn.is_terminating() => Ok(conn),
            _ => Err(XtcpCoreError::unknown(id)),
        }
    }

    pub fn get_mut(&mut self, id: ConnId) -> XtcpCoreResult<&mut Connection<S>> {
        match self.get_any_mut(id) {
            Some(conn) if !conn.is_terminating() => Ok(conn),
            _ => Err(XtcpCoreError::unknown(id)),
        }
    }

    /// Record in any state, including one whose terminal event is undelivered
    pub fn get_any(&self, id: ConnId) -> Option<&Connection<S>> {
        self.slots.get(id as usize).and_then(Option::as_ref)
    }

    pub fn get_any_mut(&mut self, id: ConnId) -> Option<&mut Connection<S>> {
        self.slots.get_mut(id as usize).and_then(Option::as_mut)
    }

    /// Reclaim the record; its id becomes free
    pub fn remove(&mut self, id: ConnId) -> Option<Connection<S>> {
        let conn = self.slots.get_mut(id as usize)?.take()?;
        self.len -= 1;
        Some(conn)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Connection<S>> {
        self.slots.iter().filter_map(Option::as_ref)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Connection<S>> {
        self.slots.iter_mut().filter_map(Option::as_mut)
    }

    /// UDP connection bound to this local port and remote endpoint
    pub fn find_udp(&self, local_port: Port, remote_addr: IpAddr, remote_port: Port) -> Option<ConnId> {
        self.iter()
            .find(|c| {
                c.protocol == Protocol::Udp
                    && !c.is_terminating()
                    && c.local_port == local_port
                    && c.remote_addr == remote_addr
                    && c.remote_port == remote_port
            })
            .map(|c| c.id)
    }

    /// Local port already used by a live connection of `protocol`
    pub fn port_in_use(&self, protocol: Protocol, port: Port) -> bool {
        self.iter()
            .any(|c| c.protocol == protocol && c.local_port == port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn conn(id: ConnId) -> Connection<u32> {
        Connection::new(
            id,
            Protocol::Udp,
            Role::Client,
            0,
            5000,
            IpAddr::V4(Ipv4Addr::new(10, 0, 0, 9)),
            6000,
            1472,
        )
    }

    #[test]
    fn test_ids_unique_and_table_full() {
        let mut table = ConnectionTable::new(2);
        let a = table.insert_with(conn).unwrap();
        let b = table.insert_with(conn).unwrap();
        assert_ne!(a, b);
        assert_eq!(
            table.insert_with(conn),
            Err(XtcpCoreError::TableFull { capacity: 2 })
        );
    }

    #[test]
    fn test_freed_id_reused_last() {
        let mut table = ConnectionTable::new(3);
        let a = table.insert_with(conn).unwrap();
        table.remove(a);
        let b = table.insert_with(conn).unwrap();
        assert_ne!(a, b);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_terminating_record_hidden_from_lookup() {
        let mut table = ConnectionTable::new(4);
        let id = table.insert_with(conn).unwrap();
        table.get_mut(id).unwrap().events.push(EventKind::Closed);

        assert_eq!(table.get(id).err(), Some(XtcpCoreError::unknown(id)));
        assert!(table.get_any(id).is_some());
        assert_eq!(table.find_udp(5000, IpAddr::V4(Ipv4Addr::new(10, 0, 0, 9)), 6000), None);
    }

    #[test]
    fn test_poll_timer_fires_once_per_period() {
        let mut timer = PollTimer::default();
        assert!(!timer.fire(1_000));
        timer.arm(100, 0);
        assert!(!timer.fire(50));
        assert!(timer.fire(100));
        assert!(!timer.fire(150));
        assert!(timer.fire(450));
        assert!(!timer.fire(499));
        assert!(timer.fire(500));
    }
}
