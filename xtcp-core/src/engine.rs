//! Stack engine: composes the connection table, listeners, flow controllers,
//! dispatcher and link state behind one synchronous API.
//!
//! Client operations and network occurrences both mutate the engine; the
//! caller owns it exclusively, so no two transitions of one connection ever
//! run concurrently.

use crate::config::XtcpCoreConfig;
use crate::dispatch::{Dispatcher, Ready};
use crate::error::{XtcpCoreError, XtcpCoreResult};
use crate::link::LinkManager;
use crate::listener::Listeners;
use crate::protocol::{
    ClientId, ConnId, Event, EventKind, IpConfig, MacAddress, NetCommand, NetEvent,
    Port, Protocol, Role,
};
use crate::recv::{RecvMode, Received};
use crate::send::Submit;
use crate::table::{Connection, ConnectionTable, Phase};

use bytes::Bytes;
use std::net::IpAddr;
use tracing::{debug, trace, warn};

/// Engine counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub connections_created: u64,
    pub events_delivered: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub resends: u64,
    pub violations: u64,
    /// UDP datagrams dropped because the connection's receive buffer was full
    pub dropped_datagrams: u64,
}

/// Session engine for one stack instance.
///
/// `S` is the opaque per-connection application state echoed back with
/// every event.
#[derive(Debug)]
pub struct StackEngine<S = u32> {
    config: XtcpCoreConfig,
    table: ConnectionTable<S>,
    listeners: Listeners,
    dispatcher: Dispatcher,
    link: LinkManager,
    output: Vec<NetCommand>,
    now_ms: u64,
    stats: EngineStats,
}

impl<S: Clone> StackEngine<S> {
    pub fn new(config: XtcpCoreConfig, mac: MacAddress, ip_config: IpConfig) -> XtcpCoreResult<Self> {
        config.validate()?;
        Ok(Self {
            table: ConnectionTable::new(config.max_connections),
            listeners: Listeners::new(config.ephemeral_ports),
            dispatcher: Dispatcher::new(),
            link: LinkManager::new(mac, ip_config),
            output: Vec::new(),
            now_ms: 0,
            stats: EngineStats::default(),
            config,
        })
    }

    pub fn config(&self) -> &XtcpCoreConfig {
        &self.config
    }

    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    /// Number of connection records, including ones with an undelivered
    /// terminal event
    pub fn connection_count(&self) -> usize {
        self.table.len()
    }

    /// Number of attached clients
    pub fn client_count(&self) -> usize {
        self.dispatcher.clients().count()
    }

    /// Take the commands produced since the last call
    pub fn drain_output(&mut self) -> Vec<NetCommand> {
        std::mem::take(&mut self.output)
    }

    // ------------------------------------------------------------------
    // Clients
    // ------------------------------------------------------------------

    pub fn attach_client(&mut self) -> ClientId {
        let client = self.dispatcher.attach();
        debug!(client, "Client attached");
        client
    }

    /// Forget a client: its connections are aborted and its listeners removed
    pub fn detach_client(&mut self, client: ClientId) {
        if !self.dispatcher.detach(client) {
            return;
        }

        let owned: Vec<ConnId> = self
            .table
            .iter()
            .filter(|c| c.owner == client)
            .map(|c| c.id)
            .collect();
        for id in owned {
            if let Some(conn) = self.table.remove(id) {
                if !conn.is_terminating() {
                    self.output.push(NetCommand::Abort { id });
                }
                self.output.push(NetCommand::Release { id });
            }
        }

        for (port, protocol) in self.listeners.remove_owner(client) {
            self.output.push(NetCommand::Unlisten { port, protocol });
        }
        debug!(client, "Client detached");
    }

    fn ensure_client(&self, client: ClientId) -> XtcpCoreResult<()> {
        if self.dispatcher.is_attached(client) {
            Ok(())
        } else {
            Err(XtcpCoreError::invalid(format!("client {client} is not attached")))
        }
    }

    // ------------------------------------------------------------------
    // Listener / binder
    // ------------------------------------------------------------------

    pub fn listen(&mut self, client: ClientId, port: Port, protocol: Protocol) -> XtcpCoreResult<()> {
        self.ensure_client(client)?;
        self.listeners.listen(client, port, protocol)?;
        self.output.push(NetCommand::Listen { port, protocol });
        debug!(client, port, %protocol, "Listening");
        Ok(())
    }

    /// Remove a TCP listener; a no-op for UDP ports and foreign listeners.
    /// Connections already accepted on the port stay open.
    pub fn unlisten(&mut self, client: ClientId, port: Port) -> XtcpCoreResult<()> {
        self.ensure_client(client)?;
        if self.listeners.unlisten(client, port) {
            self.output.push(NetCommand::Unlisten {
                port,
                protocol: Protocol::Tcp,
            });
            debug!(client, port, "Stopped listening");
        }
        Ok(())
    }

    /// Open a client-role connection from an ephemeral local port.
    ///
    /// UDP connections exist at once and raise `NewConnection` immediately.
    /// TCP connections raise `NewConnection` once the peer accepts, or a
    /// terminal event if it never does.
    pub fn connect(
        &mut self,
        client: ClientId,
        remote_port: Port,
        remote_addr: IpAddr,
        protocol: Protocol,
    ) -> XtcpCoreResult<ConnId> {
        self.ensure_client(client)?;

        let table = &self.table;
        let local_port = self
            .listeners
            .allocate_ephemeral(protocol, |port| !table.port_in_use(protocol, port))
            .ok_or_else(|| XtcpCoreError::invalid("no free ephemeral port"))?;

        let mss = self.config.mss;
        let id = self.table.insert_with(|id| {
            let mut conn = Connection::new(
                id,
                protocol,
                Role::Client,
                client,
                local_port,
                remote_addr,
                remote_port,
                mss,
            );
            match protocol {
                Protocol::Tcp => conn.phase = Phase::Connecting,
                Protocol::Udp => {
                    conn.events.push(EventKind::NewConnection);
                }
            }
            conn
        })?;

        self.stats.connections_created += 1;
        self.output.push(NetCommand::Connect {
            id,
            protocol,
            local_port,
            remote_addr,
            remote_port,
        });
        self.refresh(id);
        debug!(conn = id, client, local_port, %remote_addr, remote_port, %protocol, "Connecting");
        Ok(id)
    }

    /// Rebind the local port of a UDP connection
    pub fn bind_local(&mut self, client: ClientId, id: ConnId, port: Port) -> XtcpCoreResult<()> {
        let conn = owned(&mut self.table, client, id)?;
        udp_only(conn, "bind_local", &mut self.stats)?;
        settled(conn, "bind_local", &mut self.stats)?;
        let (remote_addr, remote_port) = (conn.remote_addr, conn.remote_port);
        if matches!(self.table.find_udp(port, remote_addr, remote_port), Some(other) if other != id) {
            return Err(XtcpCoreError::PortInUse {
                port,
                protocol: Protocol::Udp,
            });
        }
        let conn = self.table.get_mut(id)?;
        conn.local_port = port;
        self.output.push(NetCommand::Rebind {
            id,
            local_port: conn.local_port,
            remote_addr: conn.remote_addr,
            remote_port: conn.remote_port,
        });
        Ok(())
    }

    /// Point a UDP connection at a new remote endpoint; later sends go there
    pub fn bind_remote(
        &mut self,
        client: ClientId,
        id: ConnId,
        remote_addr: IpAddr,
        remote_port: Port,
    ) -> XtcpCoreResult<()> {
        let conn = owned(&mut self.table, client, id)?;
        udp_only(conn, "bind_remote", &mut self.stats)?;
        settled(conn, "bind_remote", &mut self.stats)?;
        conn.remote_addr = remote_addr;
        conn.remote_port = remote_port;
        self.output.push(NetCommand::Rebind {
            id,
            local_port: conn.local_port,
            remote_addr,
            remote_port,
        });
        Ok(())
    }

    // ------------------------------------------------------------------
    // Dispatch
    // ------------------------------------------------------------------

    /// Deliver the oldest ready event of `client`, if any.
    ///
    /// Delivering a terminal event reclaims the connection record.
    pub fn next_event(&mut self, client: ClientId) -> XtcpCoreResult<Option<Event<S>>> {
        self.ensure_client(client)?;

        while let Some(entry) = self.dispatcher.pop(client) {
            let id = match entry {
                Ready::Link(event) => {
                    self.stats.events_delivered += 1;
                    return Ok(Some(Event::Link(event)));
                }
                Ready::Connection(id) => id,
            };

            let Some(conn) = self.table.get_any_mut(id) else {
                continue;
            };
            if conn.owner != client {
                continue;
            }
            let Some(kind) = conn.events.deliver() else {
                continue;
            };
            let snapshot = conn.snapshot(kind);
            self.stats.events_delivered += 1;
            trace!(conn = id, client, event = %kind, "Event delivered");

            if kind.is_terminal() {
                self.table.remove(id);
                self.output.push(NetCommand::Release { id });
                debug!(conn = id, event = %kind, "Connection reclaimed");
            } else {
                self.refresh(id);
            }
            return Ok(Some(Event::Connection(snapshot)));
        }
        Ok(None)
    }

    /// Event of `id` the client has not acted on yet
    pub fn pending_event(&self, id: ConnId) -> Option<EventKind> {
        self.table.get_any(id).and_then(|c| c.events.pending())
    }

    // ------------------------------------------------------------------
    // Send flow
    // ------------------------------------------------------------------

    /// Arm the send handshake; `RequestData` follows when the stack can
    /// take payload
    pub fn init_send(&mut self, client: ClientId, id: ConnId) -> XtcpCoreResult<()> {
        let conn = owned(&mut self.table, client, id)?;
        settled(conn, "init_send", &mut self.stats)?;
        if let Err(state) = conn.send.init() {
            return Err(reject(
                &mut self.stats,
                id,
                "init_send",
                format!("send handshake already {state:?}"),
            ));
        }
        self.refresh(id);
        Ok(())
    }

    /// Answer a send event. An empty payload ends the handshake.
    pub fn send(&mut self, client: ClientId, id: ConnId, payload: Bytes) -> XtcpCoreResult<()> {
        let conn = owned(&mut self.table, client, id)?;
        match conn.events.awaiting() {
            Some(kind) if kind.awaits_send() => {}
            other => {
                return Err(reject(
                    &mut self.stats,
                    id,
                    "send",
                    awaiting_description(other),
                ))
            }
        }

        let len = payload.len();
        if len > conn.mss {
            return Err(XtcpCoreError::PayloadTooLarge { len, mss: conn.mss });
        }
        if let Some(expected) = conn.send.expected_resend() {
            if len != 0 && len != expected {
                return Err(reject(
                    &mut self.stats,
                    id,
                    "send",
                    format!("resend of {expected} bytes expected, got {len}"),
                ));
            }
        }

        conn.events.resolve();
        match conn.send.submit(len) {
            Submit::Transmit => {
                self.stats.bytes_sent += len as u64;
                self.output.push(NetCommand::Transmit { id, payload });
                trace!(conn = id, bytes = len, "Payload submitted");
            }
            Submit::Complete => {
                trace!(conn = id, "Send handshake complete");
            }
        }
        self.refresh(id);
        Ok(())
    }

    /// Declare that the client can resend only the unacknowledged suffix
    pub fn accept_partial_ack(&mut self, client: ClientId, id: ConnId) -> XtcpCoreResult<()> {
        let conn = owned(&mut self.table, client, id)?;
        settled(conn, "accept_partial_ack", &mut self.stats)?;
        conn.send.enable_partial_ack();
        Ok(())
    }

    /// Bytes the peer confirmed on `id` so far
    pub fn confirmed_bytes(&self, id: ConnId) -> Option<u64> {
        self.table.get_any(id).map(|c| c.send.confirmed())
    }

    // ------------------------------------------------------------------
    // Receive flow
    // ------------------------------------------------------------------

    /// Answer a receive event
    pub fn recv(&mut self, client: ClientId, id: ConnId, mode: RecvMode) -> XtcpCoreResult<Received> {
        let conn = owned(&mut self.table, client, id)?;
        match conn.events.awaiting() {
            Some(kind) if kind.awaits_recv() => {}
            other => {
                return Err(reject(
                    &mut self.stats,
                    id,
                    "recv",
                    awaiting_description(other),
                ))
            }
        }

        conn.events.resolve();
        let received = conn.recv.consume(mode);
        self.stats.bytes_received += received.pulled as u64;
        if !conn.recv.window_open() {
            self.output.push(NetCommand::SetWindow { id, open: false });
            trace!(conn = id, "Receive window closed until ack");
        }
        self.refresh(id);
        Ok(received)
    }

    /// Close the receive window after every handled receive event
    pub fn ack_recv_mode(&mut self, client: ClientId, id: ConnId) -> XtcpCoreResult<()> {
        let conn = owned(&mut self.table, client, id)?;
        settled(conn, "ack_recv_mode", &mut self.stats)?;
        conn.recv.enable_ack_mode();
        Ok(())
    }

    /// Reopen a window closed by ack-receive mode. Acking an open window
    /// does nothing.
    pub fn ack_recv(&mut self, client: ClientId, id: ConnId) -> XtcpCoreResult<()> {
        let conn = owned(&mut self.table, client, id)?;
        if conn.recv.ack() {
            self.output.push(NetCommand::SetWindow { id, open: true });
            self.refresh(id);
        }
        Ok(())
    }

    pub fn window_open(&self, id: ConnId) -> Option<bool> {
        self.table.get_any(id).map(|c| c.recv.window_open())
    }

    // ------------------------------------------------------------------
    // Connection settings
    // ------------------------------------------------------------------

    /// Raise `Poll` on `id` every `interval_ms`; 0 disables polling
    pub fn set_poll_interval(&mut self, client: ClientId, id: ConnId, interval_ms: u64) -> XtcpCoreResult<()> {
        let conn = owned(&mut self.table, client, id)?;
        settled(conn, "set_poll_interval", &mut self.stats)?;
        conn.poll.arm(interval_ms, self.now_ms);
        if interval_ms == 0 {
            conn.events.clear_poll();
        }
        Ok(())
    }

    pub fn pause(&mut self, client: ClientId, id: ConnId) -> XtcpCoreResult<()> {
        let conn = owned(&mut self.table, client, id)?;
        settled(conn, "pause", &mut self.stats)?;
        if !conn.paused {
            conn.paused = true;
            self.output.push(NetCommand::Pause { id });
        }
        Ok(())
    }

    /// Resume network activity. A window closed by ack-receive mode stays
    /// closed.
    pub fn unpause(&mut self, client: ClientId, id: ConnId) -> XtcpCoreResult<()> {
        let conn = owned(&mut self.table, client, id)?;
        settled(conn, "unpause", &mut self.stats)?;
        if conn.paused {
            conn.paused = false;
            self.output.push(NetCommand::Unpause { id });
            self.refresh(id);
        }
        Ok(())
    }

    /// Attach an opaque value echoed back with every event of `id`
    pub fn set_app_state(&mut self, client: ClientId, id: ConnId, state: S) -> XtcpCoreResult<()> {
        owned(&mut self.table, client, id)?.app_state = Some(state);
        Ok(())
    }

    /// Close gracefully. `Closed` supersedes anything still queued.
    pub fn close(&mut self, client: ClientId, id: ConnId) -> XtcpCoreResult<()> {
        owned(&mut self.table, client, id)?;
        self.terminate(id, EventKind::Closed);
        self.output.push(NetCommand::Close { id });
        Ok(())
    }

    /// Reset the connection. `Aborted` supersedes anything still queued.
    pub fn abort(&mut self, client: ClientId, id: ConnId) -> XtcpCoreResult<()> {
        owned(&mut self.table, client, id)?;
        self.terminate(id, EventKind::Aborted);
        self.output.push(NetCommand::Abort { id });
        Ok(())
    }

    // ------------------------------------------------------------------
    // Link
    // ------------------------------------------------------------------

    pub fn mac_address(&self) -> MacAddress {
        self.link.mac_address()
    }

    pub fn ip_config(&self) -> IpConfig {
        self.link.ip_config()
    }

    pub fn is_link_up(&self) -> bool {
        self.link.is_up()
    }

    pub fn multicast_groups(&self) -> Vec<IpAddr> {
        self.link.groups().copied().collect()
    }

    pub fn join_multicast(&mut self, client: ClientId, group: IpAddr) -> XtcpCoreResult<()> {
        self.ensure_client(client)?;
        if self.link.join(group)? {
            self.output.push(NetCommand::JoinGroup { group });
            debug!(client, %group, "Joined multicast group");
        }
        Ok(())
    }

    pub fn leave_multicast(&mut self, client: ClientId, group: IpAddr) -> XtcpCoreResult<()> {
        self.ensure_client(client)?;
        if self.link.leave(group)? {
            self.output.push(NetCommand::LeaveGroup { group });
            debug!(client, %group, "Left multicast group");
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Network side
    // ------------------------------------------------------------------

    /// Feed one occurrence from the packet engine
    pub fn input(&mut self, event: NetEvent) {
        match event {
            NetEvent::PeerConnected {
                local_port,
                remote_addr,
                remote_port,
            } => {
                self.accept_peer(Protocol::Tcp, local_port, remote_addr, remote_port);
            }
            NetEvent::Datagram {
                local_port,
                remote_addr,
                remote_port,
                payload,
            } => {
                let id = match self.table.find_udp(local_port, remote_addr, remote_port) {
                    Some(id) => Some(id),
                    None => self.accept_peer(Protocol::Udp, local_port, remote_addr, remote_port),
                };
                if let Some(id) = id {
                    self.datagram(id, payload);
                }
            }
            NetEvent::Connected { id } => {
                let Some(conn) = live(&mut self.table, id) else {
                    return;
                };
                if conn.phase == Phase::Connecting {
                    conn.phase = Phase::Established;
                    conn.events.push(EventKind::NewConnection);
                    debug!(conn = id, "Connection established");
                    self.refresh(id);
                }
            }
            NetEvent::Data { id, payload, push } => self.inbound(id, payload, push),
            NetEvent::Transmitted { id } => {
                let Some(conn) = live(&mut self.table, id) else {
                    return;
                };
                if let Some(kind) = conn.send.transmitted() {
                    conn.events.push(kind);
                    self.refresh(id);
                }
            }
            NetEvent::TransmitFailed { id, acked } => {
                let Some(conn) = live(&mut self.table, id) else {
                    return;
                };
                if let Some(kind) = conn.send.failed(acked) {
                    conn.events.push(kind);
                    if kind == EventKind::ResendData {
                        self.stats.resends += 1;
                        debug!(conn = id, acked, "Transmission failed, resend requested");
                    }
                    self.refresh(id);
                }
            }
            NetEvent::Closed { id } => self.terminate(id, EventKind::Closed),
            NetEvent::Aborted { id } => self.terminate(id, EventKind::Aborted),
            NetEvent::TimedOut { id } => self.terminate(id, EventKind::TimedOut),
            NetEvent::LinkUp { ip_config } => {
                if let Some(event) = self.link.set_up(ip_config) {
                    debug!(ip = %self.link.ip_config().address(), "Link up");
                    self.dispatcher.broadcast(event);
                }
            }
            NetEvent::LinkDown => {
                if let Some(event) = self.link.set_down() {
                    debug!("Link down");
                    self.dispatcher.broadcast(event);
                }
            }
        }
    }

    /// Advance the clock and raise due polls
    pub fn tick(&mut self, now_ms: u64) {
        self.now_ms = now_ms;
        let mut due = Vec::new();
        for conn in self.table.iter_mut() {
            if conn.phase == Phase::Established && !conn.is_terminating() && conn.poll.fire(now_ms) {
                conn.events.poll();
                due.push(conn.id);
            }
        }
        for id in due {
            self.refresh(id);
        }
    }

    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    /// Create a server connection for an inbound peer, or refuse it
    fn accept_peer(
        &mut self,
        protocol: Protocol,
        local_port: Port,
        remote_addr: IpAddr,
        remote_port: Port,
    ) -> Option<ConnId> {
        let owner = self
            .listeners
            .owner_of(local_port, protocol)
            .filter(|client| self.dispatcher.is_attached(*client));
        let Some(owner) = owner else {
            trace!(local_port, %remote_addr, remote_port, %protocol, "No listener, refusing peer");
            self.output.push(NetCommand::Refuse {
                local_port,
                remote_addr,
                remote_port,
            });
            return None;
        };

        let mss = self.config.mss;
        let inserted = self.table.insert_with(|id| {
            let mut conn = Connection::new(
                id,
                protocol,
                Role::Server,
                owner,
                local_port,
                remote_addr,
                remote_port,
                mss,
            );
            conn.events.push(EventKind::NewConnection);
            conn
        });
        match inserted {
            Ok(id) => {
                self.stats.connections_created += 1;
                self.output.push(NetCommand::Accept {
                    id,
                    protocol,
                    local_port,
                    remote_addr,
                    remote_port,
                });
                self.refresh(id);
                debug!(conn = id, client = owner, local_port, %remote_addr, remote_port, %protocol, "Peer accepted");
                Some(id)
            }
            Err(e) => {
                warn!(error = %e, local_port, %remote_addr, "Refusing peer");
                self.output.push(NetCommand::Refuse {
                    local_port,
                    remote_addr,
                    remote_port,
                });
                None
            }
        }
    }

    fn inbound(&mut self, id: ConnId, payload: Bytes, push: bool) {
        let max_chunk = self.config.max_receive_size;
        let Some(conn) = live(&mut self.table, id) else {
            return;
        };
        conn.recv.push_inbound(payload, push, max_chunk);
        self.refresh(id);
    }

    /// Buffer a datagram unless the connection already holds too much
    /// undelivered data
    fn datagram(&mut self, id: ConnId, payload: Bytes) {
        let cap = self.config.recv_buffer_size;
        let Some(conn) = live(&mut self.table, id) else {
            return;
        };
        let len = payload.len();
        if conn.recv.buffered().saturating_add(len) > cap {
            self.stats.dropped_datagrams += 1;
            debug!(conn = id, len, cap, "Receive buffer full, datagram dropped");
            return;
        }
        self.inbound(id, payload, false);
    }

    /// Queue a terminal event. It replaces whatever the connection still had
    /// queued or awaited, and buffered inbound data is dropped.
    fn terminate(&mut self, id: ConnId, kind: EventKind) {
        let Some(conn) = live(&mut self.table, id) else {
            return;
        };
        conn.events.push(kind);
        conn.recv.discard();
        conn.send.reset();
        conn.poll = Default::default();
        debug!(conn = id, event = %kind, "Connection terminating");
        self.refresh(id);
    }

    /// Raise the next flow-control event if the connection is idle, then
    /// put it in its owner's ready queue if it has something to deliver.
    fn refresh(&mut self, id: ConnId) {
        let Some(conn) = self.table.get_any_mut(id) else {
            return;
        };

        let idle = conn.events.awaiting().is_none() && conn.events.queued_len() == 0;
        if idle && !conn.is_terminating() && conn.phase == Phase::Established {
            let request = if conn.paused {
                None
            } else {
                conn.send.issue_request()
            };
            if let Some(kind) = request {
                conn.events.push(kind);
            } else if let Some(kind) = conn.recv.ready_event(conn.paused) {
                conn.recv.announce();
                conn.events.push(kind);
            }
        }

        if conn.events.next_deliverable().is_some() {
            self.dispatcher.schedule(conn.owner, id);
        }
    }
}

/// Live connection owned by `client`; anything else is unknown to it
fn owned<S>(
    table: &mut ConnectionTable<S>,
    client: ClientId,
    id: ConnId,
) -> XtcpCoreResult<&mut Connection<S>> {
    match table.get_mut(id) {
        Ok(conn) if conn.owner == client => Ok(conn),
        _ => Err(XtcpCoreError::unknown(id)),
    }
}

/// Live connection for a network occurrence
fn live<S>(table: &mut ConnectionTable<S>, id: ConnId) -> Option<&mut Connection<S>> {
    let conn = table.get_mut(id).ok();
    if conn.is_none() {
        trace!(conn = id, "Ignoring network event for unknown connection");
    }
    conn
}

/// Reject operations while the client still owes a reaction
fn settled<S>(conn: &Connection<S>, operation: &'static str, stats: &mut EngineStats) -> XtcpCoreResult<()> {
    match conn.events.awaiting() {
        None => Ok(()),
        Some(_) => Err(reject(
            stats,
            conn.id,
            operation,
            awaiting_description(conn.events.awaiting()),
        )),
    }
}

fn udp_only<S>(conn: &Connection<S>, operation: &'static str, stats: &mut EngineStats) -> XtcpCoreResult<()> {
    if conn.protocol == Protocol::Udp {
        Ok(())
    } else {
        Err(reject(stats, conn.id, operation, "not a UDP connection"))
    }
}

fn reject(
    stats: &mut EngineStats,
    id: ConnId,
    operation: &'static str,
    state: impl Into<String>,
) -> XtcpCoreError {
    stats.violations += 1;
    let error = XtcpCoreError::violation(id, operation, state);
    debug!(conn = id, error = %error, "Operation rejected");
    error
}

fn awaiting_description(awaiting: Option<EventKind>) -> String {
    match awaiting {
        Some(kind) => format!("{kind} awaits a reaction"),
        None => "no event awaits this reaction".to_string(),
    }
}
