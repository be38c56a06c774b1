//! Session protocol types: identifiers, addresses, events and the boundary
//! to the packet engine.

use bytes::Bytes;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Connection identifier, unique among live connections
pub type ConnId = u32;

/// Client endpoint identifier
pub type ClientId = u32;

/// TCP/UDP port number
pub type Port = u16;

/// Transport protocol of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Protocol {
    Tcp,
    Udp,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Tcp => write!(f, "tcp"),
            Protocol::Udp => write!(f, "udp"),
        }
    }
}

/// Which side opened the connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Created by a local `connect`
    Client,
    /// Accepted on a local listener
    Server,
}

/// Kind of a notified event.
///
/// `TimedOut`, `Aborted` and `Closed` are terminal: nothing follows them on
/// the same connection id. `IfUp`/`IfDown` belong to no connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    NewConnection,
    RecvData,
    PushData,
    RequestData,
    SentData,
    ResendData,
    TimedOut,
    Aborted,
    Closed,
    Poll,
    IfUp,
    IfDown,
}

impl EventKind {
    /// Last event of a connection
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            EventKind::TimedOut | EventKind::Aborted | EventKind::Closed
        )
    }

    /// Link-wide event with no connection identity
    pub fn is_link(self) -> bool {
        matches!(self, EventKind::IfUp | EventKind::IfDown)
    }

    /// Must be answered by one of the receive operations
    pub fn awaits_recv(self) -> bool {
        matches!(self, EventKind::RecvData | EventKind::PushData)
    }

    /// Must be answered by a send (possibly zero-length)
    pub fn awaits_send(self) -> bool {
        matches!(
            self,
            EventKind::RequestData | EventKind::SentData | EventKind::ResendData
        )
    }

    /// Holds the connection until the client reacts
    pub fn awaits_reaction(self) -> bool {
        self.awaits_recv() || self.awaits_send()
    }

    /// Get event name for logs
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::NewConnection => "new_connection",
            EventKind::RecvData => "recv_data",
            EventKind::PushData => "push_data",
            EventKind::RequestData => "request_data",
            EventKind::SentData => "sent_data",
            EventKind::ResendData => "resend_data",
            EventKind::TimedOut => "timed_out",
            EventKind::Aborted => "aborted",
            EventKind::Closed => "closed",
            EventKind::Poll => "poll",
            EventKind::IfUp => "ifup",
            EventKind::IfDown => "ifdown",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ethernet MAC address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MacAddress(pub [u8; 6]);

impl MacAddress {
    pub const ZERO: MacAddress = MacAddress([0; 6]);

    pub fn octets(&self) -> [u8; 6] {
        self.0
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

/// Host IP configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpConfig {
    V4 {
        address: Ipv4Addr,
        netmask: Ipv4Addr,
        gateway: Ipv4Addr,
    },
    V6 {
        address: Ipv6Addr,
    },
}

impl IpConfig {
    /// All-zero IPv4 configuration; the address is to be obtained by DHCP
    pub fn unassigned() -> Self {
        IpConfig::V4 {
            address: Ipv4Addr::UNSPECIFIED,
            netmask: Ipv4Addr::UNSPECIFIED,
            gateway: Ipv4Addr::UNSPECIFIED,
        }
    }

    /// Host address
    pub fn address(&self) -> IpAddr {
        match self {
            IpConfig::V4 { address, .. } => IpAddr::V4(*address),
            IpConfig::V6 { address } => IpAddr::V6(*address),
        }
    }

    /// IP protocol version (4 or 6)
    pub fn version(&self) -> u8 {
        match self {
            IpConfig::V4 { .. } => 4,
            IpConfig::V6 { .. } => 6,
        }
    }

    /// A zero IPv4 address asks the link layer for a dynamic address
    pub fn wants_dhcp(&self) -> bool {
        matches!(self, IpConfig::V4 { address, .. } if address.is_unspecified())
    }
}

impl Default for IpConfig {
    fn default() -> Self {
        Self::unassigned()
    }
}

/// Convert an address held in a `u32` whose in-memory bytes are in network
/// order into an [`Ipv4Addr`].
pub fn ipv4_from_u32(i: u32) -> Ipv4Addr {
    Ipv4Addr::from(i.to_ne_bytes())
}

/// State of one connection as seen by the client at event delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSnapshot<S> {
    pub id: ConnId,
    pub event: EventKind,
    pub protocol: Protocol,
    pub role: Role,
    /// Token set with `set_app_state`, `None` until first set
    pub app_state: Option<S>,
    pub remote_addr: IpAddr,
    pub remote_port: Port,
    pub local_port: Port,
    /// Advisory upper bound for one send; meaningful on send events
    pub mss: usize,
    /// Bytes transmitted but not confirmed; `Some` only with partial ack enabled
    pub outstanding: Option<usize>,
}

/// Link-wide event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    Up { ip_config: IpConfig },
    Down,
}

impl LinkEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            LinkEvent::Up { .. } => EventKind::IfUp,
            LinkEvent::Down => EventKind::IfDown,
        }
    }
}

/// One event as handed to a client by the dispatcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event<S> {
    Connection(ConnectionSnapshot<S>),
    Link(LinkEvent),
}

impl<S> Event<S> {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Connection(snapshot) => snapshot.event,
            Event::Link(link) => link.kind(),
        }
    }

    /// Connection the event belongs to; `None` for link events
    pub fn connection_id(&self) -> Option<ConnId> {
        match self {
            Event::Connection(snapshot) => Some(snapshot.id),
            Event::Link(_) => None,
        }
    }

    pub fn as_connection(&self) -> Option<&ConnectionSnapshot<S>> {
        match self {
            Event::Connection(snapshot) => Some(snapshot),
            Event::Link(_) => None,
        }
    }
}

/// Occurrences reported by the packet engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetEvent {
    /// A TCP peer completed a handshake on a local port
    PeerConnected {
        local_port: Port,
        remote_addr: IpAddr,
        remote_port: Port,
    },
    /// A UDP datagram arrived on a local port
    Datagram {
        local_port: Port,
        remote_addr: IpAddr,
        remote_port: Port,
        payload: Bytes,
    },
    /// An outbound TCP connect was accepted by the peer
    Connected { id: ConnId },
    /// Stream data arrived; `push` marks a push boundary
    Data {
        id: ConnId,
        payload: Bytes,
        push: bool,
    },
    /// The last transmitted payload was confirmed
    Transmitted { id: ConnId },
    /// The last transmitted payload failed; `acked` leading bytes were confirmed
    TransmitFailed { id: ConnId, acked: usize },
    Closed { id: ConnId },
    Aborted { id: ConnId },
    TimedOut { id: ConnId },
    /// Link came up, optionally with a freshly assigned address
    LinkUp { ip_config: Option<IpConfig> },
    LinkDown,
}

/// Commands for the packet engine, drained with
/// [`StackEngine::drain_output`](crate::StackEngine::drain_output)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetCommand {
    Listen {
        port: Port,
        protocol: Protocol,
    },
    Unlisten {
        port: Port,
        protocol: Protocol,
    },
    Connect {
        id: ConnId,
        protocol: Protocol,
        local_port: Port,
        remote_addr: IpAddr,
        remote_port: Port,
    },
    /// A peer was bound to a new server connection
    Accept {
        id: ConnId,
        protocol: Protocol,
        local_port: Port,
        remote_addr: IpAddr,
        remote_port: Port,
    },
    /// Inbound peer with no listener or no free slot
    Refuse {
        local_port: Port,
        remote_addr: IpAddr,
        remote_port: Port,
    },
    Rebind {
        id: ConnId,
        local_port: Port,
        remote_addr: IpAddr,
        remote_port: Port,
    },
    Transmit {
        id: ConnId,
        payload: Bytes,
    },
    /// Advertise an open or zero receive window
    SetWindow {
        id: ConnId,
        open: bool,
    },
    Pause {
        id: ConnId,
    },
    Unpause {
        id: ConnId,
    },
    Close {
        id: ConnId,
    },
    Abort {
        id: ConnId,
    },
    /// The record is gone and the id may be handed out again
    Release {
        id: ConnId,
    },
    JoinGroup {
        group: IpAddr,
    },
    LeaveGroup {
        group: IpAddr,
    },
}

impl NetCommand {
    /// Connection the command refers to, if any
    pub fn connection_id(&self) -> Option<ConnId> {
        match self {
            NetCommand::Connect { id, .. }
            | NetCommand::Accept { id, .. }
            | NetCommand::Rebind { id, .. }
            | NetCommand::Transmit { id, .. }
            | NetCommand::SetWindow { id, .. }
            | NetCommand::Pause { id }
            | NetCommand::Unpause { id }
            | NetCommand::Close { id }
            | NetCommand::Abort { id }
            | NetCommand::Release { id } => Some(*id),
            _ => None,
        }
    }
}
