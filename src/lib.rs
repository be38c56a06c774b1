//! # xtcp: session layer of an embedded TCP/UDP stack
//!
//! Connection-oriented event and flow-control layer sitting on top of a
//! packet engine. Clients never touch packets: they fetch one event at a
//! time per connection and answer it with exactly one operation.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────┐
//! │  xtcp-tokio  (this crate)             │
//! │                                       │
//! │  XtcpStack / XtcpClient  ← user API   │
//! │  actor                   ← service    │
//! │  driver                  ← packet I/O │
//! ├───────────────────────────────────────┤
//! │  xtcp-core  (dependency)              │
//! │                                       │
//! │  StackEngine ← pure sync state machine│
//! │  protocol    ← ids, events, net types │
//! └───────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use xtcp_tokio::{ChannelDriver, EventKind, Protocol, StackConfig, XtcpStack};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (driver, _commands) = ChannelDriver::new();
//!     let (stack, _input) = XtcpStack::<u32>::spawn(StackConfig::dhcp(), driver)?;
//!     let mut client = stack.client().await?;
//!     client.listen(7, Protocol::Tcp).await?;
//!
//!     loop {
//!         let event = client.fetch_event().await?;
//!         let Some(id) = event.connection_id() else {
//!             continue;
//!         };
//!         match event.kind() {
//!             EventKind::NewConnection => client.init_send(id).await?,
//!             EventKind::RequestData => client.send(id, &b"hello"[..]).await?,
//!             EventKind::SentData => client.complete_send(id).await?,
//!             EventKind::RecvData | EventKind::PushData => {
//!                 let data = client.recv(id).await?;
//!                 println!("Received: {:?}", data);
//!             }
//!             _ => {}
//!         }
//!     }
//! }
//! ```

// ── Layer 1: Session engine (re-exported from xtcp-core) ────────────────

/// Identifiers, events and packet engine boundary types.
pub use xtcp_core::protocol;
pub use xtcp_core::protocol::{
    ClientId, ConnId, ConnectionSnapshot, Event, EventKind, IpConfig, LinkEvent, MacAddress,
    NetCommand, NetEvent, Port, Protocol, Role,
};

/// Direct access to the standalone `xtcp-core` crate.
pub use xtcp_core;

// ── Layer 2: Packet engine boundary ─────────────────────────────────────

pub mod driver;
pub use driver::NetworkDriver;
#[cfg(feature = "tokio")]
pub use driver::{ChannelDriver, NetInput};

// ── Layer 3: Configuration & errors (extends core with runtime concerns) ─

pub mod config;
pub mod error;
pub use config::StackConfig;
pub use error::{ConnectionError, Result, XtcpError};

// ── Layer 4: Stack service (actor + stack + client) ─────────────────────

#[cfg(feature = "tokio")]
pub(crate) mod actor;
#[cfg(feature = "tokio")]
pub mod client;
#[cfg(feature = "tokio")]
pub mod stack;

#[cfg(feature = "tokio")]
pub use client::XtcpClient;
#[cfg(feature = "tokio")]
pub use stack::XtcpStack;

#[cfg(feature = "tokio")]
pub mod metrics;

// ── Version info ────────────────────────────────────────────────────────

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
