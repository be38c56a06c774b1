//! Pure synchronous session engine of the xtcp stack.
//!
//! This crate implements the per-connection event and flow-control state
//! machine that the stack enforces on its clients, with zero runtime
//! dependencies: no tokio, no async, no I/O. It only depends on `bytes`
//! and `tracing`.
//!
//! ```text
//! ┌───────────────────────────────────────┐
//! │  xtcp-core                            │
//! │                                       │
//! │  protocol  ← ids, events, net types   │
//! │  table     ← connection records       │
//! │  listener  ← port ownership           │
//! │  recv/send ← flow controllers         │
//! │  dispatch  ← one-event-at-a-time      │
//! │  link      ← MAC / IP / multicast     │
//! │  engine    ← StackEngine              │
//! └───────────────────────────────────────┘
//! ```
//!
//! The engine is driven from two sides: client operations
//! ([`StackEngine::listen`], [`StackEngine::send`], ...) and network
//! occurrences ([`StackEngine::input`]). Commands for the packet engine
//! accumulate until [`StackEngine::drain_output`] is called.

pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod link;
pub mod listener;
pub mod protocol;
pub mod recv;
pub mod send;
pub mod table;

pub use config::XtcpCoreConfig;
pub use engine::{EngineStats, StackEngine};
pub use error::{XtcpCoreError, XtcpCoreResult};
pub use protocol::*;
pub use recv::{RecvMode, Received};
