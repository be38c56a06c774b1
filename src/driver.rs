//! Boundary to the packet engine.
//!
//! The [`NetworkDriver`] trait receives the commands the session engine
//! produces (listen, transmit, close, ...) and optionally exposes a factory
//! MAC address and a pollable PHY link status. Occurrences flow the other
//! way through a [`NetInput`] handle. Enable the `tokio` feature (on by
//! default) for the built-in [`ChannelDriver`], which forwards every command
//! to a channel.

use std::future::Future;
use std::io;
use xtcp_core::{MacAddress, NetCommand};

/// Packet engine used by the stack service.
pub trait NetworkDriver: Send + Sync + 'static {
    /// Carry out one command of the session engine.
    fn execute(&self, command: NetCommand) -> impl Future<Output = io::Result<()>> + Send + '_;

    /// MAC address read from non-volatile storage, if the hardware has one.
    fn factory_mac(&self) -> Option<MacAddress> {
        None
    }

    /// Current PHY link status for drivers that do not push link events.
    fn poll_link(&self) -> Option<bool> {
        None
    }
}

#[cfg(feature = "tokio")]
mod channel {
    use super::*;
    use crate::error::{ConnectionError, Result, XtcpError};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use tokio::sync::mpsc;
    use xtcp_core::NetEvent;

    /// [`NetworkDriver`] that forwards every command to an unbounded channel.
    pub struct ChannelDriver {
        tx: mpsc::UnboundedSender<NetCommand>,
        factory_mac: Option<MacAddress>,
        link: Option<Arc<AtomicBool>>,
    }

    impl ChannelDriver {
        /// Create a driver and the receiving end of its command channel.
        pub fn new() -> (Self, mpsc::UnboundedReceiver<NetCommand>) {
            let (tx, rx) = mpsc::unbounded_channel();
            (
                Self {
                    tx,
                    factory_mac: None,
                    link: None,
                },
                rx,
            )
        }

        /// Report `mac` as the factory address.
        pub fn with_factory_mac(mut self, mac: MacAddress) -> Self {
            self.factory_mac = Some(mac);
            self
        }

        /// Report link status from `link` when polled.
        pub fn with_polled_link(mut self, link: Arc<AtomicBool>) -> Self {
            self.link = Some(link);
            self
        }
    }

    impl NetworkDriver for ChannelDriver {
        async fn execute(&self, command: NetCommand) -> io::Result<()> {
            self.tx
                .send(command)
                .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "command channel closed"))
        }

        fn factory_mac(&self) -> Option<MacAddress> {
            self.factory_mac
        }

        fn poll_link(&self) -> Option<bool> {
            self.link.as_ref().map(|up| up.load(Ordering::Relaxed))
        }
    }

    /// Handle through which the packet engine reports occurrences to the stack.
    #[derive(Clone)]
    pub struct NetInput {
        tx: mpsc::Sender<NetEvent>,
    }

    impl NetInput {
        pub(crate) fn new(tx: mpsc::Sender<NetEvent>) -> Self {
            Self { tx }
        }

        /// Queue an occurrence, waiting for room in the input channel.
        pub async fn deliver(&self, event: NetEvent) -> Result<()> {
            self.tx
                .send(event)
                .await
                .map_err(|_| XtcpError::connection(ConnectionError::StackClosed))
        }

        /// Queue an occurrence without waiting.
        pub fn try_deliver(&self, event: NetEvent) -> Result<()> {
            self.tx.try_send(event).map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => XtcpError::Io(io::Error::new(
                    io::ErrorKind::WouldBlock,
                    "stack input channel full",
                )),
                mpsc::error::TrySendError::Closed(_) => {
                    XtcpError::connection(ConnectionError::StackClosed)
                }
            })
        }
    }
}

#[cfg(feature = "tokio")]
pub use channel::{ChannelDriver, NetInput};
