//! Client endpoint of a running stack.

use crate::actor::{request, stack_closed, ConnOp, ConnReply, StackCmd};
use crate::error::{Result, XtcpError};

use bytes::Bytes;
use std::net::IpAddr;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace};
use xtcp_core::{ClientId, ConnId, Event, IpConfig, MacAddress, Port, Protocol, RecvMode, Received};

/// One client of the stack.
///
/// Every operation is a request/reply exchange with the stack service and
/// returns once the stack has processed it. Connections created through
/// [`listen`](Self::listen) or [`connect`](Self::connect) belong to this
/// endpoint; dropping it aborts them.
pub struct XtcpClient<S: Send + 'static = u32> {
    id: ClientId,
    cmd_tx: mpsc::Sender<StackCmd<S>>,
    pending_fetch: Option<oneshot::Receiver<Result<Event<S>>>>,
}

impl<S: Send + 'static> XtcpClient<S> {
    pub(crate) fn new(id: ClientId, cmd_tx: mpsc::Sender<StackCmd<S>>) -> Self {
        debug!(client = id, "Client attached");
        Self {
            id,
            cmd_tx,
            pending_fetch: None,
        }
    }

    pub fn id(&self) -> ClientId {
        self.id
    }

    /// Wait for the next event of any of this client's connections or the link.
    ///
    /// Cancel safe: if the future is dropped before completion (for example
    /// as a losing branch of `tokio::select!`), the request stays parked in
    /// the stack and the event is returned by the next call.
    pub async fn fetch_event(&mut self) -> Result<Event<S>> {
        if self.pending_fetch.is_none() {
            let (reply, rx) = oneshot::channel();
            self.cmd_tx
                .send(StackCmd::FetchEvent {
                    client: self.id,
                    reply,
                })
                .await
                .map_err(|_| stack_closed())?;
            self.pending_fetch = Some(rx);
        }

        let Some(rx) = self.pending_fetch.as_mut() else {
            return Err(XtcpError::internal("event fetch not armed"));
        };
        let result = rx.await;
        self.pending_fetch = None;
        let event = result.map_err(|_| stack_closed())??;
        trace!(client = self.id, event = %event.kind(), "Event fetched");
        Ok(event)
    }

    // ── Listener / binder ──

    pub async fn listen(&self, port: Port, protocol: Protocol) -> Result<()> {
        let client = self.id;
        request(&self.cmd_tx, |reply| StackCmd::Listen {
            client,
            port,
            protocol,
            reply,
        })
        .await?
    }

    /// Stop accepting TCP peers on `port`. Established connections are kept.
    pub async fn unlisten(&self, port: Port) -> Result<()> {
        let client = self.id;
        request(&self.cmd_tx, |reply| StackCmd::Unlisten {
            client,
            port,
            reply,
        })
        .await?
    }

    /// Open an outbound connection from an ephemeral local port.
    ///
    /// The id is returned at once; TCP reports the outcome with
    /// `new_connection` or `timed_out`, UDP raises `new_connection` at once.
    pub async fn connect(&self, remote_port: Port, remote_addr: IpAddr, protocol: Protocol) -> Result<ConnId> {
        let client = self.id;
        request(&self.cmd_tx, |reply| StackCmd::Connect {
            client,
            port: remote_port,
            addr: remote_addr,
            protocol,
            reply,
        })
        .await?
    }

    pub async fn bind_local(&self, id: ConnId, port: Port) -> Result<()> {
        self.apply(id, ConnOp::BindLocal(port)).await
    }

    /// Redirect later sends of a UDP connection.
    pub async fn bind_remote(&self, id: ConnId, addr: IpAddr, port: Port) -> Result<()> {
        self.apply(id, ConnOp::BindRemote(addr, port)).await
    }

    // ── Send ──

    /// Ask for a `request_data` event.
    pub async fn init_send(&self, id: ConnId) -> Result<()> {
        self.apply(id, ConnOp::InitSend).await
    }

    /// Answer a send event. An empty payload ends the send cycle.
    pub async fn send(&self, id: ConnId, payload: impl Into<Bytes>) -> Result<()> {
        self.apply(id, ConnOp::Send(payload.into())).await
    }

    /// Send `len` bytes of `buf` starting at `offset`.
    pub async fn send_at(&self, id: ConnId, buf: &[u8], offset: usize, len: usize) -> Result<()> {
        let end = offset
            .checked_add(len)
            .filter(|&end| end <= buf.len())
            .ok_or_else(|| {
                XtcpError::invalid(format!(
                    "range {offset}+{len} outside buffer of {} bytes",
                    buf.len()
                ))
            })?;
        self.send(id, Bytes::copy_from_slice(&buf[offset..end])).await
    }

    /// End the send cycle.
    pub async fn complete_send(&self, id: ConnId) -> Result<()> {
        self.send(id, Bytes::new()).await
    }

    /// Decline a send event without sending anything.
    pub async fn ignore_send(&self, id: ConnId) -> Result<()> {
        self.complete_send(id).await
    }

    /// Report transmitted-but-unconfirmed bytes and accept suffix resends.
    pub async fn accept_partial_ack(&self, id: ConnId) -> Result<()> {
        self.apply(id, ConnOp::AcceptPartialAck).await
    }

    // ── Receive ──

    /// Take the whole announced chunk.
    pub async fn recv(&self, id: ConnId) -> Result<Bytes> {
        Ok(self.receive(id, RecvMode::All).await?.data)
    }

    /// Store the announced chunk in `buf` from `offset` on.
    ///
    /// Returns the number of bytes pulled from the stack; anything past the
    /// end of `buf` is discarded.
    pub async fn recv_at(&self, id: ConnId, buf: &mut [u8], offset: usize) -> Result<usize> {
        if offset > buf.len() {
            return Err(XtcpError::invalid(format!(
                "offset {offset} outside buffer of {} bytes",
                buf.len()
            )));
        }
        let room = buf.len() - offset;
        let received = self.receive(id, RecvMode::Count(room)).await?;
        buf[offset..offset + received.data.len()].copy_from_slice(&received.data);
        Ok(received.pulled)
    }

    /// Store at most `count` bytes of the announced chunk in `buf`.
    ///
    /// Returns the number of bytes pulled from the stack; the rest of the
    /// chunk is discarded.
    pub async fn recv_count(&self, id: ConnId, buf: &mut [u8], count: usize) -> Result<usize> {
        if count > buf.len() {
            return Err(XtcpError::invalid(format!(
                "count {count} exceeds buffer of {} bytes",
                buf.len()
            )));
        }
        let received = self.receive(id, RecvMode::Count(count)).await?;
        buf[..received.data.len()].copy_from_slice(&received.data);
        Ok(received.pulled)
    }

    /// Drop the announced chunk.
    pub async fn ignore_recv(&self, id: ConnId) -> Result<usize> {
        Ok(self.receive(id, RecvMode::Ignore).await?.pulled)
    }

    /// Close the receive window after every handled chunk until [`ack_recv`](Self::ack_recv).
    pub async fn ack_recv_mode(&self, id: ConnId) -> Result<()> {
        self.apply(id, ConnOp::AckRecvMode).await
    }

    pub async fn ack_recv(&self, id: ConnId) -> Result<()> {
        self.apply(id, ConnOp::AckRecv).await
    }

    // ── Connection settings ──

    /// Raise a `poll` event every `interval`; zero disables polling.
    pub async fn set_poll_interval(&self, id: ConnId, interval: Duration) -> Result<()> {
        let ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self.apply(id, ConnOp::SetPollInterval(ms)).await
    }

    pub async fn pause(&self, id: ConnId) -> Result<()> {
        self.apply(id, ConnOp::Pause).await
    }

    pub async fn unpause(&self, id: ConnId) -> Result<()> {
        self.apply(id, ConnOp::Unpause).await
    }

    pub async fn set_app_state(&self, id: ConnId, state: S) -> Result<()> {
        self.apply(id, ConnOp::SetAppState(state)).await
    }

    /// Graceful close; the connection ends with a `closed` event.
    pub async fn close(&self, id: ConnId) -> Result<()> {
        self.apply(id, ConnOp::Close).await
    }

    pub async fn abort(&self, id: ConnId) -> Result<()> {
        self.apply(id, ConnOp::Abort).await
    }

    // ── Link ──

    pub async fn join_multicast(&self, group: IpAddr) -> Result<()> {
        let client = self.id;
        request(&self.cmd_tx, |reply| StackCmd::JoinMulticast {
            client,
            group,
            reply,
        })
        .await?
    }

    pub async fn leave_multicast(&self, group: IpAddr) -> Result<()> {
        let client = self.id;
        request(&self.cmd_tx, |reply| StackCmd::LeaveMulticast {
            client,
            group,
            reply,
        })
        .await?
    }

    pub async fn mac_address(&self) -> Result<MacAddress> {
        request(&self.cmd_tx, |reply| StackCmd::MacAddress { reply }).await
    }

    pub async fn ip_config(&self) -> Result<IpConfig> {
        request(&self.cmd_tx, |reply| StackCmd::IpConfig { reply }).await
    }

    // -- helpers --

    async fn exchange(&self, id: ConnId, op: ConnOp<S>) -> Result<ConnReply> {
        let client = self.id;
        request(&self.cmd_tx, |reply| StackCmd::Conn {
            client,
            id,
            op,
            reply,
        })
        .await?
    }

    async fn apply(&self, id: ConnId, op: ConnOp<S>) -> Result<()> {
        self.exchange(id, op).await.map(|_| ())
    }

    async fn receive(&self, id: ConnId, mode: RecvMode) -> Result<Received> {
        match self.exchange(id, ConnOp::Recv(mode)).await? {
            ConnReply::Received(received) => Ok(received),
            ConnReply::Done => Err(XtcpError::internal("receive answered without data")),
        }
    }
}

impl<S: Send + 'static> Drop for XtcpClient<S> {
    fn drop(&mut self) {
        let detach = StackCmd::Detach { client: self.id };
        match self.cmd_tx.try_send(detach) {
            Ok(()) => debug!(client = self.id, "Client detached"),
            Err(mpsc::error::TrySendError::Full(detach)) => {
                if let Ok(handle) = tokio::runtime::Handle::try_current() {
                    let cmd_tx = self.cmd_tx.clone();
                    handle.spawn(async move {
                        let _ = cmd_tx.send(detach).await;
                    });
                }
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }
}
