//! Stack service task: owns the [`StackEngine`] and every piece of per-stack
//! state, serves client requests and network input over channels. No locks.

use crate::driver::NetworkDriver;
use crate::error::{ConnectionError, Result, XtcpError};
use crate::metrics::StackMetrics;

use bytes::Bytes;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, trace, warn};
use xtcp_core::{
    ClientId, ConnId, Event, IpConfig, MacAddress, NetEvent, Port, Protocol, RecvMode, Received,
    StackEngine, XtcpCoreResult,
};

/// Operation on one connection
pub(crate) enum ConnOp<S> {
    InitSend,
    Send(Bytes),
    Recv(RecvMode),
    AckRecvMode,
    AckRecv,
    SetPollInterval(u64),
    Pause,
    Unpause,
    AcceptPartialAck,
    Close,
    Abort,
    SetAppState(S),
    BindLocal(Port),
    BindRemote(IpAddr, Port),
}

pub(crate) enum ConnReply {
    Done,
    Received(Received),
}

/// Requests served by the stack task.
pub(crate) enum StackCmd<S> {
    Attach {
        reply: oneshot::Sender<ClientId>,
    },
    Detach {
        client: ClientId,
    },
    Listen {
        client: ClientId,
        port: Port,
        protocol: Protocol,
        reply: oneshot::Sender<Result<()>>,
    },
    Unlisten {
        client: ClientId,
        port: Port,
        reply: oneshot::Sender<Result<()>>,
    },
    Connect {
        client: ClientId,
        port: Port,
        addr: IpAddr,
        protocol: Protocol,
        reply: oneshot::Sender<Result<ConnId>>,
    },
    Conn {
        client: ClientId,
        id: ConnId,
        op: ConnOp<S>,
        reply: oneshot::Sender<Result<ConnReply>>,
    },
    /// Answered once the client has a deliverable event
    FetchEvent {
        client: ClientId,
        reply: oneshot::Sender<Result<Event<S>>>,
    },
    JoinMulticast {
        client: ClientId,
        group: IpAddr,
        reply: oneshot::Sender<Result<()>>,
    },
    LeaveMulticast {
        client: ClientId,
        group: IpAddr,
        reply: oneshot::Sender<Result<()>>,
    },
    MacAddress {
        reply: oneshot::Sender<MacAddress>,
    },
    IpConfig {
        reply: oneshot::Sender<IpConfig>,
    },
    Shutdown,
}

/// Send a command and wait for the reply. Returns a stack-closed error if
/// the task has exited.
pub(crate) async fn request<S, T>(
    cmd_tx: &mpsc::Sender<StackCmd<S>>,
    cmd: impl FnOnce(oneshot::Sender<T>) -> StackCmd<S>,
) -> Result<T> {
    let (reply, rx) = oneshot::channel();
    cmd_tx.send(cmd(reply)).await.map_err(|_| stack_closed())?;
    rx.await.map_err(|_| stack_closed())
}

pub(crate) fn stack_closed() -> XtcpError {
    XtcpError::connection(ConnectionError::StackClosed)
}

type ParkedFetch<S> = oneshot::Sender<Result<Event<S>>>;

/// Timer settings of the service loop
pub(crate) struct Timers {
    pub tick: Duration,
    pub phy_poll: Option<Duration>,
}

/// Run the stack service loop.
///
/// - `cmd_rx`: requests from the stack handle and every client.
/// - `net_rx`: occurrences reported by the packet engine.
pub(crate) async fn run_stack_actor<S, D>(
    mut engine: StackEngine<S>,
    mut cmd_rx: mpsc::Receiver<StackCmd<S>>,
    mut net_rx: mpsc::Receiver<NetEvent>,
    driver: D,
    metrics: Arc<StackMetrics>,
    timers: Timers,
) where
    S: Clone + Send + 'static,
    D: NetworkDriver,
{
    let start = Instant::now();
    let mut ticker = tokio::time::interval(timers.tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut phy = timers.phy_poll.map(|period| {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        interval
    });

    let mut parked: HashMap<ClientId, ParkedFetch<S>> = HashMap::new();
    let mut net_open = true;

    loop {
        tokio::select! {
            biased;

            // Periodic tick (prioritized to avoid timer starvation)
            _ = ticker.tick() => {
                engine.tick(start.elapsed().as_millis() as u64);
            }

            _ = tick_optional(&mut phy) => {
                poll_link(&mut engine, &driver);
            }

            // Client requests
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(StackCmd::Shutdown) | None => {
                        info!("Stack service shutting down");
                        break;
                    }
                    Some(cmd) => handle_command(&mut engine, &mut parked, cmd),
                }
            }

            // Packet engine occurrences
            event = net_rx.recv(), if net_open => {
                match event {
                    Some(event) => {
                        trace!(?event, "Network input");
                        engine.input(event);
                    }
                    None => {
                        debug!("Network input channel closed");
                        net_open = false;
                    }
                }
            }
        }

        flush_output(&mut engine, &driver, &metrics).await;
        serve_parked(&mut engine, &mut parked);
        metrics.update_from_stats(engine.stats(), engine.connection_count(), engine.client_count());
    }

    // Parked fetches are dropped here; their clients observe a closed stack.
    flush_output(&mut engine, &driver, &metrics).await;
}

fn handle_command<S: Clone>(
    engine: &mut StackEngine<S>,
    parked: &mut HashMap<ClientId, ParkedFetch<S>>,
    cmd: StackCmd<S>,
) {
    match cmd {
        StackCmd::Attach { reply } => {
            let _ = reply.send(engine.attach_client());
        }
        StackCmd::Detach { client } => {
            parked.remove(&client);
            engine.detach_client(client);
        }
        StackCmd::Listen {
            client,
            port,
            protocol,
            reply,
        } => {
            let _ = reply.send(engine.listen(client, port, protocol).map_err(XtcpError::from));
        }
        StackCmd::Unlisten {
            client,
            port,
            reply,
        } => {
            let _ = reply.send(engine.unlisten(client, port).map_err(XtcpError::from));
        }
        StackCmd::Connect {
            client,
            port,
            addr,
            protocol,
            reply,
        } => {
            let r = engine.connect(client, port, addr, protocol);
            let _ = reply.send(r.map_err(XtcpError::from));
        }
        StackCmd::Conn {
            client,
            id,
            op,
            reply,
        } => {
            let _ = reply.send(apply(engine, client, id, op).map_err(XtcpError::from));
        }
        StackCmd::FetchEvent { client, reply } => match engine.next_event(client) {
            Ok(Some(event)) => {
                let _ = reply.send(Ok(event));
            }
            Ok(None) => {
                if parked.insert(client, reply).is_some() {
                    warn!(client, "Replacing a parked event fetch");
                }
            }
            Err(e) => {
                let _ = reply.send(Err(e.into()));
            }
        },
        StackCmd::JoinMulticast {
            client,
            group,
            reply,
        } => {
            let _ = reply.send(engine.join_multicast(client, group).map_err(XtcpError::from));
        }
        StackCmd::LeaveMulticast {
            client,
            group,
            reply,
        } => {
            let _ = reply.send(engine.leave_multicast(client, group).map_err(XtcpError::from));
        }
        StackCmd::MacAddress { reply } => {
            let _ = reply.send(engine.mac_address());
        }
        StackCmd::IpConfig { reply } => {
            let _ = reply.send(engine.ip_config());
        }
        // handled by the loop
        StackCmd::Shutdown => {}
    }
}

fn apply<S: Clone>(
    engine: &mut StackEngine<S>,
    client: ClientId,
    id: ConnId,
    op: ConnOp<S>,
) -> XtcpCoreResult<ConnReply> {
    match op {
        ConnOp::Recv(mode) => return engine.recv(client, id, mode).map(ConnReply::Received),
        ConnOp::InitSend => engine.init_send(client, id)?,
        ConnOp::Send(payload) => engine.send(client, id, payload)?,
        ConnOp::AckRecvMode => engine.ack_recv_mode(client, id)?,
        ConnOp::AckRecv => engine.ack_recv(client, id)?,
        ConnOp::SetPollInterval(ms) => engine.set_poll_interval(client, id, ms)?,
        ConnOp::Pause => engine.pause(client, id)?,
        ConnOp::Unpause => engine.unpause(client, id)?,
        ConnOp::AcceptPartialAck => engine.accept_partial_ack(client, id)?,
        ConnOp::Close => engine.close(client, id)?,
        ConnOp::Abort => engine.abort(client, id)?,
        ConnOp::SetAppState(state) => engine.set_app_state(client, id, state)?,
        ConnOp::BindLocal(port) => engine.bind_local(client, id, port)?,
        ConnOp::BindRemote(addr, port) => engine.bind_remote(client, id, addr, port)?,
    }
    Ok(ConnReply::Done)
}

/// Turn PHY status transitions into link events.
pub(crate) fn poll_link<S: Clone, D: NetworkDriver>(engine: &mut StackEngine<S>, driver: &D) {
    let Some(up) = driver.poll_link() else {
        return;
    };
    if up != engine.is_link_up() {
        debug!(up, "PHY link status changed");
        engine.input(if up {
            NetEvent::LinkUp { ip_config: None }
        } else {
            NetEvent::LinkDown
        });
    }
}

/// Hand every buffered command to the driver.
async fn flush_output<S: Clone, D: NetworkDriver>(
    engine: &mut StackEngine<S>,
    driver: &D,
    metrics: &StackMetrics,
) {
    for cmd in engine.drain_output() {
        if let Err(e) = driver.execute(cmd).await {
            warn!(error = %e, "Driver command failed");
            metrics.driver_error();
        }
    }
}

/// Answer parked fetches whose client now has an event.
fn serve_parked<S: Clone>(
    engine: &mut StackEngine<S>,
    parked: &mut HashMap<ClientId, ParkedFetch<S>>,
) {
    parked.retain(|_, reply| !reply.is_closed());
    let waiting: Vec<ClientId> = parked.keys().copied().collect();
    for client in waiting {
        let result = match engine.next_event(client) {
            Ok(Some(event)) => Ok(event),
            Ok(None) => continue,
            Err(e) => Err(e.into()),
        };
        if let Some(reply) = parked.remove(&client) {
            let _ = reply.send(result);
        }
    }
}

async fn tick_optional(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}
