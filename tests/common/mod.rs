//! Shared test helpers for stack integration tests
#![allow(dead_code)]

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::timeout;
use xtcp_tokio::{
    ChannelDriver, ConnId, Event, EventKind, NetCommand, NetEvent, NetInput, StackConfig,
    XtcpClient, XtcpStack,
};

pub const PEER: IpAddr = IpAddr::V4(Ipv4Addr::new(192, 168, 1, 20));
const WAIT: Duration = Duration::from_secs(2);

/// A running stack wired to a channel driver
pub struct Harness {
    pub stack: XtcpStack,
    pub input: NetInput,
    pub commands: UnboundedReceiver<NetCommand>,
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn spawn_stack(config: StackConfig) -> Harness {
    init_tracing();
    let (driver, commands) = ChannelDriver::new();
    let (stack, input) = XtcpStack::spawn(config, driver).unwrap();
    Harness {
        stack,
        input,
        commands,
    }
}

/// Fetch the next event, failing the test if none arrives in time
pub async fn next_event(client: &mut XtcpClient) -> Event<u32> {
    timeout(WAIT, client.fetch_event())
        .await
        .expect("timed out waiting for event")
        .unwrap()
}

/// Fetch the next event, which must belong to a connection, and return its id
pub async fn expect_event(client: &mut XtcpClient, kind: EventKind) -> ConnId {
    let event = next_event(client).await;
    assert_eq!(event.kind(), kind, "unexpected event {event:?}");
    event.connection_id().expect("link event")
}

/// Nothing is delivered within a short window
pub async fn assert_no_event(client: &mut XtcpClient) {
    if let Ok(event) = timeout(Duration::from_millis(50), client.fetch_event()).await {
        panic!("unexpected event {event:?}");
    }
}

/// Skip driver commands until one matches `pred`
pub async fn expect_command(
    commands: &mut UnboundedReceiver<NetCommand>,
    pred: impl Fn(&NetCommand) -> bool,
) -> NetCommand {
    timeout(WAIT, async {
        loop {
            let cmd = commands.recv().await.expect("driver channel closed");
            if pred(&cmd) {
                return cmd;
            }
        }
    })
    .await
    .expect("timed out waiting for driver command")
}

/// A TCP peer connects on `port` and the listener owner sees it
pub async fn accept_tcp(h: &Harness, client: &mut XtcpClient, port: u16, remote_port: u16) -> ConnId {
    h.input
        .deliver(NetEvent::PeerConnected {
            local_port: port,
            remote_addr: PEER,
            remote_port,
        })
        .await
        .unwrap();
    expect_event(client, EventKind::NewConnection).await
}
