//! Integration tests for the stack service and client endpoints

mod common;

use bytes::Bytes;
use common::*;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use xtcp_tokio::{
    ChannelDriver, Event, EventKind, IpConfig, LinkEvent, MacAddress, NetCommand, NetEvent,
    Protocol, Role, StackConfig, XtcpError, XtcpStack,
};

#[tokio::test]
async fn test_listen_accept_and_send_handshake() {
    let mut h = spawn_stack(StackConfig::dhcp());
    let mut client = h.stack.client().await.unwrap();

    client.listen(7, Protocol::Tcp).await.unwrap();
    expect_command(&mut h.commands, |c| {
        *c == NetCommand::Listen {
            port: 7,
            protocol: Protocol::Tcp,
        }
    })
    .await;

    h.input
        .deliver(NetEvent::PeerConnected {
            local_port: 7,
            remote_addr: PEER,
            remote_port: 40000,
        })
        .await
        .unwrap();
    let event = next_event(&mut client).await;
    let snapshot = event.as_connection().expect("connection event").clone();
    assert_eq!(snapshot.event, EventKind::NewConnection);
    assert_eq!(snapshot.role, Role::Server);
    assert_eq!(snapshot.local_port, 7);
    assert_eq!(snapshot.remote_addr, PEER);
    assert_eq!(snapshot.remote_port, 40000);
    let id = snapshot.id;

    client.init_send(id).await.unwrap();
    assert_eq!(expect_event(&mut client, EventKind::RequestData).await, id);

    client.send(id, vec![1u8, 2]).await.unwrap();
    let cmd = expect_command(&mut h.commands, |c| matches!(c, NetCommand::Transmit { .. })).await;
    assert_eq!(
        cmd,
        NetCommand::Transmit {
            id,
            payload: Bytes::from_static(&[1, 2]),
        }
    );

    h.input.deliver(NetEvent::Transmitted { id }).await.unwrap();
    expect_event(&mut client, EventKind::SentData).await;

    client.complete_send(id).await.unwrap();
    assert_no_event(&mut client).await;
}

#[tokio::test]
async fn test_recv_count_reports_pulled_bytes() {
    let h = spawn_stack(StackConfig::dhcp());
    let mut client = h.stack.client().await.unwrap();
    client.listen(7, Protocol::Tcp).await.unwrap();
    let id = accept_tcp(&h, &mut client, 7, 40000).await;

    let payload: Vec<u8> = (0..10).collect();
    h.input
        .deliver(NetEvent::Data {
            id,
            payload: Bytes::from(payload),
            push: false,
        })
        .await
        .unwrap();
    expect_event(&mut client, EventKind::RecvData).await;

    let mut buf = [0xffu8; 8];
    let pulled = client.recv_count(id, &mut buf, 4).await.unwrap();
    assert_eq!(pulled, 10);
    assert_eq!(&buf[..4], &[0, 1, 2, 3]);
    assert_eq!(&buf[4..], &[0xff; 4]);

    // the remaining six bytes are gone
    assert_no_event(&mut client).await;
}

#[tokio::test]
async fn test_recv_at_offset_and_push() {
    let h = spawn_stack(StackConfig::dhcp());
    let mut client = h.stack.client().await.unwrap();
    client.listen(7, Protocol::Tcp).await.unwrap();
    let id = accept_tcp(&h, &mut client, 7, 40000).await;

    h.input
        .deliver(NetEvent::Data {
            id,
            payload: Bytes::from_static(b"hello world"),
            push: true,
        })
        .await
        .unwrap();
    expect_event(&mut client, EventKind::PushData).await;

    let mut buf = [0u8; 8];
    let pulled = client.recv_at(id, &mut buf, 3).await.unwrap();
    assert_eq!(pulled, 11);
    assert_eq!(&buf, b"\0\0\0hello");

    let err = client.recv_at(id, &mut buf, 9).await.unwrap_err();
    assert!(matches!(err, XtcpError::InvalidArgument { .. }));
}

#[tokio::test]
async fn test_send_at_offset_slice() {
    let mut h = spawn_stack(StackConfig::dhcp());
    let mut client = h.stack.client().await.unwrap();
    client.listen(7, Protocol::Tcp).await.unwrap();
    let id = accept_tcp(&h, &mut client, 7, 40000).await;
    client.init_send(id).await.unwrap();
    expect_event(&mut client, EventKind::RequestData).await;

    // range errors are caught before the send event is answered
    let err = client.send_at(id, b"abcdef", 4, 3).await.unwrap_err();
    assert!(matches!(err, XtcpError::InvalidArgument { .. }));
    let err = client.send_at(id, b"abcdef", usize::MAX, 1).await.unwrap_err();
    assert!(matches!(err, XtcpError::InvalidArgument { .. }));

    client.send_at(id, b"abcdef", 2, 3).await.unwrap();
    let cmd = expect_command(&mut h.commands, |c| matches!(c, NetCommand::Transmit { .. })).await;
    assert_eq!(
        cmd,
        NetCommand::Transmit {
            id,
            payload: Bytes::from_static(b"cde"),
        }
    );
}

#[tokio::test]
async fn test_fetch_event_is_cancel_safe() {
    let h = spawn_stack(StackConfig::dhcp());
    let mut client = h.stack.client().await.unwrap();
    client.listen(7, Protocol::Tcp).await.unwrap();

    tokio::select! {
        event = client.fetch_event() => panic!("unexpected event {event:?}"),
        _ = tokio::time::sleep(Duration::from_millis(20)) => {}
    }

    h.input
        .deliver(NetEvent::PeerConnected {
            local_port: 7,
            remote_addr: PEER,
            remote_port: 40001,
        })
        .await
        .unwrap();
    let id = expect_event(&mut client, EventKind::NewConnection).await;
    client.close(id).await.unwrap();
    expect_event(&mut client, EventKind::Closed).await;
}

#[tokio::test]
async fn test_terminal_event_is_final() {
    let mut h = spawn_stack(StackConfig::dhcp());
    let mut client = h.stack.client().await.unwrap();
    client.listen(7, Protocol::Tcp).await.unwrap();
    let id = accept_tcp(&h, &mut client, 7, 40000).await;

    client.set_app_state(id, 42).await.unwrap();
    h.input
        .deliver(NetEvent::Data {
            id,
            payload: Bytes::from_static(b"late"),
            push: false,
        })
        .await
        .unwrap();
    h.input.deliver(NetEvent::TimedOut { id }).await.unwrap();

    // whichever of the two events was ready first, the terminal one ends the stream
    let mut event = next_event(&mut client).await;
    if event.kind() == EventKind::RecvData {
        event = next_event(&mut client).await;
    }
    let snapshot = event.as_connection().expect("connection event");
    assert_eq!(snapshot.event, EventKind::TimedOut);
    assert_eq!(snapshot.app_state, Some(42));

    let err = client.recv(id).await.unwrap_err();
    assert!(err.is_unknown_connection());
    expect_command(&mut h.commands, |c| *c == NetCommand::Release { id }).await;
    assert_no_event(&mut client).await;
}

#[tokio::test]
async fn test_out_of_sequence_operation_is_rejected() {
    let h = spawn_stack(StackConfig::dhcp());
    let mut client = h.stack.client().await.unwrap();
    client.listen(7, Protocol::Tcp).await.unwrap();
    let id = accept_tcp(&h, &mut client, 7, 40000).await;

    let err = client.send(id, &b"early"[..]).await.unwrap_err();
    assert!(err.is_protocol_violation());
    assert!(!err.is_recoverable());

    client.init_send(id).await.unwrap();
    expect_event(&mut client, EventKind::RequestData).await;
    let err = client.pause(id).await.unwrap_err();
    assert!(err.is_protocol_violation());

    // the connection is intact
    client.send(id, &b"ok"[..]).await.unwrap();

    // one more round trip so the metrics of the previous requests are published
    h.stack.mac_address().await.unwrap();
    assert_eq!(h.stack.metrics().protocol_violations, 2);
}

#[tokio::test]
async fn test_clients_see_only_their_connections() {
    let h = spawn_stack(StackConfig::dhcp());
    let mut a = h.stack.client().await.unwrap();
    let mut b = h.stack.client().await.unwrap();
    assert_ne!(a.id(), b.id());

    a.listen(7, Protocol::Tcp).await.unwrap();
    b.listen(8, Protocol::Tcp).await.unwrap();
    let err = b.listen(7, Protocol::Tcp).await.unwrap_err();
    assert!(matches!(
        err,
        XtcpError::PortInUse {
            port: 7,
            protocol: Protocol::Tcp
        }
    ));

    let id = accept_tcp(&h, &mut b, 8, 40000).await;
    assert_no_event(&mut a).await;
    assert!(a.init_send(id).await.unwrap_err().is_unknown_connection());
    b.init_send(id).await.unwrap();
    expect_event(&mut b, EventKind::RequestData).await;
}

#[tokio::test]
async fn test_dropping_client_aborts_its_connections() {
    let mut h = spawn_stack(StackConfig::dhcp());
    let mut client = h.stack.client().await.unwrap();
    client.listen(7, Protocol::Tcp).await.unwrap();
    let id = accept_tcp(&h, &mut client, 7, 40000).await;

    drop(client);
    expect_command(&mut h.commands, |c| *c == NetCommand::Abort { id }).await;
    expect_command(&mut h.commands, |c| *c == NetCommand::Release { id }).await;
    expect_command(&mut h.commands, |c| {
        *c == NetCommand::Unlisten {
            port: 7,
            protocol: Protocol::Tcp,
        }
    })
    .await;

    // the port is free again
    let other = h.stack.client().await.unwrap();
    other.listen(7, Protocol::Tcp).await.unwrap();
    h.stack.mac_address().await.unwrap();
    assert_eq!(h.stack.metrics().clients, 1);
}

#[tokio::test]
async fn test_udp_connect_and_rebind() {
    let mut h = spawn_stack(StackConfig::dhcp().ephemeral_ports(50000, 50010));
    let mut client = h.stack.client().await.unwrap();

    let id = client.connect(9000, PEER, Protocol::Udp).await.unwrap();
    let event = next_event(&mut client).await;
    let snapshot = event.as_connection().expect("connection event");
    assert_eq!(snapshot.id, id);
    assert_eq!(snapshot.event, EventKind::NewConnection);
    assert_eq!(snapshot.role, Role::Client);
    assert!((50000..=50010).contains(&snapshot.local_port));

    let other = IpAddr::V4(Ipv4Addr::new(192, 168, 1, 30));
    client.bind_remote(id, other, 9001).await.unwrap();
    let cmd = expect_command(&mut h.commands, |c| matches!(c, NetCommand::Rebind { .. })).await;
    assert!(matches!(
        cmd,
        NetCommand::Rebind { remote_addr, remote_port: 9001, .. } if remote_addr == other
    ));

    // UDP unlisten is a no-op
    client.unlisten(9000).await.unwrap();
}

#[tokio::test]
async fn test_ack_recv_mode_holds_back_data() {
    let h = spawn_stack(StackConfig::dhcp());
    let mut client = h.stack.client().await.unwrap();
    client.listen(7, Protocol::Tcp).await.unwrap();
    let id = accept_tcp(&h, &mut client, 7, 40000).await;
    client.ack_recv_mode(id).await.unwrap();

    for chunk in [&b"one"[..], b"two", b"three"] {
        h.input
            .deliver(NetEvent::Data {
                id,
                payload: Bytes::from_static(chunk),
                push: false,
            })
            .await
            .unwrap();
    }

    expect_event(&mut client, EventKind::RecvData).await;
    assert_eq!(&client.recv(id).await.unwrap()[..], b"one");
    assert_no_event(&mut client).await;

    client.ack_recv(id).await.unwrap();
    expect_event(&mut client, EventKind::RecvData).await;
    assert_eq!(client.ignore_recv(id).await.unwrap(), 3);
}

#[tokio::test]
async fn test_poll_interval_raises_poll_events() {
    let h = spawn_stack(StackConfig::dhcp().tick_interval(Duration::from_millis(5)));
    let mut client = h.stack.client().await.unwrap();
    client.listen(7, Protocol::Tcp).await.unwrap();
    let id = accept_tcp(&h, &mut client, 7, 40000).await;

    client.set_poll_interval(id, Duration::from_millis(20)).await.unwrap();
    expect_event(&mut client, EventKind::Poll).await;

    client.set_poll_interval(id, Duration::ZERO).await.unwrap();
    // a poll raised before disabling may still be pending
    if let Ok(Ok(event)) = tokio::time::timeout(Duration::from_millis(50), client.fetch_event()).await {
        assert_eq!(event.kind(), EventKind::Poll);
    }
    assert_no_event(&mut client).await;
}

#[tokio::test]
async fn test_multicast_membership() {
    let mut h = spawn_stack(StackConfig::dhcp());
    let client = h.stack.client().await.unwrap();
    let group = IpAddr::V4(Ipv4Addr::new(224, 0, 0, 251));

    client.join_multicast(group).await.unwrap();
    client.join_multicast(group).await.unwrap();
    client.leave_multicast(group).await.unwrap();
    client.leave_multicast(group).await.unwrap();

    assert_eq!(
        expect_command(&mut h.commands, |c| matches!(c, NetCommand::JoinGroup { .. })).await,
        NetCommand::JoinGroup { group }
    );
    // a single leave follows the single join
    assert_eq!(h.commands.recv().await, Some(NetCommand::LeaveGroup { group }));
    assert!(h.commands.try_recv().is_err());

    let err = client.join_multicast(PEER).await.unwrap_err();
    assert!(matches!(err, XtcpError::InvalidArgument { .. }));
}

#[tokio::test]
async fn test_link_events_reach_every_client() {
    let h = spawn_stack(StackConfig::dhcp());
    let mut a = h.stack.client().await.unwrap();
    let mut b = h.stack.client().await.unwrap();

    let assigned = IpConfig::V4 {
        address: Ipv4Addr::new(192, 168, 1, 178),
        netmask: Ipv4Addr::new(255, 255, 255, 0),
        gateway: Ipv4Addr::new(192, 168, 1, 1),
    };
    h.input
        .deliver(NetEvent::LinkUp {
            ip_config: Some(assigned),
        })
        .await
        .unwrap();

    let expected = Event::Link(LinkEvent::Up { ip_config: assigned });
    assert_eq!(next_event(&mut a).await, expected);
    assert_eq!(next_event(&mut b).await, expected);
    assert_eq!(expected.connection_id(), None);
    assert_eq!(a.ip_config().await.unwrap(), assigned);

    h.input.deliver(NetEvent::LinkDown).await.unwrap();
    assert_eq!(next_event(&mut b).await, Event::Link(LinkEvent::Down));
}

#[tokio::test(start_paused = true)]
async fn test_polled_link_status() {
    init_tracing();
    let link = Arc::new(AtomicBool::new(false));
    let (driver, _commands) = ChannelDriver::new();
    let driver = driver.with_polled_link(link.clone());
    let config = StackConfig::dhcp().phy_poll_interval(Some(Duration::from_millis(100)));
    let (stack, _input) = XtcpStack::<u32>::spawn(config, driver).unwrap();
    let mut client = stack.client().await.unwrap();

    link.store(true, Ordering::Relaxed);
    match next_event(&mut client).await {
        Event::Link(LinkEvent::Up { ip_config }) => assert!(ip_config.wants_dhcp()),
        other => panic!("unexpected event {other:?}"),
    }

    link.store(false, Ordering::Relaxed);
    assert_eq!(next_event(&mut client).await, Event::Link(LinkEvent::Down));
}

#[tokio::test]
async fn test_mac_address_resolution_order() {
    let factory = MacAddress([0x00, 0x22, 0x97, 0x00, 0x00, 0x01]);
    let configured = MacAddress([0x02, 0x00, 0x00, 0x00, 0x00, 0x02]);

    let (driver, _rx) = ChannelDriver::new();
    let (stack, _input) = XtcpStack::<u32>::spawn(
        StackConfig::dhcp().mac_address(configured),
        driver.with_factory_mac(factory),
    )
    .unwrap();
    assert_eq!(stack.mac_address().await.unwrap(), configured);

    let (driver, _rx) = ChannelDriver::new();
    let (stack, _input) =
        XtcpStack::<u32>::spawn(StackConfig::dhcp(), driver.with_factory_mac(factory)).unwrap();
    let client = stack.client().await.unwrap();
    assert_eq!(client.mac_address().await.unwrap(), factory);

    let (driver, _rx) = ChannelDriver::new();
    let (stack, _input) = XtcpStack::<u32>::spawn(StackConfig::dhcp(), driver).unwrap();
    assert_eq!(stack.mac_address().await.unwrap(), MacAddress::ZERO);
}

#[tokio::test]
async fn test_invalid_config_is_rejected() {
    let (driver, _rx) = ChannelDriver::new();
    let result = XtcpStack::<u32>::spawn(StackConfig::dhcp().max_connections(0), driver);
    assert!(matches!(result, Err(XtcpError::Config { .. })));
}

#[tokio::test]
async fn test_shutdown_closes_clients() {
    let h = spawn_stack(StackConfig::dhcp());
    let mut client = h.stack.client().await.unwrap();
    let input = h.input.clone();

    let waiter = tokio::spawn(async move {
        let result = client.fetch_event().await;
        (client, result)
    });

    h.stack.shutdown().await.unwrap();
    let (client, result) = waiter.await.unwrap();
    assert!(result.unwrap_err().is_closed());
    assert!(client.listen(7, Protocol::Tcp).await.unwrap_err().is_closed());
    assert!(input.deliver(NetEvent::LinkDown).await.unwrap_err().is_closed());
}

#[tokio::test]
async fn test_metrics_follow_traffic() {
    let h = spawn_stack(StackConfig::dhcp());
    let mut client = h.stack.client().await.unwrap();
    client.listen(7, Protocol::Tcp).await.unwrap();
    let id = accept_tcp(&h, &mut client, 7, 40000).await;

    client.init_send(id).await.unwrap();
    expect_event(&mut client, EventKind::RequestData).await;
    client.send(id, &b"12345"[..]).await.unwrap();
    h.stack.mac_address().await.unwrap();

    let snapshot = h.stack.metrics();
    assert_eq!(snapshot.connections_created, 1);
    assert_eq!(snapshot.active_connections, 1);
    assert_eq!(snapshot.clients, 1);
    assert_eq!(snapshot.bytes_sent, 5);
    assert_eq!(snapshot.events_delivered, 2);
    assert_eq!(snapshot.driver_errors, 0);
}
