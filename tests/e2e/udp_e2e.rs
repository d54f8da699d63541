use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use gree::alias::{AliasTable, PropertyValue};
use gree::e2e_common::{spawn_device, DeviceHandle, SimulatedDevice};
use gree::sdk::{ClientError, DiscoveryClient, GreeClient};
use gree::session::Session;
use gree::transport::{TransportConfig, TransportError, UdpTransport};

const MAC: &str = "f4911e000001";
const KEY: &str = "0123456789abcdef";

fn fast_transport() -> UdpTransport {
    UdpTransport::new(
        TransportConfig::default()
            .with_pacing(Duration::ZERO)
            .with_deadline(Duration::from_millis(200)),
    )
}

fn fast_transport_with_buffer(recv_buffer: usize) -> UdpTransport {
    UdpTransport::new(
        TransportConfig::default()
            .with_pacing(Duration::ZERO)
            .with_deadline(Duration::from_millis(200))
            .with_recv_buffer(recv_buffer),
    )
}

fn client_for(device: &DeviceHandle) -> GreeClient<UdpTransport> {
    client_with(device, fast_transport())
}

fn client_with(device: &DeviceHandle, transport: UdpTransport) -> GreeClient<UdpTransport> {
    let mut session = Session::new(device.host());
    session.set_port(device.port());
    GreeClient::with_transport(session, Arc::new(AliasTable::gree_default()), transport)
}

#[tokio::test]
async fn scan_bind_set_get_over_udp() -> Result<(), Box<dyn Error>> {
    let device = spawn_device(
        SimulatedDevice::new(MAC, KEY)
            .with_property("SetTem", 24)
            .with_property("Add0.5", 1),
    )
    .await?;
    let mut client = client_for(&device);

    let info = client.scan().await?;
    assert_eq!(info.mac, MAC);
    assert_eq!(client.session().cid(), MAC);

    let key = client.bind().await?;
    assert_eq!(key, KEY);
    assert_eq!(client.session().sec_key(), Some(KEY));

    let ack = client.set(&[("Pow", 1)]).await?;
    assert_eq!(ack["Pow"], PropertyValue::Alias("on".into()));

    let status = client.get(&["Pow", "SetTem", "Add0.5"]).await?;
    assert_eq!(status["Pow"], PropertyValue::Alias("on".into()));
    assert_eq!(status["SetTem"], PropertyValue::Raw(24));
    assert_eq!(status["Add0.5"], PropertyValue::Flag(true));

    assert_eq!(device.received(), 4);
    Ok(())
}

#[tokio::test]
async fn first_valid_reply_stops_retrying() -> Result<(), Box<dyn Error>> {
    let device = spawn_device(SimulatedDevice::new(MAC, KEY)).await?;
    let mut client = client_for(&device);

    client.scan().await?;

    assert_eq!(device.received(), 1);
    Ok(())
}

#[tokio::test]
async fn silent_device_gets_exactly_try_limit_attempts() -> Result<(), Box<dyn Error>> {
    let mut silent = SimulatedDevice::new(MAC, KEY);
    silent.silent_requests = usize::MAX / 2;
    let device = spawn_device(silent).await?;
    let mut client = client_for(&device);
    client.session_mut().set_try_limit(3);

    let err = client.scan().await.unwrap_err();

    assert!(matches!(
        err,
        ClientError::Transport(TransportError::Unreachable { attempts: 3, .. })
    ));
    assert_eq!(device.received(), 3);
    Ok(())
}

#[tokio::test]
async fn every_attempt_waits_for_pacing_delay() -> Result<(), Box<dyn Error>> {
    let pacing = Duration::from_millis(100);
    let mut silent = SimulatedDevice::new(MAC, KEY);
    silent.silent_requests = usize::MAX / 2;
    let device = spawn_device(silent).await?;
    let transport = UdpTransport::new(
        TransportConfig::default()
            .with_pacing(pacing)
            .with_deadline(Duration::from_millis(20)),
    );
    let mut client = client_with(&device, transport);
    client.session_mut().set_try_limit(3);

    let started = Instant::now();
    let err = client.scan().await.unwrap_err();

    assert!(started.elapsed() >= pacing * 3);
    assert!(matches!(
        err,
        ClientError::Transport(TransportError::Unreachable { attempts: 3, .. })
    ));
    assert_eq!(device.received(), 3);
    Ok(())
}

#[tokio::test]
async fn first_attempt_is_paced_too() -> Result<(), Box<dyn Error>> {
    let pacing = Duration::from_millis(150);
    let device = spawn_device(SimulatedDevice::new(MAC, KEY)).await?;
    let transport = UdpTransport::new(TransportConfig::default().with_pacing(pacing));
    let mut client = client_with(&device, transport);

    let started = Instant::now();
    client.scan().await?;

    assert!(started.elapsed() >= pacing);
    assert_eq!(device.received(), 1);
    Ok(())
}

#[tokio::test]
async fn reply_larger_than_receive_buffer_is_abandoned() -> Result<(), Box<dyn Error>> {
    let mut verbose = SimulatedDevice::new(MAC, KEY);
    verbose.name = "x".repeat(1200);
    let device = spawn_device(verbose).await?;
    let mut client = client_for(&device);
    client.session_mut().set_try_limit(3);

    let err = client.scan().await.unwrap_err();

    assert!(matches!(
        err,
        ClientError::Transport(TransportError::Unreachable { attempts: 3, .. })
    ));
    assert_eq!(device.received(), 3);
    Ok(())
}

#[tokio::test]
async fn larger_receive_buffer_accepts_the_same_reply() -> Result<(), Box<dyn Error>> {
    let mut verbose = SimulatedDevice::new(MAC, KEY);
    verbose.name = "x".repeat(1200);
    let device = spawn_device(verbose).await?;
    let mut client = client_with(&device, fast_transport_with_buffer(4096));

    let info = client.scan().await?;

    assert_eq!(info.name.len(), 1200);
    assert_eq!(device.received(), 1);
    Ok(())
}

#[tokio::test]
async fn non_pack_replies_are_retried() -> Result<(), Box<dyn Error>> {
    let mut flaky = SimulatedDevice::new(MAC, KEY);
    flaky.non_pack_replies = 2;
    let device = spawn_device(flaky).await?;
    let mut client = client_for(&device);

    client.scan().await?;

    assert_eq!(device.received(), 3);
    Ok(())
}

#[tokio::test]
async fn lost_first_datagram_is_recovered() -> Result<(), Box<dyn Error>> {
    let mut lossy = SimulatedDevice::new(MAC, KEY);
    lossy.silent_requests = 1;
    let device = spawn_device(lossy).await?;
    let mut client = client_for(&device);

    client.scan().await?;

    assert_eq!(device.received(), 2);
    Ok(())
}

#[tokio::test]
async fn non_pack_replies_exhaust_attempts() -> Result<(), Box<dyn Error>> {
    let mut broken = SimulatedDevice::new(MAC, KEY);
    broken.non_pack_replies = 10;
    let device = spawn_device(broken).await?;
    let mut client = client_for(&device);
    client.session_mut().set_try_limit(2);

    let err = client.scan().await.unwrap_err();

    assert!(matches!(err, ClientError::Transport(_)));
    assert_eq!(device.received(), 2);
    Ok(())
}

#[tokio::test]
async fn mismatched_scan_identity_is_discovery_error() -> Result<(), Box<dyn Error>> {
    let mut impostor = SimulatedDevice::new(MAC, KEY);
    impostor.claimed_cid = Some("000000000000".into());
    let device = spawn_device(impostor).await?;
    let mut client = client_for(&device);

    let err = client.scan().await.unwrap_err();

    assert!(matches!(err, ClientError::Discovery(_)));
    assert_eq!(client.session().cid(), "");
    Ok(())
}

#[tokio::test]
async fn refused_bind_is_binding_error() -> Result<(), Box<dyn Error>> {
    let mut stubborn = SimulatedDevice::new(MAC, KEY);
    stubborn.refuse_bind = true;
    let device = spawn_device(stubborn).await?;
    let mut client = client_for(&device);

    client.scan().await?;
    let err = client.bind().await.unwrap_err();

    assert!(matches!(err, ClientError::Binding(_)));
    assert!(!client.session().is_bound());
    Ok(())
}

#[tokio::test]
async fn discovery_client_reports_answering_device() -> Result<(), Box<dyn Error>> {
    let device = spawn_device(SimulatedDevice::new(MAC, KEY)).await?;
    let local: SocketAddr = "127.0.0.1:0".parse()?;
    let scanner = DiscoveryClient::new(local, device.addr, Duration::from_millis(300));

    let found = scanner.discover().await?;

    assert_eq!(found.len(), 1);
    assert_eq!(found[0].addr, device.addr);
    assert_eq!(found[0].info.mac, MAC);
    Ok(())
}
