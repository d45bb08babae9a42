//! Integration tests for memwire.
//!
//! These tests drive a real TCP command server with the remote client,
//! against both the simulated backend and the emulated extended-addressing
//! target.

use std::sync::Arc;
use std::time::Duration;

use memwire::access::{Format, Kind, MemoryAccess, Symbol, TypedAccess, Value};
use memwire::probe::ProbeRegistry;
use memwire::transport::LoopbackTarget;
use memwire::{ErrorClass, ProbeError, RemoteProbe, Server};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::oneshot;

/// Start a server on an ephemeral port; returns its address and a stop handle.
async fn start_server(registry: ProbeRegistry, probe: &str) -> (String, oneshot::Sender<()>) {
    let server = Server::builder()
        .bind_addr("127.0.0.1:0")
        .default_probe(probe)
        .registry(registry)
        .bind()
        .await
        .unwrap();
    let addr = server.local_addr().unwrap().to_string();
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    tokio::spawn(server.run_until(async move {
        let _ = stop_rx.await;
    }));
    (addr, stop_tx)
}

#[tokio::test]
async fn test_remote_typed_access_on_dummy_probe() {
    let registry = ProbeRegistry::loopback(LoopbackTarget::new());
    let (addr, _stop) = start_server(registry, "DummyProbe").await;
    let probe = RemoteProbe::new(&addr);

    assert_eq!(probe.list_probes().await.unwrap(), vec!["SKolbusEx", "DummyProbe"]);
    assert!(probe.connect(None).await.unwrap());

    probe.write_as(0x2000_0000, 0x1234_5678u32).await.unwrap();
    assert_eq!(probe.read_as::<u32>(0x2000_0000).await.unwrap(), 0x1234_5678);
    assert_eq!(probe.read_as::<u8>(0x2000_0003).await.unwrap(), 0x12);

    probe.write_as(0x100, -1.5f64).await.unwrap();
    assert_eq!(probe.read_as::<f64>(0x100).await.unwrap(), -1.5);

    probe.write(0x200, b"hello\0").await.unwrap();
    assert_eq!(probe.read_ascii(0x200, 6).await.unwrap(), "hello ");

    assert!(!probe.disconnect().await.unwrap());
}

#[tokio::test]
async fn test_remote_session_against_emulated_target() {
    let target = LoopbackTarget::new();
    target.poke(0xAC25, &[0x5C, 0x0F, 0xF8, 0x43]);
    let (addr, _stop) = start_server(ProbeRegistry::loopback(target.clone()), "DummyProbe").await;

    let probe = RemoteProbe::new(&addr);
    probe.set_probe("SKolbusEx").await.unwrap();
    probe.set_min_access_width(2);
    assert!(probe.connect(None).await.unwrap());

    let devices = probe.list_devices().await.unwrap();
    assert_eq!(devices[0].id, "loopback");

    let sym = Symbol::new(Kind::F32, 0xAC25);
    let text = probe.read_symbol(&sym, Format::Dec).await.unwrap();
    assert_eq!(text.as_text(), Some("496.12"));

    let sym = Symbol::new(Kind::I16, 0x1_0000);
    probe.write_symbol(&sym, "-2").await.unwrap();
    assert_eq!(target.peek(0x1_0000, 2), vec![0xFE, 0xFF]);
    let raw = probe.read_symbol(&sym, Format::Raw).await.unwrap();
    assert_eq!(raw.as_value(), Some(Value::Signed(-2)));

    target.poke(0x3000, &[0xAA, 0xBB]);
    probe.write_as(0x3000, 0x11u8).await.unwrap();
    assert_eq!(target.peek(0x3000, 2), vec![0x11, 0x00]);

    let words: Vec<u16> = probe.read_list(0xAC25, 2).await.unwrap();
    assert_eq!(words, vec![0x0F5C, 0x43F8]);
}

#[tokio::test]
async fn test_constraint_violation_keeps_channel_usable() {
    let registry = ProbeRegistry::loopback(LoopbackTarget::new());
    let (addr, _stop) = start_server(registry, "SKolbusEx").await;
    let probe = RemoteProbe::new(&addr);
    assert!(probe.connect(None).await.unwrap());

    let err = probe.read(0, 512).await.unwrap_err();
    assert_eq!(err.class(), ErrorClass::Protocol);

    let err = probe.write(0, &[1, 2, 3]).await.unwrap_err();
    assert!(matches!(err, ProbeError::Remote { status: 1, .. }));

    assert_eq!(probe.read(0, 4).await.unwrap().len(), 4);
}

#[tokio::test]
async fn test_unknown_probe_leaves_backend() {
    let registry = ProbeRegistry::loopback(LoopbackTarget::new());
    let (addr, _stop) = start_server(registry, "DummyProbe").await;
    let probe = RemoteProbe::new(&addr);
    probe.write(0x10, &[7]).await.unwrap();

    let err = probe.set_probe("OCD_G4x_Probe").await.unwrap_err();
    assert_eq!(err.status(), 1);
    assert!(err.to_string().contains("Unknown probe type"));

    assert_eq!(&probe.read(0x10, 1).await.unwrap()[..], &[7]);
}

#[tokio::test]
async fn test_concurrent_clients_do_not_interleave_frames() {
    let target = LoopbackTarget::new().with_reply_delay(Duration::from_millis(10));
    target.poke(0x100, &[1, 2, 3, 4]);
    let (addr, _stop) = start_server(ProbeRegistry::loopback(target.clone()), "SKolbusEx").await;

    let setup = RemoteProbe::new(&addr);
    assert!(setup.connect(None).await.unwrap());

    let mut tasks = Vec::new();
    for _ in 0..4 {
        let client = Arc::new(RemoteProbe::new(&addr));
        tasks.push(tokio::spawn(async move {
            for _ in 0..3 {
                let bytes = client.read(0x100, 4).await.unwrap();
                assert_eq!(&bytes[..], &[1, 2, 3, 4]);
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    assert_eq!(target.frames_served(), 12);
    assert_eq!(target.overlapped_requests(), 0);
}

#[tokio::test]
async fn test_lost_link_requires_reconnect() {
    let target = LoopbackTarget::new();
    let (addr, _stop) = start_server(ProbeRegistry::loopback(target.clone()), "SKolbusEx").await;
    let probe = RemoteProbe::new(&addr);
    assert!(probe.connect(None).await.unwrap());

    // Silence the target so the session's reply timer runs out
    target.set_silent(true);
    let read = tokio::time::timeout(Duration::from_secs(5), probe.read(0, 2)).await;
    let err = read.expect("server replies within its own timeout").unwrap_err();
    assert_eq!(err.class(), ErrorClass::Transport);

    target.set_silent(false);
    let err = probe.read(0, 2).await.unwrap_err();
    assert_eq!(err.status(), 2);

    assert!(probe.connect(None).await.unwrap());
    assert_eq!(probe.read(0, 2).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_raw_line_protocol() {
    let registry = ProbeRegistry::loopback(LoopbackTarget::new());
    let (addr, _stop) = start_server(registry, "DummyProbe").await;
    let stream = TcpStream::connect(&addr).await.unwrap();
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    let input = concat!(
        "{\"cmd\":\"write\",\"addr\":0,\"data\":\"3412\"}\n",
        "{\"cmd\":\"read\",\"id\":9,\"addr\":0,\"nb\":2}\n",
        "{oops\n",
        "{\"cmd\":\"bogus\"}\n",
    );
    writer.write_all(input.as_bytes()).await.unwrap();

    let mut replies = Vec::new();
    for _ in 0..4 {
        let line = lines.next_line().await.unwrap().unwrap();
        replies.push(serde_json::from_str::<serde_json::Value>(&line).unwrap());
    }

    assert_eq!(replies[0], serde_json::json!({"version": 1, "status": 0}));
    assert_eq!(
        replies[1],
        serde_json::json!({"version": 1, "id": 9, "status": 0, "data": "3412"})
    );
    assert_eq!(replies[2]["status"], 1);
    assert_eq!(replies[3]["status"], 1);
    assert_eq!(replies[3]["msg"], "Unknown command: bogus");
}

#[tokio::test]
async fn test_hostile_lines_keep_server_alive() {
    let registry = ProbeRegistry::loopback(LoopbackTarget::new());
    let (addr, _stop) = start_server(registry, "DummyProbe").await;
    let stream = TcpStream::connect(&addr).await.unwrap();
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    let mut input = b"{\"cmd\":\"\xff\xfe\"}\n".to_vec();
    input.extend_from_slice(b"{\"cmd\":\"read\",\"id\":1,\"addr\":0,\"nb\":18446744073709551615}\n");
    input.extend_from_slice(b"{\"cmd\":\"read\",\"id\":2,\"addr\":0,\"nb\":1099511627776}\n");
    input.extend_from_slice(b"{\"cmd\":\"list_probes\",\"id\":3}\n");
    writer.write_all(&input).await.unwrap();

    let mut replies = Vec::new();
    for _ in 0..4 {
        let line = lines.next_line().await.unwrap().unwrap();
        replies.push(serde_json::from_str::<serde_json::Value>(&line).unwrap());
    }

    assert_eq!(replies[0]["status"], 1);
    assert_eq!(replies[0]["msg"], "Protocol error: Invalid JSON format");
    assert_eq!(replies[1]["id"], 1);
    assert_eq!(replies[1]["status"], 1);
    assert_eq!(replies[2]["id"], 2);
    assert_eq!(replies[2]["status"], 1);
    assert_eq!(replies[3]["id"], 3);
    assert_eq!(replies[3]["status"], 0);

    // A fresh client still gets served
    let probe = RemoteProbe::new(&addr);
    assert_eq!(probe.list_probes().await.unwrap().len(), 2);
}
