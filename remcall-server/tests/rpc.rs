//! End-to-end tests: real client against a real server over loopback.

use remcall_client::{Client, ClientError, ConnectionConfig};
use remcall_protocol::call::{OpenFlags, Whence};
use remcall_protocol::checksum::xor_checksum;
use remcall_protocol::error::errno;
use remcall_protocol::wire::{FrameReader, FrameWriter};
use remcall_server::{Server, ServerConfig};
use std::net::SocketAddr;
use std::sync::Arc;

async fn start_server() -> (Arc<Server>, SocketAddr) {
    let config = ServerConfig::new("127.0.0.1:0".parse().unwrap());
    let server = Arc::new(Server::bind(config).await.unwrap());
    let addr = server.local_addr().unwrap();

    let runner = server.clone();
    tokio::spawn(async move {
        let _ = runner.run().await;
    });

    (server, addr)
}

async fn connect(addr: SocketAddr) -> Client {
    let client = Client::new(ConnectionConfig::new(addr));
    client.connect().await.unwrap();
    client
}

fn fold(data: &[u8]) -> i16 {
    data.iter().fold(0i16, |acc, &b| acc ^ b as i16)
}

#[tokio::test]
async fn test_copy_roundtrip_with_matching_checksums() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("source.bin");
    let contents: Vec<u8> = (0..4096u32).map(|i| (i % 251) as u8).collect();
    std::fs::write(&source, &contents).unwrap();

    let (_server, addr) = start_server().await;
    let client = connect(addr).await;

    let handle = client
        .open(source.to_str().unwrap(), OpenFlags::read_only(), None)
        .await
        .unwrap();

    let remote_sum = client.checksum(handle, 2).await.unwrap();
    assert_eq!(remote_sum, fold(&contents));

    // Copy through the stubs the way the demonstration client does.
    let mut copy = Vec::new();
    let mut buf = [0u8; 1024];
    loop {
        let n = client.read(handle, &mut buf).await.unwrap();
        if n == 0 {
            break;
        }
        copy.extend_from_slice(&buf[..n]);
    }
    assert_eq!(copy, contents);

    client.close_file(handle).await.unwrap();

    let mut cursor = std::io::Cursor::new(copy);
    assert_eq!(xor_checksum(&mut cursor, 2).unwrap(), remote_sum);
}

#[tokio::test]
async fn test_open_missing_path_reports_enoent() {
    let (_server, addr) = start_server().await;
    let client = connect(addr).await;

    let result = client
        .open("/definitely/not/here", OpenFlags::read_only(), None)
        .await;

    match result {
        Err(ClientError::Remote(remote)) => {
            assert_eq!(remote.errno(), errno::ENOENT);
            assert_eq!(remote.kind(), std::io::ErrorKind::NotFound);
        }
        other => panic!("expected ENOENT, got {:?}", other.err()),
    }

    // The connection survives a remote failure.
    assert!(client.is_connected());
}

#[tokio::test]
async fn test_write_then_checksum_matches_fold() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("written.bin");

    let (_server, addr) = start_server().await;
    let client = connect(addr).await;

    let handle = client
        .open(
            target.to_str().unwrap(),
            OpenFlags::new().with_write().with_create(),
            Some(0o644),
        )
        .await
        .unwrap();

    let payload = [1u8, 2, 3, 4, 5, 6, 7, 8, 9, 10];
    let written = client.write(handle, &payload).await.unwrap();
    assert_eq!(written, 10);

    let sum = client.checksum(handle, 2).await.unwrap();
    assert_eq!(sum, fold(&payload));

    client.close_file(handle).await.unwrap();

    // The bytes really landed on the server's filesystem.
    assert_eq!(std::fs::read(&target).unwrap(), payload);
}

#[tokio::test]
async fn test_short_read_returns_remaining_bytes() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("short.bin");
    std::fs::write(&source, b"only six").unwrap();

    let (_server, addr) = start_server().await;
    let client = connect(addr).await;

    let handle = client
        .open(source.to_str().unwrap(), OpenFlags::read_only(), None)
        .await
        .unwrap();

    let mut buf = [0xFFu8; 64];
    let n = client.read(handle, &mut buf).await.unwrap();
    assert_eq!(n, 8);
    assert_eq!(&buf[..8], b"only six");

    // A second read is at EOF.
    assert_eq!(client.read(handle, &mut buf).await.unwrap(), 0);
}

#[tokio::test]
async fn test_seek_repositions_the_remote_file() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("seek.bin");
    std::fs::write(&source, b"0123456789").unwrap();

    let (_server, addr) = start_server().await;
    let client = connect(addr).await;

    let handle = client
        .open(source.to_str().unwrap(), OpenFlags::read_only(), None)
        .await
        .unwrap();

    assert_eq!(client.seek(handle, 4, Whence::Start).await.unwrap(), 4);

    let mut buf = [0u8; 3];
    assert_eq!(client.read(handle, &mut buf).await.unwrap(), 3);
    assert_eq!(&buf, b"456");

    assert_eq!(client.seek(handle, -2, Whence::End).await.unwrap(), 8);
    let mut buf = [0u8; 8];
    assert_eq!(client.read(handle, &mut buf).await.unwrap(), 2);
    assert_eq!(&buf[..2], b"89");
}

#[tokio::test]
async fn test_checksum_is_repeatable_and_resets_position() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("sum.bin");
    std::fs::write(&source, [0x01u8, 0x02, 0x03, 0x04]).unwrap();

    let (_server, addr) = start_server().await;
    let client = connect(addr).await;

    let handle = client
        .open(source.to_str().unwrap(), OpenFlags::read_only(), None)
        .await
        .unwrap();

    let first = client.checksum(handle, 2).await.unwrap();
    let second = client.checksum(handle, 2).await.unwrap();
    assert_eq!(first, 0x04);
    assert_eq!(second, 0x04);

    // Position is back at 0 after the scans.
    let mut buf = [0u8; 4];
    assert_eq!(client.read(handle, &mut buf).await.unwrap(), 4);
    assert_eq!(buf, [0x01, 0x02, 0x03, 0x04]);
}

#[tokio::test]
async fn test_handle_namespaces_are_per_connection() {
    let dir = tempfile::tempdir().unwrap();
    let file_a = dir.path().join("a.bin");
    let file_b = dir.path().join("b.bin");
    std::fs::write(&file_a, b"contents of A").unwrap();
    std::fs::write(&file_b, b"B data").unwrap();

    let (_server, addr) = start_server().await;
    let client_a = connect(addr).await;
    let client_b = connect(addr).await;

    let handle_a = client_a
        .open(file_a.to_str().unwrap(), OpenFlags::read_only(), None)
        .await
        .unwrap();
    let handle_b = client_b
        .open(file_b.to_str().unwrap(), OpenFlags::read_only(), None)
        .await
        .unwrap();

    // Fresh tables hand out the same first handle independently.
    assert_eq!(handle_a, handle_b);

    let mut buf = [0u8; 32];
    let n = client_a.read(handle_a, &mut buf).await.unwrap();
    assert_eq!(&buf[..n], b"contents of A");

    let n = client_b.read(handle_b, &mut buf).await.unwrap();
    assert_eq!(&buf[..n], b"B data");

    // Closing A's handle does not invalidate B's.
    client_a.close_file(handle_a).await.unwrap();
    assert_eq!(client_b.seek(handle_b, 0, Whence::Start).await.unwrap(), 0);
    let n = client_b.read(handle_b, &mut buf).await.unwrap();
    assert_eq!(&buf[..n], b"B data");
}

#[tokio::test]
async fn test_stale_handle_reports_ebadf() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("stale.bin");
    std::fs::write(&source, b"x").unwrap();

    let (_server, addr) = start_server().await;
    let client = connect(addr).await;

    let handle = client
        .open(source.to_str().unwrap(), OpenFlags::read_only(), None)
        .await
        .unwrap();
    client.close_file(handle).await.unwrap();

    let mut buf = [0u8; 4];
    let result = client.read(handle, &mut buf).await;
    assert_eq!(result.err().and_then(|e| e.remote_errno()), Some(errno::EBADF));
}

#[tokio::test]
async fn test_unknown_call_code_kills_only_that_connection() {
    let (_server, addr) = start_server().await;

    // Speak raw frames: a call code the server does not recognize.
    let stream = tokio::net::TcpStream::connect(addr).await.unwrap();
    let (read_half, write_half) = stream.into_split();
    let mut writer = FrameWriter::new(write_half);
    let mut reader = FrameReader::new(read_half);

    writer.write_u32(99).await.unwrap();

    // The server tears down this connection without replying.
    let result = reader.read_frame().await;
    assert!(result.is_err());

    // The listener is unaffected: a fresh client works.
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("alive.bin");
    std::fs::write(&source, b"still serving").unwrap();

    let client = connect(addr).await;
    let handle = client
        .open(source.to_str().unwrap(), OpenFlags::read_only(), None)
        .await
        .unwrap();
    let mut buf = [0u8; 32];
    let n = client.read(handle, &mut buf).await.unwrap();
    assert_eq!(&buf[..n], b"still serving");
}

#[tokio::test]
async fn test_excl_create_fails_on_existing_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("exists.bin");
    std::fs::write(&path, b"already here").unwrap();

    let (_server, addr) = start_server().await;
    let client = connect(addr).await;

    let result = client
        .open(
            path.to_str().unwrap(),
            OpenFlags::new().with_write().with_create().with_excl(),
            Some(0o644),
        )
        .await;

    assert!(matches!(result, Err(ClientError::Remote(_))));
}

#[tokio::test]
async fn test_shutdown_reaches_connected_clients() {
    let (server, addr) = start_server().await;
    let client = connect(addr).await;

    server.shutdown();

    // The connection task exits on the broadcast; the next call fails
    // rather than hanging.
    let mut buf = [0u8; 4];
    let result = client.read(3, &mut buf).await;
    assert!(result.is_err());
}
