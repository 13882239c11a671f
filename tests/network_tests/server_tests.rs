//! Tests for the TCP server and client
//!
//! These tests verify:
//! - Session commands over a real socket
//! - EOF and error responses
//! - Stats transfer
//! - Per-connection sessions
//! - Connection limit and shutdown

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use quantastore::config::Config;
use quantastore::network::{Client, Server, ShutdownHandle};
use quantastore::protocol::{Command, Status};
use quantastore::session::AccessMode;
use quantastore::store::StoreState;
use quantastore::{Engine, StoreError};

// =============================================================================
// Helper Functions
// =============================================================================

struct TestServer {
    addr: std::net::SocketAddr,
    engine: Arc<Engine>,
    handle: ShutdownHandle,
    thread: Option<JoinHandle<()>>,
}

impl TestServer {
    fn start(max_connections: usize) -> Self {
        let config = Config::builder()
            .listen_addr("127.0.0.1:0")
            .quantum_size(4)
            .blocks_per_segment(4)
            .device_count(2)
            .max_connections(max_connections)
            .build();
        let engine = Arc::new(Engine::open(config.clone()).unwrap());

        let mut server = Server::new(config, Arc::clone(&engine));
        let addr = server.bind().unwrap();
        let handle = server.shutdown_handle();
        let thread = thread::spawn(move || server.run().unwrap());

        Self {
            addr,
            engine,
            handle,
            thread: Some(thread),
        }
    }

    fn client(&self) -> Client {
        Client::connect(self.addr).unwrap()
    }

    fn stop(&mut self) {
        self.handle.shutdown();
        if let Some(thread) = self.thread.take() {
            thread.join().unwrap();
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.shutdown();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

// =============================================================================
// Basic Tests
// =============================================================================

#[test]
fn test_ping() {
    let server = TestServer::start(4);
    let mut client = server.client();
    client.ping().unwrap();
}

#[test]
fn test_write_then_read_over_tcp() {
    let server = TestServer::start(4);
    let mut client = server.client();

    client.open(0, AccessMode::WriteOnly, false).unwrap();
    assert_eq!(client.write(b"AAAAAA").unwrap(), 4);
    client.write_all(b"BBBBCC").unwrap();
    client.release().unwrap();

    client.open(0, AccessMode::ReadOnly, false).unwrap();
    assert_eq!(client.read(100).unwrap(), b"AAAA".to_vec());
    assert_eq!(client.read_to_end(4).unwrap(), b"BBBBCC".to_vec());
    assert!(client.read(4).unwrap().is_empty());
}

#[test]
fn test_empty_read_is_eof_status() {
    let server = TestServer::start(4);
    let mut client = server.client();

    client.open(1, AccessMode::ReadOnly, false).unwrap();
    let response = client.request(&Command::Read { max_len: 4 }).unwrap();
    assert_eq!(response.status, Status::Eof);
    assert_eq!(response.payload, None);
}

#[test]
fn test_errors_are_reported() {
    let server = TestServer::start(4);
    let mut client = server.client();

    // No session yet
    assert!(matches!(client.read(4), Err(StoreError::Network(_))));

    // Unknown device
    assert!(matches!(
        client.open(9, AccessMode::ReadOnly, false),
        Err(StoreError::Network(_))
    ));

    // Write through a read-only session
    client.open(0, AccessMode::ReadOnly, false).unwrap();
    let err = client.write(b"x").unwrap_err();
    match err {
        StoreError::Network(message) => assert!(message.contains("Invalid access")),
        other => panic!("unexpected error: {}", other),
    }

    // Connection stays usable after errors
    client.ping().unwrap();
}

#[test]
fn test_stat_and_reset() {
    let server = TestServer::start(4);
    let mut client = server.client();

    client.open(1, AccessMode::ReadWrite, false).unwrap();
    client.write_all(b"0123456789").unwrap();

    let stats = client.stat(1).unwrap();
    assert_eq!(stats.device, 1);
    assert_eq!(stats.size, 10);
    assert_eq!(stats.quantum_size, 4);
    assert_eq!(stats.allocated_quanta, 3);
    assert_eq!(stats.state, StoreState::Active);

    client.reset(1).unwrap();
    let stats = client.stat(1).unwrap();
    assert_eq!(stats.size, 0);
    assert_eq!(stats.state, StoreState::JustReset);
}

// =============================================================================
// Multi-Client Tests
// =============================================================================

#[test]
fn test_sessions_are_per_connection() {
    let server = TestServer::start(4);
    let mut writer = server.client();
    let mut reader = server.client();

    writer.open(0, AccessMode::WriteOnly, false).unwrap();
    writer.write_all(b"shared!!").unwrap();

    reader.open(0, AccessMode::ReadOnly, false).unwrap();
    assert_eq!(reader.read_to_end(4).unwrap(), b"shared!!".to_vec());

    // The writer's cursor is untouched by the reader
    writer.write_all(b"++").unwrap();
    assert_eq!(reader.read_to_end(4).unwrap(), b"++".to_vec());
}

#[test]
fn test_connection_limit() {
    let server = TestServer::start(1);

    let mut first = server.client();
    first.ping().unwrap();

    // Second connection is turned away while the first is open
    let mut second = server.client();
    assert!(second.ping().is_err());

    drop(first);
}

#[test]
fn test_shutdown_closes_open_connections() {
    let mut server = TestServer::start(2);
    let mut client = server.client();
    client.ping().unwrap();

    server.stop();

    assert!(client.ping().is_err());
}

#[test]
fn test_shutdown_releases_device_memory() {
    let mut server = TestServer::start(2);
    let mut client = server.client();

    client.open(0, AccessMode::WriteOnly, false).unwrap();
    client.write_all(b"12345678").unwrap();
    assert_eq!(server.engine.stats(0).unwrap().allocated_quanta, 2);

    server.stop();

    let stats = server.engine.stats(0).unwrap();
    assert_eq!(stats.size, 0);
    assert_eq!(stats.allocated_bytes, 0);
    assert_eq!(stats.state, StoreState::JustReset);
}
