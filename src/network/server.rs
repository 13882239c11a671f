//! TCP Server
//!
//! Accepts connections and dispatches them to a fixed pool of worker threads.

use std::collections::HashMap;
use std::io::{BufWriter, ErrorKind};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;

use crate::config::Config;
use crate::engine::Engine;
use crate::error::{Result, StoreError};
use crate::protocol::{write_response, Response};

use super::connection::Connection;

/// How long the acceptor sleeps when no connection is pending
const ACCEPT_POLL: Duration = Duration::from_millis(10);

/// Cloneable handle that stops a running server
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandle {
    flag: Arc<AtomicBool>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_shutdown(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// Open client streams, so shutdown can unblock their workers
type Registry = Arc<Mutex<HashMap<u64, TcpStream>>>;

/// TCP server for QuantaStore
pub struct Server {
    config: Config,
    engine: Arc<Engine>,
    listener: Option<TcpListener>,
    shutdown: ShutdownHandle,
    active: Arc<AtomicUsize>,
    next_id: AtomicU64,
    registry: Registry,
}

impl Server {
    /// Create a new server with the given config and engine
    pub fn new(config: Config, engine: Arc<Engine>) -> Self {
        Self {
            config,
            engine,
            listener: None,
            shutdown: ShutdownHandle::default(),
            active: Arc::new(AtomicUsize::new(0)),
            next_id: AtomicU64::new(0),
            registry: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Bind the listen address; returns the bound address
    pub fn bind(&mut self) -> Result<SocketAddr> {
        let listener = TcpListener::bind(&self.config.listen_addr)?;
        listener.set_nonblocking(true)?;
        let addr = listener.local_addr()?;

        tracing::info!("Listening on {}", addr);
        self.listener = Some(listener);
        Ok(addr)
    }

    /// Start the server (blocking until shutdown)
    pub fn run(&mut self) -> Result<()> {
        if self.listener.is_none() {
            self.bind()?;
        }
        let listener = self
            .listener
            .take()
            .ok_or_else(|| StoreError::Network("listener not bound".to_string()))?;

        let (sender, receiver) = channel::bounded::<(u64, TcpStream)>(self.config.max_connections);
        let workers = self.spawn_workers(receiver)?;

        while !self.shutdown.is_shutdown() {
            match listener.accept() {
                Ok((stream, addr)) => {
                    tracing::debug!("Accepted connection from {}", addr);
                    if let Err(e) = self.dispatch(stream, &sender) {
                        tracing::warn!("Failed to dispatch connection from {}: {}", addr, e);
                    }
                }
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => thread::sleep(ACCEPT_POLL),
                Err(e) => tracing::warn!("Accept failed: {}", e),
            }
        }

        tracing::info!("Shutting down, closing {} connections", self.registry.lock().len());

        drop(sender);
        for (_, stream) in self.registry.lock().drain() {
            let _ = stream.shutdown(Shutdown::Both);
        }
        for worker in workers {
            let _ = worker.join();
        }

        self.engine.close()
    }

    /// Handle for stopping the server from another thread
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Hand a new stream to the pool, or turn it away when full
    fn dispatch(&self, stream: TcpStream, sender: &Sender<(u64, TcpStream)>) -> Result<()> {
        stream.set_nonblocking(false)?;

        if self.active.load(Ordering::Acquire) >= self.config.max_connections {
            tracing::warn!("Connection limit {} reached", self.config.max_connections);
            let mut writer = BufWriter::new(stream);
            write_response(&mut writer, &Response::error("server busy"))?;
            return Ok(());
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.registry.lock().insert(id, stream.try_clone()?);
        self.active.fetch_add(1, Ordering::AcqRel);

        sender
            .send((id, stream))
            .map_err(|e| StoreError::Network(format!("worker pool closed: {}", e)))
    }

    fn spawn_workers(&self, receiver: Receiver<(u64, TcpStream)>) -> Result<Vec<JoinHandle<()>>> {
        (0..self.config.max_connections)
            .map(|n| {
                let receiver = receiver.clone();
                let engine = Arc::clone(&self.engine);
                let active = Arc::clone(&self.active);
                let registry = Arc::clone(&self.registry);
                let read_ms = self.config.read_timeout_ms;
                let write_ms = self.config.write_timeout_ms;

                thread::Builder::new()
                    .name(format!("quantastore-worker-{}", n))
                    .spawn(move || {
                        for (id, stream) in receiver.iter() {
                            let result = Connection::new(stream, Arc::clone(&engine)).and_then(|mut conn| {
                                conn.set_timeouts(read_ms, write_ms)?;
                                conn.handle()
                            });
                            if let Err(e) = result {
                                tracing::warn!("Connection {} ended with error: {}", id, e);
                            }
                            registry.lock().remove(&id);
                            active.fetch_sub(1, Ordering::AcqRel);
                        }
                    })
                    .map_err(StoreError::from)
            })
            .collect()
    }
}
