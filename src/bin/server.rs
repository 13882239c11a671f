//! QuantaStore Server Binary
//!
//! Starts the TCP server for QuantaStore.

use std::sync::Arc;

use clap::Parser;
use quantastore::config::{DEFAULT_DEVICE_COUNT, DEFAULT_QSET, DEFAULT_QUANTUM_SIZE};
use quantastore::network::Server;
use quantastore::{Config, Engine, LockPolicy};
use tracing_subscriber::{fmt, EnvFilter};

/// QuantaStore Server
#[derive(Parser, Debug)]
#[command(name = "quantastore-server")]
#[command(about = "Sparse in-memory device store")]
#[command(version)]
struct Args {
    /// Listen address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:7070")]
    listen: String,

    /// Number of devices
    #[arg(short, long, default_value_t = DEFAULT_DEVICE_COUNT)]
    devices: usize,

    /// Bytes per quantum
    #[arg(short, long, default_value_t = DEFAULT_QUANTUM_SIZE)]
    quantum: usize,

    /// Quanta per segment
    #[arg(long, default_value_t = DEFAULT_QSET)]
    qset: usize,

    /// Maximum concurrent connections
    #[arg(short, long, default_value = "64")]
    max_connections: usize,

    /// Serialize reads with writes on one exclusive lock
    #[arg(long)]
    exclusive_reads: bool,

    /// Per-device memory limit in bytes
    #[arg(long)]
    memory_limit: Option<usize>,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,quantastore=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("QuantaStore Server v{}", quantastore::VERSION);
    tracing::info!("Listen address: {}", args.listen);

    let lock_policy = if args.exclusive_reads {
        LockPolicy::Exclusive
    } else {
        LockPolicy::Shared
    };

    // Build config from args
    let mut builder = Config::builder()
        .listen_addr(&args.listen)
        .device_count(args.devices)
        .quantum_size(args.quantum)
        .blocks_per_segment(args.qset)
        .max_connections(args.max_connections)
        .lock_policy(lock_policy);
    if let Some(limit) = args.memory_limit {
        builder = builder.memory_limit(limit);
    }
    let config = builder.build();

    let engine = match Engine::open(config.clone()) {
        Ok(e) => Arc::new(e),
        Err(e) => {
            tracing::error!("Failed to open engine: {}", e);
            std::process::exit(1);
        }
    };

    let mut server = Server::new(config, engine);
    if let Err(e) = server.run() {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }

    tracing::info!("Server stopped");
}
