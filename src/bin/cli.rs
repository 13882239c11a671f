//! QuantaStore CLI Client
//!
//! Command-line interface for interacting with a QuantaStore server.

use std::io::{self, Read, Write};

use clap::{Parser, Subcommand};
use quantastore::network::Client;
use quantastore::{AccessMode, Result};

/// QuantaStore CLI
#[derive(Parser, Debug)]
#[command(name = "quantastore-cli")]
#[command(about = "CLI for QuantaStore devices")]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:7070")]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Truncate a device and write data to it ("-" reads stdin)
    Write {
        device: u32,
        data: String,
    },

    /// Single read at offset 0 (at most one quantum)
    Read {
        device: u32,

        #[arg(short, long, default_value = "4096")]
        len: u32,
    },

    /// Read a device until end of data or the first hole
    Cat {
        device: u32,
    },

    /// Reset a device
    Reset {
        device: u32,
    },

    /// Show device stats
    Stat {
        device: u32,
    },

    /// Ping the server
    Ping,
}

fn main() {
    let args = Args::parse();

    if let Err(e) = run(args) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let mut client = Client::connect(&args.server)?;

    match args.command {
        Commands::Write { device, data } => {
            let bytes = if data == "-" {
                let mut buf = Vec::new();
                io::stdin().read_to_end(&mut buf)?;
                buf
            } else {
                data.into_bytes()
            };
            client.open(device, AccessMode::WriteOnly, true)?;
            client.write_all(&bytes)?;
            client.release()?;
            println!("{} bytes written", bytes.len());
        }
        Commands::Read { device, len } => {
            client.open(device, AccessMode::ReadOnly, false)?;
            let data = client.read(len)?;
            client.release()?;
            io::stdout().write_all(&data)?;
        }
        Commands::Cat { device } => {
            client.open(device, AccessMode::ReadOnly, false)?;
            let stats = client.stat(device)?;
            let data = client.read_to_end(stats.quantum_size as u32)?;
            client.release()?;
            io::stdout().write_all(&data)?;
        }
        Commands::Reset { device } => {
            client.reset(device)?;
            println!("OK");
        }
        Commands::Stat { device } => {
            let stats = client.stat(device)?;
            println!("device:             {}", stats.device);
            println!("state:              {:?}", stats.state);
            println!("size:               {}", stats.size);
            println!("quantum_size:       {}", stats.quantum_size);
            println!("blocks_per_segment: {}", stats.blocks_per_segment);
            println!("segments:           {}", stats.segments);
            println!("allocated_quanta:   {}", stats.allocated_quanta);
            println!("allocated_bytes:    {}", stats.allocated_bytes);
        }
        Commands::Ping => {
            client.ping()?;
            println!("PONG");
        }
    }

    Ok(())
}
