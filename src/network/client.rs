//! Blocking client
//!
//! Speaks the wire protocol to a server; used by the CLI.

use std::io::{BufReader, BufWriter};
use std::net::{TcpStream, ToSocketAddrs};

use crate::error::{Result, StoreError};
use crate::protocol::{read_response, write_command, Command, Response, Status, MAX_PAYLOAD_SIZE};
use crate::session::AccessMode;
use crate::store::DeviceStats;

/// Client connection to a QuantaStore server
pub struct Client {
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
}

impl Client {
    /// Connect to `addr`
    pub fn connect(addr: impl ToSocketAddrs) -> Result<Self> {
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;
        let read_stream = stream.try_clone()?;

        Ok(Self {
            reader: BufReader::new(read_stream),
            writer: BufWriter::new(stream),
        })
    }

    /// Send one command and wait for its response
    pub fn request(&mut self, command: &Command) -> Result<Response> {
        write_command(&mut self.writer, command)?;
        read_response(&mut self.reader)
    }

    /// Send a command, turning ERROR responses into `StoreError::Network`
    fn call(&mut self, command: &Command) -> Result<Response> {
        let response = self.request(command)?;
        match response.error_message() {
            Some(message) => Err(StoreError::Network(message)),
            None => Ok(response),
        }
    }

    pub fn ping(&mut self) -> Result<()> {
        self.call(&Command::Ping).map(|_| ())
    }

    /// Open a session on `device`
    pub fn open(&mut self, device: u32, mode: AccessMode, truncate: bool) -> Result<()> {
        self.call(&Command::Open {
            device,
            mode,
            truncate,
        })
        .map(|_| ())
    }

    /// Read up to `max_len` bytes at the cursor; empty at EOF or a hole
    pub fn read(&mut self, max_len: u32) -> Result<Vec<u8>> {
        let response = self.call(&Command::Read { max_len })?;
        match response.status {
            Status::Eof => Ok(Vec::new()),
            _ => Ok(response.payload.unwrap_or_default()),
        }
    }

    /// Read until EOF or the first hole
    pub fn read_to_end(&mut self, chunk: u32) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        loop {
            let data = self.read(chunk)?;
            if data.is_empty() {
                return Ok(out);
            }
            out.extend_from_slice(&data);
        }
    }

    /// Write at the cursor; returns the bytes the server accepted
    pub fn write(&mut self, data: &[u8]) -> Result<usize> {
        let response = self.call(&Command::Write {
            data: data.to_vec(),
        })?;

        let payload = response.payload.unwrap_or_default();
        let count: [u8; 4] = payload.as_slice().try_into().map_err(|_| {
            StoreError::Protocol(format!("WRITE reply: expected 4 bytes, got {}", payload.len()))
        })?;
        Ok(u32::from_be_bytes(count) as usize)
    }

    /// Write all of `data`, looping on partial writes
    pub fn write_all(&mut self, mut data: &[u8]) -> Result<()> {
        while !data.is_empty() {
            let chunk = data.len().min(MAX_PAYLOAD_SIZE as usize);
            let written = self.write(&data[..chunk])?;
            if written == 0 {
                return Err(StoreError::Protocol("server accepted zero bytes".to_string()));
            }
            data = &data[written..];
        }
        Ok(())
    }

    pub fn release(&mut self) -> Result<()> {
        self.call(&Command::Release).map(|_| ())
    }

    pub fn reset(&mut self, device: u32) -> Result<()> {
        self.call(&Command::Reset { device }).map(|_| ())
    }

    pub fn stat(&mut self, device: u32) -> Result<DeviceStats> {
        let response = self.call(&Command::Stat { device })?;
        let payload = response.payload.unwrap_or_default();
        Ok(bincode::deserialize(&payload)?)
    }
}
