//! Protocol codec
//!
//! Encoding and decoding functions for the wire protocol.
//!
//! ## Wire Format
//!
//! ### Request (Command) Format
//! ```text
//! ┌──────────┬──────────┬─────────────────────────────┐
//! │ Cmd (1)  │ Len (4)  │         Payload             │
//! └──────────┴──────────┴─────────────────────────────┘
//! ```
//!
//! ### Payload by Command Type
//! - OPEN:    device (4 bytes) + mode (1 byte) + truncate (1 byte)
//! - READ:    max_len (4 bytes)
//! - WRITE:   data
//! - RELEASE: empty
//! - RESET:   device (4 bytes)
//! - STAT:    device (4 bytes)
//! - PING:    empty
//!
//! All integers are big-endian.

use std::io::{Read, Write};

use bytes::{Buf, BufMut, BytesMut};

use super::{Command, Response, Status};
use crate::error::{Result, StoreError};
use crate::session::AccessMode;

/// Header size: 1 byte command/status + 4 bytes length
pub const HEADER_SIZE: usize = 5;

/// Maximum payload size (16 MB)
pub const MAX_PAYLOAD_SIZE: u32 = 16 * 1024 * 1024;

// =============================================================================
// Command Encoding/Decoding
// =============================================================================

/// Encode a command to bytes
///
/// Format: cmd_type (1) + payload_len (4) + payload
pub fn encode_command(command: &Command) -> Vec<u8> {
    let mut payload = BytesMut::new();

    match command {
        Command::Open {
            device,
            mode,
            truncate,
        } => {
            payload.put_u32(*device);
            payload.put_u8(*mode as u8);
            payload.put_u8(u8::from(*truncate));
        }
        Command::Read { max_len } => payload.put_u32(*max_len),
        Command::Write { data } => payload.put_slice(data),
        Command::Reset { device } | Command::Stat { device } => payload.put_u32(*device),
        Command::Release | Command::Ping => {}
    }

    frame(command.command_type() as u8, &payload)
}

/// Decode a command from bytes
pub fn decode_command(bytes: &[u8]) -> Result<Command> {
    let (cmd_type, mut payload) = unframe(bytes, "command")?;

    let command = match cmd_type {
        0x01 => {
            expect_len(payload, 6, "OPEN")?;
            let device = payload.get_u32();
            let mode = AccessMode::try_from(payload.get_u8())?;
            let truncate = match payload.get_u8() {
                0 => false,
                1 => true,
                other => {
                    return Err(StoreError::Protocol(format!(
                        "OPEN command: invalid truncate flag 0x{:02x}",
                        other
                    )))
                }
            };
            Command::Open {
                device,
                mode,
                truncate,
            }
        }
        0x02 => {
            expect_len(payload, 4, "READ")?;
            Command::Read {
                max_len: payload.get_u32(),
            }
        }
        0x03 => Command::Write {
            data: payload.to_vec(),
        },
        0x04 => {
            expect_len(payload, 0, "RELEASE")?;
            Command::Release
        }
        0x05 => {
            expect_len(payload, 4, "RESET")?;
            Command::Reset {
                device: payload.get_u32(),
            }
        }
        0x06 => {
            expect_len(payload, 4, "STAT")?;
            Command::Stat {
                device: payload.get_u32(),
            }
        }
        0x07 => {
            expect_len(payload, 0, "PING")?;
            Command::Ping
        }
        _ => {
            return Err(StoreError::Protocol(format!(
                "Unknown command type: 0x{:02x}",
                cmd_type
            )))
        }
    };

    Ok(command)
}

/// Payload must be exactly `expected` bytes
fn expect_len(payload: &[u8], expected: usize, name: &str) -> Result<()> {
    if payload.len() != expected {
        return Err(StoreError::Protocol(format!(
            "{} command: expected {} payload bytes, got {}",
            name,
            expected,
            payload.len()
        )));
    }
    Ok(())
}

// =============================================================================
// Response Encoding/Decoding
// =============================================================================

/// Encode a response to bytes
///
/// Format: status (1) + payload_len (4) + payload
pub fn encode_response(response: &Response) -> Vec<u8> {
    let payload = response.payload.as_deref().unwrap_or(&[]);
    frame(response.status as u8, payload)
}

/// Decode a response from bytes
pub fn decode_response(bytes: &[u8]) -> Result<Response> {
    let (status_byte, payload) = unframe(bytes, "response")?;

    let status = match status_byte {
        0x00 => Status::Ok,
        0x01 => Status::Eof,
        0x02 => Status::Error,
        _ => {
            return Err(StoreError::Protocol(format!(
                "Unknown response status: 0x{:02x}",
                status_byte
            )))
        }
    };

    let payload = if payload.is_empty() {
        None
    } else {
        Some(payload.to_vec())
    };

    Ok(Response { status, payload })
}

// =============================================================================
// Framing
// =============================================================================

fn frame(kind: u8, payload: &[u8]) -> Vec<u8> {
    let mut message = BytesMut::with_capacity(HEADER_SIZE + payload.len());
    message.put_u8(kind);
    message.put_u32(payload.len() as u32);
    message.put_slice(payload);
    message.to_vec()
}

/// Split a full message into its type byte and payload
fn unframe<'a>(bytes: &'a [u8], what: &str) -> Result<(u8, &'a [u8])> {
    if bytes.len() < HEADER_SIZE {
        return Err(StoreError::Protocol(format!(
            "Incomplete {} header: expected {} bytes, got {}",
            what,
            HEADER_SIZE,
            bytes.len()
        )));
    }

    let mut header = &bytes[..HEADER_SIZE];
    let kind = header.get_u8();
    let payload_len = header.get_u32() as usize;

    check_payload_len(payload_len, what)?;

    let total_len = HEADER_SIZE + payload_len;
    if bytes.len() < total_len {
        return Err(StoreError::Protocol(format!(
            "Incomplete {} payload: expected {} bytes, got {}",
            what,
            total_len,
            bytes.len()
        )));
    }

    Ok((kind, &bytes[HEADER_SIZE..total_len]))
}

fn check_payload_len(payload_len: usize, what: &str) -> Result<()> {
    if payload_len > MAX_PAYLOAD_SIZE as usize {
        return Err(StoreError::Protocol(format!(
            "{} payload too large: {} bytes (max {})",
            what, payload_len, MAX_PAYLOAD_SIZE
        )));
    }
    Ok(())
}

// =============================================================================
// Stream-based I/O helpers
// =============================================================================

/// Read one complete frame (header + payload) from a stream
fn read_frame<R: Read>(reader: &mut R, what: &str) -> Result<Vec<u8>> {
    let mut header = [0u8; HEADER_SIZE];
    reader.read_exact(&mut header)?;

    let mut len_bytes = &header[1..];
    let payload_len = len_bytes.get_u32() as usize;
    check_payload_len(payload_len, what)?;

    let mut message = vec![0u8; HEADER_SIZE + payload_len];
    message[..HEADER_SIZE].copy_from_slice(&header);
    if payload_len > 0 {
        reader.read_exact(&mut message[HEADER_SIZE..])?;
    }

    Ok(message)
}

/// Read a complete command from a stream
///
/// Blocks until a complete command is received or an error occurs
pub fn read_command<R: Read>(reader: &mut R) -> Result<Command> {
    let message = read_frame(reader, "command")?;
    decode_command(&message)
}

/// Write a command to a stream
pub fn write_command<W: Write>(writer: &mut W, command: &Command) -> Result<()> {
    let bytes = encode_command(command);
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}

/// Read a complete response from a stream
pub fn read_response<R: Read>(reader: &mut R) -> Result<Response> {
    let message = read_frame(reader, "response")?;
    decode_response(&message)
}

/// Write a response to a stream
pub fn write_response<W: Write>(writer: &mut W, response: &Response) -> Result<()> {
    let bytes = encode_response(response);
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}
