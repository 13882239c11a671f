//! Command definitions
//!
//! Represents commands from clients.

use crate::session::AccessMode;

/// Command types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CommandType {
    Open = 0x01,
    Read = 0x02,
    Write = 0x03,
    Release = 0x04,
    Reset = 0x05,
    Stat = 0x06,
    Ping = 0x07,
}

/// A parsed command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Open a session on a device (replaces any open session)
    Open {
        device: u32,
        mode: AccessMode,
        truncate: bool,
    },

    /// Read up to `max_len` bytes at the session cursor
    Read { max_len: u32 },

    /// Write at the session cursor (one quantum at most lands)
    Write { data: Vec<u8> },

    /// Close the open session
    Release,

    /// Reset a device directly
    Reset { device: u32 },

    /// Fetch device stats
    Stat { device: u32 },

    /// Ping (health check)
    Ping,
}

impl Command {
    /// Get the command type
    pub fn command_type(&self) -> CommandType {
        match self {
            Command::Open { .. } => CommandType::Open,
            Command::Read { .. } => CommandType::Read,
            Command::Write { .. } => CommandType::Write,
            Command::Release => CommandType::Release,
            Command::Reset { .. } => CommandType::Reset,
            Command::Stat { .. } => CommandType::Stat,
            Command::Ping => CommandType::Ping,
        }
    }
}
