//! Error types for energy controller protocol operations.

use crate::commands::{Arity, Command};
use thiserror::Error;

/// Result type alias for energy controller operations.
pub type Result<T> = std::result::Result<T, EnergyError>;

/// Error types for energy controller communication.
#[derive(Error, Debug)]
pub enum EnergyError {
    /// Serial port communication error
    #[error("Serial port error: {0}")]
    SerialPort(#[from] serialport::Error),

    /// General I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// No complete reply within the read timeout
    #[error("Communication timeout")]
    Timeout,

    /// Reply bytes could not be parsed as an integer
    #[error("Malformed reply: {reply:?}")]
    MalformedReply {
        /// Reply text as received, terminator stripped
        reply: String,
    },

    /// Argument count does not match the catalog entry
    #[error("{command} takes {expected}, got {supplied} argument(s)")]
    ArityMismatch {
        /// Command being encoded
        command: Command,
        /// Arity declared by the catalog
        expected: Arity,
        /// Number of arguments supplied by the caller
        supplied: usize,
    },

    /// A new command was issued before the previous reply was read
    #[error("Reply to {pending} still pending")]
    ReplyPending {
        /// Command whose reply has not been read yet
        pending: Command,
    },

    /// Code byte does not belong to the command catalog
    #[error("Unknown command code: {0:#04x}")]
    UnknownCommand(u8),

    /// Numeric reply outside of an enum decode table
    #[error("Unknown {kind} value: {value}")]
    UnknownValue {
        /// Name of the decode table
        kind: &'static str,
        /// Value received
        value: i32,
    },

    /// Peer reports a different API version than this host
    #[error("API version mismatch: host {host}, peer {peer}")]
    ProtocolVersionMismatch {
        /// Version implemented by this library
        host: i32,
        /// Version reported by the energy controller
        peer: i32,
    },
}
