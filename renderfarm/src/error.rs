use thiserror::Error;

use crate::wire::MAX_BLOCK_LEN;

/// Errors of the render farm protocol
///
/// Only `Io`, `LineTooLong` and `ConnectionClosed` end a connection on the
/// worker side, everything else is logged and the offending command is
/// dropped.
#[derive(Debug, Error)]
pub enum FarmError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot serialize block: {0}")]
    Encode(#[from] bincode::error::EncodeError),

    #[error("cannot deserialize block: {0}")]
    Decode(#[from] bincode::error::DecodeError),

    #[error("cannot decompress block: {0}")]
    Compression(#[from] lz4_flex::block::DecompressError),

    #[error("block of {0} bytes exceeds the limit of {MAX_BLOCK_LEN} bytes")]
    BlockTooLarge(u64),

    #[error("malformed arguments for {command}: {reason}")]
    MalformedArguments {
        command: &'static str,
        reason: String,
    },

    #[error("unknown command '{0}'")]
    UnknownCommand(String),

    #[error("unsupported film type for server rendering: {0}")]
    UnsupportedFilm(String),

    #[error("commands '{first}' and '{second}' share hash {hash}")]
    HashCollision {
        first: &'static str,
        second: &'static str,
        hash: u32,
    },

    #[error("text line longer than {0} bytes")]
    LineTooLong(usize),

    #[error("connection closed by peer")]
    ConnectionClosed,

    #[error("unexpected handshake reply '{0}'")]
    Handshake(String),

    #[error("worker is busy with another session")]
    Busy,

    #[error("no active session")]
    NoSession,

    #[error("render engine failed: {0}")]
    EngineFailed(String),

    #[error("cannot merge film {0}x{1} into film {2}x{3}")]
    FilmMismatch(u32, u32, u32, u32),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl FarmError {
    /// Error leaves the stream in an unknown position, connection must be dropped
    pub fn is_fatal_for_connection(&self) -> bool {
        matches!(
            self,
            FarmError::Io(_) | FarmError::LineTooLong(_) | FarmError::ConnectionClosed
        )
    }

    pub(crate) fn malformed(command: &'static str, reason: impl Into<String>) -> FarmError {
        FarmError::MalformedArguments {
            command,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, FarmError>;
