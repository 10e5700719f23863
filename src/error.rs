use serde::{de::Error as DeError, ser::Error as SerError};
use std::num::TryFromIntError;
use std::str::Utf8Error;

use thiserror::*;

use crate::{channel::ChannelID, peer::PeerID};

pub type Result<T> = std::result::Result<T, RelayError>;

/// An error coming from the underlying message transport
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Transport is not ready")]
    NotReady,

    #[error("No authority is connected")]
    NoAuthority,

    #[error("Unknown peer: {0}")]
    UnknownPeer(PeerID),

    #[error("Peer disconnected: {0}")]
    Disconnected(PeerID),

    #[error("Send queue of peer {0} is full")]
    QueueFull(PeerID),

    #[error("Peer id already connected: {0}")]
    DuplicatePeer(PeerID),

    #[error("Host is full ({0} peers)")]
    HostFull(usize),
}

/// An error for a relay channel
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Encoding error: {0}")]
    Encoding(#[from] EncodingError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("{owner}: channel {channel_id} was instanced more than once (already owned by {current})")]
    AlreadyInstanced {
        channel_id: ChannelID,
        owner: String,
        current: String,
    },

    #[error("{0}: channel created too early, the transport is not ready")]
    TransportNotReady(String),

    #[error("{owner}: only the authority can {operation}")]
    NotAuthority {
        owner: String,
        operation: &'static str,
    },

    #[error("Channel {0} is disposed")]
    Disposed(ChannelID),

    #[error("Bad config: {0}")]
    BadConfig(String),
}

impl RelayError {
    /// Configuration errors are programming mistakes the application should not tolerate.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            RelayError::AlreadyInstanced { .. }
                | RelayError::TransportNotReady(_)
                | RelayError::NotAuthority { .. }
                | RelayError::BadConfig(_)
        )
    }
}

/// An error that happens during encoding
#[derive(Error, Debug)]
pub enum EncodingError {
    #[error("Not enough data, {0} < {1}")]
    NotEnoughData(usize, usize),
    #[error("Invalid string data")]
    BadUtf8(#[from] Utf8Error),
    #[error("Invalid integer conversion")]
    IntConversion(#[from] TryFromIntError),
    #[error("Invalid char value {0:#x}")]
    BadChar(u32),
    #[error("Unexpected type tag {0:#04x}")]
    UnexpectedTag(u8),
    #[error("Unsupported wire version {0}")]
    UnsupportedVersion(u8),
    #[error("Sequence length must be known up front")]
    UnknownLength,
    #[error("Nesting deeper than {0}")]
    TooDeep(usize),
    #[error("Message too large: {0} > {1}")]
    TooLarge(usize, usize),
    #[error("{0} trailing bytes")]
    TrailingBytes(usize),
    #[error("Serde error: {0}")]
    Custom(String),
}

impl SerError for EncodingError {
    fn custom<T>(msg: T) -> Self
    where
        T: std::fmt::Display,
    {
        EncodingError::Custom(msg.to_string())
    }
}

impl DeError for EncodingError {
    fn custom<T>(msg: T) -> Self
    where
        T: std::fmt::Display,
    {
        EncodingError::Custom(msg.to_string())
    }
}
