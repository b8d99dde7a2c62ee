//! Node, player, and node-selection error handling.
//!
//! Failures of an already-open connection are recovered by the node's
//! reconnect loop and only ever show up in logs. The types here cover the
//! failures a host can observe directly: commands which could not be written,
//! and requests for a node when none is available.

use serde_json::Error as JsonError;
use std::{error::Error as StdError, fmt};
use tokio_tungstenite::tungstenite::{
    error::Error as TungsteniteError,
    http::header::InvalidHeaderValue,
};
use url::ParseError;

pub use crate::model::{track::TrackDecodeError, DecodeError};

/// Errors encountered while opening, or writing to, a node's connection.
#[derive(Debug)]
#[non_exhaustive]
pub enum NodeError {
    /// The node has no open connection to write to.
    NotConnected,
    /// The node was closed while a connection attempt was in flight.
    Closed,
    /// The node's host and port did not form a valid URL.
    Url(ParseError),
    /// A handshake header (secret, user ID, client name, or resume key)
    /// contained characters which are illegal in HTTP headers.
    Header(InvalidHeaderValue),
    /// Error communicating with the node over WebSocket.
    Ws(TungsteniteError),
    /// A command could not be serialized.
    Json(JsonError),
}

impl From<ParseError> for NodeError {
    fn from(e: ParseError) -> Self {
        NodeError::Url(e)
    }
}

impl From<InvalidHeaderValue> for NodeError {
    fn from(e: InvalidHeaderValue) -> Self {
        NodeError::Header(e)
    }
}

impl From<TungsteniteError> for NodeError {
    fn from(e: TungsteniteError) -> Self {
        NodeError::Ws(e)
    }
}

impl From<JsonError> for NodeError {
    fn from(e: JsonError) -> Self {
        NodeError::Json(e)
    }
}

impl fmt::Display for NodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node connection failed: ")?;
        match self {
            NodeError::NotConnected => write!(f, "no open connection"),
            NodeError::Closed => write!(f, "node was closed during connection attempt"),
            NodeError::Url(e) => write!(f, "invalid node address ({e})"),
            NodeError::Header(e) => write!(f, "invalid handshake header ({e})"),
            NodeError::Ws(e) => write!(f, "websocket issue ({e})"),
            NodeError::Json(e) => write!(f, "could not serialize command ({e})"),
        }
    }
}

impl StdError for NodeError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            NodeError::NotConnected | NodeError::Closed => None,
            NodeError::Url(e) => Some(e),
            NodeError::Header(e) => Some(e),
            NodeError::Ws(e) => Some(e),
            NodeError::Json(e) => Some(e),
        }
    }
}

/// Convenience type for node connection error handling.
pub type NodeResult<T> = Result<T, NodeError>;

/// Error returned when no node can be chosen for new work.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum SelectError {
    /// No registered node is currently connected.
    NoAvailableNode,
}

impl fmt::Display for SelectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectError::NoAvailableNode => write!(f, "no node is available"),
        }
    }
}

impl StdError for SelectError {}

/// Errors returned when issuing commands through a [`Player`].
///
/// [`Player`]: crate::Player
#[derive(Debug)]
#[non_exhaustive]
pub enum PlayerError {
    /// The player is not bound to a node, or its node has been removed.
    NoNode,
    /// The player's node could not deliver the command.
    Node(NodeError),
}

impl From<NodeError> for PlayerError {
    fn from(e: NodeError) -> Self {
        PlayerError::Node(e)
    }
}

impl fmt::Display for PlayerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to control player: ")?;
        match self {
            PlayerError::NoNode => write!(f, "player has no node"),
            PlayerError::Node(e) => write!(f, "{e}"),
        }
    }
}

impl StdError for PlayerError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            PlayerError::NoNode => None,
            PlayerError::Node(e) => Some(e),
        }
    }
}

/// Convenience type for player command error handling.
pub type PlayerResult<T> = Result<T, PlayerError>;
