use std::fmt;

/// Lifecycle state of a [`Node`]'s connection.
///
/// ```text
/// Disconnected -> Connecting -> Connected
///       ^              ^            |
///       |              |            | (read error)
///       |         Reconnecting <----+
///       +-------------------------- (close, or retries exhausted)
/// ```
///
/// [`Node`]: super::Node
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum NodeStatus {
    /// No connection is open, and none is being attempted.
    #[default]
    Disconnected,
    /// A handshake is in progress.
    Connecting,
    /// The connection is open.
    Connected,
    /// The connection dropped, and a reconnect attempt is scheduled.
    Reconnecting,
}

impl NodeStatus {
    /// Returns whether a connection attempt is underway or pending.
    #[must_use]
    pub fn is_pending(self) -> bool {
        matches!(self, Self::Connecting | Self::Reconnecting)
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
        })
    }
}
