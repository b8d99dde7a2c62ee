use crate::{
    model::{
        event::{TrackEnd, TrackException, TrackStart, TrackStuck, WebSocketClosed},
        PlayerState,
    },
    Player,
};
use std::sync::Arc;

/// Information about which player fired an event, and what happened.
///
/// Contexts borrow from the frame being processed; handlers should clone
/// out anything they need to keep.
#[derive(Debug)]
#[non_exhaustive]
pub enum EventContext<'a> {
    /// The node reported the player's progress.
    ///
    /// Fired after the new state has been applied to the player.
    PlayerUpdate {
        /// The updated player.
        player: &'a Arc<Player>,
        /// The newly applied state.
        state: &'a PlayerState,
    },
    /// A track began playing.
    ///
    /// Fired after the track has become the player's current track.
    TrackStart {
        /// The player which started the track.
        player: &'a Arc<Player>,
        /// Event details.
        event: &'a TrackStart,
    },
    /// A track stopped playing.
    ///
    /// The player's current track is left untouched; hosts decide what
    /// to play next.
    TrackEnd {
        /// The player which ended the track.
        player: &'a Arc<Player>,
        /// Event details.
        event: &'a TrackEnd,
    },
    /// A track threw an exception during playback.
    TrackException {
        /// The player which hit the exception.
        player: &'a Arc<Player>,
        /// Event details.
        event: &'a TrackException,
    },
    /// A track failed to provide audio for longer than a threshold.
    TrackStuck {
        /// The stuck player.
        player: &'a Arc<Player>,
        /// Event details.
        event: &'a TrackStuck,
    },
    /// The node's voice connection to Discord was closed.
    WebSocketClosed {
        /// The player whose voice connection closed.
        player: &'a Arc<Player>,
        /// Event details.
        event: &'a WebSocketClosed,
    },
}

impl<'a> EventContext<'a> {
    /// The player this event concerns.
    #[must_use]
    pub fn player(&self) -> &'a Arc<Player> {
        match self {
            Self::PlayerUpdate { player, .. }
            | Self::TrackStart { player, .. }
            | Self::TrackEnd { player, .. }
            | Self::TrackException { player, .. }
            | Self::TrackStuck { player, .. }
            | Self::WebSocketClosed { player, .. } => player,
        }
    }
}
