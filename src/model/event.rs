//! Playback lifecycle events pushed by a node.

use super::track::{self, Track};
use crate::id::GuildId;
use serde::{Deserialize, Serialize};

/// A playback event reported by a node for a single guild.
///
/// Event frames carry a nested `type` discriminator; types this client
/// does not know are kept as [`Event::Unknown`] rather than rejected.
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub enum Event {
    /// A track began playing.
    TrackStart(TrackStart),
    /// A track stopped playing.
    TrackEnd(TrackEnd),
    /// A track threw an exception during playback.
    TrackException(TrackException),
    /// A track failed to provide audio for longer than a threshold.
    TrackStuck(TrackStuck),
    /// The node's voice connection to Discord was closed.
    ///
    /// This concerns the remote audio session, not the client's own
    /// connection to the node.
    WebSocketClosed(WebSocketClosed),
    /// An event type added in a newer protocol version.
    Unknown(UnknownEvent),
}

impl Event {
    /// The guild this event concerns, if known.
    #[must_use]
    pub fn guild_id(&self) -> Option<GuildId> {
        Some(match self {
            Self::TrackStart(e) => e.guild_id,
            Self::TrackEnd(e) => e.guild_id,
            Self::TrackException(e) => e.guild_id,
            Self::TrackStuck(e) => e.guild_id,
            Self::WebSocketClosed(e) => e.guild_id,
            Self::Unknown(e) => return e.guild_id,
        })
    }

    /// The wire name of this event's type.
    #[must_use]
    pub fn kind(&self) -> &str {
        match self {
            Self::TrackStart(_) => EventKind::TRACK_START,
            Self::TrackEnd(_) => EventKind::TRACK_END,
            Self::TrackException(_) => EventKind::TRACK_EXCEPTION,
            Self::TrackStuck(_) => EventKind::TRACK_STUCK,
            Self::WebSocketClosed(_) => EventKind::WEBSOCKET_CLOSED,
            Self::Unknown(e) => &e.kind,
        }
    }
}

/// Wire names of known event types.
pub(crate) struct EventKind;

impl EventKind {
    pub(crate) const TRACK_START: &'static str = "TrackStartEvent";
    pub(crate) const TRACK_END: &'static str = "TrackEndEvent";
    pub(crate) const TRACK_EXCEPTION: &'static str = "TrackExceptionEvent";
    pub(crate) const TRACK_STUCK: &'static str = "TrackStuckEvent";
    pub(crate) const WEBSOCKET_CLOSED: &'static str = "WebSocketClosedEvent";
}

/// A track began playing.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackStart {
    /// Guild whose player started the track.
    pub guild_id: GuildId,
    /// The track which started.
    #[serde(with = "track::encoded")]
    pub track: Track,
}

/// A track stopped playing.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackEnd {
    /// Guild whose player ended the track.
    pub guild_id: GuildId,
    /// The track which ended.
    #[serde(with = "track::encoded")]
    pub track: Track,
    /// Why playback ended.
    pub reason: TrackEndReason,
}

/// Why a track stopped playing.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(from = "String", into = "String")]
#[non_exhaustive]
pub enum TrackEndReason {
    /// The track played to completion.
    Finished,
    /// The track could not be loaded.
    LoadFailed,
    /// The track was stopped by a `stop` command.
    Stopped,
    /// The track was replaced by a `play` command.
    Replaced,
    /// The player was cleaned up by the node.
    Cleanup,
    /// A reason added in a newer protocol version, as sent.
    Unknown(String),
}

impl TrackEndReason {
    /// Whether the host may reasonably start the next queued track.
    #[must_use]
    pub fn may_start_next(&self) -> bool {
        matches!(self, Self::Finished | Self::LoadFailed)
    }

    /// The wire name of this reason.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Finished => "FINISHED",
            Self::LoadFailed => "LOAD_FAILED",
            Self::Stopped => "STOPPED",
            Self::Replaced => "REPLACED",
            Self::Cleanup => "CLEANUP",
            Self::Unknown(reason) => reason,
        }
    }
}

impl From<String> for TrackEndReason {
    fn from(reason: String) -> Self {
        match reason.as_str() {
            "FINISHED" => Self::Finished,
            "LOAD_FAILED" => Self::LoadFailed,
            "STOPPED" => Self::Stopped,
            "REPLACED" => Self::Replaced,
            "CLEANUP" => Self::Cleanup,
            _ => Self::Unknown(reason),
        }
    }
}

impl From<TrackEndReason> for String {
    fn from(reason: TrackEndReason) -> Self {
        match reason {
            TrackEndReason::Unknown(reason) => reason,
            known => known.as_str().to_owned(),
        }
    }
}

/// A track threw an exception during playback.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackException {
    /// Guild whose player hit the exception.
    pub guild_id: GuildId,
    /// The track which failed.
    #[serde(with = "track::encoded")]
    pub track: Track,
    /// Details of the failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception: Option<FriendlyException>,
    /// Failure message, as sent by older nodes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TrackException {
    /// The best available description of the failure.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.exception
            .as_ref()
            .and_then(|e| e.message.as_deref())
            .or(self.error.as_deref())
    }
}

/// A failure reported by a node, while playing or loading tracks.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendlyException {
    /// Human-readable description of the failure.
    #[serde(default)]
    pub message: Option<String>,
    /// How serious the failure is.
    pub severity: Severity,
    /// Underlying cause, usually a Java exception.
    #[serde(default)]
    pub cause: Option<String>,
}

/// Seriousness of a [`FriendlyException`].
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    /// Expected failure, such as an unavailable video.
    Common,
    /// Failure of unknown origin, possibly a source-side change.
    Suspicious,
    /// Failure inside the node itself.
    Fault,
}

/// A track failed to provide audio for longer than a threshold.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackStuck {
    /// Guild whose player is stuck.
    pub guild_id: GuildId,
    /// The track which is stuck.
    #[serde(with = "track::encoded")]
    pub track: Track,
    /// How long the track has been stuck, in milliseconds.
    #[serde(alias = "threasholdMs")]
    pub threshold_ms: u64,
}

/// The node's voice connection to Discord was closed.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebSocketClosed {
    /// Guild whose voice connection closed.
    pub guild_id: GuildId,
    /// Discord close code.
    pub code: u16,
    /// Close reason given by Discord, if any.
    #[serde(default)]
    pub reason: String,
    /// Whether Discord, rather than the node, closed the connection.
    pub by_remote: bool,
}

/// An event of a type this client does not recognise.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct UnknownEvent {
    /// The event's `type` discriminator.
    pub kind: String,
    /// The guild the event concerns, if it could be read.
    pub guild_id: Option<GuildId>,
    /// The raw frame.
    pub data: String,
}
