//! Wire model of the Lavalink websocket protocol.
//!
//! Inbound frames are decoded in two passes: [`decode`] first reads only the
//! `op` (and, for events, `type`) discriminators, then decodes the frame
//! into the matching structure. Frames with discriminators this client
//! does not know are kept as [`Operation::Unrecognized`] or
//! [`Event::Unknown`], so that newer nodes never break older clients.

pub mod command;
pub mod event;
pub mod stats;
pub mod track;

pub use self::{
    command::{Command, Filters},
    event::{Event, TrackEndReason},
    stats::Stats,
};

use self::event::*;
use crate::id::GuildId;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Error as JsonError, Value};
use std::{
    error::Error,
    fmt::{Display, Formatter, Result as FmtResult},
};

/// Snapshot of a player's playback progress, sent by its node.
///
/// `position`, `time`, and `connected` always arrive together and are
/// applied to a [`Player`] as one unit.
///
/// [`Player`]: crate::Player
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerState {
    /// Unix time at which the snapshot was taken, in milliseconds.
    pub time: u64,
    /// Position within the current track, in milliseconds.
    #[serde(default)]
    pub position: u64,
    /// Whether the node's voice connection is up.
    #[serde(default)]
    pub connected: bool,
    /// Round-trip latency of the node's voice connection, in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ping: Option<u64>,
}

/// A periodic progress report for one player.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerUpdate {
    /// Guild of the reporting player.
    pub guild_id: GuildId,
    /// The player's progress.
    pub state: PlayerState,
}

/// A decoded inbound frame.
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub enum Operation {
    /// Progress of one player.
    PlayerUpdate(PlayerUpdate),
    /// A playback event for one player.
    Event(Event),
    /// Load statistics of the node.
    Stats(Stats),
    /// A frame whose `op` this client does not recognise.
    Unrecognized(Unrecognized),
}

/// A frame whose `op` this client does not recognise.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Unrecognized {
    /// The frame's `op` discriminator, if it had a string one.
    pub op: Option<String>,
    /// The guild the frame concerns, if it could be read.
    pub guild_id: Option<GuildId>,
    /// The raw frame.
    pub data: String,
}

impl Operation {
    /// The guild this operation concerns, if any.
    #[must_use]
    pub fn guild_id(&self) -> Option<GuildId> {
        match self {
            Self::PlayerUpdate(u) => Some(u.guild_id),
            Self::Event(e) => e.guild_id(),
            Self::Stats(_) => None,
            Self::Unrecognized(u) => u.guild_id,
        }
    }

    /// Re-encodes this operation into a text frame.
    ///
    /// Unrecognized frames and unknown events are returned verbatim.
    pub fn encode(&self) -> Result<String, JsonError> {
        let (op, kind, body) = match self {
            Self::PlayerUpdate(u) => (OpKind::PLAYER_UPDATE, None, serde_json::to_value(u)?),
            Self::Stats(s) => (OpKind::STATS, None, serde_json::to_value(s)?),
            Self::Event(e) => {
                let body = match e {
                    Event::TrackStart(e) => serde_json::to_value(e)?,
                    Event::TrackEnd(e) => serde_json::to_value(e)?,
                    Event::TrackException(e) => serde_json::to_value(e)?,
                    Event::TrackStuck(e) => serde_json::to_value(e)?,
                    Event::WebSocketClosed(e) => serde_json::to_value(e)?,
                    Event::Unknown(e) => return Ok(e.data.clone()),
                };
                (OpKind::EVENT, Some(e.kind()), body)
            },
            Self::Unrecognized(u) => return Ok(u.data.clone()),
        };

        let mut frame = match body {
            Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };
        frame.insert("op".into(), op.into());
        if let Some(kind) = kind {
            frame.insert("type".into(), kind.into());
        }

        serde_json::to_string(&frame)
    }
}

/// Wire names of known operations.
struct OpKind;

impl OpKind {
    const PLAYER_UPDATE: &'static str = "playerUpdate";
    const EVENT: &'static str = "event";
    const STATS: &'static str = "stats";
}

#[derive(Deserialize)]
struct Discriminator {
    #[serde(default)]
    op: Option<Value>,
    #[serde(default, rename = "type")]
    kind: Option<Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GuildHint {
    #[serde(default)]
    guild_id: Option<Value>,
}

/// Decodes an inbound text frame.
///
/// Only frames which are not JSON objects, or whose known discriminators
/// are followed by malformed bodies, produce an error. Unknown
/// discriminators decode successfully.
pub fn decode(text: &str) -> Result<Operation, DecodeError> {
    let disc: Discriminator = serde_json::from_str(text).map_err(DecodeError::Discriminator)?;

    let op = match disc.op {
        Some(Value::String(op)) => op,
        other => return Ok(Operation::Unrecognized(unrecognized(text, other.map(|v| v.to_string())))),
    };

    Ok(match op.as_str() {
        OpKind::PLAYER_UPDATE => Operation::PlayerUpdate(body(text, &op)?),
        OpKind::STATS => Operation::Stats(body(text, &op)?),
        OpKind::EVENT => Operation::Event(match disc.kind.as_ref().and_then(Value::as_str) {
            Some(EventKind::TRACK_START) => Event::TrackStart(body(text, &op)?),
            Some(EventKind::TRACK_END) => Event::TrackEnd(body(text, &op)?),
            Some(EventKind::TRACK_EXCEPTION) => Event::TrackException(body(text, &op)?),
            Some(EventKind::TRACK_STUCK) => Event::TrackStuck(body(text, &op)?),
            Some(EventKind::WEBSOCKET_CLOSED) => Event::WebSocketClosed(body(text, &op)?),
            other => Event::Unknown(UnknownEvent {
                kind: other.unwrap_or_default().to_owned(),
                guild_id: guild_hint(text),
                data: text.to_owned(),
            }),
        }),
        _ => Operation::Unrecognized(unrecognized(text, Some(op))),
    })
}

fn body<T: DeserializeOwned>(text: &str, op: &str) -> Result<T, DecodeError> {
    serde_json::from_str(text).map_err(|source| DecodeError::Body {
        op: op.to_owned(),
        source,
    })
}

fn unrecognized(text: &str, op: Option<String>) -> Unrecognized {
    Unrecognized {
        op,
        guild_id: guild_hint(text),
        data: text.to_owned(),
    }
}

fn guild_hint(text: &str) -> Option<GuildId> {
    serde_json::from_str::<GuildHint>(text)
        .ok()?
        .guild_id
        .and_then(|v| serde_json::from_value(v).ok())
}

/// Errors encountered while decoding an inbound frame.
#[derive(Debug)]
#[non_exhaustive]
pub enum DecodeError {
    /// The frame was not a JSON object.
    Discriminator(JsonError),
    /// The frame had a known discriminator, but a malformed body.
    Body {
        /// The frame's `op`.
        op: String,
        /// Why the body was rejected.
        source: JsonError,
    },
}

impl Display for DecodeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Discriminator(e) => write!(f, "frame has no readable discriminator: {e}"),
            Self::Body { op, source } => write!(f, "malformed {op} frame: {source}"),
        }
    }
}

impl Error for DecodeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Discriminator(e) | Self::Body { source: e, .. } => Some(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::test_data::*;

    #[test]
    fn deserialize_player_update() {
        let op = decode(PLAYER_UPDATE).unwrap();

        assert_eq!(
            op,
            Operation::PlayerUpdate(PlayerUpdate {
                guild_id: GuildId::from(817_327_181_659_111_454),
                state: PlayerState {
                    time: 1_500_467_109,
                    position: 1000,
                    connected: true,
                    ping: Some(12),
                },
            })
        );
    }

    #[test]
    fn deserialize_stats() {
        match decode(STATS).unwrap() {
            Operation::Stats(stats) => {
                assert_eq!(stats.players, 3);
                assert_eq!(stats.playing_players, 2);
                assert_eq!(stats.frame_stats.map(|f| f.deficit), Some(-3010));
            },
            other => panic!("expected stats, got {other:?}"),
        }
    }

    #[test]
    fn deserialize_track_end() {
        match decode(TRACK_END).unwrap() {
            Operation::Event(Event::TrackEnd(end)) => {
                assert_eq!(end.reason, TrackEndReason::Finished);
                assert!(end.reason.may_start_next());
                assert!(end.track.encoded().starts_with("QAAA"));
            },
            other => panic!("expected track end, got {other:?}"),
        }
    }

    #[test]
    fn unknown_op_is_not_an_error() {
        match decode(UNKNOWN_OP).unwrap() {
            Operation::Unrecognized(u) => {
                assert_eq!(u.op.as_deref(), Some("segmentsLoaded"));
                assert_eq!(u.guild_id, Some(GuildId::from(817_327_181_659_111_454)));
                assert_eq!(u.data, UNKNOWN_OP);
            },
            other => panic!("expected unrecognized op, got {other:?}"),
        }
    }

    #[test]
    fn unknown_event_type_is_not_an_error() {
        let op = decode(UNKNOWN_EVENT).unwrap();

        match &op {
            Operation::Event(Event::Unknown(e)) => {
                assert_eq!(e.kind, "ChapterStartedEvent");
                assert_eq!(e.data, UNKNOWN_EVENT);
            },
            other => panic!("expected unknown event, got {other:?}"),
        }
        assert_eq!(op.guild_id(), Some(GuildId::from(817_327_181_659_111_454)));
    }

    #[test]
    fn missing_op_is_unrecognized() {
        let op = decode(r#"{"guildId": "5"}"#).unwrap();

        assert!(matches!(
            op,
            Operation::Unrecognized(Unrecognized { op: None, guild_id: Some(g), .. }) if g.get() == 5
        ));
    }

    #[test]
    fn unparsable_frames_fail() {
        assert!(matches!(decode("[1, 2"), Err(DecodeError::Discriminator(_))));
        assert!(matches!(decode("\"hello\""), Err(DecodeError::Discriminator(_))));
        assert!(matches!(
            decode(r#"{"op": "playerUpdate", "guildId": "1"}"#),
            Err(DecodeError::Body { .. })
        ));
    }

    #[test]
    fn stuck_accepts_legacy_spelling() {
        let op = decode(
            r#"{"op":"event","type":"TrackStuckEvent","guildId":"1","track":"x","threasholdMs":5000}"#,
        )
        .unwrap();

        assert!(matches!(op, Operation::Event(Event::TrackStuck(TrackStuck { threshold_ms: 5000, .. }))));
    }

    #[test]
    fn exception_message_prefers_structured_form() {
        let op = decode(
            r#"{"op":"event","type":"TrackExceptionEvent","guildId":"1","track":"x",
                "error":"old","exception":{"message":"new","severity":"COMMON","cause":"why"}}"#,
        )
        .unwrap();

        match op {
            Operation::Event(Event::TrackException(e)) => {
                assert_eq!(e.message(), Some("new"));
                assert_eq!(e.exception.map(|x| x.severity), Some(Severity::Common));
            },
            other => panic!("expected exception, got {other:?}"),
        }
    }

    #[test]
    fn known_frames_survive_reencoding() {
        for frame in [
            PLAYER_UPDATE,
            STATS,
            TRACK_START,
            TRACK_END,
            TRACK_EXCEPTION,
            TRACK_STUCK,
            WEBSOCKET_CLOSED,
            UNKNOWN_OP,
            UNKNOWN_EVENT,
        ] {
            let op = decode(frame).unwrap();
            let again = decode(&op.encode().unwrap()).unwrap();

            assert_eq!(op, again);
        }
    }

    #[test]
    fn unknown_end_reasons_are_tolerated() {
        let op = decode(
            r#"{"op":"event","type":"TrackEndEvent","guildId":"1","track":"x","reason":"EXPLODED"}"#,
        )
        .unwrap();

        let Operation::Event(Event::TrackEnd(end)) = &op else {
            panic!("expected track end, got {op:?}");
        };
        assert_eq!(end.reason, TrackEndReason::Unknown("EXPLODED".into()));
        assert!(!end.reason.may_start_next());

        let encoded: Value = serde_json::from_str(&op.encode().unwrap()).unwrap();
        assert_eq!(encoded["reason"], "EXPLODED");
    }
}
