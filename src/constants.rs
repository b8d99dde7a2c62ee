//! Constants affecting node connection handling and protocol defaults.

use std::time::Duration;

/// Name reported to nodes in the `Client-Name` handshake header.
pub const CLIENT_NAME: &str = env!("CARGO_PKG_NAME");

/// Version reported to nodes in the `Client-Name` handshake header.
pub const CLIENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Delay before the first reconnect attempt after a node drops.
pub const RECONNECT_MIN_DELAY: Duration = Duration::from_secs(1);

/// Upper bound on the delay between consecutive reconnect attempts.
pub const RECONNECT_MAX_DELAY: Duration = Duration::from_secs(60);

/// How long a node should hold a session open for resumption, if a
/// resume key is configured.
pub const DEFAULT_RESUME_TIMEOUT: Duration = Duration::from_secs(60);

/// Default player volume, as a percentage.
pub const DEFAULT_VOLUME: u16 = 100;

/// Largest volume a node will accept.
pub const MAX_VOLUME: u16 = 1000;

#[cfg(test)]
/// Sample frames shared by unit tests.
pub mod test_data {
    /// A `playerUpdate` frame, as sent by a node every few seconds.
    pub const PLAYER_UPDATE: &str = r#"{
        "op": "playerUpdate",
        "guildId": "817327181659111454",
        "state": {"time": 1500467109, "position": 1000, "connected": true, "ping": 12}
    }"#;

    /// A `stats` frame including frame statistics.
    pub const STATS: &str = r#"{
        "op": "stats",
        "players": 3,
        "playingPlayers": 2,
        "uptime": 123456789,
        "memory": {"free": 123, "used": 456, "allocated": 789, "reservable": 1000},
        "cpu": {"cores": 4, "systemLoad": 0.5, "lavalinkLoad": 0.25},
        "frameStats": {"sent": 6000, "nulled": 10, "deficit": -3010}
    }"#;

    /// A `TrackEndEvent` frame.
    pub const TRACK_END: &str = r#"{
        "op": "event",
        "type": "TrackEndEvent",
        "guildId": "817327181659111454",
        "track": "QAAAjQIAJVJpY2sgQXN0bGV5IC0gTmV2ZXIgR29ubmEgR2l2ZSBZb3UgVXA=",
        "reason": "FINISHED"
    }"#;

    /// A `TrackStartEvent` frame.
    pub const TRACK_START: &str = r#"{
        "op": "event",
        "type": "TrackStartEvent",
        "guildId": "817327181659111454",
        "track": "QAAAjQIAJVJpY2sgQXN0bGV5IC0gTmV2ZXIgR29ubmEgR2l2ZSBZb3UgVXA="
    }"#;

    /// A `TrackExceptionEvent` frame in the structured form.
    pub const TRACK_EXCEPTION: &str = r#"{
        "op": "event",
        "type": "TrackExceptionEvent",
        "guildId": "817327181659111454",
        "track": "QAAAjQIAJVJpY2sgQXN0bGV5IC0gTmV2ZXIgR29ubmEgR2l2ZSBZb3UgVXA=",
        "exception": {"message": "Video unavailable", "severity": "COMMON", "cause": "Removed"}
    }"#;

    /// A `TrackStuckEvent` frame.
    pub const TRACK_STUCK: &str = r#"{
        "op": "event",
        "type": "TrackStuckEvent",
        "guildId": "817327181659111454",
        "track": "QAAAjQIAJVJpY2sgQXN0bGV5IC0gTmV2ZXIgR29ubmEgR2l2ZSBZb3UgVXA=",
        "thresholdMs": 10000
    }"#;

    /// A `WebSocketClosedEvent` frame.
    pub const WEBSOCKET_CLOSED: &str = r#"{
        "op": "event",
        "type": "WebSocketClosedEvent",
        "guildId": "817327181659111454",
        "code": 4006,
        "reason": "Your session is no longer valid.",
        "byRemote": true
    }"#;

    /// A frame with an operation this client has never heard of.
    pub const UNKNOWN_OP: &str = r#"{"op": "segmentsLoaded", "guildId": "817327181659111454", "segments": []}"#;

    /// An event frame with a type this client has never heard of.
    pub const UNKNOWN_EVENT: &str = r#"{
        "op": "event",
        "type": "ChapterStartedEvent",
        "guildId": "817327181659111454",
        "chapter": {"name": "Intro", "start": 0}
    }"#;
}
