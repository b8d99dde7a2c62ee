//! Commands sent from the client to a node.

use super::track::{self, Track};
use crate::id::GuildId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// An outbound command, tagged on the wire by its `op` field.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "camelCase")]
#[non_exhaustive]
pub enum Command {
    /// Start playing a track.
    Play(Play),
    /// Stop the current track.
    Stop(Stop),
    /// Pause or resume playback.
    Pause(Pause),
    /// Seek within the current track.
    Seek(Seek),
    /// Change the player's volume.
    Volume(Volume),
    /// Replace the player's audio filters.
    Filters(SetFilters),
    /// Destroy the player on the node.
    Destroy(Destroy),
    /// Forward Discord voice connection details to the node.
    VoiceUpdate(VoiceUpdate),
    /// Ask the node to hold this session open after a disconnect.
    ConfigureResuming(ConfigureResuming),
}

impl Command {
    /// The guild this command targets, if any.
    #[must_use]
    pub fn guild_id(&self) -> Option<GuildId> {
        Some(match self {
            Self::Play(c) => c.guild_id,
            Self::Stop(c) => c.guild_id,
            Self::Pause(c) => c.guild_id,
            Self::Seek(c) => c.guild_id,
            Self::Volume(c) => c.guild_id,
            Self::Filters(c) => c.guild_id,
            Self::Destroy(c) => c.guild_id,
            Self::VoiceUpdate(c) => c.guild_id,
            Self::ConfigureResuming(_) => return None,
        })
    }

    /// Serializes this command into a text frame.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

macro_rules! impl_from_command {
    ($($kind:ident),+) => {
        $(
            impl From<$kind> for Command {
                fn from(c: $kind) -> Self {
                    Self::$kind(c)
                }
            }
        )+
    };
}

impl_from_command!(Play, Stop, Pause, Seek, Volume, Destroy, VoiceUpdate, ConfigureResuming);

impl From<SetFilters> for Command {
    fn from(c: SetFilters) -> Self {
        Self::Filters(c)
    }
}

/// Start playing a track.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Play {
    /// Target guild.
    pub guild_id: GuildId,
    /// Track to play.
    #[serde(with = "track::encoded")]
    pub track: Track,
    /// Position to start at, in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<u64>,
    /// Position to stop at, in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<u64>,
    /// Volume to play at.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<u16>,
    /// Leave an already-playing track running, ignoring this command.
    #[serde(default)]
    pub no_replace: bool,
    /// Start the track paused.
    #[serde(default)]
    pub pause: bool,
}

/// Stop the current track.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stop {
    /// Target guild.
    pub guild_id: GuildId,
}

/// Pause or resume playback.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pause {
    /// Target guild.
    pub guild_id: GuildId,
    /// Whether playback should be paused.
    pub pause: bool,
}

/// Seek within the current track.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Seek {
    /// Target guild.
    pub guild_id: GuildId,
    /// New position, in milliseconds.
    pub position: u64,
}

/// Change the player's volume.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Volume {
    /// Target guild.
    pub guild_id: GuildId,
    /// New volume, from 0 to 1000.
    pub volume: u16,
}

/// Replace the player's audio filters.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetFilters {
    /// Target guild.
    pub guild_id: GuildId,
    /// The new filter set.
    #[serde(flatten)]
    pub filters: Filters,
}

/// Destroy the player on the node.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Destroy {
    /// Target guild.
    pub guild_id: GuildId,
}

/// Forward Discord voice connection details to the node.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceUpdate {
    /// Target guild.
    pub guild_id: GuildId,
    /// Session ID of the bot's voice state.
    pub session_id: String,
    /// Raw `VOICE_SERVER_UPDATE` payload received from Discord.
    pub event: Value,
}

/// Ask the node to hold this session open after a disconnect.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ConfigureResuming {
    /// Key the session may be resumed under.
    pub key: String,
    /// How long to hold the session, in seconds.
    pub timeout: u64,
}

/// An opaque set of audio filter settings.
///
/// Filters are built and interpreted by the host; each top-level key
/// (e.g. `volume`, `equalizer`, `timescale`) is forwarded as-is.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Filters(pub Map<String, Value>);

impl Filters {
    /// Sets one filter, replacing any earlier value under the same name.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, settings: Value) -> Self {
        self.0.insert(name.into(), settings);
        self
    }

    /// Returns whether no filters are set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn play_uses_wire_names() {
        let cmd = Command::from(Play {
            guild_id: GuildId::from(1),
            track: Track::from_encoded("QAAA"),
            start_time: Some(5000),
            end_time: None,
            volume: None,
            no_replace: true,
            pause: false,
        });

        let value: Value = serde_json::from_str(&cmd.encode().unwrap()).unwrap();

        assert_eq!(
            value,
            json!({
                "op": "play",
                "guildId": "1",
                "track": "QAAA",
                "startTime": 5000,
                "noReplace": true,
                "pause": false,
            })
        );
    }

    #[test]
    fn filters_are_flattened_into_the_command() {
        let filters = Filters::default()
            .with("volume", json!(0.5))
            .with("timescale", json!({"speed": 1.25}));
        let cmd = Command::from(SetFilters {
            guild_id: GuildId::from(7),
            filters,
        });

        let value: Value = serde_json::from_str(&cmd.encode().unwrap()).unwrap();

        assert_eq!(value["op"], "filters");
        assert_eq!(value["guildId"], "7");
        assert_eq!(value["timescale"]["speed"], 1.25);
    }

    #[test]
    fn configure_resuming_has_no_guild() {
        let cmd = Command::from(ConfigureResuming {
            key: "abc".into(),
            timeout: 60,
        });

        assert_eq!(cmd.guild_id(), None);
        assert_eq!(
            cmd.encode().unwrap(),
            r#"{"op":"configureResuming","key":"abc","timeout":60}"#
        );
    }

    #[test]
    fn voice_update_round_trips() {
        let cmd = Command::from(VoiceUpdate {
            guild_id: GuildId::from(3),
            session_id: "sess".into(),
            event: json!({"token": "t", "endpoint": "e", "guild_id": "3"}),
        });

        let decoded: Command = serde_json::from_str(&cmd.encode().unwrap()).unwrap();

        assert_eq!(decoded, cmd);
    }
}
