//! Local mirror of a guild's playback session on a node.

use crate::{
    constants::{DEFAULT_VOLUME, MAX_VOLUME},
    error::{PlayerError, PlayerResult},
    events::{EventContext, EventHandler, EventStore},
    id::GuildId,
    model::{
        command::{Command, Destroy, Pause, Play, Seek, SetFilters, Stop, VoiceUpdate, Volume},
        Event,
        Filters,
        Operation,
        PlayerState,
    },
    node::Node,
    Track,
};
use parking_lot::RwLock;
use serde_json::Value;
use std::{
    sync::{Arc, Weak},
    time::{SystemTime, UNIX_EPOCH},
};
use tracing::{debug, trace};

/// Point-in-time copy of a [`Player`]'s state.
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub struct PlayerSnapshot {
    /// The track most recently started, or `None` if stopped.
    pub track: Option<Track>,
    /// Whether playback is paused.
    pub paused: bool,
    /// Playback volume, from 0 to 1000.
    pub volume: u16,
    /// Active audio filters.
    pub filters: Filters,
    /// Progress last reported by the node.
    pub state: PlayerState,
}

impl Default for PlayerSnapshot {
    fn default() -> Self {
        Self {
            track: None,
            paused: false,
            volume: DEFAULT_VOLUME,
            filters: Filters::default(),
            state: PlayerState::default(),
        }
    }
}

/// Options for [`Player::play_with`].
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct PlayOptions {
    /// Position to start at, in milliseconds.
    pub start_time: Option<u64>,
    /// Position to stop at, in milliseconds.
    pub end_time: Option<u64>,
    /// Volume to play at.
    pub volume: Option<u16>,
    /// Leave an already-playing track running.
    pub no_replace: bool,
    /// Start the track paused.
    pub pause: bool,
}

impl PlayOptions {
    /// Sets the position to start at, in milliseconds.
    #[must_use]
    pub fn start_time(mut self, start_time: u64) -> Self {
        self.start_time = Some(start_time);
        self
    }

    /// Sets the position to stop at, in milliseconds.
    #[must_use]
    pub fn end_time(mut self, end_time: u64) -> Self {
        self.end_time = Some(end_time);
        self
    }

    /// Sets the volume to play at.
    #[must_use]
    pub fn volume(mut self, volume: u16) -> Self {
        self.volume = Some(volume.min(MAX_VOLUME));
        self
    }

    /// Sets whether an already-playing track should be left running.
    #[must_use]
    pub fn no_replace(mut self, no_replace: bool) -> Self {
        self.no_replace = no_replace;
        self
    }

    /// Sets whether the track should start paused.
    #[must_use]
    pub fn pause(mut self, pause: bool) -> Self {
        self.pause = pause;
        self
    }
}

#[derive(Clone, Debug)]
struct NodeRef {
    name: String,
    node: Weak<Node>,
}

/// Mirror of one guild's player on a node.
///
/// Players are created through [`Lavalink::player`], and live until the
/// host removes them with [`Lavalink::remove_player`]. Each player is
/// bound to one node at a time; only frames from that node update it.
///
/// [`Lavalink::player`]: crate::Lavalink::player
/// [`Lavalink::remove_player`]: crate::Lavalink::remove_player
#[derive(Debug)]
pub struct Player {
    guild_id: GuildId,
    node: RwLock<Option<NodeRef>>,
    state: RwLock<PlayerSnapshot>,
    events: EventStore,
}

impl Player {
    pub(crate) fn new(guild_id: GuildId, node: Option<&Arc<Node>>) -> Self {
        Self {
            guild_id,
            node: RwLock::new(node.map(|n| NodeRef {
                name: n.name().to_owned(),
                node: Arc::downgrade(n),
            })),
            state: RwLock::default(),
            events: EventStore::new(),
        }
    }

    /// The guild this player belongs to.
    #[must_use]
    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    /// The node this player is bound to, if it still exists.
    #[must_use]
    pub fn node(&self) -> Option<Arc<Node>> {
        self.node.read().as_ref().and_then(|n| n.node.upgrade())
    }

    /// Name of the node this player is bound to.
    #[must_use]
    pub fn node_name(&self) -> Option<String> {
        self.node.read().as_ref().map(|n| n.name.clone())
    }

    /// Returns whether this player is bound to exactly `node`.
    pub(crate) fn is_bound_to(&self, node: &Node) -> bool {
        self.node
            .read()
            .as_ref()
            .map_or(false, |n| std::ptr::eq(n.node.as_ptr(), node))
    }

    /// Binds this player to another node.
    ///
    /// The host is responsible for recreating playback on the new node,
    /// e.g., by resending its voice update and current track.
    pub fn set_node(&self, node: &Arc<Node>) {
        debug!(
            "Moving player for guild {} to node {}.",
            self.guild_id,
            node.name()
        );

        *self.node.write() = Some(NodeRef {
            name: node.name().to_owned(),
            node: Arc::downgrade(node),
        });
    }

    /// Returns a copy of this player's current state.
    #[must_use]
    pub fn snapshot(&self) -> PlayerSnapshot {
        self.state.read().clone()
    }

    /// The track most recently started, if any.
    #[must_use]
    pub fn track(&self) -> Option<Track> {
        self.state.read().track.clone()
    }

    /// Whether playback is paused.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.state.read().paused
    }

    /// Playback volume, from 0 to 1000.
    #[must_use]
    pub fn volume(&self) -> u16 {
        self.state.read().volume
    }

    /// Active audio filters.
    #[must_use]
    pub fn filters(&self) -> Filters {
        self.state.read().filters.clone()
    }

    /// Progress last reported by the node.
    #[must_use]
    pub fn state(&self) -> PlayerState {
        self.state.read().state
    }

    /// Estimated current position within the track, in milliseconds.
    ///
    /// While playing, this extrapolates from the last reported position by
    /// the wall time since it was captured, up to the track's length.
    #[must_use]
    pub fn position(&self) -> u64 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX));

        self.state.read().estimate_position(now)
    }

    /// Adds an event handler which only hears events for this player.
    pub fn add_event<H: EventHandler + 'static>(&self, handler: H) {
        self.events.add_event(handler);
    }

    /// Removes all of this player's own event handlers.
    pub fn remove_all_events(&self) {
        self.events.clear();
    }

    fn bound_node(&self) -> PlayerResult<Arc<Node>> {
        self.node().ok_or(PlayerError::NoNode)
    }

    async fn send(&self, command: Command) -> PlayerResult<()> {
        self.bound_node()?.send(&command).await?;
        Ok(())
    }

    /// Plays a track, replacing the current one.
    pub async fn play(&self, track: Track) -> PlayerResult<()> {
        self.play_with(track, PlayOptions::default()).await
    }

    /// Plays a track with extra options.
    pub async fn play_with(&self, track: Track, options: PlayOptions) -> PlayerResult<()> {
        let volume = options.volume.map(|v| v.min(MAX_VOLUME));

        self.send(
            Play {
                guild_id: self.guild_id,
                track: track.clone(),
                start_time: options.start_time,
                end_time: options.end_time,
                volume,
                no_replace: options.no_replace,
                pause: options.pause,
            }
            .into(),
        )
        .await?;

        let mut state = self.state.write();
        if !(options.no_replace && state.track.is_some()) {
            state.track = Some(track);
            state.paused = options.pause;
            state.state.position = options.start_time.unwrap_or(0);
        }
        if let Some(volume) = volume {
            state.volume = volume;
        }

        Ok(())
    }

    /// Stops the current track.
    pub async fn stop(&self) -> PlayerResult<()> {
        self.send(
            Stop {
                guild_id: self.guild_id,
            }
            .into(),
        )
        .await?;

        self.state.write().track = None;

        Ok(())
    }

    /// Pauses or unpauses playback.
    pub async fn set_pause(&self, pause: bool) -> PlayerResult<()> {
        self.send(
            Pause {
                guild_id: self.guild_id,
                pause,
            }
            .into(),
        )
        .await?;

        self.state.write().paused = pause;

        Ok(())
    }

    /// Pauses playback.
    pub async fn pause(&self) -> PlayerResult<()> {
        self.set_pause(true).await
    }

    /// Resumes playback.
    pub async fn resume(&self) -> PlayerResult<()> {
        self.set_pause(false).await
    }

    /// Seeks to a position in the current track, in milliseconds.
    pub async fn seek(&self, position: u64) -> PlayerResult<()> {
        self.send(
            Seek {
                guild_id: self.guild_id,
                position,
            }
            .into(),
        )
        .await
    }

    /// Sets playback volume, clamped to at most 1000.
    pub async fn set_volume(&self, volume: u16) -> PlayerResult<()> {
        let volume = volume.min(MAX_VOLUME);

        self.send(
            Volume {
                guild_id: self.guild_id,
                volume,
            }
            .into(),
        )
        .await?;

        self.state.write().volume = volume;

        Ok(())
    }

    /// Replaces the player's audio filters.
    pub async fn set_filters(&self, filters: Filters) -> PlayerResult<()> {
        self.send(
            SetFilters {
                guild_id: self.guild_id,
                filters: filters.clone(),
            }
            .into(),
        )
        .await?;

        self.state.write().filters = filters;

        Ok(())
    }

    /// Forwards the bot's voice connection details to the node.
    ///
    /// `event` is the raw `VOICE_SERVER_UPDATE` payload from Discord.
    pub async fn voice_update(
        &self,
        session_id: impl Into<String>,
        event: Value,
    ) -> PlayerResult<()> {
        self.send(
            VoiceUpdate {
                guild_id: self.guild_id,
                session_id: session_id.into(),
                event,
            }
            .into(),
        )
        .await
    }

    /// Destroys the player on its node.
    ///
    /// The local mirror remains registered; see [`Lavalink::remove_player`].
    ///
    /// [`Lavalink::remove_player`]: crate::Lavalink::remove_player
    pub async fn destroy(&self) -> PlayerResult<()> {
        self.send(
            Destroy {
                guild_id: self.guild_id,
            }
            .into(),
        )
        .await?;

        self.state.write().track = None;

        Ok(())
    }

    /// Applies a routed frame to this player, then fires handlers.
    pub(crate) async fn process(self: &Arc<Self>, op: &Operation, global: &EventStore) {
        let ctx = match op {
            Operation::PlayerUpdate(update) => {
                self.state.write().state = update.state;

                EventContext::PlayerUpdate {
                    player: self,
                    state: &update.state,
                }
            },
            Operation::Event(Event::TrackStart(event)) => {
                self.state.write().track = Some(event.track.clone());

                EventContext::TrackStart {
                    player: self,
                    event,
                }
            },
            Operation::Event(Event::TrackEnd(event)) => EventContext::TrackEnd {
                player: self,
                event,
            },
            Operation::Event(Event::TrackException(event)) => EventContext::TrackException {
                player: self,
                event,
            },
            Operation::Event(Event::TrackStuck(event)) => EventContext::TrackStuck {
                player: self,
                event,
            },
            Operation::Event(Event::WebSocketClosed(event)) => EventContext::WebSocketClosed {
                player: self,
                event,
            },
            other => {
                trace!("Player {} ignoring {:?}.", self.guild_id, other);
                return;
            },
        };

        self.events.fire(&ctx).await;
        global.fire(&ctx).await;
    }
}

impl PlayerSnapshot {
    fn estimate_position(&self, now_ms: u64) -> u64 {
        let reported = self.state.position;

        let Some(track) = &self.track else {
            return reported;
        };

        if self.paused || !self.state.connected {
            return reported;
        }

        let estimate = reported.saturating_add(now_ms.saturating_sub(self.state.time));

        match track.info() {
            Some(info) if !info.is_stream => estimate.min(info.length),
            _ => estimate,
        }
    }
}
