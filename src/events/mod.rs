//! Event handlers for player updates and playback events.
//!
//! Handlers may be attached to a single [`Player`] via
//! [`Player::add_event`], or to every player via
//! [`Lavalink::add_global_event`]. For each routed frame, a player's own
//! handlers run first, followed by global handlers, each in the order they
//! were added.
//!
//! Handlers run inline on the read task of the node which received the
//! frame. A slow handler delays later frames from that node, but never
//! frames from other nodes. Handlers which need to do long-running work
//! should spawn a task of their own.
//!
//! [`Player`]: crate::Player
//! [`Player::add_event`]: crate::Player::add_event
//! [`Lavalink::add_global_event`]: crate::Lavalink::add_global_event

mod context;
mod store;

pub use self::{context::EventContext, store::EventStore};

use async_trait::async_trait;

#[async_trait]
/// Trait to handle an event which can be fired per-player or globally.
///
/// Handlers which panic are logged and skipped; later handlers, and later
/// frames, are still delivered.
pub trait EventHandler: Send + Sync {
    /// Respond to one event.
    async fn act(&self, ctx: &EventContext<'_>);
}
