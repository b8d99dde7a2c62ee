#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
//! Songlink is an async client for [Lavalink] audio nodes, written in Rust.
//!
//! The library offers:
//!  * Persistent connections to any number of nodes, with automatic
//!  reconnection and configurable backoff when a connection drops.
//!  * A forward-compatible decoder for the node websocket protocol: frames and
//!  events added by newer nodes are logged and skipped, never fatal.
//!  * A per-guild [`Player`] mirroring playback state pushed by its node, with
//!  helpers to issue playback commands.
//!  * Node selection by load, for new players and for track lookups.
//!  * Per-player and global [event handlers], delivered in registration order.
//!
//! Voice connection plumbing is left to the host: forward Discord's voice
//! server and state updates through [`Player::voice_update`]. Likewise,
//! HTTP requests for track loading are issued by a host-provided
//! [`RestClient`].
//!
//! ## Logging
//! All logging goes through [tracing]. No subscriber is installed by this
//! crate.
//!
//! [Lavalink]: https://github.com/freyacodes/Lavalink
//! [event handlers]: events
//! [`RestClient`]: rest::RestClient
//! [tracing]: https://docs.rs/tracing

#![warn(clippy::pedantic)]
#![allow(
    // Allowed as they are too pedantic
    clippy::module_name_repetitions,
    clippy::wildcard_imports,
    clippy::too_many_lines,
    clippy::cast_lossless,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap,
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::missing_errors_doc,
)]

mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod id;
mod manager;
pub mod model;
pub mod node;
mod player;
pub mod rest;
pub mod retry;
pub mod selector;

pub use crate::{
    config::{Config, NodeConfig},
    events::{EventContext, EventHandler},
    manager::Lavalink,
    model::track::{Track, TrackInfo},
    node::{Node, NodeStatus},
    player::{PlayOptions, Player, PlayerSnapshot},
};
