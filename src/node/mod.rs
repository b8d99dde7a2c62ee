//! Connections to individual Lavalink nodes.
//!
//! Each [`Node`] owns at most one websocket connection at a time. The read
//! half belongs to a background task which decodes frames and routes them
//! to players; the write half sits behind a lock so that commands from any
//! number of callers are written one whole frame at a time.
//!
//! When an open connection fails, the node retries it in the background
//! according to the client's [`Retry`] policy. Failures of [`Node::open`] itself are
//! returned to the caller instead, who may hand them over to the same
//! machinery via [`Node::schedule_reconnect`].
//!
//! [`Retry`]: crate::retry::Retry

mod runner;
mod status;
mod ws;

pub use self::status::NodeStatus;

use self::ws::WsSink;
use crate::{
    config::{Config, NodeConfig},
    error::{NodeError, NodeResult},
    manager::Shared,
    model::{self, command::ConfigureResuming, Command, Event, Operation, Stats},
};
use flume::Sender;
use futures::{future::BoxFuture, SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use std::{
    fmt,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
        Weak,
    },
};
use tokio::sync::Mutex as AsyncMutex;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, instrument, trace, warn};
use url::{ParseError, Url};

/// A single Lavalink node, and the client's connection to it.
pub struct Node {
    config: NodeConfig,
    client: Config,
    status: Mutex<NodeStatus>,
    stats: RwLock<Option<Stats>>,
    sink: AsyncMutex<Option<WsSink>>,
    quit: Mutex<Option<Sender<()>>>,
    generation: AtomicUsize,
    shared: Weak<Shared>,
}

impl Node {
    pub(crate) fn new(config: NodeConfig, client: Config, shared: Weak<Shared>) -> Self {
        Self {
            config,
            client,
            status: Mutex::default(),
            stats: RwLock::default(),
            sink: AsyncMutex::default(),
            quit: Mutex::default(),
            generation: AtomicUsize::new(0),
            shared,
        }
    }

    /// This node's unique name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// This node's connection details.
    #[must_use]
    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Current state of this node's connection.
    #[must_use]
    pub fn status(&self) -> NodeStatus {
        *self.status.lock()
    }

    /// Returns whether this node is connected, and may be given new work.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.status() == NodeStatus::Connected
    }

    /// The most recent load statistics reported by this node.
    #[must_use]
    pub fn stats(&self) -> Option<Stats> {
        self.stats.read().clone()
    }

    /// The base URL of this node's REST interface.
    pub fn rest_url(&self) -> Result<Url, ParseError> {
        self.config.rest_url()
    }

    /// Opens a new connection to this node, replacing any existing one.
    ///
    /// On failure the node is left [`NodeStatus::Disconnected`], and no
    /// reconnect is scheduled; see [`Node::schedule_reconnect`].
    #[instrument(skip(self), fields(node = %self.config.name))]
    pub async fn open(self: &Arc<Self>) -> NodeResult<()> {
        *self.status.lock() = NodeStatus::Connecting;
        self.release().await;

        match self.connect().await {
            Ok(()) => {
                info!("Node {} connected.", self.name());
                Ok(())
            },
            Err(e) => {
                self.transition(NodeStatus::Connecting, NodeStatus::Disconnected);
                error!("Failed to open node {}: {}.", self.name(), e);
                Err(e)
            },
        }
    }

    /// Closes this node's connection, if any.
    ///
    /// A closed node never reconnects by itself. Closing an already
    /// closed node does nothing.
    pub async fn close(&self) {
        let previous = std::mem::replace(&mut *self.status.lock(), NodeStatus::Disconnected);

        self.release().await;

        if previous != NodeStatus::Disconnected {
            info!("Node {} closed (was {}).", self.name(), previous);
        }
    }

    /// Writes a command to this node.
    ///
    /// Fails with [`NodeError::NotConnected`] if no connection is open.
    /// Failed writes do not trigger a reconnect: this is left to the
    /// node's read task, which observes the same failure.
    pub async fn send(&self, command: &Command) -> NodeResult<()> {
        let text = command.encode()?;

        let mut sink = self.sink.lock().await;
        let sink = sink.as_mut().ok_or(NodeError::NotConnected)?;
        sink.send(Message::Text(text)).await?;

        trace!("Sent {:?} to node {}.", command, self.name());

        Ok(())
    }

    /// Hands a disconnected node over to the background reconnect loop.
    ///
    /// Returns `false`, and does nothing, if the node is not
    /// [`NodeStatus::Disconnected`]; in particular, a second reconnect
    /// chain is never started alongside a pending one.
    pub fn schedule_reconnect(self: &Arc<Self>) -> bool {
        let previous = {
            let mut status = self.status.lock();
            let previous = *status;
            if previous == NodeStatus::Disconnected {
                *status = NodeStatus::Reconnecting;
            }
            previous
        };

        match previous {
            NodeStatus::Disconnected => {
                tokio::spawn(runner::reconnect(
                    self.name().to_owned(),
                    Arc::downgrade(self),
                ));
                true
            },
            status if status.is_pending() => {
                error!(
                    "Refusing to reconnect node {}: already {}.",
                    self.name(),
                    status
                );
                false
            },
            status => {
                debug!("Not reconnecting node {}: {}.", self.name(), status);
                false
            },
        }
    }

    /// Performs the handshake, and installs the new connection.
    ///
    /// The node must be [`NodeStatus::Connecting`] both before and after
    /// the handshake; if it was closed meanwhile, the new connection is
    /// dropped. If a concurrent attempt connected first, its connection
    /// is kept and this one is dropped.
    ///
    /// Boxed, as the read task spawned here may spawn `runner::reconnect`,
    /// which awaits this future in turn.
    fn connect(self: &Arc<Self>) -> BoxFuture<'_, NodeResult<()>> {
        Box::pin(async move {
            let stream = ws::connect(&self.config, &self.client).await?;
            let (write, read) = stream.split();
            let (quit_tx, quit_rx) = flume::bounded(1);

            let generation = {
                let mut sink = self.sink.lock().await;
                let mut status = self.status.lock();

                match *status {
                    NodeStatus::Connecting => {},
                    NodeStatus::Connected => {
                        debug!(
                            "Node {} was connected by another attempt, dropping this one.",
                            self.name()
                        );
                        return Ok(());
                    },
                    _ => return Err(NodeError::Closed),
                }

                let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
                *status = NodeStatus::Connected;
                *sink = Some(write);
                *self.quit.lock() = Some(quit_tx);

                generation
            };

            tokio::spawn(runner::runner(
                self.name().to_owned(),
                Arc::downgrade(self),
                read,
                quit_rx,
                generation,
            ));

            if let Some(key) = &self.config.resume_key {
                let cmd = Command::from(ConfigureResuming {
                    key: key.clone(),
                    timeout: self.client.resume_timeout.as_secs(),
                });

                if let Err(e) = self.send(&cmd).await {
                    warn!("Failed to configure resuming on node {}: {}.", self.name(), e);
                }
            }

            Ok(())
        })
    }

    /// Drops the current connection, whatever its generation.
    async fn release(&self) {
        drop(self.quit.lock().take());

        let sink = self.sink.lock().await.take();
        if let Some(mut sink) = sink {
            if let Err(e) = sink.close().await {
                debug!("Error closing connection to node {}: {}.", self.name(), e);
            }
        }
    }

    /// Atomically moves between two statuses.
    ///
    /// Returns `false` if the node was not in status `from`.
    pub(crate) fn transition(&self, from: NodeStatus, to: NodeStatus) -> bool {
        let mut status = self.status.lock();
        if *status == from {
            *status = to;
            true
        } else {
            false
        }
    }

    /// Called by the read task of connection `generation` once it fails.
    ///
    /// Only the current connection of a connected node may schedule a
    /// reconnect; stale read tasks, and those of closed nodes, are ignored.
    pub(crate) async fn connection_lost(self: &Arc<Self>, generation: usize) {
        {
            let mut sink = self.sink.lock().await;
            let mut status = self.status.lock();

            if self.generation.load(Ordering::Acquire) != generation
                || *status != NodeStatus::Connected
            {
                debug!(
                    "Ignoring loss of stale connection {} to node {}.",
                    generation,
                    self.name()
                );
                return;
            }

            *status = NodeStatus::Reconnecting;
            drop(sink.take());
            drop(self.quit.lock().take());
        }

        tokio::spawn(runner::reconnect(
            self.name().to_owned(),
            Arc::downgrade(self),
        ));
    }

    /// Decodes one frame from this node, and acts on it.
    pub(crate) async fn process(&self, text: &str) {
        let op = match model::decode(text) {
            Ok(op) => op,
            Err(e) => {
                error!("Dropping frame from node {}: {}. Payload: {}", self.name(), e, text);
                return;
            },
        };

        match op {
            Operation::Stats(stats) => {
                trace!("Node {} stats: {:?}.", self.name(), stats);
                *self.stats.write() = Some(stats);
            },
            Operation::Unrecognized(u) => {
                warn!(
                    "Unrecognized op {:?} from node {}: {}",
                    u.op,
                    self.name(),
                    u.data
                );
            },
            Operation::Event(Event::Unknown(e)) => {
                warn!(
                    "Unknown event type {:?} from node {}: {}",
                    e.kind,
                    self.name(),
                    e.data
                );
            },
            op => {
                if let Some(shared) = self.shared.upgrade() {
                    shared.route(self, &op).await;
                }
            },
        }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("config", &self.config)
            .field("status", &self.status())
            .field("generation", &self.generation.load(Ordering::Relaxed))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::test_data::{STATS, UNKNOWN_OP};

    fn node() -> Arc<Node> {
        Arc::new(Node::new(
            NodeConfig::new("test", "localhost", 1, "pass"),
            Config::default(),
            Weak::new(),
        ))
    }

    #[tokio::test]
    async fn new_nodes_are_disconnected() {
        let node = node();

        assert_eq!(node.status(), NodeStatus::Disconnected);
        assert!(!node.is_available());
        assert!(node.stats().is_none());
    }

    #[tokio::test]
    async fn send_without_connection_fails() {
        let node = node();
        let cmd = Command::from(crate::model::command::Stop {
            guild_id: crate::id::GuildId::from(1),
        });

        assert!(matches!(node.send(&cmd).await, Err(NodeError::NotConnected)));
    }

    #[tokio::test]
    async fn close_twice_is_a_no_op() {
        let node = node();

        node.close().await;
        node.close().await;

        assert_eq!(node.status(), NodeStatus::Disconnected);
    }

    #[tokio::test]
    async fn reconnect_refused_while_pending() {
        let node = node();

        assert!(node.transition(NodeStatus::Disconnected, NodeStatus::Connecting));
        assert!(!node.schedule_reconnect());
        assert_eq!(node.status(), NodeStatus::Connecting);

        assert!(node.transition(NodeStatus::Connecting, NodeStatus::Reconnecting));
        assert!(!node.schedule_reconnect());
        assert_eq!(node.status(), NodeStatus::Reconnecting);
    }

    #[tokio::test]
    async fn stale_connection_loss_is_ignored() {
        let node = node();

        node.connection_lost(7).await;

        assert_eq!(node.status(), NodeStatus::Disconnected);
    }

    #[tokio::test]
    async fn stats_frames_update_snapshot() {
        let node = node();

        node.process(STATS).await;
        node.process(UNKNOWN_OP).await;
        node.process("not json").await;

        assert_eq!(node.stats().map(|s| s.players), Some(3));
    }

    #[tokio::test]
    async fn close_stops_pending_reconnects() {
        let node = node();

        assert!(node.schedule_reconnect());
        assert_eq!(node.status(), NodeStatus::Reconnecting);

        node.close().await;

        assert_eq!(node.status(), NodeStatus::Disconnected);
        assert!(!node.transition(NodeStatus::Reconnecting, NodeStatus::Connecting));
    }
}
