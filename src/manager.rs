use crate::{
    error::{NodeError, NodeResult, PlayerError, SelectError},
    events::{EventHandler, EventStore},
    id::GuildId,
    model::Operation,
    rest::{LoadError, LoadResult, RestClient, RestEndpoint},
    Config,
    Node,
    NodeConfig,
    Player,
};
use dashmap::DashMap;
use parking_lot::RwLock as PRwLock;
use std::sync::Arc;
use tracing::{debug, error, info, trace, warn};

/// State shared between the registry and every node's read task.
#[derive(Debug, Default)]
pub(crate) struct Shared {
    players: DashMap<GuildId, Arc<Player>>,
    global: EventStore,
}

impl Shared {
    /// Hands a frame received from node `source` to the player it concerns.
    ///
    /// Frames for guilds without a player, or whose player is bound to
    /// another node, are dropped. Nodes are compared by identity, so a
    /// node registered under a reused name cannot update players bound to
    /// its predecessor.
    pub(crate) async fn route(&self, source: &Node, op: &Operation) {
        let Some(guild_id) = op.guild_id() else {
            return;
        };

        let Some(player) = self.players.get(&guild_id).map(|p| Arc::clone(&p)) else {
            trace!("No player for guild {}, dropping {:?}.", guild_id, op);
            return;
        };

        if !player.is_bound_to(source) {
            trace!(
                "Player for guild {} is not bound to node {}, dropping frame.",
                guild_id,
                source.name()
            );
            return;
        }

        player.process(op, &self.global).await;
    }
}

/// A registry of Lavalink nodes, and the players they host.
///
/// This is the entry point of the crate: hosts add nodes, and then
/// obtain a [`Player`] per guild, which is bound to the least-loaded
/// node at the time of its creation.
#[derive(Debug)]
pub struct Lavalink {
    config: PRwLock<Config>,
    nodes: DashMap<String, Arc<Node>>,
    shared: Arc<Shared>,
}

impl Default for Lavalink {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl Lavalink {
    /// Creates a new, empty registry.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            config: PRwLock::new(config),
            nodes: DashMap::new(),
            shared: Arc::default(),
        }
    }

    /// Returns a copy of the current configuration.
    #[must_use]
    pub fn config(&self) -> Config {
        self.config.read().clone()
    }

    /// Sets the configuration used for all nodes created from now on.
    ///
    /// Existing nodes keep the configuration they were created with.
    pub fn set_config(&self, new_config: Config) {
        *self.config.write() = new_config;
    }

    /// Registers a node without connecting to it.
    ///
    /// Any existing node of the same name is replaced and closed. Players
    /// bound to the replaced node must be [moved] to a live node.
    ///
    /// [moved]: Player::set_node
    pub async fn register_node(&self, config: NodeConfig) -> Arc<Node> {
        let node = Arc::new(Node::new(
            config,
            self.config.read().clone(),
            Arc::downgrade(&self.shared),
        ));

        let old = self.nodes.insert(node.name().to_owned(), Arc::clone(&node));
        if let Some(old) = old {
            warn!("Replacing existing node {}.", old.name());
            old.close().await;
        }

        node
    }

    /// Registers a node, replacing and closing any node of the same name,
    /// and connects to it.
    ///
    /// A node whose first connection fails remains registered, and may be
    /// retrieved with [`Lavalink::node`] to [open] again or to
    /// [schedule a reconnect].
    ///
    /// [open]: Node::open
    /// [schedule a reconnect]: Node::schedule_reconnect
    pub async fn add_node(&self, config: NodeConfig) -> NodeResult<Arc<Node>> {
        let node = self.register_node(config).await;
        node.open().await?;

        Ok(node)
    }

    /// Retrieves the node with the given name.
    #[must_use]
    pub fn node(&self, name: &str) -> Option<Arc<Node>> {
        self.nodes.get(name).map(|n| Arc::clone(&n))
    }

    /// All registered nodes, in no particular order.
    #[must_use]
    pub fn nodes(&self) -> Vec<Arc<Node>> {
        self.nodes.iter().map(|n| Arc::clone(n.value())).collect()
    }

    /// Unregisters and closes a node.
    ///
    /// Players bound to the node are kept, but their commands fail with
    /// [`PlayerError::NoNode`] until they are [moved] to another node.
    ///
    /// [moved]: Player::set_node
    pub async fn remove_node(&self, name: &str) -> Option<Arc<Node>> {
        let (_, node) = self.nodes.remove(name)?;
        node.close().await;

        info!("Removed node {}.", name);

        Some(node)
    }

    /// Picks a connected node for new work, using the configured
    /// [`NodeSelector`].
    ///
    /// [`NodeSelector`]: crate::selector::NodeSelector
    pub fn best_node(&self) -> Result<Arc<Node>, SelectError> {
        let candidates: Vec<_> = self
            .nodes
            .iter()
            .filter(|n| n.is_available())
            .map(|n| Arc::clone(n.value()))
            .collect();

        let selector = Arc::clone(&self.config.read().selector);

        selector
            .select(&candidates)
            .ok_or(SelectError::NoAvailableNode)
    }

    /// The REST interface of the best node, for loading tracks.
    pub fn best_rest_endpoint(&self) -> Result<RestEndpoint, SelectError> {
        let node = self.best_node()?;

        // A connected node's address has already been parsed as a websocket URL.
        let url = node.rest_url().map_err(|e| {
            error!("Node {} has an invalid REST address: {}.", node.name(), e);
            SelectError::NoAvailableNode
        })?;

        Ok(RestEndpoint {
            node: node.name().to_owned(),
            url,
            password: node.config().password.clone(),
        })
    }

    /// Loads tracks through `client`, from the best node.
    pub async fn load_item<C: RestClient>(
        &self,
        client: &C,
        identifier: &str,
    ) -> Result<LoadResult, LoadError<C::Error>> {
        let endpoint = self.best_rest_endpoint()?;

        client
            .load_item(&endpoint, identifier)
            .await
            .map_err(LoadError::Rest)
    }

    /// Retrieves the player for a guild, creating it on the best node if
    /// none exists.
    pub fn player<G: Into<GuildId>>(&self, guild_id: G) -> Result<Arc<Player>, SelectError> {
        let guild_id = guild_id.into();

        if let Some(player) = self.existing_player(guild_id) {
            return Ok(player);
        }

        let node = self.best_node()?;

        Ok(self.player_on(guild_id, &node))
    }

    /// Retrieves the player for a guild, creating it on `node` if none
    /// exists.
    ///
    /// An existing player is returned as-is, even if it is bound to
    /// another node.
    pub fn player_on<G: Into<GuildId>>(&self, guild_id: G, node: &Arc<Node>) -> Arc<Player> {
        let guild_id = guild_id.into();

        self.shared
            .players
            .entry(guild_id)
            .or_insert_with(|| {
                debug!("Creating player for guild {} on node {}.", guild_id, node.name());
                Arc::new(Player::new(guild_id, Some(node)))
            })
            .clone()
    }

    /// Retrieves the player for a guild, if one exists.
    #[must_use]
    pub fn existing_player<G: Into<GuildId>>(&self, guild_id: G) -> Option<Arc<Player>> {
        self.shared
            .players
            .get(&guild_id.into())
            .map(|p| Arc::clone(&p))
    }

    /// Unregisters a guild's player, and destroys it on its node.
    ///
    /// The player is removed even if it could not be destroyed remotely.
    pub async fn remove_player<G: Into<GuildId>>(&self, guild_id: G) -> Option<Arc<Player>> {
        let (guild_id, player) = self.shared.players.remove(&guild_id.into())?;

        match player.destroy().await {
            Ok(()) => {},
            Err(PlayerError::NoNode | PlayerError::Node(NodeError::NotConnected)) => {
                debug!("Player for guild {} had no live node to destroy on.", guild_id);
            },
            Err(e) => warn!("Failed to destroy player for guild {}: {}.", guild_id, e),
        }

        Some(player)
    }

    /// All live players, in no particular order.
    #[must_use]
    pub fn players(&self) -> Vec<Arc<Player>> {
        self.shared
            .players
            .iter()
            .map(|p| Arc::clone(p.value()))
            .collect()
    }

    /// Adds an event handler which hears events from every player.
    ///
    /// Global handlers run after each player's own handlers.
    pub fn add_global_event<H: EventHandler + 'static>(&self, handler: H) {
        self.shared.global.add_event(handler);
    }

    /// Closes and unregisters every node.
    ///
    /// Players are kept, but have no node to send commands to.
    pub async fn shutdown(&self) {
        let names: Vec<_> = self.nodes.iter().map(|n| n.key().clone()).collect();

        for name in names {
            self.remove_node(&name).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        constants::test_data::PLAYER_UPDATE,
        events::EventContext,
        node::NodeStatus,
        selector::Penalty,
    };
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn stats(players: u32, system_load: f64) -> String {
        format!(
            r#"{{"op": "stats", "players": {players}, "playingPlayers": {players}, "uptime": 1,
                "memory": {{"free": 0, "used": 0, "allocated": 0, "reservable": 0}},
                "cpu": {{"cores": 1, "systemLoad": {system_load}, "lavalinkLoad": 0.0}}}}"#
        )
    }

    async fn node(lavalink: &Lavalink, name: &str, status: NodeStatus, players: u32) -> Arc<Node> {
        let node = lavalink
            .register_node(NodeConfig::new(name, "localhost", 1, "pass"))
            .await;
        node.process(&stats(players, 0.5)).await;
        assert!(node.transition(NodeStatus::Disconnected, status) || status == NodeStatus::Disconnected);
        node
    }

    #[tokio::test]
    async fn best_node_is_least_loaded_connected_node() {
        let lavalink = Lavalink::default();
        node(&lavalink, "two", NodeStatus::Connected, 2).await;
        node(&lavalink, "five", NodeStatus::Connected, 5).await;
        node(&lavalink, "idle", NodeStatus::Disconnected, 0).await;

        assert_eq!(lavalink.best_node().unwrap().name(), "two");
    }

    #[tokio::test]
    async fn no_connected_nodes_is_an_error() {
        let lavalink = Lavalink::default();
        node(&lavalink, "a", NodeStatus::Disconnected, 0).await;
        node(&lavalink, "b", NodeStatus::Reconnecting, 0).await;

        assert_eq!(lavalink.best_node().unwrap_err(), SelectError::NoAvailableNode);
        assert!(lavalink.player(GuildId::from(1)).is_err());
        assert!(lavalink.best_rest_endpoint().is_err());
    }

    #[tokio::test]
    async fn ties_break_on_system_load() {
        let lavalink = Lavalink::default();
        let busy = node(&lavalink, "busy", NodeStatus::Connected, 1).await;
        let calm = node(&lavalink, "calm", NodeStatus::Connected, 1).await;
        busy.process(&stats(1, 0.9)).await;
        calm.process(&stats(1, 0.1)).await;

        assert_eq!(lavalink.best_node().unwrap().name(), "calm");

        lavalink.set_config(Config::default().selector(Penalty));
        assert_eq!(lavalink.best_node().unwrap().name(), "calm");
    }

    #[tokio::test]
    async fn rest_endpoint_points_at_best_node() {
        let lavalink = Lavalink::default();
        node(&lavalink, "a", NodeStatus::Connected, 0).await;

        let endpoint = lavalink.best_rest_endpoint().unwrap();

        assert_eq!(endpoint.node, "a");
        assert_eq!(endpoint.url.as_str(), "http://localhost:1/");
        assert_eq!(endpoint.password, "pass");
    }

    #[tokio::test]
    async fn players_are_created_once() {
        let lavalink = Lavalink::default();
        node(&lavalink, "a", NodeStatus::Connected, 0).await;

        let first = lavalink.player(GuildId::from(5)).unwrap();
        let second = lavalink.player(GuildId::from(5)).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.node_name().as_deref(), Some("a"));
        assert_eq!(lavalink.players().len(), 1);
    }

    struct Count(Arc<AtomicUsize>);

    #[async_trait]
    impl EventHandler for Count {
        async fn act(&self, _ctx: &EventContext<'_>) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn frames_only_route_from_bound_node() {
        let lavalink = Lavalink::default();
        let a = node(&lavalink, "a", NodeStatus::Connected, 0).await;
        let b = node(&lavalink, "b", NodeStatus::Connected, 0).await;
        let hits = Arc::new(AtomicUsize::new(0));
        lavalink.add_global_event(Count(hits.clone()));

        // No player yet: dropped silently.
        a.process(PLAYER_UPDATE).await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        let player = lavalink.player_on(GuildId::from(817_327_181_659_111_454), &a);

        b.process(PLAYER_UPDATE).await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert_eq!(player.state().position, 0);

        a.process(PLAYER_UPDATE).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(player.state().position, 1000);
    }

    #[tokio::test]
    async fn reused_node_names_do_not_inherit_players() {
        let lavalink = Lavalink::default();
        let a = node(&lavalink, "a", NodeStatus::Connected, 0).await;
        let player = lavalink.player_on(GuildId::from(817_327_181_659_111_454), &a);

        lavalink.remove_node("a").await;
        drop(a);
        let a2 = node(&lavalink, "a", NodeStatus::Connected, 0).await;

        a2.process(PLAYER_UPDATE).await;
        assert_eq!(player.state().position, 0);
        assert!(matches!(player.stop().await, Err(PlayerError::NoNode)));

        player.set_node(&a2);
        a2.process(PLAYER_UPDATE).await;
        assert_eq!(player.state().position, 1000);
    }

    #[tokio::test]
    async fn registering_a_name_again_closes_the_old_node() {
        let lavalink = Lavalink::default();
        let old = node(&lavalink, "a", NodeStatus::Connected, 0).await;
        let new = node(&lavalink, "a", NodeStatus::Connected, 0).await;
        let player = lavalink.player_on(GuildId::from(817_327_181_659_111_454), &new);

        assert_eq!(old.status(), NodeStatus::Disconnected);
        assert!(Arc::ptr_eq(&lavalink.node("a").unwrap(), &new));
        assert_eq!(lavalink.nodes().len(), 1);

        old.process(PLAYER_UPDATE).await;
        assert_eq!(player.state().position, 0);

        new.process(PLAYER_UPDATE).await;
        assert_eq!(player.state().position, 1000);
    }

    #[tokio::test]
    async fn removing_a_node_keeps_its_players() {
        let lavalink = Lavalink::default();
        let a = node(&lavalink, "a", NodeStatus::Connected, 0).await;
        let player = lavalink.player_on(GuildId::from(9), &a);
        drop(a);

        assert!(lavalink.remove_node("a").await.is_some());
        assert!(lavalink.remove_node("a").await.is_none());

        assert!(lavalink.existing_player(GuildId::from(9)).is_some());
        assert!(player.node().is_none());
        assert!(matches!(player.stop().await, Err(PlayerError::NoNode)));

        assert!(lavalink.remove_player(GuildId::from(9)).await.is_some());
        assert!(lavalink.existing_player(GuildId::from(9)).is_none());
    }

    #[tokio::test]
    async fn shutdown_closes_every_node() {
        let lavalink = Lavalink::default();
        let a = node(&lavalink, "a", NodeStatus::Connected, 0).await;
        let b = node(&lavalink, "b", NodeStatus::Reconnecting, 0).await;

        lavalink.shutdown().await;

        assert!(lavalink.nodes().is_empty());
        assert_eq!(a.status(), NodeStatus::Disconnected);
        assert_eq!(b.status(), NodeStatus::Disconnected);
    }

    struct Canned;

    #[async_trait]
    impl RestClient for Canned {
        type Error = String;

        async fn load_item(
            &self,
            endpoint: &RestEndpoint,
            identifier: &str,
        ) -> Result<LoadResult, Self::Error> {
            if endpoint.node == "a" && identifier == "ytsearch:test" {
                Ok(LoadResult::Empty)
            } else {
                Err(format!("unexpected request to {}", endpoint.url))
            }
        }
    }

    #[tokio::test]
    async fn load_item_uses_best_node() {
        let lavalink = Lavalink::default();

        assert!(matches!(
            lavalink.load_item(&Canned, "ytsearch:test").await,
            Err(LoadError::Select(SelectError::NoAvailableNode))
        ));

        node(&lavalink, "a", NodeStatus::Connected, 0).await;

        assert_eq!(
            lavalink.load_item(&Canned, "ytsearch:test").await.unwrap(),
            LoadResult::Empty
        );
    }
}
