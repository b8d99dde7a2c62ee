use crate::{
    constants::{CLIENT_NAME, CLIENT_VERSION, DEFAULT_RESUME_TIMEOUT},
    id::UserId,
    retry::Retry,
    selector::{LeastLoaded, NodeSelector},
};
use derivative::Derivative;
use std::{sync::Arc, time::Duration};
use url::{ParseError, Url};

/// Configuration shared by every node and player of a [`Lavalink`] client.
///
/// [`Lavalink`]: crate::Lavalink
#[derive(Clone, Derivative)]
#[derivative(Debug)]
#[non_exhaustive]
pub struct Config {
    /// ID of the bot user, sent to nodes as the `User-Id` header.
    ///
    /// Defaults to `0`; hosts should always set this.
    pub user_id: UserId,

    /// Value of the `Client-Name` header sent to nodes.
    ///
    /// Defaults to `songlink/<version>`.
    pub client_name: String,

    /// Reconnection policy applied when a node's connection drops.
    ///
    /// Defaults to an exponential backoff from 1s to 60s, retried forever.
    pub retry: Retry,

    /// How long nodes with a resume key should keep a dropped session alive.
    ///
    /// Only sent for nodes which have a resume key.
    ///
    /// Defaults to 60 seconds.
    pub resume_timeout: Duration,

    /// Policy used to pick a node for new players and track loading.
    ///
    /// Defaults to [`LeastLoaded`].
    #[derivative(Debug = "ignore")]
    pub selector: Arc<dyn NodeSelector>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            user_id: UserId::default(),
            client_name: format!("{CLIENT_NAME}/{CLIENT_VERSION}"),
            retry: Retry::default(),
            resume_timeout: DEFAULT_RESUME_TIMEOUT,
            selector: Arc::new(LeastLoaded),
        }
    }
}

impl Config {
    /// Sets this `Config`'s bot user ID.
    #[must_use]
    pub fn user_id<U: Into<UserId>>(mut self, user_id: U) -> Self {
        self.user_id = user_id.into();
        self
    }

    /// Sets this `Config`'s reported client name.
    #[must_use]
    pub fn client_name(mut self, client_name: impl Into<String>) -> Self {
        self.client_name = client_name.into();
        self
    }

    /// Sets this `Config`'s node reconnection policy.
    #[must_use]
    pub fn retry(mut self, retry: Retry) -> Self {
        self.retry = retry;
        self
    }

    /// Sets this `Config`'s session resumption timeout.
    #[must_use]
    pub fn resume_timeout(mut self, resume_timeout: Duration) -> Self {
        self.resume_timeout = resume_timeout;
        self
    }

    /// Sets this `Config`'s node selection policy.
    #[must_use]
    pub fn selector<S: NodeSelector + 'static>(mut self, selector: S) -> Self {
        self.selector = Arc::new(selector);
        self
    }
}

/// Connection details for a single Lavalink node.
///
/// These are fixed once the node has been created.
#[derive(Clone, Derivative, Eq, Hash, PartialEq)]
#[derivative(Debug)]
pub struct NodeConfig {
    /// Unique name of this node within a client.
    pub name: String,
    /// Hostname or IP address of the node.
    pub host: String,
    /// Port the node's websocket and REST interfaces listen on.
    pub port: u16,
    /// Shared secret, sent as the `Authorization` header.
    #[derivative(Debug = "ignore")]
    pub password: String,
    /// Whether to connect using `wss://` and `https://`.
    pub secure: bool,
    /// Key under which the node should hold this session for resumption.
    pub resume_key: Option<String>,
}

impl NodeConfig {
    /// Creates a plain-text node configuration without session resumption.
    pub fn new(
        name: impl Into<String>,
        host: impl Into<String>,
        port: u16,
        password: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            port,
            password: password.into(),
            secure: false,
            resume_key: None,
        }
    }

    /// Sets whether this node is reached over TLS.
    #[must_use]
    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Sets the key this node should resume sessions under.
    #[must_use]
    pub fn resume_key(mut self, resume_key: impl Into<String>) -> Self {
        self.resume_key = Some(resume_key.into());
        self
    }

    /// The websocket URL of this node, i.e., `ws://host:port`.
    pub fn ws_url(&self) -> Result<Url, ParseError> {
        self.url(if self.secure { "wss" } else { "ws" })
    }

    /// The base URL of this node's REST interface, i.e., `http://host:port`.
    pub fn rest_url(&self) -> Result<Url, ParseError> {
        self.url(if self.secure { "https" } else { "http" })
    }

    fn url(&self, scheme: &str) -> Result<Url, ParseError> {
        Url::parse(&format!("{}://{}:{}", scheme, self.host, self.port))
    }
}
