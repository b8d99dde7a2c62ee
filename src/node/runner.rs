use super::{
    ws::{convert_ws_message, WsSource},
    Node,
    NodeStatus,
};
use flume::Receiver;
use futures::StreamExt;
use std::sync::Weak;
use tokio::{select, time::sleep};
use tracing::{debug, info, instrument, trace, warn};

/// Reads frames from one connection until it fails or is told to quit.
///
/// Frames are processed strictly in arrival order: each one is decoded,
/// applied, and handed to every event handler before the next is read.
#[instrument(skip(node, stream, quit))]
pub(crate) async fn runner(
    name: String,
    node: Weak<Node>,
    mut stream: WsSource,
    quit: Receiver<()>,
    generation: usize,
) {
    trace!("Node read task started.");

    let failure = loop {
        select! {
            biased;
            _ = quit.recv_async() => break None,
            msg = stream.next() => match convert_ws_message(msg) {
                Ok(Some(text)) => {
                    let Some(node) = node.upgrade() else {
                        break None;
                    };
                    node.process(&text).await;
                },
                Ok(None) => {},
                Err(e) => break Some(e),
            },
        }
    };

    if let Some(e) = failure {
        warn!("Connection to node {} lost: {:?}.", name, e);

        if let Some(node) = node.upgrade() {
            node.connection_lost(generation).await;
        }
    }

    trace!("Node read task finished.");
}

/// Retries a node's connection until it succeeds, the retry policy gives
/// up, or the node's status is changed from under it.
///
/// Only one of these runs per node: it is started by moving the node into
/// [`NodeStatus::Reconnecting`], which is refused if any attempt is already
/// pending.
#[instrument(skip(node))]
pub(crate) async fn reconnect(name: String, node: Weak<Node>) {
    trace!("Node reconnect task started.");

    let Some(retry) = node.upgrade().map(|n| n.client.retry) else {
        return;
    };

    let mut attempt = 0;
    let mut last_wait = None;

    loop {
        let Some(wait) = retry.retry_in(attempt, last_wait) else {
            if let Some(node) = node.upgrade() {
                if node.transition(NodeStatus::Reconnecting, NodeStatus::Disconnected) {
                    warn!("Giving up on node {} after {} attempts.", name, attempt);
                }
            }
            break;
        };

        debug!("Reconnecting to node {} in {:?}.", name, wait);
        sleep(wait).await;
        attempt += 1;
        last_wait = Some(wait);

        let Some(node) = node.upgrade() else {
            break;
        };

        if !node.transition(NodeStatus::Reconnecting, NodeStatus::Connecting) {
            debug!("Node {} changed status during backoff, stopping.", name);
            break;
        }

        match node.connect().await {
            Ok(()) => {
                info!("Reconnected to node {} after {} attempts.", name, attempt);
                break;
            },
            Err(e) => {
                warn!("Reconnect attempt {} to node {} failed: {}.", attempt, name, e);

                if !node.transition(NodeStatus::Connecting, NodeStatus::Reconnecting) {
                    break;
                }
            },
        }
    }

    trace!("Node reconnect task finished.");
}
