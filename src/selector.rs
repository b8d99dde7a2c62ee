//! Policies for choosing which node receives new work.

use crate::node::Node;
use std::{cmp::Ordering, sync::Arc};

/// Chooses a node for a new player or track lookup.
///
/// Selectors are only ever offered nodes which are currently connected.
pub trait NodeSelector: Send + Sync {
    /// Picks one of `candidates`, or `None` to decline all of them.
    fn select(&self, candidates: &[Arc<Node>]) -> Option<Arc<Node>>;
}

/// Picks the node hosting the fewest players, breaking ties by system load.
///
/// Nodes which have not yet reported statistics count as idle.
#[derive(Clone, Copy, Debug, Default)]
pub struct LeastLoaded;

impl NodeSelector for LeastLoaded {
    fn select(&self, candidates: &[Arc<Node>]) -> Option<Arc<Node>> {
        candidates
            .iter()
            .map(|node| {
                let load = node
                    .stats()
                    .map_or((0, 0.0), |s| (s.players, s.cpu.system_load));
                (node, load)
            })
            .min_by(|(_, (pa, la)), (_, (pb, lb))| pa.cmp(pb).then(la.total_cmp(lb)))
            .map(|(node, _)| node.clone())
    }
}

/// Picks the node with the lowest [`Stats::penalty`].
///
/// [`Stats::penalty`]: crate::model::Stats::penalty
#[derive(Clone, Copy, Debug, Default)]
pub struct Penalty;

impl NodeSelector for Penalty {
    fn select(&self, candidates: &[Arc<Node>]) -> Option<Arc<Node>> {
        candidates
            .iter()
            .map(|node| (node, node.stats().map_or(0.0, |s| s.penalty())))
            .min_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(Ordering::Equal))
            .map(|(node, _)| node.clone())
    }
}

impl<F> NodeSelector for F
where
    F: Fn(&[Arc<Node>]) -> Option<Arc<Node>> + Send + Sync,
{
    fn select(&self, candidates: &[Arc<Node>]) -> Option<Arc<Node>> {
        self(candidates)
    }
}
