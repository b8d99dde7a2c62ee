use super::{EventContext, EventHandler};
use futures::FutureExt;
use parking_lot::RwLock;
use std::{panic::AssertUnwindSafe, sync::Arc};
use tracing::{error, trace};

/// An ordered list of event handlers.
///
/// Handlers are delivered events in the order they were added.
#[derive(Default)]
pub struct EventStore {
    handlers: RwLock<Vec<Arc<dyn EventHandler>>>,
}

impl EventStore {
    /// Creates a new, empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a handler, to be run after all handlers added before it.
    pub fn add_event<H: EventHandler + 'static>(&self, handler: H) {
        self.handlers.write().push(Arc::new(handler));
    }

    /// Number of handlers in this store.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.read().len()
    }

    /// Returns whether this store has no handlers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.read().is_empty()
    }

    /// Removes every handler.
    pub fn clear(&self) {
        self.handlers.write().clear();
    }

    /// Runs every handler on `ctx`, one at a time.
    ///
    /// The handler list is snapshotted first, so handlers may add further
    /// handlers without deadlocking; these only see later events.
    pub(crate) async fn fire(&self, ctx: &EventContext<'_>) {
        let handlers = self.handlers.read().clone();

        for (i, handler) in handlers.iter().enumerate() {
            if AssertUnwindSafe(handler.act(ctx)).catch_unwind().await.is_err() {
                error!("Event handler {} panicked while handling {:?}.", i, ctx);
            }
        }

        trace!("Fired event to {} handlers.", handlers.len());
    }
}

impl std::fmt::Debug for EventStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStore")
            .field("handlers", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{id::GuildId, model::PlayerState, Player};
    use async_trait::async_trait;
    use parking_lot::Mutex;

    struct Push(&'static str, Arc<Mutex<Vec<&'static str>>>);

    #[async_trait]
    impl EventHandler for Push {
        async fn act(&self, _ctx: &EventContext<'_>) {
            self.1.lock().push(self.0);
        }
    }

    struct Panics;

    #[async_trait]
    impl EventHandler for Panics {
        async fn act(&self, _ctx: &EventContext<'_>) {
            panic!("handler failure");
        }
    }

    fn context_parts() -> (Arc<Player>, PlayerState) {
        (
            Arc::new(Player::new(GuildId::from(1), None)),
            PlayerState::default(),
        )
    }

    #[tokio::test]
    async fn handlers_fire_in_registration_order() {
        let seen = Arc::new(Mutex::new(vec![]));
        let store = EventStore::new();
        store.add_event(Push("l1", seen.clone()));
        store.add_event(Push("l2", seen.clone()));

        let (player, state) = context_parts();
        store
            .fire(&EventContext::PlayerUpdate {
                player: &player,
                state: &state,
            })
            .await;

        assert_eq!(*seen.lock(), vec!["l1", "l2"]);
    }

    #[tokio::test]
    async fn panics_are_contained() {
        let seen = Arc::new(Mutex::new(vec![]));
        let store = EventStore::new();
        store.add_event(Panics);
        store.add_event(Push("after", seen.clone()));

        let (player, state) = context_parts();
        let ctx = EventContext::PlayerUpdate {
            player: &player,
            state: &state,
        };
        store.fire(&ctx).await;
        store.fire(&ctx).await;

        assert_eq!(*seen.lock(), vec!["after", "after"]);
        assert_eq!(store.len(), 2);
    }
}
