//! Change notification channel
//!
//! Handlers are keyed by the `SubscriptionId` handed out at subscribe time.
//! Publishing works on a copy of the handler list, so a handler may
//! subscribe or unsubscribe (itself included) while being called.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use optimist_core::SubscriptionId;
use parking_lot::RwLock;

use crate::ResolvedUpdate;

/// Change event
#[derive(Clone, Debug)]
pub struct Change<T, P> {
    /// New plain value
    pub value: Arc<T>,
    /// Updates folded by the pass that produced this change
    pub resolved: Vec<ResolvedUpdate<P>>,
    /// Updates are still queued after this change
    pub loading: bool,
}

type Handler<T, P> = Arc<dyn Fn(&Change<T, P>) + Send + Sync>;

struct Registry<T, P> {
    next: SubscriptionId,
    handlers: BTreeMap<SubscriptionId, Handler<T, P>>,
}

/// Fan-out of change events
pub struct ChangeChannel<T, P> {
    registry: RwLock<Registry<T, P>>,
}

impl<T, P> ChangeChannel<T, P> {
    pub fn new() -> Self {
        ChangeChannel {
            registry: RwLock::new(Registry {
                next: SubscriptionId::new(1),
                handlers: BTreeMap::new(),
            }),
        }
    }

    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&Change<T, P>) + Send + Sync + 'static,
    {
        let mut registry = self.registry.write();
        let id = registry.next;
        registry.next = id.next();
        registry.handlers.insert(id, Arc::new(handler));
        id
    }

    /// Returns `false` if `id` was not subscribed
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.registry.write().handlers.remove(&id).is_some()
    }

    /// Deliver `change` to every handler in subscription order
    pub fn publish(&self, change: &Change<T, P>) -> usize {
        let handlers: Vec<Handler<T, P>> = self.registry.read().handlers.values().cloned().collect();
        for handler in &handlers {
            handler(change);
        }
        handlers.len()
    }

    pub fn len(&self) -> usize {
        self.registry.read().handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.read().handlers.is_empty()
    }
}

impl<T, P> Default for ChangeChannel<T, P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, P> fmt::Debug for ChangeChannel<T, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeChannel")
            .field("subscribers", &self.len())
            .finish()
    }
}
