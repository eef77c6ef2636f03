//! Optimistic state container
//!
//! `Optimistic` holds a value that callers may change speculatively ahead of
//! an asynchronous confirmation. The visible value is always the confirmed
//! state plus every guess still waiting on its outcome; guesses that fail are
//! rolled back and reported to subscribers.
//!
//! Queued mutations are assumed independent of each other. Updates with a
//! real data dependency should be composed into one mutation or sequenced by
//! the caller.

use std::fmt;
use std::sync::Arc;

use optimist_core::{IntoMutation, OptimistError, OptimistResult, Snapshot, SubscriptionId};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tracing::trace;

use crate::resolver::ReconciliationState;
use crate::{Change, ChangeChannel, Resolution, SettlementCell, StateConfig, UpdateHandle};

struct Inner<S: Snapshot, P> {
    state: Mutex<ReconciliationState<S, P>>,
    changes: ChangeChannel<S::Plain, P>,
    config: StateConfig,
}

impl<S: Snapshot, P: Clone> Inner<S, P> {
    /// Settlement continuation of an immediately-resolving update
    fn on_settled(&self, id: optimist_core::UpdateId) {
        let change = self.state.lock().settle(id, self.config.adopt_payload);
        self.publish(change);
    }

    /// Publish outside the state lock so handlers may call back in
    fn publish(&self, change: Option<Change<S::Plain, P>>) {
        if let Some(change) = change {
            let delivered = self.changes.publish(&change);
            trace!(delivered, resolved = change.resolved.len(), "change published");
        }
    }
}

/// Optimistic state container
///
/// Cloning yields another handle to the same container.
pub struct Optimistic<S: Snapshot, P> {
    inner: Arc<Inner<S, P>>,
}

impl<S, P> Optimistic<S, P>
where
    S: Snapshot,
    P: Clone + Send + Sync + 'static,
{
    /// Create a container holding `initial`
    pub fn new(initial: S::Plain) -> Self {
        Self::with_config(initial, StateConfig::default())
    }

    /// Create a container holding `initial` with an explicit configuration
    pub fn with_config(initial: S::Plain, config: StateConfig) -> Self {
        Optimistic {
            inner: Arc::new(Inner {
                state: Mutex::new(ReconciliationState::new(initial)),
                changes: ChangeChannel::new(),
                config,
            }),
        }
    }

    /// Configuration the container was built with
    pub fn config(&self) -> &StateConfig {
        &self.inner.config
    }

    /// Current visible value: confirmed state plus pending guesses
    pub fn value(&self) -> Arc<S::Plain> {
        self.inner.state.lock().value()
    }

    /// Current speculative snapshot in structured form
    pub fn get_resolved(&self) -> S {
        self.inner.state.lock().speculative().clone()
    }

    /// Confirmed snapshot: initial data plus every succeeded update
    pub fn committed(&self) -> S {
        self.inner.state.lock().canonical().clone()
    }

    /// Number of queued updates
    pub fn pending(&self) -> usize {
        self.inner.state.lock().pending()
    }

    /// Apply a mutation to confirmed and visible state at once.
    ///
    /// The queue is untouched and no change event is published.
    pub fn update(&self, mutation: impl IntoMutation<S, P>) -> OptimistResult<Arc<S::Plain>> {
        let mutation = mutation.into_mutation()?;
        Ok(self.inner.state.lock().apply_now(&mutation))
    }

    /// Speculatively apply a mutation using the configured resolution
    pub fn push_update(&self, mutation: impl IntoMutation<S, P>) -> OptimistResult<UpdateHandle<P>> {
        self.push_update_with(mutation, self.inner.config.resolution)
    }

    /// Speculatively apply a mutation and return the handle used to report
    /// the outcome of the operation it stands for.
    ///
    /// `Resolution::Immediate` must be called from within a Tokio runtime:
    /// the settlement continuation runs as a task on it.
    ///
    /// Every returned handle must eventually be settled. Dropping all clones
    /// of an unsettled handle leaves its update queued and, for
    /// `Immediate`, leaves the continuation task waiting until the runtime
    /// shuts down; dropping the container does not release it.
    ///
    /// # Panics
    ///
    /// Mutations are replayed when an outcome is folded. A mutation that
    /// panics there does so inside the continuation task, where the panic
    /// is only visible through the runtime. The pass it interrupted may
    /// already have committed and dequeued earlier records without
    /// rebuilding the speculative snapshot; the next pass that folds a
    /// settled record rebuilds it.
    pub fn push_update_with(
        &self,
        mutation: impl IntoMutation<S, P>,
        resolution: Resolution,
    ) -> OptimistResult<UpdateHandle<P>> {
        let mutation = mutation.into_mutation()?;
        let runtime = match resolution {
            Resolution::Immediate => {
                Some(Handle::try_current().map_err(|_| OptimistError::RuntimeUnavailable)?)
            }
            Resolution::Deferred => None,
        };

        let cell = Arc::new(SettlementCell::new());
        let (id, change) = self.inner.state.lock().enqueue(
            mutation,
            Arc::clone(&cell),
            runtime.is_some(),
        );

        if let Some(runtime) = runtime {
            let inner = Arc::downgrade(&self.inner);
            let settled = Arc::clone(&cell);
            runtime.spawn(async move {
                settled.settled().await;
                if let Some(inner) = inner.upgrade() {
                    inner.on_settled(id);
                }
            });
        }

        self.inner.publish(change);
        Ok(UpdateHandle::new(id, cell))
    }

    /// Run a full reconciliation pass and return the visible value
    pub fn resolve_updates(&self) -> Arc<S::Plain> {
        let (value, change) = {
            let mut state = self.inner.state.lock();
            let change = state.resolve();
            (state.value(), change)
        };
        self.inner.publish(change);
        value
    }

    /// Register a change handler
    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&Change<S::Plain, P>) + Send + Sync + 'static,
    {
        self.inner.changes.subscribe(handler)
    }

    /// Remove a change handler; `false` if it was not registered
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.changes.unsubscribe(id)
    }
}

impl<S: Snapshot, P> Clone for Optimistic<S, P> {
    fn clone(&self) -> Self {
        Optimistic {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: Snapshot, P: Clone> fmt::Debug for Optimistic<S, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Optimistic")
            .field("pending", &self.inner.state.lock().pending())
            .field("subscribers", &self.inner.changes.len())
            .field("config", &self.inner.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DocumentState, ResolvedUpdate};
    use optimist_core::{Batch, Document, Mutation, Node, Rejection};
    use serde_json::{json, Value};

    type Changes = Arc<Mutex<Vec<Change<Value, Value>>>>;

    fn record_changes(state: &DocumentState) -> Changes {
        let changes: Changes = Arc::new(Mutex::new(Vec::new()));
        let sink = changes.clone();
        state.subscribe(move |c| sink.lock().push(c.clone()));
        changes
    }

    fn setter(field: &'static str, to: &'static str) -> Mutation<Document, Value> {
        Mutation::from_fn(move |doc: Document| doc.set(field, to))
    }

    fn text(doc: &Document, field: &str) -> Option<String> {
        doc.get(field).and_then(Node::as_str).map(str::to_string)
    }

    /// Let spawned settlement continuations run
    async fn drain() {
        for _ in 0..16 {
            tokio::task::yield_now().await;
        }
    }

    #[test]
    fn test_construct() {
        let state = DocumentState::new(json!({ "a": 1, "b": 2, "c": 3 }));

        assert_eq!(*state.value(), json!({ "a": 1, "b": 2, "c": 3 }));
        assert_eq!(state.committed().get("a").and_then(Node::as_i64), Some(1));
        assert_eq!(state.get_resolved().get("a").and_then(Node::as_i64), Some(1));
        assert_eq!(state.pending(), 0);
    }

    #[test]
    fn test_update_applies_immediately() {
        let state = DocumentState::new(json!({ "a": 1, "b": 2, "c": 3 }));
        let changes = record_changes(&state);

        let value = state.update(setter("a", "hello")).unwrap();

        assert_eq!(value["a"], json!("hello"));
        assert_eq!(value["b"], json!(2));
        assert_eq!(text(&state.committed(), "a").as_deref(), Some("hello"));
        assert_eq!(state.pending(), 0);
        assert!(changes.lock().is_empty());
    }

    #[test]
    fn test_invalid_batch_is_rejected() {
        let state = DocumentState::new(json!({ "a": 1 }));
        let bad = Batch::new().set(Vec::new(), 2);

        assert!(matches!(
            state.update(bad.clone()),
            Err(OptimistError::InvalidMutation(_))
        ));
        assert!(matches!(
            state.push_update_with(bad, Resolution::Deferred),
            Err(OptimistError::InvalidMutation(_))
        ));
        assert_eq!(state.pending(), 0);
        assert_eq!(*state.value(), json!({ "a": 1 }));
    }

    #[test]
    fn test_immediate_push_needs_runtime() {
        let state = DocumentState::new(json!({ "test": "hello" }));
        let err = state.push_update(setter("test", "goodbye")).unwrap_err();

        assert_eq!(err, OptimistError::RuntimeUnavailable);
        assert_eq!(state.pending(), 0);
        assert_eq!(*state.value(), json!({ "test": "hello" }));
    }

    #[tokio::test]
    async fn test_applies_updates_optimistically() {
        let state = DocumentState::new(json!({ "test": "hello" }));
        let changes = record_changes(&state);

        let handle = state.push_update(setter("test", "goodbye")).unwrap();

        assert_eq!(state.value()["test"], json!("goodbye"));
        assert_eq!(text(&state.committed(), "test").as_deref(), Some("hello"));
        assert_eq!(text(&state.get_resolved(), "test").as_deref(), Some("goodbye"));
        assert_eq!(state.pending(), 1);
        {
            let changes = changes.lock();
            assert_eq!(changes.len(), 1);
            assert!(changes[0].resolved.is_empty());
            assert!(changes[0].loading);
        }

        handle.succeeded(None);
        drain().await;

        assert_eq!(state.pending(), 0);
        assert_eq!(state.value()["test"], json!("goodbye"));
        assert_eq!(text(&state.committed(), "test").as_deref(), Some("goodbye"));
        assert_eq!(state.committed().to_plain(), state.get_resolved().to_plain());
    }

    #[tokio::test]
    async fn test_rolls_back_failed_updates() {
        let state = DocumentState::new(json!({ "test": "hello" }));
        let changes = record_changes(&state);

        let handle = state.push_update(setter("test", "goodbye")).unwrap();
        assert_eq!(state.value()["test"], json!("goodbye"));

        handle.failed("500: server said no");
        drain().await;

        assert_eq!(state.pending(), 0);
        assert_eq!(state.value()["test"], json!("hello"));

        let changes = changes.lock();
        assert_eq!(changes.len(), 2);
        let rollback = &changes[1];
        assert_eq!(rollback.value["test"], json!("hello"));
        assert!(!rollback.loading);
        assert_eq!(
            rollback.resolved,
            vec![ResolvedUpdate::Failed {
                id: handle.id(),
                reason: Rejection::new("500: server said no"),
            }]
        );
    }

    #[tokio::test]
    async fn test_mixed_updates() {
        let state = DocumentState::new(json!({
            "test_a": "hello1", "test_b": "hello2", "test_c": "hello3"
        }));
        let a = state.push_update(setter("test_a", "goodbye1")).unwrap();
        let b = state.push_update(setter("test_b", "goodbye2")).unwrap();
        let c = state.push_update(setter("test_c", "goodbye3")).unwrap();
        assert_eq!(state.pending(), 3);

        c.failed("rejected");
        drain().await;
        a.succeeded(None);
        drain().await;
        b.succeeded(None);
        drain().await;

        assert_eq!(
            *state.value(),
            json!({ "test_a": "goodbye1", "test_b": "goodbye2", "test_c": "hello3" })
        );
        assert_eq!(state.committed().to_plain(), *state.value());
        assert_eq!(state.pending(), 0);
    }

    #[tokio::test]
    async fn test_success_payload_patches_through() {
        let state = DocumentState::new(json!({ "test": "hello" }));
        let changes = record_changes(&state);

        let handle = state
            .push_update(Mutation::new(|doc: Document, payload: Option<&Value>| {
                doc.set("test", payload.and_then(Value::as_str).unwrap_or("goodbye"))
            }))
            .unwrap();
        assert_eq!(state.value()["test"], json!("goodbye"));

        handle.succeeded(Some(json!("ADIOS!")));
        drain().await;

        assert_eq!(state.value()["test"], json!("ADIOS!"));
        assert_eq!(text(&state.committed(), "test").as_deref(), Some("ADIOS!"));

        let changes = changes.lock();
        let last = changes.last().unwrap();
        assert_eq!(last.resolved[0].payload(), Some(&json!("ADIOS!")));
    }

    #[tokio::test]
    async fn test_payload_kept_out_of_view_without_adoption() {
        let config = StateConfig {
            adopt_payload: false,
            ..StateConfig::default()
        };
        let state = DocumentState::with_config(json!({ "test": "hello" }), config);
        let changes = record_changes(&state);

        let handle = state
            .push_update(Mutation::new(|doc: Document, payload: Option<&Value>| {
                doc.set("test", payload.and_then(Value::as_str).unwrap_or("goodbye"))
            }))
            .unwrap();
        assert_eq!(changes.lock().len(), 1);

        handle.succeeded(Some(json!("ADIOS!")));
        drain().await;

        assert_eq!(text(&state.committed(), "test").as_deref(), Some("ADIOS!"));
        assert_eq!(state.value()["test"], json!("goodbye"));
        assert_eq!(text(&state.get_resolved(), "test").as_deref(), Some("goodbye"));
        assert_eq!(state.pending(), 0);
        assert_eq!(changes.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_repeated_settlement_is_noop() {
        let state = DocumentState::new(json!({ "test": "hello" }));
        let handle = state.push_update(setter("test", "goodbye")).unwrap();

        assert!(handle.succeeded(None));
        assert!(!handle.failed("late failure"));
        drain().await;

        assert_eq!(state.value()["test"], json!("goodbye"));
        assert_eq!(state.pending(), 0);
    }

    #[test]
    fn test_deferred_updates_wait_for_manual_resolve() {
        let state = DocumentState::with_config(
            json!({ "a": "x", "b": "x", "c": "x" }),
            StateConfig::deferred(),
        );
        let changes = record_changes(&state);

        let a = state.push_update(setter("a", "y")).unwrap();
        let b = state.push_update(setter("b", "y")).unwrap();
        let c = state.push_update(setter("c", "y")).unwrap();

        assert_eq!(*state.value(), json!({ "a": "y", "b": "y", "c": "y" }));
        assert!(changes.lock().is_empty());

        a.succeeded(None);
        b.failed("nope");
        assert_eq!(state.pending(), 3);

        let value = state.resolve_updates();
        assert_eq!(*value, json!({ "a": "y", "b": "x", "c": "y" }));
        assert_eq!(state.pending(), 1);

        {
            let changes = changes.lock();
            assert_eq!(changes.len(), 1);
            assert_eq!(changes[0].resolved.len(), 2);
            assert!(changes[0].loading);
        }

        c.succeeded(None);
        state.resolve_updates();
        assert_eq!(state.pending(), 0);
        assert_eq!(state.committed().to_plain(), json!({ "a": "y", "b": "x", "c": "y" }));
    }

    #[test]
    fn test_no_spurious_notification() {
        let state = DocumentState::with_config(json!({ "a": "x" }), StateConfig::deferred());
        let changes = record_changes(&state);

        state.resolve_updates();
        state.push_update(setter("a", "y")).unwrap();
        let before = state.value();
        let value = state.resolve_updates();

        assert!(Arc::ptr_eq(&before, &value));
        assert!(changes.lock().is_empty());
    }

    #[tokio::test]
    async fn test_handler_may_read_container() {
        let state = DocumentState::new(json!({ "test": "hello" }));
        let seen = Arc::new(Mutex::new(Vec::new()));

        let (reader, sink) = (state.clone(), seen.clone());
        state.subscribe(move |_| sink.lock().push(reader.pending()));

        let handle = state.push_update(setter("test", "goodbye")).unwrap();
        handle.failed("no");
        drain().await;

        assert_eq!(*seen.lock(), vec![1, 0]);
    }

    #[tokio::test]
    async fn test_unsubscribed_handler_stops_receiving() {
        let state = DocumentState::new(json!({ "n": "0" }));
        let changes = record_changes(&state);
        let other = Arc::new(Mutex::new(0));
        let sink = other.clone();
        let id = state.subscribe(move |_| *sink.lock() += 1);

        state.push_update(setter("n", "1")).unwrap();
        assert!(state.unsubscribe(id));
        state.push_update(setter("n", "2")).unwrap();

        assert_eq!(changes.lock().len(), 2);
        assert_eq!(*other.lock(), 1);
    }
}
