//! Reconciliation of the update queue
//!
//! The speculative snapshot is always derived as canonical plus every
//! still-pending mutation. A pass rebuilds it from canonical instead of
//! patching it, so a failed update is rolled back simply by not being
//! replayed.

use std::sync::Arc;

use optimist_core::{Mutation, Snapshot, UpdateId};
use tracing::{debug, trace};

use crate::record::UpdateRecord;
use crate::{Change, Outcome, ResolvedUpdate, SettlementCell};

/// Canonical/speculative snapshot pair plus the pending update queue
pub(crate) struct ReconciliationState<S: Snapshot, P> {
    /// Initial data plus every confirmed mutation
    canonical: S,
    /// Canonical plus every pending mutation
    speculative: S,
    /// Plain projection of `speculative`
    value: Arc<S::Plain>,
    queue: Vec<UpdateRecord<S, P>>,
    last_id: UpdateId,
}

impl<S: Snapshot, P: Clone> ReconciliationState<S, P> {
    pub fn new(initial: S::Plain) -> Self {
        let canonical = S::from_plain(&initial);
        ReconciliationState {
            speculative: canonical.clone(),
            canonical,
            value: Arc::new(initial),
            queue: Vec::new(),
            last_id: UpdateId::ZERO,
        }
    }

    pub fn canonical(&self) -> &S {
        &self.canonical
    }

    pub fn speculative(&self) -> &S {
        &self.speculative
    }

    pub fn value(&self) -> Arc<S::Plain> {
        Arc::clone(&self.value)
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Apply a mutation to both snapshots right away, bypassing the queue
    pub fn apply_now(&mut self, mutation: &Mutation<S, P>) -> Arc<S::Plain> {
        self.canonical = mutation.apply(self.canonical.clone(), None);
        let before = self.speculative.clone();
        self.speculative = mutation.apply(before.clone(), None);
        if !self.speculative.same(&before) {
            self.refresh_value();
        }
        self.value()
    }

    /// Apply a mutation speculatively and queue it until it settles.
    ///
    /// With `announce` set, a visible change is returned for publishing.
    pub fn enqueue(
        &mut self,
        mutation: Mutation<S, P>,
        cell: Arc<SettlementCell<P>>,
        announce: bool,
    ) -> (UpdateId, Option<Change<S::Plain, P>>) {
        self.last_id = self.last_id.next();
        let id = self.last_id;

        let before = self.speculative.clone();
        self.speculative = mutation.apply(before.clone(), None);

        let mut change = None;
        if !self.speculative.same(&before) {
            self.refresh_value();
            if announce {
                change = Some(Change {
                    value: self.value(),
                    resolved: Vec::new(),
                    loading: true,
                });
            }
        }

        self.queue.push(UpdateRecord { id, mutation, cell });
        trace!(update = %id, queued = self.queue.len(), "speculative update queued");
        (id, change)
    }

    /// Full reconciliation pass.
    ///
    /// Returns the change to publish, if the speculative snapshot moved.
    pub fn resolve(&mut self) -> Option<Change<S::Plain, P>> {
        if self.queue.is_empty() {
            return None;
        }
        // Nothing settled: the rebuild would reproduce the current snapshot
        if self.queue.iter().all(UpdateRecord::is_pending) {
            trace!(pending = self.queue.len(), "no settled updates to reconcile");
            return None;
        }

        let before = self.speculative.clone();
        let mut speculative = self.canonical.clone();
        let mut resolved = Vec::new();

        let mut i = 0;
        while i < self.queue.len() {
            let record = &self.queue[i];
            match record.outcome() {
                Outcome::Pending => {
                    speculative = record.mutation.apply(speculative, None);
                    i += 1;
                }
                Outcome::Succeeded(payload) => {
                    speculative = record.mutation.apply(speculative, payload.as_ref());
                    self.canonical = record
                        .mutation
                        .apply(self.canonical.clone(), payload.as_ref());
                    resolved.push(ResolvedUpdate::Succeeded {
                        id: record.id,
                        payload,
                    });
                    self.queue.remove(i);
                }
                Outcome::Failed(reason) => {
                    debug!(update = %record.id, %reason, "rolling back failed update");
                    resolved.push(ResolvedUpdate::Failed {
                        id: record.id,
                        reason,
                    });
                    self.queue.remove(i);
                }
            }
        }

        let committed = resolved.iter().filter(|r| r.succeeded()).count();
        debug!(
            committed,
            rolled_back = resolved.len() - committed,
            pending = self.queue.len(),
            "reconciled update queue"
        );

        self.rebase(speculative, &before, resolved)
    }

    /// Fold the settlement of one immediately-resolving update.
    ///
    /// Success commits the single record into canonical without a full
    /// pass; failure runs a full pass to roll it back. A record already
    /// folded by an earlier pass is ignored.
    pub fn settle(&mut self, id: UpdateId, adopt_payload: bool) -> Option<Change<S::Plain, P>> {
        let Some(index) = self.queue.iter().position(|r| r.id == id) else {
            trace!(update = %id, "update already reconciled");
            return None;
        };

        match self.queue[index].outcome() {
            Outcome::Pending => None,
            Outcome::Failed(_) => self.resolve(),
            Outcome::Succeeded(payload) => {
                let record = self.queue.remove(index);
                self.canonical = record.mutation.apply(self.canonical.clone(), payload.as_ref());
                debug!(update = %id, pending = self.queue.len(), "committed confirmed update");

                if payload.is_none() || !adopt_payload {
                    return None;
                }

                // The guess was applied without the payload
                let before = self.speculative.clone();
                let mut speculative = self.canonical.clone();
                for record in &self.queue {
                    speculative = record
                        .mutation
                        .apply(speculative, record.cell.payload().as_ref());
                }
                self.rebase(
                    speculative,
                    &before,
                    vec![ResolvedUpdate::Succeeded { id, payload }],
                )
            }
        }
    }

    fn rebase(
        &mut self,
        speculative: S,
        before: &S,
        resolved: Vec<ResolvedUpdate<P>>,
    ) -> Option<Change<S::Plain, P>> {
        self.speculative = speculative;
        if self.speculative.same(before) {
            return None;
        }
        self.refresh_value();
        Some(Change {
            value: self.value(),
            resolved,
            loading: !self.queue.is_empty(),
        })
    }

    fn refresh_value(&mut self) {
        self.value = Arc::new(self.speculative.to_plain());
    }
}
