//! Settlement handles
//!
//! Every pushed update owns one settlement cell. The caller settles it
//! through an [`UpdateHandle`]; the engine reads the outcome during
//! reconciliation and awaits it from the continuation task.

use std::fmt;
use std::sync::Arc;

use optimist_core::{Rejection, UpdateId};
use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::{debug, trace};

/// Outcome of an asynchronous operation
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome<P> {
    Pending,
    Succeeded(Option<P>),
    Failed(Rejection),
}

impl<P> Outcome<P> {
    #[inline]
    pub fn is_pending(&self) -> bool {
        matches!(self, Outcome::Pending)
    }

    #[inline]
    pub fn is_succeeded(&self) -> bool {
        matches!(self, Outcome::Succeeded(_))
    }

    #[inline]
    pub fn is_failed(&self) -> bool {
        matches!(self, Outcome::Failed(_))
    }
}

/// Write-once outcome slot shared by a handle and its update record
pub struct SettlementCell<P> {
    outcome: Mutex<Outcome<P>>,
    settled: Notify,
}

impl<P: Clone> SettlementCell<P> {
    pub fn new() -> Self {
        SettlementCell {
            outcome: Mutex::new(Outcome::Pending),
            settled: Notify::new(),
        }
    }

    /// Move out of `Pending`. Only the first call has an effect.
    pub fn settle(&self, outcome: Outcome<P>) -> bool {
        if outcome.is_pending() {
            return false;
        }
        {
            let mut current = self.outcome.lock();
            if !current.is_pending() {
                return false;
            }
            *current = outcome;
        }
        self.settled.notify_waiters();
        true
    }

    pub fn outcome(&self) -> Outcome<P> {
        self.outcome.lock().clone()
    }

    pub fn is_pending(&self) -> bool {
        self.outcome.lock().is_pending()
    }

    pub fn is_succeeded(&self) -> bool {
        self.outcome.lock().is_succeeded()
    }

    pub fn is_failed(&self) -> bool {
        self.outcome.lock().is_failed()
    }

    /// Payload of a successful settlement
    pub fn payload(&self) -> Option<P> {
        match &*self.outcome.lock() {
            Outcome::Succeeded(payload) => payload.clone(),
            _ => None,
        }
    }

    /// Reason of a failed settlement
    pub fn reason(&self) -> Option<Rejection> {
        match &*self.outcome.lock() {
            Outcome::Failed(reason) => Some(reason.clone()),
            _ => None,
        }
    }

    /// Resolves once the cell has left `Pending`
    pub async fn settled(&self) {
        loop {
            // Registered before the check so a concurrent settle cannot be missed
            let notified = self.settled.notified();
            if !self.is_pending() {
                return;
            }
            notified.await;
        }
    }
}

impl<P: Clone> Default for SettlementCell<P> {
    fn default() -> Self {
        Self::new()
    }
}

/// Reporting side of a pushed update
pub struct UpdateHandle<P> {
    id: UpdateId,
    cell: Arc<SettlementCell<P>>,
}

impl<P: Clone> UpdateHandle<P> {
    pub(crate) fn new(id: UpdateId, cell: Arc<SettlementCell<P>>) -> Self {
        UpdateHandle { id, cell }
    }

    pub fn id(&self) -> UpdateId {
        self.id
    }

    /// Report success, optionally with the value the operation produced.
    /// Returns `false` if the update was already settled.
    pub fn succeeded(&self, payload: Option<P>) -> bool {
        let settled = self.cell.settle(Outcome::Succeeded(payload));
        if settled {
            trace!(update = %self.id, "update succeeded");
        } else {
            debug!(update = %self.id, "ignored repeated settlement");
        }
        settled
    }

    /// Report failure. Returns `false` if the update was already settled.
    pub fn failed(&self, reason: impl Into<Rejection>) -> bool {
        let reason = reason.into();
        let settled = self.cell.settle(Outcome::Failed(reason));
        if settled {
            trace!(update = %self.id, "update failed");
        } else {
            debug!(update = %self.id, "ignored repeated settlement");
        }
        settled
    }

    pub fn outcome(&self) -> Outcome<P> {
        self.cell.outcome()
    }

    pub fn is_pending(&self) -> bool {
        self.cell.is_pending()
    }

    /// Wait for settlement and return the outcome
    pub async fn settled(&self) -> Outcome<P> {
        self.cell.settled().await;
        self.cell.outcome()
    }
}

impl<P> Clone for UpdateHandle<P> {
    fn clone(&self) -> Self {
        UpdateHandle {
            id: self.id,
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<P> fmt::Debug for UpdateHandle<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateHandle").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle() -> UpdateHandle<u32> {
        UpdateHandle::new(UpdateId::new(1), Arc::new(SettlementCell::new()))
    }

    #[test]
    fn test_first_settlement_wins() {
        let h = handle();
        assert!(h.is_pending());

        assert!(h.succeeded(Some(7)));
        assert!(!h.failed("too late"));
        assert!(!h.succeeded(Some(8)));

        assert_eq!(h.outcome(), Outcome::Succeeded(Some(7)));
        assert_eq!(h.cell.payload(), Some(7));
        assert_eq!(h.cell.reason(), None);
    }

    #[test]
    fn test_failure_carries_reason() {
        let h = handle();
        assert!(h.failed("500: We don't like Marcy."));
        assert!(h.cell.is_failed());
        assert!(!h.cell.is_succeeded());
        assert_eq!(h.cell.reason(), Some(Rejection::new("500: We don't like Marcy.")));
        assert_eq!(h.cell.payload(), None);
    }

    #[test]
    fn test_pending_is_not_a_settlement() {
        let cell: SettlementCell<u32> = SettlementCell::new();
        assert!(!cell.settle(Outcome::Pending));
        assert!(cell.is_pending());
    }

    #[tokio::test]
    async fn test_settled_wakes_waiter() {
        let h = handle();
        let waiter = h.clone();
        let task = tokio::spawn(async move { waiter.settled().await });

        tokio::task::yield_now().await;
        h.succeeded(None);

        assert_eq!(task.await.unwrap(), Outcome::Succeeded(None));
    }

    #[tokio::test]
    async fn test_settled_returns_immediately_when_done() {
        let h = handle();
        h.failed("nope");
        assert!(h.settled().await.is_failed());
    }
}
