//! Update records and resolved-update reports

use std::sync::Arc;

use optimist_core::{Mutation, Rejection, UpdateId};

use crate::{Outcome, SettlementCell};

/// Queued binding of a mutation to its settlement
pub(crate) struct UpdateRecord<S, P> {
    pub id: UpdateId,
    pub mutation: Mutation<S, P>,
    pub cell: Arc<SettlementCell<P>>,
}

impl<S, P: Clone> UpdateRecord<S, P> {
    pub fn outcome(&self) -> Outcome<P> {
        self.cell.outcome()
    }

    pub fn is_pending(&self) -> bool {
        self.cell.is_pending()
    }
}

/// Report for one update removed from the queue
#[derive(Clone, Debug, PartialEq)]
pub enum ResolvedUpdate<P> {
    Succeeded { id: UpdateId, payload: Option<P> },
    Failed { id: UpdateId, reason: Rejection },
}

impl<P> ResolvedUpdate<P> {
    pub fn id(&self) -> UpdateId {
        match self {
            ResolvedUpdate::Succeeded { id, .. } | ResolvedUpdate::Failed { id, .. } => *id,
        }
    }

    pub fn succeeded(&self) -> bool {
        matches!(self, ResolvedUpdate::Succeeded { .. })
    }

    pub fn payload(&self) -> Option<&P> {
        match self {
            ResolvedUpdate::Succeeded { payload, .. } => payload.as_ref(),
            ResolvedUpdate::Failed { .. } => None,
        }
    }

    pub fn reason(&self) -> Option<&Rejection> {
        match self {
            ResolvedUpdate::Failed { reason, .. } => Some(reason),
            ResolvedUpdate::Succeeded { .. } => None,
        }
    }
}
