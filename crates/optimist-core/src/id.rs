//! Identity types
//!
//! Identifiers are plain 64-bit counters handed out by the owning container.

use std::fmt;

/// Update identity - one per pushed speculative update, unique per container
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct UpdateId(pub u64);

impl UpdateId {
    pub const ZERO: UpdateId = UpdateId(0);

    #[inline]
    pub fn new(id: u64) -> Self {
        UpdateId(id)
    }

    /// The id following this one
    #[inline]
    pub fn next(self) -> Self {
        UpdateId(self.0.wrapping_add(1))
    }
}

impl fmt::Debug for UpdateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Update({})", self.0)
    }
}

impl fmt::Display for UpdateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Subscription identity - handle used to detach a change handler
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct SubscriptionId(pub u64);

impl SubscriptionId {
    #[inline]
    pub fn new(id: u64) -> Self {
        SubscriptionId(id)
    }

    #[inline]
    pub fn next(self) -> Self {
        SubscriptionId(self.0.wrapping_add(1))
    }
}

impl fmt::Debug for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sub({})", self.0)
    }
}
