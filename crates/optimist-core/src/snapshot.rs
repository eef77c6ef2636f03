//! Snapshot contract
//!
//! A snapshot is an immutable, structurally-shared value. Producing a new
//! snapshot from an old one must be cheap, and so must asking whether two
//! snapshots are the very same value (identity, not deep equality).

/// Immutable structured state held by the engine
pub trait Snapshot: Clone + Send + Sync + 'static {
    /// Plain, non-persistent projection handed to observers
    type Plain: Send + Sync + 'static;

    /// Build a snapshot from a plain value
    fn from_plain(plain: &Self::Plain) -> Self;

    /// Project the snapshot into its plain form
    fn to_plain(&self) -> Self::Plain;

    /// Cheap identity comparison.
    ///
    /// Returning `false` for equal-but-distinct values is allowed; returning
    /// `true` for values that differ is not.
    fn same(&self, other: &Self) -> bool;
}
