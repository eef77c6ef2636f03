//! Optimist Core - Fundamental types and primitives
//!
//! This crate defines the types shared by the optimistic state engine:
//! - Identifiers (UpdateId, SubscriptionId)
//! - The snapshot contract and the persistent `Document` snapshot
//! - Edits, batches and mutations
//! - Error and rejection types

pub mod id;
pub mod snapshot;
pub mod document;
pub mod edit;
pub mod mutation;
pub mod error;

pub use id::*;
pub use snapshot::*;
pub use document::*;
pub use edit::*;
pub use mutation::*;
pub use error::*;
