//! Optimist State Engine - Speculative updates with reconciliation and rollback
//!
//! This crate implements the dual-state reconciliation engine:
//! - Canonical and speculative snapshots
//! - The pending update queue and settlement handles
//! - The resolver pass that commits or rolls back settled updates
//! - Change notification

pub mod channel;
pub mod config;
pub mod container;
pub mod record;
mod resolver;
pub mod settlement;

pub use channel::*;
pub use config::*;
pub use container::*;
pub use record::*;
pub use settlement::*;

/// Container over the persistent `Document` snapshot with JSON payloads
pub type DocumentState = Optimistic<optimist_core::Document, serde_json::Value>;
