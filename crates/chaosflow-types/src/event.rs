//! Event types for the node store event bus.
//!
//! `StoreEvent` is broadcast after every store mutation. All types are
//! Clone + Send + Sync for use with tokio broadcast channels.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::workflow::{NodeId, StoreSnapshot};

/// The mutation that produced a store event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreChange {
    /// The whole mapping was replaced.
    Imported { count: usize },

    /// A node was inserted or fully replaced.
    Upserted { id: NodeId },

    /// A node was deleted.
    Removed { id: NodeId },

    /// The mapping was emptied.
    Reset,
}

/// Published by the node store after each mutation.
///
/// Carries the immutable snapshot taken right after the mutation, so
/// subscribers never observe a partially applied change.
#[derive(Debug, Clone)]
pub struct StoreEvent {
    pub revision: u64,
    pub change: StoreChange,
    pub snapshot: StoreSnapshot,
    pub at: DateTime<Utc>,
}
