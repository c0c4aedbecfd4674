// ============================================================================
// Transaction State
// ============================================================================
//
// A coordinator is either idle or holds one active transaction. Nested
// requests on the owning thread join the active transaction instead of
// opening a new one, so every nested call commits or rolls back as a unit.
//
// ============================================================================

use crate::storage::PersistHandle;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::ThreadId;

/// Global transaction ID counter
static NEXT_TXN_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a top-level transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransactionId(pub u64);

impl TransactionId {
    /// Generate a new unique transaction ID
    pub fn new() -> Self {
        TransactionId(NEXT_TXN_ID.fetch_add(1, Ordering::SeqCst))
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "txn_{}", self.0)
    }
}

/// Coordinator state
///
/// ```text
/// Idle ──begin──> Active ──commit/rollback──> Idle
///                   │
///                   └──nested begin──> (join, depth + 1)
/// ```
#[derive(Debug, Clone)]
pub enum TransactionState<S> {
    Idle,
    Active(ActiveTransaction<S>),
}

#[derive(Debug, Clone)]
pub struct ActiveTransaction<S> {
    pub id: TransactionId,
    /// Snapshot that was current before the transaction began
    pub pre: S,
    pub owner: ThreadId,
    pub depth: usize,
}

impl<S> TransactionState<S> {
    pub fn is_active(&self) -> bool {
        matches!(self, TransactionState::Active(_))
    }

    pub fn active(&self) -> Option<&ActiveTransaction<S>> {
        match self {
            TransactionState::Active(active) => Some(active),
            TransactionState::Idle => None,
        }
    }

    pub fn active_mut(&mut self) -> Option<&mut ActiveTransaction<S>> {
        match self {
            TransactionState::Active(active) => Some(active),
            TransactionState::Idle => None,
        }
    }
}

/// How a `with_transaction` call ended.
pub enum TxOutcome<T> {
    /// Top-level transaction committed; the snapshot write is queued
    Committed { value: T, persist: PersistHandle },
    /// Ran inside an already active transaction
    Joined(T),
    /// Rolled back silently; edits were discarded
    RolledBack,
}

impl<T> TxOutcome<T> {
    pub fn is_committed(&self) -> bool {
        matches!(self, TxOutcome::Committed { .. })
    }

    pub fn is_joined(&self) -> bool {
        matches!(self, TxOutcome::Joined(_))
    }

    pub fn is_rolled_back(&self) -> bool {
        matches!(self, TxOutcome::RolledBack)
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            TxOutcome::Committed { value, .. } | TxOutcome::Joined(value) => Some(value),
            TxOutcome::RolledBack => None,
        }
    }

    pub fn into_value(self) -> Option<T> {
        match self {
            TxOutcome::Committed { value, .. } | TxOutcome::Joined(value) => Some(value),
            TxOutcome::RolledBack => None,
        }
    }

    /// Completion handle of the queued snapshot write, for committed outcomes
    pub fn into_persist_handle(self) -> Option<PersistHandle> {
        match self {
            TxOutcome::Committed { persist, .. } => Some(persist),
            _ => None,
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for TxOutcome<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TxOutcome::Committed { value, .. } => f.debug_tuple("Committed").field(value).finish(),
            TxOutcome::Joined(value) => f.debug_tuple("Joined").field(value).finish(),
            TxOutcome::RolledBack => f.write_str("RolledBack"),
        }
    }
}

/// Counters kept by a coordinator.
#[derive(Debug, Default)]
pub(crate) struct TxCounters {
    pub commits: AtomicU64,
    pub rollbacks: AtomicU64,
    pub joins: AtomicU64,
}

impl TxCounters {
    pub fn snapshot(&self) -> TxStats {
        TxStats {
            commits: self.commits.load(Ordering::SeqCst),
            rollbacks: self.rollbacks.load(Ordering::SeqCst),
            joins: self.joins.load(Ordering::SeqCst),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TxStats {
    pub commits: u64,
    pub rollbacks: u64,
    pub joins: u64,
}
