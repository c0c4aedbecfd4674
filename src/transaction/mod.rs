// ============================================================================
// Transaction Module
// ============================================================================
//
// Reentrant transactions over copy-on-write graph snapshots:
// - the primitive branches a snapshot and reports commit or rollback
// - the coordinator swaps the current snapshot and queues persistence
//
// ============================================================================

pub mod coordinator;
pub mod primitive;
pub mod state;

pub use coordinator::{RollbackHook, TransactionCoordinator};
pub use primitive::{BranchTransaction, PrimitiveOutcome, TransactionPrimitive, TxWork};
pub use state::{TransactionId, TransactionState, TxOutcome, TxStats};
