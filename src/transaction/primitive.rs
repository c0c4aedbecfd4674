use crate::core::Result;
use crate::storage::GraphStore;

/// Work executed against a branch snapshot. It consumes the branch and hands
/// back the mutated branch.
pub type TxWork<'a, S> = Box<dyn FnOnce(S) -> Result<S> + 'a>;

pub enum PrimitiveOutcome<S> {
    Committed(S),
    RolledBack,
}

/// Low-level transaction primitive.
///
/// `run` branches `snapshot`, executes `work` against the branch and reports
/// exactly one outcome. `Err` means the branch was discarded and the error is
/// rethrown to the caller.
pub trait TransactionPrimitive<S>: Send + Sync {
    fn run<'a>(&self, snapshot: S, work: TxWork<'a, S>) -> Result<PrimitiveOutcome<S>>;
}

/// Copy-on-write primitive for stores whose `Clone` shares structure.
///
/// `GraphError::Aborted` from the work is a silent rollback; any other error
/// discards the branch and propagates.
#[derive(Debug, Clone, Copy, Default)]
pub struct BranchTransaction;

impl<S: GraphStore> TransactionPrimitive<S> for BranchTransaction {
    fn run<'a>(&self, snapshot: S, work: TxWork<'a, S>) -> Result<PrimitiveOutcome<S>> {
        match work(snapshot) {
            Ok(branch) => Ok(PrimitiveOutcome::Committed(branch)),
            Err(err) if err.is_aborted() => Ok(PrimitiveOutcome::RolledBack),
            Err(err) => Err(err),
        }
    }
}
