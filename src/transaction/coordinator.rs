// ============================================================================
// Transaction Coordinator
// ============================================================================

use super::primitive::{PrimitiveOutcome, TransactionPrimitive};
use super::state::{ActiveTransaction, TransactionId, TransactionState, TxCounters, TxOutcome, TxStats};
use crate::core::{GraphError, Result};
use crate::storage::{GraphStore, PersistHandle, PersistenceQueue, SnapshotFormat};
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::thread;
use tracing::{Level, event, info_span};

/// Callback run with the restored snapshot when a transaction rolls back
pub type RollbackHook<S> = Box<dyn FnOnce(&S) + Send>;

struct CoordinatorState<S> {
    /// Committed snapshot while idle, the transaction branch while active
    current: S,
    tx: TransactionState<S>,
    rollback_hooks: Vec<RollbackHook<S>>,
}

/// Owns the current snapshot and runs work inside reentrant transactions.
///
/// Only the coordinator replaces the current snapshot: on commit it becomes
/// the branch, on rollback it is restored to the pre-transaction snapshot.
/// Every top-level commit queues exactly one snapshot write.
pub struct TransactionCoordinator<S: GraphStore> {
    state: Mutex<CoordinatorState<S>>,
    primitive: Arc<dyn TransactionPrimitive<S>>,
    queue: Arc<PersistenceQueue>,
    format: SnapshotFormat,
    counters: TxCounters,
}

impl<S: GraphStore> TransactionCoordinator<S> {
    pub fn new(
        store: S,
        primitive: Arc<dyn TransactionPrimitive<S>>,
        queue: Arc<PersistenceQueue>,
        format: SnapshotFormat,
    ) -> Self {
        Self {
            state: Mutex::new(CoordinatorState {
                current: store,
                tx: TransactionState::Idle,
                rollback_hooks: Vec::new(),
            }),
            primitive,
            queue,
            format,
            counters: TxCounters::default(),
        }
    }

    /// Run `work` inside a transaction.
    ///
    /// With no active transaction a new one is opened through the primitive.
    /// While one is active on the calling thread, `work` runs inline and
    /// joins it; the outer call decides commit or rollback for both.
    /// Returning `GraphError::Aborted` from `work` rolls back silently; any
    /// other error rolls back and propagates.
    pub fn with_transaction<T>(&self, work: impl FnOnce() -> Result<T>) -> Result<TxOutcome<T>> {
        let me = thread::current().id();
        let begin = {
            let mut state = self.state.lock()?;
            let owner = state.tx.active().map(|active| active.owner);
            match owner {
                Some(owner) if owner == me => {
                    if let Some(active) = state.tx.active_mut() {
                        active.depth += 1;
                    }
                    None
                }
                Some(_) => return Err(GraphError::TransactionBusy),
                None => {
                    let id = TransactionId::new();
                    let pre = state.current.clone();
                    state.tx = TransactionState::Active(ActiveTransaction {
                        id,
                        pre: pre.clone(),
                        owner: me,
                        depth: 1,
                    });
                    Some((id, pre))
                }
            }
        };

        let Some((id, snapshot)) = begin else {
            self.counters.joins.fetch_add(1, Ordering::SeqCst);
            let result = work();
            self.leave_nested()?;
            return result.map(TxOutcome::Joined);
        };

        let span = info_span!("transaction", id = %id);
        let _enter = span.enter();
        let mut guard = RollbackGuard {
            coordinator: self,
            armed: true,
        };

        let mut value = None;
        let outcome = self.primitive.run(
            snapshot,
            Box::new(|branch: S| {
                self.install(branch)?;
                value = Some(work()?);
                self.read_current()
            }),
        );
        guard.armed = false;

        match outcome {
            Ok(PrimitiveOutcome::Committed(branch)) => match value {
                Some(value) => {
                    let persist = self.on_commit(id, branch)?;
                    Ok(TxOutcome::Committed { value, persist })
                }
                // The primitive committed without running the work
                None => {
                    self.finish_rollback(id)?;
                    Ok(TxOutcome::RolledBack)
                }
            },
            Ok(PrimitiveOutcome::RolledBack) => {
                self.finish_rollback(id)?;
                Ok(TxOutcome::RolledBack)
            }
            Err(err) => {
                self.finish_rollback(id)?;
                event!(Level::DEBUG, error = %err, "transaction failed");
                Err(err)
            }
        }
    }

    /// Read the store. The owning thread of an active transaction sees its
    /// branch; everybody else sees the last committed snapshot.
    pub fn read<R>(&self, f: impl FnOnce(&S) -> R) -> Result<R> {
        let state = self.state.lock()?;
        match state.tx.active() {
            Some(active) if active.owner != thread::current().id() => Ok(f(&active.pre)),
            _ => Ok(f(&state.current)),
        }
    }

    /// Mutate the active branch. Fails outside a transaction.
    pub fn write<R>(&self, f: impl FnOnce(&mut S) -> Result<R>) -> Result<R> {
        let mut state = self.state.lock()?;
        let owner = state.tx.active().map(|active| active.owner);
        match owner {
            None => Err(GraphError::NoActiveTransaction),
            Some(owner) if owner != thread::current().id() => Err(GraphError::TransactionBusy),
            Some(_) => f(&mut state.current),
        }
    }

    /// Run `hook` with the restored snapshot if the transaction active on the
    /// calling thread rolls back. Hooks are dropped on commit. Returns `false`
    /// when the caller has no active transaction.
    pub fn on_rollback(&self, hook: impl FnOnce(&S) + Send + 'static) -> Result<bool> {
        let mut state = self.state.lock()?;
        match state.tx.active() {
            Some(active) if active.owner == thread::current().id() => {
                state.rollback_hooks.push(Box::new(hook));
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Clone of the snapshot visible to the caller
    pub fn snapshot(&self) -> Result<S> {
        self.read(S::clone)
    }

    pub fn is_active(&self) -> bool {
        self.state
            .lock()
            .map(|state| state.tx.is_active())
            .unwrap_or(false)
    }

    /// Nesting depth of the active transaction, 0 when idle
    pub fn depth(&self) -> usize {
        self.state
            .lock()
            .ok()
            .and_then(|state| state.tx.active().map(|active| active.depth))
            .unwrap_or(0)
    }

    pub fn stats(&self) -> TxStats {
        self.counters.snapshot()
    }

    pub fn persistence(&self) -> &Arc<PersistenceQueue> {
        &self.queue
    }

    pub fn format(&self) -> SnapshotFormat {
        self.format
    }

    fn install(&self, branch: S) -> Result<()> {
        self.state.lock()?.current = branch;
        Ok(())
    }

    fn read_current(&self) -> Result<S> {
        Ok(self.state.lock()?.current.clone())
    }

    fn leave_nested(&self) -> Result<()> {
        let mut state = self.state.lock()?;
        if let Some(active) = state.tx.active_mut() {
            active.depth = active.depth.saturating_sub(1);
        }
        Ok(())
    }

    fn on_commit(&self, id: TransactionId, branch: S) -> Result<PersistHandle> {
        let mut state = self.state.lock()?;
        state.current = branch;
        // Enqueue before going idle so queue order matches commit order
        let persist = if self.queue.is_durable() {
            match self.format.encode(&state.current.to_document()) {
                Ok(bytes) => self.queue.enqueue(bytes),
                Err(err) => PersistHandle::failed(err),
            }
        } else {
            self.queue.enqueue(Vec::new())
        };
        state.tx = TransactionState::Idle;
        state.rollback_hooks.clear();
        self.counters.commits.fetch_add(1, Ordering::SeqCst);
        event!(
            Level::DEBUG,
            %id,
            vertices = state.current.vertex_count(),
            edges = state.current.edge_count(),
            "transaction committed"
        );
        Ok(persist)
    }

    fn finish_rollback(&self, id: TransactionId) -> Result<()> {
        let restored = restore_pre(&mut *self.state.lock()?);
        self.counters.rollbacks.fetch_add(1, Ordering::SeqCst);
        event!(Level::DEBUG, %id, hooks = restored.1.len(), "transaction rolled back");
        run_rollback_hooks(restored);
        Ok(())
    }
}

/// Put the pre-transaction snapshot back and hand out the registered hooks.
/// Hooks run after the state lock is released.
fn restore_pre<S: GraphStore>(state: &mut CoordinatorState<S>) -> (S, Vec<RollbackHook<S>>) {
    if let TransactionState::Active(active) =
        std::mem::replace(&mut state.tx, TransactionState::Idle)
    {
        state.current = active.pre;
    }
    (
        state.current.clone(),
        std::mem::take(&mut state.rollback_hooks),
    )
}

fn run_rollback_hooks<S>((restored, hooks): (S, Vec<RollbackHook<S>>)) {
    for hook in hooks {
        hook(&restored);
    }
}

/// Restores the pre-transaction snapshot if the work unwinds.
struct RollbackGuard<'a, S: GraphStore> {
    coordinator: &'a TransactionCoordinator<S>,
    armed: bool,
}

impl<S: GraphStore> Drop for RollbackGuard<'_, S> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let restored = {
            let mut state = match self.coordinator.state.lock() {
                Ok(state) => state,
                Err(poisoned) => poisoned.into_inner(),
            };
            restore_pre(&mut state)
        };
        self.coordinator
            .counters
            .rollbacks
            .fetch_add(1, Ordering::SeqCst);
        run_rollback_hooks(restored);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Properties, VertexId};
    use crate::props;
    use crate::storage::MemoryGraph;
    use crate::transaction::BranchTransaction;

    fn coordinator() -> TransactionCoordinator<MemoryGraph> {
        TransactionCoordinator::new(
            MemoryGraph::new(),
            Arc::new(BranchTransaction),
            Arc::new(PersistenceQueue::in_memory()),
            SnapshotFormat::Json,
        )
    }

    fn insert(coord: &TransactionCoordinator<MemoryGraph>, id: VertexId) -> Result<()> {
        coord.write(|g| g.set_vertex(id, "Person", Properties::new()))
    }

    #[test]
    fn test_commit_replaces_current_snapshot() {
        let coord = coordinator();
        let id = VertexId::new();
        let outcome = coord.with_transaction(|| insert(&coord, id)).unwrap();
        assert!(outcome.is_committed());
        assert!(coord.read(|g| g.has_vertex(id)).unwrap());
        assert!(!coord.is_active());
        assert_eq!(coord.stats().commits, 1);
    }

    #[test]
    fn test_write_outside_transaction_is_rejected() {
        let coord = coordinator();
        let err = insert(&coord, VertexId::new()).unwrap_err();
        assert!(matches!(err, GraphError::NoActiveTransaction));
        assert_eq!(coord.read(|g| g.vertex_count()).unwrap(), 0);
    }

    #[test]
    fn test_nested_calls_join_one_commit() {
        let coord = coordinator();
        let (a, b) = (VertexId::new(), VertexId::new());
        let outcome = coord
            .with_transaction(|| {
                insert(&coord, a)?;
                let inner = coord.with_transaction(|| {
                    assert_eq!(coord.depth(), 2);
                    insert(&coord, b)
                })?;
                assert!(matches!(inner, TxOutcome::Joined(())));
                Ok(())
            })
            .unwrap();
        assert!(outcome.is_committed());
        let stats = coord.stats();
        assert_eq!((stats.commits, stats.joins, stats.rollbacks), (1, 1, 0));
        assert_eq!(coord.read(|g| g.vertex_count()).unwrap(), 2);
    }

    #[test]
    fn test_abort_rolls_back_silently() {
        let coord = coordinator();
        let id = VertexId::new();
        let outcome = coord
            .with_transaction(|| {
                insert(&coord, id)?;
                Err::<(), _>(GraphError::Aborted)
            })
            .unwrap();
        assert!(outcome.is_rolled_back());
        assert!(!coord.read(|g| g.has_vertex(id)).unwrap());
        assert_eq!(coord.stats().rollbacks, 1);
    }

    #[test]
    fn test_error_rolls_back_then_propagates() {
        let coord = coordinator();
        let id = VertexId::new();
        let err = coord
            .with_transaction(|| {
                insert(&coord, id)?;
                coord.write(|g| g.set_edge(id, VertexId::new(), "friend", props! {}))
            })
            .unwrap_err();
        assert!(matches!(err, GraphError::VertexNotFound(_)));
        assert!(!coord.read(|g| g.has_vertex(id)).unwrap());
        assert!(!coord.is_active());
    }

    #[test]
    fn test_panic_in_work_restores_snapshot() {
        let coord = coordinator();
        let id = VertexId::new();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _ = coord.with_transaction(|| -> Result<()> {
                insert(&coord, id)?;
                panic!("work failed")
            });
        }));
        assert!(result.is_err());
        assert!(!coord.is_active());
        assert!(!coord.read(|g| g.has_vertex(id)).unwrap());
    }

    #[test]
    fn test_rollback_hooks_see_restored_snapshot() {
        let coord = coordinator();
        let id = VertexId::new();
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));

        assert!(!coord.on_rollback(|_| {}).unwrap());
        let outcome = coord
            .with_transaction(|| {
                insert(&coord, id)?;
                let seen = Arc::clone(&seen);
                assert!(coord.on_rollback(move |g: &MemoryGraph| {
                    seen.lock().unwrap().push(g.has_vertex(id));
                })?);
                Err::<(), _>(GraphError::Aborted)
            })
            .unwrap();

        assert!(outcome.is_rolled_back());
        assert_eq!(*seen.lock().unwrap(), vec![false]);
    }

    #[test]
    fn test_rollback_hooks_dropped_on_commit() {
        let coord = coordinator();
        let fired = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let flag = Arc::clone(&fired);
        coord
            .with_transaction(|| {
                coord.on_rollback(move |_| flag.store(true, Ordering::SeqCst))?;
                insert(&coord, VertexId::new())
            })
            .unwrap();

        // A later rollback must not fire hooks of the committed transaction
        coord
            .with_transaction(|| Err::<(), _>(GraphError::Aborted))
            .unwrap();
        assert!(!fired.load(Ordering::SeqCst));
    }

    #[test]
    fn test_other_threads_read_committed_snapshot() {
        let coord = Arc::new(coordinator());
        let id = VertexId::new();
        let outcome = coord
            .with_transaction(|| {
                insert(&coord, id)?;
                let other = Arc::clone(&coord);
                let (seen, busy) = thread::spawn(move || {
                    let seen = other.read(|g| g.has_vertex(id)).unwrap();
                    let busy = other.with_transaction(|| Ok(())).err();
                    (seen, busy)
                })
                .join()
                .unwrap();
                assert!(!seen);
                assert!(matches!(busy, Some(GraphError::TransactionBusy)));
                Ok(())
            })
            .unwrap();
        assert!(outcome.is_committed());
        assert!(coord.read(|g| g.has_vertex(id)).unwrap());
    }
}
