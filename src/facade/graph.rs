use super::model::ModelType;
use crate::config::GraphConfig;
use crate::core::{GraphError, Properties, Result, Value, Vertex, VertexId};
use crate::live::LiveVertex;
use crate::query::{QueryEngine, QueryResults, RawResults};
use crate::scheduler::{ErrorHook, Scheduler};
use crate::storage::{
    FileSink, GraphDocument, GraphStore, MemoryGraph, PersistenceQueue, SnapshotFormat,
    SnapshotSink,
};
use crate::transaction::{
    BranchTransaction, TransactionCoordinator, TransactionPrimitive, TxOutcome, TxStats,
};
use std::sync::{Arc, RwLock, Weak};
use tracing::{Level, event};

pub(crate) struct GraphInner<S: GraphStore> {
    pub(crate) coordinator: TransactionCoordinator<S>,
    pub(crate) scheduler: Scheduler,
    query_engine: RwLock<Option<Arc<dyn QueryEngine<S>>>>,
}

/// Entry point of the live-object layer.
///
/// Cheap to clone; clones share one coordinator, scheduler and persistence
/// queue.
pub struct LiveGraph<S: GraphStore = MemoryGraph> {
    pub(crate) inner: Arc<GraphInner<S>>,
}

impl<S: GraphStore> Clone for LiveGraph<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl LiveGraph<MemoryGraph> {
    /// Graph with no durable target
    pub fn in_memory() -> Self {
        Self::from_parts(
            MemoryGraph::new(),
            Arc::new(BranchTransaction),
            PersistenceQueue::in_memory(),
            SnapshotFormat::Json,
        )
    }

    /// Open a graph per `config`, loading an existing document when present
    pub fn open(config: GraphConfig) -> Result<Self> {
        Self::open_with(config, Arc::new(BranchTransaction))
    }
}

impl<S: GraphStore> LiveGraph<S> {
    /// Open a graph over a custom store and transaction primitive
    pub fn open_with(
        config: GraphConfig,
        primitive: Arc<dyn TransactionPrimitive<S>>,
    ) -> Result<Self> {
        let Some(path) = &config.data_path else {
            let store = S::from_document(GraphDocument::new(Vec::new(), Vec::new()))?;
            return Ok(Self::from_parts(
                store,
                primitive,
                PersistenceQueue::in_memory(),
                config.format,
            ));
        };
        let sink = Arc::new(FileSink::new(path));
        let store = if config.load_existing {
            load_store::<S>(sink.as_ref())?
        } else {
            None
        };
        let store = match store {
            Some(store) => store,
            None => S::from_document(GraphDocument::new(Vec::new(), Vec::new()))?,
        };
        event!(
            Level::INFO,
            path = %path.display(),
            vertices = store.vertex_count(),
            edges = store.edge_count(),
            "live graph opened"
        );
        let queue = PersistenceQueue::new(sink)?;
        Ok(Self::from_parts(store, primitive, queue, config.format))
    }

    /// Open a graph persisting through an arbitrary sink
    pub fn with_sink(
        sink: Arc<dyn SnapshotSink>,
        primitive: Arc<dyn TransactionPrimitive<S>>,
        format: SnapshotFormat,
    ) -> Result<Self> {
        let store = match load_store::<S>(sink.as_ref())? {
            Some(store) => store,
            None => S::from_document(GraphDocument::new(Vec::new(), Vec::new()))?,
        };
        let queue = PersistenceQueue::new(sink)?;
        Ok(Self::from_parts(store, primitive, queue, format))
    }

    pub fn from_parts(
        store: S,
        primitive: Arc<dyn TransactionPrimitive<S>>,
        queue: PersistenceQueue,
        format: SnapshotFormat,
    ) -> Self {
        Self {
            inner: Arc::new(GraphInner {
                coordinator: TransactionCoordinator::new(store, primitive, Arc::new(queue), format),
                scheduler: Scheduler::new(),
                query_engine: RwLock::new(None),
            }),
        }
    }

    pub(crate) fn downgrade(&self) -> Weak<GraphInner<S>> {
        Arc::downgrade(&self.inner)
    }

    pub(crate) fn upgrade(inner: &Weak<GraphInner<S>>) -> Option<Self> {
        inner.upgrade().map(|inner| Self { inner })
    }

    pub fn coordinator(&self) -> &TransactionCoordinator<S> {
        &self.inner.coordinator
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.inner.scheduler
    }

    /// See [`TransactionCoordinator::with_transaction`]
    pub fn with_transaction<T>(&self, work: impl FnOnce() -> Result<T>) -> Result<TxOutcome<T>> {
        self.inner.coordinator.with_transaction(work)
    }

    /// Accessor for creating and finding vertices of one type
    pub fn model_type(&self, vertex_type: impl Into<String>) -> ModelType<S> {
        ModelType::new(self.clone(), vertex_type.into())
    }

    /// Wrap any vertex by id, whatever its type
    pub fn vertex(&self, id: VertexId) -> Result<Option<LiveVertex<S>>> {
        self.wrap_id(id, None)
    }

    pub fn snapshot(&self) -> Result<S> {
        self.inner.coordinator.snapshot()
    }

    pub fn stats(&self) -> TxStats {
        self.inner.coordinator.stats()
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn set_query_engine(&self, engine: impl QueryEngine<S> + 'static) -> Result<()> {
        *self.inner.query_engine.write()? = Some(Arc::new(engine));
        Ok(())
    }

    /// Install a closure as the query engine
    pub fn set_query_fn<F>(&self, execute: F) -> Result<()>
    where
        F: Fn(&S, &[&str], &[Value]) -> Result<RawResults> + Send + Sync + 'static,
    {
        self.set_query_engine(execute)
    }

    /// Run a query against the visible snapshot and wrap its rows lazily
    pub fn query(&self, fragments: &[&str], values: &[Value]) -> Result<QueryResults<S>> {
        let engine = self
            .inner
            .query_engine
            .read()?
            .clone()
            .ok_or_else(|| GraphError::QueryError("no query engine configured".to_string()))?;
        let snapshot = self.snapshot()?;
        let raw = engine.execute(&snapshot, fragments, values)?;
        Ok(QueryResults::new(self.clone(), raw))
    }

    // ========================================================================
    // Deferred work and persistence
    // ========================================================================

    /// Run one scheduler turn: every flush deferred so far
    pub fn run_deferred(&self) -> Result<usize> {
        self.inner.scheduler.run_turn()
    }

    /// Run deferred work until nothing is left
    pub fn settle(&self) -> Result<usize> {
        self.inner.scheduler.run_until_idle()
    }

    /// Route errors of deferred flushes to `hook` instead of the log
    pub fn set_error_hook(&self, hook: impl Fn(&GraphError) + Send + Sync + 'static) -> Result<()> {
        let hook: ErrorHook = Arc::new(hook);
        self.inner.scheduler.set_error_hook(hook)
    }

    /// Wait until every snapshot write queued so far reached storage
    pub async fn persisted(&self) -> Result<()> {
        self.inner.coordinator.persistence().flush().await
    }

    /// Blocking variant of [`LiveGraph::persisted`]
    pub fn persisted_blocking(&self) -> Result<()> {
        self.inner.coordinator.persistence().flush_blocking()
    }

    // ========================================================================
    // Wrapping
    // ========================================================================

    pub(crate) fn wrap(&self, vertex: Vertex, backtrace: Option<Properties>) -> LiveVertex<S> {
        LiveVertex::new(self.clone(), vertex, backtrace)
    }

    pub(crate) fn wrap_id(
        &self,
        id: VertexId,
        backtrace: Option<Properties>,
    ) -> Result<Option<LiveVertex<S>>> {
        let vertex = self.inner.coordinator.read(|g| g.vertex(id))?;
        Ok(vertex.map(|vertex| self.wrap(vertex, backtrace)))
    }
}

fn load_store<S: GraphStore>(sink: &dyn SnapshotSink) -> Result<Option<S>> {
    let Some(bytes) = sink.load()? else {
        return Ok(None);
    };
    let document = SnapshotFormat::detect(&bytes).decode(&bytes)?;
    Ok(Some(S::from_document(document)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::props;
    use tempfile::TempDir;

    #[test]
    fn test_reopen_loads_previous_document() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("graph.json");

        let id = {
            let graph = LiveGraph::open(GraphConfig::persistent(&path)).unwrap();
            let ada = graph.model_type("Person").create(props! { "name" => "Ada" }).unwrap();
            graph.persisted_blocking().unwrap();
            ada.id()
        };

        let graph = LiveGraph::open(GraphConfig::persistent(&path)).unwrap();
        let ada = graph.model_type("Person").find_by_id(id).unwrap().unwrap();
        assert_eq!(ada.get("name").unwrap(), Some(Value::from("Ada")));
    }

    #[test]
    fn test_fresh_config_ignores_existing_document() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("graph.msgpack");
        let config = GraphConfig::persistent(&path).format(SnapshotFormat::MessagePack);
        {
            let graph = LiveGraph::open(config.clone()).unwrap();
            let _ = graph.model_type("Person").create(props! {}).unwrap();
            graph.persisted_blocking().unwrap();
        }
        let graph = LiveGraph::open(config.fresh()).unwrap();
        assert_eq!(graph.snapshot().unwrap().vertex_count(), 0);
    }

    #[test]
    fn test_query_without_engine_fails() {
        let graph = LiveGraph::in_memory();
        assert!(matches!(
            graph.query(&["MATCH"], &[]),
            Err(GraphError::QueryError(_))
        ));
    }
}
