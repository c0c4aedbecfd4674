use super::edges::{MultiEdges, SingleEdges};
use crate::core::{GraphError, Properties, Result, Value, Vertex, VertexId};
use crate::facade::LiveGraph;
use crate::storage::{GraphStore, MemoryGraph};
use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::{Level, event};

#[derive(Debug, Default)]
struct LocalState {
    /// Vertex properties as of wrapping or the last flush. A flush that
    /// joined a transaction which later rolls back resets it to the restored
    /// snapshot.
    base: Properties,
    /// Edits not yet flushed
    pending: Properties,
}

/// Live handle to one vertex.
///
/// Property writes land in a pending set owned by this handle (and its
/// clones) and reach the store through one coalesced flush, deferred to the
/// next scheduler turn. Reads see pending edits first, then the store.
///
/// # Stale overwrites
///
/// A flush upserts the whole vertex: the handle's local copy of the
/// properties overlaid with its pending edits. Two independent handles for
/// the same id do not synchronize, so a flush from a handle whose local copy
/// is older than another handle's committed flush rewrites those fields with
/// the older values. Last flush wins.
pub struct LiveVertex<S: GraphStore = MemoryGraph> {
    graph: LiveGraph<S>,
    id: VertexId,
    vertex_type: Arc<str>,
    local: Arc<Mutex<LocalState>>,
    backtrace: Option<Arc<Properties>>,
}

impl<S: GraphStore> Clone for LiveVertex<S> {
    fn clone(&self) -> Self {
        Self {
            graph: self.graph.clone(),
            id: self.id,
            vertex_type: Arc::clone(&self.vertex_type),
            local: Arc::clone(&self.local),
            backtrace: self.backtrace.clone(),
        }
    }
}

impl<S: GraphStore> fmt::Debug for LiveVertex<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveVertex")
            .field("id", &self.id)
            .field("vertex_type", &self.vertex_type)
            .field("backtrace", &self.backtrace)
            .finish_non_exhaustive()
    }
}

impl<S: GraphStore> LiveVertex<S> {
    pub(crate) fn new(graph: LiveGraph<S>, vertex: Vertex, backtrace: Option<Properties>) -> Self {
        Self {
            graph,
            id: vertex.id,
            vertex_type: Arc::from(vertex.vertex_type.as_str()),
            local: Arc::new(Mutex::new(LocalState {
                base: vertex.properties,
                pending: Properties::new(),
            })),
            backtrace: backtrace.map(Arc::new),
        }
    }

    pub fn id(&self) -> VertexId {
        self.id
    }

    pub fn vertex_type(&self) -> &str {
        &self.vertex_type
    }

    /// Properties of the edge traversed to reach this vertex, `None` when it
    /// was reached directly
    pub fn backtrace(&self) -> Option<&Properties> {
        self.backtrace.as_deref()
    }

    pub fn graph(&self) -> &LiveGraph<S> {
        &self.graph
    }

    // ========================================================================
    // Properties
    // ========================================================================

    /// Pending value if this handle has one, otherwise the stored value
    pub fn get(&self, name: &str) -> Result<Option<Value>> {
        if let Some(value) = self.local.lock()?.pending.get(name) {
            return Ok(Some(value.clone()));
        }
        self.graph.coordinator().read(|g| {
            g.vertex(self.id)
                .and_then(|vertex| vertex.properties.get(name).cloned())
        })
    }

    /// Typed read; `Ok(None)` when the property is absent
    pub fn get_as<T>(&self, name: &str) -> Result<Option<T>>
    where
        T: TryFrom<Value, Error = GraphError>,
    {
        self.get(name)?.map(T::try_from).transpose()
    }

    /// Stored properties overlaid with pending edits
    pub fn properties(&self) -> Result<Properties> {
        let mut merged = self
            .graph
            .coordinator()
            .read(|g| g.vertex(self.id).map(|vertex| vertex.properties))?
            .unwrap_or_default();
        let local = self.local.lock()?;
        merged.extend(
            local
                .pending
                .iter()
                .map(|(name, value)| (name.clone(), value.clone())),
        );
        Ok(merged)
    }

    /// Record an edit. The first edit after a flush defers one flush to the
    /// next scheduler turn; later edits in the same turn ride along with it.
    pub fn set(&self, name: impl Into<String>, value: impl Into<Value>) -> Result<()> {
        let first = {
            let mut local = self.local.lock()?;
            let first = local.pending.is_empty();
            local.pending.insert(name.into(), value.into());
            first
        };
        if first {
            self.defer_flush()?;
        }
        Ok(())
    }

    pub fn has_pending(&self) -> bool {
        self.local
            .lock()
            .map(|local| !local.pending.is_empty())
            .unwrap_or(false)
    }

    /// Write pending edits in one transaction, joining an active one.
    ///
    /// Returns `Ok(false)` when nothing was pending or the transaction rolled
    /// back; rolled-back edits are discarded. On error the edits stay pending
    /// and the next flush retries them.
    pub fn flush(&self) -> Result<bool> {
        flush_local(&self.graph, self.id, &self.vertex_type, &self.local)
    }

    fn defer_flush(&self) -> Result<()> {
        let graph = self.graph.downgrade();
        let id = self.id;
        let vertex_type = Arc::clone(&self.vertex_type);
        let local = Arc::clone(&self.local);
        self.graph.scheduler().defer(move || {
            // Graph already dropped
            let Some(graph) = LiveGraph::upgrade(&graph) else {
                return Ok(());
            };
            let written = flush_local(&graph, id, &vertex_type, &local)?;
            event!(Level::TRACE, %id, written, "deferred flush ran");
            Ok(())
        })
    }

    // ========================================================================
    // Navigation
    // ========================================================================

    /// Relations holding many targets per edge type
    pub fn multi_edges(&self) -> MultiEdges<S> {
        MultiEdges::new(self.graph.clone(), self.id)
    }

    /// Relations holding at most one target per edge type
    pub fn single_edges(&self) -> SingleEdges<S> {
        SingleEdges::new(self.graph.clone(), self.id)
    }
}

fn flush_local<S: GraphStore>(
    graph: &LiveGraph<S>,
    id: VertexId,
    vertex_type: &str,
    local: &Arc<Mutex<LocalState>>,
) -> Result<bool> {
    if local.lock()?.pending.is_empty() {
        return Ok(false);
    }

    let mut taken: Option<Properties> = None;
    let result = graph.with_transaction(|| {
        let merged = {
            let mut state = local.lock()?;
            if state.pending.is_empty() {
                return Ok(());
            }
            let pending = std::mem::take(&mut state.pending);
            let mut merged = state.base.clone();
            merged.extend(
                pending
                    .iter()
                    .map(|(name, value)| (name.clone(), value.clone())),
            );
            taken = Some(pending);
            merged
        };
        graph.coordinator().write(|g| {
            if !g.has_vertex(id) {
                return Err(GraphError::VertexNotFound(id));
            }
            g.set_vertex(id, vertex_type, merged)
        })
    });

    match result {
        Ok(outcome) if outcome.is_rolled_back() => {
            event!(Level::DEBUG, %id, "flush rolled back, pending edits discarded");
            Ok(false)
        }
        Ok(outcome) => {
            if taken.is_none() {
                return Ok(false);
            }
            let stored = graph
                .coordinator()
                .read(|g| g.vertex(id).map(|vertex| vertex.properties))?;
            if let Some(stored) = stored {
                local.lock()?.base = stored;
            }
            if outcome.is_joined() {
                // The outer transaction may still roll back
                let local = Arc::clone(local);
                graph.coordinator().on_rollback(move |restored: &S| {
                    let properties = restored
                        .vertex(id)
                        .map(|vertex| vertex.properties)
                        .unwrap_or_default();
                    let mut state = match local.lock() {
                        Ok(state) => state,
                        Err(poisoned) => poisoned.into_inner(),
                    };
                    state.base = properties;
                })?;
            }
            Ok(true)
        }
        Err(err) => {
            if let Some(pending) = taken {
                let mut state = local.lock()?;
                // Edits made while the flush ran are newer
                for (name, value) in pending {
                    state.pending.entry(name).or_insert(value);
                }
            }
            Err(err)
        }
    }
}
