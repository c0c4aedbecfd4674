// ============================================================================
// Edge navigation
// ============================================================================

use super::vertex::LiveVertex;
use crate::core::{Properties, Result, VertexId};
use crate::facade::LiveGraph;
use crate::storage::{GraphStore, MemoryGraph};
use crate::transaction::TxOutcome;

/// Relations from one vertex where each edge type points to at most one
/// target.
pub struct SingleEdges<S: GraphStore = MemoryGraph> {
    graph: LiveGraph<S>,
    origin: VertexId,
}

impl<S: GraphStore> SingleEdges<S> {
    pub(crate) fn new(graph: LiveGraph<S>, origin: VertexId) -> Self {
        Self { graph, origin }
    }

    /// Target of the first outgoing `edge_type` edge in store order, carrying
    /// that edge's properties as backtrace
    pub fn read(&self, edge_type: &str) -> Result<Option<LiveVertex<S>>> {
        let edge = self
            .graph
            .coordinator()
            .read(|g| g.out_edges(self.origin).of_type(edge_type).next())?;
        match edge {
            Some(edge) => self.graph.wrap_id(edge.target, Some(edge.properties)),
            None => Ok(None),
        }
    }

    /// Point `edge_type` at `target`, storing the target's backtrace as edge
    /// properties. Edges of that type to other targets are removed.
    pub fn write(&self, edge_type: &str, target: &LiveVertex<S>) -> Result<TxOutcome<()>> {
        let origin = self.origin;
        let target_id = target.id();
        let properties = target.backtrace().cloned().unwrap_or_default();
        self.graph.with_transaction(|| {
            self.graph.coordinator().write(|g| {
                let replaced: Vec<VertexId> = g
                    .out_edges(origin)
                    .of_type(edge_type)
                    .filter(|edge| edge.target != target_id)
                    .map(|edge| edge.target)
                    .collect();
                for stale in replaced {
                    g.remove_edge(origin, stale, edge_type);
                }
                g.set_edge(origin, target_id, edge_type, properties)
            })
        })
    }

    /// Remove the first `edge_type` edge; no-op when there is none
    pub fn remove(&self, edge_type: &str) -> Result<TxOutcome<bool>> {
        let origin = self.origin;
        self.graph.with_transaction(|| {
            self.graph.coordinator().write(|g| {
                let first = g.out_edges(origin).of_type(edge_type).next();
                Ok(match first {
                    Some(edge) => g.remove_edge(edge.origin, edge.target, &edge.edge_type),
                    None => false,
                })
            })
        })
    }
}

/// Relations from one vertex holding any number of targets per edge type.
pub struct MultiEdges<S: GraphStore = MemoryGraph> {
    graph: LiveGraph<S>,
    origin: VertexId,
}

impl<S: GraphStore> MultiEdges<S> {
    pub(crate) fn new(graph: LiveGraph<S>, origin: VertexId) -> Self {
        Self { graph, origin }
    }

    /// Every target of an outgoing `edge_type` edge, each carrying its edge's
    /// properties as backtrace
    pub fn list(&self, edge_type: &str) -> Result<Vec<LiveVertex<S>>> {
        let edges: Vec<_> = self
            .graph
            .coordinator()
            .read(|g| g.out_edges(self.origin).of_type(edge_type).collect())?;
        let mut targets = Vec::with_capacity(edges.len());
        for edge in edges {
            if let Some(target) = self.graph.wrap_id(edge.target, Some(edge.properties))? {
                targets.push(target);
            }
        }
        Ok(targets)
    }

    /// Add an `edge_type` edge to `target`; with `mutual` the reverse edge is
    /// added in the same transaction
    pub fn add(
        &self,
        edge_type: &str,
        target: &LiveVertex<S>,
        properties: Properties,
        mutual: bool,
    ) -> Result<TxOutcome<()>> {
        let origin = self.origin;
        let target_id = target.id();
        self.graph.with_transaction(|| {
            self.graph.coordinator().write(|g| {
                g.set_edge(origin, target_id, edge_type, properties.clone())?;
                if mutual {
                    g.set_edge(target_id, origin, edge_type, properties)?;
                }
                Ok(())
            })
        })
    }

    pub fn has(&self, edge_type: &str, target: &LiveVertex<S>) -> Result<bool> {
        self.graph
            .coordinator()
            .read(|g| g.has_edge(self.origin, target.id(), edge_type))
    }

    /// Remove the `edge_type` edge to `target`; with `mutual` the reverse edge
    /// goes in the same transaction
    pub fn remove(
        &self,
        edge_type: &str,
        target: &LiveVertex<S>,
        mutual: bool,
    ) -> Result<TxOutcome<()>> {
        let origin = self.origin;
        let target_id = target.id();
        self.graph.with_transaction(|| {
            self.graph.coordinator().write(|g| {
                g.remove_edge(origin, target_id, edge_type);
                if mutual {
                    g.remove_edge(target_id, origin, edge_type);
                }
                Ok(())
            })
        })
    }
}
