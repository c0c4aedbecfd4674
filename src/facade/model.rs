use super::graph::LiveGraph;
use crate::core::{GraphError, Properties, Result, VertexId};
use crate::live::LiveVertex;
use crate::storage::{GraphStore, MemoryGraph};

/// Creates and finds vertices of one type.
pub struct ModelType<S: GraphStore = MemoryGraph> {
    graph: LiveGraph<S>,
    vertex_type: String,
}

impl<S: GraphStore> ModelType<S> {
    pub(crate) fn new(graph: LiveGraph<S>, vertex_type: String) -> Self {
        Self { graph, vertex_type }
    }

    pub fn vertex_type(&self) -> &str {
        &self.vertex_type
    }

    /// Insert a new vertex with a fresh id in one transaction.
    ///
    /// Inside an active transaction the insert joins it. Fails with
    /// `GraphError::Aborted` if the transaction rolled back.
    pub fn create(&self, properties: Properties) -> Result<LiveVertex<S>> {
        let id = VertexId::new();
        let outcome = self.graph.with_transaction(|| {
            self.graph
                .coordinator()
                .write(|g| g.set_vertex(id, &self.vertex_type, properties))
        })?;
        if outcome.is_rolled_back() {
            return Err(GraphError::Aborted);
        }
        self.find_by_id(id)?.ok_or(GraphError::VertexNotFound(id))
    }

    /// `None` when `id` is absent or belongs to a vertex of another type
    pub fn find_by_id(&self, id: VertexId) -> Result<Option<LiveVertex<S>>> {
        let vertex = self
            .graph
            .coordinator()
            .read(|g| g.vertex(id).filter(|v| v.vertex_type == self.vertex_type))?;
        Ok(vertex.map(|vertex| self.graph.wrap(vertex, None)))
    }

    /// Every vertex of this type in the visible snapshot
    pub fn all(&self) -> Result<Vec<LiveVertex<S>>> {
        let vertices = self
            .graph
            .coordinator()
            .read(|g| g.vertices_of_type(&self.vertex_type))?;
        Ok(vertices
            .into_iter()
            .map(|vertex| self.graph.wrap(vertex, None))
            .collect())
    }
}
