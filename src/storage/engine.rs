use super::persistence::GraphDocument;
use crate::core::{Edge, Properties, Result, Vertex, VertexId};

/// Graph store trait - the snapshot value the live layer reads and branches.
///
/// A store value is one immutable-by-convention snapshot of the whole graph.
/// `Clone` must be cheap: the transaction primitive branches by cloning.
pub trait GraphStore: Clone + Send + Sync + 'static {
    /// Look up a vertex by id
    fn vertex(&self, id: VertexId) -> Option<Vertex>;

    /// Check if a vertex exists
    fn has_vertex(&self, id: VertexId) -> bool {
        self.vertex(id).is_some()
    }

    /// Insert or replace a vertex. The type of an existing vertex never changes.
    fn set_vertex(&mut self, id: VertexId, vertex_type: &str, properties: Properties) -> Result<()>;

    /// Outgoing edges of a vertex in store enumeration order
    fn out_edges(&self, id: VertexId) -> OutEdges<'_>;

    /// Insert an edge, or replace the properties of an existing `(origin, target, type)` edge
    fn set_edge(
        &mut self,
        origin: VertexId,
        target: VertexId,
        edge_type: &str,
        properties: Properties,
    ) -> Result<()>;

    /// Remove an edge; returns whether it existed
    fn remove_edge(&mut self, origin: VertexId, target: VertexId, edge_type: &str) -> bool;

    fn has_edge(&self, origin: VertexId, target: VertexId, edge_type: &str) -> bool {
        self.out_edges(origin)
            .of_type(edge_type)
            .any(|edge| edge.target == target)
    }

    /// All vertices carrying the given type tag
    fn vertices_of_type(&self, vertex_type: &str) -> Vec<Vertex>;

    fn vertex_count(&self) -> usize;

    fn edge_count(&self) -> usize;

    /// Export the whole graph as a serializable document
    fn to_document(&self) -> GraphDocument;

    /// Build a store from an exported document
    fn from_document(document: GraphDocument) -> Result<Self>;
}

/// Iterator over outgoing edges with type filtering and limiting.
pub struct OutEdges<'a> {
    inner: Box<dyn Iterator<Item = Edge> + 'a>,
}

impl<'a> OutEdges<'a> {
    pub fn new(inner: impl Iterator<Item = Edge> + 'a) -> Self {
        Self {
            inner: Box::new(inner),
        }
    }

    pub fn empty() -> Self {
        Self::new(std::iter::empty())
    }

    /// Keep only edges of the given type
    pub fn of_type(self, edge_type: &'a str) -> Self {
        Self::new(self.inner.filter(move |edge| edge.edge_type == edge_type))
    }

    /// Stop after `n` edges
    pub fn limit(self, n: usize) -> Self {
        Self::new(self.inner.take(n))
    }
}

impl Iterator for OutEdges<'_> {
    type Item = Edge;

    fn next(&mut self) -> Option<Edge> {
        self.inner.next()
    }
}
