use im::{OrdMap, Vector};

use super::engine::{GraphStore, OutEdges};
use super::persistence::GraphDocument;
use crate::core::{Edge, GraphError, Properties, Result, Vertex, VertexId};

/// In-memory graph snapshot built on persistent maps.
///
/// Cloning shares structure with the original, so branching a snapshot for a
/// transaction costs O(1) and later writes only copy the touched paths.
#[derive(Debug, Clone, Default)]
pub struct MemoryGraph {
    vertices: OrdMap<VertexId, Vertex>,
    /// Outgoing edges per origin, in insertion order
    out: OrdMap<VertexId, Vector<Edge>>,
    edge_count: usize,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Iterate every vertex in id order
    pub fn vertices(&self) -> impl Iterator<Item = &Vertex> {
        self.vertices.values()
    }

    /// Iterate every edge, grouped by origin
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.out.values().flat_map(|edges| edges.iter())
    }
}

impl GraphStore for MemoryGraph {
    fn vertex(&self, id: VertexId) -> Option<Vertex> {
        self.vertices.get(&id).cloned()
    }

    fn has_vertex(&self, id: VertexId) -> bool {
        self.vertices.contains_key(&id)
    }

    fn set_vertex(&mut self, id: VertexId, vertex_type: &str, properties: Properties) -> Result<()> {
        if let Some(existing) = self.vertices.get(&id) {
            if existing.vertex_type != vertex_type {
                return Err(GraphError::TypeMismatch(format!(
                    "vertex '{}' has type '{}', cannot change it to '{}'",
                    id, existing.vertex_type, vertex_type
                )));
            }
        }
        self.vertices
            .insert(id, Vertex::new(id, vertex_type, properties));
        Ok(())
    }

    fn out_edges(&self, id: VertexId) -> OutEdges<'_> {
        match self.out.get(&id) {
            Some(edges) => OutEdges::new(edges.iter().cloned()),
            None => OutEdges::empty(),
        }
    }

    fn set_edge(
        &mut self,
        origin: VertexId,
        target: VertexId,
        edge_type: &str,
        properties: Properties,
    ) -> Result<()> {
        for id in [origin, target] {
            if !self.vertices.contains_key(&id) {
                return Err(GraphError::VertexNotFound(id));
            }
        }

        let edges = self.out.entry(origin).or_insert_with(Vector::new);
        let existing = edges
            .iter()
            .position(|edge| edge.target == target && edge.edge_type == edge_type);
        match existing {
            Some(idx) => {
                edges.set(idx, Edge::new(origin, target, edge_type, properties));
            }
            None => {
                edges.push_back(Edge::new(origin, target, edge_type, properties));
                self.edge_count += 1;
            }
        }
        Ok(())
    }

    fn remove_edge(&mut self, origin: VertexId, target: VertexId, edge_type: &str) -> bool {
        let Some(edges) = self.out.get_mut(&origin) else {
            return false;
        };
        let Some(idx) = edges
            .iter()
            .position(|edge| edge.target == target && edge.edge_type == edge_type)
        else {
            return false;
        };
        edges.remove(idx);
        if edges.is_empty() {
            self.out.remove(&origin);
        }
        self.edge_count -= 1;
        true
    }

    fn vertices_of_type(&self, vertex_type: &str) -> Vec<Vertex> {
        self.vertices
            .values()
            .filter(|vertex| vertex.vertex_type == vertex_type)
            .cloned()
            .collect()
    }

    fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    fn edge_count(&self) -> usize {
        self.edge_count
    }

    fn to_document(&self) -> GraphDocument {
        GraphDocument::new(
            self.vertices.values().cloned().collect(),
            self.edges().cloned().collect(),
        )
    }

    fn from_document(document: GraphDocument) -> Result<Self> {
        document.check_version()?;
        let mut graph = Self::new();
        for vertex in document.vertices {
            graph.set_vertex(vertex.id, &vertex.vertex_type, vertex.properties)?;
        }
        for edge in document.edges {
            graph.set_edge(edge.origin, edge.target, &edge.edge_type, edge.properties)?;
        }
        Ok(graph)
    }
}
