use super::engine::{RawResults, RawRow};
use crate::core::{Properties, Result, VertexId};
use crate::facade::LiveGraph;
use crate::live::LiveVertex;
use crate::storage::{GraphStore, MemoryGraph};
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// Live view over raw query rows.
///
/// Rows are wrapped on first access only, and each wrapper is built at most
/// once.
pub struct QueryResults<S: GraphStore = MemoryGraph> {
    columns: BTreeMap<String, Vec<QueryItem<S>>>,
}

impl<S: GraphStore> QueryResults<S> {
    pub(crate) fn new(graph: LiveGraph<S>, raw: RawResults) -> Self {
        let columns = raw
            .into_iter()
            .map(|(name, rows)| {
                let items = rows
                    .into_iter()
                    .map(|row| QueryItem::new(graph.clone(), row))
                    .collect();
                (name, items)
            })
            .collect();
        Self { columns }
    }

    /// Rows bound to result variable `name`
    pub fn get(&self, name: &str) -> Option<&[QueryItem<S>]> {
        self.columns.get(name).map(Vec::as_slice)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    /// Number of result variables
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Vertices bound to `name`, skipping edge rows and ids no longer stored
    pub fn vertices(&self, name: &str) -> Result<Vec<LiveVertex<S>>> {
        let mut vertices = Vec::new();
        for item in self.get(name).unwrap_or_default() {
            if let QueryItem::Vertex(row) = item {
                if let Some(vertex) = row.vertex()? {
                    vertices.push(vertex.clone());
                }
            }
        }
        Ok(vertices)
    }
}

pub enum QueryItem<S: GraphStore = MemoryGraph> {
    Vertex(VertexRow<S>),
    Edge(EdgeRow<S>),
}

impl<S: GraphStore> QueryItem<S> {
    fn new(graph: LiveGraph<S>, row: RawRow) -> Self {
        match row {
            RawRow::Vertex(id) => QueryItem::Vertex(VertexRow {
                graph,
                id,
                vertex: OnceLock::new(),
            }),
            RawRow::Edge {
                origin,
                target,
                edge_type,
                properties,
            } => QueryItem::Edge(EdgeRow {
                graph,
                origin_id: origin,
                target_id: target,
                edge_type,
                properties,
                origin: OnceLock::new(),
                target: OnceLock::new(),
            }),
        }
    }

    pub fn as_vertex(&self) -> Option<&VertexRow<S>> {
        match self {
            QueryItem::Vertex(row) => Some(row),
            QueryItem::Edge(_) => None,
        }
    }

    pub fn as_edge(&self) -> Option<&EdgeRow<S>> {
        match self {
            QueryItem::Edge(row) => Some(row),
            QueryItem::Vertex(_) => None,
        }
    }
}

/// Vertex-shaped row
pub struct VertexRow<S: GraphStore = MemoryGraph> {
    graph: LiveGraph<S>,
    id: VertexId,
    vertex: OnceLock<Option<LiveVertex<S>>>,
}

impl<S: GraphStore> VertexRow<S> {
    pub fn id(&self) -> VertexId {
        self.id
    }

    /// Live vertex for this row, without backtrace
    pub fn vertex(&self) -> Result<Option<&LiveVertex<S>>> {
        lazy_wrap(&self.vertex, &self.graph, self.id, None)
    }

    pub fn is_wrapped(&self) -> bool {
        self.vertex.get().is_some()
    }
}

/// Edge-shaped row; both ends wrap lazily with the edge properties as
/// backtrace
pub struct EdgeRow<S: GraphStore = MemoryGraph> {
    graph: LiveGraph<S>,
    origin_id: VertexId,
    target_id: VertexId,
    edge_type: String,
    properties: Properties,
    origin: OnceLock<Option<LiveVertex<S>>>,
    target: OnceLock<Option<LiveVertex<S>>>,
}

impl<S: GraphStore> EdgeRow<S> {
    pub fn origin_id(&self) -> VertexId {
        self.origin_id
    }

    pub fn target_id(&self) -> VertexId {
        self.target_id
    }

    pub fn edge_type(&self) -> &str {
        &self.edge_type
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    pub fn origin(&self) -> Result<Option<&LiveVertex<S>>> {
        lazy_wrap(
            &self.origin,
            &self.graph,
            self.origin_id,
            Some(&self.properties),
        )
    }

    pub fn target(&self) -> Result<Option<&LiveVertex<S>>> {
        lazy_wrap(
            &self.target,
            &self.graph,
            self.target_id,
            Some(&self.properties),
        )
    }

    pub fn is_wrapped(&self) -> bool {
        self.origin.get().is_some() || self.target.get().is_some()
    }
}

fn lazy_wrap<'a, S: GraphStore>(
    cell: &'a OnceLock<Option<LiveVertex<S>>>,
    graph: &LiveGraph<S>,
    id: VertexId,
    backtrace: Option<&Properties>,
) -> Result<Option<&'a LiveVertex<S>>> {
    if let Some(cached) = cell.get() {
        return Ok(cached.as_ref());
    }
    let wrapped = graph.wrap_id(id, backtrace.cloned())?;
    // A concurrent initializer may have won; its value is kept
    Ok(cell.get_or_init(|| wrapped).as_ref())
}
