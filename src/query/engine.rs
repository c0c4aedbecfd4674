use crate::core::{Properties, Result, Value, VertexId};
use std::collections::BTreeMap;

/// One row bound to a result variable, as produced by a query engine.
#[derive(Debug, Clone, PartialEq)]
pub enum RawRow {
    Vertex(VertexId),
    Edge {
        origin: VertexId,
        target: VertexId,
        edge_type: String,
        properties: Properties,
    },
}

impl RawRow {
    pub fn edge(
        origin: VertexId,
        target: VertexId,
        edge_type: impl Into<String>,
        properties: Properties,
    ) -> Self {
        RawRow::Edge {
            origin,
            target,
            edge_type: edge_type.into(),
            properties,
        }
    }
}

/// Rows keyed by result-variable name
pub type RawResults = BTreeMap<String, Vec<RawRow>>;

/// Executes a query template against a snapshot.
///
/// `fragments` are the literal pieces of the template and `values` the
/// interpolated arguments between them.
pub trait QueryEngine<S>: Send + Sync {
    fn execute(&self, store: &S, fragments: &[&str], values: &[Value]) -> Result<RawResults>;
}

impl<S, F> QueryEngine<S> for F
where
    F: Fn(&S, &[&str], &[Value]) -> Result<RawResults> + Send + Sync,
{
    fn execute(&self, store: &S, fragments: &[&str], values: &[Value]) -> Result<RawResults> {
        self(store, fragments, values)
    }
}
