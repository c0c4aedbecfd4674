//! Integration tests for query execution and lazy result wrapping

use livegraph::{
    GraphError, GraphStore, LiveGraph, MemoryGraph, QueryItem, RawResults, RawRow, Result, Value,
    props,
};

/// Tiny template engine: `vertices of {type}` and `edges of {type}`
fn engine(store: &MemoryGraph, fragments: &[&str], values: &[Value]) -> Result<RawResults> {
    let kind = fragments.first().map(|f| f.trim()).unwrap_or_default();
    let tag = values
        .first()
        .and_then(Value::as_str)
        .ok_or_else(|| GraphError::QueryError("missing type argument".to_string()))?;

    let mut results = RawResults::new();
    match kind {
        "vertices of" => {
            let rows = store
                .vertices_of_type(tag)
                .into_iter()
                .map(|vertex| RawRow::Vertex(vertex.id))
                .collect();
            results.insert("v".to_string(), rows);
        }
        "edges of" => {
            let rows = store
                .edges()
                .filter(|edge| edge.edge_type == tag)
                .map(|edge| {
                    RawRow::edge(edge.origin, edge.target, &edge.edge_type, edge.properties.clone())
                })
                .collect();
            results.insert("e".to_string(), rows);
        }
        other => {
            return Err(GraphError::QueryError(format!("unknown query '{}'", other)));
        }
    }
    Ok(results)
}

fn populated() -> LiveGraph {
    let graph = LiveGraph::in_memory();
    graph.set_query_fn(engine).unwrap();

    let people = graph.model_type("Person");
    let a = people.create(props! { "name" => "A" }).unwrap();
    let b = people.create(props! { "name" => "B" }).unwrap();
    let c = people.create(props! { "name" => "C" }).unwrap();
    a.multi_edges()
        .add("knows", &b, props! { "weight" => 1 }, false)
        .unwrap();
    a.multi_edges()
        .add("knows", &c, props! { "weight" => 2 }, false)
        .unwrap();
    graph
}

#[test]
fn test_vertex_rows_wrap_lazily_without_backtrace() {
    let graph = populated();
    let results = graph
        .query(&["vertices of", ""], &[Value::from("Person")])
        .unwrap();

    assert_eq!(results.names().collect::<Vec<_>>(), vec!["v"]);
    let rows = results.get("v").unwrap();
    assert_eq!(rows.len(), 3);
    assert!(rows.iter().all(|row| !row.as_vertex().unwrap().is_wrapped()));

    let first = rows[0].as_vertex().unwrap();
    let vertex = first.vertex().unwrap().unwrap();
    assert!(vertex.backtrace().is_none());
    assert_eq!(vertex.id(), first.id());
    assert!(first.is_wrapped());
    assert!(!rows[1].as_vertex().unwrap().is_wrapped());

    // Same wrapper on repeated access
    let again = first.vertex().unwrap().unwrap();
    assert!(std::ptr::eq(vertex, again));
}

#[test]
fn test_edge_rows_expose_origin_and_target_with_backtrace() {
    let graph = populated();
    let results = graph
        .query(&["edges of", ""], &[Value::from("knows")])
        .unwrap();
    let rows = results.get("e").unwrap();
    assert_eq!(rows.len(), 2);

    let mut weights = Vec::new();
    for row in rows {
        let QueryItem::Edge(edge) = row else {
            panic!("expected edge row");
        };
        assert!(!edge.is_wrapped());
        let origin = edge.origin().unwrap().unwrap();
        let target = edge.target().unwrap().unwrap();

        assert_eq!(origin.get("name").unwrap(), Some(Value::from("A")));
        assert_eq!(origin.backtrace(), Some(edge.properties()));
        assert_eq!(target.backtrace(), Some(edge.properties()));
        assert_eq!(edge.edge_type(), "knows");
        weights.push(target.backtrace().unwrap().get("weight").cloned().unwrap());
    }
    weights.sort_by_key(|w| w.as_i64());
    assert_eq!(weights, vec![Value::from(1), Value::from(2)]);
}

#[test]
fn test_wrapped_results_are_live() {
    let graph = populated();
    let results = graph
        .query(&["vertices of", ""], &[Value::from("Person")])
        .unwrap();
    let vertices = results.vertices("v").unwrap();

    vertices[0].set("seen", true).unwrap();
    graph.settle().unwrap();

    let fresh = graph.vertex(vertices[0].id()).unwrap().unwrap();
    assert_eq!(fresh.get("seen").unwrap(), Some(Value::from(true)));
}

#[test]
fn test_query_sees_active_branch_on_owning_thread() {
    let graph = populated();
    let outcome = graph
        .with_transaction(|| {
            graph.model_type("Person").create(props! { "name" => "D" })?;
            let results = graph.query(&["vertices of", ""], &[Value::from("Person")])?;
            Ok(results.get("v").map(|rows| rows.len()))
        })
        .unwrap();
    assert_eq!(outcome.into_value(), Some(Some(4)));
}

#[test]
fn test_engine_errors_propagate() {
    let graph = populated();
    assert!(matches!(
        graph.query(&["paths of", ""], &[Value::from("x")]),
        Err(GraphError::QueryError(_))
    ));
    assert!(matches!(
        graph.query(&["vertices of"], &[]),
        Err(GraphError::QueryError(_))
    ));
}

#[test]
fn test_query_without_engine_is_an_error() {
    let graph = LiveGraph::in_memory();
    let err = graph.query(&["vertices of", ""], &[Value::from("Person")]);
    assert!(matches!(err, Err(GraphError::QueryError(_))));
}
