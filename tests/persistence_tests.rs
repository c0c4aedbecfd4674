//! Integration tests for snapshot persistence, write ordering and reopening

use futures::future::join_all;
use livegraph::{
    BranchTransaction, GraphConfig, GraphError, GraphStore, LiveGraph, MemoryGraph, Result,
    SnapshotFormat, SnapshotSink, Value, props,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Keeps every written document in arrival order
#[derive(Default)]
struct RecordingSink {
    writes: Mutex<Vec<Vec<u8>>>,
}

impl RecordingSink {
    fn vertex_counts(&self) -> Vec<usize> {
        self.writes
            .lock()
            .unwrap()
            .iter()
            .map(|bytes| {
                SnapshotFormat::detect(bytes)
                    .decode(bytes)
                    .unwrap()
                    .metadata
                    .vertex_count
            })
            .collect()
    }
}

impl SnapshotSink for RecordingSink {
    fn write(&self, bytes: &[u8]) -> Result<()> {
        self.writes.lock().unwrap().push(bytes.to_vec());
        Ok(())
    }

    fn load(&self) -> Result<Option<Vec<u8>>> {
        Ok(self.writes.lock().unwrap().last().cloned())
    }
}

/// Fails the first `failures` writes, then records
struct FlakySink {
    failures: AtomicUsize,
    inner: RecordingSink,
}

impl SnapshotSink for FlakySink {
    fn write(&self, bytes: &[u8]) -> Result<()> {
        let left = self.failures.load(Ordering::SeqCst);
        if left > 0 {
            self.failures.store(left - 1, Ordering::SeqCst);
            return Err(GraphError::Io(std::io::Error::other("disk full")));
        }
        self.inner.write(bytes)
    }

    fn load(&self) -> Result<Option<Vec<u8>>> {
        self.inner.load()
    }
}

fn graph_with_sink(sink: Arc<dyn SnapshotSink>) -> LiveGraph {
    LiveGraph::<MemoryGraph>::with_sink(sink, Arc::new(BranchTransaction), SnapshotFormat::Json)
        .unwrap()
}

#[tokio::test]
async fn test_commits_persist_in_commit_order() {
    let sink = Arc::new(RecordingSink::default());
    let graph = graph_with_sink(sink.clone());
    let people = graph.model_type("Person");

    let mut handles = Vec::new();
    for i in 0..5 {
        let id = livegraph::VertexId::new();
        let outcome = graph
            .with_transaction(|| {
                graph
                    .coordinator()
                    .write(|g| g.set_vertex(id, "Person", props! { "i" => i }))
            })
            .unwrap();
        handles.push(outcome.into_persist_handle().unwrap().wait());
    }

    for result in join_all(handles).await {
        result.unwrap();
    }
    assert_eq!(sink.vertex_counts(), vec![1, 2, 3, 4, 5]);
    assert_eq!(people.all().unwrap().len(), 5);
}

#[tokio::test]
async fn test_failed_write_does_not_block_later_writes() {
    let sink = Arc::new(FlakySink {
        failures: AtomicUsize::new(1),
        inner: RecordingSink::default(),
    });
    let graph = graph_with_sink(sink.clone());
    let people = graph.model_type("Person");

    let first = graph
        .with_transaction(|| people.create(props! { "name" => "first" }))
        .unwrap();
    let second = graph
        .with_transaction(|| people.create(props! { "name" => "second" }))
        .unwrap();

    let first = first.into_persist_handle().unwrap().wait().await;
    let second = second.into_persist_handle().unwrap().wait().await;

    assert!(matches!(first, Err(GraphError::Io(_))));
    assert!(second.is_ok());
    // In-memory state is unaffected by the failed write
    assert_eq!(people.all().unwrap().len(), 2);
    assert_eq!(sink.inner.vertex_counts(), vec![2]);
}

#[tokio::test]
async fn test_persisted_waits_for_deferred_flush_write() {
    let sink = Arc::new(RecordingSink::default());
    let graph = graph_with_sink(sink.clone());
    let ada = graph
        .model_type("Person")
        .create(props! { "name" => "Ada" })
        .unwrap();

    ada.set("age", 36).unwrap();
    graph.settle().unwrap();
    graph.persisted().await.unwrap();

    let stored = sink.load().unwrap().unwrap();
    let document = SnapshotFormat::Json.decode(&stored).unwrap();
    assert_eq!(document.vertices[0].get("age"), Some(&Value::from(36)));
}

#[tokio::test]
async fn test_reopen_from_json_document() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("graph.json");

    let (a, b) = {
        let graph = LiveGraph::open(GraphConfig::persistent(&path)).unwrap();
        let people = graph.model_type("Person");
        let a = people.create(props! { "name" => "A" }).unwrap();
        let b = people.create(props! { "name" => "B" }).unwrap();
        a.multi_edges()
            .add("friend", &b, props! { "since" => 2020 }, true)
            .unwrap();
        graph.persisted().await.unwrap();
        (a.id(), b.id())
    };

    assert!(path.exists());
    let graph = LiveGraph::open(GraphConfig::persistent(&path)).unwrap();
    let a = graph.model_type("Person").find_by_id(a).unwrap().unwrap();
    let friends = a.multi_edges().list("friend").unwrap();
    assert_eq!(friends.len(), 1);
    assert_eq!(friends[0].id(), b);
    assert_eq!(
        friends[0].backtrace().unwrap().get("since"),
        Some(&Value::from(2020))
    );
}

#[tokio::test]
async fn test_reopen_from_messagepack_document() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("graph.msgpack");
    let config = GraphConfig::persistent(&path).format(SnapshotFormat::MessagePack);

    {
        let graph = LiveGraph::open(config.clone()).unwrap();
        let ada = graph
            .model_type("Person")
            .create(props! { "name" => "Ada", "tags" => vec!["math", "engines"] })
            .unwrap();
        ada.set("age", 36).unwrap();
        graph.settle().unwrap();
        graph.persisted().await.unwrap();
    }

    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(SnapshotFormat::detect(&bytes), SnapshotFormat::MessagePack);

    let graph = LiveGraph::open(config).unwrap();
    let people = graph.model_type("Person").all().unwrap();
    assert_eq!(people.len(), 1);
    assert_eq!(people[0].get_as::<i64>("age").unwrap(), Some(36));
    assert_eq!(
        people[0].get("tags").unwrap(),
        Some(Value::from(vec!["math", "engines"]))
    );
}

#[tokio::test]
async fn test_in_memory_graph_has_no_durable_target() {
    let graph = LiveGraph::in_memory();
    assert!(!graph.coordinator().persistence().is_durable());

    let outcome = graph
        .with_transaction(|| graph.model_type("Person").create(props! {}))
        .unwrap();
    outcome.into_persist_handle().unwrap().wait().await.unwrap();
    graph.persisted().await.unwrap();
}

#[test]
fn test_queue_counters_track_writes() {
    let temp_dir = TempDir::new().unwrap();
    let graph = LiveGraph::open(GraphConfig::persistent(temp_dir.path().join("g.json"))).unwrap();
    let people = graph.model_type("Person");
    for _ in 0..3 {
        people.create(props! {}).unwrap();
    }
    graph.persisted_blocking().unwrap();

    let queue = graph.coordinator().persistence();
    assert_eq!(queue.enqueued(), 3);
    assert_eq!(queue.completed(), 3);
}
