// ============================================================================
// livegraph Library
// ============================================================================

//! Live-object mapping over a snapshot-based property graph.
//!
//! Vertices are handed out as [`LiveVertex`] handles. Property writes are
//! coalesced per handle and flushed in one transaction on the next scheduler
//! turn; edges are navigated and edited through [`SingleEdges`] and
//! [`MultiEdges`]. Every committed transaction replaces the current snapshot
//! and queues one durable write of the whole document.
//!
//! ```
//! use livegraph::{LiveGraph, Value, props};
//!
//! # fn main() -> livegraph::Result<()> {
//! let graph = LiveGraph::in_memory();
//! let people = graph.model_type("Person");
//!
//! let ada = people.create(props! { "name" => "Ada" })?;
//! let bob = people.create(props! { "name" => "Bob" })?;
//! ada.multi_edges().add("friend", &bob, props! {}, true)?;
//!
//! ada.set("age", 36)?;
//! assert_eq!(ada.get("age")?, Some(Value::from(36)));
//! graph.settle()?;
//!
//! let friends = bob.multi_edges().list("friend")?;
//! assert_eq!(friends[0].get("age")?, Some(Value::from(36)));
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod core;
pub mod facade;
pub mod live;
pub mod query;
pub mod scheduler;
pub mod storage;
pub mod transaction;

// Used by `vertex_model!`
#[doc(hidden)]
pub use paste;

// Re-export main types for convenience
pub use config::GraphConfig;
pub use core::{Edge, GraphError, Properties, Result, Value, Vertex, VertexId};
pub use facade::{LiveGraph, ModelType};
pub use live::{LiveVertex, MultiEdges, SingleEdges, VertexModel};
pub use query::{EdgeRow, QueryEngine, QueryItem, QueryResults, RawResults, RawRow, VertexRow};
pub use scheduler::Scheduler;
pub use storage::{
    FileSink, GraphDocument, GraphStore, MemoryGraph, PersistHandle, PersistenceQueue,
    SnapshotFormat, SnapshotSink,
};
pub use transaction::{
    BranchTransaction, PrimitiveOutcome, TransactionCoordinator, TransactionPrimitive, TxOutcome,
    TxStats,
};
