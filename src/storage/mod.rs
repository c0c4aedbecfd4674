pub mod engine;
pub mod memory;
pub mod persistence;

pub use engine::{GraphStore, OutEdges};
pub use memory::MemoryGraph;
pub use persistence::{
    DOCUMENT_FORMAT_VERSION, DocumentMetadata, FileSink, GraphDocument, PersistHandle,
    PersistenceQueue, SnapshotFormat, SnapshotSink,
};
