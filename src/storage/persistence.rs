//! Snapshot documents and the serial persistence queue

use crate::core::{Edge, GraphError, Result, Vertex};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tokio::sync::{mpsc, oneshot};
use tracing::{Level, event};

pub const DOCUMENT_FORMAT_VERSION: u32 = 1;

// ============================================================================
// Graph Document
// ============================================================================

/// Whole-graph export written to durable storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphDocument {
    pub version: u32,
    pub vertices: Vec<Vertex>,
    pub edges: Vec<Edge>,
    pub metadata: DocumentMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub created_at: String,
    pub vertex_count: usize,
    pub edge_count: usize,
}

impl GraphDocument {
    pub fn new(vertices: Vec<Vertex>, edges: Vec<Edge>) -> Self {
        let metadata = DocumentMetadata {
            created_at: Utc::now().to_rfc3339(),
            vertex_count: vertices.len(),
            edge_count: edges.len(),
        };
        Self {
            version: DOCUMENT_FORMAT_VERSION,
            vertices,
            edges,
            metadata,
        }
    }

    pub fn check_version(&self) -> Result<()> {
        if self.version != DOCUMENT_FORMAT_VERSION {
            return Err(GraphError::Serialization(format!(
                "unsupported document version {} (expected {})",
                self.version, DOCUMENT_FORMAT_VERSION
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Encoding
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SnapshotFormat {
    #[default]
    Json,
    MessagePack,
}

impl SnapshotFormat {
    pub fn encode(&self, document: &GraphDocument) -> Result<Vec<u8>> {
        match self {
            Self::Json => Ok(serde_json::to_vec(document)?),
            Self::MessagePack => Ok(rmp_serde::to_vec_named(document)?),
        }
    }

    pub fn decode(&self, bytes: &[u8]) -> Result<GraphDocument> {
        let document: GraphDocument = match self {
            Self::Json => serde_json::from_slice(bytes)?,
            Self::MessagePack => rmp_serde::from_slice(bytes)?,
        };
        document.check_version()?;
        Ok(document)
    }

    /// Guess the encoding of stored bytes. JSON documents always open with `{`.
    pub fn detect(bytes: &[u8]) -> Self {
        match bytes.iter().find(|b| !b.is_ascii_whitespace()) {
            Some(b'{') => Self::Json,
            _ => Self::MessagePack,
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "json" => Some(Self::Json),
            "msgpack" | "messagepack" | "rmp" => Some(Self::MessagePack),
            _ => None,
        }
    }
}

// ============================================================================
// Snapshot Sinks
// ============================================================================

/// Durable target for encoded snapshot documents.
pub trait SnapshotSink: Send + Sync + 'static {
    /// Replace the stored document with `bytes`
    fn write(&self, bytes: &[u8]) -> Result<()>;

    /// Read the stored document, if any
    fn load(&self) -> Result<Option<Vec<u8>>>;
}

/// Single-file sink. Each write lands in a temp file beside the target and is
/// renamed over it, so readers never see a truncated document.
pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Encode `document` and replace the file with it
    pub fn save(&self, document: &GraphDocument, format: SnapshotFormat) -> Result<()> {
        let bytes = format.encode(document)?;
        self.write(&bytes)
    }
}

impl SnapshotSink for FileSink {
    fn write(&self, bytes: &[u8]) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;
        let mut temp = tempfile::NamedTempFile::new_in(&dir)?;
        temp.write_all(bytes)?;
        temp.flush()?;
        temp.as_file().sync_all()?;
        temp.persist(&self.path).map_err(|e| GraphError::Io(e.error))?;
        Ok(())
    }

    fn load(&self) -> Result<Option<Vec<u8>>> {
        if !self.path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read(&self.path)?))
    }
}

// ============================================================================
// Persistence Queue
// ============================================================================

enum Job {
    Write {
        seq: u64,
        bytes: Vec<u8>,
        done: oneshot::Sender<Result<()>>,
    },
    Barrier(oneshot::Sender<Result<()>>),
}

/// Completion handle for one queued write.
///
/// Dropping the handle does not cancel the write.
#[must_use = "dropping the handle discards the write's outcome"]
pub struct PersistHandle {
    rx: oneshot::Receiver<Result<()>>,
}

impl PersistHandle {
    fn ready() -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(Ok(()));
        Self { rx }
    }

    pub(crate) fn failed(err: GraphError) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(Err(err));
        Self { rx }
    }

    /// Wait until the write hit storage, returning its own result
    pub async fn wait(self) -> Result<()> {
        self.rx.await.map_err(|_| GraphError::QueueClosed)?
    }

    /// Blocking variant of [`PersistHandle::wait`]. Must not be called from
    /// inside an async runtime.
    pub fn wait_blocking(self) -> Result<()> {
        self.rx.blocking_recv().map_err(|_| GraphError::QueueClosed)?
    }
}

/// Serial queue of snapshot writes.
///
/// A single worker drains the queue, so writes never interleave and complete
/// in enqueue order. A failed write is reported to its own handle only; the
/// worker moves on to the next job.
pub struct PersistenceQueue {
    sender: Option<mpsc::UnboundedSender<Job>>,
    worker: Option<JoinHandle<()>>,
    enqueued: AtomicU64,
    completed: Arc<AtomicU64>,
}

impl PersistenceQueue {
    /// Queue with no durable target; every handle resolves immediately.
    pub fn in_memory() -> Self {
        Self {
            sender: None,
            worker: None,
            enqueued: AtomicU64::new(0),
            completed: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn new(sink: Arc<dyn SnapshotSink>) -> Result<Self> {
        let (sender, mut receiver) = mpsc::unbounded_channel::<Job>();
        let completed = Arc::new(AtomicU64::new(0));
        let worker_completed = Arc::clone(&completed);

        let worker = std::thread::Builder::new()
            .name("livegraph-persist".to_string())
            .spawn(move || {
                while let Some(job) = receiver.blocking_recv() {
                    match job {
                        Job::Write { seq, bytes, done } => {
                            let result = sink.write(&bytes);
                            match &result {
                                Ok(()) => {
                                    event!(Level::DEBUG, seq, bytes = bytes.len(), "snapshot written");
                                }
                                Err(err) => {
                                    event!(Level::WARN, seq, error = %err, "snapshot write failed");
                                }
                            }
                            worker_completed.fetch_add(1, Ordering::SeqCst);
                            let _ = done.send(result);
                        }
                        Job::Barrier(done) => {
                            let _ = done.send(Ok(()));
                        }
                    }
                }
            })?;

        Ok(Self {
            sender: Some(sender),
            worker: Some(worker),
            enqueued: AtomicU64::new(0),
            completed,
        })
    }

    pub fn is_durable(&self) -> bool {
        self.sender.is_some()
    }

    /// Schedule `bytes` to replace the durable document after every write
    /// enqueued before it.
    pub fn enqueue(&self, bytes: Vec<u8>) -> PersistHandle {
        let Some(sender) = &self.sender else {
            return PersistHandle::ready();
        };
        let seq = self.enqueued.fetch_add(1, Ordering::SeqCst) + 1;
        let (done, rx) = oneshot::channel();
        if let Err(mpsc::error::SendError(Job::Write { done, .. })) =
            sender.send(Job::Write { seq, bytes, done })
        {
            let _ = done.send(Err(GraphError::QueueClosed));
        }
        PersistHandle { rx }
    }

    /// Handle that resolves once every write enqueued so far has finished.
    pub fn barrier(&self) -> PersistHandle {
        let Some(sender) = &self.sender else {
            return PersistHandle::ready();
        };
        let (done, rx) = oneshot::channel();
        if let Err(mpsc::error::SendError(Job::Barrier(done))) = sender.send(Job::Barrier(done))
        {
            let _ = done.send(Err(GraphError::QueueClosed));
        }
        PersistHandle { rx }
    }

    pub async fn flush(&self) -> Result<()> {
        self.barrier().wait().await
    }

    pub fn flush_blocking(&self) -> Result<()> {
        self.barrier().wait_blocking()
    }

    pub fn enqueued(&self) -> u64 {
        self.enqueued.load(Ordering::SeqCst)
    }

    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::SeqCst)
    }
}

impl Drop for PersistenceQueue {
    fn drop(&mut self) {
        // Closing the channel lets the worker finish queued jobs and exit
        self.sender.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}
