//! Query execution plumbing and lazily wrapped results.

pub mod engine;
pub mod result;

pub use engine::{QueryEngine, RawResults, RawRow};
pub use result::{EdgeRow, QueryItem, QueryResults, VertexRow};
