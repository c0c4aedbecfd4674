//! Live objects: vertex handles with coalesced writes and edge navigation.

pub mod edges;
pub mod model;
pub mod vertex;

pub use edges::{MultiEdges, SingleEdges};
pub use model::VertexModel;
pub use vertex::LiveVertex;
