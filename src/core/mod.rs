pub mod error;
pub mod types;
pub mod value;

pub use error::{GraphError, Result};
pub use types::{Edge, Properties, Vertex, VertexId};
pub use value::Value;
