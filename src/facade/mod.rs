pub mod graph;
pub mod model;

pub use graph::LiveGraph;
pub use model::ModelType;
