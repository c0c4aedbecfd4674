use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{GraphError, Value};

pub type Properties = BTreeMap<String, Value>;

/// Opaque vertex identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VertexId(Uuid);

impl VertexId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for VertexId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for VertexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for VertexId {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| GraphError::TypeMismatch(format!("invalid vertex id '{}': {}", s, e)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    pub id: VertexId,
    #[serde(rename = "type")]
    pub vertex_type: String,
    #[serde(default)]
    pub properties: Properties,
}

impl Vertex {
    pub fn new(id: VertexId, vertex_type: impl Into<String>, properties: Properties) -> Self {
        Self {
            id,
            vertex_type: vertex_type.into(),
            properties,
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub origin: VertexId,
    pub target: VertexId,
    #[serde(rename = "type")]
    pub edge_type: String,
    #[serde(default)]
    pub properties: Properties,
}

impl Edge {
    pub fn new(
        origin: VertexId,
        target: VertexId,
        edge_type: impl Into<String>,
        properties: Properties,
    ) -> Self {
        Self {
            origin,
            target,
            edge_type: edge_type.into(),
            properties,
        }
    }
}

/// Builds a property map from `(name, value)` pairs.
///
/// ```
/// use livegraph::props;
///
/// let p = props! { "name" => "Ada", "born" => 1815i64 };
/// assert_eq!(p.len(), 2);
/// ```
#[macro_export]
macro_rules! props {
    () => {
        $crate::core::Properties::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut map = $crate::core::Properties::new();
        $( map.insert(::std::string::String::from($key), $crate::core::Value::from($value)); )+
        map
    }};
}
