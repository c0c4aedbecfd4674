use super::vertex::LiveVertex;
use crate::core::{Properties, Result, VertexId};
use crate::facade::LiveGraph;
use crate::storage::{GraphStore, MemoryGraph};

/// Typed wrapper bound to one vertex type.
///
/// Usually generated with [`vertex_model!`](crate::vertex_model).
pub trait VertexModel<S: GraphStore = MemoryGraph>: Sized {
    const VERTEX_TYPE: &'static str;

    fn from_vertex(vertex: LiveVertex<S>) -> Self;

    fn vertex(&self) -> &LiveVertex<S>;

    /// Wrap `vertex` if it has this model's type
    fn try_from_vertex(vertex: LiveVertex<S>) -> Option<Self> {
        if vertex.vertex_type() == Self::VERTEX_TYPE {
            Some(Self::from_vertex(vertex))
        } else {
            None
        }
    }

    fn create(graph: &LiveGraph<S>, properties: Properties) -> Result<Self> {
        graph
            .model_type(Self::VERTEX_TYPE)
            .create(properties)
            .map(Self::from_vertex)
    }

    fn find_by_id(graph: &LiveGraph<S>, id: VertexId) -> Result<Option<Self>> {
        Ok(graph
            .model_type(Self::VERTEX_TYPE)
            .find_by_id(id)?
            .map(Self::from_vertex))
    }

    fn all(graph: &LiveGraph<S>) -> Result<Vec<Self>> {
        Ok(graph
            .model_type(Self::VERTEX_TYPE)
            .all()?
            .into_iter()
            .map(Self::from_vertex)
            .collect())
    }
}

/// Generate a typed vertex wrapper over the in-memory graph.
///
/// Each field gets a getter returning `Result<Option<T>>` and a `set_<field>`
/// setter that goes through the coalescing write path. The wrapper derefs to
/// [`LiveVertex`] for everything else.
///
/// ```
/// use livegraph::{LiveGraph, VertexModel, props, vertex_model};
///
/// vertex_model! {
///     pub struct Person: "Person" {
///         name: String,
///         age: i64,
///     }
/// }
///
/// let graph = LiveGraph::in_memory();
/// let ada = Person::create(&graph, props! { "name" => "Ada" }).unwrap();
/// ada.set_age(36).unwrap();
/// assert_eq!(ada.age().unwrap(), Some(36));
/// assert_eq!(ada.name().unwrap().as_deref(), Some("Ada"));
/// ```
#[macro_export]
macro_rules! vertex_model {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident : $vertex_type:literal {
            $($field:ident : $ty:ty),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone)]
        $vis struct $name {
            vertex: $crate::live::LiveVertex,
        }

        impl $crate::live::VertexModel for $name {
            const VERTEX_TYPE: &'static str = $vertex_type;

            fn from_vertex(vertex: $crate::live::LiveVertex) -> Self {
                Self { vertex }
            }

            fn vertex(&self) -> &$crate::live::LiveVertex {
                &self.vertex
            }
        }

        impl $name {
            $(
                pub fn $field(&self) -> $crate::core::Result<::std::option::Option<$ty>> {
                    self.vertex.get_as::<$ty>(stringify!($field))
                }

                $crate::paste::paste! {
                    pub fn [<set_ $field>](&self, value: impl ::std::convert::Into<$ty>) -> $crate::core::Result<()> {
                        let value: $ty = value.into();
                        self.vertex.set(stringify!($field), value)
                    }
                }
            )*
        }

        impl ::std::ops::Deref for $name {
            type Target = $crate::live::LiveVertex;

            fn deref(&self) -> &Self::Target {
                &self.vertex
            }
        }
    };
}
