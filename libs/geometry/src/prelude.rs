//! An import prelude that re-exports commonly used items.

pub use crate::bbox::{Bbox, BoundingUnion};
pub use crate::edge::Edge;
pub use crate::edge_pair::EdgePair;
pub use crate::point::Point;
pub use crate::polygon::Polygon;
pub use crate::polygon_ref::PolygonRef;
pub use crate::rect::Rect;
pub use crate::shape::{Shape, ShapeKind};
pub use crate::text::Text;
pub use crate::transform::{
    Rotation, Transform, TransformMut, Transformation, TransformationMatrix, Translate,
    TranslateMut,
};
