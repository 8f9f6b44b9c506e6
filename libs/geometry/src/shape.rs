//! The closed set of shape kinds a layer can hold.

use crate::bbox::Bbox;
use crate::edge::Edge;
use crate::edge_pair::EdgePair;
use crate::point::Point;
use crate::polygon::Polygon;
use crate::polygon_ref::PolygonRef;
use crate::rect::Rect;
use crate::text::Text;
use crate::transform::{Transform, TransformMut, Transformation, TranslateMut};

/// A layout shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Shape {
    /// An axis-aligned box.
    Box(Rect),
    /// A polygon.
    Polygon(Polygon),
    /// A reference to a shared polygon.
    PolygonRef(PolygonRef),
    /// A line segment.
    Edge(Edge),
    /// A pair of line segments.
    EdgePair(EdgePair),
    /// A text label.
    Text(Text),
}

/// The kind of a [`Shape`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ShapeKind {
    /// See [`Shape::Box`].
    Box,
    /// See [`Shape::Polygon`].
    Polygon,
    /// See [`Shape::PolygonRef`].
    PolygonRef,
    /// See [`Shape::Edge`].
    Edge,
    /// See [`Shape::EdgePair`].
    EdgePair,
    /// See [`Shape::Text`].
    Text,
}

impl Shape {
    /// The kind of this shape.
    pub fn kind(&self) -> ShapeKind {
        match self {
            Shape::Box(_) => ShapeKind::Box,
            Shape::Polygon(_) => ShapeKind::Polygon,
            Shape::PolygonRef(_) => ShapeKind::PolygonRef,
            Shape::Edge(_) => ShapeKind::Edge,
            Shape::EdgePair(_) => ShapeKind::EdgePair,
            Shape::Text(_) => ShapeKind::Text,
        }
    }

    /// Returns `true` for boxes, polygons and polygon references.
    pub fn is_polygonal(&self) -> bool {
        matches!(
            self,
            Shape::Box(_) | Shape::Polygon(_) | Shape::PolygonRef(_)
        )
    }

    /// The shape as a polygon, if it is polygonal.
    pub fn to_polygon(&self) -> Option<Polygon> {
        match self {
            Shape::Box(r) => Some(r.to_polygon()),
            Shape::Polygon(p) => Some(p.clone()),
            Shape::PolygonRef(r) => Some(r.to_polygon()),
            _ => None,
        }
    }

    /// The shape as a text label, if it is one.
    pub fn as_text(&self) -> Option<&Text> {
        match self {
            Shape::Text(t) => Some(t),
            _ => None,
        }
    }

    /// The shape as an edge, if it is one.
    pub fn as_edge(&self) -> Option<&Edge> {
        match self {
            Shape::Edge(e) => Some(e),
            _ => None,
        }
    }

    /// The shape as an edge pair, if it is one.
    pub fn as_edge_pair(&self) -> Option<&EdgePair> {
        match self {
            Shape::EdgePair(e) => Some(e),
            _ => None,
        }
    }

    /// The area of polygonal shapes; zero for all other kinds.
    pub fn area(&self) -> f64 {
        match self {
            Shape::Box(r) => r.area() as f64,
            Shape::Polygon(p) => p.area(),
            Shape::PolygonRef(r) => r.base().area(),
            _ => 0.,
        }
    }

    /// Returns a transformed copy of the shape.
    ///
    /// Boxes stay boxes; rotations by 90 degrees swap their sides.
    pub fn transformed(&self, trans: Transformation) -> Shape {
        self.clone().transform(trans)
    }
}

impl Bbox for Shape {
    fn bbox(&self) -> Option<Rect> {
        match self {
            Shape::Box(r) => r.bbox(),
            Shape::Polygon(p) => p.bbox(),
            Shape::PolygonRef(r) => r.bbox(),
            Shape::Edge(e) => e.bbox(),
            Shape::EdgePair(e) => e.bbox(),
            Shape::Text(t) => t.bbox(),
        }
    }
}

impl TranslateMut for Shape {
    fn translate_mut(&mut self, p: Point) {
        match self {
            Shape::Box(r) => r.translate_mut(p),
            Shape::Polygon(x) => x.translate_mut(p),
            Shape::PolygonRef(r) => r.translate_mut(p),
            Shape::Edge(e) => e.translate_mut(p),
            Shape::EdgePair(e) => e.translate_mut(p),
            Shape::Text(t) => t.translate_mut(p),
        }
    }
}

impl TransformMut for Shape {
    fn transform_mut(&mut self, trans: Transformation) {
        match self {
            Shape::Box(r) => r.transform_mut(trans),
            Shape::Polygon(p) => p.transform_mut(trans),
            Shape::PolygonRef(r) => r.transform_mut(trans),
            Shape::Edge(e) => e.transform_mut(trans),
            Shape::EdgePair(e) => e.transform_mut(trans),
            Shape::Text(t) => t.transform_mut(trans),
        }
    }
}

impl From<Rect> for Shape {
    fn from(value: Rect) -> Self {
        Shape::Box(value)
    }
}

impl From<Polygon> for Shape {
    fn from(value: Polygon) -> Self {
        Shape::Polygon(value)
    }
}

impl From<PolygonRef> for Shape {
    fn from(value: PolygonRef) -> Self {
        Shape::PolygonRef(value)
    }
}

impl From<Edge> for Shape {
    fn from(value: Edge) -> Self {
        Shape::Edge(value)
    }
}

impl From<EdgePair> for Shape {
    fn from(value: EdgePair) -> Self {
        Shape::EdgePair(value)
    }
}

impl From<Text> for Shape {
    fn from(value: Text) -> Self {
        Shape::Text(value)
    }
}
