//! Pairs of edges, the usual output of width and space checks.

use serde::{Deserialize, Serialize};

use crate::bbox::{Bbox, BoundingUnion};
use crate::edge::Edge;
use crate::point::Point;
use crate::polygon::Polygon;
use crate::rect::Rect;
use crate::transform::{TransformMut, Transformation, TranslateMut};

/// Two related edges.
#[derive(
    Debug, Default, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct EdgePair {
    first: Edge,
    second: Edge,
}

impl EdgePair {
    /// Creates an edge pair.
    pub const fn new(first: Edge, second: Edge) -> Self {
        Self { first, second }
    }

    /// The first edge.
    #[inline]
    pub const fn first(&self) -> Edge {
        self.first
    }

    /// The second edge.
    #[inline]
    pub const fn second(&self) -> Edge {
        self.second
    }

    /// Converts the edge pair to a polygon.
    ///
    /// With `enlargement == 0`, the polygon is the quadrilateral spanned by both
    /// edges, or `None` if that quadrilateral has no area. With a positive
    /// enlargement, the polygon is the bounding box of both edges grown by the
    /// enlargement on every side.
    pub fn to_polygon(&self, enlargement: i64) -> Option<Polygon> {
        if enlargement > 0 {
            return self.bbox().map(|b| b.expand_all(enlargement).to_polygon());
        }
        Polygon::from_verts(vec![
            self.first.p1(),
            self.first.p2(),
            self.second.p1(),
            self.second.p2(),
        ])
        .normalized()
        .filter(|p| p.area2() != 0)
    }
}

impl Bbox for EdgePair {
    fn bbox(&self) -> Option<Rect> {
        self.first.bbox().bounding_union(&self.second.bbox())
    }
}

impl TranslateMut for EdgePair {
    fn translate_mut(&mut self, p: Point) {
        self.first.translate_mut(p);
        self.second.translate_mut(p);
    }
}

impl TransformMut for EdgePair {
    fn transform_mut(&mut self, trans: Transformation) {
        self.first.transform_mut(trans);
        self.second.transform_mut(trans);
    }
}

#[cfg(test)]
mod tests {
    use crate::prelude::*;

    #[test]
    fn antiparallel_pair_becomes_quad() {
        let ep = EdgePair::new(
            Edge::new(Point::new(0, 0), Point::new(10, 0)),
            Edge::new(Point::new(10, 5), Point::new(0, 5)),
        );
        assert_eq!(
            ep.to_polygon(0).and_then(|p| p.to_rect()),
            Some(Rect::from_sides(0, 0, 10, 5))
        );
        assert_eq!(
            ep.to_polygon(1).and_then(|p| p.to_rect()),
            Some(Rect::from_sides(-1, -1, 11, 6))
        );
    }

    #[test]
    fn collinear_pair_without_enlargement_is_empty() {
        let ep = EdgePair::new(
            Edge::new(Point::new(0, 0), Point::new(10, 0)),
            Edge::new(Point::new(20, 0), Point::new(30, 0)),
        );
        assert_eq!(ep.to_polygon(0), None);
        assert!(ep.to_polygon(2).is_some());
    }
}
