//! Directed line segments.

use serde::{Deserialize, Serialize};

use crate::bbox::Bbox;
use crate::point::Point;
use crate::rect::Rect;
use crate::transform::{TransformMut, Transformation, TranslateMut};

/// A directed line segment from `p1` to `p2`.
#[derive(
    Debug, Default, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Edge {
    p1: Point,
    p2: Point,
}

impl Edge {
    /// Creates an edge between two points.
    #[inline]
    pub const fn new(p1: Point, p2: Point) -> Self {
        Self { p1, p2 }
    }

    /// The start point.
    #[inline]
    pub const fn p1(&self) -> Point {
        self.p1
    }

    /// The end point.
    #[inline]
    pub const fn p2(&self) -> Point {
        self.p2
    }

    /// The direction vector `p2 - p1`.
    #[inline]
    pub fn delta(&self) -> Point {
        self.p2 - self.p1
    }

    /// Returns `true` if both end points coincide.
    #[inline]
    pub fn is_degenerate(&self) -> bool {
        self.p1 == self.p2
    }

    /// The same segment traversed in the opposite direction.
    #[inline]
    pub fn reversed(&self) -> Self {
        Self::new(self.p2, self.p1)
    }

    /// The squared length of the edge.
    pub fn length_sq(&self) -> i128 {
        let d = self.delta();
        d.x as i128 * d.x as i128 + d.y as i128 * d.y as i128
    }

    /// Which side of the (infinite) edge line `p` lies on: positive for left, negative for right.
    pub fn side_of(&self, p: Point) -> i128 {
        self.delta().cross(p - self.p1).signum()
    }

    /// Returns `true` if the two segments cross at a point interior to both.
    pub fn crosses(&self, other: &Edge) -> bool {
        let a = self.side_of(other.p1) * self.side_of(other.p2);
        let b = other.side_of(self.p1) * other.side_of(self.p2);
        a < 0 && b < 0
    }
}

impl Bbox for Edge {
    fn bbox(&self) -> Option<Rect> {
        Some(Rect::new(self.p1, self.p2))
    }
}

impl TranslateMut for Edge {
    fn translate_mut(&mut self, p: Point) {
        self.p1.translate_mut(p);
        self.p2.translate_mut(p);
    }
}

impl TransformMut for Edge {
    fn transform_mut(&mut self, trans: Transformation) {
        self.p1.transform_mut(trans);
        self.p2.transform_mut(trans);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crossing_segments() {
        let a = Edge::new(Point::new(0, 0), Point::new(10, 10));
        let b = Edge::new(Point::new(0, 10), Point::new(10, 0));
        let c = Edge::new(Point::new(10, 10), Point::new(20, 0));
        assert!(a.crosses(&b));
        assert!(!a.crosses(&c));
        assert_eq!(a.reversed().p1(), Point::new(10, 10));
        assert_eq!(a.length_sq(), 200);
    }
}
