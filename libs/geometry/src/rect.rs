//! Axis-aligned rectangles.

use serde::{Deserialize, Serialize};

use crate::bbox::Bbox;
use crate::point::Point;
use crate::polygon::Polygon;
use crate::transform::{TransformMut, Transformation, TranslateMut};

/// An axis-aligned rectangle, specified by lower-left and upper-right corners.
///
/// Rectangles are ordered lexicographically by their corners, so sets of
/// rectangles have a deterministic iteration order.
#[derive(
    Debug, Default, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Rect {
    p0: Point,
    p1: Point,
}

impl Rect {
    /// Creates a rectangle from all four sides (left, bottom, right, top).
    ///
    /// # Panics
    ///
    /// This method panics if `left > right` or if `bot > top`.
    ///
    /// # Example
    ///
    /// ```
    /// # use geometry::prelude::*;
    /// let rect = Rect::from_sides(15, 20, 30, 40);
    /// assert_eq!(rect.left(), 15);
    /// assert_eq!(rect.top(), 40);
    /// ```
    #[inline]
    pub fn from_sides(left: i64, bot: i64, right: i64, top: i64) -> Self {
        assert!(
            left <= right,
            "Rect::from_sides requires that left ({}) <= right ({})",
            left,
            right
        );
        assert!(
            bot <= top,
            "Rect::from_sides requires that bot ({}) <= top ({})",
            bot,
            top
        );
        Self {
            p0: Point::new(left, bot),
            p1: Point::new(right, top),
        }
    }

    /// Creates a rectangle from all four sides, returning `None` if the sides are out of order.
    pub fn from_sides_option(left: i64, bot: i64, right: i64, top: i64) -> Option<Self> {
        if left > right || bot > top {
            None
        } else {
            Some(Self {
                p0: Point::new(left, bot),
                p1: Point::new(right, top),
            })
        }
    }

    /// Creates a new rectangle from the given opposite corner points.
    #[inline]
    pub fn new(p0: Point, p1: Point) -> Self {
        Self {
            p0: Point::new(p0.x.min(p1.x), p0.y.min(p1.y)),
            p1: Point::new(p0.x.max(p1.x), p0.y.max(p1.y)),
        }
    }

    /// Creates a zero-area rectangle containing the given point.
    #[inline]
    pub const fn from_point(p: Point) -> Self {
        Self { p0: p, p1: p }
    }

    /// Returns the bottom y-coordinate of the rectangle.
    #[inline]
    pub const fn bot(&self) -> i64 {
        self.p0.y
    }

    /// Returns the top y-coordinate of the rectangle.
    #[inline]
    pub const fn top(&self) -> i64 {
        self.p1.y
    }

    /// Returns the left x-coordinate of the rectangle.
    #[inline]
    pub const fn left(&self) -> i64 {
        self.p0.x
    }

    /// Returns the right x-coordinate of the rectangle.
    #[inline]
    pub const fn right(&self) -> i64 {
        self.p1.x
    }

    /// Returns the lower-left corner.
    #[inline]
    pub const fn lower_left(&self) -> Point {
        self.p0
    }

    /// Returns the upper-right corner.
    #[inline]
    pub const fn upper_right(&self) -> Point {
        self.p1
    }

    /// Returns the width of the rectangle.
    #[inline]
    pub const fn width(&self) -> i64 {
        self.p1.x - self.p0.x
    }

    /// Returns the height of the rectangle.
    #[inline]
    pub const fn height(&self) -> i64 {
        self.p1.y - self.p0.y
    }

    /// Returns the area of the rectangle.
    #[inline]
    pub fn area(&self) -> i128 {
        self.width() as i128 * self.height() as i128
    }

    /// Returns `true` if the rectangle has zero width or zero height.
    #[inline]
    pub fn is_degenerate(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    /// Returns the center point, rounded towards negative infinity.
    pub fn center(&self) -> Point {
        Point::new(
            (self.p0.x + self.p1.x).div_euclid(2),
            (self.p0.y + self.p1.y).div_euclid(2),
        )
    }

    /// The four corners in counterclockwise order, starting at the lower left.
    pub fn corners(&self) -> [Point; 4] {
        [
            self.p0,
            Point::new(self.p1.x, self.p0.y),
            self.p1,
            Point::new(self.p0.x, self.p1.y),
        ]
    }

    /// Computes the smallest rectangle containing both `self` and `other`.
    ///
    /// ```
    /// # use geometry::prelude::*;
    /// let r1 = Rect::from_sides(0, 0, 100, 200);
    /// let r2 = Rect::from_sides(-50, 20, 120, 160);
    /// assert_eq!(r1.union(r2), Rect::from_sides(-50, 0, 120, 200));
    /// ```
    pub fn union(self, other: Self) -> Self {
        Rect::new(
            Point::new(self.p0.x.min(other.p0.x), self.p0.y.min(other.p0.y)),
            Point::new(self.p1.x.max(other.p1.x), self.p1.y.max(other.p1.y)),
        )
    }

    /// Computes the intersection of two rectangles.
    ///
    /// Rectangles that only touch produce a zero-area intersection. Disjoint
    /// rectangles produce `None`.
    ///
    /// ```
    /// # use geometry::prelude::*;
    /// let r1 = Rect::from_sides(0, 0, 100, 200);
    /// let r2 = Rect::from_sides(-50, 20, 120, 160);
    /// assert_eq!(r1.intersection(r2), Some(Rect::from_sides(0, 20, 100, 160)));
    ///
    /// let r2 = Rect::from_sides(120, -60, 240, 800);
    /// assert_eq!(r1.intersection(r2), None);
    /// ```
    pub fn intersection(self, other: Self) -> Option<Self> {
        Rect::from_sides_option(
            self.p0.x.max(other.p0.x),
            self.p0.y.max(other.p0.y),
            self.p1.x.min(other.p1.x),
            self.p1.y.min(other.p1.y),
        )
    }

    /// Returns `true` if the interiors of the two rectangles intersect.
    ///
    /// A zero-area rectangle overlaps another rectangle if it lies strictly
    /// inside of it.
    ///
    /// ```
    /// # use geometry::prelude::*;
    /// let r1 = Rect::from_sides(0, 0, 100, 100);
    /// assert!(r1.overlaps(&Rect::from_sides(50, 50, 150, 150)));
    /// assert!(!r1.overlaps(&Rect::from_sides(100, 0, 200, 100)));
    /// assert!(r1.overlaps(&Rect::from_point(Point::new(10, 10))));
    /// ```
    pub fn overlaps(&self, other: &Rect) -> bool {
        self.p0.x < other.p1.x
            && other.p0.x < self.p1.x
            && self.p0.y < other.p1.y
            && other.p0.y < self.p1.y
    }

    /// Returns `true` if the two rectangles share at least one point.
    pub fn touches(&self, other: &Rect) -> bool {
        self.p0.x <= other.p1.x
            && other.p0.x <= self.p1.x
            && self.p0.y <= other.p1.y
            && other.p0.y <= self.p1.y
    }

    /// Returns `true` if `self` lies entirely within `other`, boundary included.
    pub fn inside(&self, other: &Rect) -> bool {
        self.p0.x >= other.p0.x
            && self.p0.y >= other.p0.y
            && self.p1.x <= other.p1.x
            && self.p1.y <= other.p1.y
    }

    /// Expands the rectangle by `amount` on all sides.
    ///
    /// A negative amount shrinks the rectangle, saturating at its center.
    pub fn expand_all(&self, amount: i64) -> Self {
        if amount >= 0 {
            return Self {
                p0: Point::new(self.p0.x - amount, self.p0.y - amount),
                p1: Point::new(self.p1.x + amount, self.p1.y + amount),
            };
        }
        let c = self.center();
        let dx = (-amount).min(self.width() / 2);
        let dy = (-amount).min(self.height() / 2);
        Rect::new(
            Point::new((self.p0.x + dx).min(c.x), (self.p0.y + dy).min(c.y)),
            Point::new((self.p1.x - dx).max(c.x), (self.p1.y - dy).max(c.y)),
        )
    }

    /// Converts the rectangle to a four-point polygon.
    pub fn to_polygon(&self) -> Polygon {
        Polygon::from_verts(self.corners().to_vec())
    }
}

impl Bbox for Rect {
    fn bbox(&self) -> Option<Rect> {
        Some(*self)
    }
}

impl TranslateMut for Rect {
    fn translate_mut(&mut self, p: Point) {
        self.p0.translate_mut(p);
        self.p1.translate_mut(p);
    }
}

impl TransformMut for Rect {
    fn transform_mut(&mut self, trans: Transformation) {
        let (p0, p1) = (trans.apply(self.p0), trans.apply(self.p1));
        *self = Rect::new(p0, p1);
    }
}

#[cfg(test)]
mod tests {
    use crate::prelude::*;

    #[test]
    fn transform_keeps_corners_sorted() {
        let r = Rect::from_sides(0, 0, 10, 20);
        let t = Transformation::from_opts(Point::new(100, 0), false, Rotation::R90);
        assert_eq!(r.transform(t), Rect::from_sides(80, 0, 100, 10));
    }

    #[test]
    fn inside_and_overlap() {
        let outer = Rect::from_sides(0, 0, 100, 100);
        let inner = Rect::from_sides(10, 10, 20, 20);
        assert!(inner.inside(&outer));
        assert!(!outer.inside(&inner));
        assert!(outer.inside(&outer));
        assert!(inner.overlaps(&outer));
        assert!(Rect::from_sides(100, 100, 200, 200).touches(&outer));
        assert!(!Rect::from_sides(100, 100, 200, 200).overlaps(&outer));
    }

    #[test]
    fn expand_and_shrink() {
        let r = Rect::from_sides(0, 0, 10, 4);
        assert_eq!(r.expand_all(2), Rect::from_sides(-2, -2, 12, 6));
        assert_eq!(r.expand_all(-1), Rect::from_sides(1, 1, 9, 3));
        assert_eq!(r.expand_all(-5), Rect::from_sides(5, 2, 5, 2));
    }
}
