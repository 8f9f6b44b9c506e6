//! Simple polygons: a single closed hull without holes.

use serde::{Deserialize, Serialize};

use crate::bbox::Bbox;
use crate::edge::Edge;
use crate::point::Point;
use crate::rect::Rect;
use crate::transform::{TransformMut, Transformation, TranslateMut};

/// A polygon, with vertex coordinates given in counterclockwise or clockwise order.
///
/// The closing edge from the last to the first vertex is implied.
#[derive(
    Debug, Default, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Polygon {
    points: Vec<Point>,
}

impl Polygon {
    /// Creates a polygon with given vertices.
    pub fn from_verts(points: Vec<Point>) -> Self {
        Self { points }
    }

    /// Returns a reference to the vertices of the polygon.
    #[inline]
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// The number of vertices.
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.points.len()
    }

    /// Returns `true` if the polygon has no vertices.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Twice the signed area (positive for counterclockwise hulls).
    pub fn area2(&self) -> i128 {
        let n = self.points.len();
        (0..n)
            .map(|i| self.points[i].cross(self.points[(i + 1) % n]))
            .sum()
    }

    /// The unsigned area.
    pub fn area(&self) -> f64 {
        self.area2().abs() as f64 / 2.
    }

    /// The ratio of the bounding box area to the polygon area.
    ///
    /// Zero-area polygons report a ratio of zero.
    pub fn area_ratio(&self) -> f64 {
        let a2 = self.area2().abs();
        if a2 == 0 {
            return 0.;
        }
        match self.bbox() {
            Some(bbox) => (2 * bbox.area()) as f64 / a2 as f64,
            None => 0.,
        }
    }

    /// Returns the polygon as a rectangle, if it is one.
    pub fn to_rect(&self) -> Option<Rect> {
        let norm = self.normalized()?;
        let bbox = norm.bbox()?;
        if norm.vertex_count() == 4 && 2 * bbox.area() == norm.area2().abs() {
            Some(bbox)
        } else {
            None
        }
    }

    /// Iterates over the edges of the polygon, including the closing edge.
    pub fn edges(&self) -> impl Iterator<Item = Edge> + '_ {
        let n = self.points.len();
        (0..n).map(move |i| Edge::new(self.points[i], self.points[(i + 1) % n]))
    }

    /// Removes duplicate vertices, collinear vertices and zero-width spikes.
    ///
    /// Returns `None` if fewer than three vertices remain.
    pub fn normalized(&self) -> Option<Polygon> {
        let mut pts = self.points.clone();
        loop {
            let n = pts.len();
            if n < 3 {
                return None;
            }
            let redundant = (0..n).find(|&i| {
                let prev = pts[(i + n - 1) % n];
                let cur = pts[i];
                let next = pts[(i + 1) % n];
                cur == prev || (cur - prev).cross(next - cur) == 0
            });
            match redundant {
                Some(i) => {
                    pts.remove(i);
                }
                None => break,
            }
        }
        Some(Polygon { points: pts })
    }

    /// Returns `true` if two non-adjacent edges of the hull cross each other.
    ///
    /// Such polygons have no consistent orientation.
    pub fn is_self_intersecting(&self) -> bool {
        let edges: Vec<Edge> = self.edges().collect();
        let n = edges.len();
        if n < 4 {
            return false;
        }
        for i in 0..n {
            for j in (i + 2)..n {
                if i == 0 && j == n - 1 {
                    continue;
                }
                if edges[i].crosses(&edges[j]) {
                    return true;
                }
            }
        }
        false
    }

    /// Clips the polygon to the given rectangle.
    ///
    /// Returns `None` if nothing with a nonzero area remains.
    pub fn clip(&self, rect: &Rect) -> Option<Polygon> {
        let bbox = self.bbox()?;
        if bbox.inside(rect) {
            return self.normalized().filter(|p| p.area2() != 0);
        }
        if !bbox.overlaps(rect) {
            return None;
        }
        let mut pts = self.points.clone();
        for boundary in [
            Boundary::Left(rect.left()),
            Boundary::Right(rect.right()),
            Boundary::Bot(rect.bot()),
            Boundary::Top(rect.top()),
        ] {
            pts = boundary.clip(&pts);
            if pts.is_empty() {
                return None;
            }
        }
        Polygon::from_verts(pts)
            .normalized()
            .filter(|p| p.area2() != 0)
    }

    /// Cuts the polygon in two at the center of its bounding box, across the longer side.
    ///
    /// Returns `None` if the bounding box is too small to be cut.
    pub fn split(&self) -> Option<Vec<Polygon>> {
        let bbox = self.bbox()?;
        if bbox.width() <= 1 && bbox.height() <= 1 {
            return None;
        }
        let c = bbox.center();
        let halves = if bbox.width() >= bbox.height() {
            [
                Rect::from_sides(bbox.left(), bbox.bot(), c.x, bbox.top()),
                Rect::from_sides(c.x, bbox.bot(), bbox.right(), bbox.top()),
            ]
        } else {
            [
                Rect::from_sides(bbox.left(), bbox.bot(), bbox.right(), c.y),
                Rect::from_sides(bbox.left(), c.y, bbox.right(), bbox.top()),
            ]
        };
        Some(halves.iter().filter_map(|half| self.clip(half)).collect())
    }
}

/// One side of a clip rectangle.
#[derive(Clone, Copy)]
enum Boundary {
    Left(i64),
    Right(i64),
    Bot(i64),
    Top(i64),
}

impl Boundary {
    fn contains(&self, p: Point) -> bool {
        match *self {
            Boundary::Left(x) => p.x >= x,
            Boundary::Right(x) => p.x <= x,
            Boundary::Bot(y) => p.y >= y,
            Boundary::Top(y) => p.y <= y,
        }
    }

    fn cut(&self, a: Point, b: Point) -> Point {
        match *self {
            Boundary::Left(x) | Boundary::Right(x) => {
                let y = a.y as i128
                    + div_round(
                        (b.y - a.y) as i128 * (x - a.x) as i128,
                        (b.x - a.x) as i128,
                    );
                Point::new(x, y as i64)
            }
            Boundary::Bot(y) | Boundary::Top(y) => {
                let x = a.x as i128
                    + div_round(
                        (b.x - a.x) as i128 * (y - a.y) as i128,
                        (b.y - a.y) as i128,
                    );
                Point::new(x as i64, y)
            }
        }
    }

    /// One Sutherland-Hodgman step.
    fn clip(&self, pts: &[Point]) -> Vec<Point> {
        let n = pts.len();
        let mut out = Vec::with_capacity(n + 2);
        for i in 0..n {
            let cur = pts[i];
            let prev = pts[(i + n - 1) % n];
            match (self.contains(prev), self.contains(cur)) {
                (true, true) => out.push(cur),
                (true, false) => out.push(self.cut(prev, cur)),
                (false, true) => {
                    out.push(self.cut(prev, cur));
                    out.push(cur);
                }
                (false, false) => {}
            }
        }
        out
    }
}

/// Divides, rounding to the nearest integer.
fn div_round(n: i128, d: i128) -> i128 {
    let (n, d) = if d < 0 { (-n, -d) } else { (n, d) };
    (2 * n + d).div_euclid(2 * d)
}

impl Bbox for Polygon {
    fn bbox(&self) -> Option<Rect> {
        let first = *self.points.first()?;
        let (mut lo, mut hi) = (first, first);
        for p in &self.points[1..] {
            lo = Point::new(lo.x.min(p.x), lo.y.min(p.y));
            hi = Point::new(hi.x.max(p.x), hi.y.max(p.y));
        }
        Some(Rect::new(lo, hi))
    }
}

impl TranslateMut for Polygon {
    fn translate_mut(&mut self, p: Point) {
        self.points.translate_mut(p);
    }
}

impl TransformMut for Polygon {
    fn transform_mut(&mut self, trans: Transformation) {
        self.points.transform_mut(trans);
    }
}

impl From<Rect> for Polygon {
    fn from(value: Rect) -> Self {
        value.to_polygon()
    }
}
