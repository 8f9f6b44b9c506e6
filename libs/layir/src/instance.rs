//! Cell instances and regular instance arrays.

use geometry::prelude::*;
use serde::{Deserialize, Serialize};

use crate::CellId;

/// The lattice of a regular instance array.
///
/// Member `(i, j)` is displaced by `i * a + j * b` for `i < na`, `j < nb`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RegularArray {
    a: Point,
    b: Point,
    na: u32,
    nb: u32,
}

impl RegularArray {
    /// Creates a regular array with step vectors `a` and `b`.
    ///
    /// # Panics
    ///
    /// Panics if either count is zero.
    pub fn new(a: Point, b: Point, na: u32, nb: u32) -> Self {
        assert!(na > 0 && nb > 0, "instance array counts must be nonzero");
        Self { a, b, na, nb }
    }

    /// The first step vector.
    pub fn a(&self) -> Point {
        self.a
    }

    /// The second step vector.
    pub fn b(&self) -> Point {
        self.b
    }

    /// The number of steps along `a`.
    pub fn na(&self) -> u32 {
        self.na
    }

    /// The number of steps along `b`.
    pub fn nb(&self) -> u32 {
        self.nb
    }

    fn rotate(&mut self, mat: TransformationMatrix) {
        self.a = mat * self.a;
        self.b = mat * self.b;
    }
}

/// One instance of a cell, or a regular array of instances of a cell.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellInstArray {
    pub(crate) child: CellId,
    trans: Transformation,
    array: Option<RegularArray>,
}

impl CellInstArray {
    /// Creates a single instance of `child` placed by `trans`.
    pub fn new(child: CellId, trans: Transformation) -> Self {
        Self {
            child,
            trans,
            array: None,
        }
    }

    /// Creates a regular array of instances of `child`.
    pub fn regular(child: CellId, trans: Transformation, array: RegularArray) -> Self {
        Self {
            child,
            trans,
            array: Some(array),
        }
    }

    /// The instantiated cell.
    #[inline]
    pub fn child(&self) -> CellId {
        self.child
    }

    /// The placement of the first member.
    #[inline]
    pub fn trans(&self) -> Transformation {
        self.trans
    }

    /// The array lattice, if this is an array.
    #[inline]
    pub fn array(&self) -> Option<&RegularArray> {
        self.array.as_ref()
    }

    /// The number of members.
    pub fn size(&self) -> usize {
        self.array
            .map(|a| a.na as usize * a.nb as usize)
            .unwrap_or(1)
    }

    /// The same placement(s) of a different cell.
    pub fn with_child(&self, child: CellId) -> Self {
        Self {
            child,
            trans: self.trans,
            array: self.array,
        }
    }

    /// The placements of all members, in row-major order.
    pub fn members(&self) -> impl Iterator<Item = Transformation> + '_ {
        let (na, nb) = self.array.map(|a| (a.na, a.nb)).unwrap_or((1, 1));
        (0..na).flat_map(move |i| {
            (0..nb).map(move |j| {
                let disp = match self.array {
                    Some(arr) => arr.a * i as i64 + arr.b * j as i64,
                    None => Point::zero(),
                };
                Transformation::from_offset(disp) * self.trans
            })
        })
    }

    /// Applies `t` after the placement of every member.
    pub fn transform(&mut self, t: Transformation) {
        self.trans = t * self.trans;
        if let Some(array) = self.array.as_mut() {
            array.rotate(t.matrix());
        }
    }

    /// Re-expresses the instance in a coordinate system mapped by `t`.
    ///
    /// Every member placement `m` becomes `t * m * t^-1`, so that a child cell
    /// whose content was itself mapped by `t` lands where `t` maps the original.
    pub fn transform_into(&mut self, t: Transformation) {
        self.trans = t * self.trans * t.inv();
        if let Some(array) = self.array.as_mut() {
            array.rotate(t.matrix());
        }
    }

    /// The bounding box of all members, given the bounding box of the child cell.
    pub fn bbox_with(&self, child_bbox: Option<Rect>) -> Option<Rect> {
        let first = child_bbox?.transform(self.trans);
        let Some(arr) = self.array else {
            return Some(first);
        };
        let da = arr.a * (arr.na as i64 - 1);
        let db = arr.b * (arr.nb as i64 - 1);
        Some(
            [Point::zero(), da, db, da + db]
                .into_iter()
                .map(|d| first.translate(d))
                .fold(first, Rect::union),
        )
    }
}

#[cfg(test)]
mod tests {
    use geometry::prelude::*;

    use super::*;
    use crate::id::Id;

    #[test]
    fn array_members_and_bbox() {
        let child: CellId = Id::new().alloc();
        let inst = CellInstArray::regular(
            child,
            Transformation::translate(100, 0),
            RegularArray::new(Point::new(10, 0), Point::new(0, 20), 3, 2),
        );
        assert_eq!(inst.size(), 6);
        let offsets: Vec<Point> = inst.members().map(|t| t.offset_point()).collect();
        assert_eq!(offsets[0], Point::new(100, 0));
        assert_eq!(offsets[1], Point::new(100, 20));
        assert_eq!(offsets[5], Point::new(120, 20));
        assert_eq!(
            inst.bbox_with(Some(Rect::from_sides(0, 0, 5, 5))),
            Some(Rect::from_sides(100, 0, 125, 25))
        );
    }

    #[test]
    fn conjugation_commutes_with_mapped_children() {
        let child: CellId = Id::new().alloc();
        let t = Transformation::from_opts(Point::new(3, 7), true, Rotation::R90);
        let mut inst = CellInstArray::new(child, Transformation::translate(10, 0));
        let p = Point::new(1, 2);
        let expected = t.apply(inst.trans().apply(p));
        inst.transform_into(t);
        assert_eq!(inst.trans().apply(t.apply(p)), expected);
    }
}
