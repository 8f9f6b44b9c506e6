//! Displaced references to shared polygons.

use std::sync::Arc;

use crate::bbox::Bbox;
use crate::point::Point;
use crate::polygon::Polygon;
use crate::rect::Rect;
use crate::transform::{Transform, TransformMut, Transformation, Translate, TranslateMut};

/// A polygon stored once and placed by a displacement.
///
/// Equal polygons at different locations share one allocation when they are
/// created through an interning repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PolygonRef {
    base: Arc<Polygon>,
    disp: Point,
}

impl PolygonRef {
    /// Creates a reference to `base`, displaced by `disp`.
    pub fn new(base: Arc<Polygon>, disp: Point) -> Self {
        Self { base, disp }
    }

    /// Creates a reference that owns its own copy of `polygon`.
    pub fn from_polygon(polygon: &Polygon) -> Self {
        let (base, disp) = split_displacement(polygon);
        Self::new(Arc::new(base), disp)
    }

    /// The shared, origin-anchored polygon.
    #[inline]
    pub fn base(&self) -> &Arc<Polygon> {
        &self.base
    }

    /// The displacement applied to the base polygon.
    #[inline]
    pub fn disp(&self) -> Point {
        self.disp
    }

    /// Materializes the referenced polygon at its location.
    pub fn to_polygon(&self) -> Polygon {
        self.base.as_ref().clone().translate(self.disp)
    }

    /// Returns `true` if both references point to the same allocation.
    pub fn shares_base_with(&self, other: &PolygonRef) -> bool {
        Arc::ptr_eq(&self.base, &other.base)
    }
}

/// Splits a polygon into an origin-anchored polygon and the displacement that places it.
///
/// The anchor is the lower-left corner of the bounding box.
pub fn split_displacement(polygon: &Polygon) -> (Polygon, Point) {
    let disp = polygon.bbox().map(|b| b.lower_left()).unwrap_or_default();
    (polygon.clone().translate(-disp), disp)
}

impl Bbox for PolygonRef {
    fn bbox(&self) -> Option<Rect> {
        self.base.bbox().map(|b| b.translate(self.disp))
    }
}

impl TranslateMut for PolygonRef {
    fn translate_mut(&mut self, p: Point) {
        self.disp += p;
    }
}

impl TransformMut for PolygonRef {
    fn transform_mut(&mut self, trans: Transformation) {
        if trans.is_translation() {
            self.disp = trans.apply(self.disp);
        } else {
            *self = PolygonRef::from_polygon(&self.to_polygon().transform(trans));
        }
    }
}
