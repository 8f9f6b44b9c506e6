//! Text labels.

use arcstr::ArcStr;
use serde::{Deserialize, Serialize};

use crate::bbox::Bbox;
use crate::point::Point;
use crate::rect::Rect;
use crate::transform::{TransformMut, Transformation, TranslateMut};

/// A text label placed by a transformation.
///
/// The label's anchor is the transformation's offset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Text {
    string: ArcStr,
    trans: Transformation,
}

impl Text {
    /// Creates a new text label.
    pub fn new(string: impl Into<ArcStr>, trans: Transformation) -> Self {
        Self {
            string: string.into(),
            trans,
        }
    }

    /// Creates an unrotated text label anchored at `pos`.
    pub fn at(string: impl Into<ArcStr>, pos: Point) -> Self {
        Self::new(string, Transformation::from_offset(pos))
    }

    /// The label text.
    #[inline]
    pub fn string(&self) -> &ArcStr {
        &self.string
    }

    /// The placement of the label.
    #[inline]
    pub fn trans(&self) -> Transformation {
        self.trans
    }

    /// The anchor point of the label.
    #[inline]
    pub fn position(&self) -> Point {
        self.trans.offset_point()
    }

    /// A box of half-width `enlargement` around the anchor, oriented by the label's transformation.
    pub fn enlarged_box(&self, enlargement: i64) -> Rect {
        let local = Rect::from_sides(-enlargement, -enlargement, enlargement, enlargement);
        let (p0, p1) = (
            self.trans.apply(local.lower_left()),
            self.trans.apply(local.upper_right()),
        );
        Rect::new(p0, p1)
    }
}

impl Bbox for Text {
    fn bbox(&self) -> Option<Rect> {
        Some(Rect::from_point(self.position()))
    }
}

impl TranslateMut for Text {
    fn translate_mut(&mut self, p: Point) {
        self.trans = Transformation::translate(p.x, p.y) * self.trans;
    }
}

impl TransformMut for Text {
    fn transform_mut(&mut self, trans: Transformation) {
        self.trans = trans * self.trans;
    }
}
