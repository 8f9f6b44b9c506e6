//! Manhattan transformations and the traits for applying them.

use impl_trait_for_tuples::impl_for_tuples;
use serde::{Deserialize, Serialize};

use crate::point::Point;

/// A Manhattan rotation: 0, 90, 180, or 270 degrees counterclockwise.
#[derive(
    Debug, Clone, Copy, Default, Eq, Ord, PartialOrd, PartialEq, Hash, Serialize, Deserialize,
)]
pub enum Rotation {
    /// 0 degrees; no rotation.
    #[default]
    R0,
    /// 90 degrees counterclockwise.
    R90,
    /// 180 degrees counterclockwise.
    R180,
    /// 270 degrees counterclockwise.
    R270,
}

impl Rotation {
    /// The transformation matrix representing this rotation.
    #[inline]
    pub fn transformation_matrix(&self) -> TransformationMatrix {
        TransformationMatrix::from(*self)
    }
}

/// A 2x2 integer matrix representing a rotation, a reflection, or both.
///
/// Every entry is `-1`, `0` or `1`; the matrix is always orthogonal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransformationMatrix([[i8; 2]; 2]);

impl TransformationMatrix {
    /// The identity matrix.
    #[inline]
    pub const fn identity() -> Self {
        Self([[1, 0], [0, 1]])
    }

    /// The inverse of the matrix.
    ///
    /// Orthogonal matrices are inverted by transposition.
    pub fn inverse(&self) -> Self {
        let a = &self.0;
        Self([[a[0][0], a[1][0]], [a[0][1], a[1][1]]])
    }

    /// The determinant, `-1` for mirroring matrices and `1` otherwise.
    pub fn det(&self) -> i8 {
        self.0[0][0] * self.0[1][1] - self.0[0][1] * self.0[1][0]
    }

    /// The raw matrix entries.
    #[inline]
    pub fn entries(&self) -> [[i8; 2]; 2] {
        self.0
    }
}

impl From<Rotation> for TransformationMatrix {
    fn from(value: Rotation) -> Self {
        Self(match value {
            Rotation::R0 => [[1, 0], [0, 1]],
            Rotation::R90 => [[0, -1], [1, 0]],
            Rotation::R180 => [[-1, 0], [0, -1]],
            Rotation::R270 => [[0, 1], [-1, 0]],
        })
    }
}

impl Default for TransformationMatrix {
    #[inline]
    fn default() -> Self {
        Self::identity()
    }
}

impl std::ops::Mul<TransformationMatrix> for TransformationMatrix {
    type Output = Self;
    fn mul(self, rhs: TransformationMatrix) -> Self::Output {
        let (a, b) = (&self.0, &rhs.0);
        Self([
            [
                a[0][0] * b[0][0] + a[0][1] * b[1][0],
                a[0][0] * b[0][1] + a[0][1] * b[1][1],
            ],
            [
                a[1][0] * b[0][0] + a[1][1] * b[1][0],
                a[1][0] * b[0][1] + a[1][1] * b[1][1],
            ],
        ])
    }
}

impl std::ops::Mul<Point> for TransformationMatrix {
    type Output = Point;
    fn mul(self, rhs: Point) -> Self::Output {
        let a = &self.0;
        Point::new(
            a[0][0] as i64 * rhs.x + a[0][1] as i64 * rhs.y,
            a[1][0] as i64 * rhs.x + a[1][1] as i64 * rhs.y,
        )
    }
}

/// A Manhattan translation, rotation and/or reflection of integer geometry.
///
/// A point `p` maps to `mat * p + b`. There is no magnification, so transformed
/// integer coordinates stay exact. Transformations are totally ordered so they
/// can take part in map keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Transformation {
    pub(crate) mat: TransformationMatrix,
    pub(crate) b: Point,
}

impl Default for Transformation {
    fn default() -> Self {
        Self::identity()
    }
}

impl Transformation {
    /// Returns the identity transform, leaving any transformed object unmodified.
    pub const fn identity() -> Self {
        Self {
            mat: TransformationMatrix::identity(),
            b: Point::zero(),
        }
    }

    /// Returns a translation by `(x,y)`.
    pub const fn translate(x: i64, y: i64) -> Self {
        Self {
            mat: TransformationMatrix::identity(),
            b: Point::new(x, y),
        }
    }

    /// Creates a transform from only an offset.
    pub const fn from_offset(offset: Point) -> Self {
        Self {
            mat: TransformationMatrix::identity(),
            b: offset,
        }
    }

    /// Returns a rotation by `angle`.
    pub fn rotate(angle: Rotation) -> Self {
        Self {
            mat: TransformationMatrix::from(angle),
            b: Point::zero(),
        }
    }

    /// Returns a reflection about the x-axis.
    pub fn reflect_vert() -> Self {
        Self {
            mat: TransformationMatrix([[1, 0], [0, -1]]),
            b: Point::zero(),
        }
    }

    /// Creates a transform that reflects about the x-axis (if requested),
    /// then rotates by `angle`, then translates by `offset`.
    pub fn from_opts(offset: Point, reflect_vert: bool, angle: Rotation) -> Self {
        let mut mat = angle.transformation_matrix();
        if reflect_vert {
            mat.0[0][1] = -mat.0[0][1];
            mat.0[1][1] = -mat.0[1][1];
        }
        Self { mat, b: offset }
    }

    /// Creates a new [`Transformation`] that is the cascade of `parent` and `child`.
    ///
    /// The child is applied first. This operation is not commutative.
    pub fn cascade(parent: Transformation, child: Transformation) -> Transformation {
        Self {
            mat: parent.mat * child.mat,
            b: parent.mat * child.b + parent.b,
        }
    }

    /// Returns the inverse [`Transformation`] of `self`.
    pub fn inv(&self) -> Transformation {
        let mat = self.mat.inverse();
        Self {
            mat,
            b: -(mat * self.b),
        }
    }

    /// The point representing the translation of this transformation.
    #[inline]
    pub fn offset_point(&self) -> Point {
        self.b
    }

    /// The rotation/reflection matrix of this transformation.
    #[inline]
    pub fn matrix(&self) -> TransformationMatrix {
        self.mat
    }

    /// Returns the same transformation with the translation replaced by `offset`.
    pub fn with_offset(&self, offset: Point) -> Self {
        Self {
            mat: self.mat,
            b: offset,
        }
    }

    /// Returns only the rotation/reflection part of this transformation.
    pub fn orientation(&self) -> Self {
        self.with_offset(Point::zero())
    }

    /// Returns `true` if this transformation mirrors geometry.
    pub fn is_mirror(&self) -> bool {
        self.mat.det() < 0
    }

    /// Returns the rotation applied after the (optional) reflection.
    pub fn rotation(&self) -> Rotation {
        let mut mat = self.mat;
        if self.is_mirror() {
            mat = mat * TransformationMatrix([[1, 0], [0, -1]]);
        }
        match (mat.0[0][0], mat.0[1][0]) {
            (1, 0) => Rotation::R0,
            (0, 1) => Rotation::R90,
            (-1, 0) => Rotation::R180,
            _ => Rotation::R270,
        }
    }

    /// Returns `true` if this is the identity transformation.
    pub fn is_unity(&self) -> bool {
        *self == Self::identity()
    }

    /// Returns `true` if this transformation only translates.
    pub fn is_translation(&self) -> bool {
        self.mat == TransformationMatrix::identity()
    }

    /// Applies the transformation to a single point.
    #[inline]
    pub fn apply(&self, p: Point) -> Point {
        self.mat * p + self.b
    }
}

impl std::ops::Mul<Transformation> for Transformation {
    type Output = Transformation;

    /// Equivalent to `Transformation::cascade(self, rhs)`.
    fn mul(self, rhs: Transformation) -> Self::Output {
        Transformation::cascade(self, rhs)
    }
}

/// A trait for specifying how an object is changed by a [`Transformation`].
#[impl_for_tuples(32)]
pub trait TransformMut {
    /// Applies matrix-vector [`Transformation`] `trans`.
    fn transform_mut(&mut self, trans: Transformation);
}

impl<T: TransformMut> TransformMut for Vec<T> {
    fn transform_mut(&mut self, trans: Transformation) {
        for i in self.iter_mut() {
            i.transform_mut(trans);
        }
    }
}

impl<T: TransformMut> TransformMut for Option<T> {
    fn transform_mut(&mut self, trans: Transformation) {
        if let Some(inner) = self.as_mut() {
            inner.transform_mut(trans);
        }
    }
}

/// Takes an owned shape and returns the transformed version.
pub trait Transform: TransformMut + Sized {
    /// Applies matrix-vector [`Transformation`] `trans`.
    #[inline]
    fn transform(mut self, trans: Transformation) -> Self {
        self.transform_mut(trans);
        self
    }
}

impl<T: TransformMut + Sized> Transform for T {}

/// A trait for specifying how a shape is translated by a [`Point`].
#[impl_for_tuples(32)]
pub trait TranslateMut {
    /// Translates the shape by [`Point`], modifying it in place.
    fn translate_mut(&mut self, p: Point);
}

impl<T: TranslateMut> TranslateMut for Vec<T> {
    fn translate_mut(&mut self, p: Point) {
        for i in self.iter_mut() {
            i.translate_mut(p);
        }
    }
}

impl<T: TranslateMut> TranslateMut for Option<T> {
    fn translate_mut(&mut self, p: Point) {
        if let Some(inner) = self.as_mut() {
            inner.translate_mut(p);
        }
    }
}

/// Takes an owned shape and returns the translated version.
pub trait Translate: TranslateMut + Sized {
    /// Translates the shape by a [`Point`].
    #[inline]
    fn translate(mut self, p: Point) -> Self {
        self.translate_mut(p);
        self
    }
}

impl<T: TranslateMut + Sized> Translate for T {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cascade_applies_child_first() {
        let parent = Transformation::translate(1, 1);
        let child = Transformation::reflect_vert();
        let p = Point::new(1, 1);
        assert_eq!(Transformation::cascade(parent, child).apply(p), Point::new(2, 0));
        assert_eq!(Transformation::cascade(child, parent).apply(p), Point::new(2, -2));
    }

    #[test]
    fn inverse_cancels() {
        let t = Transformation::from_opts(Point::new(5, -7), true, Rotation::R90);
        assert!((t * t.inv()).is_unity());
        assert!((t.inv() * t).is_unity());
        let p = Point::new(13, 4);
        assert_eq!(t.inv().apply(t.apply(p)), p);
    }

    #[test]
    fn rotation_and_mirror_are_recovered() {
        for angle in [Rotation::R0, Rotation::R90, Rotation::R180, Rotation::R270] {
            for mirror in [false, true] {
                let t = Transformation::from_opts(Point::new(3, 4), mirror, angle);
                assert_eq!(t.rotation(), angle);
                assert_eq!(t.is_mirror(), mirror);
                assert_eq!(t.orientation().offset_point(), Point::zero());
            }
        }
    }

    #[test]
    fn translation_only() {
        assert!(Transformation::translate(4, 5).is_translation());
        assert!(!Transformation::rotate(Rotation::R90).is_translation());
        assert!(Transformation::default().is_unity());
    }
}
