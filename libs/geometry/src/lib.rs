//! 2-D integer geometry for hierarchical layout processing.
//!
//! # Examples
//!
//! Clip a [polygon](crate::polygon::Polygon) to a [rectangle](crate::rect::Rect):
//!
//! ```
//! # use geometry::prelude::*;
//! let poly = Rect::from_sides(0, 0, 100, 40).to_polygon();
//! let clipped = poly.clip(&Rect::from_sides(50, 0, 200, 200)).unwrap();
//! assert_eq!(clipped.to_rect(), Some(Rect::from_sides(50, 0, 100, 40)));
//! ```
#![warn(missing_docs)]

extern crate self as geometry;

pub mod bbox;
pub mod edge;
pub mod edge_pair;
pub mod point;
pub mod polygon;
pub mod polygon_ref;
pub mod prelude;
pub mod rect;
pub mod shape;
pub mod text;
pub mod transform;
