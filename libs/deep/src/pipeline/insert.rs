use geometry::prelude::*;
use layir::{PropId, ShapeTarget};

use super::ShapeReceiver;

/// Stores shapes as they are, after transformation.
///
/// Boxes stay boxes. Polygons and polygon references are stored as
/// polygons. Edges, edge pairs and texts keep their kind.
#[derive(Debug, Clone, Copy, Default)]
pub struct InsertionStage;

impl InsertionStage {
    pub fn new() -> Self {
        Self
    }
}

impl ShapeReceiver for InsertionStage {
    fn push(
        &mut self,
        shape: &Shape,
        prop_id: PropId,
        trans: Transformation,
        _region: Option<Rect>,
        _complex_region: &[Rect],
        target: &mut ShapeTarget<'_>,
    ) {
        let shape = match shape {
            Shape::PolygonRef(r) => Shape::Polygon(r.to_polygon()),
            other => other.clone(),
        };
        target.insert(shape.transform(trans), prop_id);
    }
}
