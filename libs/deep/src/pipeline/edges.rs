use geometry::prelude::*;
use layir::{PropId, ShapeTarget};

use super::ShapeReceiver;

/// Stores edges, and with `as_edges` the contours of boxes and polygons.
#[derive(Debug, Clone, Copy, Default)]
pub struct EdgeStage {
    as_edges: bool,
}

impl EdgeStage {
    pub fn new(as_edges: bool) -> Self {
        Self { as_edges }
    }
}

impl ShapeReceiver for EdgeStage {
    fn push(
        &mut self,
        shape: &Shape,
        prop_id: PropId,
        trans: Transformation,
        _region: Option<Rect>,
        _complex_region: &[Rect],
        target: &mut ShapeTarget<'_>,
    ) {
        match shape {
            Shape::Edge(edge) => target.insert(edge.transform(trans), prop_id),
            Shape::Box(_) | Shape::Polygon(_) | Shape::PolygonRef(_) if self.as_edges => {
                let Some(polygon) = shape.to_polygon().and_then(|p| p.normalized()) else {
                    return;
                };
                let polygon = polygon.transform(trans);
                for edge in polygon.edges() {
                    target.insert(edge, prop_id);
                }
            }
            _ => {}
        }
    }
}

/// Stores edge pairs only.
#[derive(Debug, Clone, Copy, Default)]
pub struct EdgePairStage;

impl EdgePairStage {
    pub fn new() -> Self {
        Self
    }
}

impl ShapeReceiver for EdgePairStage {
    fn push(
        &mut self,
        shape: &Shape,
        prop_id: PropId,
        trans: Transformation,
        _region: Option<Rect>,
        _complex_region: &[Rect],
        target: &mut ShapeTarget<'_>,
    ) {
        if let Shape::EdgePair(pair) = shape {
            target.insert(pair.transform(trans), prop_id);
        }
    }
}

/// Stores texts only.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextStage;

impl TextStage {
    pub fn new() -> Self {
        Self
    }
}

impl ShapeReceiver for TextStage {
    fn push(
        &mut self,
        shape: &Shape,
        prop_id: PropId,
        trans: Transformation,
        _region: Option<Rect>,
        _complex_region: &[Rect],
        target: &mut ShapeTarget<'_>,
    ) {
        if let Shape::Text(text) = shape {
            target.insert(text.clone().transform(trans), prop_id);
        }
    }
}
