use arcstr::ArcStr;
use geometry::prelude::*;
use layir::{PropId, PropValue, ShapeTarget};

use super::ShapeReceiver;

/// Stores polygonal shapes as interned polygon references.
///
/// Zero-area polygons are dropped. With a non-negative text enlargement,
/// texts become boxes of that half-width around their anchor, carrying the
/// text string as a property when a property name is configured. Other
/// shapes are dropped.
#[derive(Debug, Clone, Default)]
pub struct PolygonRefStage {
    text_enlargement: i64,
    text_property_name: Option<ArcStr>,
}

impl PolygonRefStage {
    pub fn new(text_enlargement: i64, text_property_name: Option<ArcStr>) -> Self {
        Self {
            text_enlargement,
            text_property_name,
        }
    }

    fn text_prop_id(&self, text: &Text, prop_id: PropId, target: &mut ShapeTarget<'_>) -> PropId {
        let Some(name) = &self.text_property_name else {
            return prop_id;
        };
        let props = target.properties_mut();
        let mut set = props.properties(prop_id).cloned().unwrap_or_default();
        set.insert(name.clone(), PropValue::String(text.string().clone()));
        props.properties_id(set)
    }
}

impl ShapeReceiver for PolygonRefStage {
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
            Shape::Box(_) | Shape::Polygon(_) | Shape::PolygonRef(_) => {
                let Some(polygon) = shape.to_polygon() else {
                    return;
                };
                let polygon = polygon.transform(trans);
                if polygon.area2() == 0 {
                    return;
                }
                let r = target.polygons_mut().intern(&polygon);
                target.insert(r, prop_id);
            }
            Shape::Text(text) => {
                if self.text_enlargement < 0 {
                    return;
                }
                let text = text.clone().transform(trans);
                let rect = text.enlarged_box(self.text_enlargement);
                let prop_id = self.text_prop_id(&text, prop_id, target);
                let r = target.polygons_mut().intern(&rect.to_polygon());
                target.insert(r, prop_id);
            }
            Shape::Edge(_) | Shape::EdgePair(_) => {}
        }
    }
}
