use geometry::prelude::*;
use layir::{PropId, ShapeTarget};

use super::{Next, ShapeReceiver};
use crate::diagnostics::{IssueSet, ShapeIssue};

/// Restricts shapes to the clip region.
///
/// Shapes inside the region are forwarded unchanged and shapes outside of it
/// are dropped. Boxes and polygons crossing the region boundary are cut into
/// the parts overlapping the region (one part per complex region box).
/// Texts, edges and edge pairs overlapping the region pass without clipping.
pub struct ClippingStage<'a> {
    next: Next<'a>,
}

impl<'a> ClippingStage<'a> {
    pub fn new(next: Next<'a>) -> Self {
        Self { next }
    }

    /// The boxes to clip against.
    fn clip_boxes(region: Rect, complex_region: &[Rect]) -> Vec<Rect> {
        if complex_region.is_empty() {
            vec![region]
        } else {
            complex_region
                .iter()
                .filter_map(|c| c.intersection(region))
                .filter(|c| !c.is_degenerate())
                .collect()
        }
    }
}

impl ShapeReceiver for ClippingStage<'_> {
    fn push(
        &mut self,
        shape: &Shape,
        prop_id: PropId,
        trans: Transformation,
        region: Option<Rect>,
        complex_region: &[Rect],
        target: &mut ShapeTarget<'_>,
    ) {
        let Some(region) = region else {
            self.next.push(shape, prop_id, trans, None, &[], target);
            return;
        };
        let Some(bbox) = shape.bbox() else {
            return;
        };

        let inside = bbox.inside(&region)
            && (complex_region.is_empty() || complex_region.iter().any(|c| bbox.inside(c)));
        if inside {
            self.next.push(shape, prop_id, trans, None, &[], target);
            return;
        }

        let boxes = Self::clip_boxes(region, complex_region);
        match shape {
            Shape::Box(rect) => {
                for clip in boxes {
                    if let Some(part) = rect.intersection(clip).filter(|p| !p.is_degenerate()) {
                        self.next
                            .push(&Shape::Box(part), prop_id, trans, None, &[], target);
                    }
                }
            }
            Shape::Polygon(_) | Shape::PolygonRef(_) => {
                let Some(polygon) = shape.to_polygon() else {
                    return;
                };
                for clip in boxes {
                    if let Some(part) = polygon.clip(&clip) {
                        self.next
                            .push(&Shape::Polygon(part), prop_id, trans, None, &[], target);
                    }
                }
            }
            Shape::Text(_) | Shape::Edge(_) | Shape::EdgePair(_) => {
                // Points and lines have no area to cut; keep them if they touch a clip box.
                if boxes.iter().any(|c| bbox.touches(c)) {
                    self.next.push(shape, prop_id, trans, None, &[], target);
                }
            }
        }
    }

    fn drain_issues(&mut self, issues: &mut IssueSet<ShapeIssue>) {
        self.next.drain_issues(issues);
    }
}
