use geometry::prelude::*;
use layir::{PropId, ShapeTarget};

use super::{Next, ShapeReceiver};
use crate::diagnostics::{log_issue, IssueSet, ShapeIssue};

/// Splits polygons that are too complex for downstream algorithms.
///
/// A polygon with more than `max_vertex_count` vertices, or whose bounding
/// box is more than `max_area_ratio` times larger than the polygon itself,
/// is cut in half across the longer side of its bounding box. The halves are
/// checked again until every part is within the limits. A limit of zero
/// disables the corresponding check.
///
/// With odd polygon rejection enabled, self-intersecting polygons are
/// dropped and reported.
pub struct ReductionStage<'a> {
    next: Next<'a>,
    max_area_ratio: f64,
    max_vertex_count: usize,
    reject_odd_polygons: bool,
    issues: IssueSet<ShapeIssue>,
}

impl<'a> ReductionStage<'a> {
    pub fn new(
        next: Next<'a>,
        max_area_ratio: f64,
        max_vertex_count: usize,
        reject_odd_polygons: bool,
    ) -> Self {
        Self {
            next,
            max_area_ratio,
            max_vertex_count,
            reject_odd_polygons,
            issues: IssueSet::new(),
        }
    }

    pub fn issues(&self) -> &IssueSet<ShapeIssue> {
        &self.issues
    }

    fn exceeds_limits(&self, polygon: &Polygon) -> bool {
        (self.max_vertex_count > 0 && polygon.vertex_count() > self.max_vertex_count)
            || (self.max_area_ratio > 0. && polygon.area_ratio() > self.max_area_ratio)
    }

    fn reduce(
        &mut self,
        polygon: Polygon,
        prop_id: PropId,
        trans: Transformation,
        target: &mut ShapeTarget<'_>,
    ) {
        if self.exceeds_limits(&polygon) {
            if let Some(parts) = polygon.split() {
                for part in parts {
                    self.reduce(part, prop_id, trans, target);
                }
                return;
            }
        }
        self.next
            .push(&Shape::Polygon(polygon), prop_id, trans, None, &[], target);
    }
}

impl ShapeReceiver for ReductionStage<'_> {
    fn push(
        &mut self,
        shape: &Shape,
        prop_id: PropId,
        trans: Transformation,
        region: Option<Rect>,
        complex_region: &[Rect],
        target: &mut ShapeTarget<'_>,
    ) {
        let polygon = match shape {
            Shape::Polygon(p) => p.clone(),
            Shape::PolygonRef(r) => r.to_polygon(),
            _ => {
                self.next
                    .push(shape, prop_id, trans, region, complex_region, target);
                return;
            }
        };

        if self.reject_odd_polygons && polygon.is_self_intersecting() {
            let issue = ShapeIssue::odd_polygon(
                target.cell_name().clone(),
                polygon.bbox().map(|b| b.transform(trans)),
            );
            log_issue(&issue);
            self.issues.add(issue);
            return;
        }

        if !self.exceeds_limits(&polygon) {
            self.next
                .push(shape, prop_id, trans, region, complex_region, target);
            return;
        }
        self.reduce(polygon, prop_id, trans, target);
    }

    fn drain_issues(&mut self, issues: &mut IssueSet<ShapeIssue>) {
        issues.append(&mut self.issues);
        self.next.drain_issues(issues);
    }
}
