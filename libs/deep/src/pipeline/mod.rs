//! Shape pipelines.
//!
//! A shadow layer is filled by pushing every source shape through a chain of
//! [`ShapeReceiver`]s. Decorating stages ([`ClippingStage`],
//! [`ReductionStage`]) forward zero, one or many shapes to the next stage.
//! Terminal stages ([`InsertionStage`], [`PolygonRefStage`], [`EdgeStage`],
//! [`EdgePairStage`], [`TextStage`]) store what they receive.
//!
//! Shapes arrive in the coordinates of their source cell, together with the
//! clip region in the same coordinates. Only terminal stages apply the
//! transformation that maps them into the target cell.

mod clip;
mod edges;
mod insert;
mod reduce;
mod refs;

use geometry::prelude::*;
use layir::{PropId, ShapeTarget};

use crate::diagnostics::{IssueSet, ShapeIssue};

pub use clip::ClippingStage;
pub use edges::{EdgePairStage, EdgeStage, TextStage};
pub use insert::InsertionStage;
pub use reduce::ReductionStage;
pub use refs::PolygonRefStage;

/// A stage of a shape pipeline.
pub trait ShapeReceiver {
    /// Receives one shape.
    ///
    /// `region` and `complex_region` are the clip region in the shape's
    /// coordinates; a `None` region means no clipping. `trans` maps the shape
    /// into `target`'s cell.
    fn push(
        &mut self,
        shape: &Shape,
        prop_id: PropId,
        trans: Transformation,
        region: Option<Rect>,
        complex_region: &[Rect],
        target: &mut ShapeTarget<'_>,
    );

    /// Moves the issues collected so far into `issues`.
    #[allow(unused_variables)]
    fn drain_issues(&mut self, issues: &mut IssueSet<ShapeIssue>) {}
}

/// The link from a decorating stage to the stage after it.
pub enum Next<'a> {
    /// A stage constructed along with the pipeline.
    Owned(Box<dyn ShapeReceiver + 'a>),
    /// A stage owned by the caller.
    Borrowed(&'a mut dyn ShapeReceiver),
}

impl<'a> Next<'a> {
    pub fn owned(stage: impl ShapeReceiver + 'a) -> Self {
        Next::Owned(Box::new(stage))
    }

    fn stage(&mut self) -> &mut dyn ShapeReceiver {
        match self {
            Next::Owned(stage) => stage.as_mut(),
            Next::Borrowed(stage) => &mut **stage,
        }
    }
}

impl ShapeReceiver for Next<'_> {
    fn push(
        &mut self,
        shape: &Shape,
        prop_id: PropId,
        trans: Transformation,
        region: Option<Rect>,
        complex_region: &[Rect],
        target: &mut ShapeTarget<'_>,
    ) {
        self.stage()
            .push(shape, prop_id, trans, region, complex_region, target)
    }

    fn drain_issues(&mut self, issues: &mut IssueSet<ShapeIssue>) {
        self.stage().drain_issues(issues)
    }
}
