//! Push-style hierarchical shape traversal.
//!
//! A [`ShapeTraversal`] describes what to look at: a layout, a top cell, a set
//! of layers, an optional clip region, a global transformation, a depth limit
//! and cell selections. [`ShapeTraversal::push`] walks the hierarchy and
//! reports what it finds to a [`TraversalReceiver`]:
//!
//! ```text
//! begin
//!   shape*                                  (top cell)
//!   { new_inst [new_inst_member]*
//!       enter_cell shape* ... leave_cell }*
//! end
//! ```
//!
//! Regions are always expressed in the local coordinates of the cell being
//! visited.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

use geometry::prelude::*;

use crate::{CellId, CellInstArray, LayerId, Layout, LayoutId, ShapeEntry};

/// How to continue after an instance array was announced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NewInstMode {
    /// Report every member through `new_inst_member` and descend as requested.
    All,
    /// Descend into the first member only.
    Single,
    /// Do not descend.
    Skip,
}

/// A cell about to be visited.
#[derive(Debug, Clone, Copy)]
pub struct CellVisit<'b> {
    /// The source cell.
    pub cell: CellId,
    /// The clip region in the cell's coordinates; `None` means no clipping.
    pub region: Option<Rect>,
    /// Boxes refining `region`, in the cell's coordinates.
    pub complex_region: &'b [Rect],
    /// Whether the cell's own shapes are suppressed.
    pub inactive: bool,
}

/// An instance array found in the cell being visited.
#[derive(Debug, Clone, Copy)]
pub struct InstVisit<'b> {
    /// The instance array.
    pub inst: &'b CellInstArray,
    /// The transformation applied on top of the instance's own placement.
    pub always_apply: Transformation,
    /// The clip region in the parent cell's coordinates.
    pub region: Option<Rect>,
    /// Boxes refining `region`, in the parent cell's coordinates.
    pub complex_region: &'b [Rect],
    /// `true` if the whole array lies inside the clip region.
    pub all: bool,
    /// Whether the child cell will be visited as inactive.
    pub child_inactive: bool,
}

/// A shape found in an active cell.
#[derive(Debug, Clone, Copy)]
pub struct ShapeVisit<'b> {
    /// The cell holding the shape.
    pub cell: CellId,
    /// The layer holding the shape.
    pub layer: LayerId,
    /// The shape and its source property ID.
    pub entry: &'b ShapeEntry,
    /// The transformation to apply when materializing the shape in the current cell.
    pub always_apply: Transformation,
    /// The accumulated transformation from the cell to the traversal's top.
    pub trans: Transformation,
    /// The clip region in the cell's coordinates.
    pub region: Option<Rect>,
    /// Boxes refining `region`, in the cell's coordinates.
    pub complex_region: &'b [Rect],
}

/// Read access to the traversal while it runs.
pub struct TraversalContext<'a, 't> {
    traversal: &'t ShapeTraversal<'a>,
    bbox: HashMap<CellId, Option<Rect>>,
    layer_bbox: HashMap<CellId, Option<Rect>>,
}

impl<'a> TraversalContext<'a, '_> {
    /// The traversal being run.
    pub fn traversal(&self) -> &ShapeTraversal<'a> {
        self.traversal
    }

    /// The layout being traversed.
    pub fn layout(&self) -> &'a Layout {
        self.traversal.layout
    }

    /// The hierarchical bounding box of `cell` over all layers.
    pub fn cell_bbox(&self, cell: CellId) -> Option<Rect> {
        self.bbox.get(&cell).copied().flatten()
    }

    /// The hierarchical bounding box of `cell` over the traversed layers.
    pub fn cell_layer_bbox(&self, cell: CellId) -> Option<Rect> {
        self.layer_bbox.get(&cell).copied().flatten()
    }
}

/// Receives traversal events.
///
/// Errors returned from any callback abort the traversal and are returned
/// from [`ShapeTraversal::push`] unchanged.
#[allow(unused_variables)]
pub trait TraversalReceiver {
    /// The error type of the receiver.
    type Error;

    /// If `true`, cells without shapes on the traversed layers are visited as well.
    fn wants_all_cells(&self) -> bool {
        false
    }

    /// Called once before anything else. The top cell is open afterwards.
    fn begin(&mut self, ctx: &TraversalContext<'_, '_>) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Called once after everything else.
    fn end(&mut self, ctx: &TraversalContext<'_, '_>) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Called when descending into a child cell.
    fn enter_cell(
        &mut self,
        ctx: &TraversalContext<'_, '_>,
        cell: &CellVisit<'_>,
    ) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Called when leaving a child cell.
    fn leave_cell(
        &mut self,
        ctx: &TraversalContext<'_, '_>,
        cell: CellId,
    ) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Called for each instance array that survived pruning.
    fn new_inst(
        &mut self,
        ctx: &TraversalContext<'_, '_>,
        inst: &InstVisit<'_>,
    ) -> Result<NewInstMode, Self::Error> {
        Ok(NewInstMode::All)
    }

    /// Called for each array member overlapping the region; returns whether to descend.
    fn new_inst_member(
        &mut self,
        ctx: &TraversalContext<'_, '_>,
        inst: &InstVisit<'_>,
        member: Transformation,
    ) -> Result<bool, Self::Error> {
        Ok(true)
    }

    /// Called for each shape of an active cell that overlaps the region.
    fn shape(
        &mut self,
        ctx: &TraversalContext<'_, '_>,
        shape: &ShapeVisit<'_>,
    ) -> Result<(), Self::Error>;
}

/// Describes a hierarchical traversal of a layout.
#[derive(Clone, Debug)]
pub struct ShapeTraversal<'a> {
    layout: &'a Layout,
    top: CellId,
    layers: Vec<LayerId>,
    region: Option<Rect>,
    complex_region: Vec<Rect>,
    global_trans: Transformation,
    max_depth: usize,
    selected: BTreeSet<CellId>,
    unselected: BTreeSet<CellId>,
}

impl<'a> ShapeTraversal<'a> {
    /// Traverses one layer below `top`.
    pub fn new(layout: &'a Layout, top: CellId, layer: LayerId) -> Self {
        Self::with_layers(layout, top, [layer])
    }

    /// Traverses several layers below `top`.
    pub fn with_layers(
        layout: &'a Layout,
        top: CellId,
        layers: impl IntoIterator<Item = LayerId>,
    ) -> Self {
        let mut layers: Vec<LayerId> = layers.into_iter().collect();
        layers.sort();
        layers.dedup();
        Self {
            layout,
            top,
            layers,
            region: None,
            complex_region: Vec::new(),
            global_trans: Transformation::identity(),
            max_depth: usize::MAX,
            selected: BTreeSet::new(),
            unselected: BTreeSet::new(),
        }
    }

    /// Restricts the traversal to shapes and instances overlapping `region`.
    pub fn region(mut self, region: Rect) -> Self {
        self.region = Some(region);
        self.complex_region.clear();
        self
    }

    /// Restricts the traversal to the union of `boxes`.
    ///
    /// The region becomes the bounding box of the boxes.
    pub fn complex_region(mut self, boxes: impl IntoIterator<Item = Rect>) -> Self {
        let mut boxes: Vec<Rect> = boxes.into_iter().collect();
        boxes.sort();
        boxes.dedup();
        self.region = boxes.as_slice().bbox();
        if self.region.is_none() {
            tracing::warn!("empty complex region; the traversal will report nothing");
            self.region = Some(Rect::default());
        }
        self.complex_region = if boxes.len() > 1 { boxes } else { Vec::new() };
        self
    }

    /// Applies `trans` to everything reported at the top level.
    pub fn global_trans(mut self, trans: Transformation) -> Self {
        self.global_trans = trans;
        self
    }

    /// Stops descending below `depth` levels of hierarchy.
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Marks cells (and, by inheritance, their subtrees) as active.
    pub fn select_cells(mut self, cells: impl IntoIterator<Item = CellId>) -> Self {
        self.selected.extend(cells);
        self
    }

    /// Marks cells (and, by inheritance, their subtrees) as inactive.
    pub fn unselect_cells(mut self, cells: impl IntoIterator<Item = CellId>) -> Self {
        self.unselected.extend(cells);
        self
    }

    pub fn layout(&self) -> &'a Layout {
        self.layout
    }

    pub fn top(&self) -> CellId {
        self.top
    }

    pub fn layers(&self) -> &[LayerId] {
        &self.layers
    }

    pub fn get_region(&self) -> Option<Rect> {
        self.region
    }

    pub fn get_complex_region(&self) -> &[Rect] {
        &self.complex_region
    }

    pub fn get_global_trans(&self) -> Transformation {
        self.global_trans
    }

    pub fn get_max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn selected(&self) -> &BTreeSet<CellId> {
        &self.selected
    }

    pub fn unselected(&self) -> &BTreeSet<CellId> {
        &self.unselected
    }

    /// Whether the top cell's own shapes are reported.
    pub fn top_active(&self) -> bool {
        self.child_active(true, self.top)
    }

    fn child_active(&self, parent_active: bool, child: CellId) -> bool {
        if self.selected.contains(&child) {
            true
        } else if self.unselected.contains(&child) {
            false
        } else {
            parent_active
        }
    }

    /// The key identifying the hierarchy this traversal produces.
    pub fn hierarchy_key(&self) -> HierarchyKey {
        HierarchyKey {
            layout: self.layout.id(),
            top: self.top,
            global_trans: self.global_trans,
            max_depth: self.max_depth,
            region: self.region,
            complex_region: self.complex_region.clone(),
            layers: self.layers.clone(),
            selected: self.selected.clone(),
            unselected: self.unselected.clone(),
        }
    }

    /// Runs the traversal, reporting events to `receiver`.
    pub fn push<R: TraversalReceiver>(&self, receiver: &mut R) -> Result<(), R::Error> {
        let _guard = tracing::span!(
            tracing::Level::DEBUG,
            "shape traversal",
            layout = %self.layout.id(),
            top = %self.top,
        )
        .entered();

        let ctx = TraversalContext {
            traversal: self,
            bbox: self.layout.bbox_table(None),
            layer_bbox: self.layout.bbox_table(Some(self.layers.as_slice())),
        };
        receiver.begin(&ctx)?;
        if self.layout.has_cell(self.top) {
            let frame = Frame {
                cell: self.top,
                active: self.top_active(),
                depth: 0,
                region: self.region,
                complex_region: &self.complex_region,
                always_apply: self.global_trans,
                trans: self.global_trans,
            };
            self.visit(&ctx, receiver, frame)?;
        } else {
            tracing::warn!(top = %self.top, "traversal top cell does not exist");
        }
        receiver.end(&ctx)
    }

    fn visit<R: TraversalReceiver>(
        &self,
        ctx: &TraversalContext<'a, '_>,
        receiver: &mut R,
        frame: Frame<'_>,
    ) -> Result<(), R::Error> {
        let cell = self.layout.cell(frame.cell);

        if frame.active {
            for &layer in &self.layers {
                let Some(shapes) = cell.shapes(layer) else {
                    continue;
                };
                for entry in shapes.iter() {
                    if !selects(entry.shape().bbox(), frame.region, frame.complex_region) {
                        continue;
                    }
                    receiver.shape(
                        ctx,
                        &ShapeVisit {
                            cell: frame.cell,
                            layer,
                            entry,
                            always_apply: frame.always_apply,
                            trans: frame.trans,
                            region: frame.region,
                            complex_region: frame.complex_region,
                        },
                    )?;
                }
            }
        }

        if frame.depth >= self.max_depth {
            return Ok(());
        }

        for (_, inst) in cell.instances() {
            let child = inst.child();
            if ctx.cell_layer_bbox(child).is_none() && !receiver.wants_all_cells() {
                continue;
            }
            let child_bbox = ctx.cell_bbox(child);
            let array_bbox = inst.bbox_with(child_bbox);
            let all = match (frame.region, array_bbox) {
                (None, _) => true,
                (Some(_), None) => continue,
                (Some(region), Some(ab)) => {
                    if !selects(Some(ab), Some(region), frame.complex_region) {
                        continue;
                    }
                    ab.inside(&region)
                        && (frame.complex_region.is_empty()
                            || frame.complex_region.iter().any(|c| ab.inside(c)))
                }
            };
            let child_active = self.child_active(frame.active, child);
            let visit = InstVisit {
                inst,
                always_apply: frame.always_apply,
                region: frame.region,
                complex_region: frame.complex_region,
                all,
                child_inactive: !child_active,
            };

            match receiver.new_inst(ctx, &visit)? {
                NewInstMode::Skip => {}
                NewInstMode::Single => {
                    if let Some(member) = inst.members().next() {
                        self.descend(ctx, receiver, &frame, child, child_active, member)?;
                    }
                }
                NewInstMode::All => {
                    for member in inst.members() {
                        if frame.region.is_some() {
                            let member_bbox = child_bbox.map(|b| b.transform(member));
                            if !selects(member_bbox, frame.region, frame.complex_region) {
                                continue;
                            }
                        }
                        if receiver.new_inst_member(ctx, &visit, member)? {
                            self.descend(ctx, receiver, &frame, child, child_active, member)?;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn descend<R: TraversalReceiver>(
        &self,
        ctx: &TraversalContext<'a, '_>,
        receiver: &mut R,
        parent: &Frame<'_>,
        child: CellId,
        active: bool,
        member: Transformation,
    ) -> Result<(), R::Error> {
        let inv = member.inv();
        let region = parent.region.map(|r| r.transform(inv));
        let member_bbox = ctx.cell_bbox(child).map(|b| b.transform(member));
        let complex_region: Vec<Rect> = parent
            .complex_region
            .iter()
            .filter(|c| member_bbox.is_some_and(|b| b.overlaps(c)))
            .map(|c| c.transform(inv))
            .collect();

        receiver.enter_cell(
            ctx,
            &CellVisit {
                cell: child,
                region,
                complex_region: &complex_region,
                inactive: !active,
            },
        )?;
        self.visit(
            ctx,
            receiver,
            Frame {
                cell: child,
                active,
                depth: parent.depth + 1,
                region,
                complex_region: &complex_region,
                always_apply: Transformation::identity(),
                trans: parent.trans * member,
            },
        )?;
        receiver.leave_cell(ctx, child)
    }
}

struct Frame<'b> {
    cell: CellId,
    active: bool,
    depth: usize,
    region: Option<Rect>,
    complex_region: &'b [Rect],
    always_apply: Transformation,
    trans: Transformation,
}

/// Whether something with bounding box `bbox` is selected by the region.
fn selects(bbox: Option<Rect>, region: Option<Rect>, complex_region: &[Rect]) -> bool {
    let Some(region) = region else {
        return true;
    };
    let Some(bbox) = bbox else {
        return false;
    };
    bbox.overlaps(&region)
        && (complex_region.is_empty() || complex_region.iter().any(|c| bbox.overlaps(c)))
}

/// Identifies the target hierarchy a traversal produces.
///
/// Two traversals with equal keys sample the same cells with the same
/// clipping, so the hierarchies they produce can share one shadow layout.
/// Layers only matter when a region is set, since the region pruning depends
/// on where the traversed layers have shapes.
#[derive(Debug, Clone)]
pub struct HierarchyKey {
    layout: LayoutId,
    top: CellId,
    global_trans: Transformation,
    max_depth: usize,
    region: Option<Rect>,
    complex_region: Vec<Rect>,
    layers: Vec<LayerId>,
    selected: BTreeSet<CellId>,
    unselected: BTreeSet<CellId>,
}

impl HierarchyKey {
    pub fn layout(&self) -> LayoutId {
        self.layout
    }

    pub fn top(&self) -> CellId {
        self.top
    }

    pub fn global_trans(&self) -> Transformation {
        self.global_trans
    }

    pub fn has_region(&self) -> bool {
        self.region.is_some()
    }
}

impl Ord for HierarchyKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.layout
            .cmp(&other.layout)
            .then_with(|| self.top.cmp(&other.top))
            .then_with(|| self.global_trans.cmp(&other.global_trans))
            .then_with(|| self.max_depth.cmp(&other.max_depth))
            .then_with(|| self.region.is_some().cmp(&other.region.is_some()))
            .then_with(|| {
                if self.region.is_none() {
                    return Ordering::Equal;
                }
                self.region
                    .cmp(&other.region)
                    .then_with(|| self.complex_region.cmp(&other.complex_region))
                    .then_with(|| self.layers.cmp(&other.layers))
            })
            .then_with(|| self.selected.cmp(&other.selected))
            .then_with(|| self.unselected.cmp(&other.unselected))
    }
}

impl PartialOrd for HierarchyKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for HierarchyKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HierarchyKey {}
