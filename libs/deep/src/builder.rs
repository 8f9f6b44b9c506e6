//! Replays a source traversal into a shadow hierarchy.
//!
//! A [`HierarchyBuilder`] belongs to one shadow layout. Every pass pushes
//! one [`ShapeTraversal`] through it and fills one target layer. The first
//! pass creates the shadow cells and instances; later passes with the same
//! hierarchy key reuse them and only add shapes.
//!
//! Shadow cells are keyed by [`CellMapKey`]: the source cell, whether it is
//! inactive, and the set of clip boxes it was sampled with. A source cell
//! that is clipped differently in different places yields one shadow cell
//! (a clip variant) per distinct clip box set.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use geometry::prelude::*;
use layir::traverse::{
    CellVisit, HierarchyKey, InstVisit, NewInstMode, ShapeTraversal, ShapeVisit,
    TraversalContext, TraversalReceiver,
};
use layir::{CellId, CellInstArray, LayerId, Layout, PropId};

use crate::error::{DeepError, Result};
use crate::pipeline::ShapeReceiver;

/// Identifies the shadow cell a source cell is mirrored into.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellMapKey {
    pub original_cell: CellId,
    /// The cell's own shapes are suppressed.
    pub inactive: bool,
    /// The boxes the cell is clipped to, in the cell's coordinates.
    /// Empty if the cell is not clipped.
    pub clip_region: BTreeSet<Rect>,
}

impl CellMapKey {
    pub fn new(original_cell: CellId, inactive: bool, clip_region: BTreeSet<Rect>) -> Self {
        Self {
            original_cell,
            inactive,
            clip_region,
        }
    }

    /// The key of an unclipped, active cell.
    pub fn plain(original_cell: CellId) -> Self {
        Self::new(original_cell, false, BTreeSet::new())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    InPass,
}

impl Phase {
    fn name(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::InPass => "in a pass",
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Frame {
    cell: CellId,
    /// Instances are only mirrored into cells created in the current pass.
    new_cell: bool,
    receives_shapes: bool,
}

/// Computes the clip boxes of a cell with bounding box `bbox`.
///
/// Returns `None` if the cell does not overlap the region at all, and an
/// empty set if the cell is not clipped. A cell with a point-like or
/// line-like bounding box is never clipped.
fn clip_boxes(
    bbox: Option<Rect>,
    region: Option<Rect>,
    complex_region: &[Rect],
) -> Option<BTreeSet<Rect>> {
    let (Some(bbox), Some(region)) = (bbox, region) else {
        return Some(BTreeSet::new());
    };
    if bbox.is_degenerate() {
        let selected = bbox.overlaps(&region)
            && (complex_region.is_empty() || complex_region.iter().any(|c| bbox.overlaps(c)));
        return selected.then(BTreeSet::new);
    }
    let clipped = bbox.intersection(region).filter(|r| !r.is_degenerate())?;

    let mut boxes = BTreeSet::new();
    if complex_region.is_empty() {
        boxes.insert(clipped);
    } else {
        boxes.extend(
            complex_region
                .iter()
                .filter_map(|c| clipped.intersection(*c))
                .filter(|r| !r.is_degenerate()),
        );
        if boxes.is_empty() {
            return None;
        }
    }

    if boxes.contains(&bbox) {
        boxes.clear();
    }
    Some(boxes)
}

/// Builds and maintains a shadow hierarchy.
#[derive(Debug)]
pub struct HierarchyBuilder {
    phase: Phase,
    signature: Option<HierarchyKey>,
    initial_cell: Option<CellId>,
    cell_map: BTreeMap<CellMapKey, CellId>,
    variants: BTreeMap<CellId, BTreeSet<CellId>>,
    variant_to_original: BTreeMap<CellId, CellId>,
    cells_seen: BTreeSet<CellMapKey>,
    cells_to_be_filled: BTreeSet<CellId>,
    /// Shadow cells created in the current pass.
    created_in_pass: BTreeSet<CellId>,
    frames: Vec<Frame>,
    target_layer: Option<LayerId>,
    trans: Transformation,
    wants_all_cells: bool,
    breakout_cells: BTreeSet<CellId>,
    prop_ids: HashMap<PropId, PropId>,
}

impl Default for HierarchyBuilder {
    fn default() -> Self {
        Self {
            phase: Phase::Idle,
            signature: None,
            initial_cell: None,
            cell_map: BTreeMap::new(),
            variants: BTreeMap::new(),
            variant_to_original: BTreeMap::new(),
            cells_seen: BTreeSet::new(),
            cells_to_be_filled: BTreeSet::new(),
            created_in_pass: BTreeSet::new(),
            frames: Vec::new(),
            target_layer: None,
            trans: Transformation::identity(),
            wants_all_cells: false,
            breakout_cells: BTreeSet::new(),
            prop_ids: HashMap::new(),
        }
    }
}

impl HierarchyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forgets the hierarchy built so far.
    ///
    /// The next pass records a new signature and creates fresh shadow cells.
    /// Cells created before stay in the layout.
    pub fn reset(&mut self) {
        self.signature = None;
        self.initial_cell = None;
        self.cell_map.clear();
        self.variants.clear();
        self.variant_to_original.clear();
        self.cells_seen.clear();
        self.cells_to_be_filled.clear();
        self.created_in_pass.clear();
        self.frames.clear();
        self.phase = Phase::Idle;
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The hierarchy key of the traversal the hierarchy was built from.
    pub fn source(&self) -> Option<&HierarchyKey> {
        self.signature.as_ref()
    }

    /// The shadow counterpart of the traversal's top cell.
    pub fn initial_cell(&self) -> Option<CellId> {
        self.initial_cell
    }

    pub fn target_layer(&self) -> Option<LayerId> {
        self.target_layer
    }

    pub fn set_target_layer(&mut self, layer: LayerId) {
        self.target_layer = Some(layer);
    }

    /// The transformation applied to everything the builder produces.
    pub fn trans(&self) -> Transformation {
        self.trans
    }

    pub fn set_trans(&mut self, trans: Transformation) {
        self.trans = trans;
    }

    /// Whether cells without shapes on the traversed layers are mirrored too.
    pub fn wants_all_cells(&self) -> bool {
        self.wants_all_cells
    }

    pub fn set_wants_all_cells(&mut self, wants_all_cells: bool) {
        self.wants_all_cells = wants_all_cells;
    }

    /// Shadow cells whose own shapes are suppressed in the next passes.
    pub fn set_breakout_cells(&mut self, cells: BTreeSet<CellId>) {
        self.breakout_cells = cells;
    }

    pub fn breakout_cells(&self) -> &BTreeSet<CellId> {
        &self.breakout_cells
    }

    /// Iterates over the cell map.
    pub fn cell_map(&self) -> impl Iterator<Item = (&CellMapKey, CellId)> {
        self.cell_map.iter().map(|(k, v)| (k, *v))
    }

    pub fn shadow_cell_for(&self, key: &CellMapKey) -> Option<CellId> {
        self.cell_map.get(key).copied()
    }

    /// Makes `key` resolve to `cell` in later passes.
    pub fn map(&mut self, key: CellMapKey, cell: CellId) {
        self.cell_map.insert(key, cell);
    }

    pub fn unmap(&mut self, key: &CellMapKey) -> Option<CellId> {
        self.cell_map.remove(key)
    }

    /// Records `variant` as a variant of `original`.
    ///
    /// A variant belongs to one original only; registering it again moves it.
    pub fn register_variant(&mut self, original: CellId, variant: CellId) {
        if let Some(previous) = self.variant_to_original.insert(variant, original) {
            if previous != original {
                self.remove_from_variants(previous, variant);
            }
        }
        self.variants.entry(original).or_default().insert(variant);
        self.check_variants();
    }

    pub fn unregister_variant(&mut self, variant: CellId) {
        if let Some(original) = self.variant_to_original.remove(&variant) {
            self.remove_from_variants(original, variant);
        }
        self.check_variants();
    }

    fn remove_from_variants(&mut self, original: CellId, variant: CellId) {
        if let Some(list) = self.variants.get_mut(&original) {
            list.remove(&variant);
            if list.is_empty() {
                self.variants.remove(&original);
            }
        }
    }

    fn check_variants(&self) {
        debug_assert!(self
            .variant_to_original
            .iter()
            .all(|(v, o)| self.variants.get(o).is_some_and(|list| list.contains(v))));
        debug_assert!(self.variants.iter().all(|(o, list)| list
            .iter()
            .all(|v| self.variant_to_original.get(v) == Some(o))));
    }

    /// The cell `cell` is a variant of, or `cell` itself.
    pub fn original_target_for_variant(&self, cell: CellId) -> CellId {
        self.variant_to_original.get(&cell).copied().unwrap_or(cell)
    }

    pub fn is_variant(&self, cell: CellId) -> bool {
        self.variant_to_original.contains_key(&cell)
    }

    pub fn variants_of(&self, original: CellId) -> impl Iterator<Item = CellId> + '_ {
        self.variants.get(&original).into_iter().flatten().copied()
    }

    /// Pushes `traversal` through the builder, sending shapes down `pipe`
    /// into the target layer of `layout`.
    pub fn run(
        &mut self,
        traversal: &ShapeTraversal<'_>,
        layout: &mut Layout,
        pipe: &mut dyn ShapeReceiver,
    ) -> Result<()> {
        let Some(target_layer) = self.target_layer else {
            tracing::error!("builder has no target layer");
            return Err(DeepError::InvalidTransition {
                event: "begin",
                phase: "without a target layer",
            });
        };
        let _guard = tracing::span!(
            tracing::Level::DEBUG,
            "builder pass",
            layout = %layout.id(),
            layer = %target_layer,
        )
        .entered();

        let mut pass = BuilderPass {
            builder: self,
            layout,
            pipe,
            target_layer,
        };
        let result = traversal.push(&mut pass);
        if result.is_err() {
            self.frames.clear();
            self.phase = Phase::Idle;
        }
        result
    }

    fn expect_phase(&self, phase: Phase, event: &'static str) -> Result<()> {
        if self.phase == phase {
            Ok(())
        } else {
            tracing::error!(event, phase = self.phase.name(), "invalid builder transition");
            Err(DeepError::InvalidTransition {
                event,
                phase: self.phase.name(),
            })
        }
    }

    /// Finds or creates the shadow cell for `key`.
    fn make_cell(&mut self, layout: &mut Layout, source: &Layout, key: &CellMapKey) -> CellId {
        if let Some(&cell) = self.cell_map.get(key) {
            return cell;
        }
        let mut name = source.cell(key.original_cell).name().to_string();
        if !key.clip_region.is_empty() {
            name.push_str("$CLIP_VAR");
        }
        if key.inactive {
            name.push_str("$DIS");
        }
        let cell = layout.add_cell(&name);
        self.cell_map.insert(key.clone(), cell);
        self.cells_to_be_filled.insert(cell);
        self.created_in_pass.insert(cell);
        cell
    }

    fn frame(&self) -> Option<Frame> {
        self.frames.last().copied()
    }

    /// The cell an instance of `child` goes into, if it is not there yet.
    ///
    /// Cells created in an earlier pass already hold their instances, except
    /// for children the earlier passes pruned. Those are created now.
    fn instance_parent(&self, child: CellId) -> Option<CellId> {
        self.frame()
            .filter(|frame| frame.new_cell || self.created_in_pass.contains(&child))
            .map(|frame| frame.cell)
    }
}

/// The receiver side of one builder pass.
struct BuilderPass<'p> {
    builder: &'p mut HierarchyBuilder,
    layout: &'p mut Layout,
    pipe: &'p mut dyn ShapeReceiver,
    target_layer: LayerId,
}

impl BuilderPass<'_> {
    fn add_instance(
        &mut self,
        parent: CellId,
        mut inst: CellInstArray,
        always_apply: Transformation,
    ) -> Result<()> {
        inst.transform(always_apply);
        inst.transform_into(self.builder.trans);
        self.layout.add_instance(parent, inst)?;
        Ok(())
    }
}

impl TraversalReceiver for BuilderPass<'_> {
    type Error = DeepError;

    fn wants_all_cells(&self) -> bool {
        self.builder.wants_all_cells
    }

    fn begin(&mut self, ctx: &TraversalContext<'_, '_>) -> Result<()> {
        let builder = &mut *self.builder;
        builder.expect_phase(Phase::Idle, "begin")?;

        let traversal = ctx.traversal();
        let key = traversal.hierarchy_key();
        match &builder.signature {
            Some(signature) if *signature != key => {
                tracing::error!("builder pass with a different hierarchy key; reset the builder first");
                return Err(DeepError::IncompatiblePass);
            }
            Some(_) => {}
            None => builder.signature = Some(key),
        }

        builder.phase = Phase::InPass;
        builder.cells_seen.clear();
        builder.cells_to_be_filled.clear();
        builder.created_in_pass.clear();
        builder.frames.clear();
        builder.prop_ids.clear();

        let top_key = CellMapKey::new(traversal.top(), !traversal.top_active(), BTreeSet::new());
        let top = builder.make_cell(self.layout, ctx.layout(), &top_key);
        builder.initial_cell = Some(top);
        builder.cells_seen.insert(top_key.clone());
        let receives_shapes = !top_key.inactive && !builder.breakout_cells.contains(&top);
        builder.frames.push(Frame {
            cell: top,
            new_cell: builder.cells_to_be_filled.contains(&top),
            receives_shapes,
        });
        tracing::debug!(cell = %top, "builder pass started");
        Ok(())
    }

    fn end(&mut self, _ctx: &TraversalContext<'_, '_>) -> Result<()> {
        self.builder.expect_phase(Phase::InPass, "end")?;
        self.builder.frames.clear();
        self.builder.cells_to_be_filled.clear();
        self.builder.created_in_pass.clear();
        self.builder.phase = Phase::Idle;
        tracing::debug!("builder pass finished");
        Ok(())
    }

    fn enter_cell(&mut self, ctx: &TraversalContext<'_, '_>, cell: &CellVisit<'_>) -> Result<()> {
        self.builder.expect_phase(Phase::InPass, "enter_cell")?;
        let clip_region = clip_boxes(ctx.cell_bbox(cell.cell), cell.region, cell.complex_region)
            .unwrap_or_default();
        let key = CellMapKey::new(cell.cell, cell.inactive, clip_region);

        let builder = &mut *self.builder;
        let shadow = builder.make_cell(self.layout, ctx.layout(), &key);
        let receives_shapes = !key.inactive && !builder.breakout_cells.contains(&shadow);
        builder.cells_seen.insert(key);
        builder.frames.push(Frame {
            cell: shadow,
            new_cell: builder.cells_to_be_filled.contains(&shadow),
            receives_shapes,
        });
        Ok(())
    }

    fn leave_cell(&mut self, _ctx: &TraversalContext<'_, '_>, _cell: CellId) -> Result<()> {
        self.builder.expect_phase(Phase::InPass, "leave_cell")?;
        if let Some(frame) = self.builder.frames.pop() {
            if frame.new_cell {
                self.builder.cells_to_be_filled.remove(&frame.cell);
            }
        }
        Ok(())
    }

    fn new_inst(
        &mut self,
        ctx: &TraversalContext<'_, '_>,
        inst: &InstVisit<'_>,
    ) -> Result<NewInstMode> {
        self.builder.expect_phase(Phase::InPass, "new_inst")?;
        if !inst.all {
            return Ok(NewInstMode::All);
        }

        // The whole array is inside the region: mirror it as it is.
        let key = CellMapKey::new(inst.inst.child(), inst.child_inactive, BTreeSet::new());
        let child = self.builder.make_cell(self.layout, ctx.layout(), &key);
        if let Some(parent) = self.builder.instance_parent(child) {
            self.add_instance(parent, inst.inst.with_child(child), inst.always_apply)?;
        }
        Ok(if self.builder.cells_seen.contains(&key) {
            NewInstMode::Skip
        } else {
            NewInstMode::Single
        })
    }

    fn new_inst_member(
        &mut self,
        ctx: &TraversalContext<'_, '_>,
        inst: &InstVisit<'_>,
        member: Transformation,
    ) -> Result<bool> {
        self.builder.expect_phase(Phase::InPass, "new_inst_member")?;
        let child = inst.inst.child();
        let child_bbox = ctx.cell_bbox(child);

        let inv = member.inv();
        let region = inst.region.map(|r| r.transform(inv));
        let member_bbox = child_bbox.map(|b| b.transform(member));
        let complex_region: Vec<Rect> = inst
            .complex_region
            .iter()
            .filter(|c| member_bbox.is_some_and(|b| b.overlaps(c)))
            .map(|c| c.transform(inv))
            .collect();
        let Some(clip_region) = clip_boxes(child_bbox, region, &complex_region) else {
            return Ok(false);
        };

        let key = CellMapKey::new(child, inst.child_inactive, clip_region);
        let shadow = self.builder.make_cell(self.layout, ctx.layout(), &key);
        if let Some(parent) = self.builder.instance_parent(shadow) {
            let single = CellInstArray::new(shadow, member);
            self.add_instance(parent, single, inst.always_apply)?;
        }
        Ok(!self.builder.cells_seen.contains(&key))
    }

    fn shape(&mut self, ctx: &TraversalContext<'_, '_>, shape: &ShapeVisit<'_>) -> Result<()> {
        self.builder.expect_phase(Phase::InPass, "shape")?;
        let Some(frame) = self.builder.frame() else {
            return Ok(());
        };
        if !frame.receives_shapes {
            return Ok(());
        }

        let trans = self.builder.trans * shape.always_apply;
        let mut target = self.layout.shape_target(frame.cell, self.target_layer)?;
        let source_prop = shape.entry.prop_id();
        let prop_id = match self.builder.prop_ids.get(&source_prop) {
            Some(&id) => id,
            None => {
                let id = target
                    .properties_mut()
                    .translate(ctx.layout().properties(), source_prop);
                self.builder.prop_ids.insert(source_prop, id);
                id
            }
        };
        self.pipe.push(
            shape.entry.shape(),
            prop_id,
            trans,
            shape.region,
            shape.complex_region,
            &mut target,
        );
        Ok(())
    }
}
