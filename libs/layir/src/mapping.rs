//! Relating the cells of two layouts.
//!
//! A [`CellMapping`] maps cells of a source layout (`from`) to cells of a
//! target layout (`into`). Mappings are stamped with the identities and
//! hierarchy generations of both layouts, so a cached mapping can be checked
//! for staleness with [`CellMapping::is_valid`].

use std::collections::{BTreeMap, BTreeSet, HashSet};

use geometry::prelude::*;

use crate::error::Result;
use crate::{CellId, LayerId, Layout, LayoutId, ShapeEntry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Stamp {
    into: LayoutId,
    into_generation: u64,
    from: LayoutId,
    from_generation: u64,
}

/// A directed mapping from source cells to target cells.
#[derive(Debug, Clone, Default)]
pub struct CellMapping {
    map: BTreeMap<CellId, CellId>,
    stamp: Option<Stamp>,
}

impl CellMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps source cell `from` to target cell `into`.
    pub fn map(&mut self, from: CellId, into: CellId) {
        self.map.insert(from, into);
    }

    /// The target cell of source cell `from`.
    pub fn cell_mapping(&self, from: CellId) -> Option<CellId> {
        self.map.get(&from).copied()
    }

    pub fn has_mapping(&self, from: CellId) -> bool {
        self.map.contains_key(&from)
    }

    /// Iterates over `(from, into)` pairs in source cell order.
    pub fn iter(&self) -> impl Iterator<Item = (CellId, CellId)> + '_ {
        self.map.iter().map(|(a, b)| (*a, *b))
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn clear(&mut self) {
        self.map.clear();
        self.stamp = None;
    }

    /// Maps only the top cells onto each other.
    pub fn create_single_mapping(&mut self, into_cell: CellId, from_top: CellId) {
        self.clear();
        self.map(from_top, into_cell);
    }

    /// Maps `from_top` to `into_cell`, and every other cell below `from_top`
    /// to the target cell of the same name, if there is one.
    pub fn create_from_names(
        &mut self,
        into: &Layout,
        into_cell: CellId,
        from: &Layout,
        from_top: CellId,
    ) {
        self.create_single_mapping(into_cell, from_top);
        for id in from.cells_used_by([from_top]) {
            if id == from_top {
                continue;
            }
            if let Some(target) = into.try_cell_id_named(from.cell(id).name()) {
                self.map(id, target);
            }
        }
    }

    /// Creates target cells for unmapped source cells below `from_top`, along
    /// with the instances connecting them to the rest of the target hierarchy.
    ///
    /// Cells in `excluded` and their subtrees are skipped. If `included` is
    /// given, only cells in it are created. Returns the newly created pairs.
    pub fn create_missing_mapping(
        &mut self,
        into: &mut Layout,
        from: &Layout,
        from_top: CellId,
        excluded: Option<&BTreeSet<CellId>>,
        included: Option<&BTreeSet<CellId>>,
    ) -> Result<Vec<(CellId, CellId)>> {
        let mut reachable = Vec::new();
        let mut seen = HashSet::new();
        let mut stack = vec![from_top];
        while let Some(id) = stack.pop() {
            if excluded.is_some_and(|ex| ex.contains(&id)) || !seen.insert(id) {
                continue;
            }
            let Some(cell) = from.try_cell(id) else {
                continue;
            };
            reachable.push(id);
            stack.extend(cell.instances().map(|(_, inst)| inst.child()));
        }

        let mut created = Vec::new();
        for &id in &reachable {
            if self.has_mapping(id) || included.is_some_and(|inc| !inc.contains(&id)) {
                continue;
            }
            let target = into.add_cell(from.cell(id).name());
            self.map(id, target);
            created.push((id, target));
        }

        let new_cells: HashSet<CellId> = created.iter().map(|(from, _)| *from).collect();
        for &id in &reachable {
            let Some(parent) = self.cell_mapping(id) else {
                continue;
            };
            for (_, inst) in from.cell(id).instances() {
                let Some(child) = self.cell_mapping(inst.child()) else {
                    continue;
                };
                if new_cells.contains(&id) || new_cells.contains(&inst.child()) {
                    into.add_instance(parent, inst.with_child(child))?;
                }
            }
        }

        if !created.is_empty() {
            tracing::debug!(count = created.len(), "created missing target cells");
        }
        Ok(created)
    }

    /// Records the current identities and hierarchy generations of both layouts.
    pub fn stamp(&mut self, into: &Layout, from: &Layout) {
        self.stamp = Some(Stamp {
            into: into.id(),
            into_generation: into.hier_generation(),
            from: from.id(),
            from_generation: from.hier_generation(),
        });
    }

    /// Returns `true` if neither hierarchy changed since the mapping was stamped.
    pub fn is_valid(&self, into: &Layout, from: &Layout) -> bool {
        self.stamp
            == Some(Stamp {
                into: into.id(),
                into_generation: into.hier_generation(),
                from: from.id(),
                from_generation: from.hier_generation(),
            })
    }
}

/// Copies the shapes of `from_layer` below `from_top` into `into_layer`.
///
/// Shapes of mapped cells land in their target cells. Unmapped subtrees are
/// flattened into the nearest mapped ancestor. Each shape passes through
/// `convert`, which may drop it or produce several shapes. Property IDs are
/// translated and polygon references re-interned in `into`.
///
/// Returns the number of shapes inserted.
pub fn copy_shapes(
    into: &mut Layout,
    from: &Layout,
    from_top: CellId,
    mapping: &CellMapping,
    from_layer: LayerId,
    into_layer: LayerId,
    convert: &mut dyn FnMut(&Shape) -> Vec<Shape>,
) -> Result<usize> {
    let mut count = 0;
    for id in from.cells_used_by([from_top]) {
        let Some(target_cell) = mapping.cell_mapping(id) else {
            continue;
        };
        let mut collected = Vec::new();
        collect_flat(
            from,
            id,
            mapping,
            from_layer,
            Transformation::identity(),
            false,
            &mut collected,
        );
        if collected.is_empty() {
            continue;
        }

        let mut target = into.shape_target(target_cell, into_layer)?;
        for entry in collected {
            let (shape, prop_id) = entry.into_parts();
            let prop_id = target.properties_mut().translate(from.properties(), prop_id);
            for shape in convert(&shape) {
                let shape = match shape {
                    Shape::PolygonRef(r) => Shape::PolygonRef(target.polygons_mut().intern_ref(&r)),
                    other => other,
                };
                target.insert(shape, prop_id);
                count += 1;
            }
        }
    }
    Ok(count)
}

fn collect_flat(
    from: &Layout,
    cell: CellId,
    mapping: &CellMapping,
    layer: LayerId,
    trans: Transformation,
    nested: bool,
    out: &mut Vec<ShapeEntry>,
) {
    let c = from.cell(cell);
    if let Some(shapes) = c.shapes(layer) {
        out.extend(
            shapes
                .iter()
                .map(|e| ShapeEntry::new(e.shape().transformed(trans), e.prop_id())),
        );
    }
    // Below an unmapped cell, mapped cells have no placement in the target
    // and are flattened as well.
    for (_, inst) in c.instances() {
        if !nested && mapping.has_mapping(inst.child()) {
            continue;
        }
        for member in inst.members() {
            collect_flat(from, inst.child(), mapping, layer, trans * member, true, out);
        }
    }
}
