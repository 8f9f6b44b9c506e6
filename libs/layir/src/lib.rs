//! A hierarchical layout model.
//!
//! A [`Layout`] holds uniquely named cells, layers, and per-cell, per-layer
//! shape containers. Cells place other cells through [`CellInstArray`]s.
//! Every layout carries a process-unique [`LayoutId`] and two generation
//! counters, so that caches keyed on a layout can tell when it was edited.
//!
//! The [`traverse`] module walks a hierarchy and reports cells, instances and
//! shapes to a receiver. The [`mapping`] module relates the cells of two
//! layouts and copies shapes along such a relation.

pub mod error;
pub mod id;
pub mod instance;
pub mod mapping;
pub mod props;
pub mod shapes;
pub mod traverse;


use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};

use arcstr::ArcStr;
use geometry::prelude::*;
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use uniquify::Names;

pub use crate::error::{LayirError, Result};
use crate::id::Id;
pub use crate::instance::{CellInstArray, RegularArray};
pub use crate::props::{
    PolygonRepository, PropId, PropValue, PropertiesRepository, PropertySet,
};
pub use crate::shapes::{ShapeEntry, ShapeTarget, Shapes};

pub struct Cells;
pub struct Layers;
pub struct Instances;

// Marker types rather than the item types, so ids stay `Send + Sync`
// regardless of what the items contain.
pub type CellId = Id<Cells>;
pub type LayerId = Id<Layers>;
pub type InstanceId = Id<Instances>;

static NEXT_LAYOUT_ID: AtomicU64 = AtomicU64::new(1);

/// A process-unique layout identity.
///
/// Identities are never reused, even after the layout is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LayoutId(u64);

impl LayoutId {
    fn next() -> Self {
        Self(NEXT_LAYOUT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for LayoutId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "layout#{}", self.0)
    }
}

/// Layer properties.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LayerInfo {
    /// The layer number.
    pub layer: u16,
    /// The datatype number.
    pub datatype: u16,
    /// An optional layer name.
    pub name: Option<ArcStr>,
}

impl LayerInfo {
    /// Creates layer properties from a layer and datatype number.
    pub fn new(layer: u16, datatype: u16) -> Self {
        Self {
            layer,
            datatype,
            name: None,
        }
    }

    /// Creates layer properties carrying only a name.
    pub fn named(name: impl Into<ArcStr>) -> Self {
        Self {
            layer: 0,
            datatype: 0,
            name: Some(name.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    name: ArcStr,
    instance_id: InstanceId,
    instances: IndexMap<InstanceId, CellInstArray>,
    shapes: IndexMap<LayerId, Shapes>,
}

impl Cell {
    fn new(name: ArcStr) -> Self {
        Self {
            name,
            instance_id: Id::new(),
            instances: IndexMap::new(),
            shapes: IndexMap::new(),
        }
    }

    #[inline]
    pub fn name(&self) -> &ArcStr {
        &self.name
    }

    /// Iterates over the `(id, instance)` pairs in this cell.
    pub fn instances(&self) -> impl Iterator<Item = (InstanceId, &CellInstArray)> {
        self.instances.iter().map(|(id, inst)| (*id, inst))
    }

    pub fn instance(&self, id: InstanceId) -> Option<&CellInstArray> {
        self.instances.get(&id)
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    /// The shapes on `layer`, if any were ever inserted there.
    pub fn shapes(&self, layer: LayerId) -> Option<&Shapes> {
        self.shapes.get(&layer)
    }

    /// The number of shapes on `layer`.
    pub fn shape_count(&self, layer: LayerId) -> usize {
        self.shapes.get(&layer).map(Shapes::len).unwrap_or(0)
    }
}

/// A hierarchical layout.
#[derive(Debug)]
pub struct Layout {
    id: LayoutId,
    cell_id: CellId,
    cells: IndexMap<CellId, Cell>,
    name_map: HashMap<ArcStr, CellId>,
    names: Names<CellId>,
    layer_id: LayerId,
    layers: IndexMap<LayerId, LayerInfo>,
    properties: PropertiesRepository,
    polygons: PolygonRepository,
    hier_generation: u64,
    shapes_generation: u64,
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            id: LayoutId::next(),
            cell_id: Id::new(),
            cells: Default::default(),
            name_map: Default::default(),
            names: Default::default(),
            layer_id: Id::new(),
            layers: Default::default(),
            properties: Default::default(),
            polygons: Default::default(),
            hier_generation: 0,
            shapes_generation: 0,
        }
    }
}

impl Clone for Layout {
    /// Copies the layout's content under a fresh [`LayoutId`].
    fn clone(&self) -> Self {
        Self {
            id: LayoutId::next(),
            cell_id: self.cell_id,
            cells: self.cells.clone(),
            name_map: self.name_map.clone(),
            names: self.names.clone(),
            layer_id: self.layer_id,
            layers: self.layers.clone(),
            properties: self.properties.clone(),
            polygons: self.polygons.clone(),
            hier_generation: self.hier_generation,
            shapes_generation: self.shapes_generation,
        }
    }
}

impl Layout {
    pub fn new() -> Self {
        Default::default()
    }

    #[inline]
    pub fn id(&self) -> LayoutId {
        self.id
    }

    /// A counter bumped on every structural edit: cells added, deleted or
    /// renamed, and instances added, removed or retargeted.
    #[inline]
    pub fn hier_generation(&self) -> u64 {
        self.hier_generation
    }

    /// A counter bumped on every shape edit.
    #[inline]
    pub fn shapes_generation(&self) -> u64 {
        self.shapes_generation
    }

    /// Adds an empty cell, returning its ID.
    ///
    /// If the name is taken, a `_<n>` suffix is appended.
    pub fn add_cell(&mut self, name: &str) -> CellId {
        let id = self.cell_id.alloc();
        let name = self.names.assign_name(id, name);
        self.name_map.insert(name.clone(), id);
        self.cells.insert(id, Cell::new(name));
        self.hier_generation += 1;
        id
    }

    /// Deletes a cell along with all instances of it.
    pub fn delete_cell(&mut self, id: CellId) -> Result<()> {
        let cell = self
            .cells
            .shift_remove(&id)
            .ok_or(LayirError::NoSuchCell(id))?;
        self.name_map.remove(&cell.name);
        self.names.release(&id);
        for (_, parent) in self.cells.iter_mut() {
            parent.instances.retain(|_, inst| inst.child != id);
        }
        self.hier_generation += 1;
        Ok(())
    }

    /// Renames a cell, returning the (possibly suffixed) name it received.
    pub fn rename_cell(&mut self, id: CellId, name: &str) -> Result<ArcStr> {
        let cell = self.cells.get_mut(&id).ok_or(LayirError::NoSuchCell(id))?;
        self.name_map.remove(&cell.name);
        let name = self.names.assign_name(id, name);
        self.name_map.insert(name.clone(), id);
        cell.name = name.clone();
        self.hier_generation += 1;
        Ok(name)
    }

    /// Gets the cell with the given ID.
    ///
    /// # Panics
    ///
    /// Panics if no cell has the given ID.
    /// For a non-panicking alternative, see [`try_cell`](Layout::try_cell).
    pub fn cell(&self, id: CellId) -> &Cell {
        match self.cells.get(&id) {
            Some(cell) => cell,
            None => {
                tracing::error!("no cell with ID {}", id);
                panic!("no cell with ID {}", id);
            }
        }
    }

    pub fn try_cell(&self, id: CellId) -> Option<&Cell> {
        self.cells.get(&id)
    }

    pub fn has_cell(&self, id: CellId) -> bool {
        self.cells.contains_key(&id)
    }

    /// Gets the cell ID corresponding to the given name.
    ///
    /// # Panics
    ///
    /// Panics if no cell has the given name.
    /// For a non-panicking alternative, see [`try_cell_id_named`](Layout::try_cell_id_named).
    pub fn cell_id_named(&self, name: &str) -> CellId {
        match self.name_map.get(name) {
            Some(&cell) => cell,
            None => {
                tracing::error!("no cell named `{}`", name);
                panic!("no cell named `{}`", name);
            }
        }
    }

    /// Gets the cell ID corresponding to the given name.
    pub fn try_cell_id_named(&self, name: &str) -> Option<CellId> {
        self.name_map.get(name).copied()
    }

    /// Iterates over the `(id, cell)` pairs in this layout, in creation order.
    pub fn cells(&self) -> impl Iterator<Item = (CellId, &Cell)> {
        self.cells.iter().map(|(id, cell)| (*id, cell))
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Cells that are not instantiated by any other cell, in creation order.
    pub fn top_cells(&self) -> Vec<CellId> {
        let used: HashSet<CellId> = self
            .cells
            .values()
            .flat_map(|cell| cell.instances.values().map(|inst| inst.child))
            .collect();
        self.cells
            .keys()
            .copied()
            .filter(|id| !used.contains(id))
            .collect()
    }

    /// Returns cell IDs in topological order (children before parents).
    pub fn topological_order(&self) -> Vec<CellId> {
        let mut state = IndexSet::new();
        for (cell, _) in self.cells() {
            self.dfs_postorder(cell, &mut state);
        }
        state.into_iter().collect()
    }

    /// Returns the cells reachable from `root`, parents before children.
    pub fn top_down_order(&self, root: CellId) -> Vec<CellId> {
        let mut state = IndexSet::new();
        self.dfs_postorder(root, &mut state);
        state.into_iter().rev().collect()
    }

    fn dfs_postorder(&self, id: CellId, state: &mut IndexSet<CellId>) {
        if state.contains(&id) {
            return;
        }
        let Some(cell) = self.cells.get(&id) else {
            return;
        };
        for inst in cell.instances.values() {
            self.dfs_postorder(inst.child, state);
        }
        state.insert(id);
    }

    /// The list of cell IDs instantiated by the given root cells.
    ///
    /// The list returned will include the root cell IDs.
    pub fn cells_used_by(&self, roots: impl IntoIterator<Item = CellId>) -> Vec<CellId> {
        let mut stack = VecDeque::new();
        let mut visited = HashSet::new();
        stack.extend(roots);

        let mut out = Vec::new();
        while let Some(id) = stack.pop_front() {
            if !visited.insert(id) {
                continue;
            }
            let Some(cell) = self.cells.get(&id) else {
                continue;
            };
            out.push(id);
            for inst in cell.instances.values() {
                stack.push_back(inst.child);
            }
        }
        out
    }

    /// Adds a layer, returning its ID.
    ///
    /// Layer properties need not be unique.
    pub fn insert_layer(&mut self, info: LayerInfo) -> LayerId {
        let id = self.layer_id.alloc();
        self.layers.insert(id, info);
        id
    }

    /// The first layer with the given properties.
    pub fn find_layer(&self, info: &LayerInfo) -> Option<LayerId> {
        self.layers
            .iter()
            .find(|(_, i)| *i == info)
            .map(|(id, _)| *id)
    }

    pub fn layer_info(&self, id: LayerId) -> Option<&LayerInfo> {
        self.layers.get(&id)
    }

    pub fn layers(&self) -> impl Iterator<Item = (LayerId, &LayerInfo)> {
        self.layers.iter().map(|(id, info)| (*id, info))
    }

    pub fn has_layer(&self, id: LayerId) -> bool {
        self.layers.contains_key(&id)
    }

    fn check_layer(&self, id: LayerId) -> Result<()> {
        if self.layers.contains_key(&id) {
            Ok(())
        } else {
            Err(LayirError::NoSuchLayer(id))
        }
    }

    /// Removes every shape on the given layer.
    pub fn clear_layer(&mut self, id: LayerId) -> Result<()> {
        self.check_layer(id)?;
        for cell in self.cells.values_mut() {
            cell.shapes.shift_remove(&id);
        }
        self.shapes_generation += 1;
        Ok(())
    }

    /// Appends the shapes of layer `src` to layer `dst` in every cell.
    pub fn copy_layer(&mut self, src: LayerId, dst: LayerId) -> Result<()> {
        self.check_layer(src)?;
        self.check_layer(dst)?;
        if src == dst {
            return Ok(());
        }
        for cell in self.cells.values_mut() {
            if let Some(shapes) = cell.shapes.get(&src).cloned() {
                cell.shapes.entry(dst).or_default().extend(&shapes);
            }
        }
        self.shapes_generation += 1;
        Ok(())
    }

    /// Removes a layer and its shapes.
    pub fn delete_layer(&mut self, id: LayerId) -> Result<()> {
        self.clear_layer(id)?;
        self.layers.shift_remove(&id);
        Ok(())
    }

    /// Places `inst` in `parent`, returning the new instance's ID.
    pub fn add_instance(&mut self, parent: CellId, inst: CellInstArray) -> Result<InstanceId> {
        if !self.cells.contains_key(&inst.child) {
            return Err(LayirError::NoSuchCell(inst.child));
        }
        if !self.cells.contains_key(&parent) {
            return Err(LayirError::NoSuchCell(parent));
        }
        if inst.child == parent || self.cells_used_by([inst.child]).contains(&parent) {
            tracing::error!(%parent, child = %inst.child, "refusing to create a cyclic hierarchy");
            return Err(LayirError::CyclicHierarchy {
                parent,
                child: inst.child,
            });
        }
        let cell = self
            .cells
            .get_mut(&parent)
            .ok_or(LayirError::NoSuchCell(parent))?;
        let id = cell.instance_id.alloc();
        cell.instances.insert(id, inst);
        self.hier_generation += 1;
        Ok(id)
    }

    /// Removes an instance from `parent`, returning it.
    pub fn remove_instance(&mut self, parent: CellId, inst: InstanceId) -> Result<CellInstArray> {
        let cell = self
            .cells
            .get_mut(&parent)
            .ok_or(LayirError::NoSuchCell(parent))?;
        let removed = cell
            .instances
            .shift_remove(&inst)
            .ok_or(LayirError::NoSuchInstance { cell: parent, inst })?;
        self.hier_generation += 1;
        Ok(removed)
    }

    /// Makes an existing instance place `child` instead of its current cell.
    pub fn replace_instance_child(
        &mut self,
        parent: CellId,
        inst: InstanceId,
        child: CellId,
    ) -> Result<()> {
        if !self.cells.contains_key(&child) {
            return Err(LayirError::NoSuchCell(child));
        }
        if child == parent || self.cells_used_by([child]).contains(&parent) {
            return Err(LayirError::CyclicHierarchy { parent, child });
        }
        let cell = self
            .cells
            .get_mut(&parent)
            .ok_or(LayirError::NoSuchCell(parent))?;
        let entry = cell
            .instances
            .get_mut(&inst)
            .ok_or(LayirError::NoSuchInstance { cell: parent, inst })?;
        entry.child = child;
        self.hier_generation += 1;
        Ok(())
    }

    /// The shapes of `cell` on `layer`.
    pub fn shapes(&self, cell: CellId, layer: LayerId) -> Option<&Shapes> {
        self.cells.get(&cell)?.shapes.get(&layer)
    }

    /// Adds a shape to `cell` on `layer`.
    pub fn insert_shape(
        &mut self,
        cell: CellId,
        layer: LayerId,
        shape: impl Into<Shape>,
        prop_id: PropId,
    ) -> Result<()> {
        self.shape_target(cell, layer)?.insert(shape, prop_id);
        Ok(())
    }

    /// Borrows the shapes of `cell` on `layer` together with the layout's repositories.
    pub fn shape_target(&mut self, cell: CellId, layer: LayerId) -> Result<ShapeTarget<'_>> {
        self.check_layer(layer)?;
        let c = self.cells.get_mut(&cell).ok_or(LayirError::NoSuchCell(cell))?;
        self.shapes_generation += 1;
        Ok(ShapeTarget {
            cell_name: c.name.clone(),
            shapes: c.shapes.entry(layer).or_default(),
            properties: &mut self.properties,
            polygons: &mut self.polygons,
        })
    }

    pub fn properties(&self) -> &PropertiesRepository {
        &self.properties
    }

    pub fn properties_mut(&mut self) -> &mut PropertiesRepository {
        &mut self.properties
    }

    pub fn polygons(&self) -> &PolygonRepository {
        &self.polygons
    }

    pub fn polygons_mut(&mut self) -> &mut PolygonRepository {
        &mut self.polygons
    }

    /// Hierarchical bounding boxes of every cell, restricted to `layers` if given.
    pub fn bbox_table(&self, layers: Option<&[LayerId]>) -> HashMap<CellId, Option<Rect>> {
        let mut table: HashMap<CellId, Option<Rect>> = HashMap::with_capacity(self.cells.len());
        for id in self.topological_order() {
            let cell = &self.cells[&id];
            let mut bbox = None;
            for (layer, shapes) in cell.shapes.iter() {
                if layers.map_or(true, |ls| ls.contains(layer)) {
                    bbox = bbox.bounding_union(&shapes.bbox());
                }
            }
            for inst in cell.instances.values() {
                let child = table.get(&inst.child).copied().flatten();
                bbox = bbox.bounding_union(&inst.bbox_with(child));
            }
            table.insert(id, bbox);
        }
        table
    }

    /// The hierarchical bounding box of a cell over all layers.
    pub fn cell_bbox(&self, cell: CellId) -> Option<Rect> {
        self.bbox_table(None).get(&cell).copied().flatten()
    }

    /// The hierarchical bounding box of a cell over the given layers.
    pub fn cell_bbox_on(&self, cell: CellId, layers: &[LayerId]) -> Option<Rect> {
        self.bbox_table(Some(layers)).get(&cell).copied().flatten()
    }

    /// The number of shapes on `layer` seen from `top` with the hierarchy flattened.
    pub fn flat_shape_count(&self, top: CellId, layer: LayerId) -> usize {
        let mut counts: HashMap<CellId, usize> = HashMap::new();
        for id in self.topological_order() {
            let cell = &self.cells[&id];
            let own = cell.shape_count(layer);
            let nested: usize = cell
                .instances
                .values()
                .map(|inst| inst.size() * counts.get(&inst.child).copied().unwrap_or(0))
                .sum();
            counts.insert(id, own + nested);
        }
        counts.get(&top).copied().unwrap_or(0)
    }

    /// All shapes on `layer` seen from `top`, transformed into `top`'s coordinates.
    pub fn flatten(&self, top: CellId, layer: LayerId) -> Vec<ShapeEntry> {
        let mut out = Vec::new();
        self.flatten_into(top, layer, Transformation::identity(), &mut out);
        out
    }

    fn flatten_into(
        &self,
        cell: CellId,
        layer: LayerId,
        trans: Transformation,
        out: &mut Vec<ShapeEntry>,
    ) {
        let Some(c) = self.cells.get(&cell) else {
            return;
        };
        if let Some(shapes) = c.shapes.get(&layer) {
            out.extend(
                shapes
                    .iter()
                    .map(|e| ShapeEntry::new(e.shape().transformed(trans), e.prop_id())),
            );
        }
        for inst in c.instances.values() {
            for member in inst.members() {
                self.flatten_into(inst.child, layer, trans * member, out);
            }
        }
    }
}
