//! Cell mappings between shadow layouts and the layouts they are copied into.

use std::collections::BTreeSet;
use std::sync::Arc;

use geometry::prelude::*;
use layir::mapping::{copy_shapes, CellMapping};
use layir::{CellId, LayerId, LayirError, Layout};

use super::{DeepShapeStore, StoreData};

/// Layout index, target layout, target cell, and the excluded and included
/// cells the missing mapping was built with.
pub(crate) type OriginalMappingKey = (
    usize,
    layir::LayoutId,
    CellId,
    Option<BTreeSet<CellId>>,
    Option<BTreeSet<CellId>>,
);
use crate::error::{DeepError, Result};
use crate::layer::DeepLayer;

impl StoreData {
    pub(crate) fn mapping_to_original(
        &mut self,
        index: usize,
        into: &mut Layout,
        into_cell: CellId,
        excluded: Option<&BTreeSet<CellId>>,
        included: Option<&BTreeSet<CellId>>,
    ) -> Result<Arc<CellMapping>> {
        let key = (index, into.id(), into_cell, excluded.cloned(), included.cloned());
        let slot = self.slot(index)?;
        if let Some(mapping) = self.to_original.get(&key) {
            if mapping.is_valid(into, &slot.layout) {
                return Ok(mapping.clone());
            }
        }
        if !into.has_cell(into_cell) {
            return Err(LayirError::NoSuchCell(into_cell).into());
        }
        let from = &slot.layout;
        let from_top = slot
            .initial_cell
            .ok_or(DeepError::InvalidLayoutIndex(index))?;
        let builder = &slot.builder;

        let mut mapping = CellMapping::new();
        let from_source = builder.trans().is_unity()
            && builder.source().is_some_and(|source| {
                source.layout() == into.id()
                    && source.top() == into_cell
                    && source.global_trans().is_unity()
            });
        if from_source {
            // Shadow cells that mirror an original cell one to one map back
            // to it; clip and inactive variants become new cells.
            mapping.map(from_top, into_cell);
            for (key, shadow) in builder.cell_map() {
                if shadow == from_top
                    || key.inactive
                    || !key.clip_region.is_empty()
                    || builder.is_variant(shadow)
                    || !into.has_cell(key.original_cell)
                {
                    continue;
                }
                mapping.map(shadow, key.original_cell);
            }
        } else if into.cell_count() == 1 {
            mapping.create_single_mapping(into_cell, from_top);
        } else {
            mapping.create_from_names(into, into_cell, from, from_top);
        }

        let created = mapping.create_missing_mapping(into, from, from_top, excluded, included)?;
        mapping.stamp(into, from);
        tracing::debug!(
            layout = index,
            into = %into.id(),
            created = created.len(),
            "built cell mapping into original layout"
        );

        let mapping = Arc::new(mapping);
        self.to_original.insert(key, mapping.clone());
        Ok(mapping)
    }

    pub(crate) fn internal_mapping(
        &mut self,
        into_index: usize,
        from_index: usize,
    ) -> Result<Arc<CellMapping>> {
        let key = (into_index, from_index);
        {
            let into = &self.slot(into_index)?.layout;
            let from = &self.slot(from_index)?.layout;
            if let Some(mapping) = self.internal.get(&key) {
                if mapping.is_valid(into, from) {
                    return Ok(mapping.clone());
                }
            }
        }

        let mut mapping = CellMapping::new();
        if into_index == from_index {
            let layout = &self.slot(into_index)?.layout;
            for (cell, _) in layout.cells() {
                mapping.map(cell, cell);
            }
            mapping.stamp(layout, layout);
        } else {
            let into_top = self.initial_cell(into_index)?;
            let from_top = self.initial_cell(from_index)?;
            let (into, from) = self.slot_pair_mut(into_index, from_index)?;
            mapping.create_from_names(&into.layout, into_top, &from.layout, from_top);
            mapping.create_missing_mapping(&mut into.layout, &from.layout, from_top, None, None)?;
            mapping.stamp(&into.layout, &from.layout);
        }
        tracing::debug!(into = into_index, from = from_index, "built internal cell mapping");

        let mapping = Arc::new(mapping);
        self.internal.insert(key, mapping.clone());
        Ok(mapping)
    }

    /// Copies a shadow layer into an external layout.
    fn insert_into(
        &mut self,
        index: usize,
        layer: LayerId,
        into: &mut Layout,
        into_cell: CellId,
        into_layer: LayerId,
        convert: &mut dyn FnMut(&Shape) -> Vec<Shape>,
    ) -> Result<usize> {
        self.check_layer(index, layer)?;
        if !into.has_layer(into_layer) {
            return Err(LayirError::NoSuchLayer(into_layer).into());
        }
        let mapping = self.mapping_to_original(index, into, into_cell, None, None)?;
        let from_top = self.initial_cell(index)?;
        let from = &self.slot(index)?.layout;
        let count = copy_shapes(into, from, from_top, &mapping, layer, into_layer, convert)?;
        tracing::debug!(layout = index, %layer, count, "inserted deep layer");
        Ok(count)
    }

    /// Appends the shapes of one shadow layer to another.
    pub(crate) fn add_layer(
        &mut self,
        into_index: usize,
        into_layer: LayerId,
        from_index: usize,
        from_layer: LayerId,
    ) -> Result<()> {
        self.check_layer(into_index, into_layer)?;
        self.check_layer(from_index, from_layer)?;
        if into_index == from_index {
            self.slot_mut(into_index)?
                .layout
                .copy_layer(from_layer, into_layer)?;
            return Ok(());
        }

        let mapping = self.internal_mapping(into_index, from_index)?;
        let from_top = self.initial_cell(from_index)?;
        let (into, from) = self.slot_pair_mut(into_index, from_index)?;
        copy_shapes(
            &mut into.layout,
            &from.layout,
            from_top,
            &mapping,
            from_layer,
            into_layer,
            &mut |shape| vec![shape.clone()],
        )?;
        Ok(())
    }
}

impl DeepShapeStore {
    /// A mapping from the cells of a shadow layout to the cells of `into`.
    ///
    /// If `into` is the layout the shadow layout was built from and
    /// `into_cell` the traversal's top cell, shadow cells map back to their
    /// original cells. Otherwise a single-cell `into` receives the shadow top
    /// cell, and larger layouts are matched by cell name. Shadow cells
    /// without counterpart are created in `into`, together with the
    /// instances placing them. `excluded` and `included` restrict which
    /// shadow cells are created.
    ///
    /// Mappings are cached per argument set, including `excluded` and
    /// `included`. As long as neither hierarchy changes, repeated calls with
    /// the same arguments return the same mapping.
    pub fn cell_mapping_to_original(
        &self,
        layout: usize,
        into: &mut Layout,
        into_cell: CellId,
        excluded: Option<&BTreeSet<CellId>>,
        included: Option<&BTreeSet<CellId>>,
    ) -> Result<Arc<CellMapping>> {
        self.lock()
            .mapping_to_original(layout, into, into_cell, excluded, included)
    }

    /// A mapping from the cells of shadow layout `from` to those of shadow
    /// layout `into`, creating missing cells in `into`.
    pub fn internal_cell_mapping(&self, into: usize, from: usize) -> Result<Arc<CellMapping>> {
        self.lock().internal_mapping(into, from)
    }

    /// Copies the shapes of `layer` into `into_layer` of an external layout.
    ///
    /// Returns the number of shapes inserted.
    pub fn insert(
        &self,
        layer: &DeepLayer,
        into: &mut Layout,
        into_cell: CellId,
        into_layer: LayerId,
    ) -> Result<usize> {
        self.check_owner(layer)?;
        self.lock().insert_into(
            layer.layout_index(),
            layer.layer(),
            into,
            into_cell,
            into_layer,
            &mut |shape| vec![shape.clone()],
        )
    }

    /// Like [`insert`](Self::insert), but stores edge pairs as polygons,
    /// enlarged by `enlargement`. Edges and texts are left out.
    pub fn insert_as_polygons(
        &self,
        layer: &DeepLayer,
        into: &mut Layout,
        into_cell: CellId,
        into_layer: LayerId,
        enlargement: i64,
    ) -> Result<usize> {
        self.check_owner(layer)?;
        self.lock().insert_into(
            layer.layout_index(),
            layer.layer(),
            into,
            into_cell,
            into_layer,
            &mut |shape| match shape {
                Shape::EdgePair(pair) => pair
                    .to_polygon(enlargement)
                    .map(Shape::Polygon)
                    .into_iter()
                    .collect(),
                shape if shape.is_polygonal() => vec![shape.clone()],
                _ => Vec::new(),
            },
        )
    }

    pub(crate) fn check_owner(&self, layer: &DeepLayer) -> Result<()> {
        layer.check_valid()?;
        if layer.store_id() == self.id() {
            Ok(())
        } else {
            tracing::error!(
                store = %self.id(),
                owner = %layer.store_id(),
                "layer belongs to a different store"
            );
            Err(DeepError::InvalidLayer {
                layout: layer.layout_index(),
                layer: layer.layer(),
            })
        }
    }
}
