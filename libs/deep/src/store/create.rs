use arcstr::ArcStr;
use geometry::prelude::*;
use layir::traverse::ShapeTraversal;
use layir::{LayerInfo, PropId};

use super::{DeepShapeStore, LayerKey, LayerKind, LayoutKey, LayoutSlot, Released, SimplifyKey};
use crate::diagnostics::IssueSet;
use crate::error::{DeepError, Result};
use crate::flat::FlatSource;
use crate::layer::DeepLayer;
use crate::pipeline::{
    ClippingStage, EdgePairStage, EdgeStage, Next, PolygonRefStage, ReductionStage, ShapeReceiver,
    TextStage,
};

/// Describes a layer request for deduplication.
struct LayerRequest {
    kind: LayerKind,
    text_property_name: Option<ArcStr>,
}

impl DeepShapeStore {
    /// Creates a polygon layer from the shapes a traversal finds.
    ///
    /// Shapes are clipped to the traversal's region, split until they satisfy
    /// the reduction limits and stored as polygon references. A zero limit
    /// falls back to the store configuration. Texts become labelled boxes if
    /// the store's text enlargement is non-negative.
    pub fn create_polygon_layer(
        &self,
        traversal: &ShapeTraversal<'_>,
        max_area_ratio: f64,
        max_vertex_count: usize,
        trans: Transformation,
    ) -> Result<DeepLayer> {
        let state = self.state();
        let max_area_ratio = if max_area_ratio > 0. {
            max_area_ratio
        } else {
            state.max_area_ratio()
        };
        let max_vertex_count = if max_vertex_count > 0 {
            max_vertex_count
        } else {
            state.max_vertex_count()
        };
        let text_property_name = state.text_property_name().cloned();

        let mut pipe = ClippingStage::new(Next::owned(ReductionStage::new(
            Next::owned(PolygonRefStage::new(
                state.text_enlargement(),
                text_property_name.clone(),
            )),
            max_area_ratio,
            max_vertex_count,
            state.reject_odd_polygons(),
        )));
        let request = LayerRequest {
            kind: LayerKind::Polygons {
                reject_odd_polygons: state.reject_odd_polygons(),
                text_enlargement: state.text_enlargement(),
            },
            text_property_name,
        };
        self.build_layer(
            traversal,
            SimplifyKey::new(max_vertex_count, max_area_ratio),
            trans,
            Some(request),
            &mut pipe,
        )
    }

    /// Creates an edge layer. With `as_edges`, polygons and boxes contribute
    /// their contours.
    pub fn create_edge_layer(
        &self,
        traversal: &ShapeTraversal<'_>,
        as_edges: bool,
        trans: Transformation,
    ) -> Result<DeepLayer> {
        let request = LayerRequest {
            kind: LayerKind::Edges { as_edges },
            text_property_name: None,
        };
        self.build_layer(
            traversal,
            self.default_simplify_key(),
            trans,
            Some(request),
            &mut EdgeStage::new(as_edges),
        )
    }

    pub fn create_edge_pair_layer(
        &self,
        traversal: &ShapeTraversal<'_>,
        trans: Transformation,
    ) -> Result<DeepLayer> {
        let request = LayerRequest {
            kind: LayerKind::EdgePairs,
            text_property_name: None,
        };
        self.build_layer(
            traversal,
            self.default_simplify_key(),
            trans,
            Some(request),
            &mut EdgePairStage::new(),
        )
    }

    pub fn create_text_layer(
        &self,
        traversal: &ShapeTraversal<'_>,
        trans: Transformation,
    ) -> Result<DeepLayer> {
        let request = LayerRequest {
            kind: LayerKind::Texts,
            text_property_name: None,
        };
        self.build_layer(
            traversal,
            self.default_simplify_key(),
            trans,
            Some(request),
            &mut TextStage::new(),
        )
    }

    /// Creates a layer filled by a caller-supplied stage.
    ///
    /// Shapes are clipped before they reach `stage`. Custom layers are never
    /// shared between requests.
    pub fn create_custom_layer(
        &self,
        traversal: &ShapeTraversal<'_>,
        stage: &mut dyn ShapeReceiver,
        trans: Transformation,
    ) -> Result<DeepLayer> {
        let mut pipe = ClippingStage::new(Next::Borrowed(stage));
        self.build_layer(traversal, self.default_simplify_key(), trans, None, &mut pipe)
    }

    fn default_simplify_key(&self) -> SimplifyKey {
        let data = self.lock();
        SimplifyKey::new(data.state.max_vertex_count(), data.state.max_area_ratio())
    }

    fn build_layer(
        &self,
        traversal: &ShapeTraversal<'_>,
        simplify: SimplifyKey,
        trans: Transformation,
        request: Option<LayerRequest>,
        pipe: &mut dyn ShapeReceiver,
    ) -> Result<DeepLayer> {
        let source = traversal.layout();
        let top = traversal.top();
        if !source.has_cell(top) {
            tracing::error!(%top, "source layout has no such top cell");
            return Err(DeepError::EmptySource(top));
        }

        let mut data = self.lock();
        let layout_key = LayoutKey {
            hierarchy: traversal.hierarchy_key(),
            source_generation: source.hier_generation(),
            simplify,
            trans,
        };
        let (index, new_layout) = match data.layout_map.get(&layout_key) {
            Some(&index) => (index, false),
            None => {
                let mut slot = LayoutSlot::new(Some(layout_key));
                slot.builder.set_trans(trans);
                (data.add_slot(slot), true)
            }
        };
        let _guard = tracing::span!(tracing::Level::DEBUG, "create layer", layout = index).entered();

        let breakout_cells = data
            .state
            .breakout_cells(index)
            .cloned()
            .unwrap_or_default();
        let layer_key = request.map(|request| LayerKey {
            layout: index,
            layers: traversal.layers().to_vec(),
            kind: request.kind,
            text_property_name: request.text_property_name,
            breakout_cells: breakout_cells.clone(),
            source: (
                source.id(),
                source.hier_generation(),
                source.shapes_generation(),
            ),
        });
        if let Some(&(index, layer)) = layer_key.as_ref().and_then(|k| data.layer_map.get(k)) {
            if data.check_layer(index, layer).is_ok() {
                data.add_ref(index, layer);
                tracing::debug!(layout = index, %layer, "reusing deep layer");
                return Ok(DeepLayer::adopt(self, index, layer));
            }
        }

        let info = match traversal.layers() {
            [single] => source.layer_info(*single).cloned().unwrap_or_default(),
            _ => LayerInfo::default(),
        };
        let slot = data.slot_mut(index)?;
        let layer = slot.layout.insert_layer(info);
        slot.builder.set_target_layer(layer);
        slot.builder.set_breakout_cells(breakout_cells);
        if let Err(err) = slot.builder.run(traversal, &mut slot.layout, pipe) {
            slot.layout.delete_layer(layer).ok();
            let released = if new_layout {
                data.release_layout(index)
            } else {
                Released::default()
            };
            drop(data);
            drop(released);
            return Err(err);
        }
        slot.initial_cell = slot.builder.initial_cell();
        *slot.refs.entry(layer).or_default() += 1;

        let mut issues = IssueSet::new();
        pipe.drain_issues(&mut issues);
        data.issues.append(&mut issues);
        if let Some(key) = layer_key {
            data.layer_map.insert(key, (index, layer));
        }
        tracing::debug!(layout = index, %layer, "created deep layer");
        Ok(DeepLayer::adopt(self, index, layer))
    }

    /// Ingests a flat collection into the top cell of a singular store.
    ///
    /// Polygons are reduced and stored as polygon references. With
    /// `for_netlist`, texts that did not come from the collection's top level
    /// are skipped. Ingesting the same unchanged collection again returns the
    /// same layer.
    pub fn create_from_flat(
        &self,
        source: &dyn FlatSource,
        for_netlist: bool,
        max_area_ratio: f64,
        max_vertex_count: usize,
        trans: Transformation,
    ) -> Result<DeepLayer> {
        let mut data = self.lock();
        let index = data.singular_index()?;
        let flat_key = (source.collection_id(), source.generation());
        if let Some(&(index, layer)) = data.flat_map.get(&flat_key) {
            if data.check_layer(index, layer).is_ok() {
                data.add_ref(index, layer);
                return Ok(DeepLayer::adopt(self, index, layer));
            }
        }

        let state = &data.state;
        let max_area_ratio = if max_area_ratio > 0. {
            max_area_ratio
        } else {
            state.max_area_ratio()
        };
        let max_vertex_count = if max_vertex_count > 0 {
            max_vertex_count
        } else {
            state.max_vertex_count()
        };
        let mut pipe = ReductionStage::new(
            Next::owned(PolygonRefStage::new(
                state.text_enlargement(),
                state.text_property_name().cloned(),
            )),
            max_area_ratio,
            max_vertex_count,
            state.reject_odd_polygons(),
        );

        let top = data.initial_cell(index)?;
        let slot = data.slot_mut(index)?;
        let layer = slot.layout.insert_layer(LayerInfo::default());
        let mut count = 0;
        {
            let mut target = slot.layout.shape_target(top, layer)?;
            for flat in source.shapes() {
                if for_netlist && !flat.top_level && flat.shape.kind() == ShapeKind::Text {
                    continue;
                }
                let prop_id = match source.properties() {
                    Some(properties) => target.properties_mut().translate(properties, flat.prop_id),
                    None => PropId::NONE,
                };
                pipe.push(&flat.shape, prop_id, trans, None, &[], &mut target);
                count += 1;
            }
        }
        *slot.refs.entry(layer).or_default() += 1;

        let mut issues = IssueSet::new();
        pipe.drain_issues(&mut issues);
        data.issues.append(&mut issues);
        data.flat_map.insert(flat_key, (index, layer));
        tracing::debug!(layout = index, %layer, shapes = count, "ingested flat collection");
        Ok(DeepLayer::adopt(self, index, layer))
    }
}
