use std::collections::BTreeSet;

use geometry::prelude::*;
use layir::traverse::ShapeTraversal;
use layir::{CellInstArray, LayerId, LayerInfo, Layout, PropId, RegularArray};
use test_log::test;

use super::{fixture, flat_boxes, shadow_cell, split_fixture};
use crate::pipeline::{ClippingStage, InsertionStage, Next};
use crate::{DeepError, HierarchyBuilder, Phase};

fn target() -> (Layout, LayerId) {
    let mut out = Layout::new();
    let layer = out.insert_layer(LayerInfo::new(1, 0));
    (out, layer)
}

#[test]
fn mirrors_the_source_hierarchy() {
    let f = fixture();
    let (mut out, layer) = target();
    let mut builder = HierarchyBuilder::new();
    builder.set_target_layer(layer);

    builder
        .run(
            &ShapeTraversal::new(&f.layout, f.top, f.la),
            &mut out,
            &mut InsertionStage::new(),
        )
        .unwrap();

    assert_eq!(builder.phase(), Phase::Idle);
    assert_eq!(out.cell_count(), 3);
    let top = builder.initial_cell().unwrap();
    assert_eq!(top, shadow_cell(&out, "top"));
    assert_eq!(out.cell(top).instances().count(), 2);
    assert_eq!(
        flat_boxes(&out, top, layer),
        flat_boxes(&f.layout, f.top, f.la)
    );
    assert_eq!(builder.cell_map().count(), 3);
}

#[test]
fn second_pass_fills_existing_cells() {
    let f = fixture();
    let mut out = Layout::new();
    let la = out.insert_layer(LayerInfo::new(1, 0));
    let lb = out.insert_layer(LayerInfo::new(2, 0));
    let mut builder = HierarchyBuilder::new();

    builder.set_target_layer(la);
    builder
        .run(
            &ShapeTraversal::new(&f.layout, f.top, f.la),
            &mut out,
            &mut InsertionStage::new(),
        )
        .unwrap();
    builder.set_target_layer(lb);
    builder
        .run(
            &ShapeTraversal::new(&f.layout, f.top, f.lb),
            &mut out,
            &mut InsertionStage::new(),
        )
        .unwrap();

    let top = builder.initial_cell().unwrap();
    assert_eq!(out.cell_count(), 3);
    assert_eq!(out.cell(top).instances().count(), 2);
    assert_eq!(
        out.cell(shadow_cell(&out, "a")).instances().count(),
        1
    );
    assert_eq!(flat_boxes(&out, top, la), flat_boxes(&f.layout, f.top, f.la));
    assert_eq!(flat_boxes(&out, top, lb), flat_boxes(&f.layout, f.top, f.lb));
}

#[test]
fn second_pass_places_cells_the_first_pass_pruned() {
    let f = split_fixture();
    let mut out = Layout::new();
    let la = out.insert_layer(LayerInfo::new(1, 0));
    let lb = out.insert_layer(LayerInfo::new(2, 0));
    let mut builder = HierarchyBuilder::new();

    builder.set_target_layer(la);
    builder
        .run(
            &ShapeTraversal::new(&f.layout, f.top, f.la),
            &mut out,
            &mut InsertionStage::new(),
        )
        .unwrap();
    assert_eq!(out.cell_count(), 2);

    builder.set_target_layer(lb);
    builder
        .run(
            &ShapeTraversal::new(&f.layout, f.top, f.lb),
            &mut out,
            &mut InsertionStage::new(),
        )
        .unwrap();

    let top = builder.initial_cell().unwrap();
    assert_eq!(out.cell_count(), 3);
    assert_eq!(out.cell(top).instances().count(), 2);
    assert_eq!(out.cell(shadow_cell(&out, "a")).instances().count(), 1);
    assert_eq!(flat_boxes(&out, top, la), flat_boxes(&f.layout, f.top, f.la));
    assert_eq!(flat_boxes(&out, top, lb), flat_boxes(&f.layout, f.top, f.lb));
    assert_eq!(out.flat_shape_count(top, lb), 2);
}

#[test]
fn line_like_cells_in_partly_clipped_arrays_are_kept() {
    let mut layout = Layout::new();
    let layer = layout.insert_layer(LayerInfo::new(1, 0));
    let e = layout.add_cell("e");
    let top = layout.add_cell("top");
    layout
        .insert_shape(
            e,
            layer,
            Edge::new(Point::new(0, 5), Point::new(30, 5)),
            PropId::NONE,
        )
        .unwrap();
    layout
        .add_instance(
            top,
            CellInstArray::regular(
                e,
                Transformation::identity(),
                RegularArray::new(Point::new(100, 0), Point::new(0, 0), 2, 1),
            ),
        )
        .unwrap();

    let (mut out, target) = target();
    let mut builder = HierarchyBuilder::new();
    builder.set_target_layer(target);
    let traversal =
        ShapeTraversal::new(&layout, top, layer).region(Rect::from_sides(-10, -10, 50, 50));
    let mut pipe = ClippingStage::new(Next::owned(InsertionStage::new()));
    builder.run(&traversal, &mut out, &mut pipe).unwrap();

    let shadow_top = builder.initial_cell().unwrap();
    assert_eq!(out.cell(shadow_top).instances().count(), 1);
    assert_eq!(
        flat_boxes(&out, shadow_top, target),
        vec![Rect::from_sides(0, 5, 30, 5)]
    );
}

#[test]
fn clipped_placements_get_their_own_variants() {
    let mut layout = Layout::new();
    let layer = layout.insert_layer(LayerInfo::new(1, 0));
    let c = layout.add_cell("c");
    let top = layout.add_cell("top");
    layout
        .insert_shape(c, layer, Rect::from_sides(0, 0, 100, 10), PropId::NONE)
        .unwrap();
    layout
        .add_instance(top, CellInstArray::new(c, Transformation::identity()))
        .unwrap();
    layout
        .add_instance(top, CellInstArray::new(c, Transformation::translate(20, 30)))
        .unwrap();

    let (mut out, target) = target();
    let mut builder = HierarchyBuilder::new();
    builder.set_target_layer(target);
    let traversal =
        ShapeTraversal::new(&layout, top, layer).region(Rect::from_sides(50, -10, 200, 50));
    let mut pipe = ClippingStage::new(Next::owned(InsertionStage::new()));
    builder.run(&traversal, &mut out, &mut pipe).unwrap();

    assert_eq!(out.cell_count(), 3);
    let local: BTreeSet<Rect> = ["c$CLIP_VAR", "c$CLIP_VAR_1"]
        .into_iter()
        .flat_map(|name| {
            let cell = shadow_cell(&out, name);
            let shapes = out.shapes(cell, target).unwrap();
            assert_eq!(shapes.len(), 1);
            shapes.iter().filter_map(|e| e.shape().bbox()).collect::<Vec<_>>()
        })
        .collect();
    assert_eq!(
        local,
        BTreeSet::from([
            Rect::from_sides(50, 0, 100, 10),
            Rect::from_sides(30, 0, 100, 10),
        ])
    );
    assert_eq!(
        flat_boxes(&out, builder.initial_cell().unwrap(), target),
        vec![
            Rect::from_sides(50, 0, 100, 10),
            Rect::from_sides(50, 30, 120, 40),
        ]
    );
    assert!(builder
        .cell_map()
        .all(|(key, _)| key.original_cell == top || !key.clip_region.is_empty()));
}

#[test]
fn passes_over_another_hierarchy_need_a_reset() {
    let f = fixture();
    let (mut out, layer) = target();
    let mut builder = HierarchyBuilder::new();
    builder.set_target_layer(layer);
    builder
        .run(
            &ShapeTraversal::new(&f.layout, f.top, f.la),
            &mut out,
            &mut InsertionStage::new(),
        )
        .unwrap();

    let clipped =
        ShapeTraversal::new(&f.layout, f.top, f.la).region(Rect::from_sides(0, 0, 50, 50));
    let result = builder.run(&clipped, &mut out, &mut InsertionStage::new());
    assert!(matches!(result, Err(DeepError::IncompatiblePass)));
    assert_eq!(builder.phase(), Phase::Idle);

    builder.reset();
    assert!(builder.initial_cell().is_none());
    let (mut fresh, fresh_layer) = target();
    builder.set_target_layer(fresh_layer);
    builder
        .run(&clipped, &mut fresh, &mut InsertionStage::new())
        .unwrap();
    assert!(builder.source().is_some());
    assert!(fresh.has_cell(builder.initial_cell().unwrap()));
}

#[test]
fn unselected_cells_become_disabled_variants() {
    let f = fixture();
    let (mut out, layer) = target();
    let mut builder = HierarchyBuilder::new();
    builder.set_target_layer(layer);
    let traversal = ShapeTraversal::new(&f.layout, f.top, f.la).unselect_cells([f.a]);
    builder
        .run(&traversal, &mut out, &mut InsertionStage::new())
        .unwrap();

    let a_dis = shadow_cell(&out, "a$DIS");
    let b_dis = shadow_cell(&out, "b$DIS");
    let b = shadow_cell(&out, "b");
    assert_eq!(out.cell(a_dis).shape_count(layer), 0);
    assert_eq!(out.cell(b_dis).shape_count(layer), 0);
    assert_eq!(out.cell(b).shape_count(layer), 1);
    assert_eq!(
        out.flat_shape_count(builder.initial_cell().unwrap(), layer),
        2
    );
}

#[test]
fn builder_transformation_moves_everything() {
    let f = fixture();
    let (mut out, layer) = target();
    let mut builder = HierarchyBuilder::new();
    builder.set_target_layer(layer);
    builder.set_trans(Transformation::translate(1000, 0));
    builder
        .run(
            &ShapeTraversal::new(&f.layout, f.top, f.la),
            &mut out,
            &mut InsertionStage::new(),
        )
        .unwrap();

    let expected: Vec<Rect> = flat_boxes(&f.layout, f.top, f.la)
        .into_iter()
        .map(|r| r.transform(Transformation::translate(1000, 0)))
        .collect();
    assert_eq!(flat_boxes(&out, builder.initial_cell().unwrap(), layer), expected);
}

#[test]
fn source_properties_are_translated() {
    let mut layout = Layout::new();
    let layer = layout.insert_layer(LayerInfo::new(1, 0));
    let top = layout.add_cell("top");
    let props = layout
        .properties_mut()
        .properties_id([(arcstr::literal!("net"), layir::PropValue::Int(3))].into());
    layout
        .insert_shape(top, layer, Rect::from_sides(0, 0, 5, 5), props)
        .unwrap();

    let (mut out, target) = target();
    // Occupy the first ID so the translated one differs.
    out.properties_mut()
        .properties_id([(arcstr::literal!("other"), layir::PropValue::Int(0))].into());
    let mut builder = HierarchyBuilder::new();
    builder.set_target_layer(target);
    builder
        .run(
            &ShapeTraversal::new(&layout, top, layer),
            &mut out,
            &mut InsertionStage::new(),
        )
        .unwrap();

    let shadow = builder.initial_cell().unwrap();
    let entry = out.shapes(shadow, target).unwrap().iter().next().unwrap();
    assert_ne!(entry.prop_id(), props);
    let set = out.properties().properties(entry.prop_id()).unwrap();
    assert_eq!(set.get("net"), Some(&layir::PropValue::Int(3)));
}
