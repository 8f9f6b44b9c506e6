use geometry::prelude::*;
use layir::traverse::ShapeTraversal;
use layir::{CellId, CellInstArray, LayerId, LayerInfo, Layout, PropId, RegularArray};
use test_log::test;

use super::{fixture, flat_boxes, shadow_cell};
use crate::{DeepLayer, DeepShapeStore};

fn shadow_boxes(layer: &DeepLayer) -> Vec<Rect> {
    let top = layer.initial_cell().unwrap();
    layer.with_layout(|l, id| flat_boxes(l, top, id)).unwrap()
}

fn output(name: &str) -> (Layout, CellId, LayerId) {
    let mut out = Layout::new();
    let top = out.add_cell(name);
    let layer = out.insert_layer(LayerInfo::new(100, 0));
    (out, top, layer)
}

#[test]
fn layers_round_trip_through_a_shared_layout() {
    let f = fixture();
    let store = DeepShapeStore::new();
    let a = store
        .create_polygon_layer(
            &ShapeTraversal::new(&f.layout, f.top, f.la),
            0.,
            0,
            Transformation::identity(),
        )
        .unwrap();
    let b = store
        .create_polygon_layer(
            &ShapeTraversal::new(&f.layout, f.top, f.lb),
            0.,
            0,
            Transformation::identity(),
        )
        .unwrap();
    assert_eq!(a.layout_index(), b.layout_index());
    assert_eq!(store.layout_count(), 1);

    let (mut out, top, la) = output("top");
    let lb = out.insert_layer(LayerInfo::new(101, 0));
    a.insert_into(&mut out, top, la).unwrap();
    b.insert_into(&mut out, top, lb).unwrap();

    assert_eq!(out.cell_count(), 3);
    assert_eq!(out.cell(top).instances().count(), 2);
    assert_eq!(out.cell(shadow_cell(&out, "a")).instances().count(), 1);
    assert_eq!(flat_boxes(&out, top, la), flat_boxes(&f.layout, f.top, f.la));
    assert_eq!(flat_boxes(&out, top, lb), flat_boxes(&f.layout, f.top, f.lb));
    assert_eq!(
        out.flat_shape_count(top, la) + out.flat_shape_count(top, lb),
        8
    );
}

#[test]
fn clip_regions_get_separate_layouts() {
    let mut layout = Layout::new();
    let layer = layout.insert_layer(LayerInfo::new(1, 0));
    let c = layout.add_cell("c");
    let top = layout.add_cell("top");
    for rect in [
        Rect::from_sides(0, 0, 40, 10),
        Rect::from_sides(60, 0, 100, 10),
    ] {
        layout.insert_shape(c, layer, rect, PropId::NONE).unwrap();
    }
    layout
        .add_instance(top, CellInstArray::new(c, Transformation::identity()))
        .unwrap();

    let store = DeepShapeStore::new();
    let mut total = 0;
    let mut indices = Vec::new();
    for region in [
        Rect::from_sides(-10, -10, 50, 20),
        Rect::from_sides(50, -10, 110, 20),
    ] {
        let deep = store
            .create_polygon_layer(
                &ShapeTraversal::new(&layout, top, layer).region(region),
                0.,
                0,
                Transformation::identity(),
            )
            .unwrap();
        deep.with_layout(|l, id| {
            let variant = shadow_cell(l, "c$CLIP_VAR");
            assert_eq!(l.cell(variant).shape_count(id), 1);
        })
        .unwrap();
        total += deep.flat_shape_count().unwrap();
        indices.push(deep.layout_index());
    }
    assert_ne!(indices[0], indices[1]);
    assert_eq!(total, layout.flat_shape_count(top, layer));
}

#[test]
fn global_transformation_applies_to_the_whole_tree() {
    let f = fixture();
    let store = DeepShapeStore::new();
    let rot = Transformation::rotate(Rotation::R90);
    let deep = store
        .create_polygon_layer(
            &ShapeTraversal::new(&f.layout, f.top, f.la).global_trans(rot),
            0.,
            0,
            Transformation::identity(),
        )
        .unwrap();
    let plain = store
        .create_polygon_layer(
            &ShapeTraversal::new(&f.layout, f.top, f.la),
            0.,
            0,
            Transformation::identity(),
        )
        .unwrap();
    assert_ne!(deep.layout_index(), plain.layout_index());

    let mut expected: Vec<Rect> = flat_boxes(&f.layout, f.top, f.la)
        .into_iter()
        .map(|r| r.transform(rot))
        .collect();
    expected.sort();
    assert_eq!(shadow_boxes(&deep), expected);
    assert_eq!(shadow_boxes(&plain), flat_boxes(&f.layout, f.top, f.la));
}

/// A cell `c` with a box, a text and an edge pair on three layers, placed
/// twice in `top`.
struct Mixed {
    layout: Layout,
    top: CellId,
    boxes: LayerId,
    texts: LayerId,
    pairs: LayerId,
}

fn mixed() -> Mixed {
    let mut layout = Layout::new();
    let boxes = layout.insert_layer(LayerInfo::new(1, 0));
    let texts = layout.insert_layer(LayerInfo::new(2, 0));
    let pairs = layout.insert_layer(LayerInfo::new(3, 0));
    let c = layout.add_cell("c");
    let top = layout.add_cell("top");
    layout
        .insert_shape(c, boxes, Rect::from_sides(0, 0, 10, 10), PropId::NONE)
        .unwrap();
    layout
        .insert_shape(c, texts, Text::at("A", Point::new(5, 5)), PropId::NONE)
        .unwrap();
    layout
        .insert_shape(
            c,
            pairs,
            EdgePair::new(
                Edge::new(Point::new(0, 0), Point::new(10, 0)),
                Edge::new(Point::new(10, 4), Point::new(0, 4)),
            ),
            PropId::NONE,
        )
        .unwrap();
    for offset in [Point::new(100, 0), Point::new(0, 100)] {
        layout
            .add_instance(
                top,
                CellInstArray::new(c, Transformation::translate(offset.x, offset.y)),
            )
            .unwrap();
    }
    Mixed {
        layout,
        top,
        boxes,
        texts,
        pairs,
    }
}

#[test]
fn edge_layers_hold_contours() {
    let m = mixed();
    let store = DeepShapeStore::new();
    let traversal = ShapeTraversal::new(&m.layout, m.top, m.boxes);
    let contours = store
        .create_edge_layer(&traversal, true, Transformation::identity())
        .unwrap();
    let plain = store
        .create_edge_layer(&traversal, false, Transformation::identity())
        .unwrap();

    assert_ne!(contours.layer(), plain.layer());
    assert_eq!(contours.layout_index(), plain.layout_index());
    assert_eq!(contours.flat_shape_count().unwrap(), 8);
    assert_eq!(plain.flat_shape_count().unwrap(), 0);
    contours
        .with_layout(|l, id| {
            let c = shadow_cell(l, "c");
            assert!(l
                .shapes(c, id)
                .unwrap()
                .iter()
                .all(|e| e.shape().kind() == ShapeKind::Edge));
        })
        .unwrap();
}

#[test]
fn text_layers_keep_texts() {
    let m = mixed();
    let store = DeepShapeStore::new();
    let texts = store
        .create_text_layer(
            &ShapeTraversal::new(&m.layout, m.top, m.texts),
            Transformation::identity(),
        )
        .unwrap();
    assert_eq!(texts.flat_shape_count().unwrap(), 2);

    let (mut out, top, layer) = output("out");
    assert_eq!(texts.insert_into(&mut out, top, layer).unwrap(), 1);
    let flat = out.flatten(top, layer);
    assert_eq!(flat.len(), 2);
    assert!(flat.iter().all(|e| e.shape().kind() == ShapeKind::Text));
}

#[test]
fn edge_pairs_insert_as_polygons() {
    let m = mixed();
    let store = DeepShapeStore::new();
    let pairs = store
        .create_edge_pair_layer(
            &ShapeTraversal::new(&m.layout, m.top, m.pairs),
            Transformation::identity(),
        )
        .unwrap();
    assert_eq!(pairs.flat_shape_count().unwrap(), 2);

    let (mut out, top, layer) = output("out");
    let inserted = store
        .insert_as_polygons(&pairs, &mut out, top, layer, 1)
        .unwrap();
    assert_eq!(inserted, 1);
    let mut expected = vec![
        Rect::from_sides(99, -1, 111, 5),
        Rect::from_sides(-1, 99, 11, 105),
    ];
    expected.sort();
    assert_eq!(flat_boxes(&out, top, layer), expected);
    assert!(out
        .flatten(top, layer)
        .iter()
        .all(|e| e.shape().kind() == ShapeKind::Polygon));

    // Polygon conversion drops what has no area.
    let edges = store
        .create_edge_layer(
            &ShapeTraversal::new(&m.layout, m.top, m.boxes),
            true,
            Transformation::identity(),
        )
        .unwrap();
    let other = out.insert_layer(LayerInfo::new(101, 0));
    assert_eq!(
        store
            .insert_as_polygons(&edges, &mut out, top, other, 1)
            .unwrap(),
        0
    );
}

#[test]
fn layers_of_another_store_are_rejected() {
    let f = fixture();
    let first = DeepShapeStore::new();
    let second = DeepShapeStore::new();
    let deep = first
        .create_polygon_layer(
            &ShapeTraversal::new(&f.layout, f.top, f.la),
            0.,
            0,
            Transformation::identity(),
        )
        .unwrap();
    let (mut out, top, layer) = output("out");
    assert!(matches!(
        second.insert(&deep, &mut out, top, layer),
        Err(crate::DeepError::InvalidLayer { .. })
    ));
}

#[test]
fn texts_in_partly_clipped_arrays_survive() {
    let mut layout = Layout::new();
    let layer = layout.insert_layer(LayerInfo::new(1, 0));
    let t = layout.add_cell("t");
    let top = layout.add_cell("top");
    layout
        .insert_shape(t, layer, Text::at("PIN", Point::new(5, 5)), PropId::NONE)
        .unwrap();
    layout
        .add_instance(
            top,
            CellInstArray::regular(
                t,
                Transformation::identity(),
                RegularArray::new(Point::new(100, 0), Point::new(0, 0), 2, 1),
            ),
        )
        .unwrap();

    let store = DeepShapeStore::new();
    let texts = store
        .create_text_layer(
            &ShapeTraversal::new(&layout, top, layer).region(Rect::from_sides(-10, -10, 50, 50)),
            Transformation::identity(),
        )
        .unwrap();
    assert_eq!(texts.flat_shape_count().unwrap(), 1);
    assert_eq!(shadow_boxes(&texts), vec![Rect::from_point(Point::new(5, 5))]);
}
