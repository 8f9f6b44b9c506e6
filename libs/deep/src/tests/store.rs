use std::collections::BTreeSet;
use std::sync::Arc;

use arcstr::literal;
use geometry::prelude::*;
use layir::traverse::ShapeTraversal;
use layir::{LayerInfo, Layout, PropId, PropValue, PropertySet};
use test_log::test;

use super::{fixture, shadow_cell, split_fixture};
use crate::leak::LeakCheck;
use crate::{ContextId, DeepError, DeepShapeStore, FlatShapes, VariantMap};

#[test]
fn identical_requests_share_a_layer() {
    let f = fixture();
    let store = DeepShapeStore::new();
    let traversal = ShapeTraversal::new(&f.layout, f.top, f.la);
    let first = store
        .create_polygon_layer(&traversal, 0., 0, Transformation::identity())
        .unwrap();
    let second = store
        .create_polygon_layer(&traversal, 0., 0, Transformation::identity())
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(first.layout_index(), second.layout_index());
    assert_eq!(first.layer(), second.layer());
    assert_eq!(store.layer_refs(first.layout_index(), first.layer()), 2);
    assert_eq!(store.layout_count(), 1);

    // Another layer of the same hierarchy shares the layout.
    let other = store
        .create_polygon_layer(
            &ShapeTraversal::new(&f.layout, f.top, f.lb),
            0.,
            0,
            Transformation::identity(),
        )
        .unwrap();
    assert_eq!(other.layout_index(), first.layout_index());
    assert_ne!(other.layer(), first.layer());

    // Different simplification parameters need a layout of their own.
    let simplified = store
        .create_polygon_layer(&traversal, 0., 4, Transformation::identity())
        .unwrap();
    assert_ne!(simplified.layout_index(), first.layout_index());
}

#[test]
fn flat_shape_count_matches_source() {
    let f = fixture();
    let store = DeepShapeStore::new();
    for layer in [f.la, f.lb] {
        let deep = store
            .create_polygon_layer(
                &ShapeTraversal::new(&f.layout, f.top, layer),
                0.,
                0,
                Transformation::identity(),
            )
            .unwrap();
        assert_eq!(
            deep.flat_shape_count().unwrap(),
            f.layout.flat_shape_count(f.top, layer)
        );
    }
}

#[test]
fn layers_populating_different_cells_keep_their_counts() {
    let f = split_fixture();
    for order in [[f.la, f.lb], [f.lb, f.la]] {
        let store = DeepShapeStore::new();
        let layers: Vec<_> = order
            .into_iter()
            .map(|layer| {
                let deep = store
                    .create_polygon_layer(
                        &ShapeTraversal::new(&f.layout, f.top, layer),
                        0.,
                        0,
                        Transformation::identity(),
                    )
                    .unwrap();
                (layer, deep)
            })
            .collect();
        assert_eq!(store.layout_count(), 1);
        for (layer, deep) in &layers {
            assert_eq!(
                deep.flat_shape_count().unwrap(),
                f.layout.flat_shape_count(f.top, *layer)
            );
        }
    }
}

#[test]
fn stored_polygons_satisfy_reduction_limits() {
    let mut layout = Layout::new();
    let layer = layout.insert_layer(LayerInfo::new(1, 0));
    let top = layout.add_cell("top");
    let comb = Polygon::from_verts(vec![
        Point::new(0, 0),
        Point::new(100, 0),
        Point::new(100, 50),
        Point::new(80, 50),
        Point::new(80, 10),
        Point::new(60, 10),
        Point::new(60, 50),
        Point::new(40, 50),
        Point::new(40, 10),
        Point::new(20, 10),
        Point::new(20, 50),
        Point::new(0, 50),
    ]);
    layout.insert_shape(top, layer, comb, PropId::NONE).unwrap();

    let store = DeepShapeStore::new();
    let deep = store
        .create_polygon_layer(
            &ShapeTraversal::new(&layout, top, layer),
            2.,
            6,
            Transformation::identity(),
        )
        .unwrap();

    let polygons = deep
        .with_layout(|shadow, layer| {
            shadow
                .cells()
                .filter_map(|(_, cell)| cell.shapes(layer))
                .flat_map(|shapes| shapes.iter())
                .filter_map(|e| e.shape().to_polygon())
                .collect::<Vec<_>>()
        })
        .unwrap();
    assert!(polygons.len() > 1);
    let mut area = 0.;
    for polygon in &polygons {
        assert!(polygon.vertex_count() <= 6);
        assert!(polygon.area_ratio() <= 2.);
        area += polygon.area();
    }
    approx::assert_relative_eq!(area, 100. * 50. - 2. * 20. * 40.);
}

#[test]
fn push_pop_restores_state() {
    let store = DeepShapeStore::new();
    store.set_max_vertex_count(8);
    store.set_text_property_name(Some(literal!("label")));
    let before = store.state();

    store.push_state();
    store.set_threads(4);
    store.set_max_vertex_count(100);
    store.set_max_area_ratio(10.);
    store.set_reject_odd_polygons(true);
    store.set_text_enlargement(3);
    store.set_text_property_name(None);
    store.set_subcircuit_hierarchy_for_nets(true);
    store.add_breakout_cell(0, fixture().top);
    assert_ne!(store.state(), before);

    store.pop_state().unwrap();
    assert_eq!(store.state(), before);
    assert!(matches!(store.pop_state(), Err(DeepError::EmptyStateStack)));
}

#[test]
fn state_loads_from_toml() {
    let store = DeepShapeStore::new();
    let state =
        crate::DeepShapeStoreState::from_toml_str("max_vertex_count = 4\ntext_enlargement = 2\n")
            .unwrap();
    store.set_state(state);
    assert_eq!(store.max_vertex_count(), 4);
    assert_eq!(store.text_enlargement(), 2);
    assert_eq!(store.threads(), 1);
}

#[test]
fn cell_mapping_is_cached_until_an_edit() {
    let f = fixture();
    let store = DeepShapeStore::new();
    let deep = store
        .create_polygon_layer(
            &ShapeTraversal::new(&f.layout, f.top, f.la),
            0.,
            0,
            Transformation::identity(),
        )
        .unwrap();

    let mut out = Layout::new();
    let out_top = out.add_cell("out");
    let first = store
        .cell_mapping_to_original(deep.layout_index(), &mut out, out_top, None, None)
        .unwrap();
    let second = store
        .cell_mapping_to_original(deep.layout_index(), &mut out, out_top, None, None)
        .unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(out.cell_count(), 3);

    out.add_cell("unrelated");
    let third = store
        .cell_mapping_to_original(deep.layout_index(), &mut out, out_top, None, None)
        .unwrap();
    assert!(!Arc::ptr_eq(&first, &third));
    assert_eq!(third.len(), 3);
    assert_eq!(out.cell_count(), 4);
}

#[test]
fn cell_mapping_cache_tells_exclusion_sets_apart() {
    let f = fixture();
    let store = DeepShapeStore::new();
    let deep = store
        .create_polygon_layer(
            &ShapeTraversal::new(&f.layout, f.top, f.la),
            0.,
            0,
            Transformation::identity(),
        )
        .unwrap();
    let shadow_b = deep.with_layout(|l, _| shadow_cell(l, "b")).unwrap();

    let mut out = Layout::new();
    let out_top = out.add_cell("out");
    let excluded = BTreeSet::from([shadow_b]);
    let without_b = store
        .cell_mapping_to_original(deep.layout_index(), &mut out, out_top, Some(&excluded), None)
        .unwrap();
    assert_eq!(without_b.len(), 2);
    assert!(!without_b.has_mapping(shadow_b));

    let full = store
        .cell_mapping_to_original(deep.layout_index(), &mut out, out_top, None, None)
        .unwrap();
    assert!(!Arc::ptr_eq(&without_b, &full));
    assert!(full.has_mapping(shadow_b));
    assert_eq!(out.cell_count(), 3);
}

#[test]
fn insert_into_source_maps_back_to_original_cells() {
    let mut f = fixture();
    let store = DeepShapeStore::new();
    let deep = store
        .create_polygon_layer(
            &ShapeTraversal::new(&f.layout, f.top, f.la),
            0.,
            0,
            Transformation::identity(),
        )
        .unwrap();

    let copy = f.layout.insert_layer(LayerInfo::new(10, 0));
    let count = deep.insert_into(&mut f.layout, f.top, copy).unwrap();
    assert_eq!(count, 2);
    assert_eq!(f.layout.cell_count(), 3);
    assert_eq!(f.layout.cell(f.a).shape_count(copy), 1);
    assert_eq!(f.layout.cell(f.b).shape_count(copy), 1);
    assert_eq!(
        f.layout.flat_shape_count(f.top, copy),
        f.layout.flat_shape_count(f.top, f.la)
    );
}

#[test]
fn breakout_cells_lose_their_own_shapes() {
    let f = fixture();
    let store = DeepShapeStore::new();
    let traversal = ShapeTraversal::new(&f.layout, f.top, f.la);
    let full = store
        .create_polygon_layer(&traversal, 0., 0, Transformation::identity())
        .unwrap();
    let index = full.layout_index();
    let (shadow_a, shadow_b) = store
        .with_layout(index, |l| (shadow_cell(l, "a"), shadow_cell(l, "b")))
        .unwrap();

    store.add_breakout_cell(index, shadow_a);
    let broken = store
        .create_polygon_layer(&traversal, 0., 0, Transformation::identity())
        .unwrap();
    assert_eq!(broken.layout_index(), index);
    assert_ne!(broken.layer(), full.layer());

    store
        .with_layout(index, |l| {
            assert_eq!(l.cell(shadow_a).shape_count(broken.layer()), 0);
            assert_eq!(l.cell(shadow_b).shape_count(broken.layer()), 1);
        })
        .unwrap();
    assert_eq!(broken.flat_shape_count().unwrap(), 3);
    assert_eq!(full.flat_shape_count().unwrap(), 4);
}

#[test]
fn dropping_the_last_handle_releases_the_layout() {
    let f = fixture();
    let store = DeepShapeStore::new();
    let traversal = ShapeTraversal::new(&f.layout, f.top, f.la);

    let deep = store
        .create_polygon_layer(&traversal, 0., 0, Transformation::identity())
        .unwrap();
    let index = deep.layout_index();
    let clone = deep.clone();
    assert_eq!(store.layer_refs(index, deep.layer()), 2);
    drop(deep);
    assert!(store.is_valid_layout_index(index));
    drop(clone);
    assert!(!store.is_valid_layout_index(index));
    assert_eq!(store.layout_count(), 0);

    let fresh = store
        .create_polygon_layer(&traversal, 0., 0, Transformation::identity())
        .unwrap();
    assert_ne!(fresh.layout_index(), index);
}

#[test]
fn kept_layouts_survive_until_released() {
    let f = fixture();
    let store = DeepShapeStore::new();
    store.set_keep_layouts(true);
    let deep = store
        .create_polygon_layer(
            &ShapeTraversal::new(&f.layout, f.top, f.la),
            0.,
            0,
            Transformation::identity(),
        )
        .unwrap();
    let (index, layer) = (deep.layout_index(), deep.layer());
    drop(deep);
    assert!(store.is_valid_layout_index(index));
    assert!(store.with_layout(index, |l| l.has_layer(layer)).unwrap());

    store.set_keep_layouts(false);
    assert!(!store.is_valid_layout_index(index));
}

#[test]
fn handles_detect_a_dropped_store() {
    let f = fixture();
    let store = DeepShapeStore::new();
    let deep = store
        .create_polygon_layer(
            &ShapeTraversal::new(&f.layout, f.top, f.la),
            0.,
            0,
            Transformation::identity(),
        )
        .unwrap();
    assert!(deep.is_valid());
    drop(store);

    assert!(!deep.is_valid());
    assert!(matches!(deep.check_valid(), Err(DeepError::StoreGone)));
    assert!(matches!(deep.flat_shape_count(), Err(DeepError::StoreGone)));
    let clone = deep.clone();
    drop(clone);
    drop(deep);
}

#[test]
fn live_store_counter_returns_to_baseline() {
    let check = LeakCheck::new();
    {
        let store = DeepShapeStore::singular("TOP");
        let _other = store.clone();
        let _second = DeepShapeStore::new();
        assert_eq!(check.leaked(), 2);
    }
    assert_eq!(check.leaked(), 0);
}

#[test]
fn stores_dropped_on_another_thread_are_released() {
    let check = LeakCheck::new();
    let store = DeepShapeStore::new();
    assert_eq!(check.leaked(), 1);
    std::thread::spawn(move || drop(store)).join().unwrap();
    assert_eq!(check.leaked(), 0);
}

#[test]
fn singular_accessors_need_one_layout() {
    let store = DeepShapeStore::new();
    assert!(!store.is_singular());
    assert!(matches!(
        store.singular_layout_index(),
        Err(DeepError::NotSingular)
    ));
    assert!(matches!(
        store.create_from_flat(&FlatShapes::new(), false, 0., 0, Transformation::identity()),
        Err(DeepError::NotSingular)
    ));

    let singular = DeepShapeStore::singular("TOP");
    assert!(singular.is_singular());
    assert_eq!(singular.singular_layout_index().unwrap(), 0);
    let top = singular.singular_initial_cell().unwrap();
    let name = singular
        .with_singular_layout(|l| l.cell(top).name().clone())
        .unwrap();
    assert_eq!(name.as_str(), "TOP");
}

#[test]
fn flat_collections_are_ingested_once() {
    let store = DeepShapeStore::singular("TOP");
    store.set_text_enlargement(1);
    store.set_text_property_name(Some(literal!("net")));

    let mut flat = FlatShapes::new();
    flat.insert(Rect::from_sides(0, 0, 10, 10));
    let mut props = PropertySet::new();
    props.insert(literal!("id"), PropValue::Int(7));
    flat.insert_with_properties(Rect::from_sides(20, 0, 30, 10), props);
    flat.insert(Text::at("VDD", Point::new(5, 5)));
    flat.insert_nested(Text::at("inner", Point::new(25, 5)));

    let deep = store
        .create_from_flat(&flat, true, 0., 0, Transformation::identity())
        .unwrap();
    assert_eq!(deep.flat_shape_count().unwrap(), 3);
    let again = store
        .create_from_flat(&flat, true, 0., 0, Transformation::identity())
        .unwrap();
    assert_eq!(deep, again);

    let with_nested = {
        flat.insert(Rect::from_sides(40, 0, 50, 10));
        store
            .create_from_flat(&flat, false, 0., 0, Transformation::identity())
            .unwrap()
    };
    assert_ne!(with_nested.layer(), deep.layer());
    assert_eq!(with_nested.flat_shape_count().unwrap(), 5);

    let top = store.singular_initial_cell().unwrap();
    deep.with_layout(|l, layer| {
        let shapes = l.shapes(top, layer).unwrap();
        let ids: Vec<Option<&PropValue>> = shapes
            .iter()
            .filter_map(|e| l.properties().properties(e.prop_id()))
            .map(|set| set.get("id").or_else(|| set.get("net")))
            .collect();
        assert!(ids.contains(&Some(&PropValue::Int(7))));
        assert!(ids.contains(&Some(&PropValue::String("VDD".into()))));
    })
    .unwrap();
}

#[test]
fn custom_layers_use_the_callers_stage() {
    let f = fixture();
    let store = DeepShapeStore::new();
    let mut stage = crate::pipeline::InsertionStage::new();
    let traversal = ShapeTraversal::new(&f.layout, f.top, f.la);
    let first = store
        .create_custom_layer(&traversal, &mut stage, Transformation::identity())
        .unwrap();
    let second = store
        .create_custom_layer(&traversal, &mut stage, Transformation::identity())
        .unwrap();
    assert_ne!(first.layer(), second.layer());
    assert_eq!(first.layout_index(), second.layout_index());
    first
        .with_layout(|l, layer| {
            let b = shadow_cell(l, "b");
            let shape = l.shapes(b, layer).unwrap().iter().next().unwrap();
            assert_eq!(shape.shape().kind(), ShapeKind::Box);
        })
        .unwrap();
}

#[test]
fn missing_top_cell_is_reported() {
    let f = fixture();
    let mut other = Layout::new();
    let missing = (0..4).map(|i| other.add_cell(&format!("x{i}"))).last().unwrap();
    assert!(!f.layout.has_cell(missing));
    let store = DeepShapeStore::new();
    let result = store.create_polygon_layer(
        &ShapeTraversal::new(&f.layout, missing, f.la),
        0.,
        0,
        Transformation::identity(),
    );
    assert!(matches!(result, Err(DeepError::EmptySource(_))));
    assert_eq!(store.layout_count(), 0);
}

#[test]
fn layers_copy_and_merge() {
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

    let copy = a.copy().unwrap();
    assert_eq!(copy.layout_index(), a.layout_index());
    assert_eq!(copy.flat_shape_count().unwrap(), 4);

    let derived = a.derived().unwrap();
    assert_eq!(derived.flat_shape_count().unwrap(), 0);
    derived.add_from(&a).unwrap();
    derived.add_from(&copy).unwrap();
    assert_eq!(derived.flat_shape_count().unwrap(), 8);

    // A shifted extraction lives in a layout of its own.
    let shifted = store
        .create_polygon_layer(
            &ShapeTraversal::new(&f.layout, f.top, f.la),
            0.,
            0,
            Transformation::translate(1000, 0),
        )
        .unwrap();
    assert_ne!(shifted.layout_index(), a.layout_index());
    let merged = a.derived().unwrap();
    merged.add_from(&shifted).unwrap();
    assert_eq!(merged.flat_shape_count().unwrap(), 4);
    let cells_before = store.with_layout(a.layout_index(), Layout::cell_count).unwrap();
    merged.add_from(&shifted).unwrap();
    assert_eq!(merged.flat_shape_count().unwrap(), 8);
    assert_eq!(
        store.with_layout(a.layout_index(), Layout::cell_count).unwrap(),
        cells_before
    );
}

#[test]
fn net_builders_are_created_on_first_use() {
    let f = fixture();
    let store = DeepShapeStore::new();
    let deep = store
        .create_polygon_layer(
            &ShapeTraversal::new(&f.layout, f.top, f.la),
            0.,
            0,
            Transformation::identity(),
        )
        .unwrap();
    let index = deep.layout_index();
    let context = ContextId::next();

    assert!(!store.has_net_builder_for::<Vec<u32>>(index, context));
    store
        .net_builder_for(index, context, |v: &mut Vec<u32>| v.push(1))
        .unwrap();
    let len = store
        .net_builder_for(index, context, |v: &mut Vec<u32>| {
            v.push(2);
            v.len()
        })
        .unwrap();
    assert_eq!(len, 2);
    assert!(store.has_net_builder_for::<Vec<u32>>(index, context));
    assert!(!store.has_net_builder_for::<Vec<u32>>(index, ContextId::next()));

    drop(deep);
    assert!(!store.has_net_builder_for::<Vec<u32>>(index, context));
    assert!(matches!(
        store.net_builder_for(index, context, |v: &mut Vec<u32>| v.len()),
        Err(DeepError::InvalidLayoutIndex(_))
    ));
}

#[test]
fn net_builders_may_hold_layers() {
    let f = fixture();
    let store = DeepShapeStore::new();
    let deep = store
        .create_polygon_layer(
            &ShapeTraversal::new(&f.layout, f.top, f.la),
            0.,
            0,
            Transformation::identity(),
        )
        .unwrap();
    let index = deep.layout_index();
    let kept = deep.derived().unwrap();
    store
        .net_builder_for(index, ContextId::next(), |slot: &mut Option<crate::DeepLayer>| {
            *slot = Some(kept);
        })
        .unwrap();
    drop(deep);
    // The net builder keeps a layer of the layout alive.
    assert!(store.is_valid_layout_index(index));
}

#[test]
fn issue_variants_rewires_rotated_instances() {
    let mut layout = Layout::new();
    let layer = layout.insert_layer(LayerInfo::new(1, 0));
    let c = layout.add_cell("c");
    let top = layout.add_cell("top");
    layout
        .insert_shape(c, layer, Rect::from_sides(0, 0, 10, 5), PropId::NONE)
        .unwrap();
    layout
        .add_instance(top, layir::CellInstArray::new(c, Transformation::identity()))
        .unwrap();
    layout
        .add_instance(
            top,
            layir::CellInstArray::new(
                c,
                Transformation::translate(100, 0) * Transformation::rotate(Rotation::R90),
            ),
        )
        .unwrap();

    let store = DeepShapeStore::new();
    let deep = store
        .create_polygon_layer(
            &ShapeTraversal::new(&layout, top, layer),
            0.,
            0,
            Transformation::identity(),
        )
        .unwrap();
    let index = deep.layout_index();
    let (shadow_top, shadow_c, variant) = store
        .with_layout_mut(index, |l| {
            let variant = l.add_cell("c$R90");
            (l.cell_id_named("top"), l.cell_id_named("c"), variant)
        })
        .unwrap();

    let var_map: VariantMap = [(
        shadow_c,
        [
            (Transformation::identity(), shadow_c),
            (Transformation::rotate(Rotation::R90), variant),
        ]
        .into_iter()
        .collect(),
    )]
    .into_iter()
    .collect();
    store.issue_variants(index, &var_map).unwrap();

    let children: BTreeSet<_> = store
        .with_layout(index, |l| {
            l.cell(shadow_top)
                .instances()
                .map(|(_, inst)| inst.child())
                .collect()
        })
        .unwrap();
    assert_eq!(children, BTreeSet::from([shadow_c, variant]));
    store
        .with_builder(index, |b| {
            assert!(b.is_variant(variant));
            assert!(!b.is_variant(shadow_c));
            assert_eq!(b.original_target_for_variant(variant), shadow_c);
        })
        .unwrap();
}

#[test]
fn odd_polygons_are_collected_as_issues() {
    let mut layout = Layout::new();
    let layer = layout.insert_layer(LayerInfo::new(1, 0));
    let top = layout.add_cell("top");
    let bowtie = Polygon::from_verts(vec![
        Point::new(0, 0),
        Point::new(10, 10),
        Point::new(10, 0),
        Point::new(0, 10),
    ]);
    layout.insert_shape(top, layer, bowtie, PropId::NONE).unwrap();

    let store = DeepShapeStore::new();
    store.set_reject_odd_polygons(true);
    let deep = store
        .create_polygon_layer(
            &ShapeTraversal::new(&layout, top, layer),
            0.,
            0,
            Transformation::identity(),
        )
        .unwrap();
    assert_eq!(deep.flat_shape_count().unwrap(), 0);
    let issues = store.issues();
    assert_eq!(issues.len(), 1);
    assert!(issues.has_warning());
}
