mod builder;
mod scenarios;
mod store;

use geometry::prelude::*;
use layir::{CellId, CellInstArray, LayerId, LayerInfo, Layout, PropId, RegularArray};

pub(crate) struct Fixture {
    pub(crate) layout: Layout,
    pub(crate) top: CellId,
    pub(crate) a: CellId,
    pub(crate) b: CellId,
    pub(crate) la: LayerId,
    pub(crate) lb: LayerId,
}

/// Three cells on two layers.
///
/// `top` places `a` once and `b` as a 2x1 array; `a` places `b` once. `b`
/// has a box on both layers, `a` one on layer A, `top` one on layer B.
pub(crate) fn fixture() -> Fixture {
    let mut layout = Layout::new();
    let la = layout.insert_layer(LayerInfo::new(1, 0));
    let lb = layout.insert_layer(LayerInfo::new(2, 0));
    let b = layout.add_cell("b");
    let a = layout.add_cell("a");
    let top = layout.add_cell("top");

    layout
        .insert_shape(b, la, Rect::from_sides(0, 0, 10, 10), PropId::NONE)
        .unwrap();
    layout
        .insert_shape(b, lb, Rect::from_sides(0, 20, 10, 30), PropId::NONE)
        .unwrap();
    layout
        .insert_shape(a, la, Rect::from_sides(0, 0, 40, 5), PropId::NONE)
        .unwrap();
    layout
        .insert_shape(top, lb, Rect::from_sides(-10, -10, 0, 0), PropId::NONE)
        .unwrap();

    layout
        .add_instance(a, CellInstArray::new(b, Transformation::translate(20, 20)))
        .unwrap();
    layout
        .add_instance(top, CellInstArray::new(a, Transformation::identity()))
        .unwrap();
    layout
        .add_instance(
            top,
            CellInstArray::regular(
                b,
                Transformation::translate(100, 0),
                RegularArray::new(Point::new(50, 0), Point::new(0, 0), 2, 1),
            ),
        )
        .unwrap();

    Fixture {
        layout,
        top,
        a,
        b,
        la,
        lb,
    }
}

/// Two cells that each hold shapes on one layer only.
///
/// `a` has a box on layer A, `b` one on layer B. `top` places both, and `a`
/// places `b` once more.
pub(crate) fn split_fixture() -> Fixture {
    let mut layout = Layout::new();
    let la = layout.insert_layer(LayerInfo::new(1, 0));
    let lb = layout.insert_layer(LayerInfo::new(2, 0));
    let b = layout.add_cell("b");
    let a = layout.add_cell("a");
    let top = layout.add_cell("top");

    layout
        .insert_shape(a, la, Rect::from_sides(0, 0, 10, 10), PropId::NONE)
        .unwrap();
    layout
        .insert_shape(b, lb, Rect::from_sides(0, 0, 5, 20), PropId::NONE)
        .unwrap();
    layout
        .add_instance(a, CellInstArray::new(b, Transformation::translate(30, 0)))
        .unwrap();
    layout
        .add_instance(top, CellInstArray::new(a, Transformation::identity()))
        .unwrap();
    layout
        .add_instance(top, CellInstArray::new(b, Transformation::translate(0, 100)))
        .unwrap();

    Fixture {
        layout,
        top,
        a,
        b,
        la,
        lb,
    }
}

/// The bounding boxes of the flattened shapes of `layer`, sorted.
pub(crate) fn flat_boxes(layout: &Layout, top: CellId, layer: LayerId) -> Vec<Rect> {
    let mut boxes: Vec<Rect> = layout
        .flatten(top, layer)
        .iter()
        .filter_map(|e| e.shape().bbox())
        .collect();
    boxes.sort();
    boxes
}

/// The shadow cell with the given name.
pub(crate) fn shadow_cell(layout: &Layout, name: &str) -> CellId {
    layout.cell_id_named(name)
}
