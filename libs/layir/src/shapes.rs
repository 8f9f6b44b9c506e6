//! Per-layer shape containers.

use arcstr::ArcStr;
use geometry::prelude::*;

use crate::props::{PolygonRepository, PropId, PropertiesRepository};

/// A shape together with its property ID.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShapeEntry {
    shape: Shape,
    prop_id: PropId,
}

impl ShapeEntry {
    /// Creates a new entry.
    pub fn new(shape: impl Into<Shape>, prop_id: PropId) -> Self {
        Self {
            shape: shape.into(),
            prop_id,
        }
    }

    /// The shape.
    #[inline]
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// The property ID of the shape.
    #[inline]
    pub fn prop_id(&self) -> PropId {
        self.prop_id
    }

    /// Returns the shape and its property ID.
    pub fn into_parts(self) -> (Shape, PropId) {
        (self.shape, self.prop_id)
    }
}

/// The shapes of one cell on one layer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Shapes {
    entries: Vec<ShapeEntry>,
}

impl Shapes {
    /// Creates an empty container.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a shape.
    pub fn insert(&mut self, shape: impl Into<Shape>, prop_id: PropId) {
        self.entries.push(ShapeEntry::new(shape, prop_id));
    }

    /// Iterates over the stored shapes in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &ShapeEntry> {
        self.entries.iter()
    }

    /// The number of shapes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if there are no shapes.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes all shapes.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub(crate) fn extend(&mut self, other: &Shapes) {
        self.entries.extend(other.entries.iter().cloned());
    }
}

impl Bbox for Shapes {
    fn bbox(&self) -> Option<Rect> {
        let mut bbox = None;
        for entry in &self.entries {
            bbox = bbox.bounding_union(&entry.shape.bbox());
        }
        bbox
    }
}

/// Mutable access to one cell's shapes on one layer, together with the
/// owning layout's repositories.
pub struct ShapeTarget<'a> {
    pub(crate) shapes: &'a mut Shapes,
    pub(crate) properties: &'a mut PropertiesRepository,
    pub(crate) polygons: &'a mut PolygonRepository,
    pub(crate) cell_name: ArcStr,
}

impl ShapeTarget<'_> {
    /// Stores a shape.
    pub fn insert(&mut self, shape: impl Into<Shape>, prop_id: PropId) {
        self.shapes.insert(shape, prop_id);
    }

    /// The shapes stored so far.
    pub fn shapes(&self) -> &Shapes {
        self.shapes
    }

    /// The property repository of the owning layout.
    pub fn properties_mut(&mut self) -> &mut PropertiesRepository {
        self.properties
    }

    /// The polygon repository of the owning layout.
    pub fn polygons_mut(&mut self) -> &mut PolygonRepository {
        self.polygons
    }

    /// The name of the cell receiving the shapes.
    pub fn cell_name(&self) -> &ArcStr {
        &self.cell_name
    }
}
