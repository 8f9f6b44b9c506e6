//! Non-hierarchical shape collections that can be ingested into a store.

use std::sync::atomic::{AtomicU64, Ordering};

use geometry::prelude::*;
use layir::{PropId, PropertiesRepository, PropertySet};

static NEXT_COLLECTION_ID: AtomicU64 = AtomicU64::new(1);

/// A process-unique identity of a flat collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CollectionId(u64);

impl CollectionId {
    /// Allocates a fresh identity.
    pub fn next() -> Self {
        Self(NEXT_COLLECTION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// One shape of a flat collection.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatShape {
    pub shape: Shape,
    /// A property ID in the collection's [`FlatSource::properties`].
    pub prop_id: PropId,
    /// `false` for shapes taken from below the top level of some hierarchy.
    pub top_level: bool,
}

/// A source of shapes without hierarchy.
pub trait FlatSource {
    /// An identity that stays stable for the lifetime of the collection.
    fn collection_id(&self) -> CollectionId;

    /// Bumped whenever the collection's content changes.
    fn generation(&self) -> u64 {
        0
    }

    fn shapes(&self) -> Box<dyn Iterator<Item = &FlatShape> + '_>;

    /// The repository the shapes' property IDs refer to.
    fn properties(&self) -> Option<&PropertiesRepository> {
        None
    }
}

/// A simple in-memory [`FlatSource`].
#[derive(Debug)]
pub struct FlatShapes {
    id: CollectionId,
    generation: u64,
    shapes: Vec<FlatShape>,
    properties: PropertiesRepository,
}

impl Default for FlatShapes {
    fn default() -> Self {
        Self {
            id: CollectionId::next(),
            generation: 0,
            shapes: Vec::new(),
            properties: PropertiesRepository::new(),
        }
    }
}

impl FlatShapes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, shape: impl Into<Shape>) {
        self.push(shape.into(), PropId::NONE, true);
    }

    pub fn insert_with_properties(&mut self, shape: impl Into<Shape>, properties: PropertySet) {
        let prop_id = self.properties.properties_id(properties);
        self.push(shape.into(), prop_id, true);
    }

    /// Adds a shape that was originally placed below the top level.
    pub fn insert_nested(&mut self, shape: impl Into<Shape>) {
        self.push(shape.into(), PropId::NONE, false);
    }

    fn push(&mut self, shape: Shape, prop_id: PropId, top_level: bool) {
        self.shapes.push(FlatShape {
            shape,
            prop_id,
            top_level,
        });
        self.generation += 1;
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }
}

impl FlatSource for FlatShapes {
    fn collection_id(&self) -> CollectionId {
        self.id
    }

    fn generation(&self) -> u64 {
        self.generation
    }

    fn shapes(&self) -> Box<dyn Iterator<Item = &FlatShape> + '_> {
        Box::new(self.shapes.iter())
    }

    fn properties(&self) -> Option<&PropertiesRepository> {
        Some(&self.properties)
    }
}
