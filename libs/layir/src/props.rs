//! Property and polygon repositories.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use arcstr::ArcStr;
use geometry::polygon_ref::split_displacement;
use geometry::prelude::*;
use serde::{Deserialize, Serialize};

/// Identifies a property set within a [`PropertiesRepository`].
///
/// [`PropId::NONE`] denotes the absence of properties.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct PropId(u64);

impl PropId {
    /// No properties.
    pub const NONE: PropId = PropId(0);

    /// Returns `true` if this is [`PropId::NONE`].
    #[inline]
    pub fn is_none(&self) -> bool {
        self.0 == 0
    }
}

/// A property value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PropValue {
    /// An integer.
    Int(i64),
    /// A string.
    String(ArcStr),
}

impl From<i64> for PropValue {
    fn from(value: i64) -> Self {
        PropValue::Int(value)
    }
}

impl From<ArcStr> for PropValue {
    fn from(value: ArcStr) -> Self {
        PropValue::String(value)
    }
}

impl From<&str> for PropValue {
    fn from(value: &str) -> Self {
        PropValue::String(value.into())
    }
}

/// A sorted set of named property values.
pub type PropertySet = BTreeMap<ArcStr, PropValue>;

/// Deduplicates property sets and assigns each one an ID.
#[derive(Debug, Clone, Default)]
pub struct PropertiesRepository {
    sets: Vec<PropertySet>,
    index: HashMap<PropertySet, PropId>,
}

impl PropertiesRepository {
    /// Creates an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the ID of `set`, registering it if needed.
    ///
    /// The empty set maps to [`PropId::NONE`].
    pub fn properties_id(&mut self, set: PropertySet) -> PropId {
        if set.is_empty() {
            return PropId::NONE;
        }
        if let Some(&id) = self.index.get(&set) {
            return id;
        }
        self.sets.push(set.clone());
        let id = PropId(self.sets.len() as u64);
        self.index.insert(set, id);
        id
    }

    /// The property set with the given ID.
    pub fn properties(&self, id: PropId) -> Option<&PropertySet> {
        if id.is_none() {
            return None;
        }
        self.sets.get(id.0 as usize - 1)
    }

    /// Registers the set that `id` denotes in `from` with this repository.
    pub fn translate(&mut self, from: &PropertiesRepository, id: PropId) -> PropId {
        match from.properties(id) {
            Some(set) => self.properties_id(set.clone()),
            None => PropId::NONE,
        }
    }

    /// The number of distinct non-empty property sets.
    pub fn len(&self) -> usize {
        self.sets.len()
    }

    /// Returns `true` if no property sets are registered.
    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}

/// Interns polygons so that equal shapes share one allocation.
#[derive(Debug, Clone, Default)]
pub struct PolygonRepository {
    polygons: HashSet<Arc<Polygon>>,
}

impl PolygonRepository {
    /// Creates an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a reference to `polygon`, sharing its base with equal polygons
    /// interned before.
    pub fn intern(&mut self, polygon: &Polygon) -> PolygonRef {
        let (base, disp) = split_displacement(polygon);
        let base = match self.polygons.get(&base) {
            Some(shared) => shared.clone(),
            None => {
                let shared = Arc::new(base);
                self.polygons.insert(shared.clone());
                shared
            }
        };
        PolygonRef::new(base, disp)
    }

    /// Re-interns a reference created by another repository.
    pub fn intern_ref(&mut self, r: &PolygonRef) -> PolygonRef {
        match self.polygons.get(r.base().as_ref()) {
            Some(shared) => PolygonRef::new(shared.clone(), r.disp()),
            None => {
                self.polygons.insert(r.base().clone());
                r.clone()
            }
        }
    }

    /// The number of distinct base polygons.
    pub fn len(&self) -> usize {
        self.polygons.len()
    }

    /// Returns `true` if no polygons are interned.
    pub fn is_empty(&self) -> bool {
        self.polygons.is_empty()
    }
}
