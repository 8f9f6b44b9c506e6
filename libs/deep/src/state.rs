//! Per-store configuration.

use std::collections::{BTreeMap, BTreeSet};

use arcstr::ArcStr;
use layir::CellId;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A snapshot of a [`DeepShapeStore`](crate::DeepShapeStore)'s configuration.
///
/// Settings only affect layers created after they were changed.
///
/// Breakout cells refer to shadow cells of individual layouts and are not
/// part of the serialized form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeepShapeStoreState {
    threads: usize,
    max_vertex_count: usize,
    max_area_ratio: f64,
    reject_odd_polygons: bool,
    text_enlargement: i64,
    text_property_name: Option<ArcStr>,
    #[serde(skip)]
    breakout_cells: BTreeMap<usize, BTreeSet<CellId>>,
    subcircuit_hierarchy_for_nets: bool,
}

impl Default for DeepShapeStoreState {
    fn default() -> Self {
        Self {
            threads: 1,
            max_vertex_count: 16,
            max_area_ratio: 3.0,
            reject_odd_polygons: false,
            text_enlargement: -1,
            text_property_name: None,
            breakout_cells: BTreeMap::new(),
            subcircuit_hierarchy_for_nets: false,
        }
    }
}

impl DeepShapeStoreState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a state from a TOML document.
    ///
    /// Missing keys keep their default values.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// The number of threads processing algorithms may use.
    pub fn threads(&self) -> usize {
        self.threads
    }

    pub fn set_threads(&mut self, n: usize) {
        self.threads = n;
    }

    /// Polygons with more vertices are split.
    pub fn max_vertex_count(&self) -> usize {
        self.max_vertex_count
    }

    pub fn set_max_vertex_count(&mut self, n: usize) {
        self.max_vertex_count = n;
    }

    /// Polygons whose bounding box area exceeds their own area by a larger
    /// factor are split.
    pub fn max_area_ratio(&self) -> f64 {
        self.max_area_ratio
    }

    pub fn set_max_area_ratio(&mut self, ratio: f64) {
        self.max_area_ratio = ratio;
    }

    /// Whether self-intersecting polygons are dropped with a diagnostic.
    pub fn reject_odd_polygons(&self) -> bool {
        self.reject_odd_polygons
    }

    pub fn set_reject_odd_polygons(&mut self, reject: bool) {
        self.reject_odd_polygons = reject;
    }

    /// Half-width of the boxes texts turn into on polygon layers.
    ///
    /// Negative values drop texts.
    pub fn text_enlargement(&self) -> i64 {
        self.text_enlargement
    }

    pub fn set_text_enlargement(&mut self, enlargement: i64) {
        self.text_enlargement = enlargement;
    }

    /// The property under which text strings are attached to their boxes.
    pub fn text_property_name(&self) -> Option<&ArcStr> {
        self.text_property_name.as_ref()
    }

    pub fn set_text_property_name(&mut self, name: Option<ArcStr>) {
        self.text_property_name = name;
    }

    pub fn subcircuit_hierarchy_for_nets(&self) -> bool {
        self.subcircuit_hierarchy_for_nets
    }

    pub fn set_subcircuit_hierarchy_for_nets(&mut self, enabled: bool) {
        self.subcircuit_hierarchy_for_nets = enabled;
    }

    /// The breakout cells of the given layout.
    pub fn breakout_cells(&self, layout: usize) -> Option<&BTreeSet<CellId>> {
        self.breakout_cells.get(&layout)
    }

    pub fn has_breakout_cells(&self, layout: usize) -> bool {
        self.breakout_cells
            .get(&layout)
            .is_some_and(|cells| !cells.is_empty())
    }

    pub fn is_breakout_cell(&self, layout: usize, cell: CellId) -> bool {
        self.breakout_cells
            .get(&layout)
            .is_some_and(|cells| cells.contains(&cell))
    }

    /// Replaces the breakout cells of a layout.
    pub fn set_breakout_cells(&mut self, layout: usize, cells: BTreeSet<CellId>) {
        if cells.is_empty() {
            self.breakout_cells.remove(&layout);
        } else {
            self.breakout_cells.insert(layout, cells);
        }
    }

    pub fn add_breakout_cell(&mut self, layout: usize, cell: CellId) {
        self.breakout_cells.entry(layout).or_default().insert(cell);
    }

    pub fn add_breakout_cells(&mut self, layout: usize, cells: impl IntoIterator<Item = CellId>) {
        self.breakout_cells.entry(layout).or_default().extend(cells);
    }

    pub fn clear_breakout_cells(&mut self, layout: usize) {
        self.breakout_cells.remove(&layout);
    }
}
