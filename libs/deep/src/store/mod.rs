//! The deep shape store.
//!
//! A [`DeepShapeStore`] owns the shadow layouts that deep layers live in.
//! Every layout is filled by its own [`HierarchyBuilder`] from one source
//! hierarchy; layers created from equivalent traversals share a layout, and
//! identical layer requests share a layer.
//!
//! Layers are reference counted through [`DeepLayer`](crate::DeepLayer) handles. A layout is
//! released once its last layer handle is dropped, unless the store keeps
//! layouts or the layout is the pinned layout of a singular store.

mod create;
mod mapping;
mod net;
mod variants;

use std::any::{Any, TypeId};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt::Display;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use arcstr::ArcStr;
use geometry::prelude::*;
use layir::mapping::CellMapping;
use layir::traverse::HierarchyKey;
use layir::{CellId, LayerId, Layout, LayoutId};

use crate::builder::HierarchyBuilder;
use crate::diagnostics::{IssueSet, ShapeIssue};
use crate::error::{DeepError, Result};
use crate::flat::CollectionId;
use crate::state::DeepShapeStoreState;

use mapping::OriginalMappingKey;

pub use net::ContextId;
pub use variants::VariantMap;

static NEXT_STORE_ID: AtomicU64 = AtomicU64::new(1);

/// A process-unique store identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StoreId(u64);

impl StoreId {
    fn next() -> Self {
        Self(NEXT_STORE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl Display for StoreId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "store#{}", self.0)
    }
}

/// Polygon reduction parameters a shadow layout was requested with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct SimplifyKey {
    max_vertex_count: usize,
    max_area_ratio: u64,
}

impl SimplifyKey {
    pub(crate) fn new(max_vertex_count: usize, max_area_ratio: f64) -> Self {
        Self {
            max_vertex_count,
            max_area_ratio: max_area_ratio.to_bits(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct LayoutKey {
    hierarchy: HierarchyKey,
    source_generation: u64,
    simplify: SimplifyKey,
    trans: Transformation,
}

/// What a layer was built to hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum LayerKind {
    Polygons {
        reject_odd_polygons: bool,
        text_enlargement: i64,
    },
    Edges {
        as_edges: bool,
    },
    EdgePairs,
    Texts,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct LayerKey {
    layout: usize,
    layers: Vec<LayerId>,
    kind: LayerKind,
    text_property_name: Option<ArcStr>,
    breakout_cells: BTreeSet<CellId>,
    source: (LayoutId, u64, u64),
}

/// One shadow layout with its builder and layer reference counts.
#[derive(Debug)]
pub(crate) struct LayoutSlot {
    pub(crate) layout: Layout,
    pub(crate) builder: HierarchyBuilder,
    refs: BTreeMap<LayerId, usize>,
    initial_cell: Option<CellId>,
    key: Option<LayoutKey>,
    /// Pinned layouts survive losing their last layer.
    pinned: bool,
}

impl LayoutSlot {
    fn new(key: Option<LayoutKey>) -> Self {
        Self {
            layout: Layout::new(),
            builder: HierarchyBuilder::new(),
            refs: BTreeMap::new(),
            initial_cell: None,
            key,
            pinned: false,
        }
    }

    fn total_refs(&self) -> usize {
        self.refs.values().sum()
    }
}

/// Store contents removed under the store lock.
///
/// Net builders may own layer handles, whose drop locks the store again,
/// so released items are dropped only after the lock is gone.
#[must_use]
#[derive(Default)]
pub(crate) struct Released {
    layouts: Vec<LayoutSlot>,
    net_builders: Vec<Box<dyn Any + Send>>,
}

impl Released {
    fn extend(&mut self, other: Released) {
        self.layouts.extend(other.layouts);
        self.net_builders.extend(other.net_builders);
    }
}

pub(crate) struct StoreData {
    slots: Vec<Option<LayoutSlot>>,
    layout_map: BTreeMap<LayoutKey, usize>,
    layer_map: BTreeMap<LayerKey, (usize, LayerId)>,
    flat_map: BTreeMap<(CollectionId, u64), (usize, LayerId)>,
    to_original: HashMap<OriginalMappingKey, Arc<CellMapping>>,
    internal: HashMap<(usize, usize), Arc<CellMapping>>,
    state: DeepShapeStoreState,
    saved_states: Vec<DeepShapeStoreState>,
    keep_layouts: bool,
    net_builders: HashMap<(usize, ContextId, TypeId), Box<dyn Any + Send>>,
    issues: IssueSet<ShapeIssue>,
}

impl StoreData {
    fn new() -> Self {
        Self {
            slots: Vec::new(),
            layout_map: BTreeMap::new(),
            layer_map: BTreeMap::new(),
            flat_map: BTreeMap::new(),
            to_original: HashMap::new(),
            internal: HashMap::new(),
            state: DeepShapeStoreState::default(),
            saved_states: Vec::new(),
            keep_layouts: false,
            net_builders: HashMap::new(),
            issues: IssueSet::new(),
        }
    }

    pub(crate) fn slot(&self, index: usize) -> Result<&LayoutSlot> {
        self.slots
            .get(index)
            .and_then(Option::as_ref)
            .ok_or(DeepError::InvalidLayoutIndex(index))
    }

    pub(crate) fn slot_mut(&mut self, index: usize) -> Result<&mut LayoutSlot> {
        self.slots
            .get_mut(index)
            .and_then(Option::as_mut)
            .ok_or(DeepError::InvalidLayoutIndex(index))
    }

    /// Borrows two different slots at once.
    fn slot_pair_mut(
        &mut self,
        a: usize,
        b: usize,
    ) -> Result<(&mut LayoutSlot, &mut LayoutSlot)> {
        debug_assert_ne!(a, b);
        self.slot(a)?;
        self.slot(b)?;
        let (lo, hi) = (a.min(b), a.max(b));
        let (head, tail) = self.slots.split_at_mut(hi);
        let (Some(lo_slot), Some(hi_slot)) = (head[lo].as_mut(), tail[0].as_mut()) else {
            return Err(DeepError::InvalidLayoutIndex(a));
        };
        Ok(if a < b {
            (lo_slot, hi_slot)
        } else {
            (hi_slot, lo_slot)
        })
    }

    pub(crate) fn initial_cell(&self, index: usize) -> Result<CellId> {
        self.slot(index)?
            .initial_cell
            .ok_or(DeepError::InvalidLayoutIndex(index))
    }

    pub(crate) fn check_layer(&self, index: usize, layer: LayerId) -> Result<()> {
        if self.slot(index)?.layout.has_layer(layer) {
            Ok(())
        } else {
            Err(DeepError::InvalidLayer {
                layout: index,
                layer,
            })
        }
    }

    fn add_slot(&mut self, slot: LayoutSlot) -> usize {
        let index = self.slots.len();
        if let Some(key) = &slot.key {
            self.layout_map.insert(key.clone(), index);
        }
        self.slots.push(Some(slot));
        tracing::debug!(layout = index, "created shadow layout");
        index
    }

    pub(crate) fn add_ref(&mut self, index: usize, layer: LayerId) {
        if let Ok(slot) = self.slot_mut(index) {
            *slot.refs.entry(layer).or_default() += 1;
        }
    }

    /// Drops one reference to a layer, deleting the layer and releasing its
    /// layout once they are no longer referenced.
    pub(crate) fn remove_ref(&mut self, index: usize, layer: LayerId) -> Released {
        let keep_layouts = self.keep_layouts;
        let Ok(slot) = self.slot_mut(index) else {
            return Released::default();
        };
        let Some(count) = slot.refs.get_mut(&layer) else {
            return Released::default();
        };
        *count = count.saturating_sub(1);
        if *count > 0 {
            return Released::default();
        }
        let release = slot.total_refs() == 0 && !slot.pinned;

        if !keep_layouts {
            slot.refs.remove(&layer);
            if let Err(err) = slot.layout.delete_layer(layer) {
                tracing::warn!(layout = index, %layer, "failed to delete unreferenced layer: {err}");
            }
            self.purge_layer(index, layer);
        }

        if release && !keep_layouts {
            self.release_layout(index)
        } else {
            Released::default()
        }
    }

    fn purge_layer(&mut self, index: usize, layer: LayerId) {
        self.layer_map.retain(|_, v| *v != (index, layer));
        self.flat_map.retain(|_, v| *v != (index, layer));
    }

    /// Empties a slot and drops everything derived from its layout.
    fn release_layout(&mut self, index: usize) -> Released {
        let Some(slot) = self.slots.get_mut(index).and_then(Option::take) else {
            return Released::default();
        };
        self.layout_map.retain(|_, v| *v != index);
        self.layer_map.retain(|_, v| v.0 != index);
        self.flat_map.retain(|_, v| v.0 != index);
        self.to_original.retain(|k, _| k.0 != index);
        self.internal.retain(|k, _| k.0 != index && k.1 != index);
        self.state.clear_breakout_cells(index);

        let contexts: Vec<_> = self
            .net_builders
            .keys()
            .filter(|k| k.0 == index)
            .copied()
            .collect();
        let net_builders = contexts
            .iter()
            .filter_map(|k| self.net_builders.remove(k))
            .collect();
        tracing::debug!(layout = index, "released shadow layout");

        Released {
            layouts: vec![slot],
            net_builders,
        }
    }

    /// Deletes unreferenced layers and releases every layout without layer references.
    fn release_unused(&mut self) -> Released {
        let mut unused_layers = Vec::new();
        for (index, slot) in self.slots.iter_mut().enumerate() {
            let Some(slot) = slot else {
                continue;
            };
            let layers: Vec<LayerId> = slot
                .refs
                .iter()
                .filter(|(_, n)| **n == 0)
                .map(|(l, _)| *l)
                .collect();
            for layer in layers {
                slot.refs.remove(&layer);
                if slot.layout.delete_layer(layer).is_ok() {
                    unused_layers.push((index, layer));
                }
            }
        }
        for (index, layer) in unused_layers {
            self.purge_layer(index, layer);
        }

        let unused: Vec<usize> = self
            .slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|s| (i, s)))
            .filter(|(_, s)| !s.pinned && s.total_refs() == 0)
            .map(|(i, _)| i)
            .collect();
        let mut released = Released::default();
        for index in unused {
            released.extend(self.release_layout(index));
        }
        released
    }

    fn live_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_some())
            .map(|(i, _)| i)
    }

    fn only_index(&self) -> Option<usize> {
        let mut live = self.live_indices();
        match (live.next(), live.next()) {
            (Some(index), None) => Some(index),
            _ => None,
        }
    }

    pub(crate) fn singular_index(&self) -> Result<usize> {
        self.only_index().ok_or_else(|| {
            tracing::error!(
                layouts = self.live_indices().count(),
                "operation requires a singular deep shape store"
            );
            DeepError::NotSingular
        })
    }
}

pub(crate) struct Shared {
    id: StoreId,
    data: Mutex<StoreData>,
    #[cfg(any(test, feature = "leak-check"))]
    _leak: crate::leak::StoreToken,
}

impl Shared {
    fn new() -> Self {
        Self {
            id: StoreId::next(),
            data: Mutex::new(StoreData::new()),
            #[cfg(any(test, feature = "leak-check"))]
            _leak: crate::leak::StoreToken::new(),
        }
    }

    pub(crate) fn id(&self) -> StoreId {
        self.id
    }

    /// Locks the store.
    ///
    /// Store operations never panic while holding the lock, so a poisoned
    /// lock still guards consistent data.
    pub(crate) fn lock(&self) -> MutexGuard<'_, StoreData> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        tracing::debug!(store = %self.id, "dropped deep shape store");
    }
}

/// Owns shadow layouts and hands out [`DeepLayer`](crate::DeepLayer) handles to their layers.
///
/// Cloning a store yields another handle to the same store.
#[derive(Clone)]
pub struct DeepShapeStore {
    shared: Arc<Shared>,
}

impl Default for DeepShapeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DeepShapeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeepShapeStore")
            .field("id", &self.shared.id)
            .field("layouts", &self.layout_count())
            .finish_non_exhaustive()
    }
}

impl DeepShapeStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared::new()),
        }
    }

    /// Creates a store holding a single pinned layout with one empty top cell.
    ///
    /// Flat collections can only be ingested into singular stores.
    pub fn singular(top_name: &str) -> Self {
        let store = Self::new();
        {
            let mut data = store.lock();
            let mut slot = LayoutSlot::new(None);
            slot.initial_cell = Some(slot.layout.add_cell(top_name));
            slot.pinned = true;
            data.add_slot(slot);
        }
        store
    }

    pub fn id(&self) -> StoreId {
        self.shared.id
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, StoreData> {
        self.shared.lock()
    }

    pub(crate) fn downgrade(&self) -> Weak<Shared> {
        Arc::downgrade(&self.shared)
    }

    pub(crate) fn from_shared(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    /// A copy of the current configuration.
    pub fn state(&self) -> DeepShapeStoreState {
        self.lock().state.clone()
    }

    /// Replaces the whole configuration.
    pub fn set_state(&self, state: DeepShapeStoreState) {
        self.lock().state = state;
    }

    /// Saves the current configuration.
    pub fn push_state(&self) {
        let mut data = self.lock();
        let state = data.state.clone();
        data.saved_states.push(state);
    }

    /// Restores the configuration saved by the matching [`push_state`](Self::push_state).
    pub fn pop_state(&self) -> Result<()> {
        let mut data = self.lock();
        match data.saved_states.pop() {
            Some(state) => {
                data.state = state;
                Ok(())
            }
            None => {
                tracing::error!("pop_state called without a saved state");
                Err(DeepError::EmptyStateStack)
            }
        }
    }

    pub fn threads(&self) -> usize {
        self.lock().state.threads()
    }

    pub fn set_threads(&self, n: usize) {
        self.lock().state.set_threads(n);
    }

    pub fn max_vertex_count(&self) -> usize {
        self.lock().state.max_vertex_count()
    }

    pub fn set_max_vertex_count(&self, n: usize) {
        self.lock().state.set_max_vertex_count(n);
    }

    pub fn max_area_ratio(&self) -> f64 {
        self.lock().state.max_area_ratio()
    }

    pub fn set_max_area_ratio(&self, ratio: f64) {
        self.lock().state.set_max_area_ratio(ratio);
    }

    pub fn reject_odd_polygons(&self) -> bool {
        self.lock().state.reject_odd_polygons()
    }

    pub fn set_reject_odd_polygons(&self, reject: bool) {
        self.lock().state.set_reject_odd_polygons(reject);
    }

    pub fn text_enlargement(&self) -> i64 {
        self.lock().state.text_enlargement()
    }

    pub fn set_text_enlargement(&self, enlargement: i64) {
        self.lock().state.set_text_enlargement(enlargement);
    }

    pub fn text_property_name(&self) -> Option<ArcStr> {
        self.lock().state.text_property_name().cloned()
    }

    pub fn set_text_property_name(&self, name: Option<ArcStr>) {
        self.lock().state.set_text_property_name(name);
    }

    pub fn subcircuit_hierarchy_for_nets(&self) -> bool {
        self.lock().state.subcircuit_hierarchy_for_nets()
    }

    pub fn set_subcircuit_hierarchy_for_nets(&self, enabled: bool) {
        self.lock().state.set_subcircuit_hierarchy_for_nets(enabled);
    }

    /// The shadow cells of `layout` whose own shapes are left out of new layers.
    pub fn breakout_cells(&self, layout: usize) -> BTreeSet<CellId> {
        self.lock()
            .state
            .breakout_cells(layout)
            .cloned()
            .unwrap_or_default()
    }

    pub fn set_breakout_cells(&self, layout: usize, cells: BTreeSet<CellId>) {
        self.lock().state.set_breakout_cells(layout, cells);
    }

    pub fn add_breakout_cell(&self, layout: usize, cell: CellId) {
        self.lock().state.add_breakout_cell(layout, cell);
    }

    pub fn add_breakout_cells(&self, layout: usize, cells: impl IntoIterator<Item = CellId>) {
        self.lock().state.add_breakout_cells(layout, cells);
    }

    pub fn clear_breakout_cells(&self, layout: usize) {
        self.lock().state.clear_breakout_cells(layout);
    }

    pub fn keep_layouts(&self) -> bool {
        self.lock().keep_layouts
    }

    /// Keeps layouts and layers alive after their last handle is dropped.
    ///
    /// Turning this off releases every layout that has no layer handles left.
    pub fn set_keep_layouts(&self, keep: bool) {
        let released = {
            let mut data = self.lock();
            data.keep_layouts = keep;
            if keep {
                Released::default()
            } else {
                data.release_unused()
            }
        };
        drop(released);
    }

    /// The number of live shadow layouts.
    pub fn layout_count(&self) -> usize {
        self.lock().live_indices().count()
    }

    pub fn is_valid_layout_index(&self, index: usize) -> bool {
        self.lock().slot(index).is_ok()
    }

    /// Runs `f` on a shadow layout.
    ///
    /// The store is locked while `f` runs; `f` must not use the store or drop
    /// layer handles.
    pub fn with_layout<R>(&self, index: usize, f: impl FnOnce(&Layout) -> R) -> Result<R> {
        let data = self.lock();
        Ok(f(&data.slot(index)?.layout))
    }

    /// Runs `f` on a shadow layout, with the same restrictions as [`with_layout`](Self::with_layout).
    pub fn with_layout_mut<R>(&self, index: usize, f: impl FnOnce(&mut Layout) -> R) -> Result<R> {
        let mut data = self.lock();
        Ok(f(&mut data.slot_mut(index)?.layout))
    }

    /// Runs `f` on the hierarchy builder of a shadow layout.
    pub fn with_builder<R>(&self, index: usize, f: impl FnOnce(&HierarchyBuilder) -> R) -> Result<R> {
        let data = self.lock();
        Ok(f(&data.slot(index)?.builder))
    }

    /// The shadow top cell of a layout.
    pub fn initial_cell(&self, index: usize) -> Result<CellId> {
        self.lock().initial_cell(index)
    }

    /// The number of handles referring to a layer.
    pub fn layer_refs(&self, index: usize, layer: LayerId) -> usize {
        self.lock()
            .slot(index)
            .ok()
            .and_then(|slot| slot.refs.get(&layer).copied())
            .unwrap_or(0)
    }

    /// Issues reported while filling layers.
    pub fn issues(&self) -> IssueSet<ShapeIssue> {
        self.lock().issues.clone()
    }

    /// Returns `true` if the store holds exactly one layout.
    pub fn is_singular(&self) -> bool {
        self.lock().only_index().is_some()
    }

    pub fn singular_layout_index(&self) -> Result<usize> {
        self.lock().singular_index()
    }

    /// Runs `f` on the only layout of a singular store.
    pub fn with_singular_layout<R>(&self, f: impl FnOnce(&Layout) -> R) -> Result<R> {
        let data = self.lock();
        let index = data.singular_index()?;
        Ok(f(&data.slot(index)?.layout))
    }

    pub fn singular_initial_cell(&self) -> Result<CellId> {
        let data = self.lock();
        let index = data.singular_index()?;
        data.initial_cell(index)
    }
}
