//! Handles to layers of a deep shape store.

use std::cmp::Ordering;
use std::sync::{Arc, Weak};

use layir::{CellId, LayerId, LayerInfo, Layout};

use crate::error::{DeepError, Result};
use crate::store::{DeepShapeStore, Shared, StoreId};

/// A reference-counted handle to one layer of one shadow layout.
///
/// Cloning a handle adds a reference to the layer; dropping it removes one.
/// Handles do not keep their store alive. Once the store is gone, every
/// operation fails with [`DeepError::StoreGone`] and dropping the handle does
/// nothing.
pub struct DeepLayer {
    store: Weak<Shared>,
    store_id: StoreId,
    layout: usize,
    layer: LayerId,
}

impl DeepLayer {
    /// Wraps a reference the store has already counted.
    pub(crate) fn adopt(store: &DeepShapeStore, layout: usize, layer: LayerId) -> Self {
        Self {
            store: store.downgrade(),
            store_id: store.id(),
            layout,
            layer,
        }
    }

    pub fn layout_index(&self) -> usize {
        self.layout
    }

    pub fn layer(&self) -> LayerId {
        self.layer
    }

    pub fn store_id(&self) -> StoreId {
        self.store_id
    }

    /// Returns `true` if the store is alive and still holds the layer.
    pub fn is_valid(&self) -> bool {
        self.check_valid().is_ok()
    }

    pub fn check_valid(&self) -> Result<()> {
        let shared = self.shared()?;
        let data = shared.lock();
        data.check_layer(self.layout, self.layer)
    }

    fn shared(&self) -> Result<Arc<Shared>> {
        self.store.upgrade().ok_or_else(|| {
            tracing::error!(store = %self.store_id, "deep layer used after its store was dropped");
            DeepError::StoreGone
        })
    }

    /// A handle to the owning store.
    pub fn store(&self) -> Result<DeepShapeStore> {
        self.shared().map(DeepShapeStore::from_shared)
    }

    /// Runs `f` on the layer's shadow layout.
    ///
    /// The store is locked while `f` runs; `f` must not use the store or drop
    /// layer handles.
    pub fn with_layout<R>(&self, f: impl FnOnce(&Layout, LayerId) -> R) -> Result<R> {
        let shared = self.shared()?;
        let data = shared.lock();
        data.check_layer(self.layout, self.layer)?;
        Ok(f(&data.slot(self.layout)?.layout, self.layer))
    }

    /// The shadow top cell of the layer's layout.
    pub fn initial_cell(&self) -> Result<CellId> {
        self.shared()?.lock().initial_cell(self.layout)
    }

    /// A new, empty layer in the same layout.
    pub fn derived(&self) -> Result<DeepLayer> {
        let shared = self.shared()?;
        let mut data = shared.lock();
        data.check_layer(self.layout, self.layer)?;
        let slot = data.slot_mut(self.layout)?;
        let layer = slot.layout.insert_layer(LayerInfo::default());
        data.add_ref(self.layout, layer);
        Ok(self.sibling(layer))
    }

    /// A new layer in the same layout holding the same shapes.
    pub fn copy(&self) -> Result<DeepLayer> {
        let shared = self.shared()?;
        let mut data = shared.lock();
        data.check_layer(self.layout, self.layer)?;
        let slot = data.slot_mut(self.layout)?;
        let info = slot.layout.layer_info(self.layer).cloned().unwrap_or_default();
        let layer = slot.layout.insert_layer(info);
        slot.layout.copy_layer(self.layer, layer)?;
        data.add_ref(self.layout, layer);
        Ok(self.sibling(layer))
    }

    fn sibling(&self, layer: LayerId) -> DeepLayer {
        DeepLayer {
            store: self.store.clone(),
            store_id: self.store_id,
            layout: self.layout,
            layer,
        }
    }

    /// Appends the shapes of `other` to this layer.
    ///
    /// Both layers must belong to the same store. If they live in different
    /// layouts, cells of `other`'s layout are matched by name and created
    /// where missing.
    pub fn add_from(&self, other: &DeepLayer) -> Result<()> {
        let store = self.store()?;
        store.check_owner(other)?;
        let mut data = store.lock();
        data.add_layer(self.layout, self.layer, other.layout, other.layer)
    }

    /// Copies the layer into `into_layer` of `into_cell` in an external layout.
    ///
    /// Returns the number of shapes inserted.
    pub fn insert_into(
        &self,
        into: &mut Layout,
        into_cell: CellId,
        into_layer: LayerId,
    ) -> Result<usize> {
        self.store()?.insert(self, into, into_cell, into_layer)
    }

    /// The number of shapes of the layer after flattening the shadow hierarchy.
    pub fn flat_shape_count(&self) -> Result<usize> {
        let shared = self.shared()?;
        let data = shared.lock();
        data.check_layer(self.layout, self.layer)?;
        let top = data.initial_cell(self.layout)?;
        Ok(data
            .slot(self.layout)?
            .layout
            .flat_shape_count(top, self.layer))
    }
}

impl Clone for DeepLayer {
    fn clone(&self) -> Self {
        if let Some(shared) = self.store.upgrade() {
            shared.lock().add_ref(self.layout, self.layer);
        }
        self.sibling(self.layer)
    }
}

impl Drop for DeepLayer {
    fn drop(&mut self) {
        let Some(shared) = self.store.upgrade() else {
            return;
        };
        let released = shared.lock().remove_ref(self.layout, self.layer);
        drop(released);
    }
}

impl std::fmt::Debug for DeepLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeepLayer")
            .field("store", &self.store_id)
            .field("layout", &self.layout)
            .field("layer", &self.layer)
            .finish()
    }
}

impl PartialEq for DeepLayer {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for DeepLayer {}

impl PartialOrd for DeepLayer {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DeepLayer {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.store_id, self.layout, self.layer).cmp(&(other.store_id, other.layout, other.layer))
    }
}
