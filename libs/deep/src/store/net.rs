//! Per-layout slots for state owned by extraction code.

use std::any::{Any, TypeId};
use std::sync::atomic::{AtomicU64, Ordering};

use super::DeepShapeStore;
use crate::error::Result;

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Identifies the caller a net builder slot belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(u64);

impl ContextId {
    /// Allocates a fresh, process-unique context.
    pub fn next() -> Self {
        Self(NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl DeepShapeStore {
    /// Runs `f` on the net builder of type `T` kept for `(layout, context)`,
    /// creating it with `T::default()` on first use.
    ///
    /// Net builders are dropped together with their layout. The store is
    /// locked while `f` runs; `f` must not use the store or drop layer
    /// handles.
    pub fn net_builder_for<T, R>(
        &self,
        layout: usize,
        context: ContextId,
        f: impl FnOnce(&mut T) -> R,
    ) -> Result<R>
    where
        T: Default + Send + 'static,
    {
        let mut data = self.lock();
        data.slot(layout)?;
        let slot = data
            .net_builders
            .entry((layout, context, TypeId::of::<T>()))
            .or_insert_with(|| {
                tracing::debug!(layout, ?context, "created net builder");
                Box::new(T::default())
            });
        match slot.downcast_mut::<T>() {
            Some(builder) => Ok(f(builder)),
            None => {
                tracing::error!(layout, ?context, "net builder slot holds a different type");
                panic!("net builder slot holds a different type");
            }
        }
    }

    /// Returns `true` if a net builder of type `T` exists for `(layout, context)`.
    pub fn has_net_builder_for<T: Any>(&self, layout: usize, context: ContextId) -> bool {
        self.lock()
            .net_builders
            .contains_key(&(layout, context, TypeId::of::<T>()))
    }
}
