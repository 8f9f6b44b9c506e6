//! Hierarchical ("deep") shape processing.
//!
//! Geometry taken from a source layout is mirrored into shadow layouts owned
//! by a [`DeepShapeStore`]. The shadow hierarchy follows the source hierarchy,
//! with extra cell variants where a clip region cuts a cell differently in
//! different places. Processing algorithms then work cell by cell on the
//! shadow layers instead of on flattened geometry, and the results can be
//! copied back into an ordinary layout.
//!
//! The [`HierarchyBuilder`] replays a [`layir::traverse::ShapeTraversal`]
//! into a shadow layout, and the stages in [`pipeline`] decide how each
//! source shape is stored. [`DeepLayer`] handles reference layers of the
//! store and release them when dropped.

pub mod builder;
pub mod diagnostics;
pub mod error;
pub mod flat;
pub mod layer;
#[cfg(any(test, feature = "leak-check"))]
pub mod leak;
pub mod pipeline;
pub mod state;
pub mod store;

#[cfg(test)]
mod tests;

pub use builder::{CellMapKey, HierarchyBuilder, Phase};
pub use error::{DeepError, Result};
pub use flat::{CollectionId, FlatShape, FlatShapes, FlatSource};
pub use layer::DeepLayer;
pub use state::DeepShapeStoreState;
pub use store::{ContextId, DeepShapeStore, StoreId, VariantMap};
