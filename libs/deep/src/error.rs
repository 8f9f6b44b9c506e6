//! Deep processing errors.

use layir::{CellId, LayerId, LayirError};

/// The [`DeepError`] result type.
pub type Result<T, E = DeepError> = std::result::Result<T, E>;

#[derive(thiserror::Error, Debug)]
pub enum DeepError {
    /// The operation needs a store holding exactly one layout.
    #[error("the deep shape store does not hold exactly one layout")]
    NotSingular,

    #[error("no saved state to restore")]
    EmptyStateStack,

    /// A layer handle outlived its store.
    #[error("the deep shape store owning this layer was dropped")]
    StoreGone,

    #[error("no live layout with index {0}")]
    InvalidLayoutIndex(usize),

    #[error("layout {layout} has no layer {layer}")]
    InvalidLayer {
        /// The layout index.
        layout: usize,
        /// The missing layer.
        layer: LayerId,
    },

    /// A builder was driven by a traversal producing a different hierarchy
    /// than the one it was built from.
    #[error("traversal does not match the hierarchy built so far; reset the builder first")]
    IncompatiblePass,

    #[error("`{event}` is not valid while the builder is {phase}")]
    InvalidTransition {
        /// The rejected event.
        event: &'static str,
        /// The builder phase at the time of the event.
        phase: &'static str,
    },

    #[error("the source layout has no cell {0}")]
    EmptySource(CellId),

    #[error(transparent)]
    Layir(#[from] LayirError),

    #[error(transparent)]
    Toml(#[from] toml::de::Error),
}
