//! Layout model errors.

use crate::{CellId, InstanceId, LayerId};

/// The [`LayirError`] result type.
pub type Result<T, E = LayirError> = std::result::Result<T, E>;

/// An error raised by a layout edit or query.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum LayirError {
    /// The layout has no cell with the given ID.
    #[error("no cell with ID {0}")]
    NoSuchCell(CellId),

    /// The layout has no layer with the given ID.
    #[error("no layer with ID {0}")]
    NoSuchLayer(LayerId),

    /// The parent cell has no instance with the given ID.
    #[error("cell {cell} has no instance with ID {inst}")]
    NoSuchInstance {
        /// The parent cell.
        cell: CellId,
        /// The missing instance.
        inst: InstanceId,
    },

    /// Adding the instance would make a cell contain itself.
    #[error("instantiating cell {child} in cell {parent} would create a cycle")]
    CyclicHierarchy {
        /// The cell receiving the instance.
        parent: CellId,
        /// The instantiated cell.
        child: CellId,
    },
}
