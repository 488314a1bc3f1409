//! Layout pipeline orchestrator.
//!
//! A relayout runs three stages in order: the precalculation stage filters
//! the registry down to items that can be placed, the packer partitions
//! them into rows, and the justifier turns rows into pixel rectangles.

mod justify;
mod packing;
mod precalc;

pub use justify::{GridGeometry, PlacedItem, RowGeometry, compute_geometry};
pub use packing::{PackedRow, pack_rows, target_row_count};
pub use precalc::{
    PLACEHOLDER_RATIO, PrecalcCache, PrecalcKey, ValidItem, ValidItemSet, compute_valid_items,
};
