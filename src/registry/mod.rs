//! Item registry orchestrator.
//!
//! Items are append-only; an [`ItemId`] is the item's insertion position and
//! stays valid for the lifetime of the engine.

mod core;

pub use core::{Item, ItemId, ItemRegistry, ItemStatus};
