//! Render instruction sets and the renderer seam.
//!
//! The engine never touches pixels; it hands a [`GridFrame`] to whatever
//! [`GridRenderer`] the host installed.

mod core;

pub use core::{
    GridFrame, GridRenderer, ItemPlacement, NullRenderer, RowFrame, StyleRenderer, build_frame,
};
