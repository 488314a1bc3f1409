use thiserror::Error;

use crate::registry::ItemId;

/// Unified result type for the justified grid crate.
pub type Result<T> = std::result::Result<T, GridError>;

/// Errors surfaced by the layout engine.
#[derive(Debug, Error)]
pub enum GridError {
    #[error("item `{0}` not found")]
    ItemNotFound(ItemId),
    #[error("option `{name}` resolved to invalid value {value}")]
    InvalidOption { name: &'static str, value: f64 },
    #[error("renderer rejected frame: {0}")]
    Render(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
