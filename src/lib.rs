//! Justified grid layout engine.
//!
//! Items of arbitrary aspect ratio are packed into rows that exactly fill the
//! container width while keeping every row close to a desired height. Item
//! sizes usually arrive asynchronously, so notifications are debounced per
//! append batch and the layout is recomputed once per flush. The engine is
//! headless: a [`GridRenderer`] applies each [`GridFrame`] to the real
//! surface.

pub mod error;
pub mod geometry;
pub mod layout;
pub mod logging;
pub mod metrics;
pub mod options;
pub mod queue;
pub mod registry;
pub mod render;
pub mod runtime;

pub use error::{GridError, Result};
pub use geometry::{NaturalSize, Rect};
pub use layout::{GridGeometry, PackedRow, ValidItemSet, compute_geometry, pack_rows};
pub use logging::{
    FileSink, LogEvent, LogFields, LogLevel, LogSink, Logger, LoggingError, LoggingResult,
    MemorySink,
};
pub use metrics::{GridMetrics, MetricSnapshot};
pub use options::{GridOptions, OptionKey, OptionValue, OptionsPatch, ResolvedOption};
pub use queue::{FlushReason, QueueConfig};
pub use registry::{ItemId, ItemRegistry, ItemStatus};
pub use render::{GridFrame, GridRenderer, ItemPlacement, NullRenderer, RowFrame, StyleRenderer};
pub use runtime::audit::{AuditEvent, AuditStage, BufferedAudit, LayoutAudit, NullAudit};
pub use runtime::{
    Appended, EngineConfig, FixedViewport, ItemSource, JustifiedGrid, SharedViewport, Viewport,
};
