use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Supplies the container width whenever the engine lays out.
pub trait Viewport {
    fn container_width(&self) -> f64;
}

/// Width that never changes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedViewport(pub f64);

impl Viewport for FixedViewport {
    fn container_width(&self) -> f64 {
        self.0
    }
}

/// Width cell shared between the host and the engine; clones observe the
/// same value. The host updates it from its resize handler.
#[derive(Debug, Clone, Default)]
pub struct SharedViewport {
    width_bits: Arc<AtomicU64>,
}

impl SharedViewport {
    pub fn new(width: f64) -> Self {
        let viewport = Self::default();
        viewport.set_width(width);
        viewport
    }

    pub fn set_width(&self, width: f64) {
        self.width_bits.store(width.to_bits(), Ordering::Relaxed);
    }
}

impl Viewport for SharedViewport {
    fn container_width(&self) -> f64 {
        f64::from_bits(self.width_bits.load(Ordering::Relaxed))
    }
}
