//! Engine lifecycle audit hooks.
//!
//! Records capture a stage identifier plus structured details so callers can
//! buffer or inspect the engine's progression (how many flushes a burst of
//! notifications produced, which renders were skipped) without parsing logs.

use std::sync::Mutex;
use std::time::SystemTime;

use serde_json::Value;

/// Distinct checkpoints emitted by `JustifiedGrid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditStage {
    /// Items were appended to the registry.
    ItemRegistered,
    /// A size or failure notification entered an insert queue.
    NotificationQueued,
    /// Queued notifications were applied and the layout recomputed.
    BatchFlushed,
    /// Options were patched.
    OptionsChanged,
    /// A frame was handed to the renderer.
    RenderCommitted,
    /// A frame matched the last applied one and was not re-applied.
    RenderSkipped,
    /// A resize left the container width unchanged.
    ResizeIgnored,
}

#[derive(Debug, Clone)]
pub struct AuditEvent {
    pub timestamp: SystemTime,
    pub stage: AuditStage,
    pub details: Vec<(String, Value)>,
}

impl AuditEvent {
    pub fn new(stage: AuditStage) -> Self {
        Self {
            timestamp: SystemTime::now(),
            stage,
            details: Vec::new(),
        }
    }

    pub fn detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.push((key.into(), value.into()));
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.details
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value)
    }
}

/// Trait implemented by any audit sink.
pub trait LayoutAudit: Send + Sync {
    fn record(&self, event: AuditEvent);
}

/// Default no-op implementation used when auditing is disabled.
#[derive(Debug, Default)]
pub struct NullAudit;

impl LayoutAudit for NullAudit {
    fn record(&self, _event: AuditEvent) {}
}

/// Keeps every record in memory.
#[derive(Debug, Default)]
pub struct BufferedAudit {
    events: Mutex<Vec<AuditEvent>>,
}

impl BufferedAudit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    pub fn count(&self, stage: AuditStage) -> usize {
        self.events
            .lock()
            .map(|guard| guard.iter().filter(|event| event.stage == stage).count())
            .unwrap_or(0)
    }
}

impl LayoutAudit for BufferedAudit {
    fn record(&self, event: AuditEvent) {
        if let Ok(mut guard) = self.events.lock() {
            guard.push(event);
        }
    }
}
