use crate::logging::{LogEvent, LogFields, LogLevel};
use serde_json::json;
use std::time::Duration;

#[derive(Debug, Default, Clone)]
pub struct GridMetrics {
    items_registered: u64,
    notifications: u64,
    flushes: u64,
    flushed_entries: u64,
    renders: u64,
    renders_skipped: u64,
    resizes_ignored: u64,
}

impl GridMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_registered(&mut self, count: usize) {
        self.items_registered = self.items_registered.saturating_add(count as u64);
    }

    pub fn record_notification(&mut self) {
        self.notifications = self.notifications.saturating_add(1);
    }

    pub fn record_flush(&mut self, entries: usize) {
        self.flushes = self.flushes.saturating_add(1);
        self.flushed_entries = self.flushed_entries.saturating_add(entries as u64);
    }

    /// `applied` is false when the frame matched the last one handed to the renderer.
    pub fn record_render(&mut self, applied: bool) {
        self.renders = self.renders.saturating_add(1);
        if !applied {
            self.renders_skipped = self.renders_skipped.saturating_add(1);
        }
    }

    pub fn record_resize_ignored(&mut self) {
        self.resizes_ignored = self.resizes_ignored.saturating_add(1);
    }

    pub fn snapshot(&self, uptime: Duration) -> MetricSnapshot {
        MetricSnapshot {
            uptime_ms: uptime.as_millis() as u64,
            items_registered: self.items_registered,
            notifications: self.notifications,
            flushes: self.flushes,
            flushed_entries: self.flushed_entries,
            renders: self.renders,
            renders_skipped: self.renders_skipped,
            resizes_ignored: self.resizes_ignored,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricSnapshot {
    pub uptime_ms: u64,
    pub items_registered: u64,
    pub notifications: u64,
    pub flushes: u64,
    pub flushed_entries: u64,
    pub renders: u64,
    pub renders_skipped: u64,
    pub resizes_ignored: u64,
}

impl MetricSnapshot {
    pub fn to_log_event(&self, target: &str) -> LogEvent {
        LogEvent::with_fields(LogLevel::Info, target, "grid_metrics", self.as_fields())
    }

    pub fn as_fields(&self) -> LogFields {
        let mut map = LogFields::new();
        map.insert("uptime_ms".to_string(), json!(self.uptime_ms));
        map.insert("items_registered".to_string(), json!(self.items_registered));
        map.insert("notifications".to_string(), json!(self.notifications));
        map.insert("flushes".to_string(), json!(self.flushes));
        map.insert("flushed_entries".to_string(), json!(self.flushed_entries));
        map.insert("renders".to_string(), json!(self.renders));
        map.insert("renders_skipped".to_string(), json!(self.renders_skipped));
        map.insert("resizes_ignored".to_string(), json!(self.resizes_ignored));
        map
    }
}
