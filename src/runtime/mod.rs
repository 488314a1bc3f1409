use std::sync::{Arc, Mutex};
use std::time::Instant;

use blake3::Hash;
use serde_json::json;

use crate::error::{GridError, Result};
use crate::geometry::NaturalSize;
use crate::layout::{PrecalcCache, PrecalcKey, compute_geometry, pack_rows};
use crate::logging::{LogLevel, Logger, event_with_fields, json_kv};
use crate::metrics::{GridMetrics, MetricSnapshot};
use crate::options::{GridOptions, OptionKey, OptionsPatch, ResolvedOption, check_length};
use crate::queue::{Flush, InsertQueue, QueueConfig, QueueEntry};
use crate::registry::{ItemId, ItemRegistry};
use crate::render::{GridFrame, GridRenderer, NullRenderer, build_frame};

pub mod audit;
mod viewport;

pub use viewport::{FixedViewport, SharedViewport, Viewport};

use audit::{AuditEvent, AuditStage, LayoutAudit, NullAudit};

const LOG_TARGET: &str = "justified_grid::engine";

/// Ambient configuration for the engine.
#[derive(Clone)]
pub struct EngineConfig {
    /// Debounce timings applied to every append batch.
    pub queue: QueueConfig,
    /// Optional structured logger used by the engine.
    pub logger: Option<Logger>,
    /// Counters updated on every flush and render.
    pub metrics: Option<Arc<Mutex<GridMetrics>>>,
    pub audit: Arc<dyn LayoutAudit>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            queue: QueueConfig::default(),
            logger: None,
            metrics: None,
            audit: Arc::new(NullAudit),
        }
    }
}

impl EngineConfig {
    /// Enable metrics collection if it has not already been configured.
    pub fn enable_metrics(&mut self) {
        if self.metrics.is_none() {
            self.metrics = Some(Arc::new(Mutex::new(GridMetrics::new())));
        }
    }

    pub fn disable_metrics(&mut self) {
        self.metrics = None;
    }

    pub fn metrics_handle(&self) -> Option<Arc<Mutex<GridMetrics>>> {
        self.metrics.as_ref().map(Arc::clone)
    }
}

/// How an appended item learns its natural size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ItemSource {
    /// Size arrives later through `notify_ready` / `notify_failed`.
    Pending,
    /// Size is known at registration.
    Sized { width: f64, height: f64 },
}

/// Outcome of [`JustifiedGrid::append`]. Ids are assigned before any
/// layout work, so they are returned even when the relayout fails.
#[derive(Debug)]
#[must_use]
pub struct Appended {
    pub ids: Vec<ItemId>,
    pub render: Result<GridFrame>,
}

impl Appended {
    /// The ids when the relayout succeeded, its error otherwise.
    pub fn into_result(self) -> Result<Vec<ItemId>> {
        self.render.map(|_| self.ids)
    }
}

/// Justified grid layout engine bound to one container.
pub struct JustifiedGrid {
    options: GridOptions,
    registry: ItemRegistry,
    precalc: PrecalcCache,
    batches: Vec<InsertQueue>,
    viewport: Box<dyn Viewport>,
    observed_width: f64,
    renderer: Box<dyn GridRenderer>,
    config: EngineConfig,
    last_frame: Option<GridFrame>,
    last_applied: Option<Hash>,
    started_at: Instant,
}

impl JustifiedGrid {
    pub fn new<V>(viewport: V, options: GridOptions) -> Self
    where
        V: Viewport + 'static,
    {
        let observed_width = sanitize_width(viewport.container_width());
        Self {
            options,
            registry: ItemRegistry::new(),
            precalc: PrecalcCache::new(),
            batches: Vec::new(),
            viewport: Box::new(viewport),
            observed_width,
            renderer: Box::new(NullRenderer),
            config: EngineConfig::default(),
            last_frame: None,
            last_applied: None,
            started_at: Instant::now(),
        }
    }

    pub fn with_renderer<R>(mut self, renderer: R) -> Self
    where
        R: GridRenderer + 'static,
    {
        self.renderer = Box::new(renderer);
        self.last_applied = None;
        self
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config_mut(&mut self) -> &mut EngineConfig {
        &mut self.config
    }

    pub fn registry(&self) -> &ItemRegistry {
        &self.registry
    }

    pub fn options(&self) -> &GridOptions {
        &self.options
    }

    /// Frame produced by the latest render.
    pub fn last_frame(&self) -> Option<&GridFrame> {
        self.last_frame.as_ref()
    }

    pub fn container_width(&self) -> f64 {
        self.viewport.container_width()
    }

    /// Append batches still waiting for notifications or a flush.
    pub fn pending_batches(&self) -> usize {
        self.batches
            .iter()
            .filter(|batch| !batch.is_complete())
            .count()
    }

    pub fn metrics_snapshot(&self) -> Option<MetricSnapshot> {
        let metrics = self.config.metrics.as_ref()?;
        let guard = metrics.lock().ok()?;
        Some(guard.snapshot(self.started_at.elapsed()))
    }

    /// Emits the current counters through the configured logger.
    pub fn log_metrics(&self) {
        if let (Some(logger), Some(snapshot)) =
            (self.config.logger.as_ref(), self.metrics_snapshot())
        {
            let _ = logger.log_event(snapshot.to_log_event(LOG_TARGET));
        }
    }

    /// Resolves an option, evaluating derived values against the engine.
    pub fn get_option(&self, key: OptionKey) -> ResolvedOption {
        match key {
            OptionKey::SpaceBetweenElements => {
                ResolvedOption::Number(self.options.space_between_elements.resolve(self))
            }
            OptionKey::DesiredElementHeight => {
                ResolvedOption::Number(self.options.desired_element_height.resolve(self))
            }
            OptionKey::AutoFontSize => {
                ResolvedOption::Flag(self.options.auto_font_size.resolve(self))
            }
            OptionKey::HideBoxOnMissingImage => {
                ResolvedOption::Flag(self.options.hide_box_on_missing_image.resolve(self))
            }
        }
    }

    /// Patches the options, firing the option hooks around the change, and
    /// renders with the new values.
    ///
    /// A patch whose lengths resolve to invalid values is rolled back before
    /// `on_options_changed` fires.
    pub fn set_options(&mut self, patch: OptionsPatch) -> Result<GridFrame> {
        patch.validate()?;

        if let Some(hook) = self.options.on_before_options_changed.clone() {
            hook(&*self);
        }

        let changed: Vec<&str> = patch.keys().into_iter().map(OptionKey::name).collect();
        let previous = self.options.clone();
        self.options.apply(patch);
        if let Err(err) = self.spacing().and_then(|_| self.precalc_key()) {
            self.options = previous;
            return Err(err);
        }

        if let Some(hook) = self.options.on_options_changed.clone() {
            hook(&*self);
        }

        self.audit(AuditEvent::new(AuditStage::OptionsChanged).detail("options", json!(changed)));
        self.log_event(
            LogLevel::Info,
            "options_changed",
            [json_kv("options", json!(changed))],
        );

        self.render()
    }

    /// Registers items at the end of the grid in one batch and renders.
    ///
    /// Sized items are queued right away; a batch made only of sized items
    /// therefore flushes before this returns. Registration itself cannot
    /// fail: the ids come back even when the relayout does not.
    pub fn append<I>(&mut self, sources: I, now: Instant) -> Appended
    where
        I: IntoIterator<Item = ItemSource>,
    {
        let sources: Vec<ItemSource> = sources.into_iter().collect();
        let ids: Vec<ItemId> = sources.iter().map(|_| self.registry.register()).collect();
        self.precalc.invalidate();

        self.record_metric(|metrics| metrics.record_registered(ids.len()));
        self.audit(AuditEvent::new(AuditStage::ItemRegistered).detail("count", ids.len()));
        self.log_event(
            LogLevel::Debug,
            "items_registered",
            [
                json_kv("count", ids.len()),
                json_kv("total", self.registry.len()),
            ],
        );

        let mut batch = InsertQueue::new(self.config.queue, ids.iter().copied(), now);
        let mut flushes = Vec::new();
        for (id, source) in ids.iter().zip(&sources) {
            if let ItemSource::Sized { width, height } = *source {
                let size = NaturalSize::new(width, height);
                flushes.extend(batch.enqueue(QueueEntry::Ready { id: *id, size }, now));
                self.note_queued(*id, batch.queued());
            }
        }
        self.batches.push(batch);

        let render = self.commit_flushes(flushes).and_then(|()| self.render());
        Appended { ids, render }
    }

    /// The item's natural size became known.
    pub fn notify_ready(
        &mut self,
        id: ItemId,
        width: f64,
        height: f64,
        now: Instant,
    ) -> Result<()> {
        let size = NaturalSize::new(width, height);
        self.enqueue(QueueEntry::Ready { id, size }, now)
    }

    /// The item's content failed to resolve. `fallback` is the size of
    /// whatever content is still shown, if any.
    pub fn notify_failed(
        &mut self,
        id: ItemId,
        fallback: Option<NaturalSize>,
        now: Instant,
    ) -> Result<()> {
        self.enqueue(QueueEntry::Failed { id, fallback }, now)
    }

    /// Fires every debounce deadline that has elapsed. Returns how many
    /// batches were flushed; all of them share a single relayout.
    pub fn tick(&mut self, now: Instant) -> Result<usize> {
        let flushes: Vec<Flush> = self
            .batches
            .iter_mut()
            .filter_map(|batch| batch.poll(now))
            .collect();
        let count = flushes.len();
        if count > 0 {
            self.commit_flushes(flushes)?;
            self.render()?;
        }
        Ok(count)
    }

    /// Earliest armed debounce deadline; the host should call `tick` then.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.batches.iter().filter_map(InsertQueue::deadline).min()
    }

    /// Re-reads the container width and relayouts only if it changed.
    pub fn resize(&mut self) -> Result<Option<GridFrame>> {
        let width = sanitize_width(self.viewport.container_width());
        if width == self.observed_width {
            self.record_metric(GridMetrics::record_resize_ignored);
            self.audit(AuditEvent::new(AuditStage::ResizeIgnored).detail("width", width));
            return Ok(None);
        }

        self.log_event(
            LogLevel::Info,
            "resized",
            [
                json_kv("from", self.observed_width),
                json_kv("to", width),
            ],
        );
        self.observed_width = width;
        self.render().map(Some)
    }

    /// Lays out every valid item and hands the frame to the renderer.
    ///
    /// The renderer is skipped when the frame is identical to the last one
    /// it received; the render hooks fire either way.
    pub fn render(&mut self) -> Result<GridFrame> {
        let spacing = self.spacing()?;
        let key = self.precalc_key()?;
        let auto_font_size = self.options.auto_font_size.resolve(self);
        let width = sanitize_width(self.viewport.container_width());

        self.precalc.refresh(&self.registry, key);
        let set = self.precalc.set();
        let rows = pack_rows(&set.items, set.ideal_width_sum, width, spacing);
        let geometry = compute_geometry(&set.items, &rows, width, spacing);
        let frame = build_frame(&geometry, set, auto_font_size);

        if let Some(hook) = self.options.on_before_render.clone() {
            hook(&*self);
        }

        let fingerprint = frame.fingerprint();
        let applied = self.last_applied != Some(fingerprint);
        if applied {
            self.renderer.apply(&frame)?;
            self.last_applied = Some(fingerprint);
        }
        self.last_frame = Some(frame.clone());

        self.record_metric(|metrics| metrics.record_render(applied));
        let (stage, message) = if applied {
            (AuditStage::RenderCommitted, "render_committed")
        } else {
            (AuditStage::RenderSkipped, "render_skipped")
        };
        self.audit(
            AuditEvent::new(stage)
                .detail("rows", frame.rows.len())
                .detail("items", frame.item_count())
                .detail("height", frame.height),
        );
        self.log_event(
            LogLevel::Debug,
            message,
            [
                json_kv("rows", frame.rows.len()),
                json_kv("items", frame.item_count()),
                json_kv("width", frame.width),
                json_kv("height", frame.height),
            ],
        );

        if let Some(hook) = self.options.on_render.clone() {
            hook(&*self);
        }

        Ok(frame)
    }

    fn enqueue(&mut self, entry: QueueEntry, now: Instant) -> Result<()> {
        let id = entry.id();
        let Some(batch) = self.batches.iter_mut().find(|batch| batch.contains(id)) else {
            return Err(GridError::ItemNotFound(id));
        };
        let flush = batch.enqueue(entry, now);
        let queued = batch.queued();
        self.note_queued(id, queued);

        if let Some(flush) = flush {
            self.commit_flushes(vec![flush])?;
            self.render()?;
        }
        Ok(())
    }

    fn note_queued(&self, id: ItemId, queued: usize) {
        self.record_metric(GridMetrics::record_notification);
        self.audit(
            AuditEvent::new(AuditStage::NotificationQueued)
                .detail("item", id.0)
                .detail("queued", queued),
        );
    }

    /// Writes flushed entries to the registry in arrival order. The cached
    /// valid-item set goes stale first, so the next render rescans even if
    /// this or the relayout fails.
    fn commit_flushes(&mut self, flushes: Vec<Flush>) -> Result<()> {
        if flushes.is_empty() {
            return Ok(());
        }
        self.precalc.invalidate();

        for flush in &flushes {
            for entry in &flush.entries {
                match *entry {
                    QueueEntry::Ready { id, size } => self.registry.mark_ready(id, size)?,
                    QueueEntry::Failed { id, fallback } => {
                        self.registry.mark_failed(id, fallback)?
                    }
                }
            }

            let entries = flush.entries.len();
            self.record_metric(|metrics| metrics.record_flush(entries));
            self.audit(
                AuditEvent::new(AuditStage::BatchFlushed)
                    .detail("reason", flush.reason.as_str())
                    .detail("entries", entries),
            );
            self.log_event(
                LogLevel::Debug,
                "batch_flushed",
                [
                    json_kv("reason", flush.reason.as_str()),
                    json_kv("entries", entries),
                ],
            );
        }

        Ok(())
    }

    fn spacing(&self) -> Result<f64> {
        check_length(
            OptionKey::SpaceBetweenElements,
            self.options.space_between_elements.resolve(self),
        )
    }

    fn precalc_key(&self) -> Result<PrecalcKey> {
        let desired_row_height = check_length(
            OptionKey::DesiredElementHeight,
            self.options.desired_element_height.resolve(self),
        )?;
        Ok(PrecalcKey {
            desired_row_height,
            hide_on_missing: self.options.hide_box_on_missing_image.resolve(self),
        })
    }

    fn audit(&self, event: AuditEvent) {
        self.config.audit.record(event);
    }

    fn record_metric(&self, update: impl FnOnce(&mut GridMetrics)) {
        if let Some(metrics) = self.config.metrics.as_ref() {
            if let Ok(mut guard) = metrics.lock() {
                update(&mut guard);
            }
        }
    }

    fn log_event<I>(&self, level: LogLevel, message: &str, fields: I)
    where
        I: IntoIterator<Item = (String, serde_json::Value)>,
    {
        if let Some(logger) = self.config.logger.as_ref() {
            let event = event_with_fields(level, LOG_TARGET, message, fields);
            let _ = logger.log_event(event);
        }
    }
}

/// Unusable widths collapse to zero instead of poisoning the geometry.
fn sanitize_width(width: f64) -> f64 {
    if width.is_finite() && width > 0.0 {
        width
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::MemorySink;
    use crate::options::OptionValue;
    use super::audit::BufferedAudit;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    fn options() -> GridOptions {
        GridOptions {
            space_between_elements: OptionValue::Literal(0.0),
            desired_element_height: OptionValue::Literal(200.0),
            ..GridOptions::default()
        }
    }

    fn squares(count: usize) -> Vec<ItemSource> {
        vec![
            ItemSource::Sized {
                width: 100.0,
                height: 100.0,
            };
            count
        ]
    }

    fn widths(frame: &GridFrame) -> Vec<f64> {
        frame.placements().map(|item| item.rect.width).collect()
    }

    #[derive(Clone, Default)]
    struct RecordingRenderer {
        frames: Arc<Mutex<Vec<GridFrame>>>,
    }

    impl GridRenderer for RecordingRenderer {
        fn apply(&mut self, frame: &GridFrame) -> Result<()> {
            self.frames.lock().unwrap().push(frame.clone());
            Ok(())
        }
    }

    #[test]
    fn uniform_squares_fill_a_single_row() {
        let mut grid = JustifiedGrid::new(FixedViewport(1000.0), options());
        grid.append(squares(4), Instant::now()).into_result().unwrap();

        let frame = grid.last_frame().unwrap();
        assert_eq!(frame.rows.len(), 1);
        assert_eq!(widths(frame), vec![250.0; 4]);
        assert_eq!(frame.rows[0].height, 250.0);
        assert_eq!(frame.height, 250.0);
        assert_eq!(grid.pending_batches(), 0);
    }

    #[test]
    fn hidden_failure_leaves_three_items() {
        let start = Instant::now();
        let mut grid = JustifiedGrid::new(FixedViewport(1000.0), options());
        let ids = grid
            .append(vec![ItemSource::Pending; 4], start)
            .into_result()
            .unwrap();
        assert_eq!(grid.last_frame().unwrap().pending, ids);

        grid.notify_ready(ids[0], 100.0, 100.0, start + ms(10)).unwrap();
        grid.notify_ready(ids[1], 100.0, 100.0, start + ms(20)).unwrap();
        grid.notify_ready(ids[3], 100.0, 100.0, start + ms(30)).unwrap();
        grid.notify_failed(ids[2], None, start + ms(40)).unwrap();

        let frame = grid.last_frame().unwrap();
        assert_eq!(widths(frame), vec![333.0, 333.0, 334.0]);
        assert_eq!(frame.hidden, vec![ids[2]]);
        assert!(frame.placement(ids[2]).is_none());
        assert!(frame.pending.is_empty());
    }

    #[test]
    fn showing_failed_items_uses_placeholder_ratio() {
        let start = Instant::now();
        let mut grid = JustifiedGrid::new(FixedViewport(1000.0), options());
        let ids = grid
            .append(vec![ItemSource::Pending; 4], start)
            .into_result()
            .unwrap();
        for id in [ids[0], ids[1], ids[3]] {
            grid.notify_ready(id, 100.0, 100.0, start).unwrap();
        }
        grid.notify_failed(ids[2], None, start).unwrap();

        let frame = grid
            .set_options(OptionsPatch::new().hide_box_on_missing_image(false))
            .unwrap();
        assert_eq!(widths(&frame), vec![250.0; 4]);
        assert!(frame.hidden.is_empty());
        assert_eq!(frame.placement(ids[2]).unwrap().font_scale, 100.0);
    }

    #[test]
    fn burst_of_notifications_flushes_once() {
        let start = Instant::now();
        let audit = Arc::new(BufferedAudit::new());
        let mut config = EngineConfig {
            audit: audit.clone(),
            ..EngineConfig::default()
        };
        config.enable_metrics();
        let mut grid = JustifiedGrid::new(FixedViewport(1000.0), options()).with_config(config);

        let ids = grid
            .append(vec![ItemSource::Pending; 11], start)
            .into_result()
            .unwrap();
        for (idx, id) in ids.iter().take(10).enumerate() {
            let at = start + ms(50 * idx as u64);
            grid.notify_ready(*id, 100.0, 100.0, at).unwrap();
        }
        let last = start + ms(450);

        assert_eq!(audit.count(AuditStage::BatchFlushed), 0);
        assert_eq!(grid.next_deadline(), Some(last + ms(400)));
        assert_eq!(grid.tick(last + ms(399)).unwrap(), 0);
        assert_eq!(grid.tick(last + ms(400)).unwrap(), 1);

        assert_eq!(audit.count(AuditStage::BatchFlushed), 1);
        let flushed = audit
            .events()
            .into_iter()
            .find(|event| event.stage == AuditStage::BatchFlushed)
            .unwrap();
        assert_eq!(flushed.get("reason"), Some(&json!("quiet_period")));
        assert_eq!(flushed.get("entries"), Some(&json!(10)));

        let frame = grid.last_frame().unwrap();
        assert_eq!(frame.item_count(), 10);
        assert_eq!(frame.pending, vec![ids[10]]);
        assert_eq!(grid.next_deadline(), None);

        let snapshot = grid.metrics_snapshot().unwrap();
        assert_eq!(snapshot.flushes, 1);
        assert_eq!(snapshot.flushed_entries, 10);
        assert_eq!(snapshot.notifications, 10);
        assert_eq!(snapshot.items_registered, 11);
    }

    #[test]
    fn identical_frames_reach_the_renderer_once() {
        let renderer = RecordingRenderer::default();
        let frames = Arc::clone(&renderer.frames);
        let mut config = EngineConfig::default();
        config.enable_metrics();
        let mut grid = JustifiedGrid::new(FixedViewport(1000.0), options())
            .with_renderer(renderer)
            .with_config(config);

        grid.append(squares(4), Instant::now()).into_result().unwrap();
        let first = grid.render().unwrap();
        let second = grid.render().unwrap();

        assert_eq!(first, second);
        assert_eq!(frames.lock().unwrap().len(), 1);
        let snapshot = grid.metrics_snapshot().unwrap();
        // the append relayout plus the two explicit renders
        assert_eq!(snapshot.renders, 3);
        assert_eq!(snapshot.renders_skipped, 2);
    }

    /// Rejects the first `failures` frames, then accepts everything.
    struct FlakyRenderer {
        failures: usize,
    }

    impl GridRenderer for FlakyRenderer {
        fn apply(&mut self, frame: &GridFrame) -> Result<()> {
            if self.failures == 0 {
                return Ok(());
            }
            self.failures -= 1;
            Err(GridError::Render(format!("{} rows", frame.rows.len())))
        }
    }

    #[test]
    fn append_returns_ids_when_render_fails() {
        let start = Instant::now();
        let mut grid = JustifiedGrid::new(FixedViewport(1000.0), options())
            .with_renderer(FlakyRenderer { failures: 1 });

        let appended = grid.append(vec![ItemSource::Pending; 3], start);
        assert!(matches!(
            appended.render,
            Err(GridError::Render(ref reason)) if reason == "0 rows"
        ));
        assert_eq!(appended.ids, vec![ItemId(0), ItemId(1), ItemId(2)]);
        assert!(grid.last_frame().is_none());

        for id in &appended.ids {
            grid.notify_ready(*id, 100.0, 100.0, start).unwrap();
        }
        let frame = grid.last_frame().unwrap();
        assert_eq!(frame.item_count(), 3);
        assert_eq!(grid.pending_batches(), 0);
    }

    #[test]
    fn sized_items_survive_a_failed_append_render() {
        let mut grid = JustifiedGrid::new(FixedViewport(1000.0), options())
            .with_renderer(FlakyRenderer { failures: 1 });

        let appended = grid.append(squares(2), Instant::now());
        assert!(appended.render.is_err());
        assert_eq!(appended.ids.len(), 2);

        // nothing was applied, so the next render tries again
        let frame = grid.render().unwrap();
        assert_eq!(widths(&frame), vec![500.0, 500.0]);
    }

    #[test]
    fn resize_relayouts_only_on_width_change() {
        let viewport = SharedViewport::new(1000.0);
        let audit = Arc::new(BufferedAudit::new());
        let config = EngineConfig {
            audit: audit.clone(),
            ..EngineConfig::default()
        };
        let mut grid = JustifiedGrid::new(viewport.clone(), options()).with_config(config);
        grid.append(squares(6), Instant::now()).into_result().unwrap();
        assert_eq!(grid.last_frame().unwrap().rows.len(), 1);

        assert!(grid.resize().unwrap().is_none());
        assert_eq!(audit.count(AuditStage::ResizeIgnored), 1);

        viewport.set_width(500.0);
        let frame = grid.resize().unwrap().unwrap();
        assert_eq!(frame.rows.len(), 2);
        assert_eq!(frame.rows[0].items.len(), 3);
        assert!(grid.resize().unwrap().is_none());
    }

    #[test]
    fn unusable_width_is_gated_like_any_other() {
        let viewport = SharedViewport::new(1000.0);
        let mut grid = JustifiedGrid::new(viewport.clone(), options());
        grid.append(squares(2), Instant::now()).into_result().unwrap();

        viewport.set_width(f64::NAN);
        let frame = grid.resize().unwrap().unwrap();
        assert_eq!(frame.width, 0.0);
        assert!(grid.resize().unwrap().is_none());

        viewport.set_width(-5.0);
        assert!(grid.resize().unwrap().is_none());
    }

    #[test]
    fn hooks_fire_in_lifecycle_order() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let record = |name: &'static str| {
            let calls = Arc::clone(&calls);
            move |_: &JustifiedGrid| calls.lock().unwrap().push(name)
        };

        let mut grid = JustifiedGrid::new(FixedViewport(1000.0), options());
        grid.set_options(
            OptionsPatch::new()
                .on_before_options_changed(record("before_options"))
                .on_options_changed(record("options"))
                .on_before_render(record("before_render"))
                .on_render(record("render")),
        )
        .unwrap();
        calls.lock().unwrap().clear();

        grid.set_options(OptionsPatch::new().auto_font_size(true))
            .unwrap();
        assert_eq!(
            *calls.lock().unwrap(),
            vec!["before_options", "options", "before_render", "render"]
        );
    }

    #[test]
    fn derived_options_read_engine_state() {
        let viewport = SharedViewport::new(1000.0);
        let options = GridOptions {
            desired_element_height: OptionValue::derived(|grid| grid.container_width() / 5.0),
            ..options()
        };
        let grid = JustifiedGrid::new(viewport.clone(), options);

        assert_eq!(
            grid.get_option(OptionKey::DesiredElementHeight),
            ResolvedOption::Number(200.0)
        );
        viewport.set_width(600.0);
        assert_eq!(
            grid.get_option(OptionKey::DesiredElementHeight),
            ResolvedOption::Number(120.0)
        );
        assert_eq!(
            grid.get_option(OptionKey::HideBoxOnMissingImage).as_flag(),
            Some(true)
        );
        assert_eq!(grid.get_option(OptionKey::AutoFontSize).as_number(), None);
    }

    #[test]
    fn invalid_derived_option_is_rolled_back() {
        let mut grid = JustifiedGrid::new(FixedViewport(1000.0), options());
        let err = grid
            .set_options(
                OptionsPatch::new().space_between_elements(OptionValue::derived(|_| f64::NAN)),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            GridError::InvalidOption {
                name: "spaceBetweenElements",
                ..
            }
        ));

        assert_eq!(
            grid.get_option(OptionKey::SpaceBetweenElements),
            ResolvedOption::Number(0.0)
        );
        grid.append(squares(4), Instant::now()).into_result().unwrap();
        assert_eq!(widths(grid.last_frame().unwrap()), vec![250.0; 4]);
    }

    #[test]
    fn flush_during_failing_option_is_laid_out_after_recovery() {
        let broken = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&broken);
        let options = GridOptions {
            desired_element_height: OptionValue::derived(move |_| {
                if flag.load(Ordering::Relaxed) {
                    f64::NAN
                } else {
                    200.0
                }
            }),
            ..options()
        };
        let start = Instant::now();
        let mut grid = JustifiedGrid::new(FixedViewport(1000.0), options);
        let ids = grid
            .append(vec![ItemSource::Pending; 2], start)
            .into_result()
            .unwrap();

        broken.store(true, Ordering::Relaxed);
        grid.notify_ready(ids[0], 100.0, 100.0, start).unwrap();
        let err = grid
            .notify_ready(ids[1], 100.0, 100.0, start)
            .unwrap_err();
        assert!(matches!(
            err,
            GridError::InvalidOption {
                name: "desiredElementHeight",
                ..
            }
        ));

        broken.store(false, Ordering::Relaxed);
        let frame = grid.render().unwrap();
        assert_eq!(frame.item_count(), 2);
        assert!(frame.pending.is_empty());
    }

    #[test]
    fn unknown_items_are_rejected() {
        let mut grid = JustifiedGrid::new(FixedViewport(1000.0), options());
        let err = grid
            .notify_ready(ItemId(3), 10.0, 10.0, Instant::now())
            .unwrap_err();
        assert!(matches!(err, GridError::ItemNotFound(ItemId(3))));
    }

    #[test]
    fn second_append_lists_new_items_as_pending() {
        let start = Instant::now();
        let mut grid = JustifiedGrid::new(FixedViewport(1000.0), options());
        grid.append(squares(2), start).into_result().unwrap();
        let later = grid
            .append(vec![ItemSource::Pending; 2], start)
            .into_result()
            .unwrap();

        let frame = grid.last_frame().unwrap();
        assert_eq!(frame.item_count(), 2);
        assert_eq!(frame.pending, later);
        assert_eq!(grid.pending_batches(), 1);
    }

    #[test]
    fn late_failure_relayouts_immediately() {
        let mut grid = JustifiedGrid::new(FixedViewport(1000.0), options());
        let ids = grid.append(squares(2), Instant::now()).into_result().unwrap();
        assert_eq!(grid.last_frame().unwrap().item_count(), 2);

        grid.notify_failed(ids[1], None, Instant::now()).unwrap();
        let frame = grid.last_frame().unwrap();
        assert_eq!(frame.item_count(), 1);
        assert_eq!(frame.hidden, vec![ids[1]]);
    }

    #[test]
    fn rows_follow_registry_order_not_arrival_order() {
        let start = Instant::now();
        let mut grid = JustifiedGrid::new(FixedViewport(600.0), options());
        let ids = grid
            .append(vec![ItemSource::Pending; 3], start)
            .into_result()
            .unwrap();
        grid.notify_ready(ids[2], 100.0, 100.0, start).unwrap();
        grid.notify_ready(ids[0], 200.0, 100.0, start).unwrap();
        grid.notify_ready(ids[1], 100.0, 100.0, start).unwrap();

        let order: Vec<_> = grid
            .last_frame()
            .unwrap()
            .placements()
            .map(|item| item.id)
            .collect();
        assert_eq!(order, ids);
    }

    #[test]
    fn auto_font_size_scales_with_display_width() {
        let mut grid = JustifiedGrid::new(FixedViewport(1000.0), options());
        grid.append(squares(4), Instant::now()).into_result().unwrap();

        let frame = grid
            .set_options(OptionsPatch::new().auto_font_size(true))
            .unwrap();
        assert!(frame.placements().all(|item| item.font_scale == 250.0));
    }

    #[test]
    fn engine_logs_flushes_and_renders() {
        let sink = MemorySink::new();
        let config = EngineConfig {
            logger: Some(Logger::new(sink.clone())),
            ..EngineConfig::default()
        };
        let mut grid = JustifiedGrid::new(FixedViewport(1000.0), options()).with_config(config);
        grid.append(squares(2), Instant::now()).into_result().unwrap();
        grid.render().unwrap();

        let messages = sink.messages();
        assert_eq!(messages[0], "items_registered");
        assert!(messages.contains(&"batch_flushed".to_string()));
        assert!(messages.contains(&"render_committed".to_string()));
        assert!(messages.contains(&"render_skipped".to_string()));
        assert!(
            sink.events()
                .iter()
                .all(|event| event.target == "justified_grid::engine")
        );
    }

    #[test]
    fn metrics_snapshot_is_logged_on_request() {
        let sink = MemorySink::new();
        let mut config = EngineConfig {
            logger: Some(Logger::new(sink.clone())),
            ..EngineConfig::default()
        };
        config.enable_metrics();
        let handle = config.metrics_handle().unwrap();
        let mut grid = JustifiedGrid::new(FixedViewport(1000.0), options()).with_config(config);
        grid.append(squares(3), Instant::now()).into_result().unwrap();

        grid.log_metrics();
        let event = sink.events().pop().unwrap();
        assert_eq!(event.fields.get("flushes"), Some(&json!(1)));
        assert_eq!(handle.lock().unwrap().snapshot(Duration::ZERO).items_registered, 3);

        grid.config_mut().disable_metrics();
        let before = sink.events().len();
        grid.log_metrics();
        assert_eq!(sink.events().len(), before);
        assert!(grid.metrics_snapshot().is_none());
    }

    #[test]
    fn empty_grid_renders_zero_height() {
        let mut grid = JustifiedGrid::new(FixedViewport(1000.0), options());
        let frame = grid.render().unwrap();
        assert!(frame.rows.is_empty());
        assert_eq!(frame.height, 0.0);
    }
}
