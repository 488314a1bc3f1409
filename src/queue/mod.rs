//! Debounced insert queue.
//!
//! Size notifications arrive in bursts. Instead of relaying out per
//! notification, each `append` batch collects them and flushes once one of
//! three conditions holds: every item of the batch has reported, the hard
//! cap since the previous flush has passed, or no notification arrived for
//! the quiet window. Time is passed in explicitly so the host decides how
//! timers are armed.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use crate::geometry::NaturalSize;
use crate::registry::ItemId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueConfig {
    /// Hard cap between flushes while notifications keep arriving.
    pub max_queue_time: Duration,
    /// Debounce window after the latest notification.
    pub max_quiet_time: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_queue_time: Duration::from_millis(1000),
            max_quiet_time: Duration::from_millis(400),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum QueueEntry {
    Ready {
        id: ItemId,
        size: NaturalSize,
    },
    Failed {
        id: ItemId,
        fallback: Option<NaturalSize>,
    },
}

impl QueueEntry {
    pub fn id(&self) -> ItemId {
        match self {
            QueueEntry::Ready { id, .. } | QueueEntry::Failed { id, .. } => *id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushReason {
    Finished,
    MaxQueueTime,
    QuietPeriod,
}

impl FlushReason {
    pub fn as_str(self) -> &'static str {
        match self {
            FlushReason::Finished => "finished",
            FlushReason::MaxQueueTime => "max_queue_time",
            FlushReason::QuietPeriod => "quiet_period",
        }
    }
}

/// Entries drained by a flush, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub struct Flush {
    pub reason: FlushReason,
    pub entries: Vec<QueueEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueState {
    Idle,
    Accumulating { deadline: Instant },
}

#[derive(Debug)]
pub struct InsertQueue {
    config: QueueConfig,
    members: HashSet<ItemId>,
    reported: HashSet<ItemId>,
    queue: Vec<QueueEntry>,
    last_flush: Instant,
    state: QueueState,
}

impl InsertQueue {
    pub fn new(
        config: QueueConfig,
        members: impl IntoIterator<Item = ItemId>,
        now: Instant,
    ) -> Self {
        Self {
            config,
            members: members.into_iter().collect(),
            reported: HashSet::new(),
            queue: Vec::new(),
            last_flush: now,
            state: QueueState::Idle,
        }
    }

    pub fn contains(&self, id: ItemId) -> bool {
        self.members.contains(&id)
    }

    pub fn state(&self) -> QueueState {
        self.state
    }

    pub fn deadline(&self) -> Option<Instant> {
        match self.state {
            QueueState::Idle => None,
            QueueState::Accumulating { deadline } => Some(deadline),
        }
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Every member has reported and nothing is left to flush.
    pub fn is_complete(&self) -> bool {
        self.queue.is_empty() && self.all_reported()
    }

    /// Queues `entry` and flushes right away when the batch is finished or
    /// the hard cap has passed; otherwise (re)arms the quiet-window deadline.
    pub fn enqueue(&mut self, entry: QueueEntry, now: Instant) -> Option<Flush> {
        self.reported.insert(entry.id());
        self.queue.push(entry);

        if self.all_reported() {
            return Some(self.drain(FlushReason::Finished, now));
        }
        if now.saturating_duration_since(self.last_flush) > self.config.max_queue_time {
            return Some(self.drain(FlushReason::MaxQueueTime, now));
        }

        self.state = QueueState::Accumulating {
            deadline: now + self.config.max_quiet_time,
        };
        None
    }

    /// Flushes once the quiet-window deadline has elapsed.
    pub fn poll(&mut self, now: Instant) -> Option<Flush> {
        match self.state {
            QueueState::Accumulating { deadline } if now >= deadline => {
                Some(self.drain(FlushReason::QuietPeriod, now))
            }
            _ => None,
        }
    }

    fn all_reported(&self) -> bool {
        self.reported.len() >= self.members.len()
    }

    fn drain(&mut self, reason: FlushReason, now: Instant) -> Flush {
        self.state = QueueState::Idle;
        self.last_flush = now;
        Flush {
            reason,
            entries: std::mem::take(&mut self.queue),
        }
    }
}
