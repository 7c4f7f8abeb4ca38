//! Paced, prioritized delivery of narrator utterances.
//!
//! The queue owns every [`ResponseItem`] from enqueue to delivery or
//! cancellation and guarantees:
//!
//! - delivery in (priority, sequence) order, one item at a time;
//! - **supersession**: enqueuing above-background work removes queued
//!   lower-priority cancellable items;
//! - **consolidation**: at most one background item is ever queued;
//! - a minimum gap between consecutive successful deliveries;
//! - exactly one delivery task per queue, started lazily on enqueue;
//! - sequence ids allocated atomically, contiguous from 1.
//!
//! A failing delivery callback is logged and skipped; it is never retried
//! and never stops the loop.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// Delivery priority; lower sorts first.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Critical,
    Urgent,
    Normal,
    Background,
}

/// One narrator utterance, immutable once created.
#[derive(Debug, Clone)]
pub struct ResponseItem {
    pub content: String,
    pub priority: Priority,
    /// Monotonic, globally unique id from [`DeliveryQueue::next_sequence_id`].
    pub sequence: u64,
    pub emotion: Option<String>,
    pub cancellable: bool,
    pub source: String,
    pub created_at: std::time::Instant,
}

impl ResponseItem {
    pub fn new(content: impl Into<String>, priority: Priority, sequence: u64) -> Self {
        Self {
            content: content.into(),
            priority,
            sequence,
            emotion: None,
            cancellable: true,
            source: "director".to_string(),
            created_at: std::time::Instant::now(),
        }
    }

    pub fn with_emotion(mut self, emotion: impl Into<String>) -> Self {
        self.emotion = Some(emotion.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Protect the item from supersession and explicit cancellation.
    pub fn not_cancellable(mut self) -> Self {
        self.cancellable = false;
        self
    }
}

/// Errors surfaced by the external delivery callback.
#[derive(Debug, Clone, Error)]
pub enum DeliveryError {
    #[error("delivery sink failure: {0}")]
    Sink(String),
}

/// External callback delivering one utterance, invoked at most once per
/// item.
#[async_trait]
pub trait DeliverySink: Send + Sync {
    async fn send(&self, content: &str, emotion: Option<&str>) -> Result<(), DeliveryError>;
}

/// Point-in-time view of the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueStatus {
    pub queued: usize,
    pub critical: usize,
    pub urgent: usize,
    pub normal: usize,
    pub background: usize,
    /// Whether the delivery task is currently running.
    pub delivering: bool,
    /// Time since the last successful delivery, if any.
    pub last_delivery_age: Option<Duration>,
    /// Next sequence id that will be handed out.
    pub next_sequence: u64,
}

struct QueueState {
    items: Vec<ResponseItem>,
    loop_running: bool,
    last_delivery: Option<tokio::time::Instant>,
}

struct Inner {
    sink: Arc<dyn DeliverySink>,
    min_gap: Duration,
    next_sequence: AtomicU64,
    state: Mutex<QueueState>,
}

/// Handle to one session's delivery queue. Cloning shares the queue.
#[derive(Clone)]
pub struct DeliveryQueue {
    inner: Arc<Inner>,
}

impl DeliveryQueue {
    /// Build a queue over a delivery sink with a minimum inter-delivery
    /// gap. Must be used from within a tokio runtime; the delivery task is
    /// spawned lazily on first enqueue.
    pub fn new(sink: Arc<dyn DeliverySink>, min_gap: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                sink,
                min_gap,
                next_sequence: AtomicU64::new(1),
                state: Mutex::new(QueueState {
                    items: Vec::new(),
                    loop_running: false,
                    last_delivery: None,
                }),
            }),
        }
    }

    /// Allocate the next sequence id. Safe under concurrent callers;
    /// ids are contiguous starting from 1.
    pub fn next_sequence_id(&self) -> u64 {
        self.inner.next_sequence.fetch_add(1, Ordering::SeqCst)
    }

    /// Queue an utterance for delivery, applying supersession and
    /// background consolidation, and start the delivery task if idle.
    pub fn enqueue(&self, item: ResponseItem, supersede_lower_priority: bool) {
        let mut state = self.inner.state.lock().unwrap_or_else(PoisonError::into_inner);

        if item.priority == Priority::Background {
            // Only the newest background item is ever queued.
            state.items.retain(|queued| queued.priority != Priority::Background);
        } else if supersede_lower_priority {
            state
                .items
                .retain(|queued| !(queued.priority > item.priority && queued.cancellable));
        }

        debug!(
            sequence = item.sequence,
            priority = ?item.priority,
            "utterance queued"
        );
        state.items.push(item);
        state.items.sort_by_key(|queued| (queued.priority, queued.sequence));

        if !state.loop_running {
            state.loop_running = true;
            let inner = Arc::clone(&self.inner);
            tokio::spawn(Inner::delivery_loop(inner));
        }
    }

    /// Remove a queued cancellable item by sequence id. Returns how many
    /// items were removed (0 or 1). An item whose delivery has already
    /// started is not affected.
    pub fn cancel_by_sequence(&self, sequence: u64) -> usize {
        let mut state = self.inner.state.lock().unwrap_or_else(PoisonError::into_inner);
        let before = state.items.len();
        state
            .items
            .retain(|queued| !(queued.sequence == sequence && queued.cancellable));
        before - state.items.len()
    }

    /// Remove all queued cancellable background items.
    pub fn clear_background(&self) -> usize {
        let mut state = self.inner.state.lock().unwrap_or_else(PoisonError::into_inner);
        let before = state.items.len();
        state
            .items
            .retain(|queued| !(queued.priority == Priority::Background && queued.cancellable));
        before - state.items.len()
    }

    /// Snapshot the queue state.
    pub fn status(&self) -> QueueStatus {
        let state = self.inner.state.lock().unwrap_or_else(PoisonError::into_inner);
        let count = |priority| {
            state
                .items
                .iter()
                .filter(|queued| queued.priority == priority)
                .count()
        };
        QueueStatus {
            queued: state.items.len(),
            critical: count(Priority::Critical),
            urgent: count(Priority::Urgent),
            normal: count(Priority::Normal),
            background: count(Priority::Background),
            delivering: state.loop_running,
            last_delivery_age: state.last_delivery.map(|at| at.elapsed()),
            next_sequence: self.inner.next_sequence.load(Ordering::SeqCst),
        }
    }
}

impl Inner {
    async fn delivery_loop(inner: Arc<Inner>) {
        loop {
            let (item, wait) = {
                let mut state = inner.state.lock().unwrap_or_else(PoisonError::into_inner);
                if state.items.is_empty() {
                    // Clearing the flag under the same lock enqueue takes
                    // means a racing enqueue either sees the flag still set
                    // or observes it cleared and starts a fresh task.
                    state.loop_running = false;
                    return;
                }
                let item = state.items.remove(0);
                let wait = state
                    .last_delivery
                    .and_then(|at| inner.min_gap.checked_sub(at.elapsed()));
                (item, wait)
            };

            if let Some(wait) = wait {
                tokio::time::sleep(wait).await;
            }

            match inner.sink.send(&item.content, item.emotion.as_deref()).await {
                Ok(()) => {
                    debug!(sequence = item.sequence, source = %item.source, "utterance delivered");
                    let mut state = inner.state.lock().unwrap_or_else(PoisonError::into_inner);
                    state.last_delivery = Some(tokio::time::Instant::now());
                }
                Err(err) => {
                    warn!(
                        sequence = item.sequence,
                        error = %err,
                        "delivery failed; dropping item and continuing"
                    );
                }
            }
        }
    }
}
