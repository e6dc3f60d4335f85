//! Decision and conversion events, and the queue that batches them.
//!
//! Deciding never waits on event delivery: [`EventDispatcher::dispatch`] only
//! appends to an in-memory buffer, and a background task started with
//! [`EventQueue::start`] hands full batches to an [`EventSender`].

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::interval;
use uuid::Uuid;

use crate::config::{EventDefinition, ProjectConfig};
use crate::core::config::ClientOptions;
use crate::core::decision_service::DecisionOutcome;
use crate::error::{ErrorCode, FlagKitError, Result};
use crate::types::{Attributes, DecisionSource};

/// Buffered events that trigger a delivery.
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Seconds between timed deliveries.
pub const DEFAULT_FLUSH_INTERVAL_SECS: u64 = 30;

/// Buffer bound; the oldest event is dropped beyond it.
pub const DEFAULT_MAX_QUEUE_SIZE: usize = 1000;

/// Longest accepted conversion event key.
pub const MAX_EVENT_KEY_LENGTH: usize = 256;

/// What happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    /// A user was assigned a variation by an experiment or rollout rule.
    #[serde(rename_all = "camelCase")]
    Impression {
        flag_key: String,
        rule_id: String,
        rule_key: String,
        rule_type: String,
        variation_id: String,
        variation_key: String,
        enabled: bool,
    },
    /// A user performed a tracked action.
    #[serde(rename_all = "camelCase")]
    Conversion {
        event_id: String,
        event_key: String,
        #[serde(default, skip_serializing_if = "HashMap::is_empty")]
        tags: HashMap<String, serde_json::Value>,
    },
}

/// A record handed to the event pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: Uuid,
    /// Timestamp in RFC3339 format.
    pub timestamp: String,
    pub account_id: String,
    pub project_id: String,
    pub revision: u32,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub attributes: Attributes,
    #[serde(flatten)]
    pub kind: EventKind,
}

impl Event {
    fn new(config: &ProjectConfig, user_id: &str, attributes: &Attributes, kind: EventKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            account_id: config.account_id().to_string(),
            project_id: config.project_id().to_string(),
            revision: config.revision(),
            user_id: user_id.to_string(),
            attributes: attributes.clone(),
            kind,
        }
    }

    /// Impression for `outcome`, or None when the outcome is not reportable.
    pub fn impression(
        config: &ProjectConfig,
        user_id: &str,
        attributes: &Attributes,
        outcome: &DecisionOutcome,
    ) -> Option<Self> {
        if !outcome.emits_impression() {
            return None;
        }
        let decision = &outcome.decision;
        let rule_type = match decision.source {
            DecisionSource::Experiment => DecisionSource::Experiment.as_str(),
            _ => DecisionSource::Rollout.as_str(),
        };

        Some(Self::new(
            config,
            user_id,
            attributes,
            EventKind::Impression {
                flag_key: decision.flag_key.clone(),
                rule_id: decision.rule_id.clone().unwrap_or_default(),
                rule_key: decision.rule_key.clone().unwrap_or_default(),
                rule_type: rule_type.to_string(),
                variation_id: outcome.variation_id.clone().unwrap_or_default(),
                variation_key: decision.variation_key.clone(),
                enabled: decision.enabled,
            },
        ))
    }

    pub fn conversion(
        config: &ProjectConfig,
        user_id: &str,
        attributes: &Attributes,
        definition: &EventDefinition,
        tags: HashMap<String, serde_json::Value>,
    ) -> Self {
        Self::new(
            config,
            user_id,
            attributes,
            EventKind::Conversion {
                event_id: definition.id.clone(),
                event_key: definition.key.clone(),
                tags,
            },
        )
    }
}

/// Receives events from the decision path. Implementations must not block.
pub trait EventDispatcher: Send + Sync {
    fn dispatch(&self, event: Event);
}

/// Future returned by an [`EventSender`].
pub type EventSendFuture = std::pin::Pin<Box<dyn std::future::Future<Output = Result<()>> + Send>>;

/// Callback type for delivering a batch of events.
pub type EventSender = Arc<dyn Fn(Vec<Event>) -> EventSendFuture + Send + Sync>;

/// Batching and bounds of an [`EventQueue`].
#[derive(Debug, Clone)]
pub struct EventQueueConfig {
    /// Buffered events that trigger a delivery.
    pub batch_size: usize,

    /// Delivery period when batches fill slowly.
    pub flush_interval: Duration,

    /// Buffer bound; the oldest event is dropped beyond it.
    pub max_queue_size: usize,

    /// When false, dispatch is a no-op.
    pub enabled: bool,

    /// Fraction of dispatched events that are kept.
    pub sample_rate: f64,
}

impl Default for EventQueueConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            flush_interval: Duration::from_secs(DEFAULT_FLUSH_INTERVAL_SECS),
            max_queue_size: DEFAULT_MAX_QUEUE_SIZE,
            enabled: true,
            sample_rate: 1.0,
        }
    }
}

impl From<&ClientOptions> for EventQueueConfig {
    fn from(options: &ClientOptions) -> Self {
        Self {
            batch_size: options.event_batch_size,
            flush_interval: options.event_flush_interval,
            max_queue_size: options.max_event_queue_size,
            enabled: options.events_enabled,
            sample_rate: options.event_sample_rate,
        }
    }
}

impl EventQueueConfig {
    pub fn builder() -> EventQueueConfigBuilder {
        EventQueueConfigBuilder::default()
    }
}

#[derive(Debug, Default)]
pub struct EventQueueConfigBuilder {
    config: EventQueueConfig,
}

impl EventQueueConfigBuilder {
    pub fn batch_size(mut self, size: usize) -> Self {
        self.config.batch_size = size;
        self
    }

    pub fn flush_interval(mut self, interval: Duration) -> Self {
        self.config.flush_interval = interval;
        self
    }

    pub fn max_queue_size(mut self, size: usize) -> Self {
        self.config.max_queue_size = size;
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.config.enabled = enabled;
        self
    }

    pub fn sample_rate(mut self, rate: f64) -> Self {
        self.config.sample_rate = rate.clamp(0.0, 1.0);
        self
    }

    pub fn build(self) -> EventQueueConfig {
        self.config
    }
}

struct Channels {
    flush_tx: mpsc::Sender<()>,
    shutdown_tx: mpsc::Sender<()>,
}

/// Bounded, batching [`EventDispatcher`].
///
/// The queue flushes when:
/// - The batch size is reached
/// - The flush interval elapses
/// - `flush()` is called
/// - `stop()` is called
///
/// When full, the oldest buffered event is dropped.
pub struct EventQueue {
    config: EventQueueConfig,
    events: Arc<Mutex<VecDeque<Event>>>,
    channels: Mutex<Option<Channels>>,
    is_running: Arc<AtomicBool>,
    dropped: AtomicU64,
}

impl EventQueue {
    pub fn new(config: EventQueueConfig) -> Self {
        Self {
            config,
            events: Arc::new(Mutex::new(VecDeque::new())),
            channels: Mutex::new(None),
            is_running: Arc::new(AtomicBool::new(false)),
            dropped: AtomicU64::new(0),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(EventQueueConfig::default())
    }

    pub fn config(&self) -> &EventQueueConfig {
        &self.config
    }

    /// Start the background flush task. Must be called inside a tokio runtime.
    pub fn start(&self, sender: EventSender) {
        if self.is_running.swap(true, Ordering::SeqCst) {
            return;
        }

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let (flush_tx, mut flush_rx) = mpsc::channel::<()>(10);
        *self.channels.lock() = Some(Channels {
            flush_tx,
            shutdown_tx,
        });

        let events = Arc::clone(&self.events);
        let config = self.config.clone();
        let is_running = Arc::clone(&self.is_running);

        tokio::spawn(async move {
            let mut flush_interval = interval(config.flush_interval);
            flush_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    biased;

                    _ = shutdown_rx.recv() => {
                        tracing::debug!("Event queue shutting down");
                        let batch: Vec<Event> = events.lock().drain(..).collect();
                        if !batch.is_empty() {
                            if let Err(e) = sender(batch).await {
                                tracing::warn!(code = %ErrorCode::EventFlushFailed, "Final event flush failed: {}", e);
                            }
                        }
                        break;
                    }
                    _ = flush_rx.recv() => {
                        send_batch(&events, &sender, config.max_queue_size).await;
                    }
                    _ = flush_interval.tick() => {
                        if !is_running.load(Ordering::SeqCst) {
                            break;
                        }
                        send_batch(&events, &sender, config.max_queue_size).await;
                    }
                }
            }
        });
    }

    fn enqueue(&self, event: Event) {
        let should_flush = {
            let mut events = self.events.lock();
            if events.len() >= self.config.max_queue_size {
                events.pop_front();
                self.record_drop();
            }
            events.push_back(event);
            events.len() >= self.config.batch_size
        };

        if should_flush {
            if let Some(channels) = self.channels.lock().as_ref() {
                let _ = channels.flush_tx.try_send(());
            }
        }
    }

    /// Warns on the first drop and then once per queue-length of drops.
    fn record_drop(&self) {
        let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
        let every = self.config.max_queue_size.max(1) as u64;
        if dropped == 1 || dropped % every == 0 {
            tracing::warn!(
                code = %ErrorCode::EventQueueFull,
                dropped,
                running = self.is_running(),
                "Event queue full, dropping oldest events"
            );
        } else {
            tracing::trace!(dropped, "Event queue full, dropped oldest event");
        }
    }

    /// Events discarded because the buffer was full.
    pub fn dropped_events(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Request an immediate flush from the background task.
    pub async fn flush(&self) -> Result<()> {
        let flush_tx = self
            .channels
            .lock()
            .as_ref()
            .map(|c| c.flush_tx.clone())
            .ok_or_else(|| FlagKitError::new(ErrorCode::EventFlushFailed, "Event queue is not running"))?;

        flush_tx
            .send(())
            .await
            .map_err(|_| FlagKitError::new(ErrorCode::EventFlushFailed, "Flush channel closed"))
    }

    /// Stop the background task after a final flush.
    pub async fn stop(&self) {
        self.is_running.store(false, Ordering::SeqCst);
        let channels = self.channels.lock().take();
        if let Some(channels) = channels {
            let _ = channels.shutdown_tx.send(()).await;
        }
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }

    pub fn queue_size(&self) -> usize {
        self.events.lock().len()
    }

    /// Copy of the buffered events.
    pub fn queued_events(&self) -> Vec<Event> {
        self.events.lock().iter().cloned().collect()
    }

    /// Remove and return every buffered event.
    pub fn drain(&self) -> Vec<Event> {
        self.events.lock().drain(..).collect()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl EventDispatcher for EventQueue {
    fn dispatch(&self, event: Event) {
        if !self.config.enabled {
            return;
        }

        if self.config.sample_rate < 1.0 && rand::random::<f64>() >= self.config.sample_rate {
            return;
        }

        self.enqueue(event);
    }
}

impl Drop for EventQueue {
    fn drop(&mut self) {
        self.is_running.store(false, Ordering::SeqCst);
    }
}

async fn send_batch(events: &Mutex<VecDeque<Event>>, sender: &EventSender, max_queue_size: usize) {
    let batch: Vec<Event> = events.lock().drain(..).collect();
    if batch.is_empty() {
        return;
    }

    if let Err(e) = sender(batch.clone()).await {
        tracing::warn!(code = %ErrorCode::EventFlushFailed, "Failed to send events: {}", e);
        let mut events = events.lock();
        let available = max_queue_size.saturating_sub(events.len());
        for event in batch.into_iter().take(available).rev() {
            events.push_front(event);
        }
    }
}
