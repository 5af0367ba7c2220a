//! Event queue for batching and sending analytics events.
//!
//! Events accumulate in a FIFO buffer and are flushed by a single background
//! task, so flushes never interleave. A flush is triggered when the buffer
//! reaches the batch size, when the host app enters the background, or on
//! request. Events matching the spot's block list are discarded at flush
//! time and never sent.

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};

use crate::core::config_manager::ConfigManager;
use crate::core::options::{ConvoKitOptions, DEFAULT_EVENT_BATCH_SIZE, DEFAULT_MAX_QUEUED_EVENTS};
use crate::error::{ConvoKitError, ErrorCode, Result};
use crate::http::{with_retry, ApiClient, RetryConfig};
use crate::lifecycle::LifecycleEvent;
use crate::types::EventsStrategyConfig;
use crate::utils::parse_version;

/// Send attempts per flush before events are re-queued.
pub const FLUSH_SEND_ATTEMPTS: u32 = 2;

/// Base delay between send attempts in milliseconds.
pub const FLUSH_RETRY_BASE_DELAY_MS: u64 = 1000;

/// Block-list entry that stands for every event name.
const BLOCK_ALL_PLACEHOLDER: &str = "all";

/// Configuration for the event queue.
#[derive(Debug, Clone)]
pub struct EventQueueConfig {
    /// Number of events to batch before sending. Default: 10
    pub batch_size: usize,

    /// Maximum number of events to queue. Default: 1000
    pub max_queue_size: usize,

    /// Whether events are enabled. Default: true
    pub enabled: bool,

    /// SDK version reported on events and matched against block lists.
    pub sdk_version: String,
}

impl Default for EventQueueConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_EVENT_BATCH_SIZE,
            max_queue_size: DEFAULT_MAX_QUEUED_EVENTS,
            enabled: true,
            sdk_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl EventQueueConfig {
    /// Create a new config builder.
    pub fn builder() -> EventQueueConfigBuilder {
        EventQueueConfigBuilder::default()
    }

    pub fn from_options(options: &ConvoKitOptions) -> Self {
        Self {
            batch_size: options.event_batch_size,
            max_queue_size: options.max_queued_events,
            enabled: options.events_enabled,
            sdk_version: options.sdk_version.clone(),
        }
    }
}

/// Builder for EventQueueConfig.
#[derive(Debug, Default)]
pub struct EventQueueConfigBuilder {
    batch_size: Option<usize>,
    max_queue_size: Option<usize>,
    enabled: Option<bool>,
    sdk_version: Option<String>,
}

impl EventQueueConfigBuilder {
    /// Set batch size.
    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = Some(size);
        self
    }

    /// Set maximum queue size.
    pub fn max_queue_size(mut self, size: usize) -> Self {
        self.max_queue_size = Some(size);
        self
    }

    /// Set whether events are enabled.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    /// Set the SDK version reported on events.
    pub fn sdk_version(mut self, version: impl Into<String>) -> Self {
        self.sdk_version = Some(version.into());
        self
    }

    /// Build the configuration.
    pub fn build(self) -> EventQueueConfig {
        EventQueueConfig {
            batch_size: self.batch_size.unwrap_or(DEFAULT_EVENT_BATCH_SIZE),
            max_queue_size: self.max_queue_size.unwrap_or(DEFAULT_MAX_QUEUED_EVENTS),
            enabled: self.enabled.unwrap_or(true),
            sdk_version: self
                .sdk_version
                .unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string()),
        }
    }
}

/// An analytics event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsEvent {
    /// Event type (e.g., "fullConversationLoaded").
    pub event_type: String,

    /// Timestamp in RFC3339 format.
    pub timestamp: String,

    /// SDK version.
    pub sdk_version: String,

    /// SDK platform.
    pub platform: String,

    /// Spot the event belongs to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spot_id: Option<String>,

    /// Post the event belongs to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_id: Option<String>,

    /// Page view the event was produced in.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_view_id: Option<String>,

    /// User who triggered the event.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    /// Custom event data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<HashMap<String, serde_json::Value>>,
}

impl AnalyticsEvent {
    /// Create a new event.
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            sdk_version: env!("CARGO_PKG_VERSION").to_string(),
            platform: "rust".to_string(),
            spot_id: None,
            post_id: None,
            page_view_id: None,
            user_id: None,
            payload: None,
        }
    }

    /// Set the spot ID.
    pub fn spot_id(mut self, id: impl Into<String>) -> Self {
        self.spot_id = Some(id.into());
        self
    }

    /// Set the post ID.
    pub fn post_id(mut self, id: impl Into<String>) -> Self {
        self.post_id = Some(id.into());
        self
    }

    /// Set the page view ID.
    pub fn page_view_id(mut self, id: impl Into<String>) -> Self {
        self.page_view_id = Some(id.into());
        self
    }

    /// Set the user ID.
    pub fn user_id(mut self, id: impl Into<String>) -> Self {
        self.user_id = Some(id.into());
        self
    }

    /// Set event data.
    pub fn data(mut self, data: HashMap<String, serde_json::Value>) -> Self {
        self.payload = Some(data);
        self
    }

    /// Add a single data field.
    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        let data = self.payload.get_or_insert_with(HashMap::new);
        data.insert(key.into(), value.into());
        self
    }
}

/// Which event types are withheld from the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockSet {
    /// Every event is blocked.
    All,
    /// The named event types are blocked; anything else goes through.
    Named(HashSet<String>),
}

impl Default for BlockSet {
    fn default() -> Self {
        BlockSet::Named(HashSet::new())
    }
}

impl BlockSet {
    pub fn should_send(&self, event_type: &str) -> bool {
        match self {
            BlockSet::All => false,
            BlockSet::Named(blocked) => !blocked.contains(event_type),
        }
    }

    /// Derive the block set for one SDK version from the spot's events
    /// strategy. Versions at or below `block_versions_equal_or_previous`
    /// block everything; otherwise the per-version list applies, where the
    /// `"all"` placeholder again blocks everything.
    pub fn from_strategy(strategy: Option<&EventsStrategyConfig>, sdk_version: &str) -> Self {
        let Some(strategy) = strategy else {
            return BlockSet::default();
        };

        if let Some(threshold) = &strategy.block_versions_equal_or_previous {
            if let (Some(current), Some(threshold)) =
                (parse_version(sdk_version), parse_version(threshold))
            {
                if current <= threshold {
                    return BlockSet::All;
                }
            }
        }

        match strategy.block_events_by_version.get(sdk_version) {
            Some(blocked) if blocked.iter().any(|name| name == BLOCK_ALL_PLACEHOLDER) => {
                BlockSet::All
            }
            Some(blocked) => BlockSet::Named(blocked.iter().cloned().collect()),
            None => BlockSet::default(),
        }
    }
}

/// Internal state for the event queue.
struct EventQueueState {
    events: Vec<AnalyticsEvent>,
    spot_id: Option<String>,
    post_id: Option<String>,
    page_view_id: Option<String>,
    user_id: Option<String>,
}

/// Event queue for batching and sending analytics events.
///
/// The queue flushes events when:
/// - The batch size is reached
/// - The host app enters the background
/// - `flush()` is called manually
/// - The queue is stopped (graceful shutdown)
pub struct EventQueue {
    config: EventQueueConfig,
    api: Arc<dyn ApiClient>,
    spot_config: ConfigManager,
    state: Arc<Mutex<EventQueueState>>,
    block_set: Arc<RwLock<BlockSet>>,
    shutdown_tx: Option<mpsc::Sender<()>>,
    is_running: Arc<AtomicBool>,
    flush_tx: Option<mpsc::Sender<()>>,
}

impl EventQueue {
    /// Create a new event queue.
    pub fn new(config: EventQueueConfig, api: Arc<dyn ApiClient>, spot_config: ConfigManager) -> Self {
        Self {
            config,
            api,
            spot_config,
            state: Arc::new(Mutex::new(EventQueueState {
                events: Vec::new(),
                spot_id: None,
                post_id: None,
                page_view_id: None,
                user_id: None,
            })),
            block_set: Arc::new(RwLock::new(BlockSet::default())),
            shutdown_tx: None,
            is_running: Arc::new(AtomicBool::new(false)),
            flush_tx: None,
        }
    }

    /// Set the spot ID stamped on tracked events.
    pub fn set_spot_id(&self, id: impl Into<String>) {
        let mut state = self.state.lock();
        state.spot_id = Some(id.into());
    }

    /// Set the post ID stamped on tracked events.
    pub fn set_post_id(&self, id: Option<String>) {
        let mut state = self.state.lock();
        state.post_id = id;
    }

    /// Set the page view ID stamped on tracked events.
    pub fn set_page_view_id(&self, id: impl Into<String>) {
        let mut state = self.state.lock();
        state.page_view_id = Some(id.into());
    }

    /// Set the user ID stamped on tracked events.
    pub fn set_user_id(&self, id: Option<String>) {
        let mut state = self.state.lock();
        state.user_id = id;
    }

    /// Start the background flush task.
    ///
    /// `lifecycle_rx` feeds app transitions; entering the background flushes
    /// whatever is queued.
    pub fn start(&mut self, mut lifecycle_rx: broadcast::Receiver<LifecycleEvent>) {
        if self.is_running.load(Ordering::SeqCst) {
            return;
        }

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let (flush_tx, mut flush_rx) = mpsc::channel::<()>(10);
        self.shutdown_tx = Some(shutdown_tx);
        self.flush_tx = Some(flush_tx);
        self.is_running.store(true, Ordering::SeqCst);

        let state = Arc::clone(&self.state);
        let block_set = Arc::clone(&self.block_set);
        let config = self.config.clone();
        let api = Arc::clone(&self.api);

        tokio::spawn(async move {
            let mut lifecycle_open = true;

            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        tracing::debug!("Event queue shutting down");
                        flush_queued(&api, &state, &block_set, &config).await;
                        break;
                    }
                    _ = flush_rx.recv() => {
                        flush_queued(&api, &state, &block_set, &config).await;
                    }
                    event = lifecycle_rx.recv(), if lifecycle_open => {
                        match event {
                            Ok(LifecycleEvent::DidEnterBackground) => {
                                tracing::debug!("Flushing events on background transition");
                                flush_queued(&api, &state, &block_set, &config).await;
                            }
                            Ok(_) => {}
                            Err(broadcast::error::RecvError::Lagged(_)) => {}
                            Err(broadcast::error::RecvError::Closed) => {
                                lifecycle_open = false;
                            }
                        }
                    }
                }
            }
        });
    }

    /// Track a custom event.
    ///
    /// # Arguments
    ///
    /// * `event_type` - The event type (e.g., "commentRankUpButtonClicked")
    /// * `payload` - Optional event data
    pub fn track(
        &self,
        event_type: impl Into<String>,
        payload: Option<HashMap<String, serde_json::Value>>,
    ) {
        if !self.config.enabled {
            return;
        }

        let event_type = event_type.into();

        // Validate event type
        if event_type.is_empty() || event_type.len() > 256 {
            tracing::warn!("Invalid event type: {}", event_type);
            return;
        }

        let mut event = AnalyticsEvent::new(event_type);
        event.payload = payload;
        self.stamp_context(&mut event);
        self.add_event(event);
    }

    /// Track a batch of pre-built events. Each is stamped with the current
    /// context the same way [`track`](Self::track) stamps its event.
    pub fn track_all(&self, events: Vec<AnalyticsEvent>) {
        if !self.config.enabled {
            return;
        }

        for mut event in events {
            if event.event_type.is_empty() || event.event_type.len() > 256 {
                tracing::warn!("Invalid event type: {}", event.event_type);
                continue;
            }
            self.stamp_context(&mut event);
            self.add_event(event);
        }
    }

    /// Stamp the queue's version and context onto an event.
    fn stamp_context(&self, event: &mut AnalyticsEvent) {
        event.sdk_version = self.config.sdk_version.clone();

        let state = self.state.lock();
        if let Some(ref spot_id) = state.spot_id {
            event.spot_id = Some(spot_id.clone());
        }
        if let Some(ref post_id) = state.post_id {
            event.post_id = Some(post_id.clone());
        }
        if let Some(ref page_view_id) = state.page_view_id {
            event.page_view_id = Some(page_view_id.clone());
        }
        if let Some(ref user_id) = state.user_id {
            event.user_id = Some(user_id.clone());
        }
    }

    /// Add an event to the queue.
    fn add_event(&self, event: AnalyticsEvent) {
        let should_flush = {
            let mut state = self.state.lock();

            // Enforce max queue size
            if state.events.len() >= self.config.max_queue_size {
                // Drop oldest event
                state.events.remove(0);
                tracing::warn!("Event queue full, dropping oldest event");
            }

            state.events.push(event);
            state.events.len() >= self.config.batch_size
        };

        // Trigger flush if batch size reached
        if should_flush {
            if let Some(ref tx) = self.flush_tx {
                let _ = tx.try_send(());
            }
        }
    }

    /// Recompute the block set from the spot's configuration.
    ///
    /// On a configuration error the previous block set stays in effect.
    pub async fn refresh_block_set(&self, spot_id: &str) {
        match self.spot_config.config(spot_id).await {
            Ok(config) => {
                let next = BlockSet::from_strategy(
                    config.mobile_sdk.events_strategy_config.as_ref(),
                    &self.config.sdk_version,
                );
                *self.block_set.write() = next;
            }
            Err(error) => {
                tracing::warn!(
                    spot_id = %spot_id,
                    error = %error,
                    "Keeping previous event block set"
                );
            }
        }
    }

    /// Flush pending events immediately.
    pub async fn flush(&self) -> Result<()> {
        if let Some(ref tx) = self.flush_tx {
            tx.send(())
                .await
                .map_err(|_| ConvoKitError::new(ErrorCode::EventFlushFailed, "Flush channel closed"))?;
        }
        Ok(())
    }

    /// Get the number of queued events.
    pub fn queue_size(&self) -> usize {
        self.state.lock().events.len()
    }

    /// Get a copy of queued events (for debugging).
    pub fn get_queued_events(&self) -> Vec<AnalyticsEvent> {
        self.state.lock().events.clone()
    }

    /// Clear the event queue without sending.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.events.clear();
    }

    /// Stop the event queue.
    ///
    /// This will flush remaining events before stopping.
    pub async fn stop(&mut self) {
        self.is_running.store(false, Ordering::SeqCst);

        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(()).await;
        }
    }

    /// Check if the event queue is running.
    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }
}

impl Drop for EventQueue {
    fn drop(&mut self) {
        self.is_running.store(false, Ordering::SeqCst);
    }
}

/// Drain the buffer, drop blocked events, and send the rest.
///
/// Events queued while the send is in flight stay in the buffer for the
/// next flush. On failure the drained events go back to the front of the
/// buffer so ordering survives.
async fn flush_queued(
    api: &Arc<dyn ApiClient>,
    state: &Arc<Mutex<EventQueueState>>,
    block_set: &Arc<RwLock<BlockSet>>,
    config: &EventQueueConfig,
) {
    let batch = {
        let mut state = state.lock();
        if state.events.is_empty() {
            return;
        }
        let count = state.events.len();
        state.events.drain(..count).collect::<Vec<_>>()
    };

    let total = batch.len();
    let to_send: Vec<AnalyticsEvent> = {
        let block_set = block_set.read();
        batch
            .into_iter()
            .filter(|event| block_set.should_send(&event.event_type))
            .collect()
    };
    if to_send.len() < total {
        tracing::debug!(count = total - to_send.len(), "Discarded blocked events");
    }
    if to_send.is_empty() {
        return;
    }

    let retry = RetryConfig::builder()
        .max_attempts(FLUSH_SEND_ATTEMPTS)
        .base_delay_ms(FLUSH_RETRY_BASE_DELAY_MS)
        .build();

    match with_retry(|| api.send_events(&to_send), &retry).await {
        Ok(()) => {
            tracing::debug!(count = to_send.len(), "Flushed events");
        }
        Err(error) => {
            tracing::warn!("Failed to flush events: {}", error);
            // Re-queue failed events ahead of anything added meanwhile
            let mut state = state.lock();
            let available_space = config.max_queue_size.saturating_sub(state.events.len());
            let to_requeue: Vec<_> = to_send.into_iter().take(available_space).collect();
            state.events.splice(0..0, to_requeue);
        }
    }
}
