use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::core::config_manager::ConfigManager;
use crate::core::event_queue::{AnalyticsEvent, EventQueue, EventQueueConfig};
use crate::core::options::ConvoKitOptions;
use crate::core::realtime::RealtimeManager;
use crate::core::reported::{ReportedComment, ReportedCommentRegistry};
use crate::core::store::{CommentStore, UserStore};
use crate::error::{ConvoKitError, ErrorCode, Result};
use crate::http::{ApiClient, HttpApiClient};
use crate::lifecycle::AppLifecycle;
use crate::persistence::{FileStore, SecureStore};
use crate::session::SessionContext;
use crate::types::{
    Comment, CommentStatus, ConversationPage, RealtimeSnapshot, SortMode, SpotConfig, User,
};

/// SDK version, stamped onto outgoing analytics events.
pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Entry point to the SDK: owns every subsystem and keeps them in sync
/// with the session (active spot, post, and page view).
pub struct ConvoKitClient {
    options: ConvoKitOptions,
    api: Arc<dyn ApiClient>,
    session: SessionContext,
    lifecycle: AppLifecycle,
    config: ConfigManager,
    realtime: RealtimeManager,
    events: EventQueue,
    comments: Arc<CommentStore>,
    users: Arc<UserStore>,
    reported: ReportedCommentRegistry,
    initialized: RwLock<bool>,
}

impl ConvoKitClient {
    /// Create a client with the built-in HTTP transport and a file-backed
    /// store under the system temp directory.
    pub fn new(options: ConvoKitOptions) -> Result<Self> {
        let api: Arc<dyn ApiClient> = Arc::new(HttpApiClient::new(options.clone())?);
        let store: Arc<dyn SecureStore> =
            Arc::new(FileStore::new(std::env::temp_dir().join("convokit"))?);
        Self::with_components(options, api, store)
    }

    /// Create a client from explicit components. The host app supplies the
    /// transport and the persistent store.
    pub fn with_components(
        options: ConvoKitOptions,
        api: Arc<dyn ApiClient>,
        store: Arc<dyn SecureStore>,
    ) -> Result<Self> {
        options.validate()?;

        let session = SessionContext::new(options.spot_id.clone());
        let lifecycle = AppLifecycle::new();
        let config = ConfigManager::new(Arc::clone(&api), &options);
        let realtime = RealtimeManager::new(Arc::clone(&api), config.clone());

        let mut events = EventQueue::new(
            EventQueueConfig::from_options(&options),
            Arc::clone(&api),
            config.clone(),
        );
        events.start(lifecycle.subscribe());
        events.set_spot_id(options.spot_id.clone());
        events.set_page_view_id(session.page_view_id());

        let comments = Arc::new(CommentStore::new());
        let users = Arc::new(UserStore::new());
        let reported = ReportedCommentRegistry::new(store, Arc::clone(&comments));

        Ok(Self {
            options,
            api,
            session,
            lifecycle,
            config,
            realtime,
            events,
            comments,
            users,
            reported,
            initialized: RwLock::new(false),
        })
    }

    /// Fetch the spot configuration and apply it to the event pipeline.
    pub async fn initialize(&self) -> Result<SpotConfig> {
        let spot_id = self.session.spot_id();
        let config = self.config.config(&spot_id).await?;
        self.events.refresh_block_set(&spot_id).await;
        *self.initialized.write() = true;
        tracing::debug!(spot_id = %spot_id, "Client initialized");
        Ok(config)
    }

    pub fn is_initialized(&self) -> bool {
        *self.initialized.read()
    }

    pub fn options(&self) -> &ConvoKitOptions {
        &self.options
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    /// The spot configuration, from cache when fresh.
    pub async fn config(&self) -> Result<SpotConfig> {
        self.config.config(&self.session.spot_id()).await
    }

    /// Switch the client to a different spot. Conversation state from the
    /// previous spot is dropped and the new configuration is fetched in
    /// the background.
    pub async fn spot_changed(&self, spot_id: impl Into<String>) {
        let spot_id = spot_id.into();
        self.session.set_spot_id(spot_id.clone());
        self.session.clear_post();
        self.config.spot_changed(&spot_id);
        self.realtime.stop_fetching().await;
        self.realtime.reset();
        self.comments.clean_cache();
        self.users.clean_cache();
        self.events.set_spot_id(spot_id.clone());
        self.events.set_post_id(None);
        self.events.set_page_view_id(self.session.page_view_id());
        self.events.refresh_block_set(&spot_id).await;
    }

    /// Load a page of a conversation and absorb it into the local stores.
    ///
    /// The returned page keeps its nested reply structure; stored comments
    /// are flattened. Comments the user reported and that still await
    /// moderation come back flagged.
    pub async fn fetch_conversation(
        &self,
        post_id: &str,
        sort: SortMode,
        offset: i64,
    ) -> Result<ConversationPage> {
        let spot_id = self.session.spot_id();
        self.session.set_post_id(post_id);
        self.events.set_post_id(Some(post_id.to_string()));
        self.events.set_page_view_id(self.session.page_view_id());

        let mut page = self
            .api
            .fetch_conversation(&spot_id, post_id, sort, offset)
            .await?;

        if let Some(reported_ids) = &page.reported_comments {
            self.reported.apply_conversation(post_id, reported_ids);
        }

        decorate_comments(&self.reported, post_id, &mut page.comments);

        self.comments.set(page.comments.clone(), post_id);
        self.users
            .set(page.users.values().cloned().collect(), post_id);

        Ok(page)
    }

    /// A comment from the local store.
    pub fn comment(&self, post_id: &str, comment_id: &str) -> Option<Comment> {
        self.comments.get(comment_id, post_id)
    }

    /// A user from the local store.
    pub fn user(&self, post_id: &str, user_id: &str) -> Option<User> {
        self.users.get(user_id, post_id)
    }

    /// Ask the server for a comment's moderation status and patch the
    /// stored comment with it.
    pub async fn comment_status(&self, comment_id: &str) -> Result<CommentStatus> {
        let raw = self.api.comment_status(comment_id).await?;
        let status = CommentStatus::parse(&raw);

        if let Some(post_id) = self.session.post_id() {
            if let Some(mut comment) = self.comments.get(comment_id, &post_id) {
                comment.status = Some(raw);
                self.comments.set(vec![comment], &post_id);
            }
        }

        Ok(status)
    }

    /// Mute a user and mark every cached copy of them as muted.
    pub async fn mute_user(&self, user_id: &str) -> Result<()> {
        self.api.mute_user(user_id).await?;

        for scope in self.users.scopes() {
            if let Some(mut user) = self.users.get(user_id, &scope) {
                user.is_muted = true;
                self.users.set(vec![user], &scope);
            }
        }
        Ok(())
    }

    /// Delete a comment and mark the cached copy as deleted.
    pub async fn delete_comment(&self, comment_id: &str, parent_id: Option<&str>) -> Result<()> {
        self.api.delete_comment(comment_id, parent_id).await?;

        if let Some(post_id) = self.session.post_id() {
            if let Some(mut comment) = self.comments.get(comment_id, &post_id) {
                comment.deleted = true;
                self.comments.set(vec![comment], &post_id);
            }
        }
        Ok(())
    }

    /// Record that the user reported a comment in the active conversation.
    pub fn mark_comment_reported(&self, comment_id: &str) {
        if let Some(post_id) = self.session.post_id() {
            self.reported.mark_reported(&post_id, comment_id);
        }
    }

    /// Subscribe to report notifications.
    pub fn reported_comments(&self) -> tokio::sync::broadcast::Receiver<ReportedComment> {
        self.reported.subscribe()
    }

    /// Queue an analytics event.
    pub fn track(
        &self,
        event_type: impl Into<String>,
        payload: Option<HashMap<String, serde_json::Value>>,
    ) {
        self.events.track(event_type, payload);
    }

    /// Queue a batch of pre-built analytics events.
    pub fn track_all(&self, events: Vec<AnalyticsEvent>) {
        self.events.track_all(events);
    }

    /// Flush queued analytics events.
    pub async fn flush_events(&self) -> Result<()> {
        self.events.flush().await
    }

    /// Attribute subsequent events to a user.
    pub fn set_user_id(&self, user_id: Option<String>) {
        self.session.set_user_id(user_id.clone());
        self.events.set_user_id(user_id);
    }

    /// Begin realtime polling for the active conversation.
    pub async fn start_realtime(&self) -> Result<()> {
        let Some(post_id) = self.session.post_id() else {
            return Err(ConvoKitError::new(
                ErrorCode::InitNotInitialized,
                "No active conversation; fetch one before starting realtime",
            ));
        };
        self.realtime
            .start_fetching(&self.session.spot_id(), &post_id)
            .await;
        Ok(())
    }

    pub async fn stop_realtime(&self) {
        self.realtime.stop_fetching().await;
    }

    /// Watch realtime snapshots for the active conversation.
    pub fn realtime_updates(&self) -> tokio::sync::watch::Receiver<Option<RealtimeSnapshot>> {
        self.realtime.subscribe()
    }

    pub fn latest_realtime(&self) -> Option<RealtimeSnapshot> {
        self.realtime.latest()
    }

    /// Number of users viewing the active conversation, from the latest
    /// realtime snapshot.
    pub fn online_viewing_count(&self) -> Option<i64> {
        let conversation = self.session.conversation_id()?;
        self.realtime
            .latest()?
            .data
            .as_ref()?
            .online_viewing_count(&conversation)
    }

    /// Clear the published realtime snapshot.
    pub fn reset_realtime(&self) {
        self.realtime.reset();
    }

    pub fn is_realtime_active(&self) -> bool {
        self.realtime.is_fetching()
    }

    /// Forward the host app's background transition. Queued events are
    /// flushed as a result.
    pub fn did_enter_background(&self) {
        self.lifecycle.did_enter_background();
    }

    /// Forward the host app's foreground transition.
    pub fn will_enter_foreground(&self) {
        self.lifecycle.will_enter_foreground();
    }

    /// Drop all cached conversation state and configurations. Persisted
    /// reports are cleared as well.
    pub fn clean_cache(&self) {
        self.comments.clean_cache();
        self.users.clean_cache();
        self.reported.clean_cache();
        self.config.invalidate_cache();
        self.realtime.reset();
    }

    /// Stop background work, flushing any queued events.
    pub async fn shutdown(&mut self) {
        self.realtime.stop_fetching().await;
        self.events.stop().await;
        tracing::debug!("Client shut down");
    }
}

pub type SharedClient = Arc<ConvoKitClient>;

fn decorate_comments(
    registry: &ReportedCommentRegistry,
    post_id: &str,
    comments: &mut [Comment],
) {
    for comment in comments.iter_mut() {
        registry.decorate(post_id, comment);
        decorate_comments(registry, post_id, &mut comment.replies);
    }
}
