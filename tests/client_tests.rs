//! End-to-end tests of the client facade over an in-memory transport.

use async_trait::async_trait;
use convokit::types::{MobileSdkConfig, RealtimeSnapshot, SpotConfig};
use convokit::{
    AnalyticsEvent, ApiClient, Comment, CommentStatus, ConvoKitClient, ConvoKitOptions,
    ConversationPage, ErrorCode, MemoryStore, Result, SecureStore, SortMode, User,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
struct FakeApi {
    sent_events: Mutex<Vec<AnalyticsEvent>>,
    muted_users: Mutex<Vec<String>>,
    deleted_comments: Mutex<Vec<(String, Option<String>)>>,
    status_response: Mutex<String>,
    realtime_calls: AtomicU32,
}

#[async_trait]
impl ApiClient for FakeApi {
    async fn fetch_config(&self, _spot_id: &str) -> Result<SpotConfig> {
        Ok(realtime_config())
    }

    async fn fetch_realtime(&self, conversation_id: &str) -> Result<RealtimeSnapshot> {
        self.realtime_calls.fetch_add(1, Ordering::SeqCst);
        Ok(realtime_snapshot(conversation_id))
    }

    async fn fetch_conversation(
        &self,
        _spot_id: &str,
        _post_id: &str,
        _sort: SortMode,
        _offset: i64,
    ) -> Result<ConversationPage> {
        Ok(sample_page())
    }

    async fn send_events(&self, events: &[AnalyticsEvent]) -> Result<()> {
        self.sent_events.lock().extend_from_slice(events);
        Ok(())
    }

    async fn comment_status(&self, _comment_id: &str) -> Result<String> {
        Ok(self.status_response.lock().clone())
    }

    async fn mute_user(&self, user_id: &str) -> Result<()> {
        self.muted_users.lock().push(user_id.to_string());
        Ok(())
    }

    async fn delete_comment(&self, comment_id: &str, parent_id: Option<&str>) -> Result<()> {
        self.deleted_comments
            .lock()
            .push((comment_id.to_string(), parent_id.map(str::to_string)));
        Ok(())
    }
}

fn realtime_config() -> SpotConfig {
    SpotConfig {
        mobile_sdk: MobileSdkConfig {
            enabled: true,
            realtime_enabled: true,
            ..MobileSdkConfig::default()
        },
        ..SpotConfig::default()
    }
}

/// A snapshot with a one hour interval, so polling stays parked between
/// assertions.
fn realtime_snapshot(conversation_id: &str) -> RealtimeSnapshot {
    let json = format!(
        r#"{{
            "data": {{
                "conversation/count-messages": {{"{conversation_id}": [{{"Comments": 7, "Replies": 2}}]}},
                "online/users-count": {{"{conversation_id}": [{{"count": 3}}]}}
            }},
            "nextFetch": 1700003600,
            "timestamp": 1700000000
        }}"#
    );
    serde_json::from_str(&json).unwrap()
}

/// A page with a root comment (`c1`, published) holding one pending reply
/// (`c2`), plus a pending top-level comment (`c3`). The server reports
/// both `c1` and `c3` as previously reported by this user.
fn sample_page() -> ConversationPage {
    let reply = Comment {
        id: Some("c2".to_string()),
        parent_id: Some("c1".to_string()),
        root_comment: Some("c1".to_string()),
        user_id: Some("u2".to_string()),
        status: Some("pending".to_string()),
        ..Comment::default()
    };
    let root = Comment {
        id: Some("c1".to_string()),
        root_comment: Some("c1".to_string()),
        user_id: Some("u1".to_string()),
        status: Some("publish_and_moderate".to_string()),
        published: true,
        replies: vec![reply],
        ..Comment::default()
    };
    let solo = Comment {
        id: Some("c3".to_string()),
        root_comment: Some("c3".to_string()),
        user_id: Some("u2".to_string()),
        status: Some("pending".to_string()),
        ..Comment::default()
    };

    let mut users = HashMap::new();
    users.insert(
        "u1".to_string(),
        User {
            id: Some("u1".to_string()),
            display_name: Some("Dana".to_string()),
            registered: true,
            ..User::default()
        },
    );
    users.insert(
        "u2".to_string(),
        User {
            id: Some("u2".to_string()),
            display_name: Some("Riley".to_string()),
            ..User::default()
        },
    );

    let mut reported = HashMap::new();
    reported.insert("c1".to_string(), true);
    reported.insert("c3".to_string(), true);

    ConversationPage {
        comments: vec![root, solo],
        users,
        reported_comments: Some(reported),
        messages_count: 3,
        read_only: false,
        has_next: false,
        offset: 0,
    }
}

fn client_with(api: Arc<FakeApi>) -> ConvoKitClient {
    let options = ConvoKitOptions::builder("sp_test").build();
    let store: Arc<dyn SecureStore> = Arc::new(MemoryStore::new());
    ConvoKitClient::with_components(options, api, store).unwrap()
}

async fn wait_for(mut condition: impl FnMut() -> bool) {
    for _ in 0..100 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not met within one second");
}

// ============================================================================
// Initialization
// ============================================================================

#[tokio::test]
async fn test_initialize_marks_client_ready() {
    let client = client_with(Arc::new(FakeApi::default()));
    assert!(!client.is_initialized());

    let config = client.initialize().await.unwrap();

    assert!(client.is_initialized());
    assert!(config.realtime_enabled());
}

#[tokio::test]
async fn test_rejects_invalid_spot_id() {
    let options = ConvoKitOptions::builder("bad-spot").build();
    let api: Arc<FakeApi> = Arc::new(FakeApi::default());
    let store: Arc<dyn SecureStore> = Arc::new(MemoryStore::new());

    let result = ConvoKitClient::with_components(options, api, store);
    assert_eq!(result.err().unwrap().code, ErrorCode::ConfigInvalidSpotId);
}

// ============================================================================
// Conversation fetching and the local stores
// ============================================================================

#[tokio::test]
async fn test_fetch_conversation_populates_stores() {
    let client = client_with(Arc::new(FakeApi::default()));

    let page = client
        .fetch_conversation("post1", SortMode::Best, 0)
        .await
        .unwrap();

    // The returned page keeps its nesting.
    assert_eq!(page.comments.len(), 2);
    assert_eq!(page.comments[0].replies.len(), 1);

    // The stores hold the flattened entities.
    let root = client.comment("post1", "c1").unwrap();
    assert!(root.replies.is_empty());
    assert_eq!(root.reply_ids, vec!["c2".to_string()]);

    let reply = client.comment("post1", "c2").unwrap();
    assert_eq!(reply.parent_id.as_deref(), Some("c1"));

    let user = client.user("post1", "u1").unwrap();
    assert_eq!(user.display_name.as_deref(), Some("Dana"));

    // Session now points at the post.
    assert_eq!(client.session().post_id().as_deref(), Some("post1"));
}

#[tokio::test]
async fn test_fetch_conversation_flags_reported_comments() {
    let client = client_with(Arc::new(FakeApi::default()));

    let page = client
        .fetch_conversation("post1", SortMode::Best, 0)
        .await
        .unwrap();

    // c3 is reported and still pending, so it comes back flagged.
    let solo = page.comments.iter().find(|c| c.id.as_deref() == Some("c3")).unwrap();
    assert!(solo.is_reported);
    assert!(client.comment("post1", "c3").unwrap().is_reported);

    // c1 is reported but already published, so the flag stays off.
    let root = page.comments.iter().find(|c| c.id.as_deref() == Some("c1")).unwrap();
    assert!(!root.is_reported);
}

#[tokio::test]
async fn test_comment_status_patches_stored_comment() {
    let api = Arc::new(FakeApi::default());
    *api.status_response.lock() = "require_approval".to_string();
    let client = client_with(Arc::clone(&api));

    client
        .fetch_conversation("post1", SortMode::Best, 0)
        .await
        .unwrap();

    let status = client.comment_status("c2").await.unwrap();
    assert_eq!(status, CommentStatus::RequireApproval);

    let stored = client.comment("post1", "c2").unwrap();
    assert_eq!(stored.status.as_deref(), Some("require_approval"));
}

#[tokio::test]
async fn test_mute_user_updates_cached_copies() {
    let api = Arc::new(FakeApi::default());
    let client = client_with(Arc::clone(&api));

    client
        .fetch_conversation("post1", SortMode::Best, 0)
        .await
        .unwrap();
    assert!(!client.user("post1", "u2").unwrap().is_muted);

    client.mute_user("u2").await.unwrap();

    assert_eq!(*api.muted_users.lock(), vec!["u2".to_string()]);
    assert!(client.user("post1", "u2").unwrap().is_muted);
}

#[tokio::test]
async fn test_delete_comment_marks_cached_copy() {
    let api = Arc::new(FakeApi::default());
    let client = client_with(Arc::clone(&api));

    client
        .fetch_conversation("post1", SortMode::Best, 0)
        .await
        .unwrap();

    client.delete_comment("c2", Some("c1")).await.unwrap();

    assert_eq!(
        *api.deleted_comments.lock(),
        vec![("c2".to_string(), Some("c1".to_string()))]
    );
    assert!(client.comment("post1", "c2").unwrap().deleted);
}

// ============================================================================
// Reported comments
// ============================================================================

#[tokio::test]
async fn test_mark_comment_reported_notifies_subscribers() {
    let client = client_with(Arc::new(FakeApi::default()));
    client
        .fetch_conversation("post1", SortMode::Best, 0)
        .await
        .unwrap();

    let mut reports = client.reported_comments();
    client.mark_comment_reported("c2");

    let report = reports.recv().await.unwrap();
    assert_eq!(report.post_id, "post1");
    assert_eq!(report.comment_id, "c2");

    assert!(client.comment("post1", "c2").unwrap().is_reported);
}

#[tokio::test]
async fn test_reports_survive_across_clients_sharing_a_store() {
    let api = Arc::new(FakeApi::default());
    let store: Arc<dyn SecureStore> = Arc::new(MemoryStore::new());
    let options = ConvoKitOptions::builder("sp_test").build();

    {
        let first = ConvoKitClient::with_components(
            options.clone(),
            Arc::clone(&api) as Arc<dyn ApiClient>,
            Arc::clone(&store),
        )
        .unwrap();
        first
            .fetch_conversation("post1", SortMode::Best, 0)
            .await
            .unwrap();
        first.mark_comment_reported("c2");
    }

    let second = ConvoKitClient::with_components(options, api, store).unwrap();
    let page = second
        .fetch_conversation("post1", SortMode::Best, 0)
        .await
        .unwrap();

    assert!(page.comments[0].replies[0].is_reported);
}

#[tokio::test]
async fn test_clean_cache_forgets_reports() {
    let client = client_with(Arc::new(FakeApi::default()));
    client
        .fetch_conversation("post1", SortMode::Best, 0)
        .await
        .unwrap();
    client.mark_comment_reported("c2");

    client.clean_cache();
    assert!(client.comment("post1", "c2").is_none());

    let page = client
        .fetch_conversation("post1", SortMode::Best, 0)
        .await
        .unwrap();

    // The user report on c2 is gone; the server-side report on c3 comes back
    // with the page.
    assert!(!page.comments[0].replies[0].is_reported);
    let solo = page.comments.iter().find(|c| c.id.as_deref() == Some("c3")).unwrap();
    assert!(solo.is_reported);
}

// ============================================================================
// Analytics
// ============================================================================

#[tokio::test]
async fn test_track_and_flush_sends_stamped_events() {
    let api = Arc::new(FakeApi::default());
    let client = client_with(Arc::clone(&api));

    client.initialize().await.unwrap();
    client
        .fetch_conversation("post1", SortMode::Best, 0)
        .await
        .unwrap();
    client.set_user_id(Some("u9".to_string()));

    let mut payload = HashMap::new();
    payload.insert("durationMs".to_string(), serde_json::json!(125));
    client.track("commentViewed", Some(payload));
    client.flush_events().await.unwrap();

    wait_for(|| !api.sent_events.lock().is_empty()).await;

    let sent = api.sent_events.lock();
    assert_eq!(sent.len(), 1);
    let event = &sent[0];
    assert_eq!(event.event_type, "commentViewed");
    assert_eq!(event.platform, "rust");
    assert_eq!(event.spot_id.as_deref(), Some("sp_test"));
    assert_eq!(event.post_id.as_deref(), Some("post1"));
    assert_eq!(event.user_id.as_deref(), Some("u9"));
    assert_eq!(
        event.page_view_id.as_deref(),
        Some(client.session().page_view_id().as_str())
    );
    assert_eq!(
        event.payload.as_ref().unwrap()["durationMs"],
        serde_json::json!(125)
    );
}

#[tokio::test]
async fn test_shutdown_flushes_queued_events() {
    let api = Arc::new(FakeApi::default());
    let mut client = client_with(Arc::clone(&api));

    client.track("fullConversationLoaded", None);
    client.shutdown().await;

    wait_for(|| !api.sent_events.lock().is_empty()).await;
    assert_eq!(api.sent_events.lock()[0].event_type, "fullConversationLoaded");
}

// ============================================================================
// Realtime
// ============================================================================

#[tokio::test]
async fn test_start_realtime_requires_a_conversation() {
    let client = client_with(Arc::new(FakeApi::default()));

    let error = client.start_realtime().await.err().unwrap();
    assert_eq!(error.code, ErrorCode::InitNotInitialized);
}

#[tokio::test]
async fn test_realtime_publishes_snapshots() {
    let api = Arc::new(FakeApi::default());
    let client = client_with(Arc::clone(&api));

    client
        .fetch_conversation("post1", SortMode::Best, 0)
        .await
        .unwrap();
    client.start_realtime().await.unwrap();

    wait_for(|| client.latest_realtime().is_some()).await;
    assert!(client.is_realtime_active());
    assert!(api.realtime_calls.load(Ordering::SeqCst) >= 1);

    let snapshot = client.latest_realtime().unwrap();
    let data = snapshot.data.unwrap();
    assert_eq!(data.comments_count("sp_test_post1"), Some(7));
    assert_eq!(data.online_viewing_count("sp_test_post1"), Some(3));
    assert_eq!(client.online_viewing_count(), Some(3));

    client.stop_realtime().await;
    wait_for(|| !client.is_realtime_active()).await;

    // The last snapshot stays available until reset.
    assert!(client.latest_realtime().is_some());
    client.reset_realtime();
    assert!(client.latest_realtime().is_none());
}

// ============================================================================
// Spot switching
// ============================================================================

#[tokio::test]
async fn test_spot_changed_drops_conversation_state() {
    let client = client_with(Arc::new(FakeApi::default()));
    client
        .fetch_conversation("post1", SortMode::Best, 0)
        .await
        .unwrap();
    assert!(client.comment("post1", "c1").is_some());

    client.spot_changed("sp_other").await;

    assert_eq!(client.session().spot_id(), "sp_other");
    assert_eq!(client.session().post_id(), None);
    assert!(client.comment("post1", "c1").is_none());
    assert!(client.user("post1", "u1").is_none());
}
