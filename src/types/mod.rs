use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Conversation sort order, as accepted by the read endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortMode {
    #[default]
    Best,
    Newest,
    Oldest,
}

impl SortMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortMode::Best => "best",
            SortMode::Newest => "newest",
            SortMode::Oldest => "oldest",
        }
    }
}

/// Moderation status attached to a comment by the backend.
///
/// The raw wire value is kept on the comment; this is the interpreted form.
/// Any status containing "block" collapses to `Block`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentStatus {
    Unknown,
    Block,
    Reject,
    Pending,
    PublishAndModerate,
    RequireApproval,
}

impl CommentStatus {
    pub fn parse(raw: &str) -> Self {
        if raw.contains("block") {
            return CommentStatus::Block;
        }
        match raw {
            "publish_and_moderate" => CommentStatus::PublishAndModerate,
            "require_approval" => CommentStatus::RequireApproval,
            "reject" => CommentStatus::Reject,
            "pending" => CommentStatus::Pending,
            _ => CommentStatus::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextContent {
    pub id: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageContent {
    pub original_width: i64,
    pub original_height: i64,
    pub image_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnimationContent {
    pub preview_width: i64,
    pub preview_height: i64,
    pub original_width: i64,
    pub original_height: i64,
    pub original_url: String,
}

/// One item of a comment body. Unrecognized content types decode to
/// `Unknown` rather than failing the whole comment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CommentContent {
    Text(TextContent),
    Image(ImageContent),
    Animation(AnimationContent),
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Rank {
    pub ranks_up: Option<i64>,
    pub ranks_down: Option<i64>,
    pub ranked_by_current_user: Option<i64>,
}

/// A single comment, both as decoded from the wire (nested `replies`) and as
/// held by the comment store (replies flattened away into `reply_ids`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Comment {
    pub id: Option<String>,
    pub parent_id: Option<String>,
    pub root_comment: Option<String>,
    pub depth: Option<i64>,
    pub user_id: Option<String>,
    pub written_at: Option<f64>,
    pub time: Option<f64>,
    pub replies_count: Option<i64>,
    pub total_replies_count: Option<i64>,
    pub offset: Option<i64>,
    pub status: Option<String>,
    pub has_next: bool,
    pub edited: bool,
    pub deleted: bool,
    pub published: bool,
    pub rank: Option<Rank>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub content: Vec<CommentContent>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub replies: Vec<Comment>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub reply_ids: Vec<String>,
    /// Session-local flag maintained by the reported-comment registry.
    #[serde(skip)]
    pub is_reported: bool,
}

impl Comment {
    pub fn status(&self) -> Option<CommentStatus> {
        let raw = self.status.as_deref()?;
        match CommentStatus::parse(raw) {
            CommentStatus::Unknown => None,
            status => Some(status),
        }
    }

    /// A comment is a reply when it is not its own thread root.
    pub fn is_reply(&self) -> bool {
        match (&self.id, &self.root_comment) {
            (Some(id), Some(root)) => id != root,
            _ => false,
        }
    }

    /// Newer responses carry `totalRepliesCount`, older ones `repliesCount`.
    pub fn effective_replies_count(&self) -> i64 {
        self.total_replies_count
            .or(self.replies_count)
            .unwrap_or(0)
    }

    pub fn text(&self) -> Option<&str> {
        self.content.iter().find_map(|item| match item {
            CommentContent::Text(text) => Some(text.text.as_str()),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct User {
    pub id: Option<String>,
    pub user_id: Option<String>,
    pub display_name: Option<String>,
    pub user_name: Option<String>,
    pub image_id: Option<String>,
    pub registered: bool,
    pub is_admin: bool,
    pub is_moderator: bool,
    pub is_community_moderator: bool,
    pub is_super_admin: bool,
    pub is_journalist: bool,
    pub is_muted: bool,
    pub online: bool,
    pub badge_type: String,
}

impl User {
    /// Some endpoints populate `id`, others `userId`.
    pub fn key(&self) -> Option<&str> {
        self.id.as_deref().or(self.user_id.as_deref())
    }

    pub fn is_staff(&self) -> bool {
        self.is_super_admin
            || self.is_admin
            || self.is_journalist
            || self.is_moderator
            || self.is_community_moderator
    }
}

/// One page of a conversation read response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConversationPage {
    pub comments: Vec<Comment>,
    pub users: HashMap<String, User>,
    pub reported_comments: Option<HashMap<String, bool>>,
    pub messages_count: i64,
    pub read_only: bool,
    pub has_next: bool,
    pub offset: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageCounts {
    #[serde(rename = "Replies")]
    pub replies: i64,
    #[serde(rename = "Comments")]
    pub comments: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OnlineUser {
    pub user_id: String,
    pub display_name: String,
    pub user_name: String,
    pub registered: bool,
    pub image_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TypingGroup {
    pub users: Option<Vec<OnlineUser>>,
    pub count: i64,
    pub key: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ViewingCount {
    pub count: i64,
}

const OVERALL_TYPING_KEY: &str = "Overall";

/// Per-channel realtime payload, keyed by conversation id
/// (`"{spot_id}_{post_id}"`). Channels the server did not include are empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RealtimeData {
    #[serde(rename = "conversation/count-messages")]
    message_counts: HashMap<String, Vec<MessageCounts>>,
    #[serde(rename = "conversation/typing-v2-count")]
    typing_counts: HashMap<String, Vec<HashMap<String, i64>>>,
    #[serde(rename = "conversation/typing-v2-users")]
    typing_users: HashMap<String, Vec<TypingGroup>>,
    #[serde(rename = "online/users")]
    online_users: HashMap<String, Vec<OnlineUser>>,
    #[serde(rename = "online/users-count")]
    viewing_counts: HashMap<String, Vec<ViewingCount>>,
    #[serde(rename = "conversation/new-messages")]
    new_comments: HashMap<String, Vec<Comment>>,
}

impl RealtimeData {
    pub fn comments_count(&self, conversation_id: &str) -> Option<i64> {
        self.counts(conversation_id).map(|counts| counts.comments)
    }

    pub fn replies_count(&self, conversation_id: &str) -> Option<i64> {
        self.counts(conversation_id).map(|counts| counts.replies)
    }

    pub fn total_comments_count(&self, conversation_id: &str) -> Option<i64> {
        self.counts(conversation_id)
            .map(|counts| counts.comments + counts.replies)
    }

    /// Count of users currently typing, from the group keyed "Overall".
    pub fn typing_count(&self, conversation_id: &str) -> Option<i64> {
        self.typing_users
            .get(conversation_id)?
            .iter()
            .find(|group| group.key == OVERALL_TYPING_KEY)
            .map(|group| group.count)
    }

    pub fn new_comments(&self, conversation_id: &str) -> Option<&[Comment]> {
        self.new_comments
            .get(conversation_id)
            .map(|comments| comments.as_slice())
    }

    pub fn online_viewing_count(&self, conversation_id: &str) -> Option<i64> {
        self.viewing_counts
            .get(conversation_id)?
            .first()
            .map(|viewing| viewing.count)
    }

    pub fn online_users(&self, conversation_id: &str) -> Option<&[OnlineUser]> {
        self.online_users
            .get(conversation_id)
            .map(|users| users.as_slice())
    }

    fn counts(&self, conversation_id: &str) -> Option<&MessageCounts> {
        self.message_counts.get(conversation_id)?.first()
    }
}

/// One realtime poll response. `next_fetch` and `timestamp` are server-side
/// epoch seconds; their difference is the requested polling interval.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RealtimeSnapshot {
    pub data: Option<RealtimeData>,
    pub next_fetch: i64,
    pub timestamp: i64,
}

impl RealtimeSnapshot {
    /// Delay until the next poll. A server clock pair that went backwards
    /// clamps to zero instead of producing a bogus interval.
    pub fn next_delay(&self) -> Duration {
        let seconds = (self.next_fetch - self.timestamp).max(0) as u64;
        Duration::from_secs(seconds)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EventsStrategyConfig {
    pub block_versions_equal_or_previous: Option<String>,
    pub block_events_by_version: HashMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MobileSdkConfig {
    pub enabled: bool,
    pub realtime_enabled: bool,
    pub blitz_enabled: bool,
    pub events_strategy_config: Option<EventsStrategyConfig>,
}

impl Default for MobileSdkConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            realtime_enabled: false,
            blitz_enabled: false,
            events_strategy_config: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InitializationConfig {
    pub brand_color: Option<String>,
    pub image_base_url: Option<String>,
    pub monetized: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SharedConfig {
    pub comments_per_page: Option<i64>,
}

/// Per-tenant configuration tree. Decoded leniently: unknown fields are
/// ignored and missing sections fall back to defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SpotConfig {
    pub mobile_sdk: MobileSdkConfig,
    pub initialization: Option<InitializationConfig>,
    pub shared: Option<SharedConfig>,
}

impl SpotConfig {
    pub fn realtime_enabled(&self) -> bool {
        self.mobile_sdk.enabled && self.mobile_sdk.realtime_enabled
    }
}

/// Conversation ids on the realtime channel are `"{spot_id}_{post_id}"`.
pub fn conversation_id(spot_id: &str, post_id: &str) -> String {
    format!("{}_{}", spot_id, post_id)
}
