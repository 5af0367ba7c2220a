//! Registry of comments the current user has reported.
//!
//! Reports survive restarts: the post-to-comment-ids map is written to the
//! secure store on every mutation and loaded back at construction. Reported
//! state is only surfaced on comments still awaiting moderation; once a
//! comment is published or rejected the flag no longer applies.

use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::core::store::CommentStore;
use crate::persistence::{load_value, save_value, SecureStore};
use crate::types::{Comment, CommentStatus};

const STORAGE_KEY: &str = "convokit.reportedComments";

/// Notification that a comment was just reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportedComment {
    pub post_id: String,
    pub comment_id: String,
}

pub struct ReportedCommentRegistry {
    reported: Mutex<HashMap<String, HashSet<String>>>,
    store: Arc<dyn SecureStore>,
    comments: Arc<CommentStore>,
    reported_tx: broadcast::Sender<ReportedComment>,
}

impl ReportedCommentRegistry {
    /// Create a registry, loading any previously persisted reports.
    /// Unreadable stored data is discarded.
    pub fn new(store: Arc<dyn SecureStore>, comments: Arc<CommentStore>) -> Self {
        let reported = match load_value::<HashMap<String, HashSet<String>>>(&*store, STORAGE_KEY) {
            Ok(Some(map)) => map,
            Ok(None) => HashMap::new(),
            Err(error) => {
                tracing::warn!(error = %error, "Discarding unreadable reported-comments data");
                HashMap::new()
            }
        };

        let (reported_tx, _) = broadcast::channel(16);
        Self {
            reported: Mutex::new(reported),
            store,
            comments,
            reported_tx,
        }
    }

    pub fn is_reported(&self, post_id: &str, comment_id: &str) -> bool {
        self.reported
            .lock()
            .get(post_id)
            .map(|ids| ids.contains(comment_id))
            .unwrap_or(false)
    }

    /// Record a successful report: persist it, flip the stored comment's
    /// flag, and notify subscribers.
    pub fn mark_reported(&self, post_id: &str, comment_id: &str) {
        {
            let mut reported = self.reported.lock();
            reported
                .entry(post_id.to_string())
                .or_default()
                .insert(comment_id.to_string());
            self.persist(&reported);
        }

        if let Some(mut comment) = self.comments.get(comment_id, post_id) {
            comment.is_reported = true;
            self.comments.set(vec![comment], post_id);
        }

        let _ = self.reported_tx.send(ReportedComment {
            post_id: post_id.to_string(),
            comment_id: comment_id.to_string(),
        });
    }

    /// Merge the reported-comment ids a conversation response carries.
    pub fn apply_conversation(&self, post_id: &str, reported_ids: &HashMap<String, bool>) {
        if reported_ids.is_empty() {
            return;
        }
        let mut reported = self.reported.lock();
        let ids = reported.entry(post_id.to_string()).or_default();
        for id in reported_ids.keys() {
            ids.insert(id.clone());
        }
        self.persist(&reported);
    }

    /// Mark the comment as reported when the user reported it and it is
    /// still awaiting moderation.
    pub fn decorate(&self, post_id: &str, comment: &mut Comment) {
        let awaiting_moderation =
            matches!(comment.status(), None | Some(CommentStatus::Pending));
        if !awaiting_moderation {
            return;
        }
        if let Some(id) = comment.id.as_deref() {
            if self.is_reported(post_id, id) {
                comment.is_reported = true;
            }
        }
    }

    /// Subscribe to report notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<ReportedComment> {
        self.reported_tx.subscribe()
    }

    /// Forget all reports, in memory and on disk.
    pub fn clean_cache(&self) {
        let mut reported = self.reported.lock();
        reported.clear();
        self.persist(&reported);
    }

    fn persist(&self, reported: &HashMap<String, HashSet<String>>) {
        if let Err(error) = save_value(&*self.store, STORAGE_KEY, reported) {
            tracing::warn!(error = %error, "Failed to persist reported comments");
        }
    }
}
