//! Session context shared across SDK components.
//!
//! Tracks which spot and post the host app is currently showing, plus the
//! page view identifier stamped on analytics events. A new page view id is
//! minted whenever the displayed post changes.
//!
//! # Thread Safety
//!
//! All operations are thread-safe using `RwLock`.

use parking_lot::RwLock;
use std::sync::Arc;

use crate::types::conversation_id;

#[derive(Debug, Clone)]
struct SessionState {
    spot_id: String,
    post_id: Option<String>,
    page_view_id: String,
    user_id: Option<String>,
}

pub struct SessionContext {
    state: Arc<RwLock<SessionState>>,
}

impl SessionContext {
    pub fn new(spot_id: impl Into<String>) -> Self {
        Self {
            state: Arc::new(RwLock::new(SessionState {
                spot_id: spot_id.into(),
                post_id: None,
                page_view_id: new_page_view_id(),
                user_id: None,
            })),
        }
    }

    pub fn spot_id(&self) -> String {
        self.state.read().spot_id.clone()
    }

    pub fn set_spot_id(&self, spot_id: impl Into<String>) {
        let mut state = self.state.write();
        state.spot_id = spot_id.into();
        tracing::debug!(spot_id = %state.spot_id, "Session spot changed");
    }

    pub fn post_id(&self) -> Option<String> {
        self.state.read().post_id.clone()
    }

    /// Point the session at a post. Switching to a different post starts a
    /// new page view; setting the same post again does not.
    pub fn set_post_id(&self, post_id: impl Into<String>) {
        let post_id = post_id.into();
        let mut state = self.state.write();
        if state.post_id.as_deref() == Some(post_id.as_str()) {
            return;
        }
        state.post_id = Some(post_id);
        state.page_view_id = new_page_view_id();
        tracing::debug!(
            post_id = ?state.post_id,
            page_view_id = %state.page_view_id,
            "Session post changed"
        );
    }

    /// Drop the post, minting a fresh page view id. The spot and user stay.
    pub fn clear_post(&self) {
        let mut state = self.state.write();
        state.post_id = None;
        state.page_view_id = new_page_view_id();
    }

    pub fn page_view_id(&self) -> String {
        self.state.read().page_view_id.clone()
    }

    /// Start a new page view for the current post.
    pub fn refresh_page_view(&self) -> String {
        let mut state = self.state.write();
        state.page_view_id = new_page_view_id();
        state.page_view_id.clone()
    }

    pub fn user_id(&self) -> Option<String> {
        self.state.read().user_id.clone()
    }

    pub fn set_user_id(&self, user_id: Option<String>) {
        self.state.write().user_id = user_id;
    }

    /// The conversation identifier for the current spot and post.
    pub fn conversation_id(&self) -> Option<String> {
        let state = self.state.read();
        state
            .post_id
            .as_deref()
            .map(|post_id| conversation_id(&state.spot_id, post_id))
    }

    /// Forget the post and user, keeping the spot. A fresh page view id
    /// is minted.
    pub fn reset(&self) {
        let mut state = self.state.write();
        state.post_id = None;
        state.user_id = None;
        state.page_view_id = new_page_view_id();
        tracing::debug!("Session reset");
    }
}

impl Clone for SessionContext {
    fn clone(&self) -> Self {
        Self {
            state: Arc::new(RwLock::new(self.state.read().clone())),
        }
    }
}

fn new_page_view_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session() {
        let session = SessionContext::new("sp_test");
        assert_eq!(session.spot_id(), "sp_test");
        assert_eq!(session.post_id(), None);
        assert_eq!(session.conversation_id(), None);
        assert!(!session.page_view_id().is_empty());
    }

    #[test]
    fn test_post_change_starts_new_page_view() {
        let session = SessionContext::new("sp_test");
        let initial = session.page_view_id();

        session.set_post_id("post1");
        let after_first = session.page_view_id();
        assert_ne!(initial, after_first);

        // Same post again keeps the page view.
        session.set_post_id("post1");
        assert_eq!(session.page_view_id(), after_first);

        session.set_post_id("post2");
        assert_ne!(session.page_view_id(), after_first);
    }

    #[test]
    fn test_conversation_id_composition() {
        let session = SessionContext::new("sp_test");
        session.set_post_id("post1");
        assert_eq!(session.conversation_id(), Some("sp_test_post1".to_string()));
    }

    #[test]
    fn test_refresh_page_view() {
        let session = SessionContext::new("sp_test");
        let before = session.page_view_id();
        let refreshed = session.refresh_page_view();
        assert_ne!(before, refreshed);
        assert_eq!(session.page_view_id(), refreshed);
    }

    #[test]
    fn test_clear_post_keeps_spot_and_user() {
        let session = SessionContext::new("sp_test");
        session.set_post_id("post1");
        session.set_user_id(Some("u1".to_string()));
        let page_view = session.page_view_id();

        session.clear_post();

        assert_eq!(session.spot_id(), "sp_test");
        assert_eq!(session.post_id(), None);
        assert_eq!(session.user_id(), Some("u1".to_string()));
        assert_ne!(session.page_view_id(), page_view);
    }

    #[test]
    fn test_reset_keeps_spot() {
        let session = SessionContext::new("sp_test");
        session.set_post_id("post1");
        session.set_user_id(Some("u1".to_string()));
        let page_view = session.page_view_id();

        session.reset();

        assert_eq!(session.spot_id(), "sp_test");
        assert_eq!(session.post_id(), None);
        assert_eq!(session.user_id(), None);
        assert_ne!(session.page_view_id(), page_view);
    }

    #[test]
    fn test_clone_is_independent() {
        let session = SessionContext::new("sp_test");
        session.set_post_id("post1");

        let cloned = session.clone();
        cloned.set_post_id("post2");

        assert_eq!(session.post_id(), Some("post1".to_string()));
        assert_eq!(cloned.post_id(), Some("post2".to_string()));
    }
}
