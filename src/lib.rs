//! ConvoKit Rust SDK
//!
//! Data layer for embedding live conversations: spot configuration,
//! conversation fetching with local entity caching, realtime polling,
//! analytics event batching, and reported-comment tracking.
//!
//! # Quick Start
//!
//! ```no_run
//! use convokit::{ConvoKitClient, ConvoKitOptions, SortMode};
//!
//! #[tokio::main]
//! async fn main() -> convokit::Result<()> {
//!     let options = ConvoKitOptions::new("sp_your_spot_id");
//!     let client = ConvoKitClient::new(options)?;
//!
//!     // Fetch the spot configuration
//!     client.initialize().await?;
//!
//!     // Load a conversation and start live updates for it
//!     let page = client.fetch_conversation("post-123", SortMode::Best, 0).await?;
//!     println!("{} comments", page.messages_count);
//!     client.start_realtime().await?;
//!
//!     // Record an analytics event
//!     client.track("fullConversationLoaded", None);
//!
//!     Ok(())
//! }
//! ```

// Module declarations
pub mod types;
pub mod error;
pub mod http;
pub mod core;
pub mod lifecycle;
pub mod persistence;
pub mod session;
pub mod utils;
mod client;

// Re-exports from types module
pub use types::{
    Comment, CommentContent, CommentStatus, ConversationPage, RealtimeData, RealtimeSnapshot,
    SortMode, SpotConfig, User,
};

// Re-exports from error module
pub use error::{ConvoKitError, ErrorCode, Result};

// Re-exports from core module
pub use core::{
    AnalyticsEvent, BlockSet, CommentStore, ConfigManager, ConvoKitOptions, ConvoKitOptionsBuilder,
    EntityStore, EventQueue, EventQueueConfig, RealtimeManager, ReportedComment,
    ReportedCommentRegistry, StoreEntity, UserStore,
};

// Re-exports from http module
pub use http::{ApiClient, HttpApiClient, RetryConfig};

// Re-exports from lifecycle and session modules
pub use lifecycle::{AppLifecycle, LifecycleEvent};
pub use session::SessionContext;

// Re-exports from persistence module
pub use persistence::{FileStore, MemoryStore, SecureStore};

// Re-exports from client module
pub use client::{ConvoKitClient, SharedClient, SDK_VERSION};

// Re-exports from utils module
pub use utils::{
    compare_versions, is_version_at_least, is_version_less_than, parse_version, ParsedVersion,
};
