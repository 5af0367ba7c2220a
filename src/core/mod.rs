pub mod cache;
pub mod config_manager;
pub mod event_queue;
pub mod options;
pub mod realtime;
pub mod reported;
pub mod store;

pub use cache::{Cache, ExpirationStrategy};
pub use config_manager::ConfigManager;
pub use event_queue::{
    AnalyticsEvent, BlockSet, EventQueue, EventQueueConfig, EventQueueConfigBuilder,
    FLUSH_RETRY_BASE_DELAY_MS, FLUSH_SEND_ATTEMPTS,
};
pub use options::{
    ConvoKitOptions, ConvoKitOptionsBuilder, DEFAULT_BASE_URL, DEFAULT_CONFIG_CACHE_TTL,
    DEFAULT_EVENT_BATCH_SIZE, DEFAULT_MAX_QUEUED_EVENTS, DEFAULT_TIMEOUT,
};
pub use realtime::{RealtimeManager, REALTIME_FETCH_ATTEMPTS, REALTIME_RETRY_BASE_DELAY_MS};
pub use reported::{ReportedComment, ReportedCommentRegistry};
pub use store::{CommentStore, EntityStore, StoreEntity, UserStore};
