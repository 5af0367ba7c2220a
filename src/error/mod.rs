use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Initialization errors
    InitFailed,
    InitNotInitialized,

    // Network errors
    NetworkError,
    NetworkTimeout,
    NetworkRetryLimit,
    NetworkServiceUnavailable,

    // HTTP errors
    HttpBadRequest,
    HttpUnauthorized,
    HttpForbidden,
    HttpNotFound,
    HttpRateLimited,
    HttpServerError,
    HttpTimeout,
    HttpNetworkError,
    HttpInvalidResponse,

    // Configuration errors
    ConfigInvalidUrl,
    ConfigMissingRequired,
    ConfigInvalidSpotId,
    ConfigFetchFailed,
    ConfigRealtimeDisabled,

    // Conversation and store errors
    ConversationFetchFailed,
    CommentNotFound,
    UserNotFound,

    // Realtime errors
    RealtimeFetchFailed,
    RealtimeStopped,

    // Event errors
    EventQueueFull,
    EventInvalidData,
    EventSendFailed,
    EventFlushFailed,

    // Persistence errors
    StorageReadError,
    StorageWriteError,
    StorageInvalidData,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InitFailed => "INIT_FAILED",
            ErrorCode::InitNotInitialized => "INIT_NOT_INITIALIZED",
            ErrorCode::NetworkError => "NETWORK_ERROR",
            ErrorCode::NetworkTimeout => "NETWORK_TIMEOUT",
            ErrorCode::NetworkRetryLimit => "NETWORK_RETRY_LIMIT",
            ErrorCode::NetworkServiceUnavailable => "NETWORK_SERVICE_UNAVAILABLE",
            ErrorCode::HttpBadRequest => "HTTP_BAD_REQUEST",
            ErrorCode::HttpUnauthorized => "HTTP_UNAUTHORIZED",
            ErrorCode::HttpForbidden => "HTTP_FORBIDDEN",
            ErrorCode::HttpNotFound => "HTTP_NOT_FOUND",
            ErrorCode::HttpRateLimited => "HTTP_RATE_LIMITED",
            ErrorCode::HttpServerError => "HTTP_SERVER_ERROR",
            ErrorCode::HttpTimeout => "HTTP_TIMEOUT",
            ErrorCode::HttpNetworkError => "HTTP_NETWORK_ERROR",
            ErrorCode::HttpInvalidResponse => "HTTP_INVALID_RESPONSE",
            ErrorCode::ConfigInvalidUrl => "CONFIG_INVALID_URL",
            ErrorCode::ConfigMissingRequired => "CONFIG_MISSING_REQUIRED",
            ErrorCode::ConfigInvalidSpotId => "CONFIG_INVALID_SPOT_ID",
            ErrorCode::ConfigFetchFailed => "CONFIG_FETCH_FAILED",
            ErrorCode::ConfigRealtimeDisabled => "CONFIG_REALTIME_DISABLED",
            ErrorCode::ConversationFetchFailed => "CONVERSATION_FETCH_FAILED",
            ErrorCode::CommentNotFound => "COMMENT_NOT_FOUND",
            ErrorCode::UserNotFound => "USER_NOT_FOUND",
            ErrorCode::RealtimeFetchFailed => "REALTIME_FETCH_FAILED",
            ErrorCode::RealtimeStopped => "REALTIME_STOPPED",
            ErrorCode::EventQueueFull => "EVENT_QUEUE_FULL",
            ErrorCode::EventInvalidData => "EVENT_INVALID_DATA",
            ErrorCode::EventSendFailed => "EVENT_SEND_FAILED",
            ErrorCode::EventFlushFailed => "EVENT_FLUSH_FAILED",
            ErrorCode::StorageReadError => "STORAGE_READ_ERROR",
            ErrorCode::StorageWriteError => "STORAGE_WRITE_ERROR",
            ErrorCode::StorageInvalidData => "STORAGE_INVALID_DATA",
        }
    }

    /// Whether a request failing with this code may succeed on a later attempt.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ErrorCode::NetworkError
                | ErrorCode::NetworkTimeout
                | ErrorCode::NetworkRetryLimit
                | ErrorCode::NetworkServiceUnavailable
                | ErrorCode::HttpTimeout
                | ErrorCode::HttpNetworkError
                | ErrorCode::HttpServerError
                | ErrorCode::HttpRateLimited
                | ErrorCode::EventSendFailed
                | ErrorCode::RealtimeFetchFailed
        )
    }
}

#[derive(Error, Debug)]
#[error("[{code}] {message}")]
pub struct ConvoKitError {
    pub code: ErrorCode,
    pub message: String,
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ConvoKitError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        code: ErrorCode,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn config_error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::new(code, message)
    }

    pub fn network_error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::new(code, message)
    }

    pub fn is_recoverable(&self) -> bool {
        self.code.is_recoverable()
    }

    pub fn is_config_error(&self) -> bool {
        matches!(
            self.code,
            ErrorCode::ConfigInvalidUrl
                | ErrorCode::ConfigMissingRequired
                | ErrorCode::ConfigInvalidSpotId
                | ErrorCode::ConfigFetchFailed
                | ErrorCode::ConfigRealtimeDisabled
        )
    }

    pub fn is_network_error(&self) -> bool {
        matches!(
            self.code,
            ErrorCode::NetworkError
                | ErrorCode::NetworkTimeout
                | ErrorCode::NetworkRetryLimit
                | ErrorCode::HttpBadRequest
                | ErrorCode::HttpUnauthorized
                | ErrorCode::HttpForbidden
                | ErrorCode::HttpNotFound
                | ErrorCode::HttpRateLimited
                | ErrorCode::HttpServerError
                | ErrorCode::HttpTimeout
                | ErrorCode::HttpNetworkError
                | ErrorCode::HttpInvalidResponse
        )
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

pub type Result<T> = std::result::Result<T, ConvoKitError>;
