use convokit::{ConvoKitError, ErrorCode};

#[test]
fn test_error_code_string_values() {
    assert_eq!(ErrorCode::InitFailed.as_str(), "INIT_FAILED");
    assert_eq!(ErrorCode::InitNotInitialized.as_str(), "INIT_NOT_INITIALIZED");

    assert_eq!(ErrorCode::NetworkError.as_str(), "NETWORK_ERROR");
    assert_eq!(ErrorCode::NetworkTimeout.as_str(), "NETWORK_TIMEOUT");
    assert_eq!(ErrorCode::NetworkRetryLimit.as_str(), "NETWORK_RETRY_LIMIT");

    assert_eq!(ErrorCode::HttpUnauthorized.as_str(), "HTTP_UNAUTHORIZED");
    assert_eq!(ErrorCode::HttpRateLimited.as_str(), "HTTP_RATE_LIMITED");
    assert_eq!(ErrorCode::HttpServerError.as_str(), "HTTP_SERVER_ERROR");

    assert_eq!(ErrorCode::ConfigInvalidSpotId.as_str(), "CONFIG_INVALID_SPOT_ID");
    assert_eq!(ErrorCode::ConfigFetchFailed.as_str(), "CONFIG_FETCH_FAILED");
    assert_eq!(
        ErrorCode::ConversationFetchFailed.as_str(),
        "CONVERSATION_FETCH_FAILED"
    );
    assert_eq!(ErrorCode::RealtimeFetchFailed.as_str(), "REALTIME_FETCH_FAILED");
    assert_eq!(ErrorCode::EventSendFailed.as_str(), "EVENT_SEND_FAILED");
    assert_eq!(ErrorCode::StorageInvalidData.as_str(), "STORAGE_INVALID_DATA");
}

#[test]
fn test_recoverable_errors() {
    assert!(ErrorCode::NetworkError.is_recoverable());
    assert!(ErrorCode::NetworkTimeout.is_recoverable());
    assert!(ErrorCode::NetworkRetryLimit.is_recoverable());
    assert!(ErrorCode::NetworkServiceUnavailable.is_recoverable());
    assert!(ErrorCode::HttpTimeout.is_recoverable());
    assert!(ErrorCode::HttpNetworkError.is_recoverable());
    assert!(ErrorCode::HttpServerError.is_recoverable());
    assert!(ErrorCode::HttpRateLimited.is_recoverable());
    assert!(ErrorCode::EventSendFailed.is_recoverable());
    assert!(ErrorCode::RealtimeFetchFailed.is_recoverable());
}

#[test]
fn test_non_recoverable_errors() {
    assert!(!ErrorCode::InitFailed.is_recoverable());
    assert!(!ErrorCode::HttpUnauthorized.is_recoverable());
    assert!(!ErrorCode::HttpBadRequest.is_recoverable());
    assert!(!ErrorCode::HttpNotFound.is_recoverable());
    assert!(!ErrorCode::ConfigInvalidSpotId.is_recoverable());
    assert!(!ErrorCode::ConfigRealtimeDisabled.is_recoverable());
    assert!(!ErrorCode::CommentNotFound.is_recoverable());
    assert!(!ErrorCode::StorageWriteError.is_recoverable());
}

#[test]
fn test_error_creation() {
    let error = ConvoKitError::new(ErrorCode::InitFailed, "Test error");

    assert_eq!(error.code, ErrorCode::InitFailed);
    assert_eq!(error.message, "Test error");
    assert!(error.source.is_none());
}

#[test]
fn test_error_is_recoverable() {
    let recoverable = ConvoKitError::new(ErrorCode::NetworkError, "Network error");
    let non_recoverable = ConvoKitError::new(ErrorCode::ConfigInvalidSpotId, "Bad spot id");

    assert!(recoverable.is_recoverable());
    assert!(!non_recoverable.is_recoverable());
}

#[test]
fn test_error_is_config_error() {
    let config_error = ConvoKitError::config_error(ErrorCode::ConfigInvalidSpotId, "Bad spot id");
    let network_error = ConvoKitError::network_error(ErrorCode::NetworkError, "Network issue");

    assert!(config_error.is_config_error());
    assert!(!network_error.is_config_error());
}

#[test]
fn test_error_is_network_error() {
    let network_error = ConvoKitError::network_error(ErrorCode::HttpTimeout, "Timeout");
    let config_error = ConvoKitError::config_error(ErrorCode::ConfigInvalidSpotId, "Bad spot id");

    assert!(network_error.is_network_error());
    assert!(!config_error.is_network_error());
}

#[test]
fn test_error_source_chain() {
    let io_error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only volume");
    let error = ConvoKitError::with_source(ErrorCode::StorageWriteError, "Save failed", io_error);

    assert_eq!(error.code, ErrorCode::StorageWriteError);
    let source = std::error::Error::source(&error).expect("source should be preserved");
    assert!(format!("{}", source).contains("read-only volume"));
}

#[test]
fn test_error_display() {
    let error = ConvoKitError::new(ErrorCode::ConversationFetchFailed, "Test message");
    let display = format!("{}", error);

    assert!(display.contains("CONVERSATION_FETCH_FAILED"));
    assert!(display.contains("Test message"));
}

#[test]
fn test_error_code_display() {
    let code = ErrorCode::EventFlushFailed;
    let display = format!("{}", code);

    assert_eq!(display, "EVENT_FLUSH_FAILED");
}
