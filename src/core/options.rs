use std::time::Duration;

use crate::error::{ConvoKitError, ErrorCode, Result};

pub const DEFAULT_CONFIG_CACHE_TTL: Duration = Duration::from_secs(30 * 60);
pub const DEFAULT_EVENT_BATCH_SIZE: usize = 10;
pub const DEFAULT_MAX_QUEUED_EVENTS: usize = 1000;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_BASE_URL: &str = "https://api.convokit.dev/api/v1";

/// Client-level options. Per-subsystem tuning (realtime retry envelope,
/// event flush envelope) lives with the subsystems.
#[derive(Debug, Clone)]
pub struct ConvoKitOptions {
    pub spot_id: String,
    pub base_url: String,
    pub timeout: Duration,
    pub config_cache_ttl: Duration,
    pub event_batch_size: usize,
    pub max_queued_events: usize,
    pub events_enabled: bool,
    pub sdk_version: String,
}

impl ConvoKitOptions {
    pub fn new(spot_id: impl Into<String>) -> Self {
        Self {
            spot_id: spot_id.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            config_cache_ttl: DEFAULT_CONFIG_CACHE_TTL,
            event_batch_size: DEFAULT_EVENT_BATCH_SIZE,
            max_queued_events: DEFAULT_MAX_QUEUED_EVENTS,
            events_enabled: true,
            sdk_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.spot_id.is_empty() {
            return Err(ConvoKitError::config_error(
                ErrorCode::ConfigInvalidSpotId,
                "Spot id is required",
            ));
        }

        if !self.spot_id.starts_with("sp_") {
            return Err(ConvoKitError::config_error(
                ErrorCode::ConfigInvalidSpotId,
                "Spot id must start with sp_",
            ));
        }

        if self.base_url.is_empty() || !self.base_url.starts_with("http") {
            return Err(ConvoKitError::config_error(
                ErrorCode::ConfigInvalidUrl,
                "Base URL must be an http(s) URL",
            ));
        }

        if self.config_cache_ttl.is_zero() {
            return Err(ConvoKitError::config_error(
                ErrorCode::ConfigMissingRequired,
                "Config cache TTL must be positive",
            ));
        }

        if self.event_batch_size == 0 {
            return Err(ConvoKitError::config_error(
                ErrorCode::ConfigMissingRequired,
                "Event batch size must be positive",
            ));
        }

        Ok(())
    }

    pub fn builder(spot_id: impl Into<String>) -> ConvoKitOptionsBuilder {
        ConvoKitOptionsBuilder::new(spot_id)
    }
}

pub struct ConvoKitOptionsBuilder {
    options: ConvoKitOptions,
}

impl ConvoKitOptionsBuilder {
    pub fn new(spot_id: impl Into<String>) -> Self {
        Self {
            options: ConvoKitOptions::new(spot_id),
        }
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.options.base_url = url.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.options.timeout = timeout;
        self
    }

    pub fn config_cache_ttl(mut self, ttl: Duration) -> Self {
        self.options.config_cache_ttl = ttl;
        self
    }

    pub fn event_batch_size(mut self, size: usize) -> Self {
        self.options.event_batch_size = size;
        self
    }

    pub fn max_queued_events(mut self, size: usize) -> Self {
        self.options.max_queued_events = size;
        self
    }

    pub fn events_enabled(mut self, enabled: bool) -> Self {
        self.options.events_enabled = enabled;
        self
    }

    pub fn sdk_version(mut self, version: impl Into<String>) -> Self {
        self.options.sdk_version = version.into();
        self
    }

    pub fn build(self) -> ConvoKitOptions {
        self.options
    }
}
