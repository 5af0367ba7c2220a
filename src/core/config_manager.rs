//! Spot configuration fetching with a TTL cache and request coalescing.
//!
//! Concurrent callers for the same spot share one in-flight request; the
//! outcome is broadcast to every waiter. Fetch failures are returned to all
//! waiters as-is and are never cached, so the next caller starts a fresh
//! request. This layer performs no retries of its own.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::core::cache::{Cache, ExpirationStrategy};
use crate::core::options::ConvoKitOptions;
use crate::error::{ConvoKitError, ErrorCode, Result};
use crate::http::ApiClient;
use crate::types::SpotConfig;

type FetchOutcome = std::result::Result<SpotConfig, Arc<ConvoKitError>>;

struct InFlightFetch {
    generation: u64,
    outcome_tx: broadcast::Sender<FetchOutcome>,
    handle: JoinHandle<()>,
}

struct ConfigInner {
    api: Arc<dyn ApiClient>,
    cache: Cache<String, SpotConfig>,
    in_flight: Mutex<HashMap<String, InFlightFetch>>,
    generation: AtomicU64,
}

/// Caching, coalescing front for the `/config` endpoint.
#[derive(Clone)]
pub struct ConfigManager {
    inner: Arc<ConfigInner>,
}

impl ConfigManager {
    pub fn new(api: Arc<dyn ApiClient>, options: &ConvoKitOptions) -> Self {
        Self {
            inner: Arc::new(ConfigInner {
                api,
                cache: Cache::new(ExpirationStrategy::Ttl(options.config_cache_ttl)),
                in_flight: Mutex::new(HashMap::new()),
                generation: AtomicU64::new(0),
            }),
        }
    }

    /// Get the configuration for a spot, fetching it if the cache has no
    /// fresh entry. Joins an in-flight fetch for the same spot when one
    /// exists.
    pub async fn config(&self, spot_id: &str) -> Result<SpotConfig> {
        if let Some(config) = self.inner.cache.get(&spot_id.to_string()) {
            return Ok(config);
        }

        let mut outcome_rx = {
            let mut in_flight = self.inner.in_flight.lock();
            if let Some(fetch) = in_flight.get(spot_id) {
                fetch.outcome_tx.subscribe()
            } else {
                // A fetch may have landed between the cache check and
                // taking the lock.
                if let Some(config) = self.inner.cache.get(&spot_id.to_string()) {
                    return Ok(config);
                }
                Self::spawn_fetch(&self.inner, spot_id, &mut in_flight)
            }
        };

        match outcome_rx.recv().await {
            Ok(Ok(config)) => Ok(config),
            Ok(Err(error)) => Err(ConvoKitError::new(error.code, error.message.clone())),
            Err(_) => Err(ConvoKitError::new(
                ErrorCode::ConfigFetchFailed,
                "configuration fetch was cancelled",
            )),
        }
    }

    /// React to the active spot changing: abort any in-flight fetches and
    /// warm the cache for the new spot in the background.
    pub fn spot_changed(&self, spot_id: &str) {
        {
            let mut in_flight = self.inner.in_flight.lock();
            for (aborted_spot, fetch) in in_flight.drain() {
                tracing::debug!(spot_id = %aborted_spot, "Aborting in-flight config fetch");
                fetch.handle.abort();
            }
        }

        if self.inner.cache.get(&spot_id.to_string()).is_some() {
            return;
        }

        let mut in_flight = self.inner.in_flight.lock();
        if !in_flight.contains_key(spot_id) {
            Self::spawn_fetch(&self.inner, spot_id, &mut in_flight);
        }
    }

    /// Drop all cached configurations. In-flight fetches are unaffected.
    pub fn invalidate_cache(&self) {
        self.inner.cache.invalidate_all();
    }

    fn spawn_fetch(
        inner: &Arc<ConfigInner>,
        spot_id: &str,
        in_flight: &mut HashMap<String, InFlightFetch>,
    ) -> broadcast::Receiver<FetchOutcome> {
        let (outcome_tx, outcome_rx) = broadcast::channel(1);
        let generation = inner.generation.fetch_add(1, Ordering::SeqCst);

        tracing::debug!(spot_id = %spot_id, "Fetching spot configuration");

        let task_inner = Arc::clone(inner);
        let task_spot = spot_id.to_string();
        let task_tx = outcome_tx.clone();
        let handle = tokio::spawn(async move {
            let outcome = match task_inner.api.fetch_config(&task_spot).await {
                Ok(config) => {
                    task_inner.cache.set(task_spot.clone(), config.clone());
                    Ok(config)
                }
                Err(error) => {
                    tracing::warn!(spot_id = %task_spot, error = %error, "Config fetch failed");
                    Err(Arc::new(error))
                }
            };

            // Deregister before broadcasting so late arrivals start a new
            // fetch instead of subscribing to a finished one.
            {
                let mut in_flight = task_inner.in_flight.lock();
                if in_flight
                    .get(&task_spot)
                    .map(|fetch| fetch.generation == generation)
                    .unwrap_or(false)
                {
                    in_flight.remove(&task_spot);
                }
            }

            let _ = task_tx.send(outcome);
        });

        in_flight.insert(
            spot_id.to_string(),
            InFlightFetch {
                generation,
                outcome_tx,
                handle,
            },
        );

        outcome_rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicU32;
    use std::time::Duration;

    use crate::types::{ConversationPage, MobileSdkConfig, RealtimeSnapshot, SortMode};

    struct FakeApi {
        fetch_count: AtomicU32,
        delay: Duration,
        fail: bool,
    }

    impl FakeApi {
        fn new(delay: Duration, fail: bool) -> Self {
            Self {
                fetch_count: AtomicU32::new(0),
                delay,
                fail,
            }
        }

        fn fetches(&self) -> u32 {
            self.fetch_count.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ApiClient for FakeApi {
        async fn fetch_config(&self, _spot_id: &str) -> Result<SpotConfig> {
            self.fetch_count.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            if self.fail {
                Err(ConvoKitError::new(ErrorCode::NetworkError, "boom"))
            } else {
                Ok(SpotConfig {
                    mobile_sdk: MobileSdkConfig {
                        enabled: true,
                        ..MobileSdkConfig::default()
                    },
                    ..SpotConfig::default()
                })
            }
        }

        async fn fetch_realtime(&self, _conversation_id: &str) -> Result<RealtimeSnapshot> {
            Err(ConvoKitError::new(ErrorCode::NetworkError, "unused"))
        }

        async fn fetch_conversation(
            &self,
            _spot_id: &str,
            _post_id: &str,
            _sort: SortMode,
            _offset: i64,
        ) -> Result<ConversationPage> {
            Err(ConvoKitError::new(ErrorCode::NetworkError, "unused"))
        }

        async fn send_events(&self, _events: &[crate::core::event_queue::AnalyticsEvent]) -> Result<()> {
            Ok(())
        }

        async fn comment_status(&self, _comment_id: &str) -> Result<String> {
            Err(ConvoKitError::new(ErrorCode::NetworkError, "unused"))
        }

        async fn mute_user(&self, _user_id: &str) -> Result<()> {
            Ok(())
        }

        async fn delete_comment(&self, _comment_id: &str, _parent_id: Option<&str>) -> Result<()> {
            Ok(())
        }
    }

    fn manager_with(api: Arc<FakeApi>) -> ConfigManager {
        let options = ConvoKitOptions::new("sp_test");
        ConfigManager::new(api, &options)
    }

    #[tokio::test]
    async fn test_cached_config_skips_fetch() {
        let api = Arc::new(FakeApi::new(Duration::ZERO, false));
        let manager = manager_with(Arc::clone(&api));

        manager.config("sp_test").await.unwrap();
        manager.config("sp_test").await.unwrap();

        assert_eq!(api.fetches(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_fetch() {
        let api = Arc::new(FakeApi::new(Duration::from_millis(50), false));
        let manager = manager_with(Arc::clone(&api));

        let mut handles = Vec::new();
        for _ in 0..5 {
            let manager = manager.clone();
            handles.push(tokio::spawn(
                async move { manager.config("sp_test").await },
            ));
        }

        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }
        assert_eq!(api.fetches(), 1);
    }

    #[tokio::test]
    async fn test_failure_reaches_all_waiters_and_is_not_cached() {
        let api = Arc::new(FakeApi::new(Duration::from_millis(50), true));
        let manager = manager_with(Arc::clone(&api));

        let first = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.config("sp_test").await })
        };
        let second = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.config("sp_test").await })
        };

        assert!(first.await.unwrap().is_err());
        assert!(second.await.unwrap().is_err());
        assert_eq!(api.fetches(), 1);

        // The failure was not cached, so a later caller fetches again.
        assert!(manager.config("sp_test").await.is_err());
        assert_eq!(api.fetches(), 2);
    }

    #[tokio::test]
    async fn test_spot_changed_aborts_and_prefetches() {
        let api = Arc::new(FakeApi::new(Duration::from_millis(200), false));
        let manager = manager_with(Arc::clone(&api));

        let waiter = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.config("sp_old").await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        manager.spot_changed("sp_new");

        let aborted = waiter.await.unwrap();
        assert!(aborted.is_err());
        assert_eq!(
            aborted.unwrap_err().code,
            ErrorCode::ConfigFetchFailed
        );

        // The prefetch for the new spot completes and fills the cache.
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(manager.config("sp_new").await.is_ok());
        assert_eq!(api.fetches(), 2);
    }

    #[tokio::test]
    async fn test_spot_changed_with_fresh_cache_does_not_refetch() {
        let api = Arc::new(FakeApi::new(Duration::ZERO, false));
        let manager = manager_with(Arc::clone(&api));

        manager.config("sp_test").await.unwrap();
        manager.spot_changed("sp_test");
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(api.fetches(), 1);
    }
}
