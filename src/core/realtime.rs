//! Realtime conversation polling.
//!
//! A single background task owns the poll state machine and walks through
//! three states: idle, fetching, and waiting for the server-assigned next
//! fetch time. Each cycle re-reads the spot configuration, so flipping the
//! realtime flag off takes effect on the next cycle. Snapshots are published
//! through a watch channel; subscribers always see the latest one.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

use crate::core::config_manager::ConfigManager;
use crate::http::{with_retry, ApiClient, RetryConfig};
use crate::types::{conversation_id, RealtimeSnapshot};

/// Fetch attempts per cycle before the poller gives up.
pub const REALTIME_FETCH_ATTEMPTS: u32 = 3;

/// Base delay between fetch attempts in milliseconds.
pub const REALTIME_RETRY_BASE_DELAY_MS: u64 = 1000;

enum PollCommand {
    Start { spot_id: String, post_id: String },
    Stop,
}

enum PollState {
    NotFetching,
    Fetching {
        spot_id: String,
        post_id: String,
    },
    Waiting {
        spot_id: String,
        post_id: String,
        next_fetch_at: Instant,
    },
}

impl PollState {
    fn conversation(&self) -> Option<(&str, &str)> {
        match self {
            PollState::NotFetching => None,
            PollState::Fetching { spot_id, post_id }
            | PollState::Waiting {
                spot_id, post_id, ..
            } => Some((spot_id.as_str(), post_id.as_str())),
        }
    }
}

enum CycleOutcome {
    /// Snapshot published; poll again at the given instant.
    Scheduled(Instant),
    /// Realtime is unavailable for this conversation; go idle.
    Idle,
}

/// Drives periodic realtime fetches for the active conversation.
pub struct RealtimeManager {
    command_tx: mpsc::Sender<PollCommand>,
    snapshot_tx: Arc<watch::Sender<Option<RealtimeSnapshot>>>,
    snapshot_rx: watch::Receiver<Option<RealtimeSnapshot>>,
    is_fetching: Arc<AtomicBool>,
}

impl RealtimeManager {
    pub fn new(api: Arc<dyn ApiClient>, config: ConfigManager) -> Self {
        let (command_tx, command_rx) = mpsc::channel(8);
        let (snapshot_tx, snapshot_rx) = watch::channel(None);
        let snapshot_tx = Arc::new(snapshot_tx);
        let is_fetching = Arc::new(AtomicBool::new(false));

        tokio::spawn(run_poll_loop(
            api,
            config,
            command_rx,
            Arc::clone(&snapshot_tx),
            Arc::clone(&is_fetching),
        ));

        Self {
            command_tx,
            snapshot_tx,
            snapshot_rx,
            is_fetching,
        }
    }

    /// Begin polling for a conversation. Calling again with the same post is
    /// a no-op; a different post replaces the current one, dropping any
    /// fetch already in flight.
    pub async fn start_fetching(&self, spot_id: &str, post_id: &str) {
        let _ = self
            .command_tx
            .send(PollCommand::Start {
                spot_id: spot_id.to_string(),
                post_id: post_id.to_string(),
            })
            .await;
    }

    /// Stop polling. The last published snapshot stays available.
    pub async fn stop_fetching(&self) {
        let _ = self.command_tx.send(PollCommand::Stop).await;
    }

    /// Watch the stream of realtime snapshots. The receiver starts with the
    /// latest published value, or `None` before the first successful fetch.
    pub fn subscribe(&self) -> watch::Receiver<Option<RealtimeSnapshot>> {
        self.snapshot_rx.clone()
    }

    pub fn latest(&self) -> Option<RealtimeSnapshot> {
        self.snapshot_rx.borrow().clone()
    }

    /// Clear the published snapshot without touching the polling state.
    pub fn reset(&self) {
        self.snapshot_tx.send_replace(None);
    }

    pub fn is_fetching(&self) -> bool {
        self.is_fetching.load(Ordering::SeqCst)
    }
}

async fn run_poll_loop(
    api: Arc<dyn ApiClient>,
    config: ConfigManager,
    mut command_rx: mpsc::Receiver<PollCommand>,
    snapshot_tx: Arc<watch::Sender<Option<RealtimeSnapshot>>>,
    is_fetching: Arc<AtomicBool>,
) {
    let mut state = PollState::NotFetching;

    'run: loop {
        is_fetching.store(
            !matches!(state, PollState::NotFetching),
            Ordering::SeqCst,
        );

        state = match state {
            PollState::NotFetching => match command_rx.recv().await {
                None => break 'run,
                Some(command) => apply_command(&state, command),
            },
            PollState::Fetching { spot_id, post_id } => {
                let cycle = run_cycle(
                    Arc::clone(&api),
                    config.clone(),
                    Arc::clone(&snapshot_tx),
                    spot_id.clone(),
                    post_id.clone(),
                );
                tokio::pin!(cycle);

                loop {
                    tokio::select! {
                        command = command_rx.recv() => {
                            let Some(command) = command else { break 'run };
                            if is_noop(&command, &spot_id, &post_id) {
                                continue;
                            }
                            break apply_command(
                                &PollState::Fetching {
                                    spot_id: spot_id.clone(),
                                    post_id: post_id.clone(),
                                },
                                command,
                            );
                        }
                        outcome = &mut cycle => {
                            break match outcome {
                                CycleOutcome::Scheduled(next_fetch_at) => PollState::Waiting {
                                    spot_id,
                                    post_id,
                                    next_fetch_at,
                                },
                                CycleOutcome::Idle => PollState::NotFetching,
                            };
                        }
                    }
                }
            }
            PollState::Waiting {
                spot_id,
                post_id,
                next_fetch_at,
            } => loop {
                tokio::select! {
                    command = command_rx.recv() => {
                        let Some(command) = command else { break 'run };
                        if is_noop(&command, &spot_id, &post_id) {
                            continue;
                        }
                        break apply_command(
                            &PollState::Waiting {
                                spot_id: spot_id.clone(),
                                post_id: post_id.clone(),
                                next_fetch_at,
                            },
                            command,
                        );
                    }
                    _ = tokio::time::sleep_until(next_fetch_at) => {
                        break PollState::Fetching { spot_id, post_id };
                    }
                }
            },
        };
    }
}

fn is_noop(command: &PollCommand, spot_id: &str, post_id: &str) -> bool {
    matches!(
        command,
        PollCommand::Start {
            spot_id: s,
            post_id: p,
        } if s == spot_id && p == post_id
    )
}

fn apply_command(state: &PollState, command: PollCommand) -> PollState {
    match command {
        PollCommand::Stop => {
            if state.conversation().is_some() {
                tracing::debug!("Realtime polling stopped");
            }
            PollState::NotFetching
        }
        PollCommand::Start { spot_id, post_id } => {
            tracing::debug!(spot_id = %spot_id, post_id = %post_id, "Realtime polling started");
            PollState::Fetching { spot_id, post_id }
        }
    }
}

/// One poll cycle: gate on configuration, fetch with retries, publish.
async fn run_cycle(
    api: Arc<dyn ApiClient>,
    config: ConfigManager,
    snapshot_tx: Arc<watch::Sender<Option<RealtimeSnapshot>>>,
    spot_id: String,
    post_id: String,
) -> CycleOutcome {
    let spot_config = match config.config(&spot_id).await {
        Ok(spot_config) => spot_config,
        Err(error) => {
            tracing::warn!(spot_id = %spot_id, error = %error, "Realtime halted: no configuration");
            return CycleOutcome::Idle;
        }
    };
    if !spot_config.realtime_enabled() {
        tracing::debug!(spot_id = %spot_id, "Realtime disabled for spot");
        return CycleOutcome::Idle;
    }

    let conversation = conversation_id(&spot_id, &post_id);
    let retry = RetryConfig::builder()
        .max_attempts(REALTIME_FETCH_ATTEMPTS)
        .base_delay_ms(REALTIME_RETRY_BASE_DELAY_MS)
        .build();

    match with_retry(|| api.fetch_realtime(&conversation), &retry).await {
        Ok(snapshot) => {
            let delay = snapshot.next_delay();
            snapshot_tx.send_replace(Some(snapshot));
            CycleOutcome::Scheduled(Instant::now() + delay)
        }
        Err(error) => {
            tracing::warn!(
                conversation = %conversation,
                error = %error,
                "Realtime fetch failed after retries"
            );
            CycleOutcome::Idle
        }
    }
}
