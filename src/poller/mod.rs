pub mod processor;
pub mod retry;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use futures::stream;
use itertools::Itertools;
use tokio::sync::{Notify, watch};
use tokio::time::{Instant, sleep_until};

use hdg::{PollingGroup, Registry};
use hdg_api::diagnostics::{GroupStatus, PollerStatus};
use svc::traits::Service;

use crate::arbiter::{Arbiter, Priority};
use crate::config::PollingConfig;
use crate::error::{ApiError, ApiResult};
use crate::model::store::NodeStore;
use crate::poller::processor::process_items;
use crate::poller::retry::GroupRetryState;

/// What a single poll cycle amounted to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CycleOutcome {
    /// No group was due
    Idle,
    /// Every due group was fetched
    Success,
    /// Connection errors occurred, but fewer than the reporting threshold
    Suppressed,
    /// At least one group failed
    Failed,
    /// The request queue is shutting down
    Cancelled,
}

struct GroupState {
    group: PollingGroup,
    interval: Duration,
    last_success: Option<Instant>,
    last_success_at: Option<DateTime<Utc>>,
    retry: Option<GroupRetryState>,
    last_error: Option<String>,
}

impl GroupState {
    /// When this group is next due. `None` means it is due already.
    fn next_due(&self) -> Option<Instant> {
        match (&self.retry, self.last_success) {
            (Some(retry), _) => Some(retry.next_retry),
            (None, Some(last)) => Some(last + self.interval),
            (None, None) => None,
        }
    }

    fn is_due(&self, now: Instant) -> bool {
        self.next_due().is_none_or(|at| at <= now)
    }

    fn record_success(&mut self) {
        self.last_success = Some(Instant::now());
        self.last_success_at = Some(Utc::now());
        self.retry = None;
        self.last_error = None;
    }

    fn status(&self, now: Instant) -> GroupStatus {
        GroupStatus {
            key: self.group.key.clone(),
            interval_secs: self.interval.as_secs(),
            last_success: self.last_success_at,
            retry_attempts: self.retry.map_or(0, |retry| retry.attempts),
            next_retry_in_secs: self
                .retry
                .map(|retry| retry.next_retry.saturating_duration_since(now).as_secs()),
            last_error: self.last_error.clone(),
        }
    }
}

struct Shared {
    wake: Notify,
    refresh_all: AtomicBool,
    status: watch::Sender<PollerStatus>,
}

/// Cloneable handle for talking to a running [`Poller`].
#[derive(Clone)]
pub struct PollerHandle {
    shared: Arc<Shared>,
}

impl PollerHandle {
    fn new() -> Self {
        let (status, _rx) = watch::channel(PollerStatus::default());
        Self {
            shared: Arc::new(Shared {
                wake: Notify::new(),
                refresh_all: AtomicBool::new(false),
                status,
            }),
        }
    }

    /// Wake the poller and treat every group as due.
    pub fn request_refresh(&self) {
        self.shared.refresh_all.store(true, Ordering::SeqCst);
        self.shared.wake.notify_one();
    }

    #[must_use]
    pub fn status(&self) -> PollerStatus {
        self.shared.status.borrow().clone()
    }

    fn take_refresh(&self) -> bool {
        self.shared.refresh_all.swap(false, Ordering::SeqCst)
    }
}

/// Fetch one group and merge the result into the store.
async fn fetch_group(
    arbiter: &Arbiter,
    registry: &Registry,
    store: &NodeStore,
    ignore_window: Duration,
    group: &PollingGroup,
) -> ApiResult<usize> {
    let items = arbiter
        .read_nodes(Priority::Low, &group.key, &group.payload)
        .await?;

    let values = process_items(&group.key, &items, registry);
    let merged = store.merge_polled(values, ignore_window).await;

    log::debug!(
        "[{}] Polled {} records, {} values merged, {} ignored",
        group.key,
        items.len(),
        merged.accepted,
        merged.ignored
    );

    Ok(merged.accepted)
}

pub struct Poller {
    arbiter: Arbiter,
    registry: Arc<Registry>,
    store: NodeStore,
    config: PollingConfig,
    groups: Vec<GroupState>,
    cycles: u64,
    consecutive_failures: u32,
    connection_errors: u32,
    fallback_active: bool,
    handle: PollerHandle,
}

impl Poller {
    #[must_use]
    pub fn new(
        arbiter: Arbiter,
        registry: Arc<Registry>,
        store: NodeStore,
        config: PollingConfig,
    ) -> Self {
        let groups = registry
            .groups()
            .iter()
            .map(|group| GroupState {
                interval: config.interval_for(&group.key, group.default_interval),
                group: group.clone(),
                last_success: None,
                last_success_at: None,
                retry: None,
                last_error: None,
            })
            .collect();

        let poller = Self {
            arbiter,
            registry,
            store,
            config,
            groups,
            cycles: 0,
            consecutive_failures: 0,
            connection_errors: 0,
            fallback_active: false,
            handle: PollerHandle::new(),
        };
        poller.publish();
        poller
    }

    #[must_use]
    pub fn handle(&self) -> PollerHandle {
        self.handle.clone()
    }

    #[must_use]
    pub const fn fallback_active(&self) -> bool {
        self.fallback_active
    }

    /// Current master update cadence: the shortest group interval while
    /// online, the fallback interval while offline.
    #[must_use]
    pub fn cadence(&self) -> Duration {
        if self.fallback_active {
            return self.config.fallback_interval();
        }
        self.groups
            .iter()
            .map(|state| state.interval)
            .min()
            .unwrap_or_else(|| self.config.fallback_interval())
    }

    fn next_wake(&self, cycle_start: Instant) -> Instant {
        let fallback = cycle_start + self.cadence();
        if self.fallback_active {
            return fallback;
        }

        let now = Instant::now();
        self.groups
            .iter()
            .map(|state| state.next_due().filter(|at| *at > now).unwrap_or(fallback))
            .min()
            .unwrap_or(fallback)
    }

    fn publish(&self) {
        let now = Instant::now();
        let status = PollerStatus {
            online: self.store.online().is_online(),
            cycles: self.cycles,
            consecutive_failures: self.consecutive_failures,
            connection_errors: self.connection_errors,
            fallback_active: self.fallback_active,
            groups: self.groups.iter().map(|state| state.status(now)).collect(),
        };
        self.handle.shared.status.send_replace(status);
    }

    /// Poll every group once, one after the other, to fill the cache on
    /// startup. Failures leave the group due for the first regular cycle.
    pub async fn initial_refresh(&mut self) -> ApiResult<()> {
        let delay = self.config.initial_group_delay();
        log::info!("Initial refresh of {} polling groups", self.groups.len());

        for idx in 0..self.groups.len() {
            if idx > 0 {
                tokio::time::sleep(delay).await;
            }

            let state = &mut self.groups[idx];
            let res = fetch_group(
                &self.arbiter,
                &self.registry,
                &self.store,
                self.config.ignore_window(),
                &state.group,
            )
            .await;

            match res {
                Ok(_) => state.record_success(),
                Err(ApiError::Cancelled) => return Err(ApiError::Cancelled),
                Err(err) => {
                    log::warn!("[{}] Initial refresh failed: {err}", state.group.key);
                    state.last_error = Some(err.to_string());
                }
            }
        }

        self.publish();
        Ok(())
    }

    /// Run one poll cycle: fetch every due group, then update the failure
    /// counters and the online flag.
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        let now = Instant::now();
        let force = self.handle.take_refresh();

        let due: Vec<usize> = self
            .groups
            .iter()
            .positions(|state| force || state.is_due(now))
            .collect();

        if due.is_empty() {
            return CycleOutcome::Idle;
        }

        self.cycles += 1;
        log::trace!("Poll cycle {} with {} due groups", self.cycles, due.len());

        let ignore_window = self.config.ignore_window();
        let results: Vec<(usize, ApiResult<usize>)> = stream::iter(due)
            .map(|idx| {
                let fut = fetch_group(
                    &self.arbiter,
                    &self.registry,
                    &self.store,
                    ignore_window,
                    &self.groups[idx].group,
                );
                async move { (idx, fut.await) }
            })
            .buffer_unordered(self.config.concurrency.max(1))
            .collect()
            .await;

        let mut failed = false;
        let mut connection_error = false;

        for (idx, res) in results {
            let state = &mut self.groups[idx];
            match res {
                Ok(_) => state.record_success(),
                Err(ApiError::Cancelled) => return CycleOutcome::Cancelled,
                Err(ApiError::Preempted(_)) => {}
                Err(err) if err.is_connection() => {
                    connection_error = true;
                    state.last_error = Some(err.to_string());
                }
                Err(err) => {
                    failed = true;
                    let retry = GroupRetryState::next(
                        state.retry,
                        Instant::now(),
                        self.config.retry_base(),
                        self.config.retry_factor,
                        self.config.retry_max(),
                    );
                    log::warn!(
                        "[{}] Poll failed (attempt {}), retrying in {:?}: {err}",
                        state.group.key,
                        retry.attempts,
                        retry.next_retry.saturating_duration_since(Instant::now())
                    );
                    state.retry = Some(retry);
                    state.last_error = Some(err.to_string());
                }
            }
        }

        if connection_error {
            self.connection_errors += 1;
            if self.connection_errors < self.config.connection_error_threshold {
                log::debug!(
                    "Boiler unreachable ({}/{}), serving cached values",
                    self.connection_errors,
                    self.config.connection_error_threshold
                );
            } else {
                if self.connection_errors == self.config.connection_error_threshold {
                    log::warn!(
                        "Boiler unreachable for {} cycles",
                        self.connection_errors
                    );
                }
                failed = true;
            }
        }

        // suppressed cycles still count towards going offline
        let outcome = if failed {
            CycleOutcome::Failed
        } else if connection_error {
            CycleOutcome::Suppressed
        } else {
            CycleOutcome::Success
        };

        if outcome == CycleOutcome::Success {
            self.record_successful_cycle();
        } else {
            self.record_failed_cycle();
        }

        self.publish();
        outcome
    }

    fn record_failed_cycle(&mut self) {
        self.consecutive_failures += 1;

        if self.consecutive_failures >= self.config.failure_threshold && !self.fallback_active {
            self.fallback_active = true;
            self.store.online().set(false);
            log::warn!(
                "{} consecutive failed poll cycles, polling every {:?} until the boiler responds",
                self.consecutive_failures,
                self.config.fallback_interval()
            );
        }
    }

    fn record_successful_cycle(&mut self) {
        self.consecutive_failures = 0;
        self.connection_errors = 0;

        if self.fallback_active {
            self.fallback_active = false;
            log::info!("Poll cycle succeeded, restoring normal cadence of {:?}", self.cadence());
        }
        self.store.online().set(true);
    }

    pub async fn run_forever(&mut self) -> ApiResult<()> {
        if matches!(self.initial_refresh().await, Err(ApiError::Cancelled)) {
            return Ok(());
        }

        loop {
            let cycle_start = Instant::now();
            if self.run_cycle().await == CycleOutcome::Cancelled {
                log::debug!("Request queue closed, poller exiting");
                return Ok(());
            }

            let wake = self.next_wake(cycle_start);
            tokio::select! {
                () = sleep_until(wake) => {}
                () = self.handle.shared.wake.notified() => {
                    log::debug!("Poller woken early");
                }
            }
        }
    }
}

#[async_trait]
impl Service for Poller {
    type Error = ApiError;

    async fn start(&mut self) -> ApiResult<()> {
        Ok(())
    }

    async fn run(&mut self) -> ApiResult<()> {
        self.run_forever().await
    }

    async fn stop(&mut self) -> ApiResult<()> {
        self.publish();
        Ok(())
    }
}
