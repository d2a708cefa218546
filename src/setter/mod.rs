pub mod backoff;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinSet;
use tokio::time::{Instant, sleep, sleep_until};

use hdg::error::HdgError;
use hdg::{NodeValue, Registry, ValueKind, strip_node_suffix};
use hdg_api::diagnostics::{PendingStatus, SetterStatus};
use svc::traits::Service;

use crate::arbiter::{Arbiter, Outcome, Priority, RequestKind};
use crate::config::SetterConfig;
use crate::error::{ApiError, ApiResult};
use crate::model::store::NodeStore;
use crate::setter::backoff::RetryPolicy;

/// A debounced write for one node.
#[derive(Debug)]
struct PendingSet {
    /// Value as it will be sent to the boiler
    value: String,
    generation: u64,
    deadline: Instant,
    /// Generation carried by the scheduled timer, if one is scheduled
    armed: Option<u64>,
    attempts: u32,
    waiting_online: bool,
    /// Confirmed value when this debounce sequence started
    initial: Option<NodeValue>,
    last_error: Option<String>,
}

#[derive(Debug, Default)]
struct SetterState {
    pending: BTreeMap<String, PendingSet>,
    committed: u64,
    abandoned: u64,
    unchanged: u64,
    failed: u64,
    last_failure: Option<String>,
}

enum Next {
    Fire(String, u64),
    Sleep(Instant),
    Idle,
}

struct Inner {
    arbiter: Arbiter,
    registry: Arc<Registry>,
    store: NodeStore,
    config: SetterConfig,
    state: Mutex<SetterState>,
    node_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    new_work: Notify,
}

/// Debounces value writes per node, and commits the final value through the
/// arbiter with retries.
#[derive(Clone)]
pub struct ValueSetter {
    inner: Arc<Inner>,
}

impl ValueSetter {
    #[must_use]
    pub fn new(
        arbiter: Arbiter,
        registry: Arc<Registry>,
        store: NodeStore,
        config: SetterConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                arbiter,
                registry,
                store,
                config,
                state: Mutex::default(),
                node_locks: Mutex::default(),
                new_work: Notify::new(),
            }),
        }
    }

    #[must_use]
    pub fn default_delay(&self) -> Duration {
        self.inner.config.debounce()
    }

    /// Validate `raw` for `node` and format it for the boiler.
    fn prepare(&self, node: &str, raw: &str) -> ApiResult<String> {
        let registry = &self.inner.registry;

        if let Some(spec) = registry.setter(node).and_then(|point| point.setter.as_ref()) {
            return Ok(spec.prepare(node, raw)?);
        }

        if self.inner.config.allow_raw_nodes {
            let raw = raw.trim();
            if raw.is_empty() {
                return Err(ApiError::service_error(format!("Empty value for node {node}")));
            }
            return Ok(raw.to_string());
        }

        if registry.definition(node).is_some() {
            Err(HdgError::NotWritable(node.to_string()).into())
        } else {
            Err(HdgError::UnknownNode(node.to_string()).into())
        }
    }

    /// How `value` would read back from the boiler.
    fn parse_value(&self, node: &str, value: &str) -> Option<NodeValue> {
        self.inner.registry.definition(node).map_or_else(
            || ValueKind::Auto.parse(value, None, false),
            |point| point.parse(value),
        )
    }

    /// Request that `node` is set to `raw` once `delay` has passed without
    /// another request for the same node.
    ///
    /// The new value is visible through the store right away.
    pub async fn request_set(&self, node: &str, raw: &str, delay: Duration) -> ApiResult<bool> {
        let node = strip_node_suffix(node);
        let value = self.prepare(node, raw)?;
        let initial = self.inner.store.confirmed(node).await;

        let generation = {
            let mut state = self.inner.state.lock().await;
            let now = Instant::now();
            let pending = state
                .pending
                .entry(node.to_string())
                .or_insert_with(|| PendingSet {
                    value: String::new(),
                    generation: 0,
                    deadline: now,
                    armed: None,
                    attempts: 0,
                    waiting_online: false,
                    initial,
                    last_error: None,
                });

            pending.generation += 1;
            pending.value.clone_from(&value);
            pending.deadline = now + delay;
            pending.armed = Some(pending.generation);
            pending.attempts = 0;
            pending.waiting_online = false;
            pending.last_error = None;
            pending.generation
        };

        if let Some(optimistic) = self.parse_value(node, &value) {
            self.inner.store.set_optimistic(node, optimistic).await;
        }

        log::debug!("[{node}] Set to {value:?} requested (generation {generation}, in {delay:?})");
        self.inner.new_work.notify_one();

        Ok(true)
    }

    async fn next_due(&self) -> Next {
        let now = Instant::now();
        let mut state = self.inner.state.lock().await;

        let earliest = state
            .pending
            .iter()
            .filter(|(_, pending)| pending.armed.is_some() && !pending.waiting_online)
            .min_by_key(|(_, pending)| pending.deadline)
            .map(|(node, pending)| (node.clone(), pending.deadline));

        match earliest {
            Some((node, deadline)) if deadline <= now => {
                let Some(pending) = state.pending.get_mut(&node) else {
                    return Next::Idle;
                };
                match pending.armed.take() {
                    Some(generation) => Next::Fire(node, generation),
                    None => Next::Idle,
                }
            }
            Some((_, deadline)) => Next::Sleep(deadline),
            None => Next::Idle,
        }
    }

    /// Remove a pending write, dropping its optimistic value.
    async fn discard(&self, node: &str) {
        self.inner.state.lock().await.pending.remove(node);
        self.inner.store.clear_optimistic(node).await;
    }

    /// Handle an expired debounce timer. Returns true if the boiler was written.
    async fn fire(&self, node: &str, generation: u64) -> bool {
        let (value, initial) = {
            let state = self.inner.state.lock().await;
            let Some(pending) = state.pending.get(node) else {
                return false;
            };
            if pending.generation != generation {
                log::trace!("[{node}] Stale timer for generation {generation}");
                return false;
            }
            (pending.value.clone(), pending.initial.clone())
        };

        if initial.as_ref().is_some_and(|initial| initial.matches_raw(&value)) {
            log::info!("[{node}] Value is back at {value:?}, nothing to write");
            self.discard(node).await;
            self.inner.state.lock().await.abandoned += 1;
            return false;
        }

        self.commit(node, &value, generation).await
    }

    async fn node_lock(&self, node: &str) -> Arc<Mutex<()>> {
        self.inner
            .node_locks
            .lock()
            .await
            .entry(node.to_string())
            .or_default()
            .clone()
    }

    async fn release_node_lock(&self, node: &str, lock: Arc<Mutex<()>>) {
        let mut locks = self.inner.node_locks.lock().await;
        // the map and `lock` itself
        if Arc::strong_count(&lock) == 2 {
            locks.remove(node);
        }
    }

    /// Run one expired timer. Commits for the same node never overlap, and
    /// the node stays locked for the cooldown after a write.
    async fn process(self, node: String, generation: u64) {
        let lock = self.node_lock(&node).await;
        {
            let _guard = lock.lock().await;
            if self.fire(&node, generation).await {
                sleep(self.inner.config.cooldown()).await;
            }
        }
        self.release_node_lock(&node, lock).await;
    }

    async fn commit(&self, node: &str, value: &str, generation: u64) -> bool {
        if !self.inner.store.online().is_online() {
            let mut state = self.inner.state.lock().await;
            if let Some(pending) = state.pending.get_mut(node) {
                if pending.generation == generation {
                    log::info!("[{node}] Boiler offline, holding write of {value:?}");
                    pending.waiting_online = true;
                    pending.armed = Some(generation);
                    pending.deadline = Instant::now();
                }
            }
            return false;
        }

        {
            let state = self.inner.state.lock().await;
            match state.pending.get(node) {
                None => return false,
                Some(pending) if pending.generation != generation && pending.value != value => {
                    log::debug!("[{node}] Newer value {:?} pending, skipping {value:?}", pending.value);
                    return false;
                }
                Some(_) => {}
            }
        }

        let store = self.inner.store.clone();
        let target = (node.to_string(), value.to_string());
        let result = self
            .inner
            .arbiter
            .submit(Priority::High, RequestKind::WriteNode, Some(node), move |transport| {
                let store = store.clone();
                let (node, value) = target.clone();
                async move {
                    if store
                        .confirmed(&node)
                        .await
                        .is_some_and(|current| current.matches_raw(&value))
                    {
                        return Ok(Outcome::Unchanged);
                    }
                    transport.write_node(&node, &value).await?;
                    Ok(Outcome::Written)
                }
            })
            .await;

        match result {
            Ok(outcome) => {
                self.record_success(node, value, &outcome).await;
                outcome == Outcome::Written
            }
            Err(ApiError::Preempted(_) | ApiError::Cancelled) => {
                log::trace!("[{node}] Write of {value:?} was not executed");
                false
            }
            Err(err) => {
                self.record_failure(node, generation, err).await;
                false
            }
        }
    }

    async fn record_success(&self, node: &str, value: &str, outcome: &Outcome) {
        let written = *outcome == Outcome::Written;
        let parsed = self.parse_value(node, value);

        match &parsed {
            Some(parsed) => self.inner.store.commit(node, parsed.clone(), written).await,
            None => self.inner.store.clear_optimistic(node).await,
        }

        let mut state = self.inner.state.lock().await;
        if written {
            log::info!("[{node}] Committed {value:?}");
            state.committed += 1;
        } else {
            log::info!("[{node}] Boiler already at {value:?}, write skipped");
            state.unchanged += 1;
        }

        let done = match state.pending.get_mut(node) {
            Some(pending) if pending.value == value => true,
            Some(pending) => {
                // a newer request arrived during the write; it now starts
                // from the value just committed
                pending.initial = parsed;
                false
            }
            None => false,
        };
        if done {
            state.pending.remove(node);
        }
    }

    async fn record_failure(&self, node: &str, generation: u64, err: ApiError) {
        let config = &self.inner.config;
        let policy = if err.is_connection() {
            RetryPolicy::connection(config)
        } else {
            RetryPolicy::rejected(config)
        };

        let mut state = self.inner.state.lock().await;
        let Some(pending) = state.pending.get_mut(node) else {
            return;
        };
        if pending.generation != generation {
            // a newer request has its own timer
            return;
        }

        pending.attempts += 1;
        let attempts = pending.attempts;

        if policy.exhausted(attempts) {
            let msg = format!("Setting node {node} to {:?} failed after {attempts} attempts: {err}", pending.value);
            log::error!("[{node}] {msg}");
            state.pending.remove(node);
            state.failed += 1;
            state.last_failure = Some(msg);
            drop(state);
            self.inner.store.clear_optimistic(node).await;
            return;
        }

        let delay = policy.delay(attempts);
        pending.deadline = Instant::now() + delay;
        pending.armed = Some(generation);
        pending.last_error = Some(err.to_string());

        let noisy = attempts > config.max_attempts * config.connection_log_multiplier;
        if err.is_connection() && !noisy {
            log::debug!("[{node}] Boiler unreachable (attempt {attempts}), retrying in {delay:?}");
        } else {
            log::warn!("[{node}] Write failed (attempt {attempts}), retrying in {delay:?}: {err}");
        }
    }

    /// Re-arm every write that was held back while the boiler was offline.
    async fn resume_waiting(&self) {
        let now = Instant::now();
        let mut state = self.inner.state.lock().await;
        for (node, pending) in &mut state.pending {
            if pending.waiting_online {
                log::info!("[{node}] Boiler back online, resuming write of {:?}", pending.value);
                pending.waiting_online = false;
                pending.armed = Some(pending.generation);
                pending.deadline = now;
            }
        }
    }

    /// Scheduler loop. Each expired debounce timer is handled in its own
    /// task, serialized per node.
    pub async fn worker(&self) -> ApiResult<()> {
        let mut online = self.inner.store.online().subscribe();
        let mut commits = JoinSet::new();

        loop {
            let wake = match self.next_due().await {
                Next::Fire(node, generation) => {
                    commits.spawn(self.clone().process(node, generation));
                    continue;
                }
                Next::Sleep(at) => Some(at),
                Next::Idle => None,
            };

            tokio::select! {
                () = sleep_until(wake.unwrap_or_else(Instant::now)), if wake.is_some() => {}
                () = self.inner.new_work.notified() => {}
                Some(_) = commits.join_next(), if !commits.is_empty() => {}
                res = online.changed() => {
                    if res.is_err() {
                        return Ok(());
                    }
                    if *online.borrow_and_update() {
                        self.resume_waiting().await;
                    }
                }
            }
        }
    }

    pub async fn status(&self) -> SetterStatus {
        let state = self.inner.state.lock().await;
        SetterStatus {
            pending: state
                .pending
                .iter()
                .map(|(node, pending)| PendingStatus {
                    node: node.clone(),
                    value: pending.value.clone(),
                    generation: pending.generation,
                    attempts: pending.attempts,
                    last_error: pending.last_error.clone(),
                })
                .collect(),
            committed: state.committed,
            abandoned: state.abandoned,
            unchanged: state.unchanged,
            failed: state.failed,
            last_failure: state.last_failure.clone(),
        }
    }

    /// Drop every pending write that has not been committed.
    pub async fn cancel_pending(&self) {
        let nodes: Vec<String> = {
            let mut state = self.inner.state.lock().await;
            std::mem::take(&mut state.pending).into_keys().collect()
        };

        if !nodes.is_empty() {
            log::warn!("Dropping {} pending writes: {}", nodes.len(), nodes.join(", "));
        }
        for node in nodes {
            self.inner.store.clear_optimistic(&node).await;
        }
    }
}

#[async_trait]
impl Service for ValueSetter {
    type Error = ApiError;

    async fn start(&mut self) -> ApiResult<()> {
        Ok(())
    }

    async fn run(&mut self) -> ApiResult<()> {
        self.worker().await
    }

    async fn stop(&mut self) -> ApiResult<()> {
        self.cancel_pending().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use hdg::error::HdgError;
    use hdg::registry::GroupDef;
    use hdg::setter::{SetterSpec, SetterType};
    use hdg::{DataPoint, NodeValue, Registry, ValueKind};

    use crate::arbiter::Arbiter;
    use crate::config::{ArbiterConfig, SetterConfig};
    use crate::error::ApiError;
    use crate::model::store::NodeStore;
    use crate::setter::ValueSetter;
    use crate::testutil::{StubTransport, refused};

    const DELAY: Duration = Duration::from_secs(2);

    fn registry() -> Arc<Registry> {
        let groups = vec![GroupDef {
            key: "A".into(),
            default_interval_secs: 15,
        }];
        let points = vec![
            DataPoint::new("flow", "22003T", "A", ValueKind::Float),
            DataPoint::new("setpoint", "6022T", "A", ValueKind::Int).with_setter(SetterSpec {
                setter_type: SetterType::Int,
                min: 20.0,
                max: 80.0,
                step: 1.0,
            }),
            DataPoint::new("buffer_min", "6023T", "A", ValueKind::Int).with_setter(SetterSpec {
                setter_type: SetterType::Int,
                min: 20.0,
                max: 80.0,
                step: 1.0,
            }),
        ];
        Arc::new(Registry::new(groups, points).unwrap())
    }

    struct Harness {
        setter: ValueSetter,
        store: NodeStore,
        stub: Arc<StubTransport>,
    }

    fn harness(stub: StubTransport, config: SetterConfig) -> Harness {
        let stub = Arc::new(stub);
        let arbiter = Arbiter::new(
            stub.clone(),
            ArbiterConfig {
                write_retry_attempts: 0,
                ..ArbiterConfig::default()
            },
        );
        let store = NodeStore::new();
        let setter = ValueSetter::new(arbiter.clone(), registry(), store.clone(), config);

        tokio::spawn(async move { arbiter.worker().await });
        tokio::spawn({
            let setter = setter.clone();
            async move { setter.worker().await }
        });

        Harness { setter, store, stub }
    }

    async fn confirm(store: &NodeStore, node: &str, value: i64) {
        store
            .merge_polled(vec![(node.to_string(), NodeValue::Integer(value))], Duration::ZERO)
            .await;
    }

    fn writes(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(node, value)| ((*node).to_string(), (*value).to_string()))
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_requests_write_last_value_once() {
        let h = harness(StubTransport::new(), SetterConfig::default());
        confirm(&h.store, "6022", 45).await;

        h.setter.request_set("6022", "50", DELAY).await.unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;
        h.setter.request_set("6022T", "55", DELAY).await.unwrap();

        // optimistic value is visible immediately
        assert_eq!(h.store.get("6022").await, Some(NodeValue::Integer(55)));

        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(h.stub.writes(), writes(&[("6022", "55")]));
        assert_eq!(h.store.confirmed("6022").await, Some(NodeValue::Integer(55)));
        let status = h.setter.status().await;
        assert!(status.pending.is_empty());
        assert_eq!(status.committed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn unchanged_value_is_not_written() {
        let h = harness(StubTransport::new(), SetterConfig::default());
        confirm(&h.store, "6022", 55).await;

        h.setter.request_set("6022", "55", DELAY).await.unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert!(h.stub.writes().is_empty());
        assert_eq!(h.setter.status().await.abandoned, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn value_reached_during_debounce_is_not_written() {
        let h = harness(StubTransport::new(), SetterConfig::default());
        confirm(&h.store, "6022", 50).await;

        h.setter.request_set("6022", "55", DELAY).await.unwrap();
        // boiler reports the new value before the debounce expires
        confirm(&h.store, "6022", 55).await;
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert!(h.stub.writes().is_empty());
        assert_eq!(h.setter.status().await.unchanged, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn round_trip_is_abandoned() {
        let h = harness(StubTransport::new(), SetterConfig::default());
        confirm(&h.store, "6022", 50).await;

        h.setter.request_set("6022", "55", DELAY).await.unwrap();
        h.setter.request_set("6022", "50", DELAY).await.unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert!(h.stub.writes().is_empty());
        assert_eq!(h.store.get("6022").await, Some(NodeValue::Integer(50)));
        assert_eq!(h.setter.status().await.abandoned, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn revert_during_write_is_written() {
        let h = harness(
            StubTransport::new().with_latency(Duration::from_secs(3)),
            SetterConfig::default(),
        );
        confirm(&h.store, "6022", 50).await;

        h.setter.request_set("6022", "55", DELAY).await.unwrap();
        // the write of 55 is on its way to the boiler
        tokio::time::sleep(Duration::from_secs(3)).await;
        h.setter.request_set("6022", "50", DELAY).await.unwrap();
        tokio::time::sleep(Duration::from_secs(20)).await;

        assert_eq!(h.stub.writes(), writes(&[("6022", "55"), ("6022", "50")]));
        assert_eq!(h.store.confirmed("6022").await, Some(NodeValue::Integer(50)));
        assert_eq!(h.store.get("6022").await, Some(NodeValue::Integer(50)));
        let status = h.setter.status().await;
        assert!(status.pending.is_empty());
        assert_eq!(status.committed, 2);
        assert_eq!(status.abandoned, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn skipped_write_has_no_cooldown() {
        let h = harness(StubTransport::new(), SetterConfig::default());
        confirm(&h.store, "6022", 50).await;

        h.setter.request_set("6022", "55", DELAY).await.unwrap();
        confirm(&h.store, "6022", 55).await;
        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert_eq!(h.setter.status().await.unchanged, 1);

        h.setter
            .request_set("6022", "60", Duration::from_millis(100))
            .await
            .unwrap();
        // well within the 2 second cooldown
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(h.stub.writes(), writes(&[("6022", "60")]));
    }

    #[tokio::test(start_paused = true)]
    async fn commits_for_different_nodes_do_not_wait() {
        let h = harness(
            StubTransport::new().with_latency(Duration::from_secs(1)),
            SetterConfig::default(),
        );
        confirm(&h.store, "6022", 50).await;
        confirm(&h.store, "6023", 30).await;

        h.setter.request_set("6022", "55", DELAY).await.unwrap();
        h.setter.request_set("6023", "35", DELAY).await.unwrap();

        // one write each, back to back, without a cooldown in between
        tokio::time::sleep(Duration::from_millis(4500)).await;
        let mut done = h.stub.writes();
        done.sort();
        assert_eq!(done, writes(&[("6022", "55"), ("6023", "35")]));
        assert_eq!(h.stub.overlaps(), 0);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(h.setter.inner.node_locks.lock().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn offline_write_waits_for_online() {
        let h = harness(StubTransport::new(), SetterConfig::default());
        h.store.online().set(false);

        h.setter.request_set("6022", "55", DELAY).await.unwrap();
        tokio::time::sleep(Duration::from_secs(60)).await;

        assert!(h.stub.writes().is_empty());
        assert_eq!(h.setter.status().await.pending.len(), 1);
        assert_eq!(h.store.get("6022").await, Some(NodeValue::Integer(55)));

        h.store.online().set(true);
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(h.stub.writes(), writes(&[("6022", "55")]));
        assert!(h.setter.status().await.pending.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_write_gives_up() {
        let h = harness(
            StubTransport::new().on_write(|_, _| Err(ApiError::Response("HTTP 500".into()))),
            SetterConfig::default(),
        );
        confirm(&h.store, "6022", 50).await;

        h.setter.request_set("6022", "55", DELAY).await.unwrap();
        tokio::time::sleep(Duration::from_secs(120)).await;

        assert_eq!(h.stub.writes().len(), 3);
        let status = h.setter.status().await;
        assert!(status.pending.is_empty());
        assert_eq!(status.failed, 1);
        assert!(status.last_failure.is_some());
        assert_eq!(h.store.get("6022").await, Some(NodeValue::Integer(50)));
    }

    #[tokio::test(start_paused = true)]
    async fn connection_errors_retry_until_success() {
        let calls = Arc::new(AtomicUsize::new(0));
        let stub = StubTransport::new().on_write({
            let calls = calls.clone();
            move |_, _| {
                if calls.fetch_add(1, Ordering::SeqCst) < 5 {
                    Err(refused())
                } else {
                    Ok(())
                }
            }
        });
        let h = harness(stub, SetterConfig::default());

        h.setter.request_set("6022", "55", DELAY).await.unwrap();

        // 10 + 20 + 40 + 80 + 160 seconds of backoff
        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(h.stub.writes().len(), 5);
        assert_eq!(h.setter.status().await.pending[0].attempts, 5);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(h.stub.writes().len(), 6);
        assert_eq!(h.setter.status().await.committed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_requests_are_rejected() {
        let h = harness(StubTransport::new(), SetterConfig::default());

        let err = h.setter.request_set("6022", "90", DELAY).await.unwrap_err();
        assert!(matches!(err, ApiError::HdgError(HdgError::OutOfRange { .. })));

        let err = h.setter.request_set("22003", "20", DELAY).await.unwrap_err();
        assert!(matches!(err, ApiError::HdgError(HdgError::NotWritable(_))));

        let err = h.setter.request_set("4711", "20", DELAY).await.unwrap_err();
        assert!(matches!(err, ApiError::HdgError(HdgError::UnknownNode(_))));

        assert!(h.setter.status().await.pending.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn raw_nodes_pass_through_when_allowed() {
        let h = harness(
            StubTransport::new(),
            SetterConfig {
                allow_raw_nodes: true,
                ..SetterConfig::default()
            },
        );

        h.setter.request_set("4711", " 3 ", DELAY).await.unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(h.stub.writes(), writes(&[("4711", "3")]));
        assert_eq!(h.store.confirmed("4711").await, Some(NodeValue::Number(3.0)));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_pending_drops_optimistic_values() {
        let h = harness(StubTransport::new(), SetterConfig::default());
        confirm(&h.store, "6022", 50).await;

        h.setter.request_set("6022", "55", DELAY).await.unwrap();
        h.setter.cancel_pending().await;
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert!(h.stub.writes().is_empty());
        assert_eq!(h.store.get("6022").await, Some(NodeValue::Integer(50)));
    }
}
