use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::fmt::{self, Display};
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::Value;
use tokio::sync::{Mutex, Notify, oneshot, watch};
use tokio::time::sleep;

use hdg_api::diagnostics::ArbiterStats;
use svc::traits::{Service, StopResult};

use crate::backend::boiler::Transport;
use crate::config::ArbiterConfig;
use crate::error::{ApiError, ApiResult};

/// Request priority. Lower sorts first, so `High` is always dequeued first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    High,
    Medium,
    Low,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RequestKind {
    ReadNodes,
    WriteNode,
}

impl RequestKind {
    #[must_use]
    pub const fn is_write(self) -> bool {
        matches!(self, Self::WriteNode)
    }
}

impl Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ReadNodes => "get_nodes_data",
            Self::WriteNode => "set_node_value",
        })
    }
}

/// Result of one unit of work against the boiler.
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    /// Records returned by a read
    Items(Vec<Value>),
    /// A write reached the boiler
    Written,
    /// A write was skipped, since the boiler already had the value
    Unchanged,
}

pub type Work = dyn Fn(Arc<dyn Transport>) -> BoxFuture<'static, ApiResult<Outcome>> + Send + Sync;

type Waiter = oneshot::Sender<ApiResult<Outcome>>;

struct Envelope {
    id: u64,
    priority: Priority,
    kind: RequestKind,
    context_key: Option<String>,
    work: Arc<Work>,
    waiters: Vec<Waiter>,
    superseded: bool,
    retry_count: u32,
}

impl Envelope {
    fn label(&self) -> String {
        self.context_key.as_ref().map_or_else(
            || format!("{}#{}", self.kind, self.id),
            |key| format!("{}#{} {key}", self.kind, self.id),
        )
    }
}

#[derive(Default)]
struct Queue {
    heap: BinaryHeap<Reverse<(Priority, u64)>>,
    envelopes: HashMap<u64, Envelope>,
    /// context key -> id of the queued envelope holding it
    pending: HashMap<String, u64>,
    next_id: u64,
    closed: bool,
    stats: ArbiterStats,
}

impl Queue {
    const fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn push(&mut self, env: Envelope) {
        if let Some(key) = &env.context_key {
            self.pending.insert(key.clone(), env.id);
        }
        self.heap.push(Reverse((env.priority, env.id)));
        self.envelopes.insert(env.id, env);
    }

    /// Next envelope to execute. Superseded envelopes are dropped on the way.
    fn pop(&mut self) -> Option<Envelope> {
        while let Some(Reverse((_, id))) = self.heap.pop() {
            let Some(env) = self.envelopes.remove(&id) else {
                continue;
            };

            if let Some(key) = &env.context_key {
                if self.pending.get(key) == Some(&id) {
                    self.pending.remove(key);
                }
            }

            if env.superseded {
                log::trace!("Skipping superseded request {}", env.label());
                continue;
            }

            return Some(env);
        }
        None
    }
}

struct Inner {
    queue: Mutex<Queue>,
    new_work: Notify,
    shutdown: watch::Sender<bool>,
    transport: Arc<dyn Transport>,
    config: ArbiterConfig,
}

/// Serializes every call to the boiler through one priority queue with a
/// single worker.
#[derive(Clone)]
pub struct Arbiter {
    inner: Arc<Inner>,
}

fn deliver(waiters: Vec<Waiter>, result: &ApiResult<Outcome>) {
    for waiter in waiters {
        let res = match result {
            Ok(outcome) => Ok(outcome.clone()),
            Err(err) => Err(err.share()),
        };
        // caller may have gone away, which is fine
        let _ = waiter.send(res);
    }
}

impl Arbiter {
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, config: ArbiterConfig) -> Self {
        let (shutdown, _rx) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                queue: Mutex::default(),
                new_work: Notify::new(),
                shutdown,
                transport,
                config,
            }),
        }
    }

    /// Queue a unit of work and wait for its result.
    ///
    /// If a request with the same `context_key` is still queued, a new write
    /// supersedes it (its callers get [`ApiError::Preempted`]), while any
    /// other request shares the queued request's result.
    pub async fn submit<F, Fut>(
        &self,
        priority: Priority,
        kind: RequestKind,
        context_key: Option<&str>,
        work: F,
    ) -> ApiResult<Outcome>
    where
        F: Fn(Arc<dyn Transport>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ApiResult<Outcome>> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();

        {
            let mut guard = self.inner.queue.lock().await;
            let queue = &mut *guard;

            if queue.closed {
                queue.stats.cancelled += 1;
                return Err(ApiError::Cancelled);
            }
            queue.stats.submitted += 1;

            let existing = context_key
                .and_then(|key| queue.pending.get(key))
                .and_then(|id| queue.envelopes.get_mut(id));

            match existing {
                Some(existing) if !kind.is_write() => {
                    log::trace!("Sharing result of queued request {}", existing.label());
                    existing.waiters.push(tx);
                    queue.stats.shared += 1;
                    drop(guard);
                    return rx.await.unwrap_or(Err(ApiError::Cancelled));
                }
                Some(existing) => {
                    log::debug!("Request {} superseded by a newer {kind}", existing.label());
                    existing.superseded = true;
                    let key = existing.context_key.clone().unwrap_or_default();
                    for waiter in existing.waiters.drain(..) {
                        let _ = waiter.send(Err(ApiError::Preempted(key.clone())));
                    }
                    queue.stats.superseded += 1;
                }
                None => {}
            }

            let env = Envelope {
                id: queue.next_id(),
                priority,
                kind,
                context_key: context_key.map(ToString::to_string),
                work: Arc::new(move |transport| work(transport).boxed()),
                waiters: vec![tx],
                superseded: false,
                retry_count: 0,
            };
            log::trace!("Queued request {} at {priority:?}", env.label());
            queue.push(env);
        }

        self.inner.new_work.notify_one();

        rx.await.unwrap_or(Err(ApiError::Cancelled))
    }

    /// Fetch a batch of nodes.
    pub async fn read_nodes(
        &self,
        priority: Priority,
        context_key: &str,
        payload: &str,
    ) -> ApiResult<Vec<Value>> {
        let payload = payload.to_string();
        let outcome = self
            .submit(priority, RequestKind::ReadNodes, Some(context_key), move |transport| {
                let payload = payload.clone();
                async move { transport.read_nodes(&payload).await.map(Outcome::Items) }
            })
            .await?;

        match outcome {
            Outcome::Items(items) => Ok(items),
            other => Err(ApiError::service_error(format!(
                "Expected node data for {context_key}, got {other:?}"
            ))),
        }
    }

    pub async fn stats(&self) -> ArbiterStats {
        let queue = self.inner.queue.lock().await;
        ArbiterStats {
            queued: queue.envelopes.values().filter(|env| !env.superseded).count(),
            ..queue.stats.clone()
        }
    }

    /// Fail every queued request with [`ApiError::Cancelled`], and stop
    /// accepting new ones.
    pub async fn shutdown(&self) {
        let mut queue = self.inner.queue.lock().await;
        if !queue.closed {
            log::debug!("Shutting down request queue");
        }
        queue.closed = true;
        queue.heap.clear();
        queue.pending.clear();

        let mut cancelled = 0;
        for (_, env) in queue.envelopes.drain() {
            cancelled += env.waiters.len() as u64;
            deliver(env.waiters, &Err(ApiError::Cancelled));
        }
        queue.stats.cancelled += cancelled;
        drop(queue);

        self.inner.shutdown.send_replace(true);
        self.inner.new_work.notify_one();
    }

    /// Worker loop. Executes one request at a time until shut down.
    pub async fn worker(&self) -> ApiResult<()> {
        let mut shutdown = self.inner.shutdown.subscribe();

        loop {
            let next = {
                let mut queue = self.inner.queue.lock().await;
                if queue.closed {
                    return Ok(());
                }
                queue.pop()
            };

            match next {
                Some(env) => self.execute(env).await,
                None => {
                    tokio::select! {
                        () = self.inner.new_work.notified() => {}
                        _ = shutdown.wait_for(|stop| *stop) => {}
                    }
                }
            }
        }
    }

    /// Whether a queued request outranks `priority`.
    async fn outranked(&self, priority: Priority) -> bool {
        let queue = self.inner.queue.lock().await;
        queue.heap.iter().any(|Reverse((queued, id))| {
            *queued < priority && queue.envelopes.get(id).is_some_and(|env| !env.superseded)
        })
    }

    /// Run a low priority read, giving up on it once it has run past the
    /// preemption timeout while more urgent work is waiting. Returns `None`
    /// if the read was interrupted.
    async fn run_preemptible(
        &self,
        mut work: BoxFuture<'static, ApiResult<Outcome>>,
        priority: Priority,
    ) -> Option<ApiResult<Outcome>> {
        tokio::select! {
            res = &mut work => return Some(res),
            () = sleep(self.inner.config.polling_preemption_timeout()) => {}
        }

        loop {
            if self.outranked(priority).await {
                return None;
            }
            tokio::select! {
                res = &mut work => return Some(res),
                () = self.inner.new_work.notified() => {}
            }
        }
    }

    /// Put an interrupted read back in the queue. Its callers keep waiting.
    async fn preempt(&self, mut env: Envelope) {
        let mut guard = self.inner.queue.lock().await;
        let queue = &mut *guard;

        if queue.closed {
            queue.stats.cancelled += env.waiters.len() as u64;
            drop(guard);
            deliver(env.waiters, &Err(ApiError::Cancelled));
            return;
        }

        queue.stats.preempted += 1;
        log::warn!("Preempting {} in favor of more urgent requests", env.label());

        // a read for the same key was queued in the meantime
        let existing = env
            .context_key
            .as_ref()
            .and_then(|key| queue.pending.get(key))
            .and_then(|id| queue.envelopes.get_mut(id));
        if let Some(existing) = existing {
            existing.waiters.append(&mut env.waiters);
            return;
        }

        env.id = queue.next_id();
        queue.push(env);
    }

    async fn execute(&self, mut env: Envelope) {
        log::trace!("Executing request {}", env.label());
        let work = (env.work)(self.inner.transport.clone());

        let result = if env.priority == Priority::Low && !env.kind.is_write() {
            match self.run_preemptible(work, env.priority).await {
                Some(result) => result,
                None => {
                    self.preempt(env).await;
                    return;
                }
            }
        } else {
            work.await
        };

        let mut queue = self.inner.queue.lock().await;
        queue.stats.executed += 1;

        let Err(err) = &result else {
            drop(queue);
            deliver(env.waiters, &result);
            return;
        };

        let retry = env.kind.is_write()
            && !err.is_cancelled()
            && env.retry_count < self.inner.config.write_retry_attempts;

        if !retry {
            queue.stats.failed += 1;
            drop(queue);
            log::debug!("Request {} failed: {err}", env.label());
            deliver(env.waiters, &result);
            return;
        }

        queue.stats.retried += 1;
        drop(queue);

        env.retry_count += 1;
        log::warn!(
            "Request {} failed ({err}), retry {}/{} in {:?}",
            env.label(),
            env.retry_count,
            self.inner.config.write_retry_attempts,
            self.inner.config.write_retry_delay()
        );

        tokio::spawn(self.clone().requeue(env));
    }

    /// Put a failed request back in the queue after the retry delay,
    /// keeping its priority.
    async fn requeue(self, mut env: Envelope) {
        let mut shutdown = self.inner.shutdown.subscribe();
        tokio::select! {
            () = tokio::time::sleep(self.inner.config.write_retry_delay()) => {}
            _ = shutdown.wait_for(|stop| *stop) => {}
        }

        let mut guard = self.inner.queue.lock().await;
        let queue = &mut *guard;

        if queue.closed {
            queue.stats.cancelled += env.waiters.len() as u64;
            drop(guard);
            deliver(env.waiters, &Err(ApiError::Cancelled));
            return;
        }

        // a newer request for the same key arrived while this one was waiting
        if let Some(key) = &env.context_key {
            if queue.pending.contains_key(key) {
                log::debug!("Retry of {} dropped in favor of a newer request", env.label());
                queue.stats.superseded += 1;
                let key = key.clone();
                drop(guard);
                deliver(env.waiters, &Err(ApiError::Preempted(key)));
                return;
            }
        }

        env.id = queue.next_id();
        queue.push(env);
        drop(guard);

        self.inner.new_work.notify_one();
    }
}

#[async_trait]
impl Service for Arbiter {
    type Error = ApiError;

    async fn start(&mut self) -> ApiResult<()> {
        Ok(())
    }

    async fn run(&mut self) -> ApiResult<()> {
        self.worker().await
    }

    async fn stop(&mut self) -> ApiResult<()> {
        self.shutdown().await;
        Ok(())
    }

    async fn signal_stop(&mut self) -> ApiResult<StopResult> {
        self.shutdown().await;
        Ok(StopResult::Delivered)
    }
}
