use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::backend::boiler::Transport;
use crate::error::{ApiError, ApiResult};

type ReadFn = Box<dyn Fn(&str) -> ApiResult<Vec<Value>> + Send + Sync>;
type WriteFn = Box<dyn Fn(&str, &str) -> ApiResult<()> + Send + Sync>;

/// Scriptable [`Transport`] that records every call, and fails loudly if
/// it is ever entered while another call is still running.
pub struct StubTransport {
    in_flight: AtomicBool,
    overlaps: AtomicUsize,
    latency: Duration,
    reads: Mutex<Vec<String>>,
    writes: Mutex<Vec<(String, String)>>,
    on_read: ReadFn,
    on_write: WriteFn,
}

impl Default for StubTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl StubTransport {
    pub fn new() -> Self {
        Self {
            in_flight: AtomicBool::new(false),
            overlaps: AtomicUsize::new(0),
            latency: Duration::from_millis(100),
            reads: Mutex::default(),
            writes: Mutex::default(),
            on_read: Box::new(|_| Ok(vec![])),
            on_write: Box::new(|_, _| Ok(())),
        }
    }

    pub const fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn on_read(
        mut self,
        func: impl Fn(&str) -> ApiResult<Vec<Value>> + Send + Sync + 'static,
    ) -> Self {
        self.on_read = Box::new(func);
        self
    }

    pub fn on_write(
        mut self,
        func: impl Fn(&str, &str) -> ApiResult<()> + Send + Sync + 'static,
    ) -> Self {
        self.on_write = Box::new(func);
        self
    }

    pub fn reads(&self) -> Vec<String> {
        self.reads.lock().unwrap().clone()
    }

    pub fn writes(&self) -> Vec<(String, String)> {
        self.writes.lock().unwrap().clone()
    }

    pub fn overlaps(&self) -> usize {
        self.overlaps.load(Ordering::SeqCst)
    }

    async fn enter(&self) -> InFlight<'_> {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
            panic!("transport entered while another call was in flight");
        }
        let guard = InFlight(&self.in_flight);
        tokio::time::sleep(self.latency).await;
        guard
    }
}

struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl Transport for StubTransport {
    async fn read_nodes(&self, payload: &str) -> ApiResult<Vec<Value>> {
        let _guard = self.enter().await;
        self.reads.lock().unwrap().push(payload.to_string());
        (self.on_read)(payload)
    }

    async fn write_node(&self, node_id: &str, value: &str) -> ApiResult<()> {
        let _guard = self.enter().await;
        self.writes
            .lock()
            .unwrap()
            .push((node_id.to_string(), value.to_string()));
        (self.on_write)(node_id, value)
    }
}

/// Build a `dataRefresh` style response from `(id, text)` pairs.
pub fn items(records: &[(&str, &str)]) -> Vec<Value> {
    records
        .iter()
        .map(|(id, text)| json!({"id": id, "text": text}))
        .collect()
}

pub fn refused() -> ApiError {
    ApiError::Connection("connection refused".into())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::backend::boiler::Transport;
    use crate::testutil::StubTransport;

    #[tokio::test(start_paused = true)]
    async fn abandoned_call_leaves_stub_idle() {
        let stub = StubTransport::new().with_latency(Duration::from_secs(5));

        let res = tokio::time::timeout(Duration::from_secs(1), stub.write_node("1", "2")).await;
        assert!(res.is_err());

        stub.read_nodes("nodes=1T").await.unwrap();
        assert_eq!(stub.overlaps(), 0);
        assert!(stub.writes().is_empty());
        assert_eq!(stub.reads(), ["nodes=1T"]);
    }
}
