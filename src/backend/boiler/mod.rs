mod client;

use async_trait::async_trait;
use serde_json::Value;

use hdg::node::CONNECTION_CHECK_PAYLOAD;

use crate::error::ApiResult;

pub use self::client::HdgClient;

/// Raw access to the controller's http api.
///
/// Implementations perform exactly one device call per method invocation.
/// Callers are expected to go through [`crate::arbiter::Arbiter`], which
/// guarantees that at most one call is in flight.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Batched read. `payload` is a form body like `nodes=1T-2T-3T`; the
    /// result is the raw JSON array returned by the controller.
    async fn read_nodes(&self, payload: &str) -> ApiResult<Vec<Value>>;

    /// Write `value` to the node with base id `node_id`.
    async fn write_node(&self, node_id: &str, value: &str) -> ApiResult<()>;

    /// One-shot connectivity check: a small read that must come back as a
    /// JSON array.
    async fn check_connection(&self) -> ApiResult<()> {
        self.read_nodes(CONNECTION_CHECK_PAYLOAD).await.map(|_| ())
    }
}
