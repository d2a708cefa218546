use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::Client;
use crate::error::HdgApiResult;

/// Snapshot of every cached node, keyed by base node id.
pub type NodeSnapshot = BTreeMap<String, Value>;

/// A value to write, given either as a number or as the literal text to send.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum SetValue {
    Number(f64),
    Text(String),
}

impl Display for SetValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(num) => write!(f, "{num}"),
            Self::Text(text) => f.write_str(text),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SetRequest {
    pub value: SetValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debounce_ms: Option<u64>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct SetResponse {
    pub accepted: bool,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct RefreshResponse {
    pub groups: usize,
}

impl Client {
    pub async fn nodes(&self) -> HdgApiResult<NodeSnapshot> {
        self.get("nodes").await
    }

    pub async fn node(&self, id: &str) -> HdgApiResult<Value> {
        self.get(&format!("nodes/{id}")).await
    }

    pub async fn set_node(
        &self,
        id: &str,
        value: SetValue,
        debounce_ms: Option<u64>,
    ) -> HdgApiResult<SetResponse> {
        self.put(&format!("nodes/{id}"), SetRequest { value, debounce_ms })
            .await
    }

    pub async fn refresh(&self) -> HdgApiResult<RefreshResponse> {
        self.post("refresh", ()).await
    }
}
