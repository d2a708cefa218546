use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Client;
use crate::error::HdgApiResult;

/// Counters kept by the request arbiter.
#[derive(Clone, Debug, Default, Serialize, Deserialize, Eq, PartialEq)]
pub struct ArbiterStats {
    pub queued: usize,
    pub submitted: u64,
    pub executed: u64,
    pub failed: u64,
    pub retried: u64,
    pub superseded: u64,
    /// Low priority reads interrupted to let more urgent requests run
    pub preempted: u64,
    pub shared: u64,
    pub cancelled: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct GroupStatus {
    pub key: String,
    pub interval_secs: u64,
    pub last_success: Option<DateTime<Utc>>,
    pub retry_attempts: u32,
    pub next_retry_in_secs: Option<u64>,
    pub last_error: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, Eq, PartialEq)]
pub struct PollerStatus {
    pub online: bool,
    pub cycles: u64,
    pub consecutive_failures: u32,
    pub connection_errors: u32,
    pub fallback_active: bool,
    pub groups: Vec<GroupStatus>,
}

#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct PendingStatus {
    pub node: String,
    pub value: String,
    pub generation: u64,
    pub attempts: u32,
    pub last_error: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, Eq, PartialEq)]
pub struct SetterStatus {
    pub pending: Vec<PendingStatus>,
    pub committed: u64,
    pub abandoned: u64,
    pub unchanged: u64,
    pub failed: u64,
    pub last_failure: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct Diagnostics {
    pub boiler: String,
    pub online: bool,
    pub poller: PollerStatus,
    pub arbiter: ArbiterStats,
    pub setter: SetterStatus,
}

impl Client {
    pub async fn diagnostics(&self) -> HdgApiResult<Diagnostics> {
        self.get("diagnostics").await
    }
}
