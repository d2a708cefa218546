use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

use hdg::NodeValue;

use crate::model::status::OnlineFlag;

#[derive(Debug, Default)]
struct Cache {
    /// Values as last reported by (or successfully written to) the boiler
    confirmed: BTreeMap<String, NodeValue>,
    /// Values requested by the consumer but not yet written
    optimistic: HashMap<String, (NodeValue, Instant)>,
    last_set: HashMap<String, Instant>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub accepted: usize,
    pub ignored: usize,
}

/// In-memory node value cache, keyed by base node id.
///
/// Readers see the optimistic value for a node while a write for it is
/// pending, and the confirmed value otherwise. Confirmed entries are only
/// ever overwritten, never removed.
#[derive(Clone, Debug, Default)]
pub struct NodeStore {
    cache: Arc<Mutex<Cache>>,
    online: OnlineFlag,
}

impl NodeStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn online(&self) -> &OnlineFlag {
        &self.online
    }

    pub async fn get(&self, id: &str) -> Option<NodeValue> {
        let cache = self.cache.lock().await;
        cache
            .optimistic
            .get(id)
            .map(|(value, _)| value)
            .or_else(|| cache.confirmed.get(id))
            .cloned()
    }

    pub async fn confirmed(&self, id: &str) -> Option<NodeValue> {
        self.cache.lock().await.confirmed.get(id).cloned()
    }

    pub async fn snapshot(&self) -> BTreeMap<String, NodeValue> {
        let cache = self.cache.lock().await;
        let mut res = cache.confirmed.clone();
        for (id, (value, _)) in &cache.optimistic {
            res.insert(id.clone(), value.clone());
        }
        res
    }

    pub async fn set_optimistic(&self, id: &str, value: NodeValue) {
        self.cache
            .lock()
            .await
            .optimistic
            .insert(id.to_string(), (value, Instant::now()));
    }

    pub async fn clear_optimistic(&self, id: &str) {
        self.cache.lock().await.optimistic.remove(id);
    }

    /// Record a successful write. `written` is false when the write was
    /// skipped because the boiler already had the value.
    ///
    /// An optimistic value for a newer, different request is left in place.
    pub async fn commit(&self, id: &str, value: NodeValue, written: bool) {
        let mut cache = self.cache.lock().await;
        if cache
            .optimistic
            .get(id)
            .is_some_and(|(pending, _)| *pending == value)
        {
            cache.optimistic.remove(id);
        }
        cache.confirmed.insert(id.to_string(), value);
        if written {
            cache.last_set.insert(id.to_string(), Instant::now());
        }
    }

    /// Merge values from a poll.
    ///
    /// For nodes written within `ignore_window`, a polled value that
    /// disagrees with the cache is dropped, since the boiler may not have
    /// applied the write yet.
    pub async fn merge_polled(
        &self,
        values: Vec<(String, NodeValue)>,
        ignore_window: Duration,
    ) -> MergeStats {
        let mut cache = self.cache.lock().await;
        let now = Instant::now();
        let mut stats = MergeStats::default();

        for (id, value) in values {
            let recently_set = cache
                .last_set
                .get(&id)
                .is_some_and(|at| now.duration_since(*at) < ignore_window);

            if recently_set && cache.confirmed.get(&id).is_some_and(|cur| *cur != value) {
                log::debug!("[{id}] Ignoring polled value {value} right after a write");
                stats.ignored += 1;
                continue;
            }

            cache.confirmed.insert(id, value);
            stats.accepted += 1;
        }

        stats
    }

    pub async fn len(&self) -> usize {
        self.cache.lock().await.confirmed.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use hdg::NodeValue;

    use crate::model::store::{MergeStats, NodeStore};

    fn num(value: f64) -> NodeValue {
        NodeValue::Number(value)
    }

    #[tokio::test]
    async fn optimistic_overlay() {
        let store = NodeStore::new();
        store
            .merge_polled(vec![("6022".into(), num(50.0))], Duration::ZERO)
            .await;

        store.set_optimistic("6022", num(55.0)).await;
        assert_eq!(store.get("6022").await, Some(num(55.0)));
        assert_eq!(store.confirmed("6022").await, Some(num(50.0)));
        assert_eq!(store.snapshot().await["6022"], num(55.0));

        store.clear_optimistic("6022").await;
        assert_eq!(store.get("6022").await, Some(num(50.0)));
    }

    #[tokio::test(start_paused = true)]
    async fn ignore_window_after_write() {
        let store = NodeStore::new();
        let window = Duration::from_secs(10);
        store.commit("6022", num(55.0), true).await;

        // stale value from the boiler is dropped, agreeing value is accepted
        let stats = store
            .merge_polled(
                vec![("6022".into(), num(50.0)), ("22003".into(), num(70.0))],
                window,
            )
            .await;
        assert_eq!(stats, MergeStats { accepted: 1, ignored: 1 });
        assert_eq!(store.get("6022").await, Some(num(55.0)));

        let stats = store
            .merge_polled(vec![("6022".into(), num(55.0))], window)
            .await;
        assert_eq!(stats.accepted, 1);

        tokio::time::sleep(window).await;
        store
            .merge_polled(vec![("6022".into(), num(50.0))], window)
            .await;
        assert_eq!(store.get("6022").await, Some(num(50.0)));
    }

    #[tokio::test(start_paused = true)]
    async fn skipped_write_does_not_open_window() {
        let store = NodeStore::new();
        store.commit("6022", num(55.0), false).await;
        store
            .merge_polled(vec![("6022".into(), num(50.0))], Duration::from_secs(10))
            .await;
        assert_eq!(store.get("6022").await, Some(num(50.0)));
    }
}
