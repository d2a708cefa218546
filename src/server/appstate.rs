use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use hdg::{NodeValue, Registry, strip_node_suffix};
use hdg_api::diagnostics::Diagnostics;

use crate::arbiter::Arbiter;
use crate::backend::boiler::Transport;
use crate::config::AppConfig;
use crate::error::ApiResult;
use crate::model::store::NodeStore;
use crate::poller::{Poller, PollerHandle};
use crate::setter::ValueSetter;

#[derive(Clone)]
pub struct AppState {
    conf: Arc<AppConfig>,
    registry: Arc<Registry>,
    store: NodeStore,
    arbiter: Arbiter,
    setter: ValueSetter,
    poller: PollerHandle,
}

impl AppState {
    /// Wire up the request arbiter, setter and poller around `transport`.
    ///
    /// The poller is returned separately, since it is owned by the service
    /// that runs it.
    #[must_use]
    pub fn from_config(
        config: AppConfig,
        registry: Registry,
        transport: Arc<dyn Transport>,
    ) -> (Self, Poller) {
        let registry = Arc::new(registry);
        let store = NodeStore::new();
        let arbiter = Arbiter::new(transport, config.arbiter.clone());

        let setter = ValueSetter::new(
            arbiter.clone(),
            registry.clone(),
            store.clone(),
            config.setter.clone(),
        );

        let poller = Poller::new(
            arbiter.clone(),
            registry.clone(),
            store.clone(),
            config.polling.clone(),
        );

        let state = Self {
            conf: Arc::new(config),
            registry,
            store,
            arbiter,
            setter,
            poller: poller.handle(),
        };

        (state, poller)
    }

    #[must_use]
    pub fn config(&self) -> Arc<AppConfig> {
        self.conf.clone()
    }

    #[must_use]
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    #[must_use]
    pub fn store(&self) -> NodeStore {
        self.store.clone()
    }

    #[must_use]
    pub fn arbiter(&self) -> Arbiter {
        self.arbiter.clone()
    }

    #[must_use]
    pub fn setter(&self) -> ValueSetter {
        self.setter.clone()
    }

    #[must_use]
    pub fn poller(&self) -> PollerHandle {
        self.poller.clone()
    }

    /// Cached value of `node`, including any pending write.
    pub async fn get(&self, node: &str) -> Option<NodeValue> {
        self.store.get(strip_node_suffix(node)).await
    }

    pub async fn snapshot(&self) -> BTreeMap<String, NodeValue> {
        self.store.snapshot().await
    }

    /// Queue a write of `value` to `node`, debounced by `delay` (or the
    /// configured default).
    pub async fn request_set(
        &self,
        node: &str,
        value: &str,
        delay: Option<Duration>,
    ) -> ApiResult<bool> {
        let delay = delay.unwrap_or_else(|| self.setter.default_delay());
        self.setter.request_set(node, value, delay).await
    }

    pub async fn diagnostics(&self) -> Diagnostics {
        Diagnostics {
            boiler: self.conf.boiler.name.clone(),
            online: self.store.online().is_online(),
            poller: self.poller.status(),
            arbiter: self.arbiter.stats().await,
            setter: self.setter.status().await,
        }
    }
}
