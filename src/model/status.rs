use std::sync::Arc;

use tokio::sync::watch;

/// Process-wide reachability flag for the boiler.
///
/// Starts out online. Transitions are logged once each.
#[derive(Clone, Debug)]
pub struct OnlineFlag {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for OnlineFlag {
    fn default() -> Self {
        Self::new()
    }
}

impl OnlineFlag {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(true);
        Self { tx: Arc::new(tx) }
    }

    #[must_use]
    pub fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    /// Update the flag. Returns true if this was a transition.
    pub fn set(&self, online: bool) -> bool {
        let changed = self.tx.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });

        if changed {
            if online {
                log::info!("Boiler is back online");
            } else {
                log::warn!("Boiler is offline, serving cached values");
            }
        }

        changed
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    /// Wait until the boiler is online. Returns immediately if it already is.
    pub async fn wait_online(&self) {
        let mut rx = self.tx.subscribe();
        // the sender lives in self, so this cannot fail
        let _ = rx.wait_for(|online| *online).await;
    }
}
