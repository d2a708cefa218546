use std::collections::BTreeSet;
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::watch;

use crate::error::SvcError;
use crate::traits::{BoxDynService, Service, StopResult};

/// Cloneable handle used to request that every service stops.
#[derive(Clone, Debug)]
pub struct StopHandle(Arc<watch::Sender<bool>>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.send_replace(true);
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        *self.0.borrow()
    }
}

/// Starts a fixed set of services, runs them concurrently, and stops all of
/// them once a stop is requested (or one of them fails).
pub struct ServiceRunner {
    names: BTreeSet<String>,
    services: Vec<(String, BoxDynService)>,
    stop: StopHandle,
}

impl Default for ServiceRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceRunner {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self {
            names: BTreeSet::new(),
            services: vec![],
            stop: StopHandle(Arc::new(tx)),
        }
    }

    pub fn register(
        &mut self,
        name: &str,
        svc: impl Service + 'static,
    ) -> Result<(), SvcError> {
        if !self.names.insert(name.to_string()) {
            return Err(SvcError::AlreadyRegistered(name.to_string()));
        }
        self.services.push((name.to_string(), svc.boxed()));
        Ok(())
    }

    #[must_use]
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    async fn drive(name: String, mut svc: BoxDynService, stop: StopHandle) -> Result<(), SvcError> {
        let mut stop_rx = stop.0.subscribe();

        let res = tokio::select! {
            res = svc.run() => res,
            () = async { let _ = stop_rx.wait_for(|stopped| *stopped).await; } => {
                log::debug!("[{name}] Stop requested");
                if let Ok(StopResult::Delivered) = svc.signal_stop().await {
                    log::trace!("[{name}] Stop signal delivered");
                }
                Ok(())
            }
        };

        if let Err(err) = &res {
            log::error!("[{name}] Service failed: {err}");
            stop.stop();
        }

        svc.stop().await.map_err(|err| err.named(&name))?;
        log::info!("[{name}] Service stopped");

        res.map_err(|err| err.named(&name))
    }

    /// Start every registered service in registration order, then run them
    /// until a stop is requested. Returns the first service error, if any.
    pub async fn run(self) -> Result<(), SvcError> {
        let mut handles = vec![];

        for (name, mut svc) in self.services {
            if let Err(err) = svc.start().await {
                self.stop.stop();
                join_all(handles).await;
                return Err(err.named(&name));
            }
            log::info!("[{name}] Service started");
            handles.push(tokio::spawn(Self::drive(name, svc, self.stop.clone())));
        }

        let mut first_error = None;
        for res in join_all(handles).await {
            if let Err(err) = res? {
                first_error.get_or_insert(err);
            }
        }

        first_error.map_or(Ok(()), Err)
    }
}
