use std::error::Error;

use async_trait::async_trait;

use crate::error::SvcError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopResult {
    /// The service was asked to stop, and will return from `run()` soon
    Delivered,
    /// The service has no way to interrupt `run()`; it will be dropped instead
    NotSupported,
}

pub type BoxDynService = Box<dyn Service<Error = SvcError>>;

#[async_trait]
pub trait Service: Send {
    type Error: Error + Send + Sync + 'static;

    async fn start(&mut self) -> Result<(), Self::Error>;

    async fn run(&mut self) -> Result<(), Self::Error>;

    async fn stop(&mut self) -> Result<(), Self::Error>;

    async fn signal_stop(&mut self) -> Result<StopResult, Self::Error> {
        Ok(StopResult::NotSupported)
    }

    fn boxed(self) -> BoxDynService
    where
        Self: Sized + 'static,
    {
        Box::new(ErasedService(self))
    }
}

struct ErasedService<S>(S);

#[async_trait]
impl<S: Service> Service for ErasedService<S> {
    type Error = SvcError;

    async fn start(&mut self) -> Result<(), SvcError> {
        self.0.start().await.map_err(SvcError::service)
    }

    async fn run(&mut self) -> Result<(), SvcError> {
        self.0.run().await.map_err(SvcError::service)
    }

    async fn stop(&mut self) -> Result<(), SvcError> {
        self.0.stop().await.map_err(SvcError::service)
    }

    async fn signal_stop(&mut self) -> Result<StopResult, SvcError> {
        self.0.signal_stop().await.map_err(SvcError::service)
    }
}
