use std::net::{Ipv4Addr, SocketAddr, TcpListener};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::routing::IntoMakeService;
use axum_server::Handle;
use futures::FutureExt;
use futures::future::BoxFuture;
use tower_http::normalize_path::NormalizePath;

use svc::traits::{Service, StopResult};

use crate::error::{ApiError, ApiResult};

/// The consumer API, as built by [`crate::server::build_service`].
pub type ApiService = IntoMakeService<NormalizePath<Router>>;

/// Serves the consumer API. The port is bound in `start`, so a busy port
/// fails startup instead of the running service.
pub struct HttpServer {
    addr: SocketAddr,
    svc: ApiService,
    handle: Handle,
    server: Option<BoxFuture<'static, std::io::Result<()>>>,
}

impl HttpServer {
    #[must_use]
    pub fn new(ipaddress: Ipv4Addr, port: u16, svc: ApiService) -> Self {
        Self {
            addr: SocketAddr::from((ipaddress, port)),
            svc,
            handle: Handle::new(),
            server: None,
        }
    }
}

#[async_trait]
impl Service for HttpServer {
    type Error = ApiError;

    async fn start(&mut self) -> ApiResult<()> {
        let listener = TcpListener::bind(self.addr)?;
        listener.set_nonblocking(true)?;
        log::info!("Serving api on http://{}/api", listener.local_addr()?);

        self.server = Some(
            axum_server::from_tcp(listener)
                .handle(self.handle.clone())
                .serve(self.svc.clone())
                .boxed(),
        );
        Ok(())
    }

    async fn run(&mut self) -> ApiResult<()> {
        if let Some(server) = self.server.take() {
            server.await?;
        }
        Ok(())
    }

    async fn stop(&mut self) -> ApiResult<()> {
        log::info!("Stopping api server on {}", self.addr);
        self.server.take();
        self.handle = Handle::new();
        Ok(())
    }

    async fn signal_stop(&mut self) -> ApiResult<StopResult> {
        self.handle.graceful_shutdown(Some(Duration::from_secs(1)));
        Ok(StopResult::Delivered)
    }
}
