pub mod diagnostics;
pub mod nodes;

use axum::Router;
use axum::response::{IntoResponse, Response};
use hyper::StatusCode;
use serde_json::json;

use hdg::error::HdgError;

use crate::error::ApiError;
use crate::server::appstate::AppState;

impl ApiError {
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::HdgError(HdgError::UnknownNode(_)) => StatusCode::NOT_FOUND,
            Self::HdgError(_) => StatusCode::BAD_REQUEST,
            Self::Connection(_) | Self::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_msg = self.to_string();

        if status.is_server_error() {
            log::error!("Request failed: {error_msg}");
        } else {
            log::warn!("Request rejected: {error_msg}");
        }

        let res = json!({"error": error_msg});

        (status, axum::Json(res)).into_response()
    }
}

pub fn router(appstate: AppState) -> Router {
    Router::new()
        .nest(
            "/api",
            Router::new()
                .merge(nodes::router())
                .merge(diagnostics::router()),
        )
        .with_state(appstate)
}
