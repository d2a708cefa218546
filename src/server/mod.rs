pub mod appstate;
pub mod http;

use axum::ServiceExt;
use axum::extract::Request;
use axum::routing::IntoMakeService;
use tower_http::normalize_path::NormalizePath;
use tower_http::trace::TraceLayer;

use crate::routes;
use crate::server::appstate::AppState;

/// Build the consumer API service, with trailing slashes ignored.
pub fn build_service(appstate: AppState) -> IntoMakeService<NormalizePath<axum::Router>> {
    let router = routes::router(appstate).layer(TraceLayer::new_for_http());

    let normalized = NormalizePath::trim_trailing_slash(router);

    ServiceExt::<Request>::into_make_service(normalized)
}
