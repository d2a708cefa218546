use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use hdg_api::config::AppConfig;
use hdg_api::diagnostics::Diagnostics;

use crate::server::appstate::AppState;

async fn get_diagnostics(State(state): State<AppState>) -> Json<Diagnostics> {
    Json(state.diagnostics().await)
}

async fn get_config(State(state): State<AppState>) -> Json<AppConfig> {
    Json((*state.config()).clone())
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/diagnostics", get(get_diagnostics))
        .route("/config", get(get_config))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use hdg::catalog::default_registry;
    use hdg_api::config::AppConfig;
    use hdg_api::diagnostics::Diagnostics;

    use crate::config::parse_str;
    use crate::routes::router;
    use crate::server::appstate::AppState;
    use crate::testutil::StubTransport;

    async fn get_json<T: serde::de::DeserializeOwned>(state: &AppState, uri: &str) -> T {
        let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let res = router(state.clone()).oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn diagnostics_and_config() {
        let config = parse_str("boiler:\n  name: Keller\n  url: http://127.0.0.1\n").unwrap();
        let (state, _poller) = AppState::from_config(
            config,
            default_registry().unwrap(),
            Arc::new(StubTransport::new()),
        );

        let diag: Diagnostics = get_json(&state, "/api/diagnostics").await;
        assert_eq!(diag.boiler, "Keller");
        assert!(diag.online);
        assert_eq!(diag.poller.groups.len(), state.registry().groups().len());
        assert_eq!(diag.arbiter.queued, 0);
        assert!(diag.setter.pending.is_empty());

        let conf: AppConfig = get_json(&state, "/api/config").await;
        assert_eq!(conf.boiler.name, "Keller");
        assert_eq!(conf.polling.concurrency, 5);
    }
}
