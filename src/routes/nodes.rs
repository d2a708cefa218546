use std::collections::BTreeMap;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};

use hdg::NodeValue;
use hdg::error::HdgError;
use hdg_api::nodes::{RefreshResponse, SetRequest, SetResponse};

use crate::error::{ApiError, ApiResult};
use crate::server::appstate::AppState;

async fn get_nodes(State(state): State<AppState>) -> Json<BTreeMap<String, NodeValue>> {
    Json(state.snapshot().await)
}

async fn get_node(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<NodeValue>> {
    state
        .get(&id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::HdgError(HdgError::UnknownNode(id)))
}

async fn put_node(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<SetRequest>,
) -> ApiResult<Json<SetResponse>> {
    log::info!("PUT node {id}: {}", req.value);

    let delay = req.debounce_ms.map(Duration::from_millis);
    let accepted = state
        .request_set(&id, &req.value.to_string(), delay)
        .await?;

    Ok(Json(SetResponse { accepted }))
}

async fn post_refresh(State(state): State<AppState>) -> Json<RefreshResponse> {
    log::info!("Refresh of all polling groups requested");
    state.poller().request_refresh();

    Json(RefreshResponse {
        groups: state.registry().groups().len(),
    })
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/nodes", get(get_nodes))
        .route("/nodes/{id}", get(get_node).put(put_node))
        .route("/refresh", post(post_refresh))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use hdg::NodeValue;
    use hdg::catalog::default_registry;

    use crate::config::parse_str;
    use crate::routes::router;
    use crate::server::appstate::AppState;
    use crate::testutil::StubTransport;

    fn appstate() -> AppState {
        let config = parse_str("boiler:\n  url: http://127.0.0.1\n").unwrap();
        let (state, _poller) = AppState::from_config(
            config,
            default_registry().unwrap(),
            Arc::new(StubTransport::new()),
        );
        state
    }

    async fn call(state: &AppState, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let req = Request::builder().method(method).uri(uri);
        let req = match body {
            Some(body) => req
                .header("content-type", "application/json")
                .body(Body::from(body.to_string())),
            None => req.body(Body::empty()),
        }
        .unwrap();

        let res = router(state.clone()).oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    #[tokio::test]
    async fn get_known_and_unknown_nodes() {
        let state = appstate();
        state
            .store()
            .merge_polled(
                vec![("22003".into(), NodeValue::Number(61.5))],
                std::time::Duration::ZERO,
            )
            .await;

        let (status, body) = call(&state, Method::GET, "/api/nodes/22003T", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!(61.5));

        let (status, body) = call(&state, Method::GET, "/api/nodes", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"22003": 61.5}));

        let (status, body) = call(&state, Method::GET, "/api/nodes/4711", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn put_validates_value() {
        let state = appstate();

        let (status, body) = call(&state, Method::PUT, "/api/nodes/4711", Some(json!({"value": 1}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{body}");

        let writable = state
            .registry()
            .points()
            .iter()
            .find_map(|point| point.setter.as_ref().map(|spec| (point.base_id().to_string(), spec.clone())))
            .unwrap();
        let (node, spec) = writable;

        let uri = format!("/api/nodes/{node}");
        let (status, _) = call(&state, Method::PUT, &uri, Some(json!({"value": spec.max + 1000.0}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = call(
            &state,
            Method::PUT,
            &uri,
            Some(json!({"value": spec.min, "debounce_ms": 60_000})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"accepted": true}));
        assert_eq!(state.setter().status().await.pending.len(), 1);
    }

    #[tokio::test]
    async fn refresh_reports_group_count() {
        let state = appstate();
        let groups = state.registry().groups().len();

        let (status, body) = call(&state, Method::POST, "/api/refresh", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"groups": groups}));
    }
}
