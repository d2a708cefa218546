use async_trait::async_trait;
use mime::Mime;
use reqwest::StatusCode;
use reqwest::header::CONTENT_TYPE;
use serde_json::Value;
use url::Url;

use crate::backend::boiler::Transport;
use crate::config::BoilerConfig;
use crate::error::{ApiError, ApiResult};

const ENDPOINT_DATA_REFRESH: &str = "/ApiManager.php?action=dataRefresh";
const ENDPOINT_SET_VALUE: &str = "/ActionManager.php";

/// Content types the controller has been seen to use for JSON bodies.
const ACCEPTED_CONTENT_TYPES: &[&str] = &["application/json", "text/json", "text/plain", "text/html"];

/// Length of response excerpts included in error messages.
const EXCERPT_LEN: usize = 100;

pub struct HdgClient {
    name: String,
    base_url: Url,
    http: reqwest::Client,
}

fn excerpt(text: &str) -> &str {
    text.char_indices()
        .nth(EXCERPT_LEN)
        .map_or(text, |(idx, _)| &text[..idx])
}

fn accepted_content_type(header: &str) -> bool {
    header.parse::<Mime>().is_ok_and(|mime| {
        ACCEPTED_CONTENT_TYPES
            .iter()
            .any(|accepted| mime.essence_str().eq_ignore_ascii_case(accepted))
    })
}

impl HdgClient {
    pub fn new(config: &BoilerConfig) -> ApiResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;

        Ok(Self {
            name: config.name.clone(),
            base_url: config.url.clone(),
            http,
        })
    }

    fn endpoint_url(&self, endpoint: &str) -> ApiResult<Url> {
        let base = if self.base_url.path().ends_with('/') {
            self.base_url.to_string()
        } else {
            format!("{}/", self.base_url)
        };
        let base = Url::parse(&base)?;
        Ok(base.join(endpoint.trim_start_matches('/'))?)
    }

    async fn check_status(
        &self,
        response: reqwest::Response,
        action: &str,
    ) -> ApiResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(ApiError::Response(format!(
            "[{}] HTTP {status} during {action}: {}",
            self.name,
            excerpt(&body)
        )))
    }
}

#[async_trait]
impl Transport for HdgClient {
    async fn read_nodes(&self, payload: &str) -> ApiResult<Vec<Value>> {
        let url = self.endpoint_url(ENDPOINT_DATA_REFRESH)?;
        log::trace!("[{}] dataRefresh {payload}", self.name);

        let response = self
            .http
            .post(url)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded; charset=UTF-8")
            .body(payload.to_string())
            .send()
            .await?;

        let response = self.check_status(response, "dataRefresh").await?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();

        let text = response.text().await?;

        if !accepted_content_type(&content_type) {
            return Err(ApiError::Response(format!(
                "[{}] Unexpected content type {content_type:?} for dataRefresh: {}",
                self.name,
                excerpt(&text)
            )));
        }

        let json: Value = serde_json::from_str(&text).map_err(|err| {
            ApiError::Response(format!(
                "[{}] Non-JSON response for dataRefresh ({err}): {}",
                self.name,
                excerpt(&text)
            ))
        })?;

        match json {
            Value::Array(items) => {
                log::trace!("[{}] dataRefresh returned {} items", self.name, items.len());
                Ok(items)
            }
            other => Err(ApiError::Response(format!(
                "[{}] dataRefresh response is not a list: {}",
                self.name,
                excerpt(&other.to_string())
            ))),
        }
    }

    async fn write_node(&self, node_id: &str, value: &str) -> ApiResult<()> {
        let mut url = self.endpoint_url(ENDPOINT_SET_VALUE)?;
        url.query_pairs_mut()
            .append_pair("action", "set_value_changed")
            .append_pair("i", node_id)
            .append_pair("v", value);

        log::debug!("[{}] Setting node {node_id} to {value:?}", self.name);

        let response = self.http.get(url).send().await?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if status == StatusCode::OK {
            log::info!("[{}] Node {node_id} set to {value:?}", self.name);
            Ok(())
        } else {
            Err(ApiError::Response(format!(
                "[{}] Setting node {node_id} failed with HTTP {status}: {}",
                self.name,
                excerpt(&body)
            )))
        }
    }
}
