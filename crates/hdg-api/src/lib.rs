pub mod config;
pub mod diagnostics;
pub mod error;
pub mod nodes;

use serde::Serialize;
use serde::de::DeserializeOwned;
use url::Url;

use crate::error::{HdgApiError, HdgApiResult};

/// Typed client for the bridge's own HTTP api (`/api/...`).
#[derive(Clone, Debug)]
pub struct Client {
    client: reqwest::Client,
    base: Url,
}

impl Client {
    pub fn new(base: Url) -> HdgApiResult<Self> {
        Ok(Self {
            client: reqwest::Client::new(),
            base: base.join("api/")?,
        })
    }

    #[must_use]
    pub fn from_parts(client: reqwest::Client, base: Url) -> Self {
        Self { client, base }
    }

    fn url(&self, path: &str) -> HdgApiResult<Url> {
        Ok(self.base.join(path.trim_start_matches('/'))?)
    }

    async fn decode<T: DeserializeOwned>(res: reqwest::Response) -> HdgApiResult<T> {
        let status = res.status();
        if status.is_success() {
            return Ok(res.json().await?);
        }

        let body: serde_json::Value = res.json().await.unwrap_or_default();
        let message = body
            .get("error")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("unknown error")
            .to_string();

        Err(HdgApiError::Server {
            status: status.as_u16(),
            message,
        })
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> HdgApiResult<T> {
        let res = self.client.get(self.url(path)?).send().await?;
        Self::decode(res).await
    }

    pub async fn put<T: DeserializeOwned>(
        &self,
        path: &str,
        body: impl Serialize + Send,
    ) -> HdgApiResult<T> {
        let res = self.client.put(self.url(path)?).json(&body).send().await?;
        Self::decode(res).await
    }

    pub async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        body: impl Serialize + Send,
    ) -> HdgApiResult<T> {
        let res = self.client.post(self.url(path)?).json(&body).send().await?;
        Self::decode(res).await
    }
}

#[cfg(test)]
mod tests {
    use url::Url;

    use crate::Client;

    #[test]
    fn urls_are_relative_to_api_root() {
        let client = Client::new(Url::parse("http://localhost:8080/").unwrap()).unwrap();
        assert_eq!(
            client.url("/nodes/6022").unwrap().as_str(),
            "http://localhost:8080/api/nodes/6022"
        );
        assert_eq!(
            client.url("diagnostics").unwrap().as_str(),
            "http://localhost:8080/api/diagnostics"
        );
    }
}
