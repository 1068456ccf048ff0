use std::fmt;

use async_trait::async_trait;
use tracing::debug;

use super::RegionProvider;
use crate::{error::FetchError, types::Regions};

/// Fetches a ready-made `{"storage": {...}, "compute": {...}}` document.
#[derive(Clone)]
pub struct HttpJsonProvider {
    client: reqwest::Client,
    url: String,
    bearer_token: Option<String>,
}

impl fmt::Debug for HttpJsonProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpJsonProvider")
            .field("url", &self.url)
            .field("bearer_token", &self.bearer_token.as_ref().map(|_| "***"))
            .finish()
    }
}

impl HttpJsonProvider {
    /// Provider reading the document at `url` with a shared client.
    pub fn new<S: Into<String>>(client: reqwest::Client, url: S) -> Self {
        Self {
            client,
            url: url.into(),
            bearer_token: None,
        }
    }

    /// Sends `Authorization: Bearer` when set. Blank tokens are ignored.
    pub fn with_bearer_token(mut self, token: Option<String>) -> Self {
        self.bearer_token = token.filter(|t| !t.trim().is_empty());
        self
    }
}

#[async_trait]
impl RegionProvider for HttpJsonProvider {
    async fn fetch(&self) -> Result<Regions, FetchError> {
        debug!("Fetching regions from {}", self.url);

        let mut request = self
            .client
            .get(&self.url)
            .header(reqwest::header::ACCEPT, "application/json");
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: self.url.clone(),
            });
        }

        let body = response.bytes().await?;
        serde_json::from_slice(&body)
            .map_err(|e| FetchError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{header, method, path},
    };

    #[tokio::test]
    async fn decodes_region_document() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/regions.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                serde_json::json!({
                    "storage": {"us-east-1": "US East (N. Virginia)"},
                    "compute": {}
                }),
            ))
            .mount(&server)
            .await;

        let provider = HttpJsonProvider::new(
            reqwest::Client::new(),
            format!("{}/regions.json", server.uri()),
        );
        let regions = provider.fetch().await.unwrap();

        assert_eq!(
            regions.storage.get("us-east-1").map(String::as_str),
            Some("US East (N. Virginia)")
        );
        assert!(regions.compute.is_empty());
    }

    #[tokio::test]
    async fn non_success_status_is_a_fetch_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let provider =
            HttpJsonProvider::new(reqwest::Client::new(), server.uri());
        let err = provider.fetch().await.unwrap_err();

        assert!(matches!(err, FetchError::Status { status: 503, .. }));
    }

    #[tokio::test]
    async fn malformed_body_is_a_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let provider =
            HttpJsonProvider::new(reqwest::Client::new(), server.uri());
        let err = provider.fetch().await.unwrap_err();

        assert!(matches!(err, FetchError::Decode(_)));
    }

    #[tokio::test]
    async fn sends_bearer_token_when_configured() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("authorization", "Bearer s3cret-token"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let provider =
            HttpJsonProvider::new(reqwest::Client::new(), server.uri())
                .with_bearer_token(Some("s3cret-token".into()));
        let regions = provider.fetch().await.unwrap();

        assert!(regions.is_empty());
        assert!(!format!("{provider:?}").contains("s3cret"));
    }
}
