//! HTTP access to the auth service and the general API.
//!
//! [`ApiClient`] wraps one `reqwest::Client` and the two base URLs from
//! [`StoreConfig`]. Responses are read eagerly into a [`JsonResponse`]
//! so callers can inspect the status and decode the body independently,
//! which login relies on.

use std::time::Duration;

pub use reqwest::Method;
use serde_json::Value;
use url::Url;

use crate::config::StoreConfig;
use crate::error::Result;

/// A fully-read HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonResponse {
    /// HTTP status code.
    pub status: u16,
    /// Raw response body.
    pub body: Vec<u8>,
}

impl JsonResponse {
    async fn read(response: reqwest::Response) -> Result<Self> {
        let status = response.status().as_u16();
        let body = response.bytes().await?.to_vec();
        Ok(Self { status, body })
    }

    /// Whether the status is exactly 200.
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }

    /// Decode the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Serialization`](crate::StoreError::Serialization)
    /// if the body is not valid JSON.
    pub fn json(&self) -> Result<Value> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

/// Append query parameters to `url`, keeping any it already has.
pub fn format_url_with_get_params<K, V>(mut url: Url, params: impl IntoIterator<Item = (K, V)>) -> Url
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in params {
            pairs.append_pair(key.as_ref(), value.as_ref());
        }
    }
    url
}

/// Client for the auth and API endpoints.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    auth_base: Url,
    api_base: Url,
}

impl ApiClient {
    /// Build a client from the base URLs and timeout in `config`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UrlParse`](crate::StoreError::UrlParse) for a
    /// malformed base URL, or a network error if the TLS backend fails to
    /// initialize.
    pub fn new(config: &StoreConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }

        Ok(Self {
            client: builder.build()?,
            auth_base: config.auth_base()?,
            api_base: config.api_base()?,
        })
    }

    /// Send `body` as JSON to an endpoint under the auth base URL.
    ///
    /// Any status is returned as-is; only transport failures are errors.
    pub async fn fetch_auth_json(&self, path: &str, method: Method, body: &Value) -> Result<JsonResponse> {
        let url = self.auth_base.join(path)?;
        tracing::debug!(%url, %method, "auth request");

        let response = self.client.request(method, url).json(body).send().await?;
        JsonResponse::read(response).await
    }

    /// GET an endpoint under the API base URL with query parameters.
    pub async fn fetch_api_json<K, V>(
        &self,
        path: &str,
        params: impl IntoIterator<Item = (K, V)>,
    ) -> Result<JsonResponse>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let url = format_url_with_get_params(self.api_base.join(path)?, params);
        tracing::debug!(%url, "api request");

        let response = self.client.get(url).send().await?;
        JsonResponse::read(response).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_params_are_appended() {
        let url = Url::parse("http://127.0.0.1/api/categories/").unwrap();
        let url = format_url_with_get_params(url, [("limit", "1000")]);
        assert_eq!(url.as_str(), "http://127.0.0.1/api/categories/?limit=1000");
    }

    #[test]
    fn get_params_preserve_existing_query() {
        let url = Url::parse("http://127.0.0.1/list?ordering=name").unwrap();
        let url = format_url_with_get_params(url, [("limit", "5"), ("q", "a b")]);

        let params: std::collections::HashMap<_, _> = url.query_pairs().collect();
        assert_eq!(params.get("ordering").unwrap(), "name");
        assert_eq!(params.get("limit").unwrap(), "5");
        assert_eq!(params.get("q").unwrap(), "a b");
    }

    #[test]
    fn json_response_decodes_body() {
        let response = JsonResponse {
            status: 200,
            body: br#"{"access":"a"}"#.to_vec(),
        };
        assert!(response.is_ok());
        assert_eq!(response.json().unwrap()["access"], "a");
    }

    #[test]
    fn json_response_rejects_html() {
        let response = JsonResponse {
            status: 502,
            body: b"<html>bad gateway</html>".to_vec(),
        };
        assert!(!response.is_ok());
        assert!(response.json().is_err());
    }

    #[test]
    fn client_builds_from_default_config() {
        let client = ApiClient::new(&StoreConfig::default()).unwrap();
        assert_eq!(client.auth_base.as_str(), "http://127.0.0.1:8000/api/auth/");
    }
}
