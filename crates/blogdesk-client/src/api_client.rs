//! HTTP client for the dashboard API

use crate::resources::{self, Shape};
use async_trait::async_trait;
use blogdesk_core::{ApiConfig, Error, Result};
use blogdesk_query::{FetchError, FetchResult, ListParams, ListSource};
use reqwest::multipart::Form;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// API client for the dashboard's REST endpoints
///
/// Every request carries `Authorization: Token <token>` when a token is set.
/// A 401 answer is reported as an expired session.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    access_token: Option<String>,
    timeout: Duration,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            access_token: None,
            timeout: Duration::ZERO,
        }
    }

    /// Create a client from the `api` configuration section
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_config(config: &ApiConfig) -> Result<Self> {
        let timeout = config.request_timeout();
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::configuration(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            access_token: config.access_token.clone(),
            timeout,
        })
    }

    /// Set the session token
    #[must_use]
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Base URL requests are sent to
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let request = self.client.request(method, url);
        match self.access_token {
            Some(ref token) => request.header("Authorization", format!("Token {token}")),
            None => request,
        }
    }

    /// GET `path` with `params` as the query string
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, the API answers with a
    /// non-success status, or the body is not JSON.
    pub async fn get_json(&self, path: &str, params: &ListParams) -> Result<Value> {
        let mut url = self.url(path);
        let query = params
            .encode()
            .map_err(|e| Error::validation("query", e.to_string()))?;
        if !query.is_empty() {
            url.push('?');
            url.push_str(&query);
        }

        debug!(%url, "GET");
        let response = self.execute(self.request(Method::GET, &url)).await?;
        Self::read_json(response).await
    }

    /// Send a write request with an optional JSON body
    ///
    /// An empty success body is returned as `null`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, the API answers with a
    /// non-success status, or a non-empty body is not JSON.
    pub async fn send_json<B>(&self, method: Method, path: &str, body: Option<&B>) -> Result<Value>
    where
        B: Serialize + Sync + ?Sized,
    {
        let url = self.url(path);
        debug!(%method, %url, "Sending");

        let mut request = self.request(method, &url);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = self.execute(request).await?;
        Self::read_json(response).await
    }

    /// Send a `multipart/form-data` write, e.g. a file upload
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, the API answers with a
    /// non-success status, or a non-empty body is not JSON.
    pub async fn send_form(&self, method: Method, path: &str, form: Form) -> Result<Value> {
        let url = self.url(path);
        debug!(%method, %url, "Sending form");

        let response = self.execute(self.request(method, &url).multipart(form)).await?;
        Self::read_json(response).await
    }

    async fn execute(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.send().await.map_err(|e| self.transport_error(&e))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = error_message(&body)
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());

        if status == reqwest::StatusCode::UNAUTHORIZED {
            Err(Error::Authentication(message))
        } else {
            Err(Error::Http {
                status: status.as_u16(),
                message,
            })
        }
    }

    async fn read_json(response: Response) -> Result<Value> {
        let body = response
            .text()
            .await
            .map_err(|e| Error::Transport(format!("Failed to read response: {e}")))?;

        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&body)?)
    }

    fn transport_error(&self, err: &reqwest::Error) -> Error {
        if err.is_timeout() {
            Error::Timeout {
                duration_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
            }
        } else {
            Error::Transport(err.to_string())
        }
    }
}

/// Human-readable message from an error body
///
/// The API puts it under `error` or `detail`.
fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    ["error", "detail", "message"]
        .into_iter()
        .find_map(|field| value.get(field).and_then(Value::as_str))
        .map(ToString::to_string)
}

#[async_trait]
impl ListSource for ApiClient {
    async fn fetch_list(&self, resource: &str, params: &ListParams) -> FetchResult<Value> {
        let spec = resources::lookup(resource).ok_or_else(|| FetchError::InvalidQuery {
            field: "resource".to_string(),
            message: format!("unknown resource {resource:?}"),
        })?;

        let request = spec.resolve(params)?;
        let body = self.get_json(&request.path, &request.params).await?;

        Ok(match spec.shape {
            Shape::List => body,
            Shape::Record => Value::Array(vec![body]),
        })
    }

    fn stale_time(&self, resource: &str) -> Option<Duration> {
        resources::lookup(resource).map(|spec| spec.stale_time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case(r#"{"error": "Email already exists"}"#, Some("Email already exists"))]
    #[case(r#"{"detail": "Invalid token."}"#, Some("Invalid token."))]
    #[case(r#"{"count": 3}"#, None)]
    #[case("<html>oops</html>", None)]
    fn test_error_message(#[case] body: &str, #[case] expected: Option<&str>) {
        assert_eq!(error_message(body).as_deref(), expected);
    }

    #[test]
    fn test_url_joins_without_double_slash() {
        let client = ApiClient::new("http://localhost:8000/");
        assert_eq!(client.url("/users/list_users"), "http://localhost:8000/users/list_users");
        assert_eq!(client.url("users/delete_user/3"), "http://localhost:8000/users/delete_user/3");
    }

    #[test]
    fn test_declared_stale_time() {
        let client = ApiClient::new("http://localhost:8000");
        assert_eq!(client.stale_time("blogTopicsByDate"), Some(Duration::from_secs(60)));
        assert_eq!(client.stale_time("unknown"), None);
    }
}
