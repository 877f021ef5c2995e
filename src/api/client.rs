// HTTP transport for the food ordering API.
// Handles base URL joining, bearer authentication and status-to-error mapping.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{
    Client, Response, StatusCode, Url,
    header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT},
};
use serde_json::Value;
use tracing::debug;

use crate::config::Config;
use crate::error::{FoodDashError, Result};
use crate::storage::Credentials;

/// Request/response client the service layer talks through.
///
/// Implementations return the decoded response body, or `Value::Null` when
/// the body is empty.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, path: &str) -> Result<Value>;

    async fn post(&self, path: &str, body: Value) -> Result<Value>;
}

/// reqwest-backed transport.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    base_url: String,
    credentials: Option<Credentials>,
}

impl HttpClient {
    /// Create a client for the given API base URL.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let parsed = Url::parse(base_url)
            .map_err(|e| FoodDashError::Config(format!("invalid API URL {base_url}: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(FoodDashError::Config(format!(
                "API URL must be http or https: {base_url}"
            )));
        }

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("fooddash/", env!("CARGO_PKG_VERSION"))),
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(FoodDashError::Network)?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials: None,
        })
    }

    /// Create a client from loaded configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.api_base_url, config.request_timeout)
    }

    /// Attach the stored auth token to every request while one is present.
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Authorization header for the current token, read fresh on every request.
    fn auth_header(&self) -> Option<HeaderValue> {
        let token = self.credentials.as_ref()?.token().ok().flatten()?;
        HeaderValue::from_str(&format!("Bearer {}", token)).ok()
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Value> {
        let request = match self.auth_header() {
            Some(header) => request.header(AUTHORIZATION, header),
            None => request,
        };

        let response = request.send().await.map_err(FoodDashError::Network)?;
        let response = check_response(response).await?;
        let text = response.text().await?;
        parse_body(&text)
    }
}

#[async_trait]
impl Transport for HttpClient {
    async fn get(&self, path: &str) -> Result<Value> {
        let url = self.url(path);
        debug!(%url, "GET");
        self.send(self.client.get(&url)).await
    }

    async fn post(&self, path: &str, body: Value) -> Result<Value> {
        let url = self.url(path);
        debug!(%url, "POST");
        self.send(self.client.post(&url).json(&body)).await
    }
}

/// Check response status and convert errors.
async fn check_response(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    match status {
        StatusCode::UNAUTHORIZED => Err(FoodDashError::Unauthorized),
        StatusCode::NOT_FOUND => Err(FoodDashError::NotFound(response.url().to_string())),
        status => {
            let body = response.text().await.unwrap_or_default();
            Err(FoodDashError::Http {
                status: status.as_u16(),
                message: error_message(status, &body),
            })
        }
    }
}

fn parse_body(text: &str) -> Result<Value> {
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_str(text)?)
}

/// Prefer the server's `message`/`error` field, then the raw body, then the status reason.
fn error_message(status: StatusCode, body: &str) -> String {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) {
        for field in ["message", "error"] {
            if let Some(Value::String(msg)) = map.get(field) {
                return msg.clone();
            }
        }
    }

    let body = body.trim();
    if !body.is_empty() {
        return body.to_string();
    }

    status
        .canonical_reason()
        .unwrap_or("request failed")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joining() {
        let client = HttpClient::new("http://localhost:3000/api/", Duration::from_secs(5)).unwrap();
        assert_eq!(client.base_url(), "http://localhost:3000/api");
        assert_eq!(client.url("/foods"), "http://localhost:3000/api/foods");
    }

    #[test]
    fn test_rejects_bad_base_url() {
        assert!(matches!(
            HttpClient::new("not a url", Duration::from_secs(5)),
            Err(FoodDashError::Config(_))
        ));
        assert!(matches!(
            HttpClient::new("ftp://example.com", Duration::from_secs(5)),
            Err(FoodDashError::Config(_))
        ));
    }

    #[test]
    fn test_error_message_extraction() {
        let status = StatusCode::UNPROCESSABLE_ENTITY;
        assert_eq!(
            error_message(status, r#"{"message":"Email already taken"}"#),
            "Email already taken"
        );
        assert_eq!(error_message(status, r#"{"error":"bad otp"}"#), "bad otp");
        assert_eq!(error_message(status, "plain failure"), "plain failure");
        assert_eq!(error_message(status, ""), "Unprocessable Entity");
    }

    #[test]
    fn test_parse_empty_body() {
        assert_eq!(parse_body("").unwrap(), Value::Null);
        assert_eq!(parse_body(r#"{"ok":true}"#).unwrap()["ok"], Value::Bool(true));
        assert!(parse_body("{oops").is_err());
    }

    #[test]
    fn test_auth_header_follows_stored_token() {
        let dir = tempfile::TempDir::new().unwrap();
        let credentials =
            Credentials::new(crate::storage::LocalStorage::at(dir.path().join("storage.json")));
        let client = HttpClient::new("http://localhost", Duration::from_secs(5))
            .unwrap()
            .with_credentials(credentials.clone());

        assert!(client.auth_header().is_none());
        credentials.store_token("abc123").unwrap();
        assert_eq!(client.auth_header().unwrap(), "Bearer abc123");
    }
}
