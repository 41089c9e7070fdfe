use super::error::{DistillrError, Result};
use crate::config::ClientConfig;
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{RequestBuilder, StatusCode};
use serde_json::Value;
use tracing::{debug, warn};

/// HTTP capability used by every component of the SDK.
///
/// The session, directory, query and upload code only talk to the platform
/// through this trait. [`HttpTransport`] is the real implementation; tests can
/// swap in a scripted one.
#[async_trait]
pub trait Transport: Send + Sync {
    /// GET a JSON document
    async fn get_json(&self, url: &str) -> Result<Value>;

    /// GET a JSON document with an explicit `Authorization` header
    async fn get_json_with_key(&self, url: &str, api_key: &str) -> Result<Value>;

    /// POST a JSON body and decode the JSON reply
    async fn post_json(&self, url: &str, body: &Value) -> Result<Value>;

    /// PUT raw bytes. Returns the HTTP status; callers decide what a failure means.
    async fn put_bytes(&self, url: &str, body: Vec<u8>, content_type: &str) -> Result<u16>;
}

/// Cookie-backed reqwest transport
///
/// Cookies set by `/login` are kept in the client's cookie store and replayed
/// on every later request, which is how the platform tracks the session.
pub struct HttpTransport {
    http: reqwest::Client,
}

impl HttpTransport {
    /// Build a transport from the client configuration
    pub fn connect(config: &ClientConfig) -> Result<Self> {
        if config.accept_invalid_certs {
            warn!(
                base_url = %config.base_url,
                "TLS certificate verification is disabled"
            );
        }

        let http = reqwest::Client::builder()
            .cookie_store(true)
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .timeout(config.request_timeout)
            .user_agent(concat!("datadistillr-rust/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DistillrError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(HttpTransport { http })
    }

    async fn send_json(&self, url: &str, request: RequestBuilder) -> Result<Value> {
        let response = request.send().await?;
        let status = response.status();
        debug!(%url, status = status.as_u16(), "response received");

        let body = response.text().await?;
        check_status(url, status, &body)?;

        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body).map_err(|e| {
            DistillrError::server(url, format!("response is not valid JSON: {}", e), None)
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get_json(&self, url: &str) -> Result<Value> {
        debug!(%url, "GET");
        self.send_json(url, self.http.get(url)).await
    }

    async fn get_json_with_key(&self, url: &str, api_key: &str) -> Result<Value> {
        debug!(%url, "GET (api key)");
        self.send_json(url, self.http.get(url).header(AUTHORIZATION, api_key))
            .await
    }

    async fn post_json(&self, url: &str, body: &Value) -> Result<Value> {
        debug!(%url, "POST");
        self.send_json(url, self.http.post(url).json(body)).await
    }

    async fn put_bytes(&self, url: &str, body: Vec<u8>, content_type: &str) -> Result<u16> {
        debug!(%url, bytes = body.len(), "PUT");
        let response = self
            .http
            .put(url)
            .header(CONTENT_TYPE, content_type)
            .body(body)
            .send()
            .await?;
        Ok(response.status().as_u16())
    }
}

/// Map HTTP status codes onto the error taxonomy
fn check_status(url: &str, status: StatusCode, body: &str) -> Result<()> {
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(DistillrError::Authorization {
            url: url.to_string(),
            message: "You are not authorized to access this resource.".to_string(),
        });
    }
    if !status.is_success() {
        let payload = serde_json::from_str(body).ok();
        return Err(DistillrError::server(
            url,
            format!("HTTP {}: {}", status.as_u16(), truncate(body, 512)),
            payload,
        ));
    }
    Ok(())
}

fn truncate(body: &str, max: usize) -> &str {
    match body.char_indices().nth(max) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}
