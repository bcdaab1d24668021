//! HTTP Widget API
//!
//! reqwest implementation of [`WidgetApi`] and [`AdminApi`].
//!
//! # Conventions
//!
//! Every request goes through [`HttpApi::call`]:
//! - Paths are joined onto the API base (which always ends in `/`)
//! - Every request carries the `X-Client-Id` header
//! - `204 No Content` (or an empty 2xx body) reads as "no body"
//! - A 404 from a URL without an `/api/` segment is retried once at
//!   `<origin>/api/<rest>`, for servers that mount the API under `/api`
//! - Any other failure becomes [`WidgetError::Http`] carrying the first
//!   response's body text

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;

use super::traits::{AdminApi, FormValues, WidgetApi};
use crate::config::{normalize_api_base, WidgetSettings};
use crate::error::{WidgetError, WidgetResult};
use crate::models::{
    ChatReply, ChatRequest, MessagingConfig, StarterQuestionConfig, TranscriptEntry,
    TranscriptResponse, WidgetConfig,
};
use crate::storage::ClientIdentity;

/// Header carrying the visitor's client identity
pub const CLIENT_ID_HEADER: &str = "X-Client-Id";

/// HTTP client for the widget API
#[derive(Clone, Debug)]
pub struct HttpApi {
    /// Base URL, ends in `/`
    base: String,
    /// Value of the `X-Client-Id` header
    client_id: String,
    /// HTTP client
    http_client: reqwest::Client,
}

impl HttpApi {
    /// Create a client for `base`, identifying as `client_id`
    ///
    /// # Errors
    ///
    /// Returns [`WidgetError::InvalidUrl`] if `base` is not a URL, or a
    /// transport error if the HTTP client cannot be built.
    pub fn new(base: &str, client_id: impl Into<String>, timeout: Duration) -> WidgetResult<Self> {
        let base = normalize_api_base(base);
        reqwest::Url::parse(&base).map_err(|e| WidgetError::InvalidUrl(format!("{base}: {e}")))?;

        let http_client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            base,
            client_id: client_id.into(),
            http_client,
        })
    }

    /// Create a client from resolved settings
    ///
    /// # Errors
    ///
    /// See [`HttpApi::new`].
    pub fn from_settings(settings: &WidgetSettings, identity: &ClientIdentity) -> WidgetResult<Self> {
        Self::new(&settings.api_base, identity.as_str(), settings.request_timeout)
    }

    /// The client identity sent with every request
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    async fn send_once(
        &self,
        method: Method,
        url: &str,
        body: Option<&serde_json::Value>,
    ) -> WidgetResult<reqwest::Response> {
        let mut request = self
            .http_client
            .request(method, url)
            .header(CLIENT_ID_HEADER, &self.client_id);
        if let Some(body) = body {
            request = request.json(body);
        }
        Ok(request.send().await?)
    }

    /// Perform one API call with the fallback and error conventions
    ///
    /// Returns the body text, or `None` for an empty success.
    async fn call(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> WidgetResult<Option<String>> {
        let url = join_url(&self.base, path);
        let response = self.send_once(method.clone(), &url, body).await?;
        if response.status().is_success() {
            return read_body(response).await;
        }

        if response.status() == StatusCode::NOT_FOUND {
            if let Some(fallback) = api_fallback_url(&url) {
                tracing::debug!(url = %url, fallback = %fallback, "Got 404, retrying under /api");
                let retry = self.send_once(method, &fallback, body).await?;
                if retry.status().is_success() {
                    return read_body(retry).await;
                }
            }
        }

        Err(http_error(response).await)
    }

    async fn get<T: DeserializeOwned + Default>(&self, path: &str) -> WidgetResult<T> {
        decode(self.call(Method::GET, path, None).await?)
    }

    async fn send_json<B: serde::Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> WidgetResult<Option<String>> {
        let body = serde_json::to_value(body)?;
        self.call(method, path, Some(&body)).await
    }
}

#[async_trait]
impl WidgetApi for HttpApi {
    fn name(&self) -> &str {
        "http"
    }

    fn base_url(&self) -> &str {
        &self.base
    }

    async fn widget_config(&self) -> WidgetResult<WidgetConfig> {
        self.get("widget-config").await
    }

    async fn messaging_config(&self) -> WidgetResult<MessagingConfig> {
        self.get("messaging-config").await
    }

    async fn starter_questions(&self) -> WidgetResult<StarterQuestionConfig> {
        self.get("starter-questions").await
    }

    async fn messages(&self) -> WidgetResult<Vec<TranscriptEntry>> {
        let response: TranscriptResponse = self.get("messages").await?;
        Ok(response.into_entries())
    }

    async fn chat(&self, request: &ChatRequest) -> WidgetResult<ChatReply> {
        decode(self.send_json(Method::POST, "chat", request).await?)
    }

    async fn submit_form(&self, values: &FormValues) -> WidgetResult<()> {
        self.send_json(Method::POST, "form/submit", values).await?;
        Ok(())
    }

    async fn probe_avatar(&self, url: &str) -> WidgetResult<()> {
        let response = self.http_client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(http_error(response).await);
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_ascii_lowercase);
        match content_type {
            Some(ct) if !ct.starts_with("image/") => Err(WidgetError::Http {
                status: status.as_u16(),
                body: format!("not an image ({ct})"),
            }),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl AdminApi for HttpApi {
    async fn save_widget_config(&self, config: &WidgetConfig) -> WidgetResult<()> {
        self.send_json(Method::POST, "widget-config", config).await?;
        Ok(())
    }

    async fn save_messaging_config(&self, config: &MessagingConfig) -> WidgetResult<()> {
        self.send_json(Method::PUT, "messaging-config", config).await?;
        Ok(())
    }

    async fn save_starter_questions(&self, config: &StarterQuestionConfig) -> WidgetResult<()> {
        self.send_json(Method::PUT, "starter-questions", config).await?;
        Ok(())
    }
}

async fn read_body(response: reqwest::Response) -> WidgetResult<Option<String>> {
    if response.status() == StatusCode::NO_CONTENT {
        return Ok(None);
    }
    let text = response.text().await?;
    Ok(if text.trim().is_empty() { None } else { Some(text) })
}

async fn http_error(response: reqwest::Response) -> WidgetError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    WidgetError::Http { status, body }
}

fn decode<T: DeserializeOwned + Default>(body: Option<String>) -> WidgetResult<T> {
    match body {
        None => Ok(T::default()),
        Some(text) => Ok(serde_json::from_str(&text)?),
    }
}

/// Join `path` onto `base`, with exactly one `/` between them
#[must_use]
pub fn join_url(base: &str, path: &str) -> String {
    if base.is_empty() {
        return path.to_string();
    }
    let path = path.trim_start_matches('/');
    if base.ends_with('/') {
        format!("{base}{path}")
    } else {
        format!("{base}/{path}")
    }
}

/// The `/api`-prefixed retry URL for `url`, if it has no `/api/` segment
#[must_use]
pub fn api_fallback_url(url: &str) -> Option<String> {
    if url.contains("/api/") {
        return None;
    }
    let parsed = reqwest::Url::parse(url).ok()?;
    let origin = parsed.origin().ascii_serialization();

    let mut rest = parsed.path().to_string();
    if let Some(query) = parsed.query() {
        rest.push('?');
        rest.push_str(query);
    }
    Some(format!("{origin}/api{rest}"))
}

/// Resolve a configured avatar URL against the API base
///
/// Absolute `http(s)` URLs are used as-is; anything else (a `/path` or a
/// bare relative path) is joined onto the base.
#[must_use]
pub fn resolve_avatar_url(base: &str, raw: &str) -> String {
    let lower = raw.trim().to_ascii_lowercase();
    let absolute = lower.starts_with("http:") || lower.starts_with("https:");
    if raw.starts_with('/') || !absolute {
        join_url(base, raw.trim())
    } else {
        raw.trim().to_string()
    }
}
