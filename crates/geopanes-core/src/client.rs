//! HTTP client for the remote content source and settings store.

use crate::api::{
    parse_bool_preference, ErrorResponse, HttpMethod, PanelRequest, SaveSettingRequest,
    SettingResponse, SettingsCategoryResponse, OPEN_IN_ACTIVE_STACK_KEY,
};
use crate::panel::PanelContent;

use anyhow::{Context, Result};
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use serde_json::{Map, Value};
use std::time::Duration;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Join a base URL and an absolute path without doubling the slash.
pub fn join_url(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// Whether a Content-Type header value denotes a JSON payload.
pub fn is_json_content_type(content_type: &str) -> bool {
    let mime = content_type.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
    mime == "application/json" || mime.ends_with("+json")
}

/// Turn a non-2xx response into an error, preferring the backend's message.
async fn error_for_status(url: &str, resp: reqwest::Response) -> anyhow::Error {
    let status = resp.status();
    let text = resp.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<ErrorResponse>(&text)
        .map(|e| e.error)
        .unwrap_or(text);
    let detail = detail.trim();
    if detail.is_empty() {
        anyhow::anyhow!("{} returned HTTP {}", url, status)
    } else {
        anyhow::anyhow!("{} returned HTTP {}: {}", url, status, detail)
    }
}

/// Fetches panel content (HTML fragments or JSON) from the backend.
#[derive(Clone, Debug)]
pub struct ContentClient {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl ContentClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Issue a panel request. Non-2xx responses come back as errors.
    pub async fn fetch(&self, request: PanelRequest) -> Result<PanelContent> {
        let url = join_url(&self.base_url, &request.path);
        let builder = match request.method {
            HttpMethod::Get => self.http.get(&url),
            HttpMethod::Post => self.http.post(&url),
        };
        let builder = match request.body {
            Some(ref body) => builder.json(body),
            None => builder,
        };

        log::debug!("Fetching panel content from {}", url);
        let resp = builder
            .timeout(self.timeout)
            .send()
            .await
            .with_context(|| format!("Cannot reach {}", url))?;

        if !resp.status().is_success() {
            return Err(error_for_status(&url, resp).await);
        }

        let is_json = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map_or(false, is_json_content_type);

        if is_json {
            let value: Value = resp
                .json()
                .await
                .with_context(|| format!("Invalid JSON from {}", url))?;
            Ok(PanelContent::Json(value))
        } else {
            let html = resp
                .text()
                .await
                .with_context(|| format!("Failed to read body from {}", url))?;
            Ok(PanelContent::Html(html))
        }
    }
}

/// Reads and writes preferences in the backend's settings store.
#[derive(Clone, Debug)]
pub struct SettingsClient {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl SettingsClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Get one setting by key. A 404 means "not set" and yields None.
    pub async fn get_setting(&self, key: &str) -> Result<Option<Value>> {
        let url = join_url(
            &self.base_url,
            &format!("/api/settings/{}", crate::api::encode_segment(key)),
        );
        let resp = self
            .http
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .with_context(|| format!("Cannot reach {}", url))?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(error_for_status(&url, resp).await);
        }
        let setting: SettingResponse = resp.json().await.context("Invalid setting response")?;
        Ok(Some(setting.value))
    }

    /// Get every setting in a category.
    pub async fn get_category(&self, category: &str) -> Result<Map<String, Value>> {
        let url = join_url(&self.base_url, "/api/settings");
        let resp = self
            .http
            .get(&url)
            .query(&[("category", category)])
            .timeout(self.timeout)
            .send()
            .await
            .with_context(|| format!("Cannot reach {}", url))?;

        if !resp.status().is_success() {
            return Err(error_for_status(&url, resp).await);
        }
        let parsed: SettingsCategoryResponse =
            resp.json().await.context("Invalid settings category response")?;
        Ok(parsed.settings)
    }

    pub async fn save_setting(&self, key: &str, value: Value) -> Result<()> {
        let url = join_url(&self.base_url, "/api/settings");
        let body = SaveSettingRequest { key: key.to_string(), value };
        let resp = self
            .http
            .post(&url)
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await
            .with_context(|| format!("Cannot reach {}", url))?;

        if !resp.status().is_success() {
            return Err(error_for_status(&url, resp).await);
        }
        Ok(())
    }

    /// The "open new panels in the active stack" preference, if the store has one.
    pub async fn open_in_active_stack(&self) -> Result<Option<bool>> {
        let value = self.get_setting(OPEN_IN_ACTIVE_STACK_KEY).await?;
        Ok(value.as_ref().and_then(parse_bool_preference))
    }
}
