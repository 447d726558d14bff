use crate::config::BackendConfig;
use crate::api::error::ApiError;
use color_eyre::{eyre::eyre, Result};
use reqwest::Method;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Backend REST client wrapper
#[derive(Clone)]
pub struct ApiClient {
  http: reqwest::Client,
  base: Url,
  token: Option<String>,
}

impl ApiClient {
  pub fn new(config: &BackendConfig, token: Option<String>) -> Result<Self> {
    let mut base =
      Url::parse(&config.url).map_err(|e| eyre!("Invalid backend URL {}: {}", config.url, e))?;
    if base.cannot_be_a_base() {
      return Err(eyre!("Backend URL {} cannot be used as a base", config.url));
    }
    // Url::join and path_segments_mut treat the last segment as a directory only with a slash
    if !base.path().ends_with('/') {
      let path = format!("{}/", base.path());
      base.set_path(&path);
    }

    let http = reqwest::Client::builder()
      .timeout(Duration::from_secs(config.timeout_secs))
      .user_agent(concat!("hwdash/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self { http, base, token })
  }

  pub fn base_url(&self) -> &Url {
    &self.base
  }

  /// Build the URL for a path below the base. Each segment is percent-encoded.
  pub fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
    let mut url = self.base.clone();
    url
      .path_segments_mut()
      .map_err(|_| ApiError::Endpoint {
        path: segments.join("/"),
        message: "base URL cannot have path segments".to_string(),
      })?
      .pop_if_empty()
      .extend(segments);
    Ok(url)
  }

  /// GET a JSON document
  pub async fn get_json(&self, segments: &[&str], query: &[(String, String)]) -> Result<Value, ApiError> {
    self.send(Method::GET, segments, query, None).await
  }

  /// POST a JSON body, returning the backend's JSON answer
  pub async fn post_json(&self, segments: &[&str], body: &Value) -> Result<Value, ApiError> {
    self.send(Method::POST, segments, &[], Some(body)).await
  }

  /// PUT a JSON body, returning the backend's JSON answer
  pub async fn put_json(&self, segments: &[&str], body: &Value) -> Result<Value, ApiError> {
    self.send(Method::PUT, segments, &[], Some(body)).await
  }

  pub async fn delete(&self, segments: &[&str]) -> Result<(), ApiError> {
    self.send(Method::DELETE, segments, &[], None).await?;
    Ok(())
  }

  async fn send(
    &self,
    method: Method,
    segments: &[&str],
    query: &[(String, String)],
    body: Option<&Value>,
  ) -> Result<Value, ApiError> {
    let url = self.endpoint(segments)?;

    let mut request = self.http.request(method.clone(), url.clone());
    if !query.is_empty() {
      request = request.query(query);
    }
    if let Some(token) = &self.token {
      request = request.bearer_auth(token);
    }
    if let Some(body) = body {
      request = request.json(body);
    }

    debug!(%method, %url, "sending request");

    let response = request
      .send()
      .await
      .map_err(|e| ApiError::transport(&method, &url, e))?;
    let status = response.status();
    let text = response
      .text()
      .await
      .map_err(|e| ApiError::transport(&method, &url, e))?;

    if !status.is_success() {
      return Err(ApiError::status(&method, &url, status, &text));
    }

    // 204 and friends
    if text.trim().is_empty() {
      return Ok(Value::Null);
    }

    serde_json::from_str(&text).map_err(|e| ApiError::Decode {
      url: url.to_string(),
      message: e.to_string(),
    })
  }
}
