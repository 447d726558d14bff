//! Backend resource access with transparent caching.

use color_eyre::{eyre::eyre, Result};
use futures::future::BoxFuture;
use serde::Serialize;
use serde_json::Value;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::api_types::{decode_item, decode_list};
use super::client::ApiClient;
use super::error::ApiError;
use super::keys::{resource_prefixes, QueryKey};
use super::resource::Resource;
use super::ResponseCache;

/// Client for one backend resource with transparent caching.
///
/// Reads go through the shared response cache; concurrent identical reads share one request.
/// Every successful mutation drops the cached reads of this resource and of its dependents.
pub struct CachedService<R: Resource> {
  client: ApiClient,
  cache: ResponseCache,
  ttl: Duration,
  _resource: PhantomData<fn() -> R>,
}

impl<R: Resource> CachedService<R> {
  pub fn new(client: ApiClient, cache: ResponseCache, ttl: Duration) -> Self {
    Self {
      client,
      cache,
      ttl,
      _resource: PhantomData,
    }
  }

  pub fn ttl(&self) -> Duration {
    self.ttl
  }

  /// The whole collection.
  pub async fn list(&self) -> Result<Vec<R::Model>> {
    self.read_list(QueryKey::All, false).await
  }

  /// The whole collection, bypassing any cached copy.
  pub async fn refresh_list(&self) -> Result<Vec<R::Model>> {
    self.read_list(QueryKey::All, true).await
  }

  /// Records belonging to one customer company.
  pub async fn list_by_company(&self, company: &str) -> Result<Vec<R::Model>> {
    self.read_list(QueryKey::by_company(company), false).await
  }

  /// Records belonging to one customer company, bypassing any cached copy.
  pub async fn refresh_by_company(&self, company: &str) -> Result<Vec<R::Model>> {
    self.read_list(QueryKey::by_company(company), true).await
  }

  /// Filtered collection. Parameter order and surrounding whitespace do not matter.
  pub async fn search(&self, params: &[(String, String)]) -> Result<Vec<R::Model>> {
    self.read_list(QueryKey::search(params), false).await
  }

  /// A single record.
  pub async fn get(&self, id: &str) -> Result<R::Model> {
    let key = QueryKey::by_id(id);
    let value = match self.fetch(&key, false).await {
      Ok(value) => value,
      Err(e) if e.is_not_found() => return Err(eyre!("{} {} not found", R::PATH, id)),
      Err(e) => return Err(eyre!("Failed to load {}: {}", key.description(R::PATH), e)),
    };

    decode_item(&value)
      .map_err(|e| eyre!("Failed to parse {}: {}", key.description(R::PATH), e))
  }

  /// Create a record. Returns the created record if the backend echoes it.
  pub async fn create<T: Serialize>(&self, draft: &T) -> Result<Option<R::Model>> {
    let body = serde_json::to_value(draft)
      .map_err(|e| eyre!("Failed to serialize new {} record: {}", R::PATH, e))?;

    let created = self
      .client
      .post_json(&[R::PATH], &body)
      .await
      .map_err(|e| eyre!("Failed to create {} record: {}", R::PATH, e))?;
    self.invalidate();

    self.decode_echo(created)
  }

  /// Replace a record. Returns the updated record if the backend echoes it.
  pub async fn update<T: Serialize>(&self, id: &str, changes: &T) -> Result<Option<R::Model>> {
    let body = serde_json::to_value(changes)
      .map_err(|e| eyre!("Failed to serialize {} {}: {}", R::PATH, id, e))?;

    let updated = self
      .client
      .put_json(&[R::PATH, id], &body)
      .await
      .map_err(|e| eyre!("Failed to update {} {}: {}", R::PATH, id, e))?;
    self.invalidate();

    self.decode_echo(updated)
  }

  pub async fn delete(&self, id: &str) -> Result<()> {
    self
      .client
      .delete(&[R::PATH, id])
      .await
      .map_err(|e| eyre!("Failed to delete {} {}: {}", R::PATH, id, e))?;
    self.invalidate();

    Ok(())
  }

  /// Drop every cached read of this resource and of the resources depending on it.
  /// Returns how many cache entries were removed.
  pub fn invalidate(&self) -> usize {
    let removed: usize = std::iter::once(R::PATH)
      .chain(R::DEPENDENTS.iter().copied())
      .flat_map(resource_prefixes)
      .map(|prefix| self.cache.invalidate_prefix(&prefix))
      .sum();

    debug!(resource = R::PATH, removed, "invalidated cached reads");
    removed
  }

  async fn read_list(&self, key: QueryKey, refresh: bool) -> Result<Vec<R::Model>> {
    let value = self.read(&key, refresh).await?;

    decode_list(&value).map_err(|e| eyre!("Failed to parse {}: {}", key.description(R::PATH), e))
  }

  async fn read(&self, key: &QueryKey, refresh: bool) -> Result<Arc<Value>> {
    self
      .fetch(key, refresh)
      .await
      .map_err(|e| eyre!("Failed to load {}: {}", key.description(R::PATH), e))
  }

  /// Start (or join) the cached GET for `key`.
  fn fetch(&self, key: &QueryKey, refresh: bool) -> BoxFuture<'static, Result<Arc<Value>, ApiError>> {
    let cache_key = key.cache_key(R::PATH);
    let (segments, query) = request_for(R::PATH, key);
    let client = self.client.clone();

    let factory = move || async move {
      let segments: Vec<&str> = segments.iter().map(String::as_str).collect();
      client.get_json(&segments, &query).await.map(Arc::new)
    };

    if refresh {
      self.cache.refresh_with_ttl(&cache_key, self.ttl, factory)
    } else {
      self.cache.get_or_fetch_with_ttl(&cache_key, self.ttl, factory)
    }
  }

  fn decode_echo(&self, value: Value) -> Result<Option<R::Model>> {
    if value.is_null() {
      return Ok(None);
    }

    decode_item(&value)
      .map(Some)
      .map_err(|e| eyre!("Failed to parse {} record returned by backend: {}", R::PATH, e))
  }
}

impl<R: Resource> Clone for CachedService<R> {
  fn clone(&self) -> Self {
    Self {
      client: self.client.clone(),
      cache: self.cache.clone(),
      ttl: self.ttl,
      _resource: PhantomData,
    }
  }
}

/// Path segments and query string of the GET behind a query key.
fn request_for(path: &str, key: &QueryKey) -> (Vec<String>, Vec<(String, String)>) {
  match key {
    QueryKey::All => (vec![path.to_string()], Vec::new()),
    QueryKey::ById { id } => (vec![path.to_string(), id.clone()], Vec::new()),
    QueryKey::ByCompany { company } => (
      vec![path.to_string(), "by-company".to_string()],
      vec![("company".to_string(), company.clone())],
    ),
    QueryKey::Search { params } => (
      vec![path.to_string(), "search".to_string()],
      params.clone(),
    ),
  }
}
