use crate::api::resource::Resource;
use crate::api::{ApiClient, CachedService, ResponseCache};
use crate::cache::CacheStats;
use crate::config::{CacheConfig, Config};
use color_eyre::Result;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

/// Main application state
///
/// One response cache is shared by every resource service, so invalidation across resources
/// and request coalescing work regardless of which service issued a read.
pub struct App {
  /// Backend client
  client: ApiClient,

  /// Shared response cache
  cache: ResponseCache,

  /// Cache settings (per-resource TTLs)
  cache_config: CacheConfig,

  /// Background task evicting expired entries
  sweeper: Option<JoinHandle<()>>,
}

impl App {
  /// Must be called from within a Tokio runtime when the sweeper is enabled.
  pub fn new(config: &Config, token: Option<String>) -> Result<Self> {
    let client = ApiClient::new(&config.backend, token)?;
    let cache = ResponseCache::with_default_ttl(config.cache.default_ttl());

    let sweeper = config
      .cache
      .sweep_interval()
      .map(|period| spawn_sweeper(cache.clone(), period));

    info!(
      backend = %client.base_url(),
      default_ttl_secs = config.cache.default_ttl_secs,
      "hwdash started"
    );

    Ok(Self {
      client,
      cache,
      cache_config: config.cache.clone(),
      sweeper,
    })
  }

  /// Cached access to resource `R`, using its configured TTL.
  pub fn service<R: Resource>(&self) -> CachedService<R> {
    CachedService::new(
      self.client.clone(),
      self.cache.clone(),
      self.cache_config.ttl_for(R::PATH),
    )
  }

  #[allow(dead_code)]
  pub fn cache(&self) -> &ResponseCache {
    &self.cache
  }

  pub fn stats(&self) -> CacheStats {
    self.cache.stats()
  }
}

impl Drop for App {
  fn drop(&mut self) {
    if let Some(sweeper) = self.sweeper.take() {
      sweeper.abort();
    }
  }
}

fn spawn_sweeper(cache: ResponseCache, period: Duration) -> JoinHandle<()> {
  tokio::spawn(async move {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately
    interval.tick().await;

    loop {
      interval.tick().await;
      let removed = cache.purge_expired();
      if removed > 0 {
        debug!(removed, "swept expired cache entries");
      }
    }
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::resource::{Orders, Products};
  use crate::config::{BackendConfig, LoggingConfig};
  use serde_json::json;
  use std::collections::BTreeMap;
  use std::sync::Arc;

  fn config(sweep_interval_secs: u64) -> Config {
    Config {
      backend: BackendConfig {
        url: "http://127.0.0.1:9/api/".to_string(),
        timeout_secs: 5,
      },
      cache: CacheConfig {
        default_ttl_secs: 300,
        sweep_interval_secs,
        ttl_overrides: BTreeMap::from([("products".to_string(), 900)]),
      },
      logging: LoggingConfig::default(),
    }
  }

  #[tokio::test]
  async fn test_services_use_configured_ttls() {
    let app = App::new(&config(0), None).unwrap();

    assert_eq!(app.service::<Products>().ttl(), Duration::from_secs(900));
    assert_eq!(app.service::<Orders>().ttl(), Duration::from_secs(300));
    assert_eq!(app.cache().default_ttl(), Duration::from_secs(300));
  }

  #[tokio::test(start_paused = true)]
  async fn test_sweeper_purges_expired_entries() {
    let app = App::new(&config(1), None).unwrap();
    app
      .cache()
      .set_with_ttl("orders::all", Arc::new(json!([])), Duration::from_millis(500));
    app.cache().set("products::all", Arc::new(json!([])));

    tokio::time::sleep(Duration::from_secs(3)).await;

    let stats = app.stats();
    assert_eq!(stats.entries, 1);
    assert_eq!(stats.expired, 0);
  }

  #[tokio::test(start_paused = true)]
  async fn test_disabled_sweeper_leaves_expired_entries() {
    let app = App::new(&config(0), None).unwrap();
    app
      .cache()
      .set_with_ttl("orders::all", Arc::new(json!([])), Duration::from_millis(500));

    tokio::time::sleep(Duration::from_secs(3)).await;

    let stats = app.stats();
    assert_eq!(stats.entries, 1);
    assert_eq!(stats.expired, 1);
  }
}
