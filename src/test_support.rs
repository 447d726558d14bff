//! Helpers for tests that talk HTTP.
//!
//! When using [`TestServer`], hold on to it until all requests have been made. Dropping it
//! aborts the server task.

use axum::extract::Request;
use axum::middleware::{self, Next};
use axum::Router;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;

/// Capture logs from this crate through the test writer.
pub fn setup() {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::new("hwdash=trace"))
    .with_target(false)
    .with_test_writer()
    .try_init()
    .ok();
}

/// Backend stand-in bound to an ephemeral local port. Counts requests per `METHOD /path`.
pub struct TestServer {
  handle: JoinHandle<()>,
  addr: SocketAddr,
  hits: Arc<Mutex<BTreeMap<String, usize>>>,
}

impl TestServer {
  pub async fn start(router: Router) -> Self {
    let hits = Arc::new(Mutex::new(BTreeMap::new()));
    let counter = hits.clone();

    let router = router.layer(middleware::from_fn(move |req: Request, next: Next| {
      let counter = counter.clone();
      async move {
        let key = format!("{} {}", req.method(), req.uri().path());
        *counter.lock().unwrap().entry(key).or_insert(0) += 1;
        next.run(req).await
      }
    }));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
      axum::serve(listener, router).await.unwrap();
    });

    Self { handle, addr, hits }
  }

  /// Base URL the client should be configured with.
  pub fn base_url(&self) -> String {
    format!("http://{}/api/", self.addr)
  }

  pub fn hits(&self, key: &str) -> usize {
    self.hits.lock().unwrap().get(key).copied().unwrap_or(0)
  }
}

impl Drop for TestServer {
  fn drop(&mut self) {
    self.handle.abort();
  }
}
