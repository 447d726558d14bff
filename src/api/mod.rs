//! Distributor backend access: REST client, domain types and cached resource services.

pub mod api_types;
pub mod client;
pub mod error;
pub mod keys;
pub mod resource;
pub mod service;
pub mod types;

use serde_json::Value;
use std::sync::Arc;

use crate::cache::TtlCache;

pub use client::ApiClient;
pub use error::ApiError;
pub use service::CachedService;

/// Response cache shared by every resource service. Holds raw JSON; services decode into
/// their own types.
pub type ResponseCache = TtlCache<Arc<Value>, ApiError>;
