//! Cache keys for backend reads.
//!
//! Keys are readable strings so that every cached variant of an endpoint can be dropped with
//! a prefix: `orders::all`, `orders::id=42`, `orders/by-company::company=acme`,
//! `orders/search::<sha256>`.

use sha2::{Digest, Sha256};

/// Query key types for backend reads.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QueryKey {
  /// The full collection
  All,
  /// A single record
  ById { id: String },
  /// Records belonging to one customer company
  ByCompany { company: String },
  /// Filtered collection; parameters are normalized on construction
  Search { params: Vec<(String, String)> },
}

impl QueryKey {
  pub fn by_id(id: impl Into<String>) -> Self {
    Self::ById { id: id.into() }
  }

  pub fn by_company(company: impl Into<String>) -> Self {
    Self::ByCompany {
      company: company.into(),
    }
  }

  pub fn search(params: &[(String, String)]) -> Self {
    Self::Search {
      params: normalize_params(params),
    }
  }

  /// Cache key for this query against the resource at `path`.
  pub fn cache_key(&self, path: &str) -> String {
    match self {
      Self::All => format!("{}::all", path),
      Self::ById { id } => format!("{}::id={}", path, id),
      Self::ByCompany { company } => format!("{}/by-company::company={}", path, company),
      Self::Search { params } => format!("{}/search::{}", path, params_hash(params)),
    }
  }

  /// Human readable description for logs
  pub fn description(&self, path: &str) -> String {
    match self {
      Self::All => format!("all {}", path),
      Self::ById { id } => format!("{} {}", path, id),
      Self::ByCompany { company } => format!("{} for company {}", path, company),
      Self::Search { params } => {
        let filters: Vec<String> = params.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        format!("{} matching {}", path, filters.join(", "))
      }
    }
  }
}

/// Prefixes covering every cached read of the resource at `path`.
pub fn resource_prefixes(path: &str) -> [String; 2] {
  [format!("{}::", path), format!("{}/", path)]
}

/// Trim, drop empty values and sort, so equivalent searches share a key.
fn normalize_params(params: &[(String, String)]) -> Vec<(String, String)> {
  let mut normalized: Vec<(String, String)> = params
    .iter()
    .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
    .filter(|(k, v)| !k.is_empty() && !v.is_empty())
    .collect();
  normalized.sort();
  normalized.dedup();
  normalized
}

/// SHA256 over the encoded parameters for stable, fixed-length keys.
fn params_hash(params: &[(String, String)]) -> String {
  let encoded = url::form_urlencoded::Serializer::new(String::new())
    .extend_pairs(params)
    .finish();

  let mut hasher = Sha256::new();
  hasher.update(encoded.as_bytes());
  hex::encode(hasher.finalize())
}
