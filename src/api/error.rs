use reqwest::{Method, StatusCode};

/// Failure talking to the backend.
///
/// Cloneable so that one failed request can be handed to every caller waiting on it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
  #[error("invalid endpoint `{path}`: {message}")]
  Endpoint { path: String, message: String },

  #[error("{method} {url} failed: {message}")]
  Transport {
    method: String,
    url: String,
    message: String,
  },

  #[error("{method} {url} returned {status}: {body}")]
  Status {
    method: String,
    url: String,
    status: u16,
    body: String,
  },

  #[error("failed to decode response from {url}: {message}")]
  Decode { url: String, message: String },
}

/// Longest response body kept in a status error.
const MAX_BODY_EXCERPT: usize = 512;

impl ApiError {
  pub(crate) fn transport(method: &Method, url: &url::Url, err: reqwest::Error) -> Self {
    Self::Transport {
      method: method.to_string(),
      url: url.to_string(),
      message: err.to_string(),
    }
  }

  pub(crate) fn status(method: &Method, url: &url::Url, status: StatusCode, body: &str) -> Self {
    let body = match body.char_indices().nth(MAX_BODY_EXCERPT) {
      Some((cut, _)) => format!("{}…", &body[..cut]),
      None => body.to_string(),
    };

    Self::Status {
      method: method.to_string(),
      url: url.to_string(),
      status: status.as_u16(),
      body,
    }
  }

  /// HTTP status code, if the backend answered at all.
  pub fn status_code(&self) -> Option<u16> {
    match self {
      Self::Status { status, .. } => Some(*status),
      _ => None,
    }
  }

  pub fn is_not_found(&self) -> bool {
    self.status_code() == Some(404)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_status_body_is_truncated() {
    let url = url::Url::parse("http://localhost/orders").unwrap();
    let body = "x".repeat(MAX_BODY_EXCERPT + 100);

    let err = ApiError::status(&Method::GET, &url, StatusCode::BAD_GATEWAY, &body);

    match &err {
      ApiError::Status { body, status, .. } => {
        assert_eq!(*status, 502);
        assert_eq!(body.chars().count(), MAX_BODY_EXCERPT + 1);
      }
      other => panic!("unexpected error: {other:?}"),
    }
    assert!(!err.is_not_found());
  }

  #[test]
  fn test_not_found() {
    let url = url::Url::parse("http://localhost/orders/9").unwrap();
    let err = ApiError::status(&Method::GET, &url, StatusCode::NOT_FOUND, "");

    assert!(err.is_not_found());
    assert_eq!(err.to_string(), "GET http://localhost/orders/9 returned 404: ");
  }
}
