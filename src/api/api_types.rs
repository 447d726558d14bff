//! Shapes of backend responses that differ from the domain types.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

/// A list endpoint answers with either a bare array or a `{"data": [...]}` envelope.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ListResponse<T> {
  Bare(Vec<T>),
  Wrapped { data: Vec<T> },
}

impl<T> ListResponse<T> {
  pub fn into_vec(self) -> Vec<T> {
    match self {
      Self::Bare(items) | Self::Wrapped { data: items } => items,
    }
  }
}

/// A single-item endpoint answers with either the item or a `{"data": {...}}` envelope.
pub fn unwrap_item(value: &Value) -> &Value {
  match value.get("data") {
    Some(inner) if inner.is_object() => inner,
    _ => value,
  }
}

/// Decode a cached list payload.
pub fn decode_list<T: DeserializeOwned>(value: &Value) -> serde_json::Result<Vec<T>> {
  ListResponse::<T>::deserialize(value).map(ListResponse::into_vec)
}

/// Decode a cached single-item payload.
pub fn decode_item<T: DeserializeOwned>(value: &Value) -> serde_json::Result<T> {
  T::deserialize(unwrap_item(value))
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[derive(Debug, Deserialize, PartialEq)]
  struct Item {
    id: u32,
  }

  #[test]
  fn test_bare_list() {
    let items: Vec<Item> = decode_list(&json!([{ "id": 1 }, { "id": 2 }])).unwrap();
    assert_eq!(items, vec![Item { id: 1 }, Item { id: 2 }]);
  }

  #[test]
  fn test_wrapped_list() {
    let items: Vec<Item> = decode_list(&json!({ "data": [{ "id": 3 }], "total": 1 })).unwrap();
    assert_eq!(items, vec![Item { id: 3 }]);
  }

  #[test]
  fn test_item_envelope() {
    let item: Item = decode_item(&json!({ "data": { "id": 4 } })).unwrap();
    assert_eq!(item, Item { id: 4 });

    let item: Item = decode_item(&json!({ "id": 5 })).unwrap();
    assert_eq!(item, Item { id: 5 });
  }

  #[test]
  fn test_list_rejects_garbage() {
    assert!(decode_list::<Item>(&json!("nope")).is_err());
    // An error body served with 200 must not pass as an empty list
    assert!(decode_list::<Item>(&json!({ "message": "Unauthorized", "statusCode": 401 })).is_err());
    assert!(decode_list::<Item>(&json!({})).is_err());
  }
}
