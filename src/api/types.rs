use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Customer company
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Company {
  pub id: String,
  pub name: String,
  #[serde(default)]
  pub vat_number: Option<String>,
  #[serde(default)]
  pub email: Option<String>,
  #[serde(default = "default_true")]
  pub active: bool,
}

/// Catalog product
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
  pub id: String,
  pub sku: String,
  pub name: String,
  #[serde(default)]
  pub brand: Option<String>,
  #[serde(default)]
  pub category: Option<String>,
  #[serde(default)]
  pub price: f64,
  #[serde(default)]
  pub stock: i64,
}

/// Hardware held by a customer company (serials under contract, leased units, ...)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyInventory {
  pub id: String,
  pub company_id: String,
  pub product_id: String,
  #[serde(default)]
  pub serial_number: Option<String>,
  #[serde(default = "default_quantity")]
  pub quantity: u32,
  #[serde(default)]
  pub location: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
  Draft,
  Pending,
  Confirmed,
  Shipped,
  Delivered,
  Cancelled,
  #[serde(other)]
  Unknown,
}

impl OrderStatus {
  /// Still waiting on the distributor
  pub fn is_open(self) -> bool {
    matches!(self, Self::Draft | Self::Pending | Self::Confirmed)
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
  pub product_id: String,
  pub quantity: u32,
  #[serde(default)]
  pub unit_price: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
  pub id: String,
  pub company_id: String,
  pub status: OrderStatus,
  #[serde(default)]
  pub total: f64,
  #[serde(default = "default_currency")]
  pub currency: String,
  #[serde(default)]
  pub lines: Vec<OrderLine>,
  #[serde(default)]
  pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quotation {
  pub id: String,
  pub company_id: String,
  pub status: String,
  #[serde(default)]
  pub total: f64,
  #[serde(default)]
  pub valid_until: Option<NaiveDate>,
  #[serde(default)]
  pub lines: Vec<OrderLine>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
  pub id: String,
  pub order_id: String,
  pub company_id: String,
  pub amount: f64,
  #[serde(default)]
  pub method: Option<String>,
  pub status: String,
  #[serde(default)]
  pub paid_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shipping {
  pub id: String,
  pub order_id: String,
  pub company_id: String,
  #[serde(default)]
  pub carrier: Option<String>,
  #[serde(default)]
  pub tracking_number: Option<String>,
  pub status: String,
  #[serde(default)]
  pub shipped_at: Option<DateTime<Utc>>,
}

/// Return merchandise authorization
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rma {
  pub id: String,
  pub order_id: String,
  pub company_id: String,
  #[serde(default)]
  pub reason: Option<String>,
  pub status: String,
}

/// Admin or customer account
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
  pub id: String,
  pub email: String,
  #[serde(default)]
  pub name: Option<String>,
  pub role: String,
  #[serde(default)]
  pub company_id: Option<String>,
}

fn default_true() -> bool {
  true
}

fn default_quantity() -> u32 {
  1
}

fn default_currency() -> String {
  "EUR".to_string()
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_order_from_backend_json() {
    let order: Order = serde_json::from_value(json!({
      "id": "o-1",
      "companyId": "acme",
      "status": "confirmed",
      "total": 1299.5,
      "lines": [{ "productId": "p-1", "quantity": 2, "unitPrice": 649.75 }],
      "createdAt": "2024-03-01T10:00:00Z"
    }))
    .unwrap();

    assert_eq!(order.status, OrderStatus::Confirmed);
    assert!(order.status.is_open());
    assert_eq!(order.currency, "EUR");
    assert_eq!(order.lines[0].quantity, 2);
    assert!(order.created_at.is_some());
  }

  #[test]
  fn test_unknown_order_status() {
    let order: Order = serde_json::from_value(json!({
      "id": "o-2",
      "companyId": "acme",
      "status": "on_hold_by_finance"
    }))
    .unwrap();

    assert_eq!(order.status, OrderStatus::Unknown);
    assert!(!order.status.is_open());
  }

  #[test]
  fn test_inventory_defaults() {
    let item: CompanyInventory = serde_json::from_value(json!({
      "id": "i-1",
      "companyId": "acme",
      "productId": "p-1"
    }))
    .unwrap();

    assert_eq!(item.quantity, 1);
    assert!(item.serial_number.is_none());
  }
}
