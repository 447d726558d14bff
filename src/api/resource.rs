//! Backend resources and how they relate for cache invalidation.

use serde::{de::DeserializeOwned, Serialize};

use super::types::{
  Company, CompanyInventory, Order, Payment, Product, Quotation, Rma, Shipping, User,
};

/// A REST collection exposed by the backend.
pub trait Resource: Send + Sync + 'static {
  type Model: Serialize + DeserializeOwned + Clone + Send + Sync + 'static;

  /// Path below the backend base URL. Also the namespace of the resource's cache keys.
  const PATH: &'static str;

  /// Resources whose cached reads go stale when this one is mutated
  const DEPENDENTS: &'static [&'static str] = &[];
}

pub struct Products;
pub struct Companies;
pub struct CompanyInventories;
pub struct Orders;
pub struct Quotations;
pub struct Payments;
pub struct Shippings;
pub struct Rmas;
pub struct Users;

impl Resource for Products {
  type Model = Product;
  const PATH: &'static str = "products";
}

impl Resource for Companies {
  type Model = Company;
  const PATH: &'static str = "companies";
  // Removing a company removes its accounts and inventory
  const DEPENDENTS: &'static [&'static str] = &["users", "company-inventories"];
}

impl Resource for CompanyInventories {
  type Model = CompanyInventory;
  const PATH: &'static str = "company-inventories";
}

impl Resource for Orders {
  type Model = Order;
  const PATH: &'static str = "orders";
  // Delivered orders are booked into the customer's inventory
  const DEPENDENTS: &'static [&'static str] = &["company-inventories"];
}

impl Resource for Quotations {
  type Model = Quotation;
  const PATH: &'static str = "quotations";
  // Accepting a quotation creates an order
  const DEPENDENTS: &'static [&'static str] = &["orders"];
}

impl Resource for Payments {
  type Model = Payment;
  const PATH: &'static str = "payments";
  const DEPENDENTS: &'static [&'static str] = &["orders"];
}

impl Resource for Shippings {
  type Model = Shipping;
  const PATH: &'static str = "shippings";
  const DEPENDENTS: &'static [&'static str] = &["orders"];
}

impl Resource for Rmas {
  type Model = Rma;
  const PATH: &'static str = "rmas";
  const DEPENDENTS: &'static [&'static str] = &["orders", "company-inventories"];
}

impl Resource for Users {
  type Model = User;
  const PATH: &'static str = "users";
}
