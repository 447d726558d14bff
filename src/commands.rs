//! Console subcommands, resource name lookup and the dashboard.

use crate::api::resource::{
  Companies, CompanyInventories, Orders, Payments, Products, Quotations, Resource, Rmas,
  Shippings, Users,
};
use crate::api::types::OrderStatus;
use crate::api::CachedService;
use crate::app::App;
use crate::cache::CacheStats;
use clap::Subcommand;
use color_eyre::{eyre::eyre, Result};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
  Products,
  Companies,
  CompanyInventories,
  Orders,
  Quotations,
  Payments,
  Shippings,
  Rmas,
  Users,
}

#[derive(Debug, Clone)]
pub struct ResourceName {
  pub name: &'static str,
  pub aliases: &'static [&'static str],
  pub description: &'static str,
  pub kind: ResourceKind,
}

/// All backend resources reachable from the console
pub const RESOURCES: &[ResourceName] = &[
  ResourceName {
    name: "products",
    aliases: &["p", "product", "catalog"],
    description: "Hardware catalog",
    kind: ResourceKind::Products,
  },
  ResourceName {
    name: "companies",
    aliases: &["c", "company", "customers"],
    description: "Customer companies",
    kind: ResourceKind::Companies,
  },
  ResourceName {
    name: "company-inventories",
    aliases: &["inv", "inventory", "inventories"],
    description: "Hardware held by customers",
    kind: ResourceKind::CompanyInventories,
  },
  ResourceName {
    name: "orders",
    aliases: &["o", "order"],
    description: "Customer orders",
    kind: ResourceKind::Orders,
  },
  ResourceName {
    name: "quotations",
    aliases: &["q", "quote", "quotes", "quotation"],
    description: "Quotations sent to customers",
    kind: ResourceKind::Quotations,
  },
  ResourceName {
    name: "payments",
    aliases: &["pay", "payment"],
    description: "Payments received",
    kind: ResourceKind::Payments,
  },
  ResourceName {
    name: "shippings",
    aliases: &["s", "ship", "shipping", "shipments"],
    description: "Outgoing shipments",
    kind: ResourceKind::Shippings,
  },
  ResourceName {
    name: "rmas",
    aliases: &["r", "rma", "returns"],
    description: "Return merchandise authorizations",
    kind: ResourceKind::Rmas,
  },
  ResourceName {
    name: "users",
    aliases: &["u", "user", "accounts"],
    description: "Admin and customer accounts",
    kind: ResourceKind::Users,
  },
];

/// Get lookup suggestions for a given input
pub fn get_suggestions(input: &str) -> Vec<&'static ResourceName> {
  let input_lower = input.trim().to_lowercase();

  if input_lower.is_empty() {
    return RESOURCES.iter().collect();
  }

  let mut matches: Vec<(&ResourceName, u32)> = Vec::new();

  for res in RESOURCES {
    // Exact match on name
    if res.name == input_lower {
      matches.push((res, 0)); // Highest priority
      continue;
    }

    // Exact match on alias
    if res.aliases.contains(&input_lower.as_str()) {
      matches.push((res, 1));
      continue;
    }

    // Prefix match on name
    if res.name.starts_with(&input_lower) {
      matches.push((res, 2));
      continue;
    }

    // Prefix match on alias
    if res.aliases.iter().any(|a| a.starts_with(&input_lower)) {
      matches.push((res, 3));
      continue;
    }

    // Fuzzy match (contains)
    if res.name.contains(&input_lower) {
      matches.push((res, 4));
    }
  }

  // Sort by priority
  matches.sort_by_key(|(_, priority)| *priority);

  matches.into_iter().map(|(res, _)| res).collect()
}

/// Resolve a resource name, alias or unambiguous prefix.
pub fn parse_resource(input: &str) -> Result<ResourceKind, String> {
  let input_lower = input.trim().to_lowercase();
  let suggestions = get_suggestions(&input_lower);

  let exact = suggestions
    .iter()
    .find(|res| res.name == input_lower || res.aliases.contains(&input_lower.as_str()));
  if let Some(res) = exact {
    return Ok(res.kind);
  }

  match suggestions.as_slice() {
    [only] => Ok(only.kind),
    [] => Err(format!(
      "unknown resource '{}', expected one of:\n{}",
      input,
      RESOURCES
        .iter()
        .map(|r| format!("  {:<20} {}", r.name, r.description))
        .collect::<Vec<_>>()
        .join("\n")
    )),
    many => Err(format!(
      "ambiguous resource '{}' (did you mean {}?)",
      input,
      many.iter().map(|r| r.name).collect::<Vec<_>>().join(" or ")
    )),
  }
}

/// Parse a `key=value` search parameter.
pub fn parse_param(input: &str) -> Result<(String, String), String> {
  let (key, value) = input
    .split_once('=')
    .ok_or_else(|| format!("invalid parameter '{}', expected key=value", input))?;
  if key.trim().is_empty() {
    return Err(format!("invalid parameter '{}', empty key", input));
  }
  Ok((key.trim().to_string(), value.to_string()))
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
  /// List a collection
  List {
    #[arg(value_parser = parse_resource)]
    resource: ResourceKind,
    /// Only records belonging to this company
    #[arg(long)]
    company: Option<String>,
    /// Bypass the cache
    #[arg(long)]
    refresh: bool,
  },
  /// Show one record
  Get {
    #[arg(value_parser = parse_resource)]
    resource: ResourceKind,
    id: String,
  },
  /// Filter a collection
  Search {
    #[arg(value_parser = parse_resource)]
    resource: ResourceKind,
    /// Filter as key=value, repeatable
    #[arg(long = "param", value_parser = parse_param)]
    params: Vec<(String, String)>,
  },
  /// Create a record from a JSON file
  Create {
    #[arg(value_parser = parse_resource)]
    resource: ResourceKind,
    #[arg(long)]
    file: PathBuf,
  },
  /// Replace a record with the contents of a JSON file
  Update {
    #[arg(value_parser = parse_resource)]
    resource: ResourceKind,
    id: String,
    #[arg(long)]
    file: PathBuf,
  },
  /// Delete a record
  Delete {
    #[arg(value_parser = parse_resource)]
    resource: ResourceKind,
    id: String,
  },
  /// Order, customer and shipping overview
  Dashboard {
    /// Include the inventory of this company
    #[arg(long)]
    company: Option<String>,
  },
}

/// What to do with a single resource
#[derive(Debug, Clone)]
enum Action {
  List {
    company: Option<String>,
    refresh: bool,
  },
  Get(String),
  Search(Vec<(String, String)>),
  Create(Value),
  Update(String, Value),
  Delete(String),
}

/// Run a command and print its result as pretty JSON.
pub async fn run(app: &App, command: Command, out: &mut impl Write) -> Result<()> {
  let output = match command {
    Command::Dashboard { company } => {
      serde_json::to_value(dashboard(app, company.as_deref()).await?)?
    }
    Command::List {
      resource,
      company,
      refresh,
    } => run_resource(app, resource, Action::List { company, refresh }).await?,
    Command::Get { resource, id } => run_resource(app, resource, Action::Get(id)).await?,
    Command::Search { resource, params } => {
      run_resource(app, resource, Action::Search(params)).await?
    }
    Command::Create { resource, file } => {
      run_resource(app, resource, Action::Create(read_json(&file)?)).await?
    }
    Command::Update { resource, id, file } => {
      run_resource(app, resource, Action::Update(id, read_json(&file)?)).await?
    }
    Command::Delete { resource, id } => run_resource(app, resource, Action::Delete(id)).await?,
  };

  serde_json::to_writer_pretty(&mut *out, &output)?;
  writeln!(out)?;
  Ok(())
}

async fn run_resource(app: &App, kind: ResourceKind, action: Action) -> Result<Value> {
  match kind {
    ResourceKind::Products => run_action(app.service::<Products>(), action).await,
    ResourceKind::Companies => run_action(app.service::<Companies>(), action).await,
    ResourceKind::CompanyInventories => {
      run_action(app.service::<CompanyInventories>(), action).await
    }
    ResourceKind::Orders => run_action(app.service::<Orders>(), action).await,
    ResourceKind::Quotations => run_action(app.service::<Quotations>(), action).await,
    ResourceKind::Payments => run_action(app.service::<Payments>(), action).await,
    ResourceKind::Shippings => run_action(app.service::<Shippings>(), action).await,
    ResourceKind::Rmas => run_action(app.service::<Rmas>(), action).await,
    ResourceKind::Users => run_action(app.service::<Users>(), action).await,
  }
}

async fn run_action<R: Resource>(service: CachedService<R>, action: Action) -> Result<Value> {
  debug!(resource = R::PATH, ttl_secs = service.ttl().as_secs(), ?action, "running command");

  let value = match action {
    Action::List {
      company: Some(company),
      refresh,
    } => {
      let records = if refresh {
        service.refresh_by_company(&company).await?
      } else {
        service.list_by_company(&company).await?
      };
      serde_json::to_value(records)?
    }
    Action::List {
      company: None,
      refresh,
    } => {
      let records = if refresh {
        service.refresh_list().await?
      } else {
        service.list().await?
      };
      serde_json::to_value(records)?
    }
    Action::Get(id) => serde_json::to_value(service.get(&id).await?)?,
    Action::Search(params) => serde_json::to_value(service.search(&params).await?)?,
    Action::Create(body) => {
      let created = service.create(&body).await?;
      info!(resource = R::PATH, "created record");
      serde_json::to_value(created)?
    }
    Action::Update(id, body) => {
      let updated = service.update(&id, &body).await?;
      info!(resource = R::PATH, id = %id, "updated record");
      serde_json::to_value(updated)?
    }
    Action::Delete(id) => {
      service.delete(&id).await?;
      info!(resource = R::PATH, id = %id, "deleted record");
      serde_json::json!({ "deleted": id })
    }
  };

  Ok(value)
}

fn read_json(path: &Path) -> Result<Value> {
  let contents = std::fs::read_to_string(path)
    .map_err(|e| eyre!("Failed to read {}: {}", path.display(), e))?;

  serde_json::from_str(&contents).map_err(|e| eyre!("Invalid JSON in {}: {}", path.display(), e))
}

#[derive(Debug, Serialize)]
pub struct Dashboard {
  pub orders: usize,
  pub open_orders: usize,
  pub order_total: f64,
  pub orders_by_status: BTreeMap<OrderStatus, usize>,
  pub companies: usize,
  pub active_companies: usize,
  pub payments_received: f64,
  pub shipments_in_transit: usize,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub inventory_units: Option<u32>,
  pub cache: CacheStats,
}

/// Load every dashboard panel concurrently.
///
/// The totals and status panels read the same order list; the shared cache turns them into a
/// single backend request.
pub async fn dashboard(app: &App, company: Option<&str>) -> Result<Dashboard> {
  let orders = app.service::<Orders>();
  let companies = app.service::<Companies>();
  let payments = app.service::<Payments>();
  let shippings = app.service::<Shippings>();
  let inventories = app.service::<CompanyInventories>();

  let totals_panel = async {
    let orders = orders.list().await?;
    let total: f64 = orders.iter().map(|o| o.total).sum();
    let open = orders.iter().filter(|o| o.status.is_open()).count();
    Ok::<_, color_eyre::Report>((orders.len(), open, total))
  };

  let status_panel = async {
    let mut breakdown = BTreeMap::new();
    for order in orders.list().await? {
      *breakdown.entry(order.status).or_insert(0) += 1;
    }
    Ok::<_, color_eyre::Report>(breakdown)
  };

  let inventory_panel = async {
    match company {
      Some(company) => {
        let held = inventories.list_by_company(company).await?;
        Ok::<_, color_eyre::Report>(Some(held.iter().map(|i| i.quantity).sum::<u32>()))
      }
      None => Ok(None),
    }
  };

  let (totals, orders_by_status, companies, payments, shippings, inventory_units) = futures::try_join!(
    totals_panel,
    status_panel,
    companies.list(),
    payments.list(),
    shippings.list(),
    inventory_panel,
  )?;
  let (order_count, open_orders, order_total) = totals;

  Ok(Dashboard {
    orders: order_count,
    open_orders,
    order_total,
    orders_by_status,
    active_companies: companies.iter().filter(|c| c.active).count(),
    companies: companies.len(),
    payments_received: payments
      .iter()
      .filter(|p| p.status == "paid")
      .map(|p| p.amount)
      .sum(),
    shipments_in_transit: shippings.iter().filter(|s| s.status != "delivered").count(),
    inventory_units,
    cache: app.stats(),
  })
}
