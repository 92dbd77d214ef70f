//! External capability adapters.
//!
//! Each adapter is one independent external round trip. Adapters return
//! typed records or `AdapterError`; the dispatcher converts failures into
//! structured payloads so the reasoning engine can verbalize them instead of
//! the transaction aborting.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

// ── Records ─────────────────────────────────────────────────────────

/// Order plus customer profile, as surfaced to the reasoning engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRecord {
    pub order_number: String,
    /// Financial status, e.g. "paid".
    pub financial: String,
    /// Fulfillment status, e.g. "Unfulfilled", "Fulfilled", "Partially Fulfilled".
    pub fulfillment: String,
    /// Line items as "2x T-Shirt" strings.
    pub items: Vec<String>,
    pub tracking: Vec<String>,
    /// "Guest Checkout" or a returning-customer summary.
    pub customer_profile: String,
}

/// Outcome of an order lookup.
#[derive(Debug, Clone)]
pub enum OrderLookup {
    Found(OrderRecord),
    NotFound,
}

/// Product detail with real inventory and metafields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductRecord {
    pub title: String,
    pub tags: String,
    pub total_stock: i64,
    /// Variants as "Small (Stock: 3)" strings.
    pub variants: Vec<String>,
    pub metafields: serde_json::Map<String, serde_json::Value>,
    pub image_url: Option<String>,
}

/// Outcome of a product detail lookup.
#[derive(Debug, Clone)]
pub enum ProductLookup {
    Found(ProductRecord),
    NotFound,
}

/// One catalog entry from a stock search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductSummary {
    pub name: String,
    pub url: Option<String>,
    /// "In Stock" or "Sold Out".
    pub status: String,
    pub total_stock: i64,
}

/// Active discount, pre-rendered for prompt injection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Discount {
    pub title: String,
    /// Display amount, e.g. "10% OFF" or "-5.00 OFF".
    pub amount: String,
}

/// Published store policy document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyDoc {
    pub title: String,
    pub url: String,
}

/// Ticket priority, as advertised in the tool schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketPriority {
    Low,
    Medium,
    High,
    Urgent,
}

/// Adapter-level failure. Always caught at the dispatch boundary.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct AdapterError(pub String);

impl From<reqwest::Error> for AdapterError {
    fn from(e: reqwest::Error) -> Self {
        AdapterError(e.to_string())
    }
}

// ── Adapter traits ──────────────────────────────────────────────────

#[async_trait]
pub trait OrderLookupAdapter: Send + Sync {
    /// Look up one order by number and/or customer email. When both are
    /// given, the email must match the order — mismatches are `NotFound`.
    async fn lookup(
        &self,
        email: Option<&str>,
        order_number: Option<&str>,
    ) -> Result<OrderLookup, AdapterError>;
}

#[async_trait]
pub trait ProductLookupAdapter: Send + Sync {
    /// Detailed single-product lookup: stock, metafields, variants.
    async fn lookup(&self, search_term: &str) -> Result<ProductLookup, AdapterError>;

    /// Catalog search with real-time inventory.
    async fn search_stock(&self, search_term: &str) -> Result<Vec<ProductSummary>, AdapterError>;
}

/// Two independent fact sources for ambient store context. Each can fail on
/// its own; the provider degrades that section instead of the whole fetch.
#[async_trait]
pub trait StoreFactsAdapter: Send + Sync {
    async fn fetch_discounts(&self) -> Result<Vec<Discount>, AdapterError>;
    async fn fetch_policies(&self) -> Result<Vec<PolicyDoc>, AdapterError>;
}

#[async_trait]
pub trait TicketAdapter: Send + Sync {
    /// Create a support ticket for human review; returns the ticket id.
    async fn create(
        &self,
        category: &str,
        email: &str,
        summary: &str,
        priority: TicketPriority,
    ) -> Result<String, AdapterError>;
}

// ── Shopify implementation ──────────────────────────────────────────

/// Adapter backed by the Shopify admin REST API.
pub struct ShopifyAdapter {
    http: reqwest::Client,
    host: String,
    token: SecretString,
    api_version: String,
}

impl ShopifyAdapter {
    pub fn new(host: impl Into<String>, token: SecretString, api_version: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            host: host.into(),
            token,
            api_version: api_version.into(),
        }
    }

    fn url(&self, resource: &str) -> String {
        format!(
            "https://{}/admin/api/{}/{resource}",
            self.host, self.api_version
        )
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        resource: &str,
        query: &[(&str, &str)],
    ) -> Result<T, AdapterError> {
        let response = self
            .http
            .get(self.url(resource))
            .query(query)
            .header("X-Shopify-Access-Token", self.token.expose_secret())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AdapterError(format!(
                "Shopify returned {status} for {resource}"
            )));
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl OrderLookupAdapter for ShopifyAdapter {
    async fn lookup(
        &self,
        email: Option<&str>,
        order_number: Option<&str>,
    ) -> Result<OrderLookup, AdapterError> {
        let clean_number = order_number.map(|n| n.replace('#', "").trim().to_string());
        let clean_email = email.map(|e| e.trim().to_lowercase());
        tracing::debug!(
            order = clean_number.as_deref().unwrap_or("-"),
            "Looking up order"
        );

        let mut query: Vec<(&str, &str)> = vec![("status", "any"), ("limit", "1")];
        if let Some(ref number) = clean_number {
            query.push(("name", number));
        } else if let Some(ref addr) = clean_email {
            query.push(("email", addr));
            query.push(("order", "created_at desc"));
        } else {
            return Ok(OrderLookup::NotFound);
        }

        let body: OrdersResponse = self.get_json("orders.json", &query).await?;
        let Some(order) = body.orders.into_iter().next() else {
            return Ok(OrderLookup::NotFound);
        };

        // Email verification when both identifiers are present: a mismatch is
        // indistinguishable from not-found on purpose (privacy shield).
        if let (Some(number), Some(addr)) = (&clean_number, &clean_email) {
            let order_name = order.name.replace('#', "");
            let order_email = order.email.as_deref().unwrap_or_default().to_lowercase();
            if order_name.trim() != number.as_str() || order_email != *addr {
                return Ok(OrderLookup::NotFound);
            }
        }

        let customer_profile = match &order.customer {
            Some(customer) => self.customer_profile(customer.id).await,
            None => "Guest Checkout".to_string(),
        };

        let tracking = order
            .fulfillments
            .iter()
            .filter_map(|f| f.tracking_number.clone())
            .collect();

        Ok(OrderLookup::Found(OrderRecord {
            order_number: order.name,
            financial: order.financial_status.unwrap_or_default(),
            fulfillment: display_fulfillment(order.fulfillment_status.as_deref()),
            items: order
                .line_items
                .iter()
                .map(|i| format!("{}x {}", i.quantity, i.title))
                .collect(),
            tracking,
            customer_profile,
        }))
    }
}

impl ShopifyAdapter {
    /// Returning-customer summary; degrades to "Guest Checkout" on failure.
    async fn customer_profile(&self, customer_id: u64) -> String {
        let resource = format!("customers/{customer_id}.json");
        match self.get_json::<CustomerResponse>(&resource, &[]).await {
            Ok(body) => {
                let c = body.customer;
                format!(
                    "Returning customer: {} {} spent ({} orders)",
                    c.total_spent.unwrap_or_else(|| "0".into()),
                    c.currency.unwrap_or_default(),
                    c.orders_count
                )
            }
            Err(e) => {
                tracing::warn!(error = %e, "Customer profile fetch failed");
                "Guest Checkout".to_string()
            }
        }
    }
}

#[async_trait]
impl ProductLookupAdapter for ShopifyAdapter {
    async fn lookup(&self, search_term: &str) -> Result<ProductLookup, AdapterError> {
        tracing::debug!(term = %search_term, "Looking up product");
        let body: ProductsResponse = self
            .get_json("products.json", &[("limit", "1"), ("title", search_term)])
            .await?;
        let Some(product) = body.products.into_iter().next() else {
            return Ok(ProductLookup::NotFound);
        };

        let metafields = self.product_metafields(product.id).await;

        let mut variants = Vec::with_capacity(product.variants.len());
        let mut total_stock = 0;
        for variant in &product.variants {
            let stock = self.variant_stock(variant.inventory_item_id).await;
            total_stock += stock;
            variants.push(format!("{} (Stock: {stock})", variant.title));
        }

        Ok(ProductLookup::Found(ProductRecord {
            title: product.title,
            tags: product.tags.unwrap_or_default(),
            total_stock,
            variants,
            metafields,
            image_url: product.images.into_iter().next().map(|i| i.src),
        }))
    }

    async fn search_stock(&self, search_term: &str) -> Result<Vec<ProductSummary>, AdapterError> {
        tracing::debug!(term = %search_term, "Searching product stock");
        let body: ProductsResponse = self
            .get_json("products.json", &[("limit", "5"), ("title", search_term)])
            .await?;

        let mut catalog = Vec::with_capacity(body.products.len());
        for product in body.products {
            let mut total_stock = 0;
            for variant in &product.variants {
                total_stock += self.variant_stock(variant.inventory_item_id).await;
            }
            catalog.push(ProductSummary {
                name: product.title,
                url: product.online_store_url,
                status: if total_stock > 0 { "In Stock" } else { "Sold Out" }.to_string(),
                total_stock,
            });
        }
        Ok(catalog)
    }
}

impl ShopifyAdapter {
    /// Metafields keyed by name, values truncated; empty map on failure.
    async fn product_metafields(&self, product_id: u64) -> serde_json::Map<String, serde_json::Value> {
        let resource = format!("products/{product_id}/metafields.json");
        match self.get_json::<MetafieldsResponse>(&resource, &[]).await {
            Ok(body) => body
                .metafields
                .into_iter()
                .map(|m| {
                    let text = match m.value {
                        serde_json::Value::String(s) => s,
                        other => other.to_string(),
                    };
                    let rendered: String = text.chars().take(200).collect();
                    (m.key, serde_json::Value::String(rendered))
                })
                .collect(),
            Err(e) => {
                tracing::warn!(error = %e, "Metafield fetch failed");
                serde_json::Map::new()
            }
        }
    }

    /// Total available units across locations; 0 on failure.
    async fn variant_stock(&self, inventory_item_id: u64) -> i64 {
        let id = inventory_item_id.to_string();
        match self
            .get_json::<InventoryLevelsResponse>(
                "inventory_levels.json",
                &[("inventory_item_ids", id.as_str())],
            )
            .await
        {
            Ok(body) => body
                .inventory_levels
                .iter()
                .map(|l| l.available.unwrap_or(0))
                .sum(),
            Err(e) => {
                tracing::warn!(error = %e, "Inventory fetch failed");
                0
            }
        }
    }
}

#[async_trait]
impl StoreFactsAdapter for ShopifyAdapter {
    async fn fetch_discounts(&self) -> Result<Vec<Discount>, AdapterError> {
        let body: PriceRulesResponse = self.get_json("price_rules.json", &[]).await?;
        Ok(body
            .price_rules
            .into_iter()
            .map(|rule| {
                let amount = if rule.value_type == "fixed_amount" {
                    format!("-{} OFF", rule.value)
                } else {
                    format!("{}% OFF", rule.value)
                };
                Discount {
                    title: rule.title,
                    amount,
                }
            })
            .collect())
    }

    async fn fetch_policies(&self) -> Result<Vec<PolicyDoc>, AdapterError> {
        let body: PoliciesResponse = self.get_json("policies.json", &[]).await?;
        Ok(body
            .policies
            .into_iter()
            .map(|p| PolicyDoc {
                title: p.title,
                url: p.url,
            })
            .collect())
    }
}

/// Map raw fulfillment status to the display vocabulary the policies use.
fn display_fulfillment(raw: Option<&str>) -> String {
    match raw {
        Some("fulfilled") => "Fulfilled",
        Some("partial") => "Partially Fulfilled",
        Some("restocked") => "Restocked",
        _ => "Unfulfilled",
    }
    .to_string()
}

// ── Shopify wire shapes ─────────────────────────────────────────────

#[derive(Deserialize)]
struct OrdersResponse {
    #[serde(default)]
    orders: Vec<WireOrder>,
}

#[derive(Deserialize)]
struct WireOrder {
    name: String,
    email: Option<String>,
    financial_status: Option<String>,
    fulfillment_status: Option<String>,
    #[serde(default)]
    line_items: Vec<WireLineItem>,
    #[serde(default)]
    fulfillments: Vec<WireFulfillment>,
    customer: Option<WireCustomerRef>,
}

#[derive(Deserialize)]
struct WireLineItem {
    quantity: u32,
    title: String,
}

#[derive(Deserialize)]
struct WireFulfillment {
    tracking_number: Option<String>,
}

#[derive(Deserialize)]
struct WireCustomerRef {
    id: u64,
}

#[derive(Deserialize)]
struct CustomerResponse {
    customer: WireCustomer,
}

#[derive(Deserialize)]
struct WireCustomer {
    total_spent: Option<String>,
    currency: Option<String>,
    #[serde(default)]
    orders_count: u64,
}

#[derive(Deserialize)]
struct ProductsResponse {
    #[serde(default)]
    products: Vec<WireProduct>,
}

#[derive(Deserialize)]
struct WireProduct {
    id: u64,
    title: String,
    tags: Option<String>,
    online_store_url: Option<String>,
    #[serde(default)]
    variants: Vec<WireVariant>,
    #[serde(default)]
    images: Vec<WireImage>,
}

#[derive(Deserialize)]
struct WireVariant {
    title: String,
    inventory_item_id: u64,
}

#[derive(Deserialize)]
struct WireImage {
    src: String,
}

#[derive(Deserialize)]
struct MetafieldsResponse {
    #[serde(default)]
    metafields: Vec<WireMetafield>,
}

#[derive(Deserialize)]
struct WireMetafield {
    key: String,
    value: serde_json::Value,
}

#[derive(Deserialize)]
struct InventoryLevelsResponse {
    #[serde(default)]
    inventory_levels: Vec<WireInventoryLevel>,
}

#[derive(Deserialize)]
struct WireInventoryLevel {
    available: Option<i64>,
}

#[derive(Deserialize)]
struct PriceRulesResponse {
    #[serde(default)]
    price_rules: Vec<WirePriceRule>,
}

#[derive(Deserialize)]
struct WirePriceRule {
    title: String,
    value_type: String,
    value: String,
}

#[derive(Deserialize)]
struct PoliciesResponse {
    #[serde(default)]
    policies: Vec<WirePolicy>,
}

#[derive(Deserialize)]
struct WirePolicy {
    title: String,
    url: String,
}

// ── Internal ticket adapter ─────────────────────────────────────────

/// Ticket adapter that records the escalation and mints an id.
///
/// Integration point for an external ticketing system; the escalation is
/// logged so operators can pick it up until one is wired in.
pub struct InternalTicketAdapter;

#[async_trait]
impl TicketAdapter for InternalTicketAdapter {
    async fn create(
        &self,
        category: &str,
        email: &str,
        summary: &str,
        priority: TicketPriority,
    ) -> Result<String, AdapterError> {
        let ticket_id = format!("TICKET-{}", uuid::Uuid::new_v4());
        tracing::warn!(
            ticket = %ticket_id,
            category = %category,
            email = %email,
            priority = ?priority,
            summary = %summary,
            "Support ticket escalated for human review"
        );
        Ok(ticket_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fulfillment_vocabulary_maps_known_statuses() {
        assert_eq!(display_fulfillment(Some("fulfilled")), "Fulfilled");
        assert_eq!(display_fulfillment(Some("partial")), "Partially Fulfilled");
        assert_eq!(display_fulfillment(Some("restocked")), "Restocked");
        assert_eq!(display_fulfillment(None), "Unfulfilled");
        assert_eq!(display_fulfillment(Some("paid")), "Unfulfilled");
    }

    #[test]
    fn ticket_priority_serializes_lowercase() {
        assert_eq!(
            serde_json::to_value(TicketPriority::Urgent).unwrap(),
            serde_json::json!("urgent")
        );
        let back: TicketPriority = serde_json::from_value(serde_json::json!("high")).unwrap();
        assert_eq!(back, TicketPriority::High);
    }

    #[test]
    fn orders_response_tolerates_missing_fields() {
        let raw = r##"{"orders":[{"name":"#1001","line_items":[{"quantity":2,"title":"Tee"}]}]}"##;
        let body: OrdersResponse = serde_json::from_str(raw).unwrap();
        let order = &body.orders[0];
        assert_eq!(order.name, "#1001");
        assert!(order.fulfillments.is_empty());
        assert!(order.customer.is_none());
    }

    #[tokio::test]
    async fn internal_ticket_adapter_mints_prefixed_ids() {
        let id = InternalTicketAdapter
            .create("TechnicalIssues", "a@b.com", "checkout broken", TicketPriority::High)
            .await
            .unwrap();
        assert!(id.starts_with("TICKET-"));
    }
}
