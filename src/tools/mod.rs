//! Tool dispatch — the closed set of capabilities the reasoning engine may
//! request during round 1.
//!
//! The tool set is a tagged variant ([`ToolKind`]), matched exhaustively, with
//! a typed argument record per kind parsed and validated at the dispatch
//! boundary. `invoke` is total: unknown names, bad arguments, and adapter
//! failures all become structured error payloads, never raised faults, so the
//! engine can verbalize the failure in round 2.

pub mod adapters;

pub use adapters::{
    AdapterError, Discount, InternalTicketAdapter, OrderLookup, OrderLookupAdapter, OrderRecord,
    PolicyDoc, ProductLookup, ProductLookupAdapter, ProductRecord, ProductSummary, ShopifyAdapter,
    StoreFactsAdapter, TicketAdapter, TicketPriority,
};

use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;

use crate::engine::{ToolCallRequest, ToolDefinition};
use crate::error::{ConfigError, ToolError};

// ── Tool kinds ──────────────────────────────────────────────────────

/// The closed set of tools advertised to the reasoning engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    /// Order details plus customer profile, optionally email-verified.
    OrderLookup,
    /// Single-product detail: stock, care instructions, specifications.
    ProductLookup,
    /// Catalog search with real-time inventory.
    ProductStock,
    /// Escalate to a human-reviewed support ticket.
    EscalateTicket,
}

impl ToolKind {
    pub const ALL: [ToolKind; 4] = [
        ToolKind::OrderLookup,
        ToolKind::ProductLookup,
        ToolKind::ProductStock,
        ToolKind::EscalateTicket,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ToolKind::OrderLookup => "order_lookup",
            ToolKind::ProductLookup => "product_lookup",
            ToolKind::ProductStock => "product_stock",
            ToolKind::EscalateTicket => "escalate_ticket",
        }
    }

    pub fn from_name(name: &str) -> Option<ToolKind> {
        ToolKind::ALL.iter().find(|k| k.name() == name).copied()
    }

    /// Schema advertised to the engine for this tool.
    pub fn definition(&self) -> ToolDefinition {
        match self {
            ToolKind::OrderLookup => ToolDefinition {
                name: self.name().into(),
                description: "Find order details, fulfillment status, tracking, and customer profile.".into(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "order_number": {"type": "string", "description": "Order number (e.g. #1234)"},
                        "email": {"type": "string", "description": "Customer email for verification"}
                    }
                }),
            },
            ToolKind::ProductLookup => ToolDefinition {
                name: self.name().into(),
                description: "Find product stock, care instructions, and specifications.".into(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "search_term": {"type": "string", "description": "Product name to search"}
                    },
                    "required": ["search_term"]
                }),
            },
            ToolKind::ProductStock => ToolDefinition {
                name: self.name().into(),
                description: "Search products and check real-time inventory.".into(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "search_term": {"type": "string", "description": "Product name (e.g. 'T-Shirt')"}
                    },
                    "required": ["search_term"]
                }),
            },
            ToolKind::EscalateTicket => ToolDefinition {
                name: self.name().into(),
                description: "Create a support ticket for human review.".into(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "category": {"type": "string", "description": "Ticket category"},
                        "email": {"type": "string", "description": "Customer email"},
                        "summary": {"type": "string", "description": "Issue summary"},
                        "priority": {"type": "string", "enum": ["low", "medium", "high", "urgent"]}
                    },
                    "required": ["category", "email", "summary", "priority"]
                }),
            },
        }
    }
}

// ── Typed argument records ──────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct OrderLookupArgs {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub order_number: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProductLookupArgs {
    pub search_term: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProductStockArgs {
    pub search_term: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EscalateTicketArgs {
    pub category: String,
    pub email: String,
    pub summary: String,
    pub priority: TicketPriority,
}

/// Parsed, validated arguments for one tool call.
#[derive(Debug, Clone)]
pub enum ToolArgs {
    OrderLookup(OrderLookupArgs),
    ProductLookup(ProductLookupArgs),
    ProductStock(ProductStockArgs),
    EscalateTicket(EscalateTicketArgs),
}

impl ToolArgs {
    /// Parse the raw argument value for `kind`. Validation failures are a
    /// distinct error from adapter-execution failures.
    pub fn parse(kind: ToolKind, raw: &serde_json::Value) -> Result<ToolArgs, ToolError> {
        let invalid = |reason: String| ToolError::InvalidArguments {
            name: kind.name().to_string(),
            reason,
        };

        match kind {
            ToolKind::OrderLookup => {
                let args: OrderLookupArgs =
                    serde_json::from_value(raw.clone()).map_err(|e| invalid(e.to_string()))?;
                if args.email.is_none() && args.order_number.is_none() {
                    return Err(invalid("either order_number or email is required".into()));
                }
                Ok(ToolArgs::OrderLookup(args))
            }
            ToolKind::ProductLookup => serde_json::from_value(raw.clone())
                .map(ToolArgs::ProductLookup)
                .map_err(|e| invalid(e.to_string())),
            ToolKind::ProductStock => serde_json::from_value(raw.clone())
                .map(ToolArgs::ProductStock)
                .map_err(|e| invalid(e.to_string())),
            ToolKind::EscalateTicket => serde_json::from_value(raw.clone())
                .map(ToolArgs::EscalateTicket)
                .map_err(|e| invalid(e.to_string())),
        }
    }
}

// ── Tool result ─────────────────────────────────────────────────────

/// Result of one tool call, correlated to its request by id.
///
/// The payload is a structured success or structured error record — dispatch
/// never raises.
#[derive(Debug, Clone)]
pub struct ToolResult {
    pub correlation_id: String,
    pub name: String,
    pub payload: serde_json::Value,
}

// ── Dispatcher ──────────────────────────────────────────────────────

/// Resolves engine tool-call requests to adapter round trips.
pub struct Dispatcher {
    orders: Arc<dyn OrderLookupAdapter>,
    products: Arc<dyn ProductLookupAdapter>,
    tickets: Arc<dyn TicketAdapter>,
}

impl Dispatcher {
    pub fn new(
        orders: Arc<dyn OrderLookupAdapter>,
        products: Arc<dyn ProductLookupAdapter>,
        tickets: Arc<dyn TicketAdapter>,
    ) -> Self {
        Self {
            orders,
            products,
            tickets,
        }
    }

    /// Tools offered to the engine on round 1, derived from [`ToolKind::ALL`].
    pub fn advertised_tools(&self) -> Vec<ToolDefinition> {
        ToolKind::ALL.iter().map(|k| k.definition()).collect()
    }

    /// Startup check: the advertised schema and the variant set must match
    /// exactly — every definition resolves back to its kind and the counts
    /// agree.
    pub fn verify_advertised_schema(&self) -> Result<(), ConfigError> {
        let definitions = self.advertised_tools();
        if definitions.len() != ToolKind::ALL.len() {
            return Err(ConfigError::InvalidValue {
                key: "tool schema".into(),
                message: format!(
                    "{} definitions advertised for {} tool kinds",
                    definitions.len(),
                    ToolKind::ALL.len()
                ),
            });
        }
        for (definition, kind) in definitions.iter().zip(ToolKind::ALL) {
            if ToolKind::from_name(&definition.name) != Some(kind) {
                return Err(ConfigError::InvalidValue {
                    key: "tool schema".into(),
                    message: format!("definition {:?} does not resolve to {:?}", definition.name, kind),
                });
            }
        }
        Ok(())
    }

    /// Execute all requests from one round concurrently. Result order matches
    /// request order; every request yields exactly one correlated result.
    pub async fn invoke_all(&self, requests: &[ToolCallRequest]) -> Vec<ToolResult> {
        futures::future::join_all(requests.iter().map(|request| self.invoke(request))).await
    }

    /// Execute one tool call. Total — never returns an error.
    pub async fn invoke(&self, request: &ToolCallRequest) -> ToolResult {
        let payload = match ToolKind::from_name(&request.name) {
            None => {
                tracing::warn!(tool = %request.name, "Unknown tool requested");
                error_payload("unknown_tool", &format!("Unknown tool: {}", request.name))
            }
            Some(kind) => match ToolArgs::parse(kind, &request.arguments) {
                Err(e) => {
                    tracing::warn!(tool = %request.name, error = %e, "Tool arguments rejected");
                    error_payload("invalid_arguments", &e.to_string())
                }
                Ok(args) => match self.execute(args).await {
                    Ok(payload) => payload,
                    Err(e) => {
                        tracing::warn!(tool = %request.name, error = %e, "Adapter call failed");
                        error_payload("adapter_error", &e.to_string())
                    }
                },
            },
        };

        ToolResult {
            correlation_id: request.id.clone(),
            name: request.name.clone(),
            payload,
        }
    }

    async fn execute(&self, args: ToolArgs) -> Result<serde_json::Value, AdapterError> {
        match args {
            ToolArgs::OrderLookup(args) => {
                let outcome = self
                    .orders
                    .lookup(args.email.as_deref(), args.order_number.as_deref())
                    .await?;
                Ok(match outcome {
                    OrderLookup::Found(record) => {
                        let mut payload = serde_json::to_value(record)
                            .map_err(|e| AdapterError(e.to_string()))?;
                        payload["found"] = json!(true);
                        payload
                    }
                    OrderLookup::NotFound => {
                        json!({"found": false, "message": "Order not found or email mismatch."})
                    }
                })
            }
            ToolArgs::ProductLookup(args) => {
                let outcome = self.products.lookup(&args.search_term).await?;
                Ok(match outcome {
                    ProductLookup::Found(record) => {
                        let mut payload = serde_json::to_value(record)
                            .map_err(|e| AdapterError(e.to_string()))?;
                        payload["found"] = json!(true);
                        payload
                    }
                    ProductLookup::NotFound => {
                        json!({"found": false, "message": "Product not found."})
                    }
                })
            }
            ToolArgs::ProductStock(args) => {
                let catalog = self.products.search_stock(&args.search_term).await?;
                Ok(if catalog.is_empty() {
                    json!({"found": false, "message": "No products found."})
                } else {
                    json!({"found": true, "products": catalog})
                })
            }
            ToolArgs::EscalateTicket(args) => {
                let ticket_id = self
                    .tickets
                    .create(&args.category, &args.email, &args.summary, args.priority)
                    .await?;
                Ok(json!({
                    "success": true,
                    "ticket_id": ticket_id,
                    "message": "Ticket created successfully"
                }))
            }
        }
    }
}

fn error_payload(kind: &str, detail: &str) -> serde_json::Value {
    json!({"error": {"kind": kind, "detail": detail}})
}
