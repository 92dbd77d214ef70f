//! Category routing — classifies a message into one of the fixed support
//! categories via the reasoning engine.
//!
//! The classifier output is validated, not trusted: anything outside the
//! fixed set, and any engine failure, falls back to the documented default
//! category. Classification failure is recoverable and never aborts a
//! transaction.

pub mod policy;

pub use policy::{Policy, PolicyRegistry};

use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::engine::{ChatMessage, CompletionRequest, ReasoningEngine};

// ── Category ────────────────────────────────────────────────────────

/// Fixed support category set. Every reply is governed by exactly one
/// category's policy; values outside this set are invalid everywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    OrderPlacementStatus,
    ShippingDelivery,
    ReturnsCancellationsExchanges,
    PaymentBilling,
    ProductInfoAvailability,
    TechnicalIssues,
    PromotionsDiscountsPricing,
    CustomerComplaintsSatisfaction,
    AccountProfileOther,
}

impl Category {
    /// All categories, in routing-prompt order.
    pub const ALL: [Category; 9] = [
        Category::OrderPlacementStatus,
        Category::ShippingDelivery,
        Category::ReturnsCancellationsExchanges,
        Category::PaymentBilling,
        Category::ProductInfoAvailability,
        Category::TechnicalIssues,
        Category::PromotionsDiscountsPricing,
        Category::CustomerComplaintsSatisfaction,
        Category::AccountProfileOther,
    ];

    /// Default category for unclassifiable or out-of-set input.
    pub const DEFAULT: Category = Category::AccountProfileOther;

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::OrderPlacementStatus => "OrderPlacementStatus",
            Category::ShippingDelivery => "ShippingDelivery",
            Category::ReturnsCancellationsExchanges => "ReturnsCancellationsExchanges",
            Category::PaymentBilling => "PaymentBilling",
            Category::ProductInfoAvailability => "ProductInfoAvailability",
            Category::TechnicalIssues => "TechnicalIssues",
            Category::PromotionsDiscountsPricing => "PromotionsDiscountsPricing",
            Category::CustomerComplaintsSatisfaction => "CustomerComplaintsSatisfaction",
            Category::AccountProfileOther => "AccountProfileOther",
        }
    }
}

impl FromStr for Category {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .iter()
            .find(|c| c.as_str() == s)
            .copied()
            .ok_or(())
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Router ──────────────────────────────────────────────────────────

/// Classifies a message into exactly one [`Category`].
pub struct CategoryRouter {
    engine: Arc<dyn ReasoningEngine>,
}

impl CategoryRouter {
    pub fn new(engine: Arc<dyn ReasoningEngine>) -> Self {
        Self { engine }
    }

    /// Classify `text` into a category. Infallible: engine errors and
    /// out-of-set labels log a warning and resolve to [`Category::DEFAULT`].
    pub async fn classify(&self, text: &str) -> Category {
        let request = CompletionRequest::new(router_prompt(), vec![ChatMessage::user(text)]);

        let label = match self.engine.complete(request).await {
            Ok(reply) => reply.text().trim().to_string(),
            Err(e) => {
                tracing::warn!(error = %e, "Router call failed, using default category");
                return Category::DEFAULT;
            }
        };

        match Category::from_str(&label) {
            Ok(category) => category,
            Err(()) => {
                tracing::warn!(label = %label, "Router returned out-of-set label, using default");
                Category::DEFAULT
            }
        }
    }
}

fn router_prompt() -> String {
    let labels = Category::ALL
        .iter()
        .map(|c| format!("- {c}"))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "Classify the user's message into exactly one category:\n{labels}\n\n\
         Rules:\n\
         - Ignore empty or \"No Subject\" subject lines.\n\
         - If the message sounds like a B2B sales pitch, classify as 'AccountProfileOther'.\n\n\
         Output ONLY the category name."
    )
}
