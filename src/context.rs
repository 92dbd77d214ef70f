//! Ambient store context injected into every orchestration call.
//!
//! Two independent fact sources (active discounts, published policies) are
//! fetched per call through a short-TTL cache. Either source failing
//! degrades its section to an explicit "unavailable" marker — the provider
//! never raises for transient network conditions.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

use crate::tools::{Discount, PolicyDoc, StoreFactsAdapter};

/// Ambient facts for prompt injection. `None` sections were unavailable at
/// fetch time, distinct from an empty-but-healthy source.
#[derive(Debug, Clone, Default)]
pub struct StoreContext {
    pub discounts: Option<Vec<Discount>>,
    pub policies: Option<Vec<PolicyDoc>>,
}

impl StoreContext {
    /// Render the prompt block the orchestrator appends to the system prompt.
    pub fn render(&self) -> String {
        let mut out = String::from("ACTIVE DISCOUNTS:\n");
        match &self.discounts {
            None => out.push_str("- (unavailable)\n"),
            Some(discounts) if discounts.is_empty() => out.push_str("- none\n"),
            Some(discounts) => {
                for d in discounts {
                    out.push_str(&format!("- {} ({})\n", d.title, d.amount));
                }
            }
        }

        out.push_str("\nSTORE POLICIES:\n");
        match &self.policies {
            None => out.push_str("- (unavailable)\n"),
            Some(policies) if policies.is_empty() => out.push_str("- none\n"),
            Some(policies) => {
                for p in policies {
                    out.push_str(&format!("- {}: {}\n", p.title, p.url));
                }
            }
        }
        out
    }
}

/// Best-effort provider with a short-TTL cache shared across transactions.
pub struct StoreContextProvider {
    facts: Arc<dyn StoreFactsAdapter>,
    ttl: Duration,
    cache: Mutex<Option<(Instant, StoreContext)>>,
}

impl StoreContextProvider {
    pub fn new(facts: Arc<dyn StoreFactsAdapter>, ttl: Duration) -> Self {
        Self {
            facts,
            ttl,
            cache: Mutex::new(None),
        }
    }

    /// Fetch the current context. Never errors; each source degrades
    /// independently.
    pub async fn fetch(&self) -> StoreContext {
        let mut cache = self.cache.lock().await;
        if let Some((fetched_at, context)) = cache.as_ref()
            && fetched_at.elapsed() < self.ttl
        {
            return context.clone();
        }

        let (discounts, policies) =
            tokio::join!(self.facts.fetch_discounts(), self.facts.fetch_policies());

        let context = StoreContext {
            discounts: match discounts {
                Ok(list) => Some(list),
                Err(e) => {
                    tracing::warn!(error = %e, "Discount source unavailable");
                    None
                }
            },
            policies: match policies {
                Ok(list) => Some(list),
                Err(e) => {
                    tracing::warn!(error = %e, "Policy source unavailable");
                    None
                }
            },
        };

        *cache = Some((Instant::now(), context.clone()));
        context
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use crate::tools::AdapterError;

    /// Counts calls; discounts fail when `fail_discounts` is set.
    struct CountingFacts {
        fail_discounts: bool,
        fail_policies: bool,
        calls: AtomicUsize,
    }

    impl CountingFacts {
        fn healthy() -> Self {
            Self {
                fail_discounts: false,
                fail_policies: false,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl StoreFactsAdapter for CountingFacts {
        async fn fetch_discounts(&self) -> Result<Vec<Discount>, AdapterError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_discounts {
                Err(AdapterError("discounts down".into()))
            } else {
                Ok(vec![Discount {
                    title: "Summer Sale".into(),
                    amount: "10% OFF".into(),
                }])
            }
        }

        async fn fetch_policies(&self) -> Result<Vec<PolicyDoc>, AdapterError> {
            if self.fail_policies {
                Err(AdapterError("policies down".into()))
            } else {
                Ok(vec![PolicyDoc {
                    title: "Refund policy".into(),
                    url: "https://store.example/refunds".into(),
                }])
            }
        }
    }

    #[tokio::test]
    async fn healthy_sources_render_both_sections() {
        let provider =
            StoreContextProvider::new(Arc::new(CountingFacts::healthy()), Duration::from_secs(60));
        let context = provider.fetch().await;
        let rendered = context.render();
        assert!(rendered.contains("Summer Sale (10% OFF)"));
        assert!(rendered.contains("Refund policy: https://store.example/refunds"));
    }

    #[tokio::test]
    async fn one_failing_source_degrades_only_its_section() {
        let facts = CountingFacts {
            fail_discounts: true,
            fail_policies: false,
            calls: AtomicUsize::new(0),
        };
        let provider = StoreContextProvider::new(Arc::new(facts), Duration::from_secs(60));
        let context = provider.fetch().await;
        assert!(context.discounts.is_none());
        assert!(context.policies.is_some());

        let rendered = context.render();
        assert!(rendered.contains("ACTIVE DISCOUNTS:\n- (unavailable)"));
        assert!(rendered.contains("Refund policy"));
    }

    #[tokio::test]
    async fn both_sources_failing_still_yields_a_context() {
        let facts = CountingFacts {
            fail_discounts: true,
            fail_policies: true,
            calls: AtomicUsize::new(0),
        };
        let provider = StoreContextProvider::new(Arc::new(facts), Duration::from_secs(60));
        let context = provider.fetch().await;
        assert!(context.discounts.is_none());
        assert!(context.policies.is_none());
    }

    #[tokio::test]
    async fn cache_serves_within_ttl() {
        let facts = Arc::new(CountingFacts::healthy());
        let provider = StoreContextProvider::new(facts.clone(), Duration::from_secs(60));
        provider.fetch().await;
        provider.fetch().await;
        assert_eq!(facts.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn zero_ttl_refetches_every_call() {
        let facts = Arc::new(CountingFacts::healthy());
        let provider = StoreContextProvider::new(facts.clone(), Duration::ZERO);
        provider.fetch().await;
        provider.fetch().await;
        assert_eq!(facts.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn empty_sections_render_as_none() {
        let context = StoreContext {
            discounts: Some(Vec::new()),
            policies: Some(Vec::new()),
        };
        let rendered = context.render();
        assert!(rendered.contains("ACTIVE DISCOUNTS:\n- none"));
        assert!(rendered.contains("STORE POLICIES:\n- none"));
    }
}
