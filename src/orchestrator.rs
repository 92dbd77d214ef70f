//! Conversation orchestrator — one request→reply transaction.
//!
//! Composes the router, policy registry, store context provider, and tool
//! dispatcher around the two-phase tool protocol:
//!
//! 1. Round 1 offers the tool set. Zero requests → the content is the reply.
//! 2. Otherwise every requested tool runs (concurrently, order among calls
//!    unconstrained) and yields exactly one result correlated by id.
//! 3. Round 2 resubmits the transcript WITHOUT tools. One round only: tool
//!    calls never recurse, which bounds latency and cost and removes any
//!    infinite-loop risk against a non-deterministic engine.
//!
//! Tool turns stay in the transaction-local transcript; the caller-visible
//! history gains only the user turn and the final assistant turn.

use std::sync::Arc;

use crate::context::StoreContextProvider;
use crate::engine::{ChatMessage, CompletionRequest, ReasoningEngine};
use crate::error::EngineError;
use crate::routing::{Category, CategoryRouter, PolicyRegistry};
use crate::tools::Dispatcher;

/// Result of one chat transaction.
#[derive(Debug, Clone)]
pub struct ChatOutcome {
    pub reply: String,
    pub category: Category,
    /// Caller-visible history: prior + user turn + final assistant turn.
    pub history: Vec<ChatMessage>,
}

/// Orchestrates one message into a policy-governed, tool-augmented reply.
pub struct Orchestrator {
    engine: Arc<dyn ReasoningEngine>,
    router: CategoryRouter,
    context: StoreContextProvider,
    dispatcher: Dispatcher,
}

impl Orchestrator {
    pub fn new(
        engine: Arc<dyn ReasoningEngine>,
        context: StoreContextProvider,
        dispatcher: Dispatcher,
    ) -> Self {
        Self {
            router: CategoryRouter::new(Arc::clone(&engine)),
            engine,
            context,
            dispatcher,
        }
    }

    /// Run one transaction. Adapter and classification failures are absorbed
    /// along the way; only an engine transport failure aborts.
    pub async fn chat(
        &self,
        message: &str,
        prior_history: Vec<ChatMessage>,
    ) -> Result<ChatOutcome, EngineError> {
        let category = self.router.classify(message).await;
        let policy = PolicyRegistry::get(category);
        let store_context = self.context.fetch().await;
        tracing::info!(category = %category, "Routing resolved");

        let system_prompt = format!(
            "{}\n\n=== REAL-TIME STORE DATA ===\n{}\n\
             Remember: use tools to get accurate data. Never guess.",
            policy.instructions,
            store_context.render()
        );

        // Working transcript for this transaction only.
        let mut transcript = prior_history.clone();
        transcript.push(ChatMessage::user(message));

        let round1 = self
            .engine
            .complete(
                CompletionRequest::new(&system_prompt, transcript.clone())
                    .with_tools(self.dispatcher.advertised_tools()),
            )
            .await?;

        let reply = if round1.tool_calls.is_empty() {
            round1.text()
        } else {
            tracing::debug!(count = round1.tool_calls.len(), "Dispatching tool calls");
            transcript.push(ChatMessage::assistant_tool_calls(
                round1.content.clone(),
                round1.tool_calls.clone(),
            ));

            // Exactly one correlated result per request, all appended before
            // round 2 is issued.
            let results = self.dispatcher.invoke_all(&round1.tool_calls).await;
            for result in results {
                transcript.push(ChatMessage::tool(
                    result.correlation_id,
                    result.name,
                    result.payload.to_string(),
                ));
            }

            let round2 = self
                .engine
                .complete(CompletionRequest::new(&system_prompt, transcript.clone()))
                .await?;
            round2.text()
        };

        let mut history = prior_history;
        history.push(ChatMessage::user(message));
        history.push(ChatMessage::assistant(reply.clone()));

        Ok(ChatOutcome {
            reply,
            category,
            history,
        })
    }
}
