//! End-to-end ingestion flow: inbound customer email → gatekeeper →
//! category routing → two-phase tool protocol → staged draft → processed
//! marker, with every external seam mocked.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use support_desk::context::StoreContextProvider;
use support_desk::engine::{
    CompletionRequest, EngineReply, ReasoningEngine, Role, ToolCallRequest,
};
use support_desk::error::{EngineError, MailboxError};
use support_desk::gatekeeper::Gatekeeper;
use support_desk::mailbox::{InboundEmail, MailboxClient, MessageRef, ThreadSnippet};
use support_desk::orchestrator::Orchestrator;
use support_desk::tools::{
    AdapterError, Discount, Dispatcher, OrderLookup, OrderLookupAdapter, OrderRecord, PolicyDoc,
    ProductLookup, ProductLookupAdapter, ProductSummary, StoreFactsAdapter, TicketAdapter,
    TicketPriority,
};
use support_desk::worker::{MailboxWorker, WorkerConfig};

// ── Mock reasoning engine ───────────────────────────────────────────

struct ScriptedEngine {
    script: Mutex<VecDeque<EngineReply>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedEngine {
    fn new(script: Vec<EngineReply>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReasoningEngine for ScriptedEngine {
    async fn complete(&self, request: CompletionRequest) -> Result<EngineReply, EngineError> {
        self.requests.lock().unwrap().push(request);
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| EngineError::RequestFailed("script exhausted".into()))
    }
}

fn text(content: &str) -> EngineReply {
    EngineReply {
        content: Some(content.into()),
        tool_calls: Vec::new(),
    }
}

// ── Mock adapters ───────────────────────────────────────────────────

/// Order backend returning an unfulfilled #1001 and recording lookup args.
struct RecordingOrders {
    lookups: Mutex<Vec<(Option<String>, Option<String>)>>,
}

impl RecordingOrders {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            lookups: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl OrderLookupAdapter for RecordingOrders {
    async fn lookup(
        &self,
        email: Option<&str>,
        order_number: Option<&str>,
    ) -> Result<OrderLookup, AdapterError> {
        self.lookups
            .lock()
            .unwrap()
            .push((email.map(String::from), order_number.map(String::from)));
        if order_number == Some("1001") {
            Ok(OrderLookup::Found(OrderRecord {
                order_number: "#1001".into(),
                financial: "paid".into(),
                fulfillment: "Unfulfilled".into(),
                items: vec!["1x Linen Shirt".into()],
                tracking: vec![],
                customer_profile: "Returning customer: 240.00 USD spent (3 orders)".into(),
            }))
        } else {
            Ok(OrderLookup::NotFound)
        }
    }
}

struct StubProducts;

#[async_trait]
impl ProductLookupAdapter for StubProducts {
    async fn lookup(&self, _term: &str) -> Result<ProductLookup, AdapterError> {
        Ok(ProductLookup::NotFound)
    }
    async fn search_stock(&self, _term: &str) -> Result<Vec<ProductSummary>, AdapterError> {
        Ok(Vec::new())
    }
}

struct StubFacts;

#[async_trait]
impl StoreFactsAdapter for StubFacts {
    async fn fetch_discounts(&self) -> Result<Vec<Discount>, AdapterError> {
        Ok(Vec::new())
    }
    async fn fetch_policies(&self) -> Result<Vec<PolicyDoc>, AdapterError> {
        Ok(Vec::new())
    }
}

struct StubTickets;

#[async_trait]
impl TicketAdapter for StubTickets {
    async fn create(
        &self,
        _category: &str,
        _email: &str,
        _summary: &str,
        _priority: TicketPriority,
    ) -> Result<String, AdapterError> {
        Ok("TICKET-e2e".into())
    }
}

// ── Mock mailbox ────────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum MailboxEvent {
    Draft {
        to: String,
        subject: String,
        html: String,
    },
    Mark {
        id: String,
    },
}

struct MockMailbox {
    email: InboundEmail,
    events: Mutex<Vec<MailboxEvent>>,
}

impl MockMailbox {
    fn new(email: InboundEmail) -> Arc<Self> {
        Arc::new(Self {
            email,
            events: Mutex::new(Vec::new()),
        })
    }

    fn events(&self) -> Vec<MailboxEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl MailboxClient for MockMailbox {
    async fn list_unread(&self, _max_results: u32) -> Result<Vec<MessageRef>, MailboxError> {
        Ok(vec![MessageRef {
            id: self.email.id.clone(),
        }])
    }

    async fn get_message(&self, id: &str) -> Result<InboundEmail, MailboxError> {
        assert_eq!(id, self.email.id);
        Ok(self.email.clone())
    }

    async fn get_thread(&self, _thread_id: &str) -> Result<Vec<ThreadSnippet>, MailboxError> {
        Ok(vec![ThreadSnippet {
            id: self.email.id.clone(),
            snippet: "Where is my order?".into(),
        }])
    }

    async fn create_draft(
        &self,
        to: &str,
        subject: &str,
        html_body: &str,
    ) -> Result<(), MailboxError> {
        self.events.lock().unwrap().push(MailboxEvent::Draft {
            to: to.into(),
            subject: subject.into(),
            html: html_body.into(),
        });
        Ok(())
    }

    async fn mark_processed(&self, id: &str) -> Result<(), MailboxError> {
        self.events
            .lock()
            .unwrap()
            .push(MailboxEvent::Mark { id: id.into() });
        Ok(())
    }
}

// ── The flow ────────────────────────────────────────────────────────

#[tokio::test]
async fn inbound_order_inquiry_becomes_a_staged_draft() {
    let reply_text =
        "Great news! 🎉 Your order #1001 is confirmed and currently pending fulfillment.";

    // classify → round 1 (one tool call) → round 2 (final reply).
    let engine = ScriptedEngine::new(vec![
        text("OrderPlacementStatus"),
        EngineReply {
            content: None,
            tool_calls: vec![ToolCallRequest {
                id: "call_1".into(),
                name: "order_lookup".into(),
                arguments: json!({"order_number": "1001"}),
            }],
        },
        text(reply_text),
    ]);

    let orders = RecordingOrders::new();
    let orchestrator = Arc::new(Orchestrator::new(
        engine.clone(),
        StoreContextProvider::new(Arc::new(StubFacts), Duration::from_secs(60)),
        Dispatcher::new(orders.clone(), Arc::new(StubProducts), Arc::new(StubTickets)),
    ));

    let mailbox = MockMailbox::new(InboundEmail {
        id: "msg-42".into(),
        thread_id: "thread-42".into(),
        subject: "Order #1001 status".into(),
        sender: "jane@customer.com".into(),
        body: "Where is my order?".into(),
        received_at: chrono::Utc::now(),
    });

    let worker = MailboxWorker::new(
        mailbox.clone(),
        orchestrator,
        Gatekeeper::default(),
        WorkerConfig::default(),
    );

    let stats = worker.run_cycle().await.unwrap();
    assert_eq!(stats.listed, 1);
    assert_eq!(stats.drafted, 1);
    assert_eq!(stats.failed, 0);

    // The gatekeeper let it through and the router saw the composite prompt.
    let requests = engine.requests();
    assert_eq!(requests.len(), 3);
    let classify_input = &requests[0].messages[0].content;
    assert!(classify_input.contains("From: jane@customer.com"));
    assert!(classify_input.contains("Subject: Order #1001 status"));
    assert!(classify_input.contains("MESSAGE:\nWhere is my order?"));

    // The orchestrator invoked the order lookup with the number the engine
    // extracted, exactly once.
    assert_eq!(
        orders.lookups.lock().unwrap().as_slice(),
        &[(None, Some("1001".to_string()))]
    );

    // Round 2: the adapter's record reached the transcript, correlated, and
    // no tools were offered.
    let round2 = &requests[2];
    assert!(round2.tools.is_none());
    let tool_turn = round2
        .messages
        .iter()
        .find(|m| m.role == Role::Tool)
        .expect("tool turn in round-2 transcript");
    assert_eq!(tool_turn.tool_call_id.as_deref(), Some("call_1"));
    assert!(tool_turn.content.contains("Unfulfilled"));

    // Draft staged to the sender, then the item marked processed — exactly
    // once, in that order.
    let events = mailbox.events();
    assert_eq!(events.len(), 2);
    match &events[0] {
        MailboxEvent::Draft { to, subject, html } => {
            assert_eq!(to, "jane@customer.com");
            assert_eq!(subject, "Re: Order #1001 status");
            assert!(html.contains("pending fulfillment"));
            assert!(html.contains("Customer Support Team"));
        }
        other => panic!("expected draft first, got {other:?}"),
    }
    match &events[1] {
        MailboxEvent::Mark { id } => assert_eq!(id, "msg-42"),
        other => panic!("expected mark second, got {other:?}"),
    }
}

#[tokio::test]
async fn spam_email_never_reaches_the_engine() {
    // Empty script: any engine call errors and would surface in stats.
    let engine = ScriptedEngine::new(Vec::new());
    let orchestrator = Arc::new(Orchestrator::new(
        engine.clone(),
        StoreContextProvider::new(Arc::new(StubFacts), Duration::from_secs(60)),
        Dispatcher::new(
            RecordingOrders::new(),
            Arc::new(StubProducts),
            Arc::new(StubTickets),
        ),
    ));

    let mailbox = MockMailbox::new(InboundEmail {
        id: "spam-1".into(),
        thread_id: "t".into(),
        subject: "Partnership opportunity".into(),
        sender: "seo-guy@gmail.com".into(),
        body: "We can increase traffic to your store".into(),
        received_at: chrono::Utc::now(),
    });

    let worker = MailboxWorker::new(
        mailbox.clone(),
        orchestrator,
        Gatekeeper::default(),
        WorkerConfig::default(),
    );

    let stats = worker.run_cycle().await.unwrap();
    assert_eq!(stats.ignored, 1);
    assert_eq!(stats.failed, 0);
    assert!(engine.requests().is_empty(), "no model call for spam");

    // Ignored items are marked processed, with no draft.
    let events = mailbox.events();
    assert_eq!(events.len(), 1);
    assert!(matches!(&events[0], MailboxEvent::Mark { id } if id == "spam-1"));
}
