//! Support Desk — AI-driven customer support orchestrator.
//!
//! Turns a free-text message (interactive chat call or inbound mailbox item)
//! into a policy-governed, tool-augmented reply: category routing, policy
//! selection, a strictly two-phase tool protocol against the reasoning
//! engine, a deterministic security gatekeeper for inbound mail, and an
//! idempotent mailbox ingestion loop.

pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod gatekeeper;
pub mod mailbox;
pub mod orchestrator;
pub mod routing;
pub mod server;
pub mod tools;
pub mod worker;
