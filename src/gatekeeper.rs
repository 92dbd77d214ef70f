//! Inbound-email security gatekeeper.
//!
//! Pure rule-chain classifier that decides, before any model call is paid
//! for, whether an inbound message is processed, silently dropped, or
//! flagged for internal attention. The chain is an explicit ordered table of
//! (predicate, outcome) pairs — cheapest and most certain checks first —
//! each independently testable and reorderable without touching control
//! flow. Classification never mutates external state.

use regex::Regex;

// ── Decision ────────────────────────────────────────────────────────

/// Routing decision for one inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingDecision {
    /// Run the full orchestration pipeline and stage a draft reply.
    Process,
    /// Spam, phishing, or automated traffic — drop silently, log only.
    Ignore,
    /// Known partner traffic — flag for a human, never auto-reply.
    InternalAlert,
}

impl RoutingDecision {
    /// Short label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Process => "process",
            Self::Ignore => "ignore",
            Self::InternalAlert => "internal_alert",
        }
    }
}

// ── Config ──────────────────────────────────────────────────────────

/// Keyword and domain lists the rule predicates consult.
///
/// Membership semantics follow the deployed filter: domain checks are
/// substring matches (so `shopify.com` also covers `mail.shopify.com`),
/// prefixes are `starts_with` on the local part.
#[derive(Debug, Clone)]
pub struct GatekeeperConfig {
    /// Domains blocked outright (known phishing/spam senders).
    pub blocked_domains: Vec<String>,
    /// System/notification domains that never get replies.
    pub system_domains: Vec<String>,
    /// Local-part prefixes of automated senders.
    pub automated_prefixes: Vec<String>,
    /// Free-mail provider markers.
    pub freemail_domains: Vec<String>,
    /// High-risk keywords in a free-mail local part.
    pub high_risk_keywords: Vec<String>,
    /// Partner/supplier domains — alert internally, don't auto-reply.
    pub partner_domains: Vec<String>,
    /// Phishing-pattern subject keywords.
    pub phishing_subjects: Vec<String>,
    /// Commercial-spam subject keywords.
    pub spam_subjects: Vec<String>,
    /// Spam phrases in the body.
    pub body_spam_phrases: Vec<String>,
}

impl Default for GatekeeperConfig {
    fn default() -> Self {
        let list = |items: &[&str]| items.iter().map(|s| s.to_string()).collect();
        Self {
            blocked_domains: Vec::new(),
            system_domains: list(&[
                "accounts.google.com",
                "drive.google.com",
                "googlemail.com",
                "shopify.com",
                "shopifyemail.com",
            ]),
            automated_prefixes: list(&[
                "noreply",
                "no-reply",
                "donotreply",
                "mailer",
                "daemon",
                "notification",
                "alert",
                "newsletter",
                "postmaster",
            ]),
            freemail_domains: list(&["gmail", "hotmail", "outlook", "yahoo"]),
            high_risk_keywords: list(&[
                "seo", "traffic", "backlink", "profit", "ranking", "crypto", "forex", "invest",
            ]),
            partner_domains: Vec::new(),
            phishing_subjects: list(&["business-support", "violation", "suspended", "policy breach"]),
            spam_subjects: list(&[
                "partnership",
                "collaboration",
                "guest post",
                "link building",
                "business opportunity",
            ]),
            body_spam_phrases: list(&[
                "increase traffic",
                "domain authority",
                "partnership plan",
                "commission",
                "google ranking",
                "seo services",
                "passive income",
                "dear business owner",
            ]),
        }
    }
}

// ── Envelope ────────────────────────────────────────────────────────

/// Lowercased, pre-split view of one inbound message.
#[derive(Debug, Clone)]
pub struct Envelope {
    /// Local part of the sender address; empty when unresolvable.
    pub local: String,
    /// Domain part of the sender address; empty when unresolvable.
    pub domain: String,
    pub subject: String,
    pub body: String,
}

impl Envelope {
    fn build(address_re: &Regex, sender: &str, subject: &str, body: &str) -> Self {
        let sender = sender.to_lowercase();
        // Prefer the angle-bracket address in a "Name <addr>" header.
        let clean = address_re
            .captures(&sender)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
            .unwrap_or(sender);

        let (local, domain) = match clean.split_once('@') {
            Some((local, domain)) if !local.is_empty() && !domain.is_empty() => {
                (local.to_string(), domain.to_string())
            }
            _ => (String::new(), String::new()),
        };

        Self {
            local,
            domain,
            subject: subject.to_lowercase(),
            body: body.to_lowercase(),
        }
    }
}

// ── Rule table ──────────────────────────────────────────────────────

/// One entry in the ordered rule chain.
pub struct GateRule {
    /// Stable name, for logs and tests.
    pub name: &'static str,
    pub outcome: RoutingDecision,
    predicate: fn(&GatekeeperConfig, &Envelope) -> bool,
}

impl GateRule {
    /// Evaluate this rule in isolation.
    pub fn matches(&self, config: &GatekeeperConfig, envelope: &Envelope) -> bool {
        (self.predicate)(config, envelope)
    }
}

/// The deployed rule chain, first match wins.
fn default_rules() -> Vec<GateRule> {
    vec![
        GateRule {
            name: "unresolvable_sender",
            outcome: RoutingDecision::Ignore,
            predicate: |_, env| env.domain.is_empty(),
        },
        GateRule {
            name: "blocked_domain",
            outcome: RoutingDecision::Ignore,
            predicate: |cfg, env| cfg.blocked_domains.iter().any(|d| env.domain.contains(d)),
        },
        GateRule {
            name: "system_domain",
            outcome: RoutingDecision::Ignore,
            predicate: |cfg, env| cfg.system_domains.iter().any(|d| env.domain.contains(d)),
        },
        GateRule {
            name: "automated_prefix",
            outcome: RoutingDecision::Ignore,
            predicate: |cfg, env| {
                cfg.automated_prefixes
                    .iter()
                    .any(|p| env.local.starts_with(p))
            },
        },
        GateRule {
            name: "freemail_high_risk",
            outcome: RoutingDecision::Ignore,
            predicate: |cfg, env| {
                cfg.freemail_domains.iter().any(|d| env.domain.contains(d))
                    && cfg.high_risk_keywords.iter().any(|k| env.local.contains(k))
            },
        },
        GateRule {
            name: "partner_domain",
            outcome: RoutingDecision::InternalAlert,
            predicate: |cfg, env| cfg.partner_domains.iter().any(|d| env.domain.contains(d)),
        },
        GateRule {
            name: "phishing_subject",
            outcome: RoutingDecision::Ignore,
            predicate: |cfg, env| cfg.phishing_subjects.iter().any(|k| env.subject.contains(k)),
        },
        GateRule {
            name: "spam_subject",
            outcome: RoutingDecision::Ignore,
            predicate: |cfg, env| cfg.spam_subjects.iter().any(|k| env.subject.contains(k)),
        },
        GateRule {
            name: "body_spam_phrase",
            outcome: RoutingDecision::Ignore,
            predicate: |cfg, env| cfg.body_spam_phrases.iter().any(|p| env.body.contains(p)),
        },
    ]
}

// ── Gatekeeper ──────────────────────────────────────────────────────

/// Deterministic pre-filter for inbound messages.
pub struct Gatekeeper {
    config: GatekeeperConfig,
    rules: Vec<GateRule>,
    address_re: Regex,
}

impl Gatekeeper {
    pub fn new(config: GatekeeperConfig) -> Self {
        Self {
            config,
            rules: default_rules(),
            // Angle-bracket address in a display-name header.
            address_re: Regex::new(r"<(.+?)>").expect("static regex"),
        }
    }

    /// Classify one message. Pure — no external state is read or written.
    pub fn classify(&self, sender: &str, subject: &str, body: &str) -> RoutingDecision {
        let envelope = Envelope::build(&self.address_re, sender, subject, body);

        for rule in &self.rules {
            if rule.matches(&self.config, &envelope) {
                tracing::debug!(
                    sender = %sender,
                    rule = rule.name,
                    decision = rule.outcome.label(),
                    "Gatekeeper rule matched"
                );
                return rule.outcome;
            }
        }

        RoutingDecision::Process
    }
}

impl Default for Gatekeeper {
    fn default() -> Self {
        Self::new(GatekeeperConfig::default())
    }
}
