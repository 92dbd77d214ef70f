//! Mailbox ingestion worker.
//!
//! Timer-driven loop, decoupled from the request-serving path:
//! 1. List unread items (bounded batch)
//! 2. Gatekeeper decides process / ignore / internal-alert per item
//! 3. Eligible items run through the orchestrator
//! 4. The reply is staged as an HTML draft (never auto-sent)
//! 5. The item is marked processed — strictly after the draft decision
//!
//! A single item's failure is logged and the cycle continues; a whole-cycle
//! failure is logged and the loop sleeps the full interval. The worker never
//! terminates the hosting process. Crash between drafting and marking is
//! tolerated by re-processing next cycle — a duplicate draft is the accepted
//! failure mode, a dropped message is not.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::Error;
use crate::gatekeeper::{Gatekeeper, RoutingDecision};
use crate::mailbox::{InboundEmail, MailboxClient, ThreadSnippet, reply_subject};
use crate::orchestrator::Orchestrator;

/// Worker tuning knobs.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Interval between ingestion cycles.
    pub interval: Duration,
    /// Max unread items fetched per cycle.
    pub batch_size: u32,
    /// Max prior thread snippets included in the prompt.
    pub thread_window: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            batch_size: 10,
            thread_window: 3,
        }
    }
}

/// Counters for one ingestion cycle.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleStats {
    pub listed: usize,
    pub drafted: usize,
    pub ignored: usize,
    pub alerted: usize,
    pub failed: usize,
}

/// Outcome of one item, for cycle accounting.
enum ItemOutcome {
    Drafted,
    Ignored,
    Alerted,
}

/// Periodic mailbox ingestion loop.
pub struct MailboxWorker {
    mailbox: Arc<dyn MailboxClient>,
    orchestrator: Arc<Orchestrator>,
    gatekeeper: Gatekeeper,
    config: WorkerConfig,
}

impl MailboxWorker {
    pub fn new(
        mailbox: Arc<dyn MailboxClient>,
        orchestrator: Arc<Orchestrator>,
        gatekeeper: Gatekeeper,
        config: WorkerConfig,
    ) -> Self {
        Self {
            mailbox,
            orchestrator,
            gatekeeper,
            config,
        }
    }

    /// Spawn the background loop.
    ///
    /// Returns a `JoinHandle` and a shutdown flag. Cancellation is
    /// cooperative and only takes effect at loop-iteration boundaries —
    /// never mid-item.
    pub fn spawn(self) -> (JoinHandle<()>, Arc<AtomicBool>) {
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_flag = Arc::clone(&shutdown);

        let handle = tokio::spawn(async move {
            info!(
                "Mailbox worker started — checking every {}s",
                self.config.interval.as_secs()
            );

            let mut tick = tokio::time::interval(self.config.interval);

            loop {
                tick.tick().await;

                if shutdown.load(Ordering::Relaxed) {
                    info!("Mailbox worker shutting down");
                    return;
                }

                match self.run_cycle().await {
                    Ok(stats) if stats.listed > 0 => {
                        info!(
                            listed = stats.listed,
                            drafted = stats.drafted,
                            ignored = stats.ignored,
                            alerted = stats.alerted,
                            failed = stats.failed,
                            "Ingestion cycle complete"
                        );
                    }
                    Ok(_) => {}
                    Err(e) => {
                        // Transient — the loop sleeps the full interval and
                        // retries; unread items are still there next cycle.
                        error!(error = %e, "Ingestion cycle failed");
                    }
                }
            }
        });

        (handle, shutdown_flag)
    }

    /// Run a single ingestion cycle. Public so tests can drive one cycle
    /// synchronously without waiting on real time.
    pub async fn run_cycle(&self) -> Result<CycleStats, Error> {
        let unread = self.mailbox.list_unread(self.config.batch_size).await?;

        let mut stats = CycleStats {
            listed: unread.len(),
            ..CycleStats::default()
        };
        if unread.is_empty() {
            return Ok(stats);
        }

        debug!(count = unread.len(), "Unread mailbox items");

        for item in &unread {
            match self.process_item(&item.id).await {
                Ok(ItemOutcome::Drafted) => stats.drafted += 1,
                Ok(ItemOutcome::Ignored) => stats.ignored += 1,
                Ok(ItemOutcome::Alerted) => stats.alerted += 1,
                Err(e) => {
                    // Item stays unread and is retried next cycle.
                    error!(id = %item.id, error = %e, "Failed to process mailbox item");
                    stats.failed += 1;
                }
            }
        }

        Ok(stats)
    }

    async fn process_item(&self, id: &str) -> Result<ItemOutcome, Error> {
        let email = self.mailbox.get_message(id).await?;

        let decision = self
            .gatekeeper
            .classify(&email.sender, &email.subject, &email.body);

        match decision {
            RoutingDecision::Ignore => {
                debug!(sender = %email.sender, "Ignoring inbound email");
                self.mailbox.mark_processed(id).await?;
                Ok(ItemOutcome::Ignored)
            }
            RoutingDecision::InternalAlert => {
                warn!(
                    sender = %email.sender,
                    subject = %email.subject,
                    "Partner email flagged for internal review"
                );
                self.mailbox.mark_processed(id).await?;
                Ok(ItemOutcome::Alerted)
            }
            RoutingDecision::Process => {
                let age_secs = (chrono::Utc::now() - email.received_at).num_seconds().max(0);
                debug!(subject = %email.subject, age_secs, "Processing inbound email");

                let snippets = self.thread_context(&email).await;
                let prompt = compose_prompt(&email, &snippets);

                let outcome = self.orchestrator.chat(&prompt, Vec::new()).await?;

                let html = render_html_reply(&outcome.reply);
                self.mailbox
                    .create_draft(&email.sender, &reply_subject(&email.subject), &html)
                    .await?;
                // Marking strictly after the draft is staged: a crash in
                // between re-processes the item rather than dropping it.
                self.mailbox.mark_processed(id).await?;

                info!(
                    id = %id,
                    category = %outcome.category,
                    "Draft staged and item marked processed"
                );
                Ok(ItemOutcome::Drafted)
            }
        }
    }

    /// Bounded window of prior thread snippets, oldest-first. Thread fetch
    /// failure degrades to no context rather than failing the item.
    async fn thread_context(&self, email: &InboundEmail) -> Vec<ThreadSnippet> {
        if email.thread_id.is_empty() {
            return Vec::new();
        }
        match self.mailbox.get_thread(&email.thread_id).await {
            Ok(snippets) => thread_window(snippets, &email.id, self.config.thread_window),
            Err(e) => {
                warn!(thread = %email.thread_id, error = %e, "Thread history unavailable");
                Vec::new()
            }
        }
    }
}

/// Most recent `window` snippets preceding the current message, preserving
/// oldest-first order.
fn thread_window(snippets: Vec<ThreadSnippet>, current_id: &str, window: usize) -> Vec<ThreadSnippet> {
    let prior: Vec<ThreadSnippet> = snippets
        .into_iter()
        .filter(|s| s.id != current_id)
        .collect();
    let skip = prior.len().saturating_sub(window);
    prior.into_iter().skip(skip).collect()
}

/// Composite prompt for the orchestrator: sender, subject, bounded thread
/// history, then the message body.
fn compose_prompt(email: &InboundEmail, snippets: &[ThreadSnippet]) -> String {
    let mut prompt = format!(
        "Incoming Email\nFrom: {}\nSubject: {}\n",
        email.sender, email.subject
    );

    if !snippets.is_empty() {
        prompt.push_str("\n--- THREAD HISTORY ---\n");
        for snippet in snippets {
            prompt.push_str(&format!("- {}\n", snippet.snippet));
        }
        prompt.push_str("--- END HISTORY ---\n");
    }

    prompt.push_str(&format!("\nMESSAGE:\n{}", email.body));
    prompt
}

/// Render the reply as the HTML draft body with the support signature.
fn render_html_reply(reply: &str) -> String {
    let escaped = escape_html(reply).replace('\n', "<br>");
    format!("<p>{escaped}</p>\n<br>\n<p>--<br>Customer Support Team</p>")
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
