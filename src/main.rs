use std::sync::Arc;
use std::sync::atomic::Ordering;

use support_desk::config::Config;
use support_desk::context::StoreContextProvider;
use support_desk::engine::OpenAiEngine;
use support_desk::gatekeeper::{Gatekeeper, GatekeeperConfig};
use support_desk::mailbox::GmailMailbox;
use support_desk::orchestrator::Orchestrator;
use support_desk::server::{AppState, router};
use support_desk::tools::{Dispatcher, InternalTicketAdapter, ShopifyAdapter};
use support_desk::worker::{MailboxWorker, WorkerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = Config::from_env()?;

    eprintln!("🤖 Support Desk v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Model: {}", config.engine_model);
    eprintln!("   Store: {}", config.shopify_url);
    eprintln!("   Chat API: http://0.0.0.0:{}/chat", config.port);

    // One engine client, injected everywhere — no process-wide singleton.
    let engine = Arc::new(OpenAiEngine::new(
        config.engine_base_url.clone(),
        config.engine_api_key.clone(),
        config.engine_model.clone(),
    ));

    let shopify = Arc::new(ShopifyAdapter::new(
        config.shopify_url.clone(),
        config.shopify_token.clone(),
        config.shopify_api_version.clone(),
    ));

    let dispatcher = Dispatcher::new(
        shopify.clone(),
        shopify.clone(),
        Arc::new(InternalTicketAdapter),
    );
    dispatcher.verify_advertised_schema()?;

    let orchestrator = Arc::new(Orchestrator::new(
        engine,
        StoreContextProvider::new(shopify, config.store_context_ttl),
        dispatcher,
    ));

    // ── Mailbox worker (optional subsystem) ─────────────────────────────
    let worker_shutdown = match &config.mailbox_token {
        Some(token) => {
            let worker = MailboxWorker::new(
                Arc::new(GmailMailbox::new(token.clone())),
                Arc::clone(&orchestrator),
                Gatekeeper::new(GatekeeperConfig::default()),
                WorkerConfig {
                    interval: config.email_check_interval,
                    ..WorkerConfig::default()
                },
            );
            let (_handle, shutdown) = worker.spawn();
            tracing::info!("Email worker started");
            Some(shutdown)
        }
        None => {
            tracing::info!("Email worker disabled (GMAIL_ACCESS_TOKEN not configured)");
            None
        }
    };

    // ── HTTP surface ────────────────────────────────────────────────────
    let app = router(AppState {
        orchestrator,
        secret: config.agent_secret.clone(),
        mailbox_enabled: config.mailbox_enabled(),
    });

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
    tracing::info!(port = config.port, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Ctrl+C received, shutting down...");
        })
        .await?;

    // Cooperative stop: the worker exits at its next iteration boundary.
    if let Some(shutdown) = worker_shutdown {
        shutdown.store(true, Ordering::Relaxed);
    }

    Ok(())
}
