//! # Hookwire — Workflow-Automation Backend
//!
//! Polls trigger sources on fixed intervals, dedupes delivered items
//! against persisted cursors, and pushes matching payloads to
//! notification sinks. Inbound webhooks fan out over HTTP.
//!
//! Usage:
//!   hookwire                   # Start with ~/.hookwire/config.toml
//!   hookwire --port 9000       # Override gateway port
//!   hookwire --data-dir ./wd   # Override state directory

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use hookwire_channels::{ChatSender, EmailSender, RestSource, SheetAppendSender, WebhookSender};
use hookwire_core::{HookwireConfig, SourceKind};
use hookwire_engine::{CursorStore, Dispatcher, PollScheduler, WorkflowRegistry};
use hookwire_gateway::AppState;

#[derive(Parser)]
#[command(
    name = "hookwire",
    version,
    about = "🔌 Hookwire — trigger polling and delivery tracking"
)]
struct Cli {
    /// Gateway port (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Config file path
    #[arg(short, long)]
    config: Option<String>,

    /// State directory (workflows, cursors)
    #[arg(long)]
    data_dir: Option<String>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn expand_path(p: &str) -> String {
    shellexpand::tilde(p).to_string()
}

/// Build the routing table from the configured senders. Targets with
/// no credentials in the config are simply absent from the table and
/// surface as unsupported at dispatch time.
fn build_dispatcher(config: &HookwireConfig) -> Dispatcher {
    let mut dispatcher = Dispatcher::new();

    if let Some(chat_cfg) = &config.chat {
        dispatcher.register("chat", "message", Arc::new(ChatSender::new(chat_cfg.clone())));
    }
    if let Some(email_cfg) = &config.email {
        dispatcher.register("email", "send", Arc::new(EmailSender::new(email_cfg.clone())));
    }
    dispatcher.register("webhook", "post", Arc::new(WebhookSender::new()));
    dispatcher.register("spreadsheet", "append-row", Arc::new(SheetAppendSender::new()));

    dispatcher
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        "hookwire=debug,hookwire_engine=debug,hookwire_channels=debug,hookwire_gateway=debug,tower_http=debug"
    } else {
        "hookwire=info,hookwire_engine=info,hookwire_channels=info,hookwire_gateway=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    // Load config
    let mut config = match &cli.config {
        Some(path) => HookwireConfig::load_from(std::path::Path::new(&expand_path(path)))?,
        None => HookwireConfig::load()?,
    };
    if let Some(port) = cli.port {
        config.gateway.port = port;
    }
    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.clone();
    }

    let data_dir = std::path::PathBuf::from(expand_path(&config.data_dir));
    std::fs::create_dir_all(&data_dir)?;

    // Persistent state
    let cursors = Arc::new(CursorStore::open(&data_dir));
    let registry = WorkflowRegistry::open(&data_dir);
    let workflow_count = registry.list().len();
    if workflow_count > 0 {
        tracing::info!("📋 Loaded {} workflow(s)", workflow_count);
    }

    // Delivery routing
    let dispatcher = Arc::new(build_dispatcher(&config));
    tracing::info!("🚚 Dispatcher routes: {}", dispatcher.routes().len());

    // Poll scheduler with the REST connector behind every polled kind
    let mut scheduler = PollScheduler::new(
        cursors,
        dispatcher.clone(),
        config.engine.default_poll_minutes,
    );
    let rest: Arc<RestSource> = Arc::new(RestSource::new());
    scheduler.register_connector(SourceKind::Spreadsheet, rest.clone());
    scheduler.register_connector(SourceKind::Mailbox, rest.clone());
    scheduler.register_connector(SourceKind::Board, rest);
    let scheduler = Arc::new(scheduler);

    // Resume polling everything that was enabled at shutdown
    scheduler.restore(registry.enabled());
    let live = scheduler.scheduled().len();
    if live > 0 {
        tracing::info!("⏰ Polling {} workflow(s)", live);
    }

    let state = AppState {
        config,
        registry: Arc::new(tokio::sync::Mutex::new(registry)),
        scheduler,
        dispatcher,
        start_time: std::time::Instant::now(),
    };

    hookwire_gateway::start(state).await
}
