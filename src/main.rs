use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use mail_assist::agent::{ConversationStore, EmailResponder, TurnExecutor};
use mail_assist::channels::{CONSOLE_THREAD_ID, ComposioMailbox, Mailbox, run_console};
use mail_assist::config::AssistantConfig;
use mail_assist::llm::create_provider;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AssistantConfig::from_env()?;
    let log_guard = init_tracing(config.log_dir.as_deref());

    eprintln!("📬 Mail Assist v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Model: {}", config.llm.model);
    eprintln!("   Webhook: http://{}/trigger", config.mailbox.webhook_addr);
    eprintln!("   Press Ctrl-C to exit.\n");

    let turns = build_executor(&config)?;

    // Setup failures are logged inside connect(); the console works regardless.
    let mailbox = Arc::new(ComposioMailbox::new(config.mailbox.clone()));
    mailbox.connect().await;

    let responder = EmailResponder::new(Arc::clone(&turns), mailbox.clone());
    tokio::spawn(async move {
        match mailbox.start().await {
            Ok(events) => responder.run(events).await,
            Err(e) => tracing::error!("Email listener failed to start: {e}"),
        }
    });

    tokio::spawn(async move {
        let stdin = tokio::io::BufReader::new(tokio::io::stdin());
        if let Err(e) = run_console(&turns, CONSOLE_THREAD_ID, stdin, tokio::io::stdout()).await {
            tracing::error!("Console loop stopped: {e}");
        }
    });

    tokio::signal::ctrl_c().await?;
    println!("\nShutting down...");
    std::io::stdout().flush()?;
    drop(log_guard);

    // Neither task is joined. The console may be parked in a blocking stdin
    // read that the runtime cannot cancel, so leave without dropping it.
    std::process::exit(0)
}

fn build_executor(config: &AssistantConfig) -> mail_assist::Result<Arc<TurnExecutor>> {
    let llm = create_provider(&config.llm)?;
    let store = Arc::new(ConversationStore::new());
    Ok(Arc::new(TurnExecutor::new(llm, store, config.turn.clone())))
}

/// Log to stderr, and to a daily-rotated file when `log_dir` is set.
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr = fmt::layer().with_target(false).with_writer(std::io::stderr);

    match log_dir {
        Some(dir) => {
            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, "mail-assist.log"));
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr)
                .with(fmt::layer().with_ansi(false).with_writer(writer))
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry().with(filter).with(stderr).init();
            None
        }
    }
}
