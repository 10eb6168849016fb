use std::{net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use outbound_console::commands;
use outbound_console::config::{
    Settings, DEFAULT_BULK_DELAY_SECS, DEFAULT_PEARL_API_BASE_URL, DEFAULT_WHITE_LABEL_API_BASE_URL,
    DEFAULT_WHITE_LABEL_API_PREFIX,
};
use outbound_console::http::LoggingMode;
use outbound_console::leads::LeadStatus;
use outbound_console::notify::{Notification, Notifier};
use outbound_console::proxy::{self, ProxyState};
use outbound_console::state::AppState;
use outbound_console::storage::{Database, KeyValueStore, KeychainStore};

#[derive(Parser, Debug)]
#[command(name = "outbound-console", version, about)]
struct Cli {
    #[command(flatten)]
    upstream: UpstreamArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct UpstreamArgs {
    /// Pearl API base URL.
    #[arg(long, env = "NLPEARL_API_BASE_URL", default_value = DEFAULT_PEARL_API_BASE_URL)]
    pearl_api_base_url: String,

    /// White-label registry base URL.
    #[arg(long, env = "WHITE_LABEL_API_BASE_URL", default_value = DEFAULT_WHITE_LABEL_API_BASE_URL)]
    white_label_api_base_url: String,

    /// Path prefix for registry user lookups.
    #[arg(long, env = "WHITE_LABEL_API_PREFIX", default_value = DEFAULT_WHITE_LABEL_API_PREFIX)]
    white_label_api_prefix: String,

    /// Request timeout in seconds.
    #[arg(long, default_value_t = 60)]
    timeout_secs: u64,

    /// Log upstream query strings, with sensitive values redacted.
    #[arg(long)]
    log_query: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the dashboard proxy endpoints.
    Serve {
        /// Listen address, e.g. 127.0.0.1:3000
        #[arg(long, default_value = "127.0.0.1:3000")]
        listen: SocketAddr,
    },

    /// Import a CSV of leads and dial every pending one.
    Dial {
        /// Lead CSV with firstName, lastName, email and phoneNumber columns.
        #[arg(long)]
        csv: PathBuf,

        /// Seconds between two calls (3-30).
        #[arg(long, default_value_t = DEFAULT_BULK_DELAY_SECS)]
        delay: u64,

        /// Outbound campaign to call from. Uses the stored campaign if omitted.
        #[arg(long, env = "PEARL_OUTBOUND_ID", requires = "bearer_token")]
        outbound_id: Option<String>,

        #[arg(long, env = "PEARL_BEARER_TOKEN", requires = "outbound_id", hide_env_values = true)]
        bearer_token: Option<String>,

        /// SQLite file for settings and call history.
        #[arg(long, env = "OUTBOUND_CONSOLE_DB", default_value = "outbound-console.db")]
        db: PathBuf,

        /// Keep campaign credentials in the OS keychain instead of the database.
        #[arg(long)]
        keychain: bool,
    },
}

impl UpstreamArgs {
    fn settings(&self) -> Settings {
        Settings {
            pearl_api_base_url: self.pearl_api_base_url.clone(),
            white_label_api_base_url: self.white_label_api_base_url.clone(),
            request_timeout: Duration::from_secs(self.timeout_secs),
            logging_mode: if self.log_query {
                LoggingMode::PathAndQueryRedacted
            } else {
                LoggingMode::PathOnly
            },
            ..Settings::default()
        }
        .with_white_label_prefix(&self.white_label_api_prefix)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let settings = cli.upstream.settings();

    match cli.command {
        Command::Serve { listen } => serve(settings, listen).await,
        Command::Dial {
            csv,
            delay,
            outbound_id,
            bearer_token,
            db,
            keychain,
        } => {
            let settings = Settings { db_path: db, ..settings }.with_bulk_delay_secs(delay);
            let credentials = outbound_id.zip(bearer_token);
            dial(settings, csv, credentials, keychain).await
        }
    }
}

async fn serve(settings: Settings, listen: SocketAddr) -> anyhow::Result<()> {
    let state = ProxyState::from_settings(&settings)?;
    let app = proxy::router(state);

    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .with_context(|| format!("cannot bind {}", listen))?;
    tracing::info!("[PROXY] Listening on {}", listen);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn dial(
    settings: Settings,
    csv: PathBuf,
    credentials: Option<(String, String)>,
    keychain: bool,
) -> anyhow::Result<()> {
    let (notifier, mut notifications) = Notifier::channel();

    let state = if keychain {
        let db = Arc::new(Database::init(settings.db_path.clone()).await?);
        let backend: Arc<dyn KeyValueStore> = Arc::new(KeychainStore::default());
        AppState::with_credential_backend(settings, db, backend, notifier)?
    } else {
        AppState::init(settings, notifier).await?
    };

    let printer = tokio::spawn(async move {
        while let Some(notification) = notifications.recv().await {
            print_notification(&notification);
        }
    });

    if let Some((outbound_id, bearer_token)) = credentials {
        commands::set_campaign_credentials(&state, &outbound_id, &bearer_token).await?;
    }

    commands::import_leads_file(&state, &csv).await?;

    let mut progress = state.dialer.subscribe();
    commands::start_bulk_call_pending(&state, None).await?;

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            changed = progress.changed() => {
                if changed.is_err() || !progress.borrow_and_update().in_progress {
                    break;
                }
            }
            _ = &mut shutdown => {
                commands::cancel_bulk_call(&state).await?;
                break;
            }
        }
    }

    let leads = commands::list_leads(&state).await;
    let count = |status: LeadStatus| leads.iter().filter(|l| l.status == status).count();
    println!(
        "{} called, {} failed, {} pending",
        count(LeadStatus::Called),
        count(LeadStatus::Failed),
        count(LeadStatus::Pending)
    );

    // An in-flight call keeps the notifier alive until it returns
    drop(state);
    let _ = tokio::time::timeout(Duration::from_secs(1), printer).await;
    Ok(())
}

fn print_notification(n: &Notification) {
    println!("[{:?}] {}: {}", n.level, n.title, n.message);
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
