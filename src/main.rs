mod api;
mod attachment;
mod gateway;
mod groups;
mod notify;
mod pages;

#[cfg(test)]
mod testutil;

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tokio::sync::{broadcast::error::RecvError, mpsc};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use wagate_core::{
    config::{self, shellexpand, Config, LogConfig},
    session::{CloseReason, SessionEvent},
    traits::{Connector, CredentialStore, Session},
};
use wagate_whatsapp::{generate_qr_terminal, SessionStore, WhatsAppConnector};

use gateway::{ConnectionManager, DelayedRefresh, SessionState};
use groups::GroupCache;
use notify::{Notification, Notifier};

#[derive(Parser)]
#[command(
    name = "wagate",
    version,
    about = "HTTP and WebSocket gateway for a WhatsApp account"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to config file.
    #[arg(short, long, default_value = "config.toml", env = "WAGATE_CONFIG")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the gateway (default).
    Serve {
        /// Delete the stored WhatsApp session before connecting.
        #[arg(long)]
        reset_session: bool,
    },
    /// Show configuration, session, and group cache state.
    Status,
    /// Pair this device by scanning QR codes in the terminal, then exit.
    Pair,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load(&cli.config)?;
    let _log_guard = init_tracing(&cfg.log);

    match cli.command.unwrap_or(Commands::Serve {
        reset_session: false,
    }) {
        Commands::Serve { reset_session } => serve(cfg, reset_session).await,
        Commands::Status => status(&cli.config, &cfg).await,
        Commands::Pair => pair(&cfg).await,
    }
}

/// Stderr subscriber plus an optional daily-rotated file layer.
fn init_tracing(log: &LogConfig) -> Option<WorkerGuard> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.level));

    let (file_layer, guard) = match &log.dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(shellexpand(dir), "wagate.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_ansi(false).with_writer(writer)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();
    guard
}

fn session_store(cfg: &Config) -> SessionStore {
    SessionStore::new(shellexpand(&cfg.whatsapp.session_dir))
}

async fn serve(cfg: Config, reset_session: bool) -> anyhow::Result<()> {
    let store = session_store(&cfg);
    if reset_session {
        store
            .reset()
            .with_context(|| format!("failed to reset session {}", store.dir().display()))?;
    }

    let cache = GroupCache::load(shellexpand(&cfg.groups.snapshot_file));
    let shared = Arc::new(SessionState::default());
    let scheduler = Arc::new(DelayedRefresh::new(
        cache.clone(),
        shared.clone(),
        cfg.groups.refresh_delay(),
    ));
    let connector = Arc::new(WhatsAppConnector::new(
        store.clone(),
        cfg.whatsapp.device_name.clone(),
    ));
    let notifier = Notifier::new();
    print_pairing_codes(&notifier);

    let manager = Arc::new(ConnectionManager::new(
        connector,
        Arc::new(store),
        shared,
        notifier,
        scheduler,
        cfg.connection.reconnect_delay(),
    ));

    let runner = tokio::spawn(manager.clone().run());
    manager
        .connect()
        .await
        .context("failed to start WhatsApp session")?;

    let addr = format!("{}:{}", cfg.server.host, cfg.server.port);
    let state = api::AppState::new(manager.clone(), cache);
    let result = api::serve(&addr, state, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("failed to listen for ctrl-c: {e}");
            std::future::pending::<()>().await;
        }
        info!("shutdown requested");
    })
    .await;

    manager.shutdown().await;
    if let Err(e) = runner.await {
        warn!("connection manager task ended abnormally: {e}");
    }
    result
}

/// Mirror each new pairing code to the terminal.
fn print_pairing_codes(notifier: &Notifier) {
    let mut rx = notifier.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(Notification::Qr { payload }) => match generate_qr_terminal(&payload) {
                    Ok(qr) => println!("\n{qr}\nScan with WhatsApp > Linked devices, or open /qr\n"),
                    Err(e) => warn!("failed to render pairing code: {e}"),
                },
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break,
            }
        }
    });
}

async fn status(config_path: &str, cfg: &Config) -> anyhow::Result<()> {
    let store = session_store(cfg);

    println!("wagate status\n");
    println!("Config:    {config_path}");
    println!("Listen:    {}:{}", cfg.server.host, cfg.server.port);
    println!("Session:   {}", store.dir().display());
    if store.exists() {
        match store.last_updated() {
            Some(at) => {
                let age = chrono::Utc::now().signed_duration_since(at);
                println!(
                    "  stored, credentials updated {} ({}h ago)",
                    at.to_rfc3339(),
                    age.num_hours()
                );
            }
            None => println!("  stored"),
        }
    } else {
        println!("  none (run `wagate pair` or scan /qr after `wagate serve`)");
    }

    let cache = GroupCache::load(shellexpand(&cfg.groups.snapshot_file));
    println!(
        "Groups:    {} cached in {}",
        cache.count().await,
        cache.path().display()
    );
    Ok(())
}

/// Connect without the HTTP server and render pairing codes in the
/// terminal until the session opens.
async fn pair(cfg: &Config) -> anyhow::Result<()> {
    let store = session_store(cfg);
    let connector = WhatsAppConnector::new(store.clone(), cfg.whatsapp.device_name.clone());

    loop {
        let (tx, mut rx) = mpsc::channel(64);
        let session = connector.open(tx).await?;

        while let Some(event) = rx.recv().await {
            match event {
                SessionEvent::PairingCode(code) => {
                    println!("\n{}", generate_qr_terminal(&code)?);
                    println!("Scan with WhatsApp > Linked devices\n");
                }
                SessionEvent::CredentialsUpdated => {
                    if let Err(e) = store.save() {
                        warn!("failed to save credentials: {e}");
                    }
                }
                SessionEvent::Opened => {
                    println!("Paired. Session stored in {}", store.dir().display());
                    session.close().await;
                    return Ok(());
                }
                SessionEvent::Closed(CloseReason::LoggedOut) => {
                    session.close().await;
                    anyhow::bail!("logged out during pairing; retry with a fresh session");
                }
                SessionEvent::Closed(CloseReason::Other(reason)) => {
                    info!("connection closed during pairing ({reason}), reconnecting");
                    break;
                }
                SessionEvent::GroupsChanged => {}
            }
        }
        session.close().await;
    }
}
