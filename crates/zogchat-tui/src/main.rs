// zogchat entry point.
//
// Startup sequence:
// 1. Parse the command line
// 2. Load config (writing the default file on first run)
// 3. Initialize tracing (log to file, not terminal)
// 4. Create mpsc channels
// 5. Spawn the app loop over a WebSocket transport
// 6. Run the TUI until the user quits
// 7. Cleanup on exit

use std::path::Path;

use anyhow::Context;
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{error, info};
use zogchat_app::app::{self, AppSettings};
use zogchat_app::session::{Role, Session, SessionSettings};
use zogchat_core::config::{self, LoggingConfig};
use zogchat_core::transport::WsTransport;
use zogchat_tui::cli::Args;
use zogchat_tui::tui::{self, ViewState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Command line
    let args = Args::parse();
    let role = args.role().context("invalid share link")?;

    // 2. Config
    let mut config =
        config::load_config(args.config.as_deref()).context("failed to load configuration")?;
    args.apply_overrides(&mut config);

    // 3. Tracing
    init_tracing(&config.logging)?;
    info!("zogchat starting up");
    match &role {
        Role::Creator => info!("Creating a new session"),
        Role::Guest {
            session_id,
            inviter,
        } => info!("Joining {session_id} (invited by {inviter:?})"),
    }

    // 4. Channels
    let (peer_tx, peer_rx) = mpsc::channel(256);
    let (cmd_tx, cmd_rx) = mpsc::channel(64);
    let (ui_tx, ui_rx) = mpsc::channel(256);

    // 5. App loop
    let transport = WsTransport::new(config.transport.clone(), peer_tx);
    let session = Session::new(role, SessionSettings::from_config(&config));
    let settings = AppSettings::from_config(&config);
    info!("Received files go to {}", settings.download_dir.display());
    let app_handle = tokio::spawn(async move {
        if let Err(e) = app::run(transport, peer_rx, cmd_rx, ui_tx, session, settings).await {
            error!("Application loop error: {}", e);
        }
    });

    // 6. TUI (blocks until the user quits)
    let view_state = ViewState::new(&config.identity.default_username);
    if let Err(e) = tui::run(ui_rx, cmd_tx, view_state).await {
        error!("TUI error: {:#}", e);
    }

    // 7. Cleanup: the TUI dropped cmd_tx, so the app loop winds down.
    let _ = tokio::time::timeout(std::time::Duration::from_secs(5), async {
        let _ = app_handle.await;
    })
    .await;

    info!("zogchat shut down cleanly");
    Ok(())
}

/// Initialize tracing to log to a file (the terminal belongs to the TUI).
fn init_tracing(logging: &LoggingConfig) -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = logging.resolve_dir();
    let log_dir = if log_dir.is_absolute() {
        log_dir
    } else {
        std::env::current_dir()?.join(log_dir)
    };
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("failed to create log directory {}", log_dir.display()))?;

    let log_file = std::fs::File::create(log_path(&log_dir))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.filter)),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}

fn log_path(dir: &Path) -> std::path::PathBuf {
    dir.join("zogchat.log")
}
