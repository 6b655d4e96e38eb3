//! Syncthing Notifier
//!
//! Auto-detects the local Syncthing instance and shows desktop notifications
//! for errors and conflicts until interrupted.
//!
//! # Usage
//!
//! ```bash
//! syncthing-notifier
//! syncthing-notifier --syncthing-config ~/.local/state/syncthing/config.xml
//! RUST_LOG=debug syncthing-notifier
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use syncthing_notifier::config::Args;
use syncthing_notifier::{
    discovery, CursorStore, DesktopNotifier, DiscoveryError, Monitor, NotifierError, Notifier,
    PreferenceStore, StreamClient,
};

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    if let Err(e) = run(args).await {
        eprintln!("\nError: {:#}", e);
        if is_discovery_error(&e) {
            eprintln!("\nMake sure Syncthing is installed and has been run at least once.");
        }
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    println!("Syncthing Notifier v{}", env!("CARGO_PKG_VERSION"));
    println!("{}", "-".repeat(40));

    let endpoint = discovery::discover(args.syncthing_config.as_deref())?;
    println!("✓ Found Syncthing: {}", endpoint.base_url);
    println!("✓ API Key: {}", endpoint.masked_key());

    let paths = args.paths();
    let preferences = PreferenceStore::new(&paths.preferences)
        .load_or_create()
        .context("Failed to prepare preferences")?;
    println!("✓ User config: {}", paths.preferences.display());
    println!("{}", "-".repeat(40));

    let notifier = DesktopNotifier::new();
    if !args.no_startup_notification {
        notifier.notify(
            "Syncthing Monitor Started",
            "",
            &format!("Monitoring {}", endpoint.base_url),
            preferences.notification_sound,
        );
    }

    let client = StreamClient::new(&endpoint).context("Failed to create HTTP client")?;

    let token = CancellationToken::new();
    let signal_token = token.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal_token.cancel();
    });

    info!("Monitoring Syncthing at {}", endpoint.base_url);
    info!("Config: {}", paths.preferences.display());

    let mut monitor = Monitor::new(client, notifier, CursorStore::new(&paths.cursor), preferences)
        .with_poll_timeout(args.poll_timeout());
    let last = monitor.run(token).await;

    info!("Stopped at event ID {}", last);
    Ok(())
}

fn is_discovery_error(e: &anyhow::Error) -> bool {
    e.chain().any(|cause| {
        cause.is::<DiscoveryError>()
            || matches!(cause.downcast_ref::<NotifierError>(), Some(NotifierError::Discovery(_)))
    })
}

/// Wait for Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down...");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down...");
        },
    }
}
