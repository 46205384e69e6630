//! Duel peer demo - two peers playing a short match in one process
//!
//! Both peers run against the loopback transport. The demo:
//! - Quick-starts both peers into the same room
//! - Exchanges a few shots, jumps and chat lines
//! - Tears both connections down after `DEMO_SECONDS`

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use duel_peer::net::LoopbackHub;
use duel_peer::{ClientContext, Config, PeerSession, SessionCommand};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing
    init_tracing(&config.log_level);

    info!("Starting duel peer demo");
    info!(
        region = %config.region,
        tps = config.fixed_tps,
        seat_policy = ?config.seat_policy,
        "Configuration loaded"
    );

    let hub = LoopbackHub::new(config.region.clone());

    let mut senders = Vec::new();
    let mut tasks = Vec::new();
    for _ in 0..2 {
        let transport = Arc::new(hub.add_peer());
        let session = PeerSession::new(ClientContext::new(config.clone(), transport));
        let (tx, rx) = mpsc::channel::<SessionCommand>(64);
        senders.push(tx);
        tasks.push(tokio::spawn(session.run(rx)));
    }

    // Stagger the joins so the second peer finds the first one's room
    for tx in &senders {
        tokio::time::sleep(Duration::from_millis(200)).await;
        tx.send(SessionCommand::QuickStart).await?;
    }

    tokio::select! {
        outcome = play_script(&senders) => outcome?,
        _ = tokio::time::sleep(config.demo_duration) => {
            info!("Demo time is up");
        }
        _ = shutdown_signal() => {}
    }

    for tx in &senders {
        tx.send(SessionCommand::Exit).await?;
    }

    for outcome in futures::future::join_all(tasks).await {
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(error = %e, "Session failed"),
            Err(e) => error!(error = %e, "Session task panicked"),
        }
    }

    info!("Demo shutdown complete");
    Ok(())
}

/// Scripted inputs for both peers; runs until a session stops listening
async fn play_script(senders: &[mpsc::Sender<SessionCommand>]) -> anyhow::Result<()> {
    tokio::time::sleep(Duration::from_millis(500)).await;

    let opening = [
        SessionCommand::Chat("gl hf".to_string()),
        SessionCommand::Fire,
        SessionCommand::Jump,
    ];
    for command in opening {
        for tx in senders {
            tx.send(command.clone()).await?;
        }
        tokio::time::sleep(Duration::from_millis(300)).await;
    }

    let mut volley = tokio::time::interval(Duration::from_secs(2));
    loop {
        volley.tick().await;
        for tx in senders {
            tx.send(SessionCommand::Fire).await?;
        }
    }
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

/// Ctrl+C / terminate signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
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
                error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        }
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        }
    }
}
