//! signalbox-feed entry point.
//!
//! Connects to the simulation gateway and serves the local control API.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;

use signalbox_feed::api;
use signalbox_feed::app_state::AppState;
use signalbox_feed::config::FeedConfig;
use signalbox_feed::domain::{EventBus, FeedEvent, format_as_clock};
use signalbox_feed::service::ConnectionManager;
use signalbox_feed::transport::StompTransport;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    let subscriber = tracing_subscriber::fmt().with_env_filter(
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    );
    if std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json")) {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    // Load configuration
    let config = FeedConfig::from_env().context("loading configuration")?;
    let target = config.session_target();
    tracing::info!(gateway = %target, "starting signalbox-feed");

    // Build the session layer
    let event_bus = EventBus::new(config.event_bus_capacity);
    let transport = Arc::new(StompTransport::new(config.transport_options()));
    let manager = Arc::new(ConnectionManager::new(
        transport,
        event_bus.clone(),
        config.feed_settings(),
    ));

    tokio::spawn(log_events(event_bus.subscribe(), Arc::clone(&manager)));

    if config.autoconnect {
        manager.connect(target.clone()).await;
    }

    if config.api_enabled {
        let app = api::build_app(AppState::new(Arc::clone(&manager), target));
        let listener = tokio::net::TcpListener::bind(config.listen_addr)
            .await
            .with_context(|| format!("binding {}", config.listen_addr))?;
        tracing::info!(addr = %config.listen_addr, "control api listening");
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
    } else {
        shutdown_signal().await;
    }

    manager.disconnect().await;
    tracing::info!("signalbox-feed stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}

/// Logs every event published on the bus.
async fn log_events(mut rx: broadcast::Receiver<FeedEvent>, manager: Arc<ConnectionManager>) {
    loop {
        match rx.recv().await {
            Ok(FeedEvent::Status { status, .. }) => {
                tracing::info!(?status, "feed status");
            }
            Ok(FeedEvent::Error { kind, message, .. }) => {
                tracing::warn!(%kind, %message, "feed error");
            }
            Ok(FeedEvent::Message {
                destination,
                message,
                ..
            }) => {
                let clock = manager.clock_view().await;
                tracing::debug!(
                    %destination,
                    kind = message.kind_str(),
                    clock = %format_as_clock(clock.simulated_seconds_at(Instant::now())),
                    "feed message"
                );
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                tracing::warn!(lagged = n, "event logger lagged behind event bus");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
