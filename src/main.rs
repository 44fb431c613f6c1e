use anyhow::Context;
use tokio::{net::TcpListener, signal};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use trending_worker::{
    app::{ComponentRegistry, build_router},
    config::Config,
    scheduler::{IntervalCadence, daemon::spawn_interval_daemon},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    std::panic::set_hook(Box::new(|panic_info| {
        let thread = std::thread::current();
        let thread_name = thread.name().unwrap_or("unnamed");
        let message = panic_info
            .payload()
            .downcast_ref::<&str>()
            .copied()
            .or_else(|| {
                panic_info
                    .payload()
                    .downcast_ref::<String>()
                    .map(String::as_str)
            })
            .unwrap_or("unknown panic payload");

        if let Some(location) = panic_info.location() {
            error!(
                thread = thread_name,
                file = location.file(),
                line = location.line(),
                message,
                "panic occurred"
            );
        } else {
            error!(thread = thread_name, message, "panic occurred without location information");
        }
    }));

    // Tracing initialization is handled by Telemetry::new()
    let config = Config::from_env().context("failed to load configuration")?;
    let bind_addr = config.http_bind();
    let shutdown = CancellationToken::new();
    let registry = ComponentRegistry::build(&config, shutdown.clone())
        .context("failed to build component registry")?;

    let daemon = match config.schedule_interval().and_then(IntervalCadence::new) {
        Some(cadence) => Some(spawn_interval_daemon(
            registry.scheduler().clone(),
            cadence,
            config.schedule_scope(),
            shutdown.child_token(),
        )),
        None => {
            info!("interval daemon disabled; runs are triggered over HTTP only");
            None
        }
    };

    let router = build_router(registry);
    let listener = TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind listener on {bind_addr}"))?;
    info!(%bind_addr, "listening");

    let server_shutdown = shutdown.clone();
    if let Err(error) = axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            server_shutdown.cancel();
        })
        .await
    {
        warn!(error = %error, "server exited with error");
    }

    shutdown.cancel();
    if let Some(handle) = daemon {
        if let Err(error) = handle.await {
            error!(error = %error, "interval daemon task failed");
        }
    }

    info!("shutdown complete");
    Ok(())
}

/// SIGTERM または SIGINT (Ctrl+C) を待つ。
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received SIGINT, initiating graceful shutdown"),
        () = terminate => info!("received SIGTERM, initiating graceful shutdown"),
    }
}
