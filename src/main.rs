use castor::{BootstrapCallbacks, config::CONFIG, shared_manager};
use mimalloc::MiMalloc;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let cfg = &*CONFIG;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cfg.basic.loglevel.clone()));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_level(true)
                .with_target(false),
        )
        .init();

    info!(
        loglevel = %cfg.basic.loglevel,
        data_dir = %cfg
            .storage
            .data_dir
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<memory>".to_string()),
        database_name = %cfg.storage.database_name,
        artifacts = %cfg.artifacts.base_url,
        proxy = %cfg.artifacts.proxy.as_ref().map(|u| u.as_str()).unwrap_or("<none>"),
        allow_worker = cfg.execution.allow_worker,
    );

    let manager = shared_manager(cfg)?;

    if std::env::args().nth(1).as_deref() == Some("reset") {
        manager.reset_database().await;
        return Ok(());
    }

    let callbacks = BootstrapCallbacks::new()
        .on_progress(|event| {
            info!(
                phase = ?event.phase,
                progress = event.progress,
                cost_ms = ?event.cost_time,
                "Loading"
            );
        })
        .on_state_change(|state| info!(state = ?state, "Bootstrap state"))
        .on_error(|diagnostics| {
            error!(
                kind = %diagnostics.error.name,
                message = %diagnostics.error.message,
                "Bootstrap failed"
            );
        });

    let handle = manager.initialize(callbacks).await?;
    info!(
        mode = ?handle.mode(),
        storage = %handle.storage().describe(),
        "Database ready; press Ctrl+C to stop."
    );

    shutdown_signal().await;
    if let Err(e) = handle.close().await {
        warn!(error = %e, "Failed to close database cleanly");
    }
    info!("Database has shut down gracefully.");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
