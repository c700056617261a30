use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use padelbook::auth::GatewayIdentity;
use padelbook::config::Config;
use padelbook::engine::Engine;
use padelbook::http::{self, AppState};
use padelbook::reaper;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(env_filter)
        .try_init()?;

    let config = Config::from_env();
    padelbook::observability::init(config.metrics_port)?;

    // Ensure data directory exists
    std::fs::create_dir_all(&config.data_dir)?;

    let engine = Arc::new(Engine::new(config.wal_path())?);
    if let Some((email, name)) = &config.admin {
        let admin = engine.ensure_admin(email, name).await?;
        info!("admin account: {} ({})", admin.email, admin.id);
    }

    tokio::spawn(reaper::run_completer(engine.clone(), config.sweep_interval));
    tokio::spawn(reaper::run_compactor(engine.clone(), config.compact_threshold));

    let identity = Arc::new(GatewayIdentity::new(engine.clone(), config.gateway_token.clone()));
    let app = http::router(AppState { engine, identity });

    let addr = config.listen_addr();
    let listener = TcpListener::bind(&addr).await?;
    info!("padelbook listening on {addr}");
    info!("  data_dir: {}", config.data_dir.display());
    info!("  gateway token: {}", if config.gateway_token.is_some() { "required" } else { "not required" });
    info!(
        "  metrics: {}",
        config
            .metrics_port
            .map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics"))
    );

    // Graceful shutdown: stop accepting on SIGTERM/ctrl-c, let in-flight requests finish
    #[cfg(unix)]
    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
    let shutdown = async move {
        let ctrl_c = tokio::signal::ctrl_c();
        #[cfg(unix)]
        {
            tokio::select! {
                _ = ctrl_c => {}
                _ = sigterm.recv() => {}
            }
        }
        #[cfg(not(unix))]
        {
            ctrl_c.await.ok();
        }
        info!("shutdown signal received, draining requests");
    };

    axum::serve(listener, app).with_graceful_shutdown(shutdown).await?;

    info!("padelbook stopped");
    Ok(())
}
