use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use axum::Router;
use tower_http::trace::TraceLayer;

use auth_core::{
    auth::{SessionStore, bootstrap},
    config::AppConfig,
    db::connection,
    logging::init_tracing,
    routes::{catch_panic_layer, router},
    state::AppState,
};

#[tokio::main]
async fn main() {
    let cfg = match AppConfig::from_env() {
        Ok(cfg) => cfg,
        Err(err) => {
            // No subscriber exists until the config is read.
            eprintln!("failed to load config: {err:?}");
            std::process::exit(1);
        }
    };
    init_tracing(&cfg.logging);

    if let Err(err) = run(cfg).await {
        tracing::error!("server failed: {err:?}");
        std::process::exit(1);
    }
}

async fn run(cfg: AppConfig) -> anyhow::Result<()> {

    let db = match cfg.database.as_ref() {
        Some(db_cfg) => Some(connection::connect(db_cfg).await?),
        None => None,
    };
    let services = bootstrap::init(&cfg, db.as_ref()).await?;

    if let Some(auth) = cfg.auth.as_ref()
        && let Some(every) = auth.session_sweep_interval()
    {
        spawn_session_sweep(services.session_store.clone(), every);
    }

    let addr: SocketAddr = format!("{}:{}", cfg.general.host, cfg.general.port)
        .parse()
        .context("invalid host/port")?;
    let state = AppState::new(cfg, services);

    let app = Router::new()
        .merge(router(Arc::clone(&state)))
        .layer(catch_panic_layer())
        .layer(TraceLayer::new_for_http());

    tracing::info!("listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn spawn_session_sweep(store: Arc<dyn SessionStore>, every: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match store.purge_expired().await {
                Ok(0) => {}
                Ok(purged) => tracing::info!(purged, "expired refresh sessions purged"),
                Err(err) => tracing::warn!(error = %err, "session sweep failed"),
            }
        }
    });
}
