use dotenvy::dotenv;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use boxoffice_server::config::Config;
use boxoffice_server::handlers::AppState;
use boxoffice_server::routes::create_routes;
use boxoffice_server::services::BoxOffice;
use boxoffice_server::store::{MemoryStore, PgStore, Repository};
use boxoffice_server::utils::SystemClock;

#[tokio::main]
async fn main() {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::from_env();

    let repo: Arc<dyn Repository> = match &config.database_url {
        Some(url) => {
            let store = PgStore::connect(url, config.database_max_connections)
                .await
                .expect("Failed to connect to database");
            store.migrate().await.expect("Failed to run migrations");
            Arc::new(store)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using the in-memory store");
            Arc::new(MemoryStore::new())
        }
    };

    let box_office = Arc::new(BoxOffice::new(
        repo,
        Arc::new(SystemClock),
        config.hold_duration(),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = config
        .sweep_interval()
        .map(|period| box_office.sweeper().spawn(period, shutdown_rx));

    let app = create_routes(AppState::new(box_office));

    let addr = config.bind_address();
    let listener = TcpListener::bind(&addr)
        .await
        .expect("Failed to bind address");
    tracing::info!("Server running at http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server failed");

    let _ = shutdown_tx.send(true);
    if let Some(handle) = sweeper {
        let _ = handle.await;
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
