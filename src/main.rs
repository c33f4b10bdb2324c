use std::{net::Ipv4Addr, sync::Arc};

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use taskboard::{config::Config, create_app, db, AppState};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env().expect("reading configuration");

    let state = AppState {
        db: db::Database::new(),
        base_path: Arc::new(config.base_path.clone()),
    };
    let app = create_app(state.clone());
    let addr = (Ipv4Addr::UNSPECIFIED, config.port);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("binding listener");

    // Requests are answered with 503 until the store is open.
    let db_path = config.db_path.clone();
    tokio::spawn(async move {
        match tokio::task::spawn_blocking(move || db::init_db(&db_path)).await {
            Ok(Ok(pool)) => {
                state.db.connect(pool);
                info!(path = ?config.db_path, "store ready");
            }
            Ok(Err(err)) => error!(error = %err, path = ?config.db_path, "opening store failed"),
            Err(err) => error!(error = %err, "store initialization panicked"),
        }
    });

    info!("running on {addr:?}");

    axum::serve(listener, app).await.expect("failed serving");
}
