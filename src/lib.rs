pub mod config;
pub mod db;
pub mod error;
pub mod filter;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod task_lists;

use std::sync::Arc;

use axum::{
    routing::{delete, get, post},
    Router,
};
use db::Database;

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub base_path: Arc<String>,
}

/// Routes the task CRUD endpoints and the task list index, nested under
/// `base_path` when one is configured.
pub fn create_app(state: AppState) -> Router {
    let base_path = state.base_path.clone();

    let app_routes = Router::new()
        .route("/task", get(handlers::api::list_tasks))
        .route("/task/add", post(handlers::api::add_task))
        .route("/task/{id}", get(handlers::api::get_task))
        .route("/update/{id}", post(handlers::api::update_existing_task))
        .route("/taskLists", get(handlers::api::list_task_lists))
        .route("/{id}", delete(handlers::api::delete_existing_task))
        .layer(
            tower::ServiceBuilder::new()
                .layer(tower_http::trace::TraceLayer::new_for_http())
                .layer(tower_http::compression::CompressionLayer::new()),
        )
        .with_state(state);

    tracing::info!("base_path: {base_path:?}");

    if base_path.is_empty() {
        app_routes
    } else {
        Router::new().nest(&*base_path, app_routes)
    }
}
