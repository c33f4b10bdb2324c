use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use tracing::warn;

use crate::db::DbPool;
use crate::error::AppError;
use crate::AppState;

/// A request that found the store connected.
pub struct Ready(pub DbPool);

impl FromRequestParts<AppState> for Ready {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match state.db.pool() {
            Ok(pool) => Ok(Ready(pool.clone())),
            Err(err) => {
                warn!(method = %parts.method, uri = %parts.uri, "Store not ready");
                Err(err)
            }
        }
    }
}
