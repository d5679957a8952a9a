pub mod auth;
pub mod error;
pub mod feed;
pub mod identity;
pub mod likes;
pub mod middleware;
pub mod posts;
pub mod routes;
pub mod token;
pub mod users;

pub use auth::{AppState, AppStateInner};
pub use error::ApiError;
pub use routes::router;

use tracing::error;
use uuid::Uuid;

/// Run blocking store work off the async runtime.
pub(crate) async fn blocking<F, T>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Internal
    })
}

/// Parse an id taken from the request path.
pub(crate) fn parse_id(raw: &str, what: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::BadRequest(format!("Invalid {} id", what)))
}
