use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use tracing::warn;

use glimpse_db::Database;
use glimpse_types::models::{SessionIdentity, User};

use crate::auth::AppState;
use crate::{blocking, parse_id};
use crate::error::ApiError;
use crate::middleware::Session;

/// The signed-in user's record, or `None`. Store errors are logged and
/// read as "nobody".
pub async fn current_user(
    db: Arc<Database>,
    identity: Option<&SessionIdentity>,
) -> Option<User> {
    let id = identity?.id;

    let row = match blocking(move || db.get_user_by_id(&id.to_string())).await {
        Ok(Ok(row)) => row?,
        Ok(Err(e)) => {
            warn!("Failed to load current user {}: {}", id, e);
            return None;
        }
        Err(_) => return None,
    };

    row.into_user()
        .map_err(|e| warn!("Corrupt user {}: {}", id, e))
        .ok()
}

/// GET /me
pub async fn get_current_user(
    State(state): State<AppState>,
    Session(identity): Session,
) -> impl IntoResponse {
    Json(current_user(state.db.clone(), identity.as_ref()).await)
}

/// GET /users/{user_id} — resolves `Post.author`.
pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = parse_id(&user_id, "user")?;
    let user = state.feed.author(user_id).await?;
    Ok(Json(user))
}
