use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use tracing::{debug, error};
use uuid::Uuid;

use glimpse_db::{Database, StoreError, StoreResult};
use glimpse_types::api::LikeResponse;
use glimpse_types::models::SessionIdentity;

use crate::auth::AppState;
use crate::{blocking, parse_id};
use crate::error::ApiError;
use crate::middleware::Session;

/// The two store operations the toggle is built from. Both must report
/// `StoreError::NotFound` / `StoreError::UniqueViolation` precisely.
pub trait LikeStore: Send + Sync + 'static {
    fn delete_like(&self, user_id: &str, post_id: &str) -> StoreResult<()>;
    fn insert_like(&self, user_id: &str, post_id: &str) -> StoreResult<()>;
}

impl LikeStore for Database {
    fn delete_like(&self, user_id: &str, post_id: &str) -> StoreResult<()> {
        Database::delete_like(self, user_id, post_id)
    }

    fn insert_like(&self, user_id: &str, post_id: &str) -> StoreResult<()> {
        Database::insert_like(self, user_id, post_id)
    }
}

/// Flips a user's like on a post.
///
/// The store's (user, post) key is the only source of truth: the engine
/// deletes first and only inserts when the delete found nothing. Two
/// concurrent toggles on the same pair can both miss on delete; the second
/// insert is then rejected by the key and reported as "liked".
pub struct LikeToggleEngine<S: LikeStore> {
    store: Arc<S>,
}

impl<S: LikeStore> LikeToggleEngine<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Returns the new state: `true` when the post is now liked.
    pub async fn toggle(
        &self,
        identity: Option<&SessionIdentity>,
        post_id: Uuid,
    ) -> Result<bool, ApiError> {
        let identity = identity.ok_or(ApiError::Unauthenticated)?;
        let user_id = identity.id.to_string();
        let post_id = post_id.to_string();

        let store = self.store.clone();
        let (uid, pid) = (user_id.clone(), post_id.clone());
        let removed = blocking(move || store.delete_like(&uid, &pid))
            .await
            .map_err(|_| ApiError::ToggleFailed)?;

        match removed {
            Ok(()) => {
                debug!("{} unliked post {}", user_id, post_id);
                return Ok(false);
            }
            Err(StoreError::NotFound) => {}
            Err(e) => {
                error!("Error removing like on {} for {}: {}", post_id, user_id, e);
                return Err(ApiError::ToggleFailed);
            }
        }

        let store = self.store.clone();
        let (uid, pid) = (user_id.clone(), post_id.clone());
        let inserted = blocking(move || store.insert_like(&uid, &pid))
            .await
            .map_err(|_| ApiError::ToggleFailed)?;

        match inserted {
            Ok(()) => {
                debug!("{} liked post {}", user_id, post_id);
                Ok(true)
            }
            Err(StoreError::UniqueViolation) => {
                debug!("{} already liked post {} (concurrent toggle)", user_id, post_id);
                Ok(true)
            }
            Err(e) => {
                error!("Error adding like on {} for {}: {}", post_id, user_id, e);
                Err(ApiError::ToggleFailed)
            }
        }
    }
}

/// POST /posts/{post_id}/like
pub async fn like_post(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
    Session(identity): Session,
) -> Result<impl IntoResponse, ApiError> {
    if identity.is_none() {
        return Err(ApiError::Unauthenticated);
    }
    let post_id = parse_id(&post_id, "post")?;
    let liked = state.likes.toggle(identity.as_ref(), post_id).await?;
    Ok(Json(LikeResponse { liked }))
}
