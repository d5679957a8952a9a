use std::collections::HashMap;
use std::sync::Arc;

use axum::{Json, extract::State, response::IntoResponse};
use tracing::error;
use uuid::Uuid;

use glimpse_db::models::{LikeRow, PostRow};
use glimpse_db::{Database, StoreError};
use glimpse_types::api::EnrichedPost;
use glimpse_types::models::{SessionIdentity, User};

use crate::auth::AppState;
use crate::blocking;
use crate::error::ApiError;
use crate::middleware::Session;

/// Posts per feed page.
pub const FEED_PAGE_SIZE: u32 = 5;

pub struct FeedAggregator {
    db: Arc<Database>,
}

impl FeedAggregator {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// The newest posts with like counts and the viewer's own like flag.
    /// Anonymous viewers get `None`: the feed is only for signed-in users.
    ///
    /// Two queries regardless of page size: the page itself, then every
    /// like on the page's posts.
    pub async fn get_feed(
        &self,
        identity: Option<&SessionIdentity>,
    ) -> Result<Option<Vec<EnrichedPost>>, ApiError> {
        let Some(identity) = identity else {
            return Ok(None);
        };

        let db = self.db.clone();
        let (rows, like_rows) = blocking(move || {
            let rows = db.get_recent_posts(FEED_PAGE_SIZE)?;
            let post_ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
            let like_rows = db.get_likes_for_posts(&post_ids)?;
            Ok::<_, StoreError>((rows, like_rows))
        })
        .await?
        .map_err(|e| {
            error!("Failed to load feed: {}", e);
            ApiError::Internal
        })?;

        let posts = enrich(rows, &like_rows, &identity.id.to_string()).map_err(|e| {
            error!("Corrupt post in feed: {}", e);
            ApiError::Internal
        })?;

        Ok(Some(posts))
    }

    /// Resolve a post's author. Called per post, only when a client asks.
    pub async fn author(&self, author_id: Uuid) -> Result<Option<User>, ApiError> {
        let db = self.db.clone();
        let row = blocking(move || db.get_user_by_id(&author_id.to_string()))
            .await?
            .map_err(|e| {
                error!("Failed to load user {}: {}", author_id, e);
                ApiError::Internal
            })?;

        row.map(|r| r.into_user())
            .transpose()
            .map_err(|e| {
                error!("Corrupt user {}: {}", author_id, e);
                ApiError::Internal
            })
    }
}

fn enrich(
    rows: Vec<PostRow>,
    like_rows: &[LikeRow],
    viewer_id: &str,
) -> Result<Vec<EnrichedPost>, StoreError> {
    // post_id -> (like count, viewer liked)
    let mut likes: HashMap<&str, (usize, bool)> = HashMap::new();
    for like in like_rows {
        let entry = likes.entry(like.post_id.as_str()).or_default();
        entry.0 += 1;
        if like.user_id == viewer_id {
            entry.1 = true;
        }
    }

    rows.into_iter()
        .map(|row| {
            let (total_like_count, user_has_liked) =
                likes.get(row.id.as_str()).copied().unwrap_or_default();
            Ok(EnrichedPost {
                post: row.into_post()?,
                total_like_count,
                user_has_liked,
            })
        })
        .collect()
}

/// GET /feed
pub async fn get_feed_posts(
    State(state): State<AppState>,
    Session(identity): Session,
) -> Result<impl IntoResponse, ApiError> {
    let posts = state.feed.get_feed(identity.as_ref()).await?;
    Ok(Json(posts))
}
