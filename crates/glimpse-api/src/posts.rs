use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::{error, info};
use uuid::Uuid;

use glimpse_db::Database;
use glimpse_types::api::CreatePostRequest;
use glimpse_types::models::{Post, SessionIdentity};

use crate::auth::AppState;
use crate::blocking;
use crate::error::ApiError;
use crate::middleware::Session;

/// Where post images end up. `upload` takes whatever the client sent
/// (a URL or a data URI) and returns the URL to store.
#[async_trait]
pub trait ImageHost: Send + Sync {
    async fn upload(&self, source: &str) -> anyhow::Result<String>;
}

/// Stores the client-supplied URL unchanged. Used when no upload
/// endpoint is configured.
pub struct PassthroughImageHost;

#[async_trait]
impl ImageHost for PassthroughImageHost {
    async fn upload(&self, source: &str) -> anyhow::Result<String> {
        Ok(source.to_string())
    }
}

/// Unsigned upload to a Cloudinary-style endpoint.
pub struct HttpImageHost {
    client: reqwest::Client,
    endpoint: String,
    upload_preset: Option<String>,
}

#[derive(Deserialize)]
struct UploadResult {
    secure_url: String,
}

impl HttpImageHost {
    pub fn new(endpoint: impl Into<String>, upload_preset: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            upload_preset,
        }
    }
}

#[async_trait]
impl ImageHost for HttpImageHost {
    async fn upload(&self, source: &str) -> anyhow::Result<String> {
        let mut form = vec![("file", source)];
        if let Some(preset) = &self.upload_preset {
            form.push(("upload_preset", preset.as_str()));
        }

        let result = self
            .client
            .post(&self.endpoint)
            .form(&form)
            .send()
            .await?
            .error_for_status()?
            .json::<UploadResult>()
            .await?;

        Ok(result.secure_url)
    }
}

pub struct PostCreator {
    db: Arc<Database>,
    images: Arc<dyn ImageHost>,
}

impl PostCreator {
    pub fn new(db: Arc<Database>, images: Arc<dyn ImageHost>) -> Self {
        Self { db, images }
    }

    pub async fn create(
        &self,
        identity: Option<&SessionIdentity>,
        req: CreatePostRequest,
    ) -> Result<Post, ApiError> {
        let identity = identity.ok_or(ApiError::Unauthenticated)?;

        if req.img_url.trim().is_empty() {
            return Err(ApiError::BadRequest("Image URL is required".into()));
        }

        let img_url = self.images.upload(&req.img_url).await.map_err(|e| {
            error!("Image upload failed for {}: {:#}", identity.id, e);
            ApiError::UploadFailed
        })?;

        let db = self.db.clone();
        let post_id = Uuid::new_v4().to_string();
        let author_id = identity.id.to_string();
        let content = req.content;
        let row = blocking(move || db.insert_post(&post_id, &author_id, content.as_deref(), &img_url))
            .await
            .map_err(|_| ApiError::PersistFailed)?
            .map_err(|e| {
                error!("Failed to store post for {}: {}", identity.id, e);
                ApiError::PersistFailed
            })?;

        let post = row.into_post().map_err(|e| {
            error!("Stored post did not read back: {}", e);
            ApiError::PersistFailed
        })?;

        info!("Post {} created by {}", post.id, identity.username);
        Ok(post)
    }
}

/// POST /posts
pub async fn create_post(
    State(state): State<AppState>,
    Session(identity): Session,
    body: Result<Json<CreatePostRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    if identity.is_none() {
        return Err(ApiError::Unauthenticated);
    }
    let Json(req) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let post = state.posts.create(identity.as_ref(), req).await?;
    Ok((StatusCode::CREATED, Json(post)))
}
