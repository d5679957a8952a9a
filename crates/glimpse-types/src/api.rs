use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::Post;

// -- JWT Claims --

/// Session token claims. Only the user id and username travel in the token;
/// everything else is looked up from the store when needed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub iat: usize,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GoogleLoginRequest {
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
}

// -- Posts --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreatePostRequest {
    pub content: Option<String>,
    #[serde(default)]
    pub img_url: String,
}

/// A feed entry: the post plus per-viewer like data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichedPost {
    #[serde(flatten)]
    pub post: Post,
    pub total_like_count: usize,
    pub user_has_liked: bool,
}

// -- Likes --

#[derive(Debug, Serialize, Deserialize)]
pub struct LikeResponse {
    pub liked: bool,
}
