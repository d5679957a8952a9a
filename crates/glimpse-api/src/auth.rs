use std::sync::Arc;

use axum::{Json, extract::State, response::IntoResponse};

use glimpse_db::Database;
use glimpse_types::api::{GoogleLoginRequest, LoginResponse};

use crate::error::ApiError;
use crate::feed::FeedAggregator;
use crate::identity::{IdentityProvider, IdentityProvisioner};
use crate::likes::LikeToggleEngine;
use crate::middleware::SessionResolver;
use crate::posts::{ImageHost, PostCreator};
use crate::token::TokenCodec;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub sessions: SessionResolver,
    pub provisioner: IdentityProvisioner,
    pub likes: LikeToggleEngine<Database>,
    pub feed: FeedAggregator,
    pub posts: PostCreator,
}

impl AppStateInner {
    pub fn new(
        db: Arc<Database>,
        tokens: TokenCodec,
        session_cookie: &str,
        provider: Arc<dyn IdentityProvider>,
        images: Arc<dyn ImageHost>,
    ) -> AppState {
        let tokens = Arc::new(tokens);

        Arc::new(Self {
            sessions: SessionResolver::new(tokens.clone(), session_cookie),
            provisioner: IdentityProvisioner::new(db.clone(), provider, tokens),
            likes: LikeToggleEngine::new(db.clone()),
            feed: FeedAggregator::new(db.clone()),
            posts: PostCreator::new(db.clone(), images),
            db,
        })
    }
}

/// POST /auth/google — exchange a Google ID token for a session token.
pub async fn login_with_google(
    State(state): State<AppState>,
    Json(req): Json<GoogleLoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let token = state.provisioner.login_with_assertion(&req.token).await?;
    Ok(Json(LoginResponse { token }))
}
