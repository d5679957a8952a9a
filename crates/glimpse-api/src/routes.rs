use axum::{
    Router, middleware,
    routing::{get, post},
};

use crate::auth::{self, AppState};
use crate::middleware::resolve_session;
use crate::{feed, likes, posts, users};

/// All API routes. Every request passes through `resolve_session` first;
/// handlers decide for themselves whether an anonymous caller is allowed.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/auth/google", post(auth::login_with_google))
        .route("/me", get(users::get_current_user))
        .route("/users/{user_id}", get(users::get_user))
        .route("/feed", get(feed::get_feed_posts))
        .route("/posts", post(posts::create_post))
        .route("/posts/{post_id}/like", post(likes::like_post))
        .route("/health", get(health))
        .layer(middleware::from_fn_with_state(state.clone(), resolve_session))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
