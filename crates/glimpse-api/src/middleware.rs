use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, header, request::Parts},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use tracing::debug;

use glimpse_types::models::SessionIdentity;

use crate::auth::AppState;
use crate::token::TokenCodec;

pub const DEFAULT_SESSION_COOKIE: &str = "__glimpse_token";

/// Works out who is making a request from its cookie or bearer token.
#[derive(Clone)]
pub struct SessionResolver {
    tokens: Arc<TokenCodec>,
    cookie_name: String,
}

impl SessionResolver {
    pub fn new(tokens: Arc<TokenCodec>, cookie_name: impl Into<String>) -> Self {
        Self {
            tokens,
            cookie_name: cookie_name.into(),
        }
    }

    /// The session cookie wins whenever it is present, even if the
    /// `Authorization` header also carries a token.
    pub fn token_from_headers(&self, headers: &HeaderMap) -> Option<String> {
        let jar = CookieJar::from_headers(headers);
        if let Some(cookie) = jar.get(&self.cookie_name) {
            return Some(cookie.value().to_string());
        }

        headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.strip_prefix("Bearer "))
            .map(str::to_string)
    }

    /// A bad or expired token makes the request anonymous; it is never an error.
    pub fn resolve(&self, headers: &HeaderMap) -> Option<SessionIdentity> {
        let token = self.token_from_headers(headers)?;

        match self.tokens.verify(&token) {
            Ok(identity) => Some(identity),
            Err(e) => {
                debug!("Ignoring session token: {}", e);
                None
            }
        }
    }
}

/// Identity attached to every request by `resolve_session`.
#[derive(Debug, Clone, Default)]
pub struct Session(pub Option<SessionIdentity>);

pub async fn resolve_session(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let identity = state.sessions.resolve(req.headers());
    req.extensions_mut().insert(Session(identity));
    next.run(req).await
}

impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts.extensions.get::<Session>().cloned().unwrap_or_default())
    }
}
