mod config;

use std::sync::Arc;

use axum::http::{HeaderValue, Method, header};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use glimpse_api::AppStateInner;
use glimpse_api::identity::GoogleTokenInfo;
use glimpse_api::posts::{HttpImageHost, ImageHost, PassthroughImageHost};
use glimpse_api::token::TokenCodec;
use glimpse_db::Database;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "glimpse=debug,glimpse_api=debug,glimpse_db=info,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    // Init database
    let db = Arc::new(Database::open(&config.db_path)?);

    let tokens = TokenCodec::with_ttl(
        &config.jwt_secret,
        chrono::Duration::days(config.token_ttl_days),
    );
    let provider = Arc::new(GoogleTokenInfo::new(config.tokeninfo_url.clone()));
    let images: Arc<dyn ImageHost> = match &config.image_upload_url {
        Some(url) => {
            info!("Uploading post images to {}", url);
            Arc::new(HttpImageHost::new(url.clone(), config.image_upload_preset.clone()))
        }
        None => {
            info!("No image upload endpoint configured; storing image URLs as given");
            Arc::new(PassthroughImageHost)
        }
    };

    let state = AppStateInner::new(db, tokens, &config.session_cookie, provider, images);

    let app = glimpse_api::router(state)
        .layer(cors_layer(config.cors_origin.as_deref())?)
        .layer(TraceLayer::new_for_http());

    info!("Glimpse server listening on {}", config.addr);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn cors_layer(origin: Option<&str>) -> anyhow::Result<CorsLayer> {
    let Some(origin) = origin else {
        return Ok(CorsLayer::permissive());
    };

    // Cookies only cross origins with credentials, which rules out a wildcard.
    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::exact(HeaderValue::from_str(origin)?))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true))
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(signal) => signal,
                Err(e) => {
                    tracing::warn!("Failed to install SIGTERM handler: {}", e);
                    ctrl_c.await.ok();
                    info!("Received Ctrl+C, shutting down...");
                    return;
                }
            };
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
