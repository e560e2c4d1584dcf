use std::net::SocketAddr;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::services::ServeDir;
use tower_sessions::{cookie::SameSite, Expiry, MemoryStore, SessionManagerLayer};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod auth;
mod config;
mod db;
mod domain;
mod error;
mod rest;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = config::Config::load();

    info!("Setting up database");
    let db = db::DbConnection::new(&config.database_url).await?;

    let state = rest::AppState::new(db, config.avatar_dir.clone());

    let session_store = MemoryStore::default();
    let session_layer = SessionManagerLayer::new(session_store)
        .with_secure(false)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::hours(24)));

    let app = Router::new()
        .route("/signup", post(auth::signup))
        .route("/login", post(auth::login))
        .route("/logout", get(auth::logout))
        .route("/api/log-mood/", post(rest::log_mood))
        .route("/api/weekly/", get(rest::weekly_moods))
        .route("/api/monthly/", get(rest::monthly_moods))
        .route("/daily-moods/", get(rest::daily_moods))
        .route("/change-avatar/", post(rest::change_avatar))
        .nest_service("/media/avatars", ServeDir::new(&config.avatar_dir))
        .layer(session_layer)
        .with_state(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
