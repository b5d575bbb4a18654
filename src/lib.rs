mod authentication;
mod boundary;
pub mod config;
mod data_formats;
mod db_helpers;
mod errors;
mod handlers;
pub mod media;
mod models;

use anyhow::Context;
pub use anyhow::Result;
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::{middleware, Extension, Json, Router};
use config::{AppConfig, MediaConfig};
pub use errors::RequestError;
use media::MediaHost;
use sqlx::{migrate::MigrateDatabase, Sqlite, SqlitePool};
use std::{
    net::{SocketAddr, TcpListener},
    sync::Arc,
};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

pub type JsonResponse<T> = (StatusCode, Json<T>);

/// Process-wide state handed to every handler.
pub struct AppContext {
    pub pool: SqlitePool,
    pub config: Arc<AppConfig>,
    pub media: Arc<dyn MediaHost>,
}

pub async fn run_app(app: Router, listener: TcpListener) -> Result<()> {
    tracing::info!("Server started on {}", listener.local_addr()?);
    axum::Server::from_tcp(listener)?
        .serve(app.into_make_service())
        .await?;
    Ok(())
}

pub async fn init_db(db_url: &str) -> Result<SqlitePool> {
    if !Sqlite::database_exists(db_url).await.unwrap_or(false) {
        tracing::info!("Creating database {}", db_url);
        Sqlite::create_database(db_url)
            .await
            .context("Failed to create database")?;
    }
    let pool = SqlitePool::connect(db_url).await?;
    tracing::info!("Running migrations");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;
    tracing::info!("Migrations completed");
    Ok(pool)
}

/// Binds an ephemeral port on localhost.
pub fn get_random_free_port() -> Result<(TcpListener, SocketAddr)> {
    let listener = TcpListener::bind("127.0.0.1:0").context("Could not get a free port")?;
    let addr = listener.local_addr()?;
    Ok((listener, addr))
}

pub async fn build_app(config: AppConfig) -> Result<Router> {
    let media = media::media_host_from_config(&config.media)?;
    build_app_with_media(config, media).await
}

/// Like [`build_app`], storing uploads on `media` instead of the configured host.
pub async fn build_app_with_media(config: AppConfig, media: Arc<dyn MediaHost>) -> Result<Router> {
    let pool = init_db(&config.database_url).await?;
    let config = Arc::new(config);
    let ctx = Arc::new(AppContext {
        pool,
        config: config.clone(),
        media,
    });
    Ok(make_router(&config)?.layer(Extension(ctx)))
}

fn make_router(config: &AppConfig) -> Result<Router> {
    let mut router = Router::new().nest("/api/v1", handlers::api_routes(config.max_upload_bytes));
    if let MediaConfig::Local { root, .. } = &config.media {
        router = router.nest_service("/media", ServeDir::new(root));
    }
    Ok(router
        .fallback(boundary::not_found)
        .layer(CatchPanicLayer::custom(boundary::catch_panic))
        .layer(middleware::from_fn(boundary::translate_errors))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&config.cors_origin)?))
}

fn cors_layer(origin: &str) -> Result<CorsLayer> {
    if origin == "*" {
        return Ok(CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any));
    }
    // browsers refuse wildcards once credentials are allowed
    let origin = HeaderValue::from_str(origin).context("CORS_ORIGIN is not a valid origin")?;
    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT]))
}
