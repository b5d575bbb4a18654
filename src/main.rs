use std::net::{SocketAddr, TcpListener};

use tracing_subscriber::EnvFilter;
use videotube::{build_app, config::AppConfig, run_app};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("videotube=info,tower_http=info")),
        )
        .init();

    if let Err(error) = serve().await {
        tracing::error!("Error: {:#}", error);
        std::process::exit(1);
    }
}

async fn serve() -> videotube::Result<()> {
    let config = AppConfig::from_env()?;
    let listener = TcpListener::bind(SocketAddr::from(([0, 0, 0, 0], config.port)))?;
    let router = build_app(config).await?;
    run_app(router, listener).await
}
