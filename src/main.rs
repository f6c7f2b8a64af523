use std::net::SocketAddr;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use daybook::config::Config;
use daybook::db::connect_to_db;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("daybook=info,tower_http=info")),
        )
        .init();

    let config = Config::load()?;
    let addr: SocketAddr = config
        .bind_address
        .parse()
        .with_context(|| format!("Invalid bind address {}", config.bind_address))?;
    let pool = connect_to_db(&config.database_url).await?;
    let app = daybook::app(pool, config)?;

    tracing::info!(%addr, "listening");
    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await
        .context("Server error")
}
