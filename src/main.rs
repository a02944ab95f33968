use std::sync::Arc;

use cineadmin::{AppState, admin::AdminSite, config::Config, db, routes};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info,cineadmin=debug,sqlx=warn".to_string()),
        )
        .init();

    let config = Arc::new(Config::from_env()?);

    let db = db::connect_and_migrate(&config.database_url).await?;
    let site = Arc::new(AdminSite::catalog(&config)?);
    tracing::info!(models = site.index().len(), "admin site ready");

    let state = Arc::new(AppState { config: config.clone(), db, site });
    let app = routes::router(state);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    tracing::info!(addr = %config.addr, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}
