use std::net::SocketAddr;

use anyhow::Context;

#[derive(Clone, Debug)]
pub struct Config {
    pub addr: SocketAddr,
    pub database_url: String,
    /// Rows per list page.
    pub page_size: u64,
    pub autocomplete_limit: u64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port: u16 =
            std::env::var("PORT").unwrap_or_else(|_| "3000".to_string()).parse().context("PORT")?;

        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://cineadmin.db?mode=rwc".to_string());

        let page_size: u64 =
            std::env::var("ADMIN_PAGE_SIZE").ok().and_then(|s| s.parse().ok()).unwrap_or(100);

        let autocomplete_limit: u64 =
            std::env::var("AUTOCOMPLETE_LIMIT").ok().and_then(|s| s.parse().ok()).unwrap_or(20);

        Ok(Self {
            addr: format!("{host}:{port}").parse().context("HOST/PORT")?,
            database_url,
            page_size: page_size.max(1),
            autocomplete_limit: autocomplete_limit.max(1),
        })
    }

    /// Settings for an in-memory database, used by tests and local tooling.
    pub fn in_memory() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            database_url: "sqlite::memory:".to_string(),
            page_size: 100,
            autocomplete_limit: 20,
        }
    }
}
