use std::net::SocketAddr;

use anyhow::Context;

#[derive(Clone, Debug)]
pub struct Config {
    pub addr: SocketAddr,
    pub database_url: String,
    pub tmdb_access_token: String,
    pub tmdb_base_url: String,
    pub tmdb_image_base_url: String,
    pub tmdb_rps: u32,
    pub tmdb_cache_minutes: i64,
    pub watch_region: String,
    pub cookie_secret: Option<String>,
    pub max_concurrent: usize,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port: u16 =
            std::env::var("PORT").unwrap_or_else(|_| "3000".to_string()).parse().context("PORT")?;

        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://filmclub.db?mode=rwc".to_string());

        let tmdb_access_token = std::env::var("TMDB_ACCESS_TOKEN").unwrap_or_default();
        let tmdb_base_url = std::env::var("TMDB_BASE_URL")
            .unwrap_or_else(|_| "https://api.themoviedb.org/3".to_string());
        let tmdb_image_base_url = std::env::var("TMDB_IMAGE_BASE_URL")
            .unwrap_or_else(|_| "https://image.tmdb.org/t/p".to_string());

        let tmdb_rps: u32 =
            std::env::var("TMDB_RPS").ok().and_then(|s| s.parse().ok()).unwrap_or(4);

        let tmdb_cache_minutes: i64 =
            std::env::var("TMDB_CACHE_MINUTES").ok().and_then(|s| s.parse().ok()).unwrap_or(30);

        let watch_region = std::env::var("WATCH_REGION")
            .ok()
            .map(|s| s.trim().to_uppercase())
            .filter(|s| s.len() == 2)
            .unwrap_or_else(|| "FI".to_string());

        let cookie_secret = std::env::var("COOKIE_SECRET").ok().filter(|s| !s.trim().is_empty());

        let max_concurrent: usize =
            std::env::var("MAX_CONCURRENT_REQUESTS").ok().and_then(|s| s.parse().ok()).unwrap_or(4);

        Ok(Self {
            addr: format!("{host}:{port}").parse().context("HOST/PORT")?,
            database_url,
            tmdb_access_token,
            tmdb_base_url,
            tmdb_image_base_url,
            tmdb_rps,
            tmdb_cache_minutes,
            watch_region,
            cookie_secret,
            max_concurrent,
        })
    }
}
