mod admin;
mod auth;
mod cache;
mod config;
mod dashboard;
mod db;
mod enrichment;
mod entities;
mod error;
mod models;
mod movies;
mod preferences;
mod raffle;
mod routes;
mod shortlists;
mod site_config;
mod templates;
#[cfg(test)]
mod testing;
mod tierlists;
mod tmdb;
mod users;

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context;
use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;
use clap::{Parser, Subcommand};
use sea_orm::DatabaseConnection;
use tokio::sync::Mutex;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{cache::ResponseCache, config::Config, tmdb::TmdbClient};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub tmdb: Arc<TmdbClient>,
    pub db: DatabaseConnection,
    pub cookie_key: Key,
    /// Serializes raffle finalization across requests.
    pub raffle_lock: Arc<Mutex<()>>,
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.cookie_key.clone()
    }
}

#[derive(Parser)]
#[command(name = "filmclub", about = "Movie club web service", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the web service (default)
    Serve,
    /// Write every table as pretty JSON into a directory
    Export {
        #[arg(long)]
        out: PathBuf,
    },
    /// Mark all migrations applied without running them
    StampMigrations,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info,filmclub=debug,sqlx=warn".to_string()),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Export { out } => {
            let db = db::connect(&config.database_url).await?;
            let written = admin::export(&db, &out).await?;
            let rows: usize = written.iter().map(|(_, n)| n).sum();
            tracing::info!(tables = written.len(), rows, out = %out.display(), "export finished");
            Ok(())
        },
        Command::StampMigrations => {
            let db = db::connect(&config.database_url).await?;
            let stamped = admin::stamp_migrations(&db).await?;
            tracing::info!(stamped = stamped.len(), "migrations stamped");
            Ok(())
        },
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let config = Arc::new(config);

    let http = reqwest::Client::builder()
        .user_agent("filmclub/0.1")
        .timeout(Duration::from_secs(30))
        .build()?;

    let db = db::connect_and_migrate(&config.database_url).await?;

    let cache = ResponseCache::new(db.clone(), config.tmdb_cache_minutes);
    match cache.purge_stale().await {
        Ok(purged) => tracing::info!(purged, "stale TMDB responses purged"),
        Err(err) => tracing::warn!(error = %err, "could not purge TMDB cache"),
    }

    let tmdb = TmdbClient::new(
        http,
        config.tmdb_access_token.clone(),
        config.tmdb_base_url.clone(),
        config.watch_region.clone(),
        config.tmdb_rps,
        cache,
    );

    let cookie_key = match &config.cookie_secret {
        Some(secret) => Key::try_from(secret.as_bytes())
            .context("COOKIE_SECRET must be at least 64 bytes")?,
        None => {
            tracing::warn!("COOKIE_SECRET not set; sessions will not survive a restart");
            Key::generate()
        },
    };

    let state = AppState {
        config: config.clone(),
        tmdb: Arc::new(tmdb),
        db,
        cookie_key,
        raffle_lock: Arc::default(),
    };

    enrichment::spawn_enrich_missing(&state);

    let app = routes::router(state)
        .layer(CorsLayer::new().allow_origin(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    tracing::info!(addr = %config.addr, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}
