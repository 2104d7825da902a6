//! Low-resolution poster placeholders stored on movie rows so pages can
//! paint something before the real poster loads.

use base64::{Engine, engine::general_purpose::STANDARD};
use futures::{StreamExt, stream};
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use tracing::{debug, info, warn};

use crate::{AppState, db::now_sec, entities::movie, error::AppResult, tmdb::TmdbClient};

const PLACEHOLDER_SIZE: &str = "w92";

pub fn data_url(bytes: &[u8]) -> String {
    let mime = if bytes.starts_with(&[0x89, b'P', b'N', b'G']) {
        "image/png"
    } else if bytes.starts_with(b"RIFF") && bytes.get(8..12) == Some(&b"WEBP"[..]) {
        "image/webp"
    } else {
        "image/jpeg"
    };
    format!("data:{mime};base64,{}", STANDARD.encode(bytes))
}

/// Stores a placeholder for one movie. Returns `false` when there is nothing
/// to do (no poster, already enriched, or mock metadata).
pub async fn enrich_movie(
    db: &DatabaseConnection,
    tmdb: &TmdbClient,
    image_base_url: &str,
    movie_id: i32,
) -> AppResult<bool> {
    if tmdb.is_mock() {
        return Ok(false);
    }

    let Some(row) = movie::Entity::find_by_id(movie_id).one(db).await? else {
        return Ok(false);
    };
    if row.blur_data_url.is_some() {
        return Ok(false);
    }
    let Some(poster) = row.poster_path.clone() else {
        return Ok(false);
    };

    let url = format!("{}/{PLACEHOLDER_SIZE}{poster}", image_base_url.trim_end_matches('/'));
    let bytes = tmdb.image_bytes(&url).await?;

    let mut active: movie::ActiveModel = row.into();
    active.blur_data_url = Set(Some(data_url(&bytes)));
    active.updated_at = Set(now_sec());
    active.update(db).await?;

    debug!(movie_id, bytes = bytes.len(), "stored poster placeholder");
    Ok(true)
}

/// Enriches every movie that has a poster but no placeholder yet.
pub async fn enrich_missing(
    db: &DatabaseConnection,
    tmdb: &TmdbClient,
    image_base_url: &str,
    max_concurrent: usize,
) -> AppResult<usize> {
    if tmdb.is_mock() {
        return Ok(0);
    }

    let pending: Vec<i32> = movie::Entity::find()
        .filter(movie::Column::BlurDataUrl.is_null())
        .filter(movie::Column::PosterPath.is_not_null())
        .all(db)
        .await?
        .into_iter()
        .map(|m| m.id)
        .collect();

    debug!(pending = pending.len(), "enriching movies without placeholders");

    let done: Vec<bool> = stream::iter(pending)
        .map(|movie_id| async move {
            match enrich_movie(db, tmdb, image_base_url, movie_id).await {
                Ok(stored) => stored,
                Err(err) => {
                    warn!(movie_id, error = %err, "failed to enrich movie");
                    false
                },
            }
        })
        .buffer_unordered(max_concurrent.max(1))
        .collect()
        .await;

    let count = done.into_iter().filter(|d| *d).count();
    info!(count, "poster placeholders stored");
    Ok(count)
}

/// Fire-and-forget enrichment of a freshly inserted movie.
pub fn spawn_enrich(state: &AppState, movie_id: i32) {
    let db = state.db.clone();
    let tmdb = state.tmdb.clone();
    let image_base_url = state.config.tmdb_image_base_url.clone();
    tokio::spawn(async move {
        if let Err(err) = enrich_movie(&db, &tmdb, &image_base_url, movie_id).await {
            warn!(movie_id, error = %err, "failed to enrich movie");
        }
    });
}

/// Start-up sweep over movies still lacking a placeholder.
pub fn spawn_enrich_missing(state: &AppState) {
    let db = state.db.clone();
    let tmdb = state.tmdb.clone();
    let image_base_url = state.config.tmdb_image_base_url.clone();
    let max_concurrent = state.config.max_concurrent;
    tokio::spawn(async move {
        if let Err(err) = enrich_missing(&db, &tmdb, &image_base_url, max_concurrent).await {
            warn!(error = %err, "placeholder sweep failed");
        }
    });
}
