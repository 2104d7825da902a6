use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TryInsertResult, sea_query::OnConflict,
};
use tracing::{debug, info};

use crate::{
    db::now_sec,
    entities::{movie, user},
    error::{AppError, AppResult},
    models::{MovieImages, UserView, WatchedMovie},
    tmdb::{MovieDetails, TmdbClient},
};

const MAX_STORED_IMAGES: usize = 10;

/// Returns the stored movie, fetching and storing a TMDB snapshot when it is
/// new to the club. The flag is `true` when a row was inserted.
pub async fn ensure_movie<C: ConnectionTrait>(
    db: &C,
    tmdb: &TmdbClient,
    movie_id: i32,
) -> AppResult<(movie::Model, bool)> {
    if let Some(existing) = movie::Entity::find_by_id(movie_id).one(db).await? {
        return Ok((existing, false));
    }

    debug!(movie_id, "fetching movie details for snapshot");
    let details = tmdb.movie_details(movie_id).await?;
    let inserted = movie::Entity::insert(snapshot(&details, tmdb.region(), now_sec())?)
        .on_conflict(OnConflict::column(movie::Column::Id).do_nothing().to_owned())
        .do_nothing()
        .exec(db)
        .await?;
    // a concurrent request may have stored it between the lookup and here
    let created = matches!(inserted, TryInsertResult::Inserted(_));

    let model = movie::Entity::find_by_id(movie_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::not_found(format!("movie {movie_id}")))?;

    if created {
        info!(movie_id, title = %model.title, "stored movie snapshot");
    }
    Ok((model, created))
}

pub fn snapshot(details: &MovieDetails, region: &str, now: i64) -> AppResult<movie::ActiveModel> {
    let images = details
        .images
        .as_ref()
        .map(|i| MovieImages {
            posters: i
                .posters
                .iter()
                .take(MAX_STORED_IMAGES)
                .map(|p| p.file_path.clone())
                .collect(),
            backdrops: i
                .backdrops
                .iter()
                .take(MAX_STORED_IMAGES)
                .map(|p| p.file_path.clone())
                .collect(),
        })
        .unwrap_or_default();

    let to_json = |v: serde_json::Result<serde_json::Value>| v.map_err(anyhow::Error::new);

    Ok(movie::ActiveModel {
        id: Set(details.id),
        title: Set(details.title.clone()),
        original_title: Set(details.original_title.clone()),
        overview: Set(details.overview.clone()),
        release_date: Set(details.release_date.clone().filter(|d| !d.is_empty())),
        runtime: Set(details.runtime.filter(|r| *r > 0)),
        poster_path: Set(details.poster_path.clone()),
        backdrop_path: Set(details.backdrop_path.clone()),
        vote_average: Set(details.vote_average),
        imdb_id: Set(details.imdb_id.clone()),
        genres: Set(to_json(serde_json::to_value(&details.genres))?),
        images: Set(to_json(serde_json::to_value(&images))?),
        watch_providers: Set(to_json(serde_json::to_value(details.providers_in(region)))?),
        blur_data_url: Set(None),
        watch_date: Set(None),
        user_id: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    })
}

pub async fn get_movie(db: &DatabaseConnection, movie_id: i32) -> AppResult<movie::Model> {
    movie::Entity::find_by_id(movie_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::not_found(format!("movie {movie_id}")))
}

/// Watched movies, latest first, optionally only those picked by one member.
pub async fn watched_movies(
    db: &DatabaseConnection,
    user_id: Option<i32>,
) -> AppResult<Vec<WatchedMovie>> {
    let mut query = movie::Entity::find().filter(movie::Column::WatchDate.is_not_null());
    if let Some(user_id) = user_id {
        query = query.filter(movie::Column::UserId.eq(user_id));
    }

    let rows = query
        .find_also_related(user::Entity)
        .order_by_desc(movie::Column::WatchDate)
        .order_by_desc(movie::Column::UpdatedAt)
        .all(db)
        .await?;

    Ok(rows
        .into_iter()
        .map(|(m, u)| WatchedMovie { movie: (&m).into(), watched_by: u.as_ref().map(UserView::from) })
        .collect())
}

pub async fn last_watched(db: &DatabaseConnection) -> AppResult<Option<movie::Model>> {
    Ok(movie::Entity::find()
        .filter(movie::Column::WatchDate.is_not_null())
        .order_by_desc(movie::Column::WatchDate)
        .order_by_desc(movie::Column::UpdatedAt)
        .one(db)
        .await?)
}
