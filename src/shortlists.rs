use std::collections::HashMap;

use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait, sea_query::OnConflict,
};
use tracing::info;

use crate::{
    db::now_sec,
    entities::{movie, movies_on_shortlist, shortlist, user},
    error::{AppError, AppResult},
    models::{MovieView, ShortlistView, UserView},
    movies,
    tmdb::TmdbClient,
};

/// The member's shortlist, created on first use.
pub async fn get_or_create<C: ConnectionTrait>(db: &C, user_id: i32) -> AppResult<shortlist::Model> {
    let model = shortlist::ActiveModel {
        user_id: Set(user_id),
        is_ready: Set(false),
        participating: Set(true),
        updated_at: Set(now_sec()),
        ..Default::default()
    };
    shortlist::Entity::insert(model)
        .on_conflict(OnConflict::column(shortlist::Column::UserId).do_nothing().to_owned())
        .do_nothing()
        .exec(db)
        .await?;

    shortlist::Entity::find()
        .filter(shortlist::Column::UserId.eq(user_id))
        .one(db)
        .await?
        .ok_or_else(|| AppError::not_found(format!("shortlist for user {user_id}")))
}

/// Movies attached to shortlists, grouped by shortlist id in the order they were added.
async fn movies_by_shortlist(
    db: &DatabaseConnection,
    shortlist_id: Option<i32>,
) -> AppResult<HashMap<i32, Vec<movie::Model>>> {
    let mut query = movies_on_shortlist::Entity::find();
    if let Some(id) = shortlist_id {
        query = query.filter(movies_on_shortlist::Column::ShortlistId.eq(id));
    }

    let rows = query
        .find_also_related(movie::Entity)
        .order_by_asc(movies_on_shortlist::Column::AddedAt)
        .order_by_asc(movies_on_shortlist::Column::MovieId)
        .all(db)
        .await?;

    let mut out: HashMap<i32, Vec<movie::Model>> = HashMap::new();
    for (link, movie) in rows {
        if let Some(movie) = movie {
            out.entry(link.shortlist_id).or_default().push(movie);
        }
    }
    Ok(out)
}

fn view(list: shortlist::Model, user: &user::Model, movies: &[movie::Model]) -> ShortlistView {
    ShortlistView {
        id: list.id,
        user: UserView::from(user),
        is_ready: list.is_ready,
        participating: list.participating,
        movies: movies.iter().map(MovieView::from).collect(),
    }
}

pub async fn all_shortlists(db: &DatabaseConnection) -> AppResult<Vec<ShortlistView>> {
    let lists = shortlist::Entity::find()
        .find_also_related(user::Entity)
        .order_by_asc(shortlist::Column::Id)
        .all(db)
        .await?;
    let movies = movies_by_shortlist(db, None).await?;

    Ok(lists
        .into_iter()
        .filter_map(|(list, user)| {
            let user = user?;
            let listed = movies.get(&list.id).map(Vec::as_slice).unwrap_or_default();
            Some(view(list, &user, listed))
        })
        .collect())
}

pub async fn shortlist_for_user(db: &DatabaseConnection, user_id: i32) -> AppResult<ShortlistView> {
    let user = crate::users::get_user(db, user_id).await?;
    let list = get_or_create(db, user_id).await?;
    let movies = movies_by_shortlist(db, Some(list.id)).await?;
    let listed = movies.get(&list.id).map(Vec::as_slice).unwrap_or_default();
    Ok(view(list, &user, listed))
}

/// Adds a movie to the member's shortlist, storing its snapshot if new.
/// The second value is `true` when the movie row was created.
pub async fn add_movie(
    db: &DatabaseConnection,
    tmdb: &TmdbClient,
    user_id: i32,
    movie_id: i32,
) -> AppResult<(ShortlistView, bool)> {
    let list = get_or_create(db, user_id).await?;
    let (movie, created) = movies::ensure_movie(db, tmdb, movie_id).await?;

    if movie.is_watched() {
        return Err(AppError::conflict(format!("{} has already been watched", movie.title)));
    }

    if let Some(existing) = movies_on_shortlist::Entity::find()
        .filter(movies_on_shortlist::Column::MovieId.eq(movie_id))
        .one(db)
        .await?
    {
        let msg = if existing.shortlist_id == list.id {
            format!("{} is already on your shortlist", movie.title)
        } else {
            format!("{} is already on another member's shortlist", movie.title)
        };
        return Err(AppError::conflict(msg));
    }

    let txn = db.begin().await?;
    movies_on_shortlist::ActiveModel {
        shortlist_id: Set(list.id),
        movie_id: Set(movie_id),
        added_at: Set(now_sec()),
    }
    .insert(&txn)
    .await
    .map_err(|e| {
        AppError::unique_violation_or(e, format!("{} is already on a shortlist", movie.title))
    })?;
    touch(&txn, list, Some(false), None).await?;
    txn.commit().await?;

    info!(user_id, movie_id, "movie added to shortlist");
    Ok((shortlist_for_user(db, user_id).await?, created))
}

pub async fn remove_movie(
    db: &DatabaseConnection,
    user_id: i32,
    movie_id: i32,
) -> AppResult<ShortlistView> {
    let list = get_or_create(db, user_id).await?;

    let txn = db.begin().await?;
    let res = movies_on_shortlist::Entity::delete_many()
        .filter(movies_on_shortlist::Column::ShortlistId.eq(list.id))
        .filter(movies_on_shortlist::Column::MovieId.eq(movie_id))
        .exec(&txn)
        .await?;
    if res.rows_affected == 0 {
        return Err(AppError::not_found(format!("movie {movie_id} on your shortlist")));
    }
    touch(&txn, list, Some(false), None).await?;
    txn.commit().await?;

    info!(user_id, movie_id, "movie removed from shortlist");
    shortlist_for_user(db, user_id).await
}

pub async fn set_ready(db: &DatabaseConnection, user_id: i32, ready: bool) -> AppResult<ShortlistView> {
    let list = get_or_create(db, user_id).await?;

    if ready {
        let listed = movies_on_shortlist::Entity::find()
            .filter(movies_on_shortlist::Column::ShortlistId.eq(list.id))
            .one(db)
            .await?;
        if listed.is_none() {
            return Err(AppError::bad_request("add a movie before marking the shortlist ready"));
        }
    }

    touch(db, list, Some(ready), None).await?;
    info!(user_id, ready, "shortlist readiness changed");
    shortlist_for_user(db, user_id).await
}

pub async fn set_participating(
    db: &DatabaseConnection,
    user_id: i32,
    participating: bool,
) -> AppResult<ShortlistView> {
    let list = get_or_create(db, user_id).await?;
    touch(db, list, None, Some(participating)).await?;
    info!(user_id, participating, "shortlist participation changed");
    shortlist_for_user(db, user_id).await
}

async fn touch<C: ConnectionTrait>(
    db: &C,
    list: shortlist::Model,
    is_ready: Option<bool>,
    participating: Option<bool>,
) -> AppResult<shortlist::Model> {
    let mut active: shortlist::ActiveModel = list.into();
    if let Some(is_ready) = is_ready {
        active.is_ready = Set(is_ready);
    }
    if let Some(participating) = participating {
        active.participating = Set(participating);
    }
    active.updated_at = Set(now_sec());
    Ok(active.update(db).await?)
}
