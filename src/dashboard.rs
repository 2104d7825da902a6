use std::collections::{BTreeMap, HashMap, HashSet};

use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QuerySelect,
};
use tracing::warn;

use crate::{
    entities::{movie, user},
    error::AppResult,
    models::{DashboardStats, GenreCount, MemberCount, MovieView, genres_of},
    movies, site_config,
};

/// Read-only aggregates over the watched movies. Each figure is computed on
/// its own and falls back to its empty value if its query fails.
pub async fn stats(db: &DatabaseConnection, current_user: Option<i32>) -> DashboardStats {
    let total = or_empty("total watched", count_watched(db, None).await);
    let by_user = match current_user {
        Some(user_id) => or_empty("watched by user", count_watched(db, Some(user_id)).await),
        None => 0,
    };

    let watched = or_empty("watched movies", watched_rows(db).await);
    let totals = aggregate(&watched);

    let watched_by_member = or_empty("watched by member", per_member(db).await);
    let last_watched = or_empty("last watched", movies::last_watched(db).await);
    let next_watch_date = or_empty("next watch date", next_watch_date(db).await);

    DashboardStats {
        total_watched_movies: total,
        // counted separately, so clamp against writes landing in between
        total_watched_by_current_user: by_user.min(total),
        total_runtime_minutes: totals.runtime,
        average_runtime_minutes: totals.average_runtime,
        average_rating: totals.average_rating,
        genres: totals.genres,
        watched_by_member,
        last_watched: last_watched.as_ref().map(MovieView::from),
        next_watch_date: next_watch_date.map(|d| d.to_string()),
    }
}

fn or_empty<T: Default>(stat: &str, result: AppResult<T>) -> T {
    result.unwrap_or_else(|err| {
        warn!(stat, error = %err, "dashboard query failed");
        T::default()
    })
}

async fn count_watched(db: &DatabaseConnection, user_id: Option<i32>) -> AppResult<u64> {
    let mut query = movie::Entity::find().filter(movie::Column::WatchDate.is_not_null());
    if let Some(user_id) = user_id {
        query = query.filter(movie::Column::UserId.eq(user_id));
    }
    Ok(query.count(db).await?)
}

async fn watched_rows(db: &DatabaseConnection) -> AppResult<Vec<movie::Model>> {
    Ok(movie::Entity::find().filter(movie::Column::WatchDate.is_not_null()).all(db).await?)
}

async fn per_member(db: &DatabaseConnection) -> AppResult<Vec<MemberCount>> {
    let counts: Vec<(Option<i32>, i64)> = movie::Entity::find()
        .select_only()
        .column(movie::Column::UserId)
        .column_as(movie::Column::Id.count(), "count")
        .filter(movie::Column::WatchDate.is_not_null())
        .group_by(movie::Column::UserId)
        .into_tuple()
        .all(db)
        .await?;

    let names: HashMap<i32, String> =
        user::Entity::find().all(db).await?.into_iter().map(|u| (u.id, u.name)).collect();

    let mut out: Vec<MemberCount> = counts
        .into_iter()
        .filter_map(|(user_id, count)| {
            let user_id = user_id?;
            Some(MemberCount {
                user_id,
                name: names.get(&user_id).cloned().unwrap_or_default(),
                count: count.max(0) as u64,
            })
        })
        .collect();
    out.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
    Ok(out)
}

async fn next_watch_date(db: &DatabaseConnection) -> AppResult<Option<jiff::civil::Date>> {
    let config = site_config::get(db).await?;
    let today = jiff::Zoned::now().date();
    Ok(Some(site_config::next_watch_date(today, config.watch_weekday)?))
}

#[derive(Debug, Default, PartialEq)]
struct Totals {
    runtime: i64,
    average_runtime: f64,
    average_rating: f64,
    genres: Vec<GenreCount>,
}

fn aggregate(watched: &[movie::Model]) -> Totals {
    let runtimes: Vec<i64> = watched.iter().filter_map(|m| m.runtime).map(i64::from).collect();
    let runtime: i64 = runtimes.iter().sum();
    let average_runtime =
        if runtimes.is_empty() { 0.0 } else { runtime as f64 / runtimes.len() as f64 };

    let ratings: Vec<f64> =
        watched.iter().map(|m| m.vote_average).filter(|r| *r > 0.0).collect();
    let average_rating = if ratings.is_empty() {
        0.0
    } else {
        ratings.iter().sum::<f64>() / ratings.len() as f64
    };

    let mut counts: BTreeMap<String, u64> = BTreeMap::new();
    for m in watched {
        let distinct: HashSet<String> = genres_of(m).into_iter().map(|g| g.name).collect();
        for name in distinct {
            *counts.entry(name).or_default() += 1;
        }
    }
    let mut genres: Vec<GenreCount> =
        counts.into_iter().map(|(genre, count)| GenreCount { genre, count }).collect();
    genres.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.genre.cmp(&b.genre)));

    Totals { runtime, average_runtime, average_rating, genres }
}
