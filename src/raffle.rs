//! Picking the next movie and making the pick stick.

use std::collections::HashMap;

use rand::{Rng, seq::SliceRandom};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait, sea_query::Expr,
};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::{
    db::now_sec,
    entities::{movie, movies_on_shortlist, shortlist, user},
    error::{AppError, AppResult},
    models::{FinalizeRequest, MovieView, RaffleCandidate, RaffleDraw, UserView},
};

/// One ticket in the draw: a shortlisted movie and the member who listed it.
#[derive(Clone, Debug)]
pub struct Entry {
    pub movie: movie::Model,
    pub user: user::Model,
}

/// Uniform pick over the flattened entries. A member with five movies holds
/// five tickets.
pub fn draw<'a, T, R: Rng + ?Sized>(entries: &'a [T], rng: &mut R) -> Option<&'a T> {
    entries.choose(rng)
}

/// Entries from shortlists that are both ready and participating.
pub async fn eligible_entries(db: &DatabaseConnection) -> AppResult<Vec<Entry>> {
    let lists = shortlist::Entity::find()
        .filter(shortlist::Column::IsReady.eq(true))
        .filter(shortlist::Column::Participating.eq(true))
        .find_also_related(user::Entity)
        .order_by_asc(shortlist::Column::Id)
        .all(db)
        .await?;

    if lists.is_empty() {
        return Err(AppError::NoShortlistsReady);
    }

    let owners: HashMap<i32, user::Model> =
        lists.into_iter().filter_map(|(list, user)| Some((list.id, user?))).collect();

    let links = movies_on_shortlist::Entity::find()
        .filter(movies_on_shortlist::Column::ShortlistId.is_in(owners.keys().copied()))
        .find_also_related(movie::Entity)
        .order_by_asc(movies_on_shortlist::Column::ShortlistId)
        .order_by_asc(movies_on_shortlist::Column::AddedAt)
        .all(db)
        .await?;

    let entries: Vec<Entry> = links
        .into_iter()
        .filter_map(|(link, movie)| {
            let movie = movie.filter(|m| !m.is_watched())?;
            let user = owners.get(&link.shortlist_id)?.clone();
            Some(Entry { movie, user })
        })
        .collect();

    if entries.is_empty() {
        return Err(AppError::NoEligibleMovies);
    }
    Ok(entries)
}

/// Draws a winner. Nothing is written; the result only becomes durable
/// through [`finalize`].
pub async fn start(db: &DatabaseConnection) -> AppResult<RaffleDraw> {
    let entries = eligible_entries(db).await?;
    let winner = draw(&entries, &mut rand::thread_rng()).ok_or(AppError::NoEligibleMovies)?;

    info!(
        movie_id = winner.movie.id,
        user_id = winner.user.id,
        candidates = entries.len(),
        "raffle drawn"
    );

    Ok(RaffleDraw {
        movie: MovieView::from(&winner.movie),
        user: UserView::from(&winner.user),
        candidates: entries
            .iter()
            .map(|e| RaffleCandidate {
                movie_id: e.movie.id,
                title: e.movie.title.clone(),
                poster_path: e.movie.poster_path.clone(),
                user_id: e.user.id,
                user_name: e.user.name.clone(),
            })
            .collect(),
    })
}

/// Marks the movie watched, takes it off every shortlist and resets
/// readiness of participating shortlists, all in one transaction.
///
/// Finalizes are serialized through `lock`. Repeating a finalize with the
/// same arguments is a no-op; finalizing an already watched movie with a
/// different date or member is a conflict.
pub async fn finalize(
    db: &DatabaseConnection,
    lock: &Mutex<()>,
    req: FinalizeRequest,
) -> AppResult<movie::Model> {
    let watch_date: jiff::civil::Date = req
        .watch_date
        .trim()
        .parse()
        .map_err(|e| AppError::bad_request(format!("invalid watch date: {e}")))?;
    let watch_date = watch_date.to_string();

    let _guard = lock.lock().await;
    let txn = db.begin().await?;

    let movie = movie::Entity::find_by_id(req.movie_id)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::not_found(format!("movie {}", req.movie_id)))?;
    if user::Entity::find_by_id(req.user_id).one(&txn).await?.is_none() {
        return Err(AppError::not_found(format!("user {}", req.user_id)));
    }

    if let Some(existing) = movie.watch_date.as_deref() {
        if existing == watch_date && movie.user_id == Some(req.user_id) {
            debug!(movie_id = movie.id, "raffle already finalized");
            txn.commit().await?;
            return Ok(movie);
        }
        return Err(AppError::conflict(format!(
            "{} was already watched on {existing}",
            movie.title
        )));
    }

    let mut active: movie::ActiveModel = movie.into();
    active.watch_date = Set(Some(watch_date.clone()));
    active.user_id = Set(Some(req.user_id));
    active.updated_at = Set(now_sec());
    let movie = active.update(&txn).await?;

    movies_on_shortlist::Entity::delete_many()
        .filter(movies_on_shortlist::Column::MovieId.eq(movie.id))
        .exec(&txn)
        .await?;

    shortlist::Entity::update_many()
        .col_expr(shortlist::Column::IsReady, Expr::value(false))
        .col_expr(shortlist::Column::UpdatedAt, Expr::value(now_sec()))
        .filter(shortlist::Column::Participating.eq(true))
        .exec(&txn)
        .await?;

    txn.commit().await?;

    info!(movie_id = movie.id, user_id = req.user_id, watch_date = %watch_date, "raffle finalized");
    Ok(movie)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use rand::{SeedableRng, rngs::StdRng};
    use sea_orm::PaginatorTrait;

    use super::*;
    use crate::{movies, shortlists, testing};

    fn finalize_req(movie_id: i32, user_id: i32, date: &str) -> FinalizeRequest {
        FinalizeRequest { movie_id, watch_date: date.to_string(), user_id }
    }

    #[test]
    fn draw_returns_a_member_and_reaches_every_member() {
        let entries: Vec<i32> = (1..=6).collect();
        let mut rng = StdRng::seed_from_u64(7);
        let mut seen = HashSet::new();
        for _ in 0..500 {
            let pick = *draw(&entries, &mut rng).unwrap();
            assert!(entries.contains(&pick));
            seen.insert(pick);
        }
        assert_eq!(seen.len(), entries.len());
    }

    #[test]
    fn draw_from_nothing_is_none() {
        let entries: Vec<i32> = Vec::new();
        assert!(draw(&entries, &mut rand::thread_rng()).is_none());
    }

    #[tokio::test]
    async fn start_without_ready_shortlists_fails_without_writes() {
        let db = testing::db().await;
        let ada = testing::user(&db, "Ada").await;
        testing::movie(&db, 1).await;
        testing::shortlist_with(&db, ada.id, &[1], false, true).await;

        let err = start(&db).await.unwrap_err();
        assert!(matches!(err, AppError::NoShortlistsReady));
        assert_eq!(err.to_string(), "no shortlists are ready");

        let row = movie::Entity::find_by_id(1).one(&db).await.unwrap().unwrap();
        assert_eq!(row.watch_date, None);
        assert_eq!(movies_on_shortlist::Entity::find().count(&db).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn ready_but_not_participating_is_ignored() {
        let db = testing::db().await;
        let ada = testing::user(&db, "Ada").await;
        testing::movie(&db, 1).await;
        testing::shortlist_with(&db, ada.id, &[1], true, false).await;

        assert!(matches!(start(&db).await, Err(AppError::NoShortlistsReady)));
    }

    #[tokio::test]
    async fn start_with_empty_participating_shortlists_fails() {
        let db = testing::db().await;
        let ada = testing::user(&db, "Ada").await;
        testing::shortlist_with(&db, ada.id, &[], true, true).await;

        assert!(matches!(start(&db).await, Err(AppError::NoEligibleMovies)));
    }

    #[tokio::test]
    async fn full_raffle_round() {
        let db = testing::db().await;
        let lock = Mutex::new(());
        let ada = testing::user(&db, "Ada").await;
        let bob = testing::user(&db, "Bob").await;
        let cyd = testing::user(&db, "Cyd").await;
        for id in 1..=6 {
            testing::movie(&db, id).await;
        }
        testing::shortlist_with(&db, ada.id, &[1, 2], true, true).await;
        testing::shortlist_with(&db, bob.id, &[3], true, true).await;
        testing::shortlist_with(&db, cyd.id, &[4, 5, 6], true, true).await;

        let drawn = start(&db).await.unwrap();
        assert_eq!(drawn.candidates.len(), 6);
        assert!((1..=6).contains(&drawn.movie.id));
        let owner = drawn.candidates.iter().find(|c| c.movie_id == drawn.movie.id).unwrap();
        assert_eq!(owner.user_id, drawn.user.id);

        let watched = finalize(&db, &lock, finalize_req(drawn.movie.id, drawn.user.id, "2024-06-05"))
            .await
            .unwrap();
        assert_eq!(watched.watch_date.as_deref(), Some("2024-06-05"));

        let history = movies::watched_movies(&db, None).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].movie.id, drawn.movie.id);
        assert_eq!(history[0].movie.watch_date.as_deref(), Some("2024-06-05"));

        let lists = shortlists::all_shortlists(&db).await.unwrap();
        assert!(lists.iter().all(|l| l.movies.iter().all(|m| m.id != drawn.movie.id)));
        assert!(lists.iter().all(|l| !l.is_ready));
        assert_eq!(lists.iter().map(|l| l.movies.len()).sum::<usize>(), 5);
    }

    #[tokio::test]
    async fn finalize_is_idempotent_for_identical_calls() {
        let db = testing::db().await;
        let lock = Mutex::new(());
        let ada = testing::user(&db, "Ada").await;
        testing::movie(&db, 1).await;
        testing::shortlist_with(&db, ada.id, &[1], true, true).await;

        let first = finalize(&db, &lock, finalize_req(1, ada.id, "2024-06-05")).await.unwrap();
        let second = finalize(&db, &lock, finalize_req(1, ada.id, "2024-06-05")).await.unwrap();
        assert_eq!(first, second);

        let conflicting = finalize(&db, &lock, finalize_req(1, ada.id, "2024-06-12")).await;
        assert!(matches!(conflicting, Err(AppError::Conflict(_))));

        let row = movie::Entity::find_by_id(1).one(&db).await.unwrap().unwrap();
        assert_eq!(row.watch_date.as_deref(), Some("2024-06-05"));
    }

    #[tokio::test]
    async fn finalize_validates_input() {
        let db = testing::db().await;
        let lock = Mutex::new(());
        let ada = testing::user(&db, "Ada").await;
        testing::movie(&db, 1).await;

        let bad_date = finalize(&db, &lock, finalize_req(1, ada.id, "next friday")).await;
        assert!(matches!(bad_date, Err(AppError::BadRequest(_))));

        let no_movie = finalize(&db, &lock, finalize_req(99, ada.id, "2024-06-05")).await;
        assert!(matches!(no_movie, Err(AppError::NotFound(_))));

        let no_user = finalize(&db, &lock, finalize_req(1, 999, "2024-06-05")).await;
        assert!(matches!(no_user, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn non_participating_shortlists_keep_readiness() {
        let db = testing::db().await;
        let lock = Mutex::new(());
        let ada = testing::user(&db, "Ada").await;
        let bob = testing::user(&db, "Bob").await;
        testing::movie(&db, 1).await;
        testing::movie(&db, 2).await;
        testing::shortlist_with(&db, ada.id, &[1], true, true).await;
        testing::shortlist_with(&db, bob.id, &[2], true, false).await;

        finalize(&db, &lock, finalize_req(1, ada.id, "2024-06-05")).await.unwrap();

        let bob_list = shortlists::shortlist_for_user(&db, bob.id).await.unwrap();
        assert!(bob_list.is_ready);
        assert_eq!(bob_list.movies.len(), 1);
    }
}
