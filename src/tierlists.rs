use std::collections::{HashMap, HashSet};

use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction,
    EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use tracing::info;

use crate::{
    db::now_sec,
    entities::{movie, movies_on_tier, tier, tierlist},
    error::{AppError, AppResult},
    models::{CreateTierlistRequest, MovieView, PlaceMovieRequest, TierView, TierlistSummary, TierlistView},
};

const DEFAULT_TIERS: [&str; 5] = ["S", "A", "B", "C", "D"];
const MAX_TIERS: usize = 12;

pub async fn create_tierlist(
    db: &DatabaseConnection,
    user_id: i32,
    req: CreateTierlistRequest,
) -> AppResult<TierlistView> {
    let title = req.title.trim().to_string();
    if title.is_empty() {
        return Err(AppError::bad_request("title is required"));
    }

    let labels: Vec<String> = if req.tiers.is_empty() {
        DEFAULT_TIERS.iter().map(|s| s.to_string()).collect()
    } else {
        req.tiers.iter().map(|s| s.trim().to_string()).collect()
    };
    if labels.iter().any(String::is_empty) {
        return Err(AppError::bad_request("tier labels cannot be empty"));
    }
    if labels.len() > MAX_TIERS {
        return Err(AppError::bad_request(format!("at most {MAX_TIERS} tiers")));
    }

    let txn = db.begin().await?;
    let list = tierlist::ActiveModel {
        user_id: Set(user_id),
        title: Set(title),
        created_at: Set(now_sec()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    for (value, label) in labels.into_iter().enumerate() {
        tier::ActiveModel {
            tierlist_id: Set(list.id),
            label: Set(label),
            value: Set(value as i32),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
    }
    txn.commit().await?;

    info!(user_id, tierlist_id = list.id, "tierlist created");
    get_tierlist(db, list.id).await
}

pub async fn tierlists_for_user(
    db: &DatabaseConnection,
    user_id: i32,
) -> AppResult<Vec<TierlistSummary>> {
    let lists = tierlist::Entity::find()
        .filter(tierlist::Column::UserId.eq(user_id))
        .order_by_desc(tierlist::Column::CreatedAt)
        .order_by_desc(tierlist::Column::Id)
        .all(db)
        .await?;

    Ok(lists
        .into_iter()
        .map(|l| TierlistSummary { id: l.id, user_id: l.user_id, title: l.title, created_at: l.created_at })
        .collect())
}

/// Tiers in order with their placed movies, plus watched movies not yet ranked.
pub async fn get_tierlist(db: &DatabaseConnection, tierlist_id: i32) -> AppResult<TierlistView> {
    let list = find_tierlist(db, tierlist_id).await?;
    let tiers = tiers_of(db, list.id).await?;
    let tier_ids: Vec<i32> = tiers.iter().map(|t| t.id).collect();

    let placements = movies_on_tier::Entity::find()
        .filter(movies_on_tier::Column::TierId.is_in(tier_ids))
        .find_also_related(movie::Entity)
        .order_by_asc(movies_on_tier::Column::Position)
        .all(db)
        .await?;

    let mut by_tier: HashMap<i32, Vec<MovieView>> = HashMap::new();
    let mut placed = HashSet::new();
    for (link, movie) in placements {
        let Some(movie) = movie else { continue };
        placed.insert(movie.id);
        by_tier.entry(link.tier_id).or_default().push(MovieView::from(&movie));
    }

    let unranked = movie::Entity::find()
        .filter(movie::Column::WatchDate.is_not_null())
        .order_by_desc(movie::Column::WatchDate)
        .all(db)
        .await?
        .iter()
        .filter(|m| !placed.contains(&m.id))
        .map(MovieView::from)
        .collect();

    Ok(TierlistView {
        id: list.id,
        user_id: list.user_id,
        title: list.title,
        tiers: tiers
            .into_iter()
            .map(|t| TierView {
                movies: by_tier.remove(&t.id).unwrap_or_default(),
                id: t.id,
                label: t.label,
                value: t.value,
            })
            .collect(),
        unranked,
    })
}

/// Moves a watched movie onto `tier_id` at `position` (end of the tier when
/// absent or out of range), taking it off any other tier of the list.
pub async fn place_movie(
    db: &DatabaseConnection,
    user_id: i32,
    tierlist_id: i32,
    req: PlaceMovieRequest,
) -> AppResult<TierlistView> {
    let txn = db.begin().await?;
    let list = owned_tierlist(&txn, user_id, tierlist_id).await?;
    let tiers = tiers_of(&txn, list.id).await?;

    if !tiers.iter().any(|t| t.id == req.tier_id) {
        return Err(AppError::not_found(format!("tier {} in tierlist {}", req.tier_id, list.id)));
    }

    let movie = movie::Entity::find_by_id(req.movie_id)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::not_found(format!("movie {}", req.movie_id)))?;
    if !movie.is_watched() {
        return Err(AppError::bad_request("only watched movies can be ranked"));
    }

    let tier_ids: Vec<i32> = tiers.iter().map(|t| t.id).collect();
    let previous = movies_on_tier::Entity::find()
        .filter(movies_on_tier::Column::TierId.is_in(tier_ids))
        .filter(movies_on_tier::Column::MovieId.eq(movie.id))
        .one(&txn)
        .await?;

    if let Some(prev) = previous.filter(|p| p.tier_id != req.tier_id) {
        let order: Vec<i32> =
            tier_order(&txn, prev.tier_id).await?.into_iter().filter(|id| *id != movie.id).collect();
        write_order(&txn, prev.tier_id, &order).await?;
    }

    let current: Vec<i32> =
        tier_order(&txn, req.tier_id).await?.into_iter().filter(|id| *id != movie.id).collect();
    let order = insert_at(current, movie.id, req.position);
    write_order(&txn, req.tier_id, &order).await?;

    txn.commit().await?;

    info!(user_id, tierlist_id, movie_id = movie.id, tier_id = req.tier_id, "movie placed");
    get_tierlist(db, tierlist_id).await
}

pub async fn remove_placement(
    db: &DatabaseConnection,
    user_id: i32,
    tierlist_id: i32,
    movie_id: i32,
) -> AppResult<TierlistView> {
    let txn = db.begin().await?;
    let list = owned_tierlist(&txn, user_id, tierlist_id).await?;
    let tier_ids: Vec<i32> = tiers_of(&txn, list.id).await?.iter().map(|t| t.id).collect();

    let Some(link) = movies_on_tier::Entity::find()
        .filter(movies_on_tier::Column::TierId.is_in(tier_ids))
        .filter(movies_on_tier::Column::MovieId.eq(movie_id))
        .one(&txn)
        .await?
    else {
        return Err(AppError::not_found(format!("movie {movie_id} in tierlist {tierlist_id}")));
    };

    let order: Vec<i32> =
        tier_order(&txn, link.tier_id).await?.into_iter().filter(|id| *id != movie_id).collect();
    write_order(&txn, link.tier_id, &order).await?;
    txn.commit().await?;

    info!(user_id, tierlist_id, movie_id, "movie unranked");
    get_tierlist(db, tierlist_id).await
}

pub async fn delete_tierlist(db: &DatabaseConnection, user_id: i32, tierlist_id: i32) -> AppResult<()> {
    let txn = db.begin().await?;
    let list = owned_tierlist(&txn, user_id, tierlist_id).await?;
    let tier_ids: Vec<i32> = tiers_of(&txn, list.id).await?.iter().map(|t| t.id).collect();

    movies_on_tier::Entity::delete_many()
        .filter(movies_on_tier::Column::TierId.is_in(tier_ids))
        .exec(&txn)
        .await?;
    tier::Entity::delete_many().filter(tier::Column::TierlistId.eq(list.id)).exec(&txn).await?;
    tierlist::Entity::delete_by_id(list.id).exec(&txn).await?;
    txn.commit().await?;

    info!(user_id, tierlist_id, "tierlist deleted");
    Ok(())
}

fn insert_at(mut order: Vec<i32>, movie_id: i32, position: Option<usize>) -> Vec<i32> {
    let at = position.unwrap_or(order.len()).min(order.len());
    order.insert(at, movie_id);
    order
}

async fn find_tierlist<C: ConnectionTrait>(db: &C, tierlist_id: i32) -> AppResult<tierlist::Model> {
    tierlist::Entity::find_by_id(tierlist_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::not_found(format!("tierlist {tierlist_id}")))
}

async fn owned_tierlist(
    txn: &DatabaseTransaction,
    user_id: i32,
    tierlist_id: i32,
) -> AppResult<tierlist::Model> {
    let list = find_tierlist(txn, tierlist_id).await?;
    if list.user_id != user_id {
        return Err(AppError::Forbidden("only the owner can edit this tierlist".to_string()));
    }
    Ok(list)
}

async fn tiers_of<C: ConnectionTrait>(db: &C, tierlist_id: i32) -> AppResult<Vec<tier::Model>> {
    Ok(tier::Entity::find()
        .filter(tier::Column::TierlistId.eq(tierlist_id))
        .order_by_asc(tier::Column::Value)
        .all(db)
        .await?)
}

async fn tier_order(txn: &DatabaseTransaction, tier_id: i32) -> AppResult<Vec<i32>> {
    Ok(movies_on_tier::Entity::find()
        .filter(movies_on_tier::Column::TierId.eq(tier_id))
        .order_by_asc(movies_on_tier::Column::Position)
        .all(txn)
        .await?
        .into_iter()
        .map(|l| l.movie_id)
        .collect())
}

/// Rewrites a tier's placements so positions run 0..n in `order`.
async fn write_order(txn: &DatabaseTransaction, tier_id: i32, order: &[i32]) -> AppResult<()> {
    movies_on_tier::Entity::delete_many()
        .filter(movies_on_tier::Column::TierId.eq(tier_id))
        .exec(txn)
        .await?;

    if order.is_empty() {
        return Ok(());
    }

    let rows = order.iter().enumerate().map(|(position, movie_id)| movies_on_tier::ActiveModel {
        tier_id: Set(tier_id),
        movie_id: Set(*movie_id),
        position: Set(position as i32),
    });
    movies_on_tier::Entity::insert_many(rows).exec_without_returning(txn).await?;
    Ok(())
}
