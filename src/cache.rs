use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};

use crate::{db::now_sec, entities::tmdb_cache, error::AppResult};

/// TMDB responses keyed by request path and query, served while fresh.
#[derive(Clone)]
pub struct ResponseCache {
    db: DatabaseConnection,
    ttl_seconds: i64,
}

impl ResponseCache {
    pub fn new(db: DatabaseConnection, ttl_minutes: i64) -> Self {
        Self { db, ttl_seconds: ttl_minutes.max(0).saturating_mul(60) }
    }

    pub async fn get(&self, key: &str) -> AppResult<Option<String>> {
        let row = tmdb_cache::Entity::find_by_id(key.to_string()).one(&self.db).await?;
        Ok(row.filter(|r| self.is_fresh(r.cached_at)).map(|r| r.body))
    }

    pub async fn put(&self, key: &str, body: &str) -> AppResult<()> {
        let model = tmdb_cache::ActiveModel {
            key: Set(key.to_string()),
            body: Set(body.to_string()),
            cached_at: Set(now_sec()),
        };

        tmdb_cache::Entity::insert(model)
            .on_conflict(
                sea_orm::sea_query::OnConflict::column(tmdb_cache::Column::Key)
                    .update_columns([tmdb_cache::Column::Body, tmdb_cache::Column::CachedAt])
                    .to_owned(),
            )
            .exec(&self.db)
            .await?;

        Ok(())
    }

    /// Drops every expired entry, returning how many were removed.
    pub async fn purge_stale(&self) -> AppResult<u64> {
        let cutoff = now_sec().saturating_sub(self.ttl_seconds);
        let res = tmdb_cache::Entity::delete_many()
            .filter(tmdb_cache::Column::CachedAt.lt(cutoff))
            .exec(&self.db)
            .await?;
        Ok(res.rows_affected)
    }

    fn is_fresh(&self, cached_at: i64) -> bool {
        now_sec().saturating_sub(cached_at) <= self.ttl_seconds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    #[tokio::test]
    async fn fresh_entries_are_served() {
        let db = testing::db().await;
        let cache = ResponseCache::new(db, 30);

        assert_eq!(cache.get("/trending/movie/week?page=1").await.unwrap(), None);

        cache.put("/trending/movie/week?page=1", "{\"page\":1}").await.unwrap();
        assert_eq!(
            cache.get("/trending/movie/week?page=1").await.unwrap().as_deref(),
            Some("{\"page\":1}")
        );

        cache.put("/trending/movie/week?page=1", "{\"page\":2}").await.unwrap();
        assert_eq!(
            cache.get("/trending/movie/week?page=1").await.unwrap().as_deref(),
            Some("{\"page\":2}")
        );
    }

    #[tokio::test]
    async fn oversized_ttl_saturates() {
        let db = testing::db().await;
        let cache = ResponseCache::new(db, i64::MAX);
        assert_eq!(cache.ttl_seconds, i64::MAX);

        cache.put("/genre/movie/list", "{}").await.unwrap();
        assert!(cache.get("/genre/movie/list").await.unwrap().is_some());
        assert_eq!(cache.purge_stale().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn stale_entries_are_ignored_and_purged() {
        let db = testing::db().await;
        let cache = ResponseCache::new(db.clone(), 30);

        let old = tmdb_cache::ActiveModel {
            key: Set("/genre/movie/list".to_string()),
            body: Set("{}".to_string()),
            cached_at: Set(now_sec() - 31 * 60),
        };
        tmdb_cache::Entity::insert(old).exec(&db).await.unwrap();

        assert_eq!(cache.get("/genre/movie/list").await.unwrap(), None);
        assert_eq!(cache.purge_stale().await.unwrap(), 1);
        assert!(tmdb_cache::Entity::find().all(&db).await.unwrap().is_empty());
    }
}
