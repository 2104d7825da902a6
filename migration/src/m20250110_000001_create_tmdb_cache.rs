use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(TmdbCache::Table)
                    .if_not_exists()
                    .col(string(TmdbCache::Key).primary_key())
                    .col(text(TmdbCache::Body))
                    .col(big_integer(TmdbCache::CachedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_tmdb_cache_cached_at")
                    .table(TmdbCache::Table)
                    .col(TmdbCache::CachedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(TmdbCache::Table).to_owned()).await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum TmdbCache {
    Table,
    Key,
    Body,
    CachedAt,
}
