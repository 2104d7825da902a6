use sea_orm_migration::{prelude::*, schema::*};

use crate::m20250101_000001_create_club_tables::{Movies, Users};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Tierlists::Table)
                    .if_not_exists()
                    .col(pk_auto(Tierlists::Id))
                    .col(integer(Tierlists::UserId))
                    .col(string(Tierlists::Title))
                    .col(big_integer(Tierlists::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_tierlists_user")
                            .from(Tierlists::Table, Tierlists::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_tierlists_user")
                    .table(Tierlists::Table)
                    .col(Tierlists::UserId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Tiers::Table)
                    .if_not_exists()
                    .col(pk_auto(Tiers::Id))
                    .col(integer(Tiers::TierlistId))
                    .col(string(Tiers::Label))
                    .col(integer(Tiers::Value))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_tiers_tierlist")
                            .from(Tiers::Table, Tiers::TierlistId)
                            .to(Tierlists::Table, Tierlists::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(MoviesOnTiers::Table)
                    .if_not_exists()
                    .col(integer(MoviesOnTiers::TierId))
                    .col(integer(MoviesOnTiers::MovieId))
                    .col(integer(MoviesOnTiers::Position))
                    .primary_key(
                        Index::create().col(MoviesOnTiers::TierId).col(MoviesOnTiers::MovieId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_movies_on_tiers_tier")
                            .from(MoviesOnTiers::Table, MoviesOnTiers::TierId)
                            .to(Tiers::Table, Tiers::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_movies_on_tiers_movie")
                            .from(MoviesOnTiers::Table, MoviesOnTiers::MovieId)
                            .to(Movies::Table, Movies::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(MoviesOnTiers::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(Tiers::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(Tierlists::Table).to_owned()).await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Tierlists {
    Table,
    Id,
    UserId,
    Title,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Tiers {
    Table,
    Id,
    TierlistId,
    Label,
    Value,
}

#[derive(DeriveIden)]
enum MoviesOnTiers {
    Table,
    TierId,
    MovieId,
    Position,
}
