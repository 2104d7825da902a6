use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(pk_auto(Users::Id))
                    .col(string(Users::Name))
                    .col(string_uniq(Users::Email))
                    .col(string_null(Users::Image))
                    .col(string(Users::PasswordHash))
                    .col(big_integer(Users::CreatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Movies::Table)
                    .if_not_exists()
                    .col(integer(Movies::Id).primary_key())
                    .col(string(Movies::Title))
                    .col(string(Movies::OriginalTitle))
                    .col(text(Movies::Overview))
                    .col(string_null(Movies::ReleaseDate))
                    .col(integer_null(Movies::Runtime))
                    .col(string_null(Movies::PosterPath))
                    .col(string_null(Movies::BackdropPath))
                    .col(double(Movies::VoteAverage))
                    .col(string_null(Movies::ImdbId))
                    .col(json(Movies::Genres))
                    .col(json(Movies::Images))
                    .col(json(Movies::WatchProviders))
                    .col(text_null(Movies::BlurDataUrl))
                    .col(string_null(Movies::WatchDate))
                    .col(integer_null(Movies::UserId))
                    .col(big_integer(Movies::CreatedAt))
                    .col(big_integer(Movies::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_movies_user")
                            .from(Movies::Table, Movies::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_movies_watch_date")
                    .table(Movies::Table)
                    .col(Movies::WatchDate)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Shortlists::Table)
                    .if_not_exists()
                    .col(pk_auto(Shortlists::Id))
                    .col(integer_uniq(Shortlists::UserId))
                    .col(boolean(Shortlists::IsReady).default(false))
                    .col(boolean(Shortlists::Participating).default(true))
                    .col(big_integer(Shortlists::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_shortlists_user")
                            .from(Shortlists::Table, Shortlists::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(MoviesOnShortlists::Table)
                    .if_not_exists()
                    .col(integer(MoviesOnShortlists::ShortlistId))
                    .col(integer(MoviesOnShortlists::MovieId))
                    .col(big_integer(MoviesOnShortlists::AddedAt))
                    .primary_key(
                        Index::create()
                            .col(MoviesOnShortlists::ShortlistId)
                            .col(MoviesOnShortlists::MovieId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_movies_on_shortlists_shortlist")
                            .from(MoviesOnShortlists::Table, MoviesOnShortlists::ShortlistId)
                            .to(Shortlists::Table, Shortlists::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_movies_on_shortlists_movie")
                            .from(MoviesOnShortlists::Table, MoviesOnShortlists::MovieId)
                            .to(Movies::Table, Movies::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // A movie sits on at most one shortlist at a time.
        manager
            .create_index(
                Index::create()
                    .name("idx_movies_on_shortlists_movie_unique")
                    .table(MoviesOnShortlists::Table)
                    .col(MoviesOnShortlists::MovieId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(SiteConfig::Table)
                    .if_not_exists()
                    .col(integer(SiteConfig::Id).primary_key())
                    .col(json(SiteConfig::WatchProviders))
                    .col(integer(SiteConfig::WatchWeekday))
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(SiteConfig::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(MoviesOnShortlists::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(Shortlists::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(Movies::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(Users::Table).to_owned()).await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
pub(crate) enum Users {
    Table,
    Id,
    Name,
    Email,
    Image,
    PasswordHash,
    CreatedAt,
}

#[derive(DeriveIden)]
pub(crate) enum Movies {
    Table,
    Id,
    Title,
    OriginalTitle,
    Overview,
    ReleaseDate,
    Runtime,
    PosterPath,
    BackdropPath,
    VoteAverage,
    ImdbId,
    Genres,
    Images,
    WatchProviders,
    BlurDataUrl,
    WatchDate,
    UserId,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Shortlists {
    Table,
    Id,
    UserId,
    IsReady,
    Participating,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum MoviesOnShortlists {
    Table,
    ShortlistId,
    MovieId,
    AddedAt,
}

#[derive(DeriveIden)]
enum SiteConfig {
    Table,
    Id,
    WatchProviders,
    WatchWeekday,
}
