use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Club copy of a TMDB movie. `id` is the TMDB id.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "movies")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i32,
    pub title: String,
    pub original_title: String,
    #[sea_orm(column_type = "Text")]
    pub overview: String,
    pub release_date: Option<String>,
    pub runtime: Option<i32>,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
    #[sea_orm(column_type = "Double")]
    pub vote_average: f64,
    pub imdb_id: Option<String>,
    pub genres: Json,
    pub images: Json,
    pub watch_providers: Json,
    #[sea_orm(column_type = "Text", nullable)]
    pub blur_data_url: Option<String>,
    /// `YYYY-MM-DD`, set when a raffle is finalized.
    pub watch_date: Option<String>,
    pub user_id: Option<i32>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Model {
    pub fn is_watched(&self) -> bool {
        self.watch_date.is_some()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_delete = "SetNull"
    )]
    User,
    #[sea_orm(has_many = "super::movies_on_shortlist::Entity")]
    MoviesOnShortlists,
    #[sea_orm(has_many = "super::movies_on_tier::Entity")]
    MoviesOnTiers,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::shortlist::Entity> for Entity {
    fn to() -> RelationDef {
        super::movies_on_shortlist::Relation::Shortlist.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::movies_on_shortlist::Relation::Movie.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}
