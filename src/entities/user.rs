use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
    #[sea_orm(unique)]
    pub email: String,
    pub image: Option<String>,
    pub password_hash: String,
    pub created_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_one = "super::shortlist::Entity")]
    Shortlist,
    #[sea_orm(has_many = "super::movie::Entity")]
    WatchedMovies,
    #[sea_orm(has_many = "super::tierlist::Entity")]
    Tierlists,
}

impl Related<super::shortlist::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Shortlist.def()
    }
}

impl Related<super::movie::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::WatchedMovies.def()
    }
}

impl Related<super::tierlist::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Tierlists.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
