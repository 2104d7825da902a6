use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "tiers")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub tierlist_id: i32,
    pub label: String,
    /// Display order within the tierlist, best tier first.
    pub value: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::tierlist::Entity",
        from = "Column::TierlistId",
        to = "super::tierlist::Column::Id",
        on_delete = "Cascade"
    )]
    Tierlist,
    #[sea_orm(has_many = "super::movies_on_tier::Entity")]
    MoviesOnTiers,
}

impl Related<super::tierlist::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Tierlist.def()
    }
}

impl Related<super::movies_on_tier::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::MoviesOnTiers.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
