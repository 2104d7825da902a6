use sea_orm::{DatabaseConnection, EntityTrait, QueryOrder};

use crate::{
    entities::user,
    error::{AppError, AppResult},
    models::UserView,
};

pub async fn list_users(db: &DatabaseConnection) -> AppResult<Vec<UserView>> {
    let users = user::Entity::find().order_by_asc(user::Column::Name).all(db).await?;
    Ok(users.iter().map(UserView::from).collect())
}

pub async fn get_user(db: &DatabaseConnection, user_id: i32) -> AppResult<user::Model> {
    user::Entity::find_by_id(user_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::not_found(format!("user {user_id}")))
}
