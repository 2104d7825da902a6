//! Accounts and the signed session cookie.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use axum::{extract::FromRequestParts, http::request::Parts};
use axum_extra::extract::{
    SignedCookieJar,
    cookie::{Cookie, Key, SameSite},
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use tracing::{info, warn};

use crate::{
    AppState,
    db::now_sec,
    entities::{shortlist, user},
    error::{AppError, AppResult},
    models::{LoginRequest, RegisterRequest},
};

pub const SESSION_COOKIE: &str = "filmclub_session";

const MIN_PASSWORD_LEN: usize = 8;

pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| anyhow::anyhow!("password hashing failed: {e}").into())
}

pub fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| anyhow::anyhow!("invalid password hash format: {e}"))?;
    Ok(Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok())
}

/// Creates the account and its (empty, not ready) shortlist.
pub async fn register(db: &DatabaseConnection, req: RegisterRequest) -> AppResult<user::Model> {
    let name = req.name.trim().to_string();
    let email = req.email.trim().to_lowercase();

    if name.is_empty() {
        return Err(AppError::bad_request("name is required"));
    }
    if !email.contains('@') {
        return Err(AppError::bad_request("email is invalid"));
    }
    if req.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::bad_request(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    let taken = user::Entity::find().filter(user::Column::Email.eq(&email)).one(db).await?;
    if taken.is_some() {
        return Err(AppError::conflict("email is already registered"));
    }

    let password_hash = hash_password(&req.password)?;
    let now = now_sec();

    let txn = db.begin().await?;
    let user = user::ActiveModel {
        name: Set(name),
        email: Set(email),
        image: Set(None),
        password_hash: Set(password_hash),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await
    .map_err(|e| AppError::unique_violation_or(e, "email is already registered"))?;

    shortlist::ActiveModel {
        user_id: Set(user.id),
        is_ready: Set(false),
        participating: Set(true),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;
    txn.commit().await?;

    info!(user_id = user.id, "user registered");
    Ok(user)
}

pub async fn login(db: &DatabaseConnection, req: LoginRequest) -> AppResult<user::Model> {
    let email = req.email.trim().to_lowercase();
    let Some(user) = user::Entity::find().filter(user::Column::Email.eq(&email)).one(db).await?
    else {
        warn!(email = %email, "login failed: unknown email");
        return Err(AppError::InvalidCredentials);
    };

    if !verify_password(&req.password, &user.password_hash)? {
        warn!(user_id = user.id, "login failed: wrong password");
        return Err(AppError::InvalidCredentials);
    }

    info!(user_id = user.id, "user logged in");
    Ok(user)
}

pub fn session_cookie(user_id: i32) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, user_id.to_string()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::days(30))
        .build()
}

pub fn clear_session(jar: SignedCookieJar) -> SignedCookieJar {
    jar.remove(Cookie::build(SESSION_COOKIE).path("/"))
}

fn session_user_id(jar: &SignedCookieJar) -> Option<i32> {
    jar.get(SESSION_COOKIE).and_then(|c| c.value().parse().ok())
}

async fn session_user(parts: &mut Parts, state: &AppState) -> AppResult<Option<user::Model>> {
    let jar = match SignedCookieJar::<Key>::from_request_parts(parts, state).await {
        Ok(jar) => jar,
        Err(never) => match never {},
    };
    let Some(user_id) = session_user_id(&jar) else {
        return Ok(None);
    };
    Ok(user::Entity::find_by_id(user_id).one(&state.db).await?)
}

/// The signed-in member; rejects with 401 otherwise.
pub struct CurrentUser(pub user::Model);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> AppResult<Self> {
        session_user(parts, state).await?.map(CurrentUser).ok_or(AppError::Unauthorized)
    }
}

/// The signed-in member, if any.
pub struct MaybeUser(pub Option<user::Model>);

impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> AppResult<Self> {
        Ok(MaybeUser(session_user(parts, state).await?))
    }
}

#[cfg(test)]
mod tests {
    use sea_orm::PaginatorTrait;

    use super::*;
    use crate::testing;

    fn register_req(email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            name: "Ada".to_string(),
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    #[test]
    fn password_hash_round_trip() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("correct horse", &hash).unwrap());
        assert!(!verify_password("wrong horse", &hash).unwrap());
    }

    #[tokio::test]
    async fn register_creates_user_with_shortlist() {
        let db = testing::db().await;
        let user = register(&db, register_req(" Ada@Club.test ", "hunter2hunter2")).await.unwrap();

        assert_eq!(user.email, "ada@club.test");
        let list = shortlist::Entity::find()
            .filter(shortlist::Column::UserId.eq(user.id))
            .one(&db)
            .await
            .unwrap()
            .unwrap();
        assert!(!list.is_ready);
        assert!(list.participating);
    }

    #[tokio::test]
    async fn register_rejects_duplicates_and_bad_input() {
        let db = testing::db().await;
        register(&db, register_req("ada@club.test", "hunter2hunter2")).await.unwrap();

        let dup = register(&db, register_req("ADA@club.test", "hunter2hunter2")).await;
        assert!(matches!(dup, Err(AppError::Conflict(_))));

        let short = register(&db, register_req("bob@club.test", "short")).await;
        assert!(matches!(short, Err(AppError::BadRequest(_))));

        let no_at = register(&db, register_req("bob.club.test", "hunter2hunter2")).await;
        assert!(matches!(no_at, Err(AppError::BadRequest(_))));

        assert_eq!(user::Entity::find().count(&db).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn racing_registrations_of_one_email_conflict() {
        let db = testing::db().await;

        let (a, b) = tokio::join!(
            register(&db, register_req("ada@club.test", "hunter2hunter2")),
            register(&db, register_req("Ada@Club.test", "hunter2hunter2")),
        );
        let results = [a.map(|_| ()), b.map(|_| ())];

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results.iter().any(|r| matches!(r, Err(AppError::Conflict(_)))));
        assert_eq!(user::Entity::find().count(&db).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn login_checks_password() {
        let db = testing::db().await;
        register(&db, register_req("ada@club.test", "hunter2hunter2")).await.unwrap();

        let ok = login(
            &db,
            LoginRequest { email: "ada@club.test".into(), password: "hunter2hunter2".into() },
        )
        .await;
        assert!(ok.is_ok());

        let wrong = login(
            &db,
            LoginRequest { email: "ada@club.test".into(), password: "hunter3hunter3".into() },
        )
        .await;
        assert!(matches!(wrong, Err(AppError::InvalidCredentials)));

        let unknown =
            login(&db, LoginRequest { email: "x@club.test".into(), password: "whatever1".into() })
                .await;
        assert!(matches!(unknown, Err(AppError::InvalidCredentials)));
    }
}
