use axum::{
    Json,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("not signed in")]
    Unauthorized,

    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Conflict(String),

    #[error("no shortlists are ready")]
    NoShortlistsReady,

    #[error("participating shortlists have no movies")]
    NoEligibleMovies,

    #[error(transparent)]
    Db(sea_orm::DbErr),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Date(#[from] jiff::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<sea_orm::DbErr> for AppError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::unique_violation_or(err, "record already exists")
    }
}

impl AppError {
    /// `Conflict(msg)` when `err` is a unique-constraint violation, `Db` otherwise.
    pub fn unique_violation_or(err: sea_orm::DbErr, msg: impl Into<String>) -> Self {
        match err.sql_err() {
            Some(sea_orm::SqlErr::UniqueConstraintViolation(detail)) => {
                tracing::debug!(detail = %detail, "unique constraint violated");
                Self::Conflict(msg.into())
            },
            _ => Self::Db(err),
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized | AppError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::NoShortlistsReady | AppError::NoEligibleMovies => {
                StatusCode::UNPROCESSABLE_ENTITY
            },
            AppError::Db(_) | AppError::Http(_) | AppError::Date(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            },
        }
    }

    fn log(&self) {
        if self.status().is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.log();
        let status = self.status();
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

/// Error for the server-rendered pages: same statuses, HTML body.
#[derive(Debug)]
pub struct PageError(pub AppError);

impl From<AppError> for PageError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        self.0.log();
        let status = self.0.status();
        let body = crate::templates::error_page(self.0.to_string());
        (status, Html(body)).into_response()
    }
}

pub type PageResult<T> = Result<T, PageError>;

#[cfg(test)]
mod tests {
    use sea_orm::{ActiveModelTrait, Set};

    use super::*;
    use crate::{entities::user, testing};

    #[tokio::test]
    async fn unique_violations_become_conflicts() {
        let db = testing::db().await;
        testing::user(&db, "Ada").await;

        let err = user::ActiveModel {
            name: Set("Other Ada".to_string()),
            email: Set("ada@club.test".to_string()),
            image: Set(None),
            password_hash: Set("x".to_string()),
            created_at: Set(0),
            ..Default::default()
        }
        .insert(&db)
        .await
        .unwrap_err();

        let mapped = AppError::from(err);
        assert!(matches!(mapped, AppError::Conflict(_)));
        assert_eq!(mapped.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn other_database_errors_stay_internal() {
        let mapped = AppError::from(sea_orm::DbErr::Custom("disk on fire".to_string()));
        assert!(matches!(mapped, AppError::Db(_)));
        assert_eq!(mapped.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
