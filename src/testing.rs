//! Fixtures shared by the unit tests.

use std::{net::SocketAddr, sync::Arc};

use axum::Router;
use axum_extra::extract::cookie::Key;
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};

use crate::{
    AppState,
    cache::ResponseCache,
    config::Config,
    db,
    entities::{movie, movies_on_shortlist, shortlist, user},
    shortlists,
    tmdb::TmdbClient,
};

pub async fn db() -> DatabaseConnection {
    db::connect_and_migrate("sqlite::memory:").await.unwrap()
}

pub fn config() -> Config {
    Config {
        addr: SocketAddr::from(([127, 0, 0, 1], 0)),
        database_url: "sqlite::memory:".to_string(),
        tmdb_access_token: String::new(),
        tmdb_base_url: "http://127.0.0.1:9".to_string(),
        tmdb_image_base_url: "http://127.0.0.1:9".to_string(),
        tmdb_rps: 50,
        tmdb_cache_minutes: 30,
        watch_region: "FI".to_string(),
        cookie_secret: None,
        max_concurrent: 2,
    }
}

/// Mock-mode TMDB client backed by `db`.
pub fn tmdb(db: &DatabaseConnection) -> TmdbClient {
    let cfg = config();
    TmdbClient::new(
        reqwest::Client::new(),
        cfg.tmdb_access_token,
        cfg.tmdb_base_url,
        cfg.watch_region,
        cfg.tmdb_rps,
        ResponseCache::new(db.clone(), cfg.tmdb_cache_minutes),
    )
}

/// Live-mode TMDB client pointed at a local stub server.
pub fn live_tmdb(db: &DatabaseConnection, base_url: &str) -> TmdbClient {
    let cfg = config();
    TmdbClient::new(
        reqwest::Client::new(),
        "test-token".to_string(),
        base_url.to_string(),
        cfg.watch_region,
        cfg.tmdb_rps,
        ResponseCache::new(db.clone(), cfg.tmdb_cache_minutes),
    )
}

/// Serves `app` on an ephemeral local port and returns its base URL.
pub async fn stub_server(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

pub fn state(db: DatabaseConnection) -> AppState {
    AppState {
        config: Arc::new(config()),
        tmdb: Arc::new(tmdb(&db)),
        db,
        cookie_key: Key::generate(),
        raffle_lock: Arc::default(),
    }
}

/// Inserts a member together with an empty shortlist.
pub async fn user(db: &DatabaseConnection, name: &str) -> user::Model {
    let user = user::ActiveModel {
        name: Set(name.to_string()),
        email: Set(format!("{}@club.test", name.to_lowercase())),
        image: Set(None),
        password_hash: Set("not-a-hash".to_string()),
        created_at: Set(0),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap();

    shortlists::get_or_create(db, user.id).await.unwrap();
    user
}

pub async fn movie(db: &DatabaseConnection, id: i32) -> movie::Model {
    movie::ActiveModel {
        id: Set(id),
        title: Set(format!("Movie {id}")),
        original_title: Set(format!("Movie {id}")),
        overview: Set(String::new()),
        release_date: Set(None),
        runtime: Set(Some(100)),
        poster_path: Set(None),
        backdrop_path: Set(None),
        vote_average: Set(7.0),
        imdb_id: Set(None),
        genres: Set(serde_json::json!([{ "id": 18, "name": "Drama" }])),
        images: Set(serde_json::json!({ "posters": [], "backdrops": [] })),
        watch_providers: Set(serde_json::json!([])),
        blur_data_url: Set(None),
        watch_date: Set(None),
        user_id: Set(None),
        created_at: Set(0),
        updated_at: Set(0),
    }
    .insert(db)
    .await
    .unwrap()
}

pub async fn watched_movie(
    db: &DatabaseConnection,
    id: i32,
    user_id: i32,
    date: &str,
) -> movie::Model {
    let m = movie(db, id).await;
    let mut active: movie::ActiveModel = m.into();
    active.watch_date = Set(Some(date.to_string()));
    active.user_id = Set(Some(user_id));
    active.update(db).await.unwrap()
}

/// Puts existing movies on a member's shortlist and flags it.
pub async fn shortlist_with(
    db: &DatabaseConnection,
    user_id: i32,
    movie_ids: &[i32],
    is_ready: bool,
    participating: bool,
) -> shortlist::Model {
    let list = shortlists::get_or_create(db, user_id).await.unwrap();
    for (i, movie_id) in movie_ids.iter().enumerate() {
        movies_on_shortlist::ActiveModel {
            shortlist_id: Set(list.id),
            movie_id: Set(*movie_id),
            added_at: Set(i as i64),
        }
        .insert(db)
        .await
        .unwrap();
    }

    let mut active: shortlist::ActiveModel = list.into();
    active.is_ready = Set(is_ready);
    active.participating = Set(participating);
    active.update(db).await.unwrap()
}
