use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::Html,
    routing::{get, post, put},
};
use axum_extra::extract::SignedCookieJar;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
    AppState,
    auth::{self, CurrentUser, MaybeUser},
    dashboard,
    enrichment::spawn_enrich,
    error::{AppResult, PageResult},
    models::{
        CreateTierlistRequest, DashboardStats, FinalizeRequest, Genre, LoginRequest, MovieView,
        PlaceMovieRequest, Preferences, RaffleDraw, RegisterRequest, ShortlistView,
        SiteConfigView, TierlistSummary, TierlistView, UpdateSiteConfig, UserView, WatchedMovie,
    },
    movies, preferences, raffle, shortlists, site_config,
    templates::{self, Layout},
    tierlists,
    tmdb::{DiscoverFilters, MovieDetails, MovieSummary, Page, ProviderRef},
    users,
};

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/me", get(me))
        .route("/users", get(list_users))
        .route("/users/{id}", get(get_user))
        .route("/users/{id}/tierlists", get(user_tierlists))
        .route("/movies/watched", get(watched_movies))
        .route("/movies/{id}", get(movie))
        .route("/shortlists", get(all_shortlists))
        .route("/shortlists/me", get(my_shortlist))
        .route("/shortlists/me/movies", post(add_to_shortlist))
        .route("/shortlists/me/movies/{movie_id}", axum::routing::delete(remove_from_shortlist))
        .route("/shortlists/me/ready", put(set_ready))
        .route("/shortlists/me/participating", put(set_participating))
        .route("/raffle/start", post(start_raffle))
        .route("/raffle/finalize", post(finalize_raffle))
        .route("/dashboard", get(dashboard_stats))
        .route("/tierlists", get(my_tierlists).post(create_tierlist))
        .route("/tierlists/{id}", get(get_tierlist).delete(delete_tierlist))
        .route("/tierlists/{id}/placements", put(place_movie))
        .route("/tierlists/{id}/placements/{movie_id}", axum::routing::delete(remove_placement))
        .route("/site-config", get(get_site_config).put(update_site_config))
        .route("/preferences", get(get_preferences))
        .route("/preferences/{key}", put(set_preference))
        .route("/tmdb/trending", get(trending))
        .route("/tmdb/movies/{id}/recommendations", get(recommendations))
        .route("/tmdb/discover", get(discover))
        .route("/tmdb/search", get(search))
        .route("/tmdb/genres", get(genres))
        .route("/tmdb/watch-providers", get(watch_providers));

    Router::new()
        .route("/", get(index))
        .route("/watched", get(watched_page))
        .route("/shortlists", get(shortlists_page))
        .route("/health", get(health))
        .nest("/api", api)
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

// pages

fn layout<'a>(state: &'a AppState, jar: &SignedCookieJar, user: Option<&'a UserView>) -> Layout<'a> {
    Layout { prefs: preferences::read(jar), user, image_base_url: &state.config.tmdb_image_base_url }
}

async fn index(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    jar: SignedCookieJar,
) -> Html<String> {
    let stats = dashboard::stats(&state.db, user.as_ref().map(|u| u.id)).await;
    let user = user.as_ref().map(UserView::from);
    Html(templates::dashboard_page(&layout(&state, &jar, user.as_ref()), &stats))
}

async fn watched_page(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    jar: SignedCookieJar,
) -> PageResult<Html<String>> {
    let watched = movies::watched_movies(&state.db, None).await?;
    let user = user.as_ref().map(UserView::from);
    Ok(Html(templates::watched_page(&layout(&state, &jar, user.as_ref()), &watched)))
}

async fn shortlists_page(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    jar: SignedCookieJar,
) -> PageResult<Html<String>> {
    let lists = shortlists::all_shortlists(&state.db).await?;
    let user = user.as_ref().map(UserView::from);
    Ok(Html(templates::shortlists_page(&layout(&state, &jar, user.as_ref()), &lists)))
}

// auth

async fn register(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    Json(req): Json<RegisterRequest>,
) -> AppResult<(StatusCode, SignedCookieJar, Json<UserView>)> {
    let user = auth::register(&state.db, req).await?;
    let jar = jar.add(auth::session_cookie(user.id));
    Ok((StatusCode::CREATED, jar, Json(UserView::from(&user))))
}

async fn login(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    Json(req): Json<LoginRequest>,
) -> AppResult<(SignedCookieJar, Json<UserView>)> {
    let user = auth::login(&state.db, req).await?;
    let jar = jar.add(auth::session_cookie(user.id));
    Ok((jar, Json(UserView::from(&user))))
}

async fn logout(jar: SignedCookieJar) -> (SignedCookieJar, StatusCode) {
    (auth::clear_session(jar), StatusCode::NO_CONTENT)
}

async fn me(CurrentUser(user): CurrentUser) -> Json<UserView> {
    Json(UserView::from(&user))
}

// users

async fn list_users(State(state): State<AppState>) -> AppResult<Json<Vec<UserView>>> {
    Ok(Json(users::list_users(&state.db).await?))
}

async fn get_user(State(state): State<AppState>, Path(id): Path<i32>) -> AppResult<Json<UserView>> {
    let user = users::get_user(&state.db, id).await?;
    Ok(Json(UserView::from(&user)))
}

// movies

#[derive(Debug, Deserialize)]
struct WatchedQuery {
    user_id: Option<i32>,
}

async fn watched_movies(
    State(state): State<AppState>,
    Query(q): Query<WatchedQuery>,
) -> AppResult<Json<Vec<WatchedMovie>>> {
    Ok(Json(movies::watched_movies(&state.db, q.user_id).await?))
}

#[derive(Debug, Serialize)]
struct MovieResponse {
    movie: MovieView,
    /// Live metadata; absent when TMDB is unreachable.
    details: Option<MovieDetails>,
}

async fn movie(State(state): State<AppState>, Path(id): Path<i32>) -> AppResult<Json<MovieResponse>> {
    let stored = movies::get_movie(&state.db, id).await?;
    let details = match state.tmdb.movie_details(id).await {
        Ok(details) => Some(details),
        Err(err) => {
            warn!(movie_id = id, error = %err, "live details unavailable");
            None
        },
    };
    Ok(Json(MovieResponse { movie: MovieView::from(&stored), details }))
}

// shortlists

#[derive(Debug, Deserialize)]
struct AddMovieRequest {
    movie_id: i32,
}

#[derive(Debug, Deserialize)]
struct FlagRequest {
    value: bool,
}

async fn all_shortlists(State(state): State<AppState>) -> AppResult<Json<Vec<ShortlistView>>> {
    Ok(Json(shortlists::all_shortlists(&state.db).await?))
}

async fn my_shortlist(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<ShortlistView>> {
    Ok(Json(shortlists::shortlist_for_user(&state.db, user.id).await?))
}

async fn add_to_shortlist(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<AddMovieRequest>,
) -> AppResult<(StatusCode, Json<ShortlistView>)> {
    let (view, created) =
        shortlists::add_movie(&state.db, &state.tmdb, user.id, req.movie_id).await?;
    if created {
        spawn_enrich(&state, req.movie_id);
    }
    Ok((StatusCode::CREATED, Json(view)))
}

async fn remove_from_shortlist(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(movie_id): Path<i32>,
) -> AppResult<Json<ShortlistView>> {
    Ok(Json(shortlists::remove_movie(&state.db, user.id, movie_id).await?))
}

async fn set_ready(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<FlagRequest>,
) -> AppResult<Json<ShortlistView>> {
    Ok(Json(shortlists::set_ready(&state.db, user.id, req.value).await?))
}

async fn set_participating(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<FlagRequest>,
) -> AppResult<Json<ShortlistView>> {
    Ok(Json(shortlists::set_participating(&state.db, user.id, req.value).await?))
}

// raffle

async fn start_raffle(
    State(state): State<AppState>,
    CurrentUser(_): CurrentUser,
) -> AppResult<Json<RaffleDraw>> {
    Ok(Json(raffle::start(&state.db).await?))
}

async fn finalize_raffle(
    State(state): State<AppState>,
    CurrentUser(_): CurrentUser,
    Json(req): Json<FinalizeRequest>,
) -> AppResult<Json<MovieView>> {
    let movie = raffle::finalize(&state.db, &state.raffle_lock, req).await?;
    Ok(Json(MovieView::from(&movie)))
}

// dashboard

async fn dashboard_stats(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
) -> Json<DashboardStats> {
    Json(dashboard::stats(&state.db, user.map(|u| u.id)).await)
}

// tierlists

async fn my_tierlists(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<Vec<TierlistSummary>>> {
    Ok(Json(tierlists::tierlists_for_user(&state.db, user.id).await?))
}

async fn user_tierlists(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<Vec<TierlistSummary>>> {
    users::get_user(&state.db, id).await?;
    Ok(Json(tierlists::tierlists_for_user(&state.db, id).await?))
}

async fn create_tierlist(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<CreateTierlistRequest>,
) -> AppResult<(StatusCode, Json<TierlistView>)> {
    let view = tierlists::create_tierlist(&state.db, user.id, req).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

async fn get_tierlist(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<TierlistView>> {
    Ok(Json(tierlists::get_tierlist(&state.db, id).await?))
}

async fn delete_tierlist(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    tierlists::delete_tierlist(&state.db, user.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn place_movie(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i32>,
    Json(req): Json<PlaceMovieRequest>,
) -> AppResult<Json<TierlistView>> {
    Ok(Json(tierlists::place_movie(&state.db, user.id, id, req).await?))
}

async fn remove_placement(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((id, movie_id)): Path<(i32, i32)>,
) -> AppResult<Json<TierlistView>> {
    Ok(Json(tierlists::remove_placement(&state.db, user.id, id, movie_id).await?))
}

// site config

async fn get_site_config(State(state): State<AppState>) -> AppResult<Json<SiteConfigView>> {
    let config = site_config::get(&state.db).await?;
    Ok(Json(site_config::view(&config)))
}

async fn update_site_config(
    State(state): State<AppState>,
    CurrentUser(_): CurrentUser,
    Json(req): Json<UpdateSiteConfig>,
) -> AppResult<Json<SiteConfigView>> {
    Ok(Json(site_config::update(&state.db, req).await?))
}

// preferences

#[derive(Debug, Deserialize)]
struct PreferenceValue {
    value: String,
}

async fn get_preferences(jar: SignedCookieJar) -> Json<Preferences> {
    Json(preferences::read(&jar))
}

async fn set_preference(
    jar: SignedCookieJar,
    Path(key): Path<String>,
    Json(req): Json<PreferenceValue>,
) -> AppResult<(SignedCookieJar, Json<Preferences>)> {
    let jar = preferences::set(jar, key.parse()?, &req.value)?;
    let prefs = preferences::read(&jar);
    Ok((jar, Json(prefs)))
}

// tmdb passthrough

#[derive(Debug, Deserialize)]
struct PageQuery {
    page: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    query: String,
    year: Option<i16>,
    page: Option<u32>,
}

async fn trending(
    State(state): State<AppState>,
    Query(q): Query<PageQuery>,
) -> AppResult<Json<Page<MovieSummary>>> {
    Ok(Json(state.tmdb.trending(q.page.unwrap_or(1)).await?))
}

async fn recommendations(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Query(q): Query<PageQuery>,
) -> AppResult<Json<Page<MovieSummary>>> {
    Ok(Json(state.tmdb.recommendations(id, q.page.unwrap_or(1)).await?))
}

async fn discover(
    State(state): State<AppState>,
    Query(filters): Query<DiscoverFilters>,
) -> AppResult<Json<Page<MovieSummary>>> {
    Ok(Json(state.tmdb.discover(&filters).await?))
}

async fn search(
    State(state): State<AppState>,
    Query(q): Query<SearchQuery>,
) -> AppResult<Json<Page<MovieSummary>>> {
    let query = q.query.trim();
    if query.is_empty() {
        return Err(crate::error::AppError::bad_request("query is required"));
    }
    Ok(Json(state.tmdb.search(query, q.year, q.page.unwrap_or(1)).await?))
}

async fn genres(State(state): State<AppState>) -> AppResult<Json<Vec<Genre>>> {
    Ok(Json(state.tmdb.genres().await?))
}

async fn watch_providers(State(state): State<AppState>) -> AppResult<Json<Vec<ProviderRef>>> {
    Ok(Json(state.tmdb.watch_providers().await?))
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{Method, Request, Response, header},
    };
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use super::*;
    use crate::testing;

    async fn send(app: &Router, method: Method, uri: &str, cookie: Option<&str>, body: Option<serde_json::Value>) -> Response<Body> {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(cookie) = cookie {
            req = req.header(header::COOKIE, cookie);
        }
        let body = match body {
            Some(json) => {
                req = req.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            },
            None => Body::empty(),
        };
        app.clone().oneshot(req.body(body).unwrap()).await.unwrap()
    }

    async fn json(resp: Response<Body>) -> serde_json::Value {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    /// `name=value` pairs from every Set-Cookie header, ready for a Cookie header.
    fn cookies(resp: &Response<Body>) -> String {
        resp.headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .filter_map(|v| v.split(';').next())
            .collect::<Vec<_>>()
            .join("; ")
    }

    async fn sign_up(app: &Router, name: &str) -> String {
        let resp = send(
            app,
            Method::POST,
            "/api/auth/register",
            None,
            Some(serde_json::json!({
                "name": name,
                "email": format!("{}@club.test", name.to_lowercase()),
                "password": "hunter2hunter2",
            })),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        cookies(&resp)
    }

    #[tokio::test]
    async fn health_and_pages_render() {
        let app = router(testing::state(testing::db().await));

        let resp = send(&app, Method::GET, "/health", None, None).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(json(resp).await["status"], "ok");

        for uri in ["/", "/watched", "/shortlists"] {
            let resp = send(&app, Method::GET, uri, None, None).await;
            assert_eq!(resp.status(), StatusCode::OK, "{uri}");
        }
    }

    #[tokio::test]
    async fn session_cookie_identifies_member() {
        let app = router(testing::state(testing::db().await));

        let resp = send(&app, Method::GET, "/api/me", None, None).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let cookie = sign_up(&app, "Ada").await;
        let resp = send(&app, Method::GET, "/api/me", Some(&cookie), None).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(json(resp).await["email"], "ada@club.test");

        let forged = "filmclub_session=1";
        let resp = send(&app, Method::GET, "/api/me", Some(forged), None).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn raffle_round_over_http() {
        let app = router(testing::state(testing::db().await));
        let cookie = sign_up(&app, "Ada").await;

        let resp = send(&app, Method::POST, "/api/raffle/start", Some(&cookie), None).await;
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(json(resp).await["error"], "no shortlists are ready");

        for id in [550, 551] {
            let resp = send(
                &app,
                Method::POST,
                "/api/shortlists/me/movies",
                Some(&cookie),
                Some(serde_json::json!({ "movie_id": id })),
            )
            .await;
            assert_eq!(resp.status(), StatusCode::CREATED);
        }

        let dup = send(
            &app,
            Method::POST,
            "/api/shortlists/me/movies",
            Some(&cookie),
            Some(serde_json::json!({ "movie_id": 550 })),
        )
        .await;
        assert_eq!(dup.status(), StatusCode::CONFLICT);

        let resp = send(
            &app,
            Method::PUT,
            "/api/shortlists/me/ready",
            Some(&cookie),
            Some(serde_json::json!({ "value": true })),
        )
        .await;
        assert_eq!(json(resp).await["is_ready"], true);

        let resp = send(&app, Method::POST, "/api/raffle/start", Some(&cookie), None).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let draw = json(resp).await;
        assert_eq!(draw["candidates"].as_array().unwrap().len(), 2);
        let winner = draw["movie"]["id"].as_i64().unwrap();
        let user_id = draw["user"]["id"].as_i64().unwrap();

        let resp = send(
            &app,
            Method::POST,
            "/api/raffle/finalize",
            Some(&cookie),
            Some(serde_json::json!({ "movie_id": winner, "watch_date": "2024-06-05", "user_id": user_id })),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);

        let watched = json(send(&app, Method::GET, "/api/movies/watched", None, None).await).await;
        assert_eq!(watched[0]["movie"]["id"].as_i64(), Some(winner));

        let mine = json(send(&app, Method::GET, "/api/shortlists/me", Some(&cookie), None).await).await;
        assert_eq!(mine["movies"].as_array().unwrap().len(), 1);
        assert_eq!(mine["is_ready"], false);

        let stats = json(send(&app, Method::GET, "/api/dashboard", Some(&cookie), None).await).await;
        assert_eq!(stats["total_watched_movies"], 1);
        assert_eq!(stats["total_watched_by_current_user"], 1);
    }

    #[tokio::test]
    async fn preferences_round_trip_through_cookies() {
        let app = router(testing::state(testing::db().await));

        let prefs = json(send(&app, Method::GET, "/api/preferences", None, None).await).await;
        assert_eq!(prefs["theme"], "system");
        assert_eq!(prefs["color_scheme"], "blue");

        let resp = send(
            &app,
            Method::PUT,
            "/api/preferences/theme",
            None,
            Some(serde_json::json!({ "value": "dark" })),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let cookie = cookies(&resp);

        let prefs = json(send(&app, Method::GET, "/api/preferences", Some(&cookie), None).await).await;
        assert_eq!(prefs["theme"], "dark");
        assert_eq!(prefs["background"], "on");

        let bad = send(
            &app,
            Method::PUT,
            "/api/preferences/color-scheme",
            None,
            Some(serde_json::json!({ "value": "neon" })),
        )
        .await;
        assert_eq!(bad.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn tierlist_over_http() {
        let state = testing::state(testing::db().await);
        let app = router(state.clone());
        let cookie = sign_up(&app, "Ada").await;
        let me = json(send(&app, Method::GET, "/api/me", Some(&cookie), None).await).await;
        let user_id = me["id"].as_i64().unwrap() as i32;
        testing::watched_movie(&state.db, 680, user_id, "2024-01-10").await;

        let resp = send(
            &app,
            Method::POST,
            "/api/tierlists",
            Some(&cookie),
            Some(serde_json::json!({ "title": "2024" })),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let list = json(resp).await;
        assert_eq!(list["tiers"].as_array().unwrap().len(), 5);
        assert_eq!(list["unranked"][0]["id"], 680);

        let id = list["id"].as_i64().unwrap();
        let top = list["tiers"][0]["id"].as_i64().unwrap();
        let resp = send(
            &app,
            Method::PUT,
            &format!("/api/tierlists/{id}/placements"),
            Some(&cookie),
            Some(serde_json::json!({ "movie_id": 680, "tier_id": top })),
        )
        .await;
        let placed = json(resp).await;
        assert_eq!(placed["tiers"][0]["movies"][0]["id"], 680);
        assert!(placed["unranked"].as_array().unwrap().is_empty());

        let other = sign_up(&app, "Bob").await;
        let resp =
            send(&app, Method::DELETE, &format!("/api/tierlists/{id}"), Some(&other), None).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn site_config_and_tmdb_mock() {
        let app = router(testing::state(testing::db().await));
        let cookie = sign_up(&app, "Ada").await;

        let resp = send(
            &app,
            Method::PUT,
            "/api/site-config",
            Some(&cookie),
            Some(serde_json::json!({ "watch_weekday": 5 })),
        )
        .await;
        assert_eq!(json(resp).await["watch_weekday"], 5);

        let trending = json(send(&app, Method::GET, "/api/tmdb/trending?page=2", None, None).await).await;
        assert_eq!(trending["page"], 2);

        let resp = send(&app, Method::GET, "/api/tmdb/search?query=%20", None, None).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
