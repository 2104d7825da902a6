use std::{collections::HashMap, num::NonZeroU32, sync::Arc};

use governor::{
    Quota, RateLimiter,
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::debug;

use crate::{
    cache::ResponseCache,
    error::AppResult,
    models::{Genre, ProviderType, WatchProvider},
};

const DETAIL_APPENDS: &str = "credits,images,videos,watch/providers";

pub struct TmdbClient {
    client: reqwest::Client,
    access_token: String,
    base_url: String,
    region: String,
    cache: ResponseCache,
    limiter: Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
}

impl TmdbClient {
    pub fn new(
        client: reqwest::Client,
        access_token: String,
        base_url: String,
        region: String,
        rps: u32,
        cache: ResponseCache,
    ) -> Self {
        // Warn once on app load if using mock data
        if access_token.trim().is_empty() {
            tracing::warn!("Using mock TMDB data - no TMDB_ACCESS_TOKEN provided");
        }

        let limiter = Arc::new(RateLimiter::direct(Quota::per_second(
            NonZeroU32::new(rps.max(1)).unwrap_or(NonZeroU32::MIN),
        )));
        Self { client, access_token, base_url, region, cache, limiter }
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn is_mock(&self) -> bool {
        self.access_token.trim().is_empty()
    }

    pub async fn trending(&self, page: u32) -> AppResult<Page<MovieSummary>> {
        if self.is_mock() {
            return Ok(mock::page(page));
        }
        self.get_cached("/trending/movie/week", &[("page", page.to_string())]).await
    }

    pub async fn recommendations(&self, movie_id: i32, page: u32) -> AppResult<Page<MovieSummary>> {
        if self.is_mock() {
            return Ok(mock::page(page));
        }
        let path = format!("/movie/{movie_id}/recommendations");
        self.get_cached(&path, &[("page", page.to_string())]).await
    }

    pub async fn discover(&self, filters: &DiscoverFilters) -> AppResult<Page<MovieSummary>> {
        if self.is_mock() {
            return Ok(mock::page(filters.page.unwrap_or(1)));
        }
        let query = filters.to_query(&self.region);
        self.get_json("/discover/movie", &query).await
    }

    pub async fn search(
        &self,
        query: &str,
        year: Option<i16>,
        page: u32,
    ) -> AppResult<Page<MovieSummary>> {
        if self.is_mock() {
            let mut out = mock::page(page);
            for movie in &mut out.results {
                movie.title = format!("{query} {}", movie.id);
            }
            return Ok(out);
        }

        let mut params = vec![("query", query.to_string()), ("page", page.to_string())];
        if let Some(year) = year {
            params.push(("year", year.to_string()));
        }
        self.get_json("/search/movie", &params).await
    }

    pub async fn genres(&self) -> AppResult<Vec<Genre>> {
        if self.is_mock() {
            return Ok(mock::genres());
        }
        let resp: GenreList = self.get_cached("/genre/movie/list", &[]).await?;
        Ok(resp.genres)
    }

    pub async fn watch_providers(&self) -> AppResult<Vec<ProviderRef>> {
        if self.is_mock() {
            return Ok(mock::providers());
        }
        let resp: ProviderList = self
            .get_cached("/watch/providers/movie", &[("watch_region", self.region.clone())])
            .await?;
        let mut providers = resp.results;
        providers.sort_by_key(|p| p.display_priority.unwrap_or(i32::MAX));
        Ok(providers)
    }

    /// Full details with credits, images, videos and watch providers appended.
    pub async fn movie_details(&self, movie_id: i32) -> AppResult<MovieDetails> {
        if self.is_mock() {
            return Ok(mock::details(movie_id));
        }
        let path = format!("/movie/{movie_id}");
        self.get_json(&path, &[("append_to_response", DETAIL_APPENDS.to_string())]).await
    }

    /// Fetches a poster rendition from the image CDN.
    pub async fn image_bytes(&self, url: &str) -> AppResult<Vec<u8>> {
        self.limiter.until_ready().await;
        let bytes = self.client.get(url).send().await?.error_for_status()?.bytes().await?;
        Ok(bytes.to_vec())
    }

    async fn get_cached<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> AppResult<T> {
        let key = cache_key(path, query);
        if let Some(body) = self.cache.get(&key).await? {
            debug!(key = %key, "serving cached TMDB response");
            return Ok(serde_json::from_str(&body).map_err(anyhow::Error::new)?);
        }

        let body = self.get_text(path, query).await?;
        let parsed = serde_json::from_str(&body).map_err(anyhow::Error::new)?;
        self.cache.put(&key, &body).await?;
        Ok(parsed)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> AppResult<T> {
        let body = self.get_text(path, query).await?;
        Ok(serde_json::from_str(&body).map_err(anyhow::Error::new)?)
    }

    async fn get_text(&self, path: &str, query: &[(&str, String)]) -> AppResult<String> {
        self.limiter.until_ready().await;

        let url = format!("{}{}", self.base_url.trim_end_matches('/'), path);
        debug!(url = %url, "TMDB request");

        let body = self
            .client
            .get(url)
            .bearer_auth(&self.access_token)
            .query(query)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(body)
    }
}

fn cache_key(path: &str, query: &[(&str, String)]) -> String {
    if query.is_empty() {
        return path.to_string();
    }
    let mut pairs: Vec<_> = query.iter().collect();
    pairs.sort_by(|a, b| a.0.cmp(b.0));
    let qs = pairs
        .iter()
        .map(|(k, v)| format!("{k}={}", urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&");
    format!("{path}?{qs}")
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct DiscoverFilters {
    pub page: Option<u32>,
    /// Comma separated genre ids.
    pub with_genres: Option<String>,
    /// Pipe separated provider ids.
    pub with_watch_providers: Option<String>,
    pub primary_release_year: Option<i16>,
    pub sort_by: Option<String>,
}

impl DiscoverFilters {
    fn to_query(&self, region: &str) -> Vec<(&'static str, String)> {
        let mut q = vec![
            ("page", self.page.unwrap_or(1).to_string()),
            ("sort_by", self.sort_by.clone().unwrap_or_else(|| "popularity.desc".to_string())),
            ("include_adult", "false".to_string()),
        ];
        if let Some(genres) = self.with_genres.as_ref().filter(|s| !s.is_empty()) {
            q.push(("with_genres", genres.clone()));
        }
        if let Some(providers) = self.with_watch_providers.as_ref().filter(|s| !s.is_empty()) {
            q.push(("with_watch_providers", providers.clone()));
            q.push(("watch_region", region.to_string()));
        }
        if let Some(year) = self.primary_release_year {
            q.push(("primary_release_year", year.to_string()));
        }
        q
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Page<T> {
    pub page: u32,
    pub results: Vec<T>,
    #[serde(default)]
    pub total_pages: u32,
    #[serde(default)]
    pub total_results: u32,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct MovieSummary {
    pub id: i32,
    pub title: String,
    #[serde(default)]
    pub overview: String,
    pub release_date: Option<String>,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
    #[serde(default)]
    pub vote_average: f64,
    #[serde(default)]
    pub genre_ids: Vec<i32>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct MovieDetails {
    pub id: i32,
    pub title: String,
    #[serde(default)]
    pub original_title: String,
    #[serde(default)]
    pub overview: String,
    pub release_date: Option<String>,
    pub runtime: Option<i32>,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
    #[serde(default)]
    pub vote_average: f64,
    pub imdb_id: Option<String>,
    #[serde(default)]
    pub genres: Vec<Genre>,
    pub credits: Option<Credits>,
    pub images: Option<Images>,
    pub videos: Option<Videos>,
    #[serde(rename = "watch/providers")]
    pub watch_providers: Option<WatchProvidersResponse>,
}

impl MovieDetails {
    /// Providers offered in `region`, streaming first.
    pub fn providers_in(&self, region: &str) -> Vec<WatchProvider> {
        let Some(region) = self.watch_providers.as_ref().and_then(|w| w.results.get(region))
        else {
            return Vec::new();
        };

        let mut out = Vec::new();
        for (kind, list) in [
            (ProviderType::Stream, &region.flatrate),
            (ProviderType::Rent, &region.rent),
            (ProviderType::Buy, &region.buy),
        ] {
            for p in list {
                out.push(WatchProvider {
                    provider_id: p.provider_id,
                    provider_name: p.provider_name.clone(),
                    logo_path: p.logo_path.clone(),
                    link: region.link.clone(),
                    provider_type: kind,
                });
            }
        }
        out
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Credits {
    #[serde(default)]
    pub cast: Vec<CastMember>,
    #[serde(default)]
    pub crew: Vec<CrewMember>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct CastMember {
    pub id: i32,
    pub name: String,
    pub character: Option<String>,
    pub profile_path: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct CrewMember {
    pub id: i32,
    pub name: String,
    pub job: String,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Images {
    #[serde(default)]
    pub backdrops: Vec<ImageRef>,
    #[serde(default)]
    pub posters: Vec<ImageRef>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ImageRef {
    pub file_path: String,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Videos {
    #[serde(default)]
    pub results: Vec<Video>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Video {
    pub key: String,
    pub name: String,
    pub site: String,
    #[serde(rename = "type")]
    pub type_: String,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct WatchProvidersResponse {
    #[serde(default)]
    pub results: HashMap<String, RegionProviders>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct RegionProviders {
    pub link: Option<String>,
    #[serde(default)]
    pub flatrate: Vec<ProviderRef>,
    #[serde(default)]
    pub rent: Vec<ProviderRef>,
    #[serde(default)]
    pub buy: Vec<ProviderRef>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ProviderRef {
    pub provider_id: i32,
    pub provider_name: String,
    pub logo_path: Option<String>,
    pub display_priority: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct GenreList {
    genres: Vec<Genre>,
}

#[derive(Debug, Deserialize)]
struct ProviderList {
    results: Vec<ProviderRef>,
}

/// Deterministic stand-ins used when no access token is configured.
mod mock {
    use super::*;

    const GENRES: [(i32, &str); 5] =
        [(18, "Drama"), (35, "Comedy"), (28, "Action"), (27, "Horror"), (878, "Science Fiction")];

    pub fn genres() -> Vec<Genre> {
        GENRES.iter().map(|(id, name)| Genre { id: *id, name: name.to_string() }).collect()
    }

    pub fn providers() -> Vec<ProviderRef> {
        vec![
            ProviderRef {
                provider_id: 8,
                provider_name: "Netflix".to_string(),
                logo_path: Some("/netflix.jpg".to_string()),
                display_priority: Some(1),
            },
            ProviderRef {
                provider_id: 337,
                provider_name: "Disney Plus".to_string(),
                logo_path: Some("/disney.jpg".to_string()),
                display_priority: Some(2),
            },
        ]
    }

    pub fn page(page: u32) -> Page<MovieSummary> {
        let page = page.max(1);
        let base = page as i32 * 100;
        let results = (1..=3)
            .map(|i| MovieSummary {
                id: base + i,
                title: format!("Mock Movie {}", base + i),
                overview: "Mock overview".to_string(),
                release_date: Some("2020-01-01".to_string()),
                poster_path: None,
                backdrop_path: None,
                vote_average: 6.5,
                genre_ids: vec![18],
            })
            .collect();
        Page { page, results, total_pages: 5, total_results: 15 }
    }

    /// Runtime and genres vary with the id so aggregates have something to chew on.
    pub fn details(movie_id: i32) -> MovieDetails {
        let all = genres();
        let first = all[movie_id.rem_euclid(all.len() as i32) as usize].clone();
        let mut genres = vec![first];
        if movie_id % 2 == 0 && genres[0].id != 18 {
            genres.push(all[0].clone());
        }

        let mut regions = HashMap::new();
        regions.insert(
            "FI".to_string(),
            RegionProviders {
                link: Some(format!("https://www.themoviedb.org/movie/{movie_id}/watch")),
                flatrate: vec![providers()[0].clone()],
                rent: Vec::new(),
                buy: Vec::new(),
            },
        );

        MovieDetails {
            id: movie_id,
            title: format!("Mock Movie {movie_id}"),
            original_title: format!("Mock Movie {movie_id}"),
            overview: "Mock overview".to_string(),
            release_date: Some("2020-01-01".to_string()),
            runtime: Some(90 + movie_id.rem_euclid(60)),
            poster_path: None,
            backdrop_path: None,
            vote_average: 5.0 + f64::from(movie_id.rem_euclid(5)),
            imdb_id: None,
            genres,
            credits: Some(Credits::default()),
            images: Some(Images::default()),
            videos: Some(Videos::default()),
            watch_providers: Some(WatchProvidersResponse { results: regions }),
        }
    }
}
