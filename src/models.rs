use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::entities::{movie, user};

#[derive(Clone, Debug, Eq, PartialEq, Hash, Deserialize, Serialize)]
pub struct Genre {
    pub id: i32,
    pub name: String,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    Stream,
    Rent,
    Buy,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct WatchProvider {
    pub provider_id: i32,
    pub provider_name: String,
    pub logo_path: Option<String>,
    pub link: Option<String>,
    pub provider_type: ProviderType,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct MovieImages {
    pub posters: Vec<String>,
    pub backdrops: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct UserView {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub image: Option<String>,
}

impl From<&user::Model> for UserView {
    fn from(u: &user::Model) -> Self {
        Self { id: u.id, name: u.name.clone(), email: u.email.clone(), image: u.image.clone() }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MovieView {
    pub id: i32,
    pub title: String,
    pub original_title: String,
    pub overview: String,
    pub release_date: Option<String>,
    pub runtime: Option<i32>,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
    pub vote_average: f64,
    pub imdb_id: Option<String>,
    pub genres: Vec<Genre>,
    pub images: MovieImages,
    pub watch_providers: Vec<WatchProvider>,
    pub blur_data_url: Option<String>,
    pub watch_date: Option<String>,
    pub user_id: Option<i32>,
}

impl From<&movie::Model> for MovieView {
    fn from(m: &movie::Model) -> Self {
        Self {
            id: m.id,
            title: m.title.clone(),
            original_title: m.original_title.clone(),
            overview: m.overview.clone(),
            release_date: m.release_date.clone(),
            runtime: m.runtime,
            poster_path: m.poster_path.clone(),
            backdrop_path: m.backdrop_path.clone(),
            vote_average: m.vote_average,
            imdb_id: m.imdb_id.clone(),
            genres: genres_of(m),
            images: serde_json::from_value(m.images.clone()).unwrap_or_default(),
            watch_providers: serde_json::from_value(m.watch_providers.clone()).unwrap_or_default(),
            blur_data_url: m.blur_data_url.clone(),
            watch_date: m.watch_date.clone(),
            user_id: m.user_id,
        }
    }
}

/// Genres stored on a movie row; malformed JSON reads as no genres.
pub fn genres_of(m: &movie::Model) -> Vec<Genre> {
    serde_json::from_value(m.genres.clone()).unwrap_or_default()
}

#[derive(Clone, Debug, Serialize)]
pub struct WatchedMovie {
    pub movie: MovieView,
    pub watched_by: Option<UserView>,
}

#[derive(Clone, Debug, Serialize)]
pub struct ShortlistView {
    pub id: i32,
    pub user: UserView,
    pub is_ready: bool,
    pub participating: bool,
    pub movies: Vec<MovieView>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RaffleCandidate {
    pub movie_id: i32,
    pub title: String,
    pub poster_path: Option<String>,
    pub user_id: i32,
    pub user_name: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct RaffleDraw {
    pub movie: MovieView,
    pub user: UserView,
    /// Every entry that was in the draw, in draw order.
    pub candidates: Vec<RaffleCandidate>,
}

#[derive(Debug, Deserialize)]
pub struct FinalizeRequest {
    pub movie_id: i32,
    pub watch_date: String,
    pub user_id: i32,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct GenreCount {
    pub genre: String,
    pub count: u64,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct MemberCount {
    pub user_id: i32,
    pub name: String,
    pub count: u64,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct DashboardStats {
    pub total_watched_movies: u64,
    pub total_watched_by_current_user: u64,
    pub total_runtime_minutes: i64,
    pub average_runtime_minutes: f64,
    pub average_rating: f64,
    pub genres: Vec<GenreCount>,
    pub watched_by_member: Vec<MemberCount>,
    pub last_watched: Option<MovieView>,
    pub next_watch_date: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct TierView {
    pub id: i32,
    pub label: String,
    pub value: i32,
    pub movies: Vec<MovieView>,
}

#[derive(Clone, Debug, Serialize)]
pub struct TierlistView {
    pub id: i32,
    pub user_id: i32,
    pub title: String,
    pub tiers: Vec<TierView>,
    pub unranked: Vec<MovieView>,
}

#[derive(Clone, Debug, Serialize)]
pub struct TierlistSummary {
    pub id: i32,
    pub user_id: i32,
    pub title: String,
    pub created_at: i64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CreateTierlistRequest {
    pub title: String,
    #[serde(default)]
    pub tiers: Vec<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct PlaceMovieRequest {
    pub movie_id: i32,
    pub tier_id: i32,
    pub position: Option<usize>,
}

#[derive(Clone, Debug, Serialize)]
pub struct SiteConfigView {
    pub watch_providers: Vec<i32>,
    pub watch_weekday: i32,
}

#[derive(Clone, Debug, Deserialize)]
pub struct UpdateSiteConfig {
    pub watch_providers: Option<Vec<i32>>,
    pub watch_weekday: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    #[default]
    System,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorScheme {
    Red,
    Orange,
    Yellow,
    Green,
    #[default]
    Blue,
    Indigo,
    Violet,
    Gray,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Background {
    #[default]
    On,
    Off,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub struct Preferences {
    pub theme: Theme,
    pub color_scheme: ColorScheme,
    pub background: Background,
}

#[derive(Debug, thiserror::Error)]
#[error("unknown value '{0}'")]
pub struct UnknownVariant(pub String);

macro_rules! str_enum {
    ($ty:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(self) -> &'static str {
                match self {
                    $($ty::$variant => $s,)+
                }
            }
        }

        impl FromStr for $ty {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($s => Ok($ty::$variant),)+
                    other => Err(UnknownVariant(other.to_string())),
                }
            }
        }
    };
}

str_enum!(Theme { Light => "light", Dark => "dark", System => "system" });
str_enum!(ColorScheme {
    Red => "red",
    Orange => "orange",
    Yellow => "yellow",
    Green => "green",
    Blue => "blue",
    Indigo => "indigo",
    Violet => "violet",
    Gray => "gray",
});
str_enum!(Background { On => "on", Off => "off" });

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preference_values_parse_case_insensitively() {
        assert_eq!("Dark".parse::<Theme>().unwrap(), Theme::Dark);
        assert_eq!(" violet ".parse::<ColorScheme>().unwrap(), ColorScheme::Violet);
        assert_eq!("off".parse::<Background>().unwrap(), Background::Off);
        let err = "Neon".parse::<ColorScheme>().unwrap_err();
        assert_eq!(err.to_string(), "unknown value 'neon'");
        assert_eq!(ColorScheme::Gray.as_str(), "gray");
    }

    #[test]
    fn defaults_match_fresh_visitor() {
        let prefs = Preferences::default();
        assert_eq!(prefs.theme, Theme::System);
        assert_eq!(prefs.color_scheme, ColorScheme::Blue);
        assert_eq!(prefs.background, Background::On);
    }
}
