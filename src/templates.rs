use maud::{DOCTYPE, Markup, html};

use crate::models::{
    Background, DashboardStats, MovieView, Preferences, ShortlistView, Theme, UserView,
    WatchedMovie,
};

const TAILWIND_CDN: &str = "https://cdn.tailwindcss.com";
const POSTER_SIZE: &str = "w342";

/// What every page needs besides its own content.
pub struct Layout<'a> {
    pub prefs: Preferences,
    pub user: Option<&'a UserView>,
    pub image_base_url: &'a str,
}

impl Layout<'_> {
    fn accent(&self) -> &'static str {
        self.prefs.color_scheme.as_str()
    }

    fn poster_url(&self, movie: &MovieView) -> Option<String> {
        movie
            .poster_path
            .as_ref()
            .map(|p| format!("{}/{POSTER_SIZE}{p}", self.image_base_url.trim_end_matches('/')))
    }
}

pub fn dashboard_page(layout: &Layout, stats: &DashboardStats) -> String {
    let accent = layout.accent();
    page(
        layout,
        "Film club",
        html! {
            div class="grid gap-4 sm:grid-cols-2 lg:grid-cols-4" {
                (stat_card(layout, "Movies watched", stats.total_watched_movies.to_string()))
                @if layout.user.is_some() {
                    (stat_card(layout, "Picked by you", stats.total_watched_by_current_user.to_string()))
                }
                (stat_card(layout, "Time spent", format_runtime(stats.total_runtime_minutes)))
                (stat_card(layout, "Average rating", format!("{:.1}", stats.average_rating)))
            }

            div class="mt-8 grid gap-6 lg:grid-cols-3" {
                div class="lg:col-span-2" {
                    h2 class="text-lg font-semibold" { "Last watched" }
                    @match &stats.last_watched {
                        Some(movie) => { div class="mt-3" { (movie_card(layout, movie, None)) } }
                        None => { p class="mt-3 text-gray-500" { "Nothing watched yet." } }
                    }
                }

                div class="space-y-6" {
                    div class="bg-white dark:bg-gray-800 shadow rounded-lg p-6" {
                        h2 class="text-lg font-semibold" { "Next movie night" }
                        p class=(format!("mt-2 text-2xl font-bold text-{accent}-600")) {
                            (stats.next_watch_date.as_deref().unwrap_or("not scheduled"))
                        }
                    }

                    @if !stats.genres.is_empty() {
                        div class="bg-white dark:bg-gray-800 shadow rounded-lg p-6" {
                            h2 class="text-lg font-semibold" { "Genres" }
                            ul class="mt-3 space-y-1" {
                                @for g in stats.genres.iter().take(8) {
                                    li class="flex justify-between text-sm" {
                                        span { (g.genre) }
                                        span class="text-gray-500" { (g.count) }
                                    }
                                }
                            }
                        }
                    }

                    @if !stats.watched_by_member.is_empty() {
                        div class="bg-white dark:bg-gray-800 shadow rounded-lg p-6" {
                            h2 class="text-lg font-semibold" { "Picks per member" }
                            ul class="mt-3 space-y-1" {
                                @for m in &stats.watched_by_member {
                                    li class="flex justify-between text-sm" {
                                        span { (m.name) }
                                        span class="text-gray-500" { (m.count) }
                                    }
                                }
                            }
                        }
                    }
                }
            }
        },
    )
}

pub fn watched_page(layout: &Layout, movies: &[WatchedMovie]) -> String {
    page(
        layout,
        "Watched",
        html! {
            h1 class="text-3xl font-bold" { "Watched movies" }
            @if movies.is_empty() {
                p class="mt-6 text-gray-500" { "Nothing watched yet." }
            } @else {
                div class="mt-6 grid gap-4 md:grid-cols-2" {
                    @for w in movies {
                        (movie_card(layout, &w.movie, w.watched_by.as_ref()))
                    }
                }
            }
        },
    )
}

pub fn shortlists_page(layout: &Layout, lists: &[ShortlistView]) -> String {
    let accent = layout.accent();
    page(
        layout,
        "Shortlists",
        html! {
            h1 class="text-3xl font-bold" { "Shortlists" }
            div class="mt-6 space-y-6" {
                @for list in lists {
                    div class="bg-white dark:bg-gray-800 shadow rounded-lg p-6" {
                        div class="flex items-center justify-between gap-4" {
                            h2 class="text-xl font-semibold" { (list.user.name) }
                            div class="flex gap-2 text-xs" {
                                @if list.is_ready {
                                    span class=(format!("rounded-full bg-{accent}-100 px-2 py-1 text-{accent}-800")) { "Ready" }
                                } @else {
                                    span class="rounded-full bg-gray-100 px-2 py-1 text-gray-600" { "Not ready" }
                                }
                                @if !list.participating {
                                    span class="rounded-full bg-gray-100 px-2 py-1 text-gray-600" { "Sitting out" }
                                }
                            }
                        }
                        @if list.movies.is_empty() {
                            p class="mt-3 text-sm text-gray-500" { "No movies yet." }
                        } @else {
                            ul class="mt-4 grid gap-3 sm:grid-cols-2 lg:grid-cols-3" {
                                @for movie in &list.movies {
                                    li class="flex items-center gap-3" {
                                        (poster(layout, movie, "h-16 w-11"))
                                        div {
                                            p class="font-medium" { (movie.title) }
                                            @if let Some(year) = release_year(movie) {
                                                p class="text-xs text-gray-500" { (year) }
                                            }
                                        }
                                    }
                                }
                            }
                        }
                    }
                }
            }
        },
    )
}

pub fn error_page(message: String) -> String {
    let layout = Layout { prefs: Preferences::default(), user: None, image_base_url: "" };
    page(
        &layout,
        "Error",
        html! {
            div class="max-w-xl mx-auto bg-white dark:bg-gray-800 shadow rounded-lg p-8" {
                h1 class="text-2xl font-bold" { "Error" }
                p class="mt-4 text-gray-700 dark:text-gray-300" { (message) }
                a class="mt-6 inline-block text-blue-600 hover:text-blue-800" href="/" { "Back" }
            }
        },
    )
}

fn page(layout: &Layout, title: &str, body: Markup) -> String {
    let accent = layout.accent();
    let html_class = match layout.prefs.theme {
        Theme::Dark => "dark",
        Theme::Light | Theme::System => "",
    };
    let body_class = match layout.prefs.background {
        Background::On => {
            format!("min-h-screen bg-gradient-to-b from-{accent}-50 to-gray-50 dark:from-gray-900 dark:to-gray-950 text-gray-900 dark:text-gray-100")
        },
        Background::Off => "min-h-screen bg-gray-50 dark:bg-gray-900 text-gray-900 dark:text-gray-100".to_string(),
    };

    html! {
        (DOCTYPE)
        html lang="en" class=(html_class) data-theme=(layout.prefs.theme.as_str()) data-color-scheme=(accent) {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1";
                title { (title) }
                script src=(TAILWIND_CDN) {}
            }
            body class=(body_class) {
                nav class="border-b border-gray-200 dark:border-gray-800" {
                    div class="max-w-5xl mx-auto px-6 py-4 flex items-center gap-6" {
                        a class=(format!("font-bold text-{accent}-600")) href="/" { "Film club" }
                        a class="text-sm hover:underline" href="/watched" { "Watched" }
                        a class="text-sm hover:underline" href="/shortlists" { "Shortlists" }
                        @if let Some(user) = layout.user {
                            span class="ml-auto text-sm text-gray-500" { (user.name) }
                        }
                    }
                }
                main class="max-w-5xl mx-auto px-6 py-10" { (body) }
            }
        }
    }
    .into_string()
}

fn stat_card(layout: &Layout, label: &str, value: String) -> Markup {
    html! {
        div class="bg-white dark:bg-gray-800 shadow rounded-lg p-6" {
            p class="text-sm text-gray-500" { (label) }
            p class=(format!("mt-2 text-3xl font-bold text-{}-600", layout.accent())) { (value) }
        }
    }
}

fn movie_card(layout: &Layout, movie: &MovieView, watched_by: Option<&UserView>) -> Markup {
    html! {
        div class="bg-white dark:bg-gray-800 shadow rounded-lg p-4 flex gap-4" {
            (poster(layout, movie, "h-36 w-24"))
            div class="min-w-0" {
                h3 class="text-lg font-semibold" {
                    (movie.title)
                    @if let Some(year) = release_year(movie) {
                        span class="ml-2 font-normal text-gray-500" { "(" (year) ")" }
                    }
                }
                p class="mt-1 text-sm text-gray-500" {
                    @if let Some(date) = &movie.watch_date { (date) }
                    @if let Some(user) = watched_by { " · picked by " (user.name) }
                    @if let Some(runtime) = movie.runtime { " · " (format_runtime(runtime.into())) }
                }
                @if !movie.genres.is_empty() {
                    p class="mt-1 text-xs text-gray-500" {
                        (movie.genres.iter().map(|g| g.name.as_str()).collect::<Vec<_>>().join(", "))
                    }
                }
                p class="mt-2 text-sm line-clamp-3" { (movie.overview) }
                a class="mt-2 inline-block text-xs text-gray-500 hover:text-gray-700" href=(format!("https://www.themoviedb.org/movie/{}", movie.id)) target="_blank" rel="noopener noreferrer" {
                    "TMDB"
                }
            }
        }
    }
}

fn poster(layout: &Layout, movie: &MovieView, size: &str) -> Markup {
    html! {
        @match layout.poster_url(movie) {
            Some(url) => {
                img class=(format!("{size} flex-none rounded object-cover bg-gray-200"))
                    src=(url)
                    alt=(movie.title)
                    loading="lazy"
                    style=[movie.blur_data_url.as_ref().map(|d| format!("background-image:url({d});background-size:cover"))];
            }
            None => { div class=(format!("{size} flex-none rounded bg-gray-200 dark:bg-gray-700")) {} }
        }
    }
}

fn release_year(movie: &MovieView) -> Option<&str> {
    movie.release_date.as_deref().and_then(|d| d.get(..4)).filter(|y| !y.is_empty())
}

fn format_runtime(minutes: i64) -> String {
    match (minutes / 60, minutes % 60) {
        (0, m) => format!("{m}m"),
        (h, 0) => format!("{h}h"),
        (h, m) => format!("{h}h {m}m"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ColorScheme, MovieImages};

    fn movie(title: &str) -> MovieView {
        MovieView {
            id: 603,
            title: title.to_string(),
            original_title: title.to_string(),
            overview: "A hacker learns the truth.".to_string(),
            release_date: Some("1999-03-31".to_string()),
            runtime: Some(136),
            poster_path: Some("/poster.jpg".to_string()),
            backdrop_path: None,
            vote_average: 8.2,
            imdb_id: None,
            genres: Vec::new(),
            images: MovieImages::default(),
            watch_providers: Vec::new(),
            blur_data_url: None,
            watch_date: Some("2024-06-05".to_string()),
            user_id: None,
        }
    }

    #[test]
    fn runtime_formatting() {
        assert_eq!(format_runtime(45), "45m");
        assert_eq!(format_runtime(120), "2h");
        assert_eq!(format_runtime(136), "2h 16m");
    }

    #[test]
    fn pages_escape_and_follow_preferences() {
        let prefs = Preferences {
            theme: Theme::Dark,
            color_scheme: ColorScheme::Violet,
            background: Background::Off,
        };
        let layout = Layout { prefs, user: None, image_base_url: "https://img.test/t/p/" };
        let html = watched_page(
            &layout,
            &[WatchedMovie { movie: movie("<The Matrix>"), watched_by: None }],
        );

        assert!(html.contains("&lt;The Matrix&gt;"));
        assert!(html.contains(r#"class="dark""#));
        assert!(html.contains(r#"data-color-scheme="violet""#));
        assert!(html.contains("https://img.test/t/p/w342/poster.jpg"));
        assert!(html.contains("(1999)"));
    }

    #[test]
    fn error_page_shows_message() {
        assert!(error_page("no shortlists are ready".to_string()).contains("no shortlists are ready"));
    }
}
