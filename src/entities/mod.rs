pub mod movie;
pub mod movies_on_shortlist;
pub mod movies_on_tier;
pub mod shortlist;
pub mod site_config;
pub mod tier;
pub mod tierlist;
pub mod tmdb_cache;
pub mod user;
