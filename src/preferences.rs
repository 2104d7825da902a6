//! Per-browser display preferences kept in signed cookies.

use std::str::FromStr;

use axum_extra::extract::SignedCookieJar;
use cookie::{Cookie, SameSite};

use crate::{
    error::{AppError, AppResult},
    models::{Background, ColorScheme, Preferences, Theme},
};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PreferenceKey {
    Theme,
    ColorScheme,
    Background,
}

impl PreferenceKey {
    fn cookie_name(self) -> &'static str {
        match self {
            PreferenceKey::Theme => "filmclub_theme",
            PreferenceKey::ColorScheme => "filmclub_color_scheme",
            PreferenceKey::Background => "filmclub_background",
        }
    }
}

impl FromStr for PreferenceKey {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "theme" => Ok(PreferenceKey::Theme),
            "color-scheme" => Ok(PreferenceKey::ColorScheme),
            "background" => Ok(PreferenceKey::Background),
            other => Err(AppError::not_found(format!("preference '{other}'"))),
        }
    }
}

/// Current preferences; missing or tampered cookies read as defaults.
pub fn read(jar: &SignedCookieJar) -> Preferences {
    Preferences {
        theme: value_of(jar, PreferenceKey::Theme),
        color_scheme: value_of(jar, PreferenceKey::ColorScheme),
        background: value_of(jar, PreferenceKey::Background),
    }
}

fn value_of<T: FromStr + Default>(jar: &SignedCookieJar, key: PreferenceKey) -> T {
    jar.get(key.cookie_name()).and_then(|c| c.value().parse().ok()).unwrap_or_default()
}

/// Validates `value` for `key` and stores it in its own cookie.
pub fn set(jar: SignedCookieJar, key: PreferenceKey, value: &str) -> AppResult<SignedCookieJar> {
    let canonical = match key {
        PreferenceKey::Theme => value.parse::<Theme>().map(Theme::as_str),
        PreferenceKey::ColorScheme => value.parse::<ColorScheme>().map(ColorScheme::as_str),
        PreferenceKey::Background => value.parse::<Background>().map(Background::as_str),
    }
    .map_err(|e| AppError::bad_request(e.to_string()))?;

    let cookie = Cookie::build((key.cookie_name(), canonical))
        .path("/")
        .same_site(SameSite::Lax)
        .max_age(time::Duration::days(365))
        .build();
    Ok(jar.add(cookie))
}
