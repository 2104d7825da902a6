use jiff::civil::{Date, Weekday};
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set, sea_query::OnConflict};
use tracing::info;

use crate::{
    entities::site_config,
    error::{AppError, AppResult},
    models::{SiteConfigView, UpdateSiteConfig},
};

const SINGLETON_ID: i32 = 1;
const DEFAULT_WEEKDAY: i32 = 3;

/// The configuration row, created with defaults on first read.
pub async fn get(db: &DatabaseConnection) -> AppResult<site_config::Model> {
    let default = site_config::ActiveModel {
        id: Set(SINGLETON_ID),
        watch_providers: Set(serde_json::json!([])),
        watch_weekday: Set(DEFAULT_WEEKDAY),
    };
    site_config::Entity::insert(default)
        .on_conflict(OnConflict::column(site_config::Column::Id).do_nothing().to_owned())
        .do_nothing()
        .exec(db)
        .await?;

    site_config::Entity::find_by_id(SINGLETON_ID)
        .one(db)
        .await?
        .ok_or_else(|| AppError::not_found("site config"))
}

pub fn view(model: &site_config::Model) -> SiteConfigView {
    SiteConfigView {
        watch_providers: serde_json::from_value(model.watch_providers.clone()).unwrap_or_default(),
        watch_weekday: model.watch_weekday,
    }
}

pub async fn update(db: &DatabaseConnection, req: UpdateSiteConfig) -> AppResult<SiteConfigView> {
    let current = get(db).await?;
    let mut active: site_config::ActiveModel = current.into();

    if let Some(weekday) = req.watch_weekday {
        weekday_of(weekday)?;
        active.watch_weekday = Set(weekday);
    }
    if let Some(mut providers) = req.watch_providers {
        providers.sort_unstable();
        providers.dedup();
        active.watch_providers =
            Set(serde_json::to_value(providers).map_err(anyhow::Error::new)?);
    }

    let updated = active.update(db).await?;
    info!(watch_weekday = updated.watch_weekday, "site config updated");
    Ok(view(&updated))
}

fn weekday_of(value: i32) -> AppResult<Weekday> {
    i8::try_from(value)
        .ok()
        .and_then(|v| Weekday::from_monday_one_offset(v).ok())
        .ok_or_else(|| AppError::bad_request("watch weekday must be 1 (Monday) to 7 (Sunday)"))
}

/// Next club night on or after `today`.
pub fn next_watch_date(today: Date, weekday: i32) -> AppResult<Date> {
    let weekday = weekday_of(weekday)?;
    if today.weekday() == weekday {
        return Ok(today);
    }
    Ok(today.nth_weekday(1, weekday)?)
}
