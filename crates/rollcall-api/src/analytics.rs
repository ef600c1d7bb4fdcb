//! Handlers for `/analytics` endpoints.

use axum::{Json, extract::State};
use chrono::{DateTime, Duration, Utc};
use rollcall_core::{
  analytics::{
    DailyActivity, RushHoursReport, day_bounds, local_date, rush_hours as fold_rush_hours,
    weekly_activity,
  },
  store::AttendanceStore,
};
use serde::Serialize;

use crate::{AppState, error::ApiError};

const RUSH_WINDOW_DAYS: i64 = 30;

/// `GET /analytics/rush-hours`: scan traffic per hour over the last 30 days.
pub async fn rush_hours<S>(
  State(state): State<AppState<S>>,
) -> Result<Json<RushHoursReport>, ApiError>
where
  S: AttendanceStore + 'static,
{
  let now = Utc::now();
  let events = state
    .store
    .list_scans(Some(now - Duration::days(RUSH_WINDOW_DAYS)), Some(now))
    .await
    .map_err(ApiError::store)?;

  Ok(Json(fold_rush_hours(&events, state.settings.utc_offset)))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyResponse {
  pub weekly_data: Vec<DailyActivity>,
  pub start_date:  DateTime<Utc>,
  pub end_date:    DateTime<Utc>,
}

/// `GET /analytics/weekly`: today and the six local days before it.
pub async fn weekly<S>(
  State(state): State<AppState<S>>,
) -> Result<Json<WeeklyResponse>, ApiError>
where
  S: AttendanceStore + 'static,
{
  let offset = state.settings.utc_offset;
  let today = local_date(Utc::now(), offset);
  let first_day = today - Duration::days(6);

  let out_of_range = || ApiError::BadRequest("date out of range".into());
  let (start, _) = day_bounds(first_day, offset).ok_or_else(out_of_range)?;
  let (_, end) = day_bounds(today, offset).ok_or_else(out_of_range)?;

  let events = state
    .store
    .list_scans(Some(start), Some(end))
    .await
    .map_err(ApiError::store)?;

  Ok(Json(WeeklyResponse {
    weekly_data: weekly_activity(&events, first_day, offset),
    start_date:  start,
    end_date:    end,
  }))
}
