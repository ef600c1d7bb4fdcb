//! Handlers for `/dashboard` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/dashboard/current-occupancy` | Optional `as_of`; window is the local day of `as_of` |
//! | `GET`  | `/dashboard/peak-hours` | Optional `days` (1–365, default 30) |

use axum::{
  Json,
  extract::{Query, State},
};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use rollcall_core::{
  analytics::{self, CLOSE_HOUR, OPEN_HOUR, PeakHoursReport, local_date, start_of_local_day},
  member::RoleCategory,
  occupancy::{Occupant, OccupancyState, RoleCounts},
  store::AttendanceStore,
};
use serde::{Deserialize, Serialize};

use crate::{AppState, error::ApiError};

// ─── Current occupancy ───────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct OccupancyParams {
  /// Point in time to resolve at. Defaults to now.
  pub as_of: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OccupantView {
  pub badge_id:      String,
  pub display_name:  String,
  pub email:         String,
  pub reg_number:    String,
  pub role:          RoleCategory,
  pub check_in_time: DateTime<Utc>,
  /// Compact elapsed time, e.g. `"45m"` or `"2h 30m"`.
  pub duration:      String,
}

impl From<Occupant> for OccupantView {
  fn from(o: Occupant) -> Self {
    OccupantView {
      duration:      o.duration.compact(),
      badge_id:      o.badge_id,
      display_name:  o.display_name,
      email:         o.email,
      reg_number:    o.reg_number,
      role:          o.role,
      check_in_time: o.check_in_time,
    }
  }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsView {
  pub current_occupancy: usize,
  pub by_role:           RoleCounts,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentOccupancy {
  pub currently_in_lab: Vec<OccupantView>,
  pub stats:            StatsView,
  pub last_updated:     DateTime<Utc>,
}

impl From<OccupancyState> for CurrentOccupancy {
  fn from(state: OccupancyState) -> Self {
    CurrentOccupancy {
      currently_in_lab: state.currently_inside.into_iter().map(OccupantView::from).collect(),
      stats:            StatsView {
        current_occupancy: state.stats.current_occupancy,
        by_role:           state.stats.by_role,
      },
      last_updated:     state.as_of,
    }
  }
}

/// `GET /dashboard/current-occupancy[?as_of=...]`
pub async fn current_occupancy<S>(
  State(state): State<AppState<S>>,
  Query(params): Query<OccupancyParams>,
) -> Result<Json<CurrentOccupancy>, ApiError>
where
  S: AttendanceStore + 'static,
{
  let as_of = params.as_of.unwrap_or_else(Utc::now);
  let window_start = start_of_local_day(as_of, state.settings.utc_offset)
    .ok_or_else(|| ApiError::BadRequest(format!("as_of out of range: {as_of}")))?;

  let occupancy = state
    .store
    .materialize_occupancy(window_start, as_of)
    .await
    .map_err(ApiError::store)?;

  Ok(Json(CurrentOccupancy::from(occupancy)))
}

// ─── Peak hours ──────────────────────────────────────────────────────────────

pub const DEFAULT_PEAK_DAYS: i64 = 30;
const MAX_PEAK_DAYS: i64 = 365;

#[derive(Debug, Deserialize)]
pub struct PeakHoursParams {
  pub days: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct DateRange {
  pub start: NaiveDate,
  pub end:   NaiveDate,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeakHoursResponse {
  #[serde(flatten)]
  pub report:     PeakHoursReport,
  pub date_range: DateRange,
}

/// `GET /dashboard/peak-hours[?days=N]`
pub async fn peak_hours<S>(
  State(state): State<AppState<S>>,
  Query(params): Query<PeakHoursParams>,
) -> Result<Json<PeakHoursResponse>, ApiError>
where
  S: AttendanceStore + 'static,
{
  let days = params.days.unwrap_or(DEFAULT_PEAK_DAYS);
  if !(1..=MAX_PEAK_DAYS).contains(&days) {
    return Err(ApiError::BadRequest(format!(
      "days must be between 1 and {MAX_PEAK_DAYS}"
    )));
  }

  let offset = state.settings.utc_offset;
  let now = Utc::now();
  let since = now - Duration::days(days);

  let events = state
    .store
    .list_scans(Some(since), Some(now))
    .await
    .map_err(ApiError::store)?;

  let report = analytics::peak_hours(&events, offset, OPEN_HOUR, CLOSE_HOUR);
  Ok(Json(PeakHoursResponse {
    report,
    date_range: DateRange {
      start: local_date(since, offset),
      end:   local_date(now, offset),
    },
  }))
}
