//! Handlers for `/attendance` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/attendance` | Optional `start_date`, `end_date` (local `YYYY-MM-DD`), `badge_id`, `direction`, `name`, `reg_number`, `limit`, `offset` |
//! | `POST` | `/attendance` | Body: `{"badge_id":"...","direction":"IN"}`; returns 201 + stored scan |

use axum::{
  Json,
  extract::{Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use rollcall_core::{
  analytics::day_bounds,
  scan::{AttendancePage, Direction, NewScan},
  store::{AttendanceQuery, AttendanceStore},
};
use serde::Deserialize;

use crate::{AppState, error::ApiError};

const MAX_PAGE_SIZE: usize = 1000;
/// Largest row offset SQLite can bind.
const MAX_OFFSET: usize = i64::MAX as usize;

fn parse_direction(raw: &str) -> Result<Direction, ApiError> {
  Direction::parse(raw).map_err(|e| ApiError::BadRequest(e.to_string()))
}

fn local_day(
  date: NaiveDate,
  offset: FixedOffset,
) -> Result<(DateTime<Utc>, DateTime<Utc>), ApiError> {
  day_bounds(date, offset)
    .ok_or_else(|| ApiError::BadRequest(format!("date out of range: {date}")))
}

/// Treat blank query values as absent.
fn non_empty(value: Option<String>) -> Option<String> {
  value.map(|v| v.trim().to_owned()).filter(|v| !v.is_empty())
}

// ─── List ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub start_date: Option<NaiveDate>,
  pub end_date:   Option<NaiveDate>,
  pub badge_id:   Option<String>,
  /// `IN` or `OUT`, any case.
  pub direction:  Option<String>,
  pub name:       Option<String>,
  pub reg_number: Option<String>,
  pub limit:      Option<usize>,
  pub offset:     Option<usize>,
}

/// `GET /attendance[?start_date=...][&end_date=...][&badge_id=...]...`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  Query(params): Query<ListParams>,
) -> Result<Json<AttendancePage>, ApiError>
where
  S: AttendanceStore + 'static,
{
  let offset = state.settings.utc_offset;

  if let (Some(start), Some(end)) = (params.start_date, params.end_date)
    && start > end
  {
    return Err(ApiError::BadRequest("start_date is after end_date".into()));
  }
  if params.limit.is_some_and(|l| l == 0 || l > MAX_PAGE_SIZE) {
    return Err(ApiError::BadRequest(format!(
      "limit must be between 1 and {MAX_PAGE_SIZE}"
    )));
  }
  if params.offset.is_some_and(|o| o > MAX_OFFSET) {
    return Err(ApiError::BadRequest(format!(
      "offset must be at most {MAX_OFFSET}"
    )));
  }

  let direction = non_empty(params.direction)
    .as_deref()
    .map(parse_direction)
    .transpose()?;

  let since = params
    .start_date
    .map(|d| local_day(d, offset).map(|(start, _)| start))
    .transpose()?;
  let until = params
    .end_date
    .map(|d| local_day(d, offset).map(|(_, end)| end))
    .transpose()?;

  let query = AttendanceQuery {
    since,
    until,
    badge_id: non_empty(params.badge_id),
    direction,
    name: non_empty(params.name),
    reg_number: non_empty(params.reg_number),
    limit: params.limit,
    offset: params.offset,
  };

  let page = state
    .store
    .search_attendance(&query)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(page))
}

// ─── Create ──────────────────────────────────────────────────────────────────

/// JSON body accepted by `POST /attendance`.
#[derive(Debug, Deserialize)]
pub struct NewScanBody {
  pub badge_id:  String,
  pub direction: String,
}

/// `POST /attendance`: record a scan stamped with the current time.
pub async fn create<S>(
  State(state): State<AppState<S>>,
  Json(body): Json<NewScanBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: AttendanceStore + 'static,
{
  let badge_id = body.badge_id.trim();
  if badge_id.is_empty() {
    return Err(ApiError::BadRequest("badge_id is required".into()));
  }
  let direction = parse_direction(&body.direction)?;

  let scan = state
    .store
    .record_scan(NewScan { badge_id: badge_id.to_owned(), direction })
    .await
    .map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(scan)))
}
