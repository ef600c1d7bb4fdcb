//! Handlers for `/notifications` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/notifications/broadcasts` | Admin only; newest 50 |
//! | `POST` | `/notifications/broadcasts` | Admin only; body: [`BroadcastBody`]; returns 201 |
//! | `GET`  | `/notifications/preferences` | The caller's own preferences |
//! | `POST` | `/notifications/preferences` | Body: [`NewPreference`]; upserts by type |

use axum::{
  Json,
  extract::State,
  http::StatusCode,
  response::IntoResponse,
};
use rollcall_core::{
  member::RoleCategory,
  notify::{Broadcast, NewBroadcast, NewPreference, NotificationPreference, Priority},
  store::AttendanceStore,
};
use serde::Deserialize;

use crate::{
  AppState,
  error::ApiError,
  identity::{Admin, Caller},
};

pub const BROADCAST_HISTORY_LIMIT: usize = 50;

// ─── Broadcasts ──────────────────────────────────────────────────────────────

/// JSON body accepted by `POST /notifications/broadcasts`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastBody {
  pub title:        String,
  pub body:         String,
  #[serde(default)]
  pub priority:     Option<String>,
  /// Empty or absent means every member.
  #[serde(default)]
  pub target_roles: Option<Vec<RoleCategory>>,
}

/// `POST /notifications/broadcasts`
pub async fn send_broadcast<S>(
  State(state): State<AppState<S>>,
  Admin(sender): Admin,
  Json(body): Json<BroadcastBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: AttendanceStore + 'static,
{
  if body.title.trim().is_empty() || body.body.trim().is_empty() {
    return Err(ApiError::BadRequest("title and body are required".into()));
  }
  let priority = match body.priority.as_deref().map(str::trim) {
    None | Some("") => Priority::default(),
    Some(p) => Priority::parse(p).map_err(|e| ApiError::BadRequest(e.to_string()))?,
  };

  let broadcast = state
    .store
    .record_broadcast(NewBroadcast {
      sender_email: sender,
      title:        body.title,
      body:         body.body,
      priority,
      target_roles: body.target_roles.unwrap_or_default(),
    })
    .await
    .map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(broadcast)))
}

/// `GET /notifications/broadcasts`
pub async fn list_broadcasts<S>(
  State(state): State<AppState<S>>,
  Admin(_): Admin,
) -> Result<Json<Vec<Broadcast>>, ApiError>
where
  S: AttendanceStore + 'static,
{
  let history = state
    .store
    .list_broadcasts(BROADCAST_HISTORY_LIMIT)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(history))
}

// ─── Preferences ─────────────────────────────────────────────────────────────

/// `GET /notifications/preferences`
pub async fn list_preferences<S>(
  State(state): State<AppState<S>>,
  Caller(email): Caller,
) -> Result<Json<Vec<NotificationPreference>>, ApiError>
where
  S: AttendanceStore + 'static,
{
  let prefs = state
    .store
    .list_preferences(email)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(prefs))
}

/// `POST /notifications/preferences`
pub async fn upsert_preference<S>(
  State(state): State<AppState<S>>,
  Caller(email): Caller,
  Json(body): Json<NewPreference>,
) -> Result<Json<NotificationPreference>, ApiError>
where
  S: AttendanceStore + 'static,
{
  if body.notification_type.trim().is_empty() {
    return Err(ApiError::BadRequest("notification_type is required".into()));
  }

  let pref = state
    .store
    .upsert_preference(email, body)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(pref))
}
