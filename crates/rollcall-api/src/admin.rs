//! Admin endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/admin/check` | Whether the caller is an admin; never fails |
//! | `GET`    | `/admin/admins` | Admin only |
//! | `POST`   | `/admin/admins` | Admin only. Body: `{"email":"..."}`; 201, or 409 if already an admin |
//! | `DELETE` | `/admin/admins/:email` | Admin only. 204, 404 if not an admin, 400 for the caller's own email |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use rollcall_core::store::AttendanceStore;
use serde::{Deserialize, Serialize};

use crate::{
  AppState,
  error::ApiError,
  identity::{Admin, MaybeCaller},
};

// ─── Check ───────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminCheck {
  pub is_admin: bool,
  pub email:    Option<String>,
}

/// `GET /admin/check`
///
/// Never fails: a missing identity or a store error both read as "not an
/// admin".
pub async fn check<S>(
  State(state): State<AppState<S>>,
  MaybeCaller(email): MaybeCaller,
) -> Json<AdminCheck>
where
  S: AttendanceStore + 'static,
{
  let Some(email) = email else {
    return Json(AdminCheck { is_admin: false, email: None });
  };

  let is_admin = match state.store.is_admin(email.clone()).await {
    Ok(found) => found,
    Err(e) => {
      tracing::warn!(error = %e, "admin lookup failed");
      false
    }
  };

  Json(AdminCheck { is_admin, email: Some(email) })
}

// ─── Manage ──────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct AdminList {
  pub admins: Vec<String>,
}

/// `GET /admin/admins`
pub async fn list_admins<S>(
  State(state): State<AppState<S>>,
  Admin(_): Admin,
) -> Result<Json<AdminList>, ApiError>
where
  S: AttendanceStore + 'static,
{
  let admins = state.store.list_admins().await.map_err(ApiError::store)?;
  Ok(Json(AdminList { admins }))
}

#[derive(Debug, Deserialize, Serialize)]
pub struct AdminEmail {
  pub email: String,
}

/// `POST /admin/admins`
pub async fn add_admin<S>(
  State(state): State<AppState<S>>,
  Admin(caller): Admin,
  Json(body): Json<AdminEmail>,
) -> Result<impl IntoResponse, ApiError>
where
  S: AttendanceStore + 'static,
{
  let email = body.email.trim().to_lowercase();
  if email.is_empty() {
    return Err(ApiError::BadRequest("email is required".into()));
  }

  let added = state
    .store
    .add_admin(email.clone())
    .await
    .map_err(ApiError::store)?;
  if !added {
    return Err(ApiError::Conflict(format!("{email} is already an admin")));
  }

  tracing::info!(%email, granted_by = %caller, "admin granted");
  Ok((StatusCode::CREATED, Json(AdminEmail { email })))
}

/// `DELETE /admin/admins/:email`
pub async fn remove_admin<S>(
  State(state): State<AppState<S>>,
  Admin(caller): Admin,
  Path(email): Path<String>,
) -> Result<StatusCode, ApiError>
where
  S: AttendanceStore + 'static,
{
  let email = email.trim().to_lowercase();
  if email == caller.trim().to_lowercase() {
    return Err(ApiError::BadRequest("admins cannot remove themselves".into()));
  }

  let removed = state
    .store
    .remove_admin(email.clone())
    .await
    .map_err(ApiError::store)?;
  if !removed {
    return Err(ApiError::NotFound(format!("{email} is not an admin")));
  }

  tracing::info!(%email, revoked_by = %caller, "admin revoked");
  Ok(StatusCode::NO_CONTENT)
}
