//! Handlers for `/members` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/members` | Optional `?search=...&role=admin\|lead\|member` |
//! | `POST`   | `/members` | Body: [`NewMember`]; returns 201 |
//! | `GET`    | `/members/:id` | 404 if not found |
//! | `PUT`    | `/members/:id` | Body: [`MemberPatch`]; blank fields are ignored |
//! | `DELETE` | `/members/:id` | 204, or 404 if not found |
//! | `GET`    | `/members/unassigned-badges` | Badges seen by readers but held by nobody |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use rollcall_core::{
  member::{Member, MemberPatch, NewMember, RoleCategory},
  store::{AttendanceStore, MemberQuery},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AppState, error::ApiError};

// ─── List ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub search: Option<String>,
  pub role:   Option<String>,
}

/// `GET /members[?search=...][&role=...]`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Member>>, ApiError>
where
  S: AttendanceStore + 'static,
{
  let role = params
    .role
    .as_deref()
    .map(str::trim)
    .filter(|r| !r.is_empty())
    .map(|r| {
      r.parse::<RoleCategory>()
        .map_err(|_| ApiError::BadRequest(format!("unknown role: {r:?}")))
    })
    .transpose()?;

  let query = MemberQuery { search: params.search, role };
  let members = state
    .store
    .list_members(&query)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(members))
}

// ─── Create ──────────────────────────────────────────────────────────────────

/// `POST /members`, returns 201 + the stored [`Member`].
pub async fn create<S>(
  State(state): State<AppState<S>>,
  Json(body): Json<NewMember>,
) -> Result<impl IntoResponse, ApiError>
where
  S: AttendanceStore + 'static,
{
  if body.name.trim().is_empty() || body.email.trim().is_empty() {
    return Err(ApiError::BadRequest("name and email are required".into()));
  }

  let member = state
    .store
    .add_member(body)
    .await
    .map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(member)))
}

// ─── Get one ─────────────────────────────────────────────────────────────────

/// `GET /members/:id`
pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Member>, ApiError>
where
  S: AttendanceStore + 'static,
{
  let member = state
    .store
    .get_member(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("member {id} not found")))?;
  Ok(Json(member))
}

// ─── Update ──────────────────────────────────────────────────────────────────

/// `PUT /members/:id`, a partial update; returns the updated member.
pub async fn update<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
  Json(patch): Json<MemberPatch>,
) -> Result<Json<Member>, ApiError>
where
  S: AttendanceStore + 'static,
{
  let member = state
    .store
    .update_member(id, patch)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("member {id} not found")))?;
  Ok(Json(member))
}

// ─── Delete ──────────────────────────────────────────────────────────────────

/// `DELETE /members/:id`
pub async fn delete_one<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError>
where
  S: AttendanceStore + 'static,
{
  let removed = state
    .store
    .delete_member(id)
    .await
    .map_err(ApiError::store)?;

  if removed {
    Ok(StatusCode::NO_CONTENT)
  } else {
    Err(ApiError::NotFound(format!("member {id} not found")))
  }
}

// ─── Unassigned badges ───────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct UnassignedBadges {
  pub badges: Vec<String>,
}

/// `GET /members/unassigned-badges`
pub async fn unassigned_badges<S>(
  State(state): State<AppState<S>>,
) -> Result<Json<UnassignedBadges>, ApiError>
where
  S: AttendanceStore + 'static,
{
  let badges = state
    .store
    .unassigned_badges()
    .await
    .map_err(ApiError::store)?;
  Ok(Json(UnassignedBadges { badges }))
}
