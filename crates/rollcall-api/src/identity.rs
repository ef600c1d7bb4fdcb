//! Caller identity extractors.
//!
//! The proxy in front of the server authenticates users and forwards the
//! verified email in [`ApiSettings::identity_header`](crate::ApiSettings).
//! These extractors only read that header; they never see credentials.

use std::convert::Infallible;

use axum::{
  extract::FromRequestParts,
  http::{HeaderMap, HeaderName, request::Parts},
};
use rollcall_core::store::AttendanceStore;

use crate::{AppState, error::ApiError};

/// Read the caller's email from `header`. Blank values count as absent.
pub fn caller_email(headers: &HeaderMap, header: &HeaderName) -> Option<String> {
  headers
    .get(header)
    .and_then(|v| v.to_str().ok())
    .map(str::trim)
    .filter(|s| !s.is_empty())
    .map(str::to_owned)
}

/// The caller's email, if the proxy supplied one. Never rejects.
pub struct MaybeCaller(pub Option<String>);

impl<S> FromRequestParts<AppState<S>> for MaybeCaller
where
  S: AttendanceStore + 'static,
{
  type Rejection = Infallible;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    Ok(MaybeCaller(caller_email(&parts.headers, &state.settings.identity_header)))
  }
}

/// An identified caller; rejects with 401 otherwise.
pub struct Caller(pub String);

impl<S> FromRequestParts<AppState<S>> for Caller
where
  S: AttendanceStore + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    caller_email(&parts.headers, &state.settings.identity_header)
      .map(Caller)
      .ok_or(ApiError::Unauthorized)
  }
}

/// An identified caller listed as an admin: 401 without identity, 403 when
/// the email is not an admin.
pub struct Admin(pub String);

impl<S> FromRequestParts<AppState<S>> for Admin
where
  S: AttendanceStore + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    let email = caller_email(&parts.headers, &state.settings.identity_header)
      .ok_or(ApiError::Unauthorized)?;

    let is_admin = state
      .store
      .is_admin(email.clone())
      .await
      .map_err(ApiError::store)?;

    if !is_admin {
      tracing::warn!(%email, "non-admin attempted an admin action");
      return Err(ApiError::Forbidden);
    }
    Ok(Admin(email))
  }
}
