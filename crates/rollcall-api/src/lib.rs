//! JSON REST API for Rollcall.
//!
//! Exposes an axum [`Router`] backed by any
//! [`rollcall_core::store::AttendanceStore`]. Authentication happens upstream:
//! an identity-aware proxy puts the verified email address in a request
//! header, which [`identity`] reads.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", rollcall_api::api_router(state.clone()))
//! ```

pub mod admin;
pub mod analytics;
pub mod attendance;
pub mod dashboard;
pub mod error;
pub mod identity;
pub mod members;
pub mod notifications;

use std::sync::Arc;

use axum::{
  Json, Router,
  http::HeaderName,
  routing::{delete, get},
};
use chrono::FixedOffset;
use rollcall_core::store::AttendanceStore;
use serde_json::{Value, json};

pub use error::ApiError;

// ─── State ───────────────────────────────────────────────────────────────────

/// Request-independent settings the handlers need.
#[derive(Debug, Clone)]
pub struct ApiSettings {
  /// The lab's local time, used for day boundaries and hour buckets.
  pub utc_offset:      FixedOffset,
  /// Header carrying the caller's verified email address.
  pub identity_header: HeaderName,
}

/// Shared state threaded through all handlers.
pub struct AppState<S> {
  pub store:    Arc<S>,
  pub settings: Arc<ApiSettings>,
}

impl<S> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self {
      store:    Arc::clone(&self.store),
      settings: Arc::clone(&self.settings),
    }
  }
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build a fully-materialised API router for `state`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(state: AppState<S>) -> Router<()>
where
  S: AttendanceStore + 'static,
{
  Router::new()
    // Dashboard
    .route("/dashboard/current-occupancy", get(dashboard::current_occupancy::<S>))
    .route("/dashboard/peak-hours", get(dashboard::peak_hours::<S>))
    // Analytics
    .route("/analytics/rush-hours", get(analytics::rush_hours::<S>))
    .route("/analytics/weekly", get(analytics::weekly::<S>))
    // Attendance log
    .route("/attendance", get(attendance::list::<S>).post(attendance::create::<S>))
    // Members
    .route("/members", get(members::list::<S>).post(members::create::<S>))
    .route("/members/unassigned-badges", get(members::unassigned_badges::<S>))
    .route(
      "/members/{id}",
      get(members::get_one::<S>)
        .put(members::update::<S>)
        .delete(members::delete_one::<S>),
    )
    // Admin & notifications
    .route("/admin/check", get(admin::check::<S>))
    .route("/admin/admins", get(admin::list_admins::<S>).post(admin::add_admin::<S>))
    .route("/admin/admins/{email}", delete(admin::remove_admin::<S>))
    .route(
      "/notifications/broadcasts",
      get(notifications::list_broadcasts::<S>).post(notifications::send_broadcast::<S>),
    )
    .route(
      "/notifications/preferences",
      get(notifications::list_preferences::<S>).post(notifications::upsert_preference::<S>),
    )
    .route("/health", get(health))
    .with_state(state)
}

/// `GET /health`
async fn health() -> Json<Value> { Json(json!({ "status": "ok" })) }
