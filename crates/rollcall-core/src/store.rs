//! The `AttendanceStore` trait and supporting query types.
//!
//! The trait is implemented by storage backends (e.g.
//! `rollcall-store-sqlite`). Higher layers (`rollcall-api`) depend on this
//! abstraction, not on any concrete backend.

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  member::{Member, MemberPatch, NewMember, RoleCategory},
  notify::{Broadcast, NewBroadcast, NewPreference, NotificationPreference},
  occupancy::OccupancyState,
  scan::{AttendancePage, Direction, NewScan, ScanEvent},
};

/// Page size used by [`AttendanceStore::search_attendance`] when the query
/// does not set one.
pub const DEFAULT_PAGE_SIZE: usize = 100;

// ─── Query types ─────────────────────────────────────────────────────────────

/// Parameters for [`AttendanceStore::list_members`].
#[derive(Debug, Clone, Default)]
pub struct MemberQuery {
  /// Case-insensitive substring over name, email, reg number and badge id.
  pub search: Option<String>,
  pub role:   Option<RoleCategory>,
}

/// Parameters for [`AttendanceStore::search_attendance`].
#[derive(Debug, Clone, Default)]
pub struct AttendanceQuery {
  /// Inclusive lower bound on `recorded_at`.
  pub since:      Option<DateTime<Utc>>,
  /// Inclusive upper bound on `recorded_at`.
  pub until:      Option<DateTime<Utc>>,
  pub badge_id:   Option<String>,
  pub direction:  Option<Direction>,
  /// Case-insensitive substring of the member name.
  pub name:       Option<String>,
  pub reg_number: Option<String>,
  pub limit:      Option<usize>,
  pub offset:     Option<usize>,
}

// ─── Errors ──────────────────────────────────────────────────────────────────

/// Classification hooks the HTTP layer uses to pick a status code.
pub trait StoreError: std::error::Error + Send + Sync + 'static {
  /// The write collided with an existing row (e.g. a badge already assigned).
  fn is_conflict(&self) -> bool { false }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a Rollcall attendance store backend.
///
/// Scans are append-only. Occupancy is never written; it is recomputed from
/// the scan log by [`AttendanceStore::materialize_occupancy`].
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait AttendanceStore: Send + Sync {
  type Error: StoreError;

  // ── Members ───────────────────────────────────────────────────────────

  fn add_member(
    &self,
    input: NewMember,
  ) -> impl Future<Output = Result<Member, Self::Error>> + Send + '_;

  /// Retrieve a member by UUID. Returns `None` if not found.
  fn get_member(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Member>, Self::Error>> + Send + '_;

  /// Newest members first.
  fn list_members<'a>(
    &'a self,
    query: &'a MemberQuery,
  ) -> impl Future<Output = Result<Vec<Member>, Self::Error>> + Send + 'a;

  /// Apply a partial update. Returns `None` if the member does not exist.
  fn update_member(
    &self,
    id: Uuid,
    patch: MemberPatch,
  ) -> impl Future<Output = Result<Option<Member>, Self::Error>> + Send + '_;

  /// Returns `true` if a member was removed. Scans for the member's badge
  /// are kept.
  fn delete_member(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Badge ids that appear in the scan log but are held by no member, most
  /// recently seen first.
  fn unassigned_badges(
    &self,
  ) -> impl Future<Output = Result<Vec<String>, Self::Error>> + Send + '_;

  // ── Scans — append-only writes ────────────────────────────────────────

  /// Append a scan. `recorded_at` and `seq` are set by the store.
  fn record_scan(
    &self,
    input: NewScan,
  ) -> impl Future<Output = Result<ScanEvent, Self::Error>> + Send + '_;

  // ── Reads ─────────────────────────────────────────────────────────────

  /// All well-formed scans with `since <= recorded_at <= until`, oldest
  /// first. Rows that cannot be decoded are skipped.
  fn list_scans(
    &self,
    since: Option<DateTime<Utc>>,
    until: Option<DateTime<Utc>>,
  ) -> impl Future<Output = Result<Vec<ScanEvent>, Self::Error>> + Send + '_;

  /// The filtered, paginated attendance log, newest first.
  fn search_attendance<'a>(
    &'a self,
    query: &'a AttendanceQuery,
  ) -> impl Future<Output = Result<AttendancePage, Self::Error>> + Send + 'a;

  /// Materialise the [`OccupancyState`] from scans recorded between
  /// `window_start` and `as_of`.
  fn materialize_occupancy(
    &self,
    window_start: DateTime<Utc>,
    as_of: DateTime<Utc>,
  ) -> impl Future<Output = Result<OccupancyState, Self::Error>> + Send + '_;

  // ── Notifications ─────────────────────────────────────────────────────

  fn record_broadcast(
    &self,
    input: NewBroadcast,
  ) -> impl Future<Output = Result<Broadcast, Self::Error>> + Send + '_;

  /// Newest first.
  fn list_broadcasts(
    &self,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<Broadcast>, Self::Error>> + Send + '_;

  /// Insert or replace the preference for `(owner_email, notification_type)`.
  fn upsert_preference(
    &self,
    owner_email: String,
    input: NewPreference,
  ) -> impl Future<Output = Result<NotificationPreference, Self::Error>> + Send + '_;

  fn list_preferences(
    &self,
    owner_email: String,
  ) -> impl Future<Output = Result<Vec<NotificationPreference>, Self::Error>> + Send + '_;

  // ── Admins ────────────────────────────────────────────────────────────

  /// Grant admin rights. Emails compare case-insensitively; returns `false`
  /// when the email was already an admin.
  fn add_admin(
    &self,
    email: String,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Revoke admin rights. Returns `true` if the email was an admin.
  fn remove_admin(
    &self,
    email: String,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// All admin emails, lower-cased and sorted.
  fn list_admins(&self) -> impl Future<Output = Result<Vec<String>, Self::Error>> + Send + '_;

  fn is_admin(
    &self,
    email: String,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;
}
