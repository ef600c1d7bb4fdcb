//! Occupancy resolution: who is in the lab right now.
//!
//! Occupancy is never stored. It is recomputed from the scan log on every
//! query by keeping only the most recent scan per badge: a badge whose latest
//! scan is `IN` is inside, whatever came before. IN/OUT alternation is not
//! validated, so a repeated IN simply restarts the visit, and an IN that is
//! never followed by an OUT stays inside until the badge is scanned again.

use std::{
  collections::{BTreeMap, HashMap, hash_map::Entry},
  fmt,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  member::{Member, RoleCategory},
  scan::{Direction, ScanEvent},
};

/// Display name given to badges that no member holds.
pub const UNKNOWN_NAME: &str = "Unknown";

// ─── Member lookup ───────────────────────────────────────────────────────────

/// Resolves a badge id to the member holding it.
pub trait MemberDirectory {
  fn lookup(&self, badge_id: &str) -> Option<&Member>;
}

impl MemberDirectory for HashMap<String, Member> {
  fn lookup(&self, badge_id: &str) -> Option<&Member> { self.get(badge_id) }
}

impl MemberDirectory for [Member] {
  fn lookup(&self, badge_id: &str) -> Option<&Member> {
    self
      .iter()
      .find(|m| m.badge_id.as_deref() == Some(badge_id))
  }
}

impl MemberDirectory for Vec<Member> {
  fn lookup(&self, badge_id: &str) -> Option<&Member> {
    self.as_slice().lookup(badge_id)
  }
}

/// Index members by badge id. Members without a badge are dropped.
pub fn index_by_badge(
  members: impl IntoIterator<Item = Member>,
) -> HashMap<String, Member> {
  members
    .into_iter()
    .filter_map(|m| m.badge_id.clone().map(|b| (b, m)))
    .collect()
}

// ─── Elapsed time ────────────────────────────────────────────────────────────

/// Time spent inside, floored to whole minutes.
#[derive(
  Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct ElapsedTime {
  pub hours:   i64,
  pub minutes: i64,
}

impl ElapsedTime {
  /// Elapsed time from `since` to `until`. Negative spans clamp to zero.
  pub fn between(since: DateTime<Utc>, until: DateTime<Utc>) -> Self {
    let total = (until - since).num_minutes().max(0);
    Self { hours: total / 60, minutes: total % 60 }
  }

  pub fn total_minutes(&self) -> i64 { self.hours * 60 + self.minutes }

  /// `"{h}h {m}m"`, or just `"{m}m"` under an hour.
  pub fn compact(&self) -> String {
    if self.hours > 0 {
      self.to_string()
    } else {
      format!("{}m", self.minutes)
    }
  }
}

impl fmt::Display for ElapsedTime {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}h {}m", self.hours, self.minutes)
  }
}

// ─── Derived state ───────────────────────────────────────────────────────────

/// The latest scan seen for one badge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BadgeStatus {
  pub direction:   Direction,
  pub recorded_at: DateTime<Utc>,
  pub seq:         i64,
}

/// Someone currently inside the lab.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occupant {
  pub badge_id:      String,
  /// `None` for badges that no member holds.
  pub member_id:     Option<Uuid>,
  pub display_name:  String,
  pub email:         String,
  pub reg_number:    String,
  pub role:          RoleCategory,
  pub check_in_time: DateTime<Utc>,
  pub duration:      ElapsedTime,
}

/// Head counts per role.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleCounts {
  pub admin:  usize,
  pub lead:   usize,
  pub member: usize,
}

impl RoleCounts {
  pub fn bump(&mut self, role: RoleCategory) {
    match role {
      RoleCategory::Admin => self.admin += 1,
      RoleCategory::Lead => self.lead += 1,
      RoleCategory::Member => self.member += 1,
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OccupancyStats {
  pub current_occupancy: usize,
  pub by_role:           RoleCounts,
}

/// The computed read model for the lab. Never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OccupancyState {
  /// The point in time at which this state was materialised.
  pub as_of:            DateTime<Utc>,
  pub per_badge:        BTreeMap<String, BadgeStatus>,
  /// Most recent check-in first.
  pub currently_inside: Vec<Occupant>,
  pub stats:            OccupancyStats,
}

impl OccupancyState {
  pub fn empty(as_of: DateTime<Utc>) -> Self {
    Self {
      as_of,
      per_badge: BTreeMap::new(),
      currently_inside: Vec::new(),
      stats: OccupancyStats::default(),
    }
  }

  pub fn is_inside(&self, badge_id: &str) -> bool {
    self
      .currently_inside
      .iter()
      .any(|o| o.badge_id == badge_id)
  }
}

// ─── Resolver ────────────────────────────────────────────────────────────────

/// Reduce a scan log to the set of badges currently inside.
///
/// `events` may arrive in any order and may contain duplicates. Scans dated
/// after `as_of` are ignored entirely. For each badge the scan with the
/// greatest `(recorded_at, seq)` decides its status.
pub fn resolve_occupancy<'a, D>(
  events: impl IntoIterator<Item = &'a ScanEvent>,
  as_of: DateTime<Utc>,
  directory: &D,
) -> OccupancyState
where
  D: MemberDirectory + ?Sized,
{
  let mut latest: HashMap<&str, &ScanEvent> = HashMap::new();
  for event in events {
    if event.recorded_at > as_of {
      continue;
    }
    match latest.entry(event.badge_id.as_str()) {
      Entry::Occupied(mut slot) => {
        if event.recency_key() > slot.get().recency_key() {
          slot.insert(event);
        }
      }
      Entry::Vacant(slot) => {
        slot.insert(event);
      }
    }
  }

  let mut state = OccupancyState::empty(as_of);

  for (badge_id, event) in latest {
    state.per_badge.insert(badge_id.to_owned(), BadgeStatus {
      direction:   event.direction,
      recorded_at: event.recorded_at,
      seq:         event.seq,
    });

    if event.direction.is_in() {
      state
        .currently_inside
        .push(occupant(event, as_of, directory.lookup(badge_id)));
    }
  }

  state.currently_inside.sort_by(|a, b| {
    b.check_in_time
      .cmp(&a.check_in_time)
      .then_with(|| a.badge_id.cmp(&b.badge_id))
  });

  for o in &state.currently_inside {
    state.stats.by_role.bump(o.role);
  }
  state.stats.current_occupancy = state.currently_inside.len();

  state
}

fn occupant(
  event: &ScanEvent,
  as_of: DateTime<Utc>,
  member: Option<&Member>,
) -> Occupant {
  let duration = ElapsedTime::between(event.recorded_at, as_of);
  match member {
    Some(m) => Occupant {
      badge_id: event.badge_id.clone(),
      member_id: Some(m.member_id),
      display_name: m.name.clone(),
      email: m.email.clone(),
      reg_number: m.reg_number.clone().unwrap_or_default(),
      role: m.role,
      check_in_time: event.recorded_at,
      duration,
    },
    None => Occupant {
      badge_id: event.badge_id.clone(),
      member_id: None,
      display_name: UNKNOWN_NAME.to_owned(),
      email: String::new(),
      reg_number: String::new(),
      role: RoleCategory::Member,
      check_in_time: event.recorded_at,
      duration,
    },
  }
}
