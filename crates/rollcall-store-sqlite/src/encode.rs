//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are written as fixed-width RFC 3339 UTC strings. Rows written by
//! other tools may carry an offset or use SQLite's own `YYYY-MM-DD HH:MM:SS`
//! shape, so SQL compares them through `julianday()` and [`decode_dt`] reads
//! every shape that function accepts. UUIDs are stored as hyphenated
//! lowercase strings; role lists as compact JSON.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use rollcall_core::{
  member::{Member, RoleCategory},
  notify::{Broadcast, NotificationPreference, Priority},
  occupancy::UNKNOWN_NAME,
  scan::{AttendanceEntry, Direction, ScanEvent},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// SQL condition that holds for the timestamp shapes [`decode_dt`] reads.
pub fn timestamp_guard(col: &str) -> String {
  format!(
    "julianday({col}) IS NOT NULL \
     AND {col} GLOB '[0-9][0-9][0-9][0-9]-[0-9][0-9]-[0-9][0-9]*'"
  )
}

const NAIVE_FORMATS: [&str; 4] = [
  "%Y-%m-%dT%H:%M:%S%.f",
  "%Y-%m-%d %H:%M:%S%.f",
  "%Y-%m-%dT%H:%M",
  "%Y-%m-%d %H:%M",
];

/// Split a trailing `Z` or `+HH:MM` zone off `s`. No zone means UTC.
fn split_zone(s: &str) -> Option<(&str, FixedOffset)> {
  if let Some(local) = s.strip_suffix(['Z', 'z']) {
    return Some((local, FixedOffset::east_opt(0)?));
  }

  let cut = s.len().saturating_sub(6);
  if let Some(zone) = s.get(cut..)
    && let [sign @ (b'+' | b'-'), h1, h2, b':', m1, m2] = *zone.as_bytes()
    && [h1, h2, m1, m2].iter().all(u8::is_ascii_digit)
  {
    let hours = i32::from((h1 - b'0') * 10 + (h2 - b'0'));
    let minutes = i32::from((m1 - b'0') * 10 + (m2 - b'0'));
    let seconds = (hours * 60 + minutes) * 60;
    let seconds = if sign == b'-' { -seconds } else { seconds };
    return Some((&s[..cut], FixedOffset::east_opt(seconds)?));
  }

  Some((s, FixedOffset::east_opt(0)?))
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
    return Ok(dt.with_timezone(&Utc));
  }

  let bad = || Error::DateParse(format!("{s:?}: not a recognised timestamp"));
  let (local, zone) = split_zone(s.trim()).ok_or_else(bad)?;
  let naive = NAIVE_FORMATS
    .iter()
    .find_map(|fmt| NaiveDateTime::parse_from_str(local, fmt).ok())
    .or_else(|| {
      NaiveDate::parse_from_str(local, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
    })
    .ok_or_else(bad)?;

  zone
    .from_local_datetime(&naive)
    .single()
    .map(|dt| dt.with_timezone(&Utc))
    .ok_or_else(bad)
}

// ─── Roles ───────────────────────────────────────────────────────────────────

pub fn encode_role(r: RoleCategory) -> &'static str {
  match r {
    RoleCategory::Admin => "admin",
    RoleCategory::Lead => "lead",
    RoleCategory::Member => "member",
  }
}

pub fn encode_roles(roles: &[RoleCategory]) -> Result<String> {
  Ok(serde_json::to_string(roles)?)
}

pub fn decode_roles(s: &str) -> Result<Vec<RoleCategory>> {
  Ok(serde_json::from_str(s)?)
}

/// Lower-case and trim an email for use as a lookup key.
pub fn normalize_email(email: &str) -> String { email.trim().to_lowercase() }

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from a `members` row.
pub struct RawMember {
  pub member_id:    String,
  pub name:         String,
  pub email:        String,
  pub reg_number:   Option<String>,
  pub phone_number: Option<String>,
  pub role:         Option<String>,
  pub badge_id:     Option<String>,
  pub created_at:   String,
}

/// Column list matching [`RawMember::from_row`].
pub const MEMBER_COLUMNS: &str = "member_id, name, email, reg_number, phone_number, role, badge_id, created_at";

impl RawMember {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      member_id:    row.get(0)?,
      name:         row.get(1)?,
      email:        row.get(2)?,
      reg_number:   row.get(3)?,
      phone_number: row.get(4)?,
      role:         row.get(5)?,
      badge_id:     row.get(6)?,
      created_at:   row.get(7)?,
    })
  }

  pub fn into_member(self) -> Result<Member> {
    Ok(Member {
      member_id:    decode_uuid(&self.member_id)?,
      name:         self.name,
      email:        self.email,
      reg_number:   self.reg_number,
      phone_number: self.phone_number,
      role:         RoleCategory::from_text_lossy(self.role.as_deref()),
      badge_id:     self.badge_id,
      created_at:   decode_dt(&self.created_at)?,
    })
  }
}

/// Raw values from a `scans` row. Direction and timestamp are optional here
/// because rows may come from outside this crate.
pub struct RawScan {
  pub seq:         i64,
  pub badge_id:    String,
  pub direction:   Option<String>,
  pub recorded_at: Option<String>,
}

impl RawScan {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      seq:         row.get(0)?,
      badge_id:    row.get(1)?,
      direction:   row.get(2)?,
      recorded_at: row.get(3)?,
    })
  }

  pub fn into_scan(self) -> Result<ScanEvent> {
    let direction = self
      .direction
      .as_deref()
      .ok_or_else(|| rollcall_core::Error::UnknownDirection(String::new()))
      .and_then(Direction::parse)?;
    let recorded_at = self
      .recorded_at
      .as_deref()
      .ok_or_else(|| Error::DateParse("missing recorded_at".to_owned()))
      .and_then(decode_dt)?;

    Ok(ScanEvent {
      seq: self.seq,
      badge_id: self.badge_id,
      direction,
      recorded_at,
    })
  }
}

/// Decode scan rows, dropping (and logging) any that are malformed.
pub fn decode_scans(raws: Vec<RawScan>) -> Vec<ScanEvent> {
  raws
    .into_iter()
    .filter_map(|raw| {
      let seq = raw.seq;
      match raw.into_scan() {
        Ok(scan) => Some(scan),
        Err(e) => {
          tracing::warn!(seq, error = %e, "skipping malformed scan row");
          None
        }
      }
    })
    .collect()
}

/// A `scans` row left-joined with `members`.
pub struct RawAttendance {
  pub scan:         RawScan,
  pub name:         Option<String>,
  pub email:        Option<String>,
  pub reg_number:   Option<String>,
  pub phone_number: Option<String>,
  pub role:         Option<String>,
}

impl RawAttendance {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      scan:         RawScan::from_row(row)?,
      name:         row.get(4)?,
      email:        row.get(5)?,
      reg_number:   row.get(6)?,
      phone_number: row.get(7)?,
      role:         row.get(8)?,
    })
  }

  pub fn into_entry(self) -> Result<AttendanceEntry> {
    let scan = self.scan.into_scan()?;
    Ok(AttendanceEntry {
      seq:          scan.seq,
      badge_id:     scan.badge_id,
      display_name: self.name.unwrap_or_else(|| UNKNOWN_NAME.to_owned()),
      email:        self.email.unwrap_or_default(),
      reg_number:   self.reg_number.unwrap_or_default(),
      phone_number: self.phone_number.unwrap_or_default(),
      role:         RoleCategory::from_text_lossy(self.role.as_deref()),
      direction:    scan.direction,
      recorded_at:  scan.recorded_at,
    })
  }
}

/// Raw strings read directly from a `broadcasts` row.
pub struct RawBroadcast {
  pub broadcast_id:    String,
  pub sender_email:    String,
  pub title:           String,
  pub body:            String,
  pub priority:        String,
  pub target_roles:    String,
  pub recipient_count: i64,
  pub sent_at:         String,
}

impl RawBroadcast {
  pub fn into_broadcast(self) -> Result<Broadcast> {
    Ok(Broadcast {
      broadcast_id:    decode_uuid(&self.broadcast_id)?,
      sender_email:    self.sender_email,
      title:           self.title,
      body:            self.body,
      priority:        Priority::parse(&self.priority)?,
      target_roles:    decode_roles(&self.target_roles)?,
      recipient_count: u64::try_from(self.recipient_count).unwrap_or(0),
      sent_at:         decode_dt(&self.sent_at)?,
    })
  }
}

/// Raw values read directly from a `notification_preferences` row.
pub struct RawPreference {
  pub preference_id:     String,
  pub owner_email:       String,
  pub notification_type: String,
  pub enabled:           bool,
  pub push_enabled:      bool,
  pub email_enabled:     bool,
  pub updated_at:        String,
}

pub const PREFERENCE_COLUMNS: &str = "preference_id, owner_email, notification_type, enabled, push_enabled, email_enabled, updated_at";

impl RawPreference {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      preference_id:     row.get(0)?,
      owner_email:       row.get(1)?,
      notification_type: row.get(2)?,
      enabled:           row.get(3)?,
      push_enabled:      row.get(4)?,
      email_enabled:     row.get(5)?,
      updated_at:        row.get(6)?,
    })
  }

  pub fn into_preference(self) -> Result<NotificationPreference> {
    Ok(NotificationPreference {
      preference_id:     decode_uuid(&self.preference_id)?,
      owner_email:       self.owner_email,
      notification_type: self.notification_type,
      enabled:           self.enabled,
      push_enabled:      self.push_enabled,
      email_enabled:     self.email_enabled,
      updated_at:        decode_dt(&self.updated_at)?,
    })
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  fn raw(direction: Option<&str>, recorded_at: Option<&str>) -> RawScan {
    RawScan {
      seq:         1,
      badge_id:    "B1".into(),
      direction:   direction.map(str::to_owned),
      recorded_at: recorded_at.map(str::to_owned),
    }
  }

  #[test]
  fn timestamps_are_fixed_width() {
    let a = encode_dt(Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap());
    assert_eq!(a, "2025-03-10T09:00:00.000000Z");
    assert_eq!(decode_dt(&a).unwrap().timestamp(), 1_741_597_200);
  }

  #[test]
  fn timestamps_from_other_writers_decode() {
    let nine_utc = Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap();
    for text in [
      "2025-03-10T14:30:00+05:30",
      "2025-03-10 14:30:00.000+05:30",
      "2025-03-10 09:00:00",
      "2025-03-10T09:00",
      "2025-03-10 04:00-05:00",
    ] {
      assert_eq!(decode_dt(text).unwrap(), nine_utc, "{text}");
    }
    assert_eq!(
      decode_dt("2025-03-10").unwrap(),
      Utc.with_ymd_and_hms(2025, 3, 10, 0, 0, 0).unwrap()
    );

    for text in ["yesterday", "09:00", "2460744.875", "2025-03-10T09:00+5:30"] {
      assert!(decode_dt(text).is_err(), "{text}");
    }
  }

  #[test]
  fn scan_rows_decode_when_well_formed() {
    let scan = raw(Some("in"), Some("2025-03-10T09:00:00Z")).into_scan().unwrap();
    assert_eq!(scan.direction, Direction::In);
  }

  #[test]
  fn malformed_scan_rows_are_dropped() {
    let raws = vec![
      raw(Some("IN"), Some("2025-03-10T09:00:00Z")),
      raw(None, Some("2025-03-10T09:00:00Z")),
      raw(Some("MAYBE"), Some("2025-03-10T09:00:00Z")),
      raw(Some("OUT"), None),
      raw(Some("OUT"), Some("yesterday")),
    ];
    assert_eq!(decode_scans(raws).len(), 1);
  }
}
