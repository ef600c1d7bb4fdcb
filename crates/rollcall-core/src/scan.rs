//! Scan events: the append-only log written by the badge readers.
//!
//! A scan is never updated or deleted. Everything the dashboard shows about
//! who is in the lab is derived from this log at query time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::{Error, Result, member::RoleCategory};

// ─── Direction ───────────────────────────────────────────────────────────────

/// Whether a badge was scanned on the way in or on the way out.
///
/// Stored and serialised as the upper-case text `IN` / `OUT`, which is what
/// the reader middleware writes.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum Direction {
  In,
  Out,
}

impl Direction {
  /// Parse the column text, accepting any ASCII case.
  pub fn parse(s: &str) -> Result<Self> {
    s.trim()
      .parse()
      .map_err(|_| Error::UnknownDirection(s.to_owned()))
  }

  pub fn is_in(self) -> bool { matches!(self, Self::In) }
}

// ─── ScanEvent ───────────────────────────────────────────────────────────────

/// A single badge scan as read back from the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanEvent {
  /// Store-assigned insertion sequence. Breaks ties between scans of the same
  /// badge that carry an identical timestamp: the later insert wins.
  pub seq:         i64,
  /// Opaque identifier of the RFID tag.
  pub badge_id:    String,
  pub direction:   Direction,
  pub recorded_at: DateTime<Utc>,
}

impl ScanEvent {
  /// Ordering key used when deciding which of two scans is more recent.
  pub fn recency_key(&self) -> (DateTime<Utc>, i64) {
    (self.recorded_at, self.seq)
  }
}

/// Input to [`crate::store::AttendanceStore::record_scan`].
/// `recorded_at` and `seq` are always set by the store.
#[derive(Debug, Clone, Deserialize)]
pub struct NewScan {
  pub badge_id:  String,
  pub direction: Direction,
}

// ─── Attendance log rows ─────────────────────────────────────────────────────

/// A scan joined with whatever the member directory knows about its badge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendanceEntry {
  pub seq:          i64,
  pub badge_id:     String,
  /// `"Unknown"` when no member holds the badge.
  pub display_name: String,
  pub email:        String,
  pub reg_number:   String,
  pub phone_number: String,
  pub role:         RoleCategory,
  pub direction:    Direction,
  pub recorded_at:  DateTime<Utc>,
}

/// One page of the attendance log plus the unpaginated match count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendancePage {
  pub entries: Vec<AttendanceEntry>,
  pub total:   u64,
  pub limit:   usize,
  pub offset:  usize,
}
