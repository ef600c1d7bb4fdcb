//! Usage analytics folded from the scan log.
//!
//! Everything here is a pure function over a slice of scans. Hours and days
//! are bucketed in the lab's local time, given as a fixed UTC offset.

use std::collections::{BTreeSet, HashMap, HashSet};

use chrono::{
  DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone,
  Timelike, Utc,
};
use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  scan::{Direction, ScanEvent},
};

/// First and last hour (inclusive) sampled by [`peak_hours`] by default.
pub const OPEN_HOUR: u32 = 8;
pub const CLOSE_HOUR: u32 = 20;

// ─── Local time ──────────────────────────────────────────────────────────────

/// Build the lab's fixed offset from a minute count east of UTC.
pub fn local_offset(minutes: i32) -> Result<FixedOffset> {
  minutes
    .checked_mul(60)
    .and_then(FixedOffset::east_opt)
    .ok_or(Error::InvalidOffset(minutes))
}

fn offset_duration(offset: FixedOffset) -> Duration {
  Duration::seconds(i64::from(offset.local_minus_utc()))
}

fn local_to_utc(naive: NaiveDateTime, offset: FixedOffset) -> Option<DateTime<Utc>> {
  let utc = naive.checked_sub_signed(offset_duration(offset))?;
  Some(Utc.from_utc_datetime(&utc))
}

/// The local calendar date of `at`.
pub fn local_date(at: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
  at.with_timezone(&offset).date_naive()
}

/// First and last representable instant of a local calendar day.
///
/// `None` when either bound falls outside the range `DateTime<Utc>` can hold.
pub fn day_bounds(
  date: NaiveDate,
  offset: FixedOffset,
) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
  let start = local_to_utc(date.and_time(NaiveTime::MIN), offset)?;
  let end = start
    .checked_add_signed(Duration::days(1))?
    .checked_sub_signed(Duration::milliseconds(1))?;
  Some((start, end))
}

/// Local midnight at the start of the day containing `at`, or `None` at the
/// edges of the representable range.
pub fn start_of_local_day(
  at: DateTime<Utc>,
  offset: FixedOffset,
) -> Option<DateTime<Utc>> {
  let local = at.naive_utc().checked_add_signed(offset_duration(offset))?;
  local_to_utc(local.date().and_time(NaiveTime::MIN), offset)
}

fn chronological<'a>(events: &'a [ScanEvent]) -> Vec<&'a ScanEvent> {
  let mut sorted: Vec<&ScanEvent> = events.iter().collect();
  sorted.sort_by_key(|e| e.recency_key());
  sorted
}

// ─── Peak hours ──────────────────────────────────────────────────────────────

/// Average and maximum head count observed during one local hour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HourlyOccupancy {
  pub hour:          u32,
  /// `"{hour}:00"`.
  pub time:          String,
  /// Mean of the sampled head counts per sampled day, one decimal place.
  pub avg_occupancy: f64,
  pub max_occupancy: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeakHour {
  pub hour:          u32,
  pub time:          String,
  pub avg_occupancy: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeakHoursReport {
  #[serde(rename = "chartData")]
  pub chart: Vec<HourlyOccupancy>,
  /// Earliest hour with the highest average; `None` only for an empty range.
  #[serde(rename = "peakHour")]
  pub peak:  Option<PeakHour>,
}

#[derive(Default)]
struct HourBucket {
  total: usize,
  max:   usize,
  days:  BTreeSet<NaiveDate>,
}

/// Replay each local day's scans and sample the head count after every scan
/// falling within `open_hour..=close_hour`.
///
/// Status carries across hours within a day but resets at local midnight.
pub fn peak_hours(
  events: &[ScanEvent],
  offset: FixedOffset,
  open_hour: u32,
  close_hour: u32,
) -> PeakHoursReport {
  let mut buckets: HashMap<u32, HourBucket> = HashMap::new();
  let mut days: HashMap<NaiveDate, HashMap<&str, Direction>> = HashMap::new();

  for event in chronological(events) {
    let local = event.recorded_at.with_timezone(&offset);
    let date = local.date_naive();
    let hour = local.hour();

    let day = days.entry(date).or_default();
    day.insert(event.badge_id.as_str(), event.direction);

    if hour < open_hour || hour > close_hour {
      continue;
    }

    let occupancy = day.values().filter(|d| d.is_in()).count();
    let bucket = buckets.entry(hour).or_default();
    bucket.total += occupancy;
    bucket.max = bucket.max.max(occupancy);
    bucket.days.insert(date);
  }

  let chart: Vec<HourlyOccupancy> = (open_hour..=close_hour)
    .map(|hour| {
      let (avg, max) = match buckets.get(&hour) {
        Some(b) if !b.days.is_empty() => {
          let avg = b.total as f64 / b.days.len() as f64;
          ((avg * 10.0).round() / 10.0, b.max)
        }
        _ => (0.0, 0),
      };
      HourlyOccupancy {
        hour,
        time: format!("{hour}:00"),
        avg_occupancy: avg,
        max_occupancy: max,
      }
    })
    .collect();

  let peak = chart
    .iter()
    .fold(None::<&HourlyOccupancy>, |best, h| match best {
      Some(b) if b.avg_occupancy >= h.avg_occupancy => Some(b),
      _ => Some(h),
    })
    .map(|h| PeakHour {
      hour:          h.hour,
      time:          h.time.clone(),
      avg_occupancy: h.avg_occupancy,
    });

  PeakHoursReport { chart, peak }
}

// ─── Rush hours ──────────────────────────────────────────────────────────────

/// Scan traffic during one local hour of the day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourlyActivity {
  pub hour:    u32,
  /// `"HH:00"`.
  pub label:   String,
  pub count:   usize,
  pub entries: usize,
  pub exits:   usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RushHoursReport {
  /// Always 24 buckets, midnight first.
  #[serde(rename = "hourlyData")]
  pub hourly:      Vec<HourlyActivity>,
  /// Labels of the (up to) three busiest hours; ties go to the earlier hour.
  pub peak_hours:  Vec<String>,
  pub total_scans: usize,
}

/// Bucket every scan by local hour of day.
pub fn rush_hours(events: &[ScanEvent], offset: FixedOffset) -> RushHoursReport {
  let mut hourly: Vec<HourlyActivity> = (0..24)
    .map(|hour| HourlyActivity {
      hour,
      label: format!("{hour:02}:00"),
      count: 0,
      entries: 0,
      exits: 0,
    })
    .collect();

  for event in events {
    let hour = event.recorded_at.with_timezone(&offset).hour() as usize;
    let bucket = &mut hourly[hour];
    bucket.count += 1;
    match event.direction {
      Direction::In => bucket.entries += 1,
      Direction::Out => bucket.exits += 1,
    }
  }

  let mut ranked: Vec<&HourlyActivity> =
    hourly.iter().filter(|h| h.count > 0).collect();
  ranked.sort_by(|a, b| b.count.cmp(&a.count));
  let peak_hours = ranked.iter().take(3).map(|h| h.label.clone()).collect();

  RushHoursReport { hourly, peak_hours, total_scans: events.len() }
}

// ─── Weekly activity ─────────────────────────────────────────────────────────

/// Visits on one local calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyActivity {
  /// Short weekday name, e.g. `"Mon"`.
  pub day:          String,
  pub date:         NaiveDate,
  /// Number of IN scans.
  pub occupancy:    usize,
  /// Distinct badges that scanned IN.
  pub unique_users: usize,
}

/// Seven consecutive local days starting at `first_day`.
pub fn weekly_activity(
  events: &[ScanEvent],
  first_day: NaiveDate,
  offset: FixedOffset,
) -> Vec<DailyActivity> {
  let mut entries: HashMap<NaiveDate, (usize, HashSet<&str>)> = HashMap::new();
  for event in events.iter().filter(|e| e.direction.is_in()) {
    let slot = entries
      .entry(local_date(event.recorded_at, offset))
      .or_default();
    slot.0 += 1;
    slot.1.insert(event.badge_id.as_str());
  }

  first_day
    .iter_days()
    .take(7)
    .map(|date| {
      let (occupancy, unique_users) = entries
        .get(&date)
        .map(|(n, badges)| (*n, badges.len()))
        .unwrap_or_default();
      DailyActivity {
        day: date.format("%a").to_string(),
        date,
        occupancy,
        unique_users,
      }
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  fn utc(d: u32, h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, d, h, m, 0).unwrap()
  }

  fn scan(seq: i64, badge: &str, direction: Direction, ts: DateTime<Utc>) -> ScanEvent {
    ScanEvent { seq, badge_id: badge.into(), direction, recorded_at: ts }
  }

  fn utc0() -> FixedOffset { local_offset(0).unwrap() }

  #[test]
  fn offset_rejects_out_of_range() {
    assert!(local_offset(330).is_ok());
    assert!(matches!(local_offset(24 * 60), Err(Error::InvalidOffset(1440))));
  }

  #[test]
  fn start_of_day_respects_offset() {
    let ist = local_offset(330).unwrap();
    // 2025-03-10 20:00 UTC is already 2025-03-11 01:30 in UTC+05:30.
    let start = start_of_local_day(utc(10, 20, 0), ist);
    assert_eq!(start, Some(utc(10, 18, 30)));

    let (s, e) =
      day_bounds(NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(), utc0()).unwrap();
    assert_eq!(s, utc(10, 0, 0));
    assert_eq!(e, utc(10, 23, 59) + Duration::milliseconds(59_999));
  }

  #[test]
  fn day_bounds_at_the_calendar_edges_are_none() {
    assert_eq!(day_bounds(NaiveDate::MAX, utc0()), None);
    // Local midnight on the first date is before the first UTC instant.
    let east = local_offset(60).unwrap();
    assert_eq!(day_bounds(NaiveDate::MIN, east), None);
    assert_eq!(start_of_local_day(DateTime::<Utc>::MIN_UTC, east), None);

    let last_full_day = NaiveDate::MAX.pred_opt().unwrap();
    assert!(day_bounds(last_full_day, utc0()).is_some());
  }

  #[test]
  fn peak_hours_tracks_head_count_per_day() {
    let events = vec![
      // Day 1: two people by 9:xx, one leaves at 10:xx.
      scan(1, "A", Direction::In, utc(10, 9, 0)),
      scan(2, "B", Direction::In, utc(10, 9, 30)),
      scan(3, "A", Direction::Out, utc(10, 10, 15)),
      // Day 2: one person at 9:xx.
      scan(4, "C", Direction::In, utc(11, 9, 10)),
    ];
    let report = peak_hours(&events, utc0(), OPEN_HOUR, CLOSE_HOUR);

    assert_eq!(report.chart.len(), 13);
    let nine = &report.chart[1];
    assert_eq!(nine.time, "9:00");
    // Samples: day1 → 1, 2; day2 → 1. Sum 4 over 2 days.
    assert_eq!(nine.avg_occupancy, 2.0);
    assert_eq!(nine.max_occupancy, 2);

    let ten = &report.chart[2];
    assert_eq!(ten.avg_occupancy, 1.0);

    let peak = report.peak.unwrap();
    assert_eq!(peak.hour, 9);
  }

  #[test]
  fn peak_hours_ignores_scans_outside_opening_hours_for_sampling() {
    let events = vec![
      scan(1, "A", Direction::In, utc(10, 7, 30)),
      scan(2, "B", Direction::In, utc(10, 8, 5)),
    ];
    let report = peak_hours(&events, utc0(), OPEN_HOUR, CLOSE_HOUR);
    // A's early check-in still counts toward the 8:00 head count.
    assert_eq!(report.chart[0].max_occupancy, 2);
  }

  #[test]
  fn peak_hours_empty_range_picks_first_hour() {
    let report = peak_hours(&[], utc0(), OPEN_HOUR, CLOSE_HOUR);
    assert!(report.chart.iter().all(|h| h.avg_occupancy == 0.0));
    assert_eq!(report.peak.unwrap().hour, OPEN_HOUR);
  }

  #[test]
  fn rush_hours_counts_entries_and_exits() {
    let events = vec![
      scan(1, "A", Direction::In, utc(10, 9, 0)),
      scan(2, "B", Direction::In, utc(10, 9, 30)),
      scan(3, "A", Direction::Out, utc(10, 17, 0)),
      scan(4, "B", Direction::Out, utc(11, 17, 45)),
      scan(5, "C", Direction::In, utc(11, 17, 50)),
      scan(6, "C", Direction::Out, utc(11, 22, 0)),
    ];
    let report = rush_hours(&events, utc0());

    assert_eq!(report.hourly.len(), 24);
    assert_eq!(report.total_scans, 6);
    assert_eq!(report.hourly[9].entries, 2);
    assert_eq!(report.hourly[17].exits, 2);
    assert_eq!(report.hourly[17].count, 3);
    assert_eq!(report.peak_hours, ["17:00", "09:00", "22:00"]);
  }

  #[test]
  fn rush_hours_skips_idle_hours_in_peaks() {
    let events = vec![scan(1, "A", Direction::In, utc(10, 6, 0))];
    let report = rush_hours(&events, utc0());
    assert_eq!(report.peak_hours, ["06:00"]);
  }

  #[test]
  fn weekly_counts_visits_and_distinct_badges() {
    let events = vec![
      scan(1, "A", Direction::In, utc(10, 9, 0)),
      scan(2, "A", Direction::Out, utc(10, 10, 0)),
      scan(3, "A", Direction::In, utc(10, 11, 0)),
      scan(4, "B", Direction::In, utc(10, 12, 0)),
      scan(5, "C", Direction::In, utc(14, 8, 0)),
    ];
    let first = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
    let week = weekly_activity(&events, first, utc0());

    assert_eq!(week.len(), 7);
    assert_eq!(week[0].day, "Mon");
    assert_eq!(week[0].occupancy, 3);
    assert_eq!(week[0].unique_users, 2);
    assert_eq!(week[4].date, NaiveDate::from_ymd_opt(2025, 3, 14).unwrap());
    assert_eq!(week[4].occupancy, 1);
    assert_eq!(week[6].occupancy, 0);
  }
}
